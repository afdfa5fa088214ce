pub mod backends;
pub mod cache_storage;
pub mod fetchers;
pub mod storage;
