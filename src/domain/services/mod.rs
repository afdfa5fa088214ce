mod app_state;
mod cache_manager;
mod chat_session;
mod persistence;
mod stream_decoder;

pub use app_state::*;
pub use cache_manager::*;
pub use chat_session::*;
pub use persistence::*;
pub use stream_decoder::*;
