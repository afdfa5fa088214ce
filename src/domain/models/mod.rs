mod backend;
mod cache;
mod message;
mod settings;
mod sink;
mod slash_commands;
mod storage;
mod stream;
mod transcript;

pub use backend::*;
pub use cache::*;
pub use message::*;
pub use settings::*;
pub use sink::*;
pub use slash_commands::*;
pub use storage::*;
pub use stream::*;
pub use transcript::*;
