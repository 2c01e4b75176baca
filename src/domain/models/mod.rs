mod chat;
mod message;
mod prompt;
mod runner;
mod session;
mod slash_commands;
mod storage;

pub use chat::*;
pub use message::*;
pub use prompt::*;
pub use runner::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
