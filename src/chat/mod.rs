//! Chat module: the message orchestrator tying display, store, and model
//! together.

mod session;

pub use session::{ChatEvent, ChatSession, GREETING};
