pub mod console;
pub mod input;

pub use input::{EventSender, UserCommand};
