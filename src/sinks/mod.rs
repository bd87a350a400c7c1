//! Sink implementations

pub mod console;
pub mod file;
pub mod forward;
pub mod rotating_file;

pub use console::{ConsoleSink, ConsoleTarget};
pub use file::FileSink;
pub use forward::{ForwardSink, DEFAULT_CONNECT_TIMEOUT};
pub use rotating_file::{RotatingFileSink, RotationPolicy};

pub use crate::core::Sink;
