//! Machine I/O capabilities.
//!
//! The machine sees its environment through two single-method traits:
//! [`Input`] yields one word, [`Output`] accepts one word. Backings:
//! - [`console`]: line-oriented text over any reader/writer (stdin/stdout)
//! - [`channel`]: in-process queues linking machines on separate threads
//! - [`buffer`]: prepared input and collected output, for batch runs and tests

pub mod buffer;
pub mod channel;
pub mod console;

use crate::cpu::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

pub use buffer::{Collector, Queue};
pub use channel::{bounded, channel, ChannelInput, ChannelOutput};
pub use console::{ConsoleInput, ConsoleOutput};

/// Source of input words. A call may block until a value is available.
pub trait Input {
    fn get(&mut self) -> Result<Word, IoError>;
}

/// Sink for output words. Called once per produced value.
pub trait Output {
    fn put(&mut self, value: Word) -> Result<(), IoError>;
}

impl<T: Input + ?Sized> Input for &mut T {
    fn get(&mut self) -> Result<Word, IoError> {
        (**self).get()
    }
}

impl<T: Input + ?Sized> Input for Box<T> {
    fn get(&mut self) -> Result<Word, IoError> {
        (**self).get()
    }
}

impl<T: Output + ?Sized> Output for &mut T {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        (**self).put(value)
    }
}

impl<T: Output + ?Sized> Output for Box<T> {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        (**self).put(value)
    }
}

/// Errors raised by an I/O capability.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum IoError {
    #[error("input exhausted")]
    Exhausted,

    #[error("malformed input on line {line}: {text:?}")]
    Malformed { line: usize, text: String },

    #[error("channel disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e.to_string())
    }
}
