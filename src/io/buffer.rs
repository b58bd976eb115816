//! In-memory I/O: a prepared input queue and an output collector.

use std::collections::VecDeque;

use crate::cpu::Word;
use crate::io::{Input, IoError, Output};

/// Input served from a prepared sequence. Fails with
/// [`IoError::Exhausted`] once empty instead of blocking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    values: VecDeque<Word>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the back of the queue.
    pub fn push(&mut self, value: Word) {
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Word>> for Queue {
    fn from(values: Vec<Word>) -> Self {
        Self { values: values.into() }
    }
}

impl FromIterator<Word> for Queue {
    fn from_iter<T: IntoIterator<Item = Word>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

impl Extend<Word> for Queue {
    fn extend<T: IntoIterator<Item = Word>>(&mut self, iter: T) {
        self.values.extend(iter);
    }
}

impl Input for Queue {
    fn get(&mut self) -> Result<Word, IoError> {
        self.values.pop_front().ok_or(IoError::Exhausted)
    }
}

/// Output that records every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collector {
    values: Vec<Word>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[Word] {
        &self.values
    }

    pub fn last(&self) -> Option<Word> {
        self.values.last().copied()
    }

    /// Remove and return everything collected so far.
    pub fn take(&mut self) -> Vec<Word> {
        std::mem::take(&mut self.values)
    }
}

impl Output for Collector {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        self.values.push(value);
        Ok(())
    }
}

impl Output for Vec<Word> {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        self.push(value);
        Ok(())
    }
}
