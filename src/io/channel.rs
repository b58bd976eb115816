//! Channel-backed I/O for linking machines.
//!
//! A linked pair carries words from one machine's output to another's input
//! in FIFO order. Reads block until a value arrives; writes on a bounded
//! channel block while it is full. Once the other end is dropped, the
//! blocked call fails with [`IoError::Disconnected`].

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};

use crate::cpu::Word;
use crate::io::{Input, IoError, Output};

/// Receiving end, used as a machine's input.
#[derive(Debug)]
pub struct ChannelInput {
    rx: Receiver<Word>,
}

/// Sending end, used as a machine's output.
///
/// Cloning gives another writer into the same channel; values from different
/// writers interleave in whatever order the writers run.
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    tx: Tx,
}

#[derive(Debug, Clone)]
enum Tx {
    Unbounded(Sender<Word>),
    Bounded(SyncSender<Word>),
}

/// Create an unbounded linked pair.
pub fn channel() -> (ChannelOutput, ChannelInput) {
    let (tx, rx) = mpsc::channel();
    (ChannelOutput::from(tx), ChannelInput::from(rx))
}

/// Create a linked pair that holds at most `capacity` values in flight.
///
/// A capacity of zero makes every write wait for the matching read.
pub fn bounded(capacity: usize) -> (ChannelOutput, ChannelInput) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (ChannelOutput::from(tx), ChannelInput::from(rx))
}

impl ChannelInput {
    /// Take a value if one is already waiting.
    pub fn try_get(&mut self) -> Option<Word> {
        self.rx.try_recv().ok()
    }
}

impl From<Receiver<Word>> for ChannelInput {
    fn from(rx: Receiver<Word>) -> Self {
        Self { rx }
    }
}

impl From<Sender<Word>> for ChannelOutput {
    fn from(tx: Sender<Word>) -> Self {
        Self { tx: Tx::Unbounded(tx) }
    }
}

impl From<SyncSender<Word>> for ChannelOutput {
    fn from(tx: SyncSender<Word>) -> Self {
        Self { tx: Tx::Bounded(tx) }
    }
}

impl Input for ChannelInput {
    fn get(&mut self) -> Result<Word, IoError> {
        self.rx.recv().map_err(|_| IoError::Disconnected)
    }
}

impl Output for ChannelOutput {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        let sent = match &self.tx {
            Tx::Unbounded(tx) => tx.send(value).is_ok(),
            Tx::Bounded(tx) => tx.send(value).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            Err(IoError::Disconnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = channel();
        tx.put(7).unwrap();
        tx.put(3).unwrap();
        assert_eq!(rx.get(), Ok(7));
        assert_eq!(rx.get(), Ok(3));
        assert_eq!(rx.try_get(), None);
    }

    #[test]
    fn test_closed_writer_fails_read() {
        let (tx, mut rx) = channel();
        drop(tx);
        assert_eq!(rx.get(), Err(IoError::Disconnected));
    }

    #[test]
    fn test_closed_reader_fails_write() {
        let (mut tx, rx) = bounded(1);
        drop(rx);
        assert_eq!(tx.put(1), Err(IoError::Disconnected));
    }

    #[test]
    fn test_rendezvous_across_threads() {
        let (mut tx, mut rx) = bounded(0);
        let writer = thread::spawn(move || {
            for value in 0..5 {
                tx.put(value).unwrap();
            }
        });

        let received: Vec<Word> = (0..5).map(|_| rx.get().unwrap()).collect();
        writer.join().unwrap();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert_eq!(rx.get(), Err(IoError::Disconnected));
    }
}
