//! Line-oriented console I/O.
//!
//! One decimal integer per line in both directions.

use std::io::{BufRead, Stdin, StdinLock, Stdout, Write};

use crate::cpu::Word;
use crate::io::{Input, IoError, Output};

/// Reads one integer per line.
pub struct ConsoleInput<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> ConsoleInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl ConsoleInput<StdinLock<'static>> {
    /// Read from the process's standard input.
    pub fn stdin() -> Self {
        let stdin: Stdin = std::io::stdin();
        Self::new(stdin.lock())
    }
}

impl<R: BufRead> Input for ConsoleInput<R> {
    fn get(&mut self) -> Result<Word, IoError> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Err(IoError::Exhausted);
        }
        self.line += 1;

        let text = self.buf.trim();
        text.parse().map_err(|_| IoError::Malformed {
            line: self.line,
            text: text.to_string(),
        })
    }
}

/// Writes one integer per line, flushing after each.
pub struct ConsoleOutput<W> {
    writer: W,
}

impl<W: Write> ConsoleOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl ConsoleOutput<Stdout> {
    /// Write to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Output for ConsoleOutput<W> {
    fn put(&mut self, value: Word) -> Result<(), IoError> {
        writeln!(self.writer, "{}", value)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_lines() {
        let mut input = ConsoleInput::new(Cursor::new("5\n-12\n  7  \r\n"));
        assert_eq!(input.get(), Ok(5));
        assert_eq!(input.get(), Ok(-12));
        assert_eq!(input.get(), Ok(7));
        assert_eq!(input.get(), Err(IoError::Exhausted));
        assert_eq!(input.lines_read(), 3);
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut input = ConsoleInput::new(Cursor::new("1\n2"));
        assert_eq!(input.get(), Ok(1));
        assert_eq!(input.get(), Ok(2));
        assert_eq!(input.get(), Err(IoError::Exhausted));
    }

    #[test]
    fn test_malformed_input() {
        let mut input = ConsoleInput::new(Cursor::new("1\nabc\n"));
        assert_eq!(input.get(), Ok(1));
        assert_eq!(
            input.get(),
            Err(IoError::Malformed { line: 2, text: "abc".into() })
        );

        let mut input = ConsoleInput::new(Cursor::new("\n"));
        assert!(matches!(input.get(), Err(IoError::Malformed { line: 1, .. })));
    }

    #[test]
    fn test_write_lines() {
        let mut output = ConsoleOutput::new(Vec::new());
        output.put(42).unwrap();
        output.put(-1).unwrap();
        assert_eq!(output.into_inner(), b"42\n-1\n");
    }
}
