// src/system/capture.rs

//! In-memory sinks for process output.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A byte sink that keeps only the first and last `budget` bytes written to it.
///
/// Used for stderr on error paths, where a chatty process could otherwise grow the
/// buffer without bound. Writes never fail; the middle of the stream is dropped and
/// counted.
#[derive(Debug, Clone)]
pub struct BoundedCapture {
    budget: usize,
    prefix: Vec<u8>,
    suffix: VecDeque<u8>,
    skipped: u64,
}

impl BoundedCapture {
    /// Keeps at most `budget` bytes of head and `budget` bytes of tail.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            prefix: Vec::new(),
            suffix: VecDeque::new(),
            skipped: 0,
        }
    }

    /// Number of bytes dropped from the middle of the stream.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// The retained bytes. When something was dropped, an
    /// `"\n... omitting N bytes ...\n"` marker separates head and tail.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + self.suffix.len() + 40);
        out.extend_from_slice(&self.prefix);
        if self.skipped > 0 {
            out.extend_from_slice(format!("\n... omitting {} bytes ...\n", self.skipped).as_bytes());
        }
        out.extend(self.suffix.iter().copied());
        out
    }
}

impl Write for BoundedCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.budget.saturating_sub(self.prefix.len());
        let (head, tail) = buf.split_at(room.min(buf.len()));
        self.prefix.extend_from_slice(head);

        // Anything older than the last `budget` bytes of the tail is gone for good.
        let tail = match tail.len().checked_sub(self.budget) {
            Some(overage) if overage > 0 => {
                self.skipped += u64::try_from(overage).unwrap_or(u64::MAX);
                tail.get(overage..).unwrap_or_default()
            }
            _ => tail,
        };
        self.suffix.extend(tail.iter().copied());
        while self.suffix.len() > self.budget {
            self.suffix.pop_front();
            self.skipped += 1;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A cloneable writer over a shared value.
///
/// Hand one clone to the supervisor as a stream sink and keep another to read what the
/// process wrote after it exits.
#[derive(Debug, Default)]
pub struct SharedSink<W>(Arc<Mutex<W>>);

impl<W> Clone for SharedSink<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W> SharedSink<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Runs `f` with exclusive access to the inner value.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Default> SharedSink<W> {
    /// Moves the inner value out, leaving a default one behind.
    pub fn take(&self) -> W {
        std::mem::take(&mut *self.lock())
    }
}

impl SharedSink<Vec<u8>> {
    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }
}

impl<W: Write> Write for SharedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}
