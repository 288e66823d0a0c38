//! Fixed-capacity label buffer.
//!
//! Samplers format every stack into one preallocated buffer so the signal
//! tick never allocates. The buffer is a capped `String`: appends past the
//! cap fail, and the sample that caused them is discarded.

use std::fmt;

use crate::domain::LabelError;

/// Default capacity of a sampler's format buffer.
pub const FORMAT_BUF_SIZE: usize = 16 * 1024;

/// A write target with a hard capacity.
///
/// Implements [`fmt::Write`], so `write!` formats integers straight into it
/// without intermediate heap strings. Overflow is sticky until the next
/// [`clear`](LabelBuf::clear) or [`truncate`](LabelBuf::truncate).
#[derive(Debug)]
pub struct LabelBuf {
    text: String,
    capacity: usize,
    overflowed: bool,
}

impl LabelBuf {
    pub fn new() -> Self {
        Self::with_capacity(FORMAT_BUF_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LabelBuf {
            text: String::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.overflowed = false;
    }

    /// Roll back to a previously recorded length.
    pub fn truncate(&mut self, len: usize) {
        self.text.truncate(len);
        self.overflowed = false;
    }

    /// Convert a sticky overflow into the error the caller reports.
    pub fn check_overflow(&self) -> Result<(), LabelError> {
        if self.overflowed {
            Err(LabelError::BufferOverflow {
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for LabelBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for LabelBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.overflowed || self.text.len() + s.len() > self.capacity {
            self.overflowed = true;
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}
