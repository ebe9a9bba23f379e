//! Growable byte buffer and the string type layered on top of it.

use bytes::Bytes;
use std::fmt;

use super::AllocError;

const MIB: usize = 1024 * 1024;

/// Capacity chosen for a buffer that must hold `size` bytes.
///
/// Power of two below 1 MiB, next multiple of 1 MiB from there on.
pub fn rounded_capacity(size: usize) -> usize {
    if size < MIB {
        size.next_power_of_two()
    } else {
        size.div_ceil(MIB).saturating_mul(MIB)
    }
}

/// Byte buffer with an explicit logical size.
///
/// Capacity only ever grows: shrinking changes the logical size and keeps
/// the allocation for the next append.
#[derive(Debug, Default, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut buf = Self::new();
        buf.reserve_for(capacity)?;
        Ok(buf)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn reserve_for(&mut self, size: usize) -> Result<(), AllocError> {
        if size <= self.data.capacity() {
            return Ok(());
        }
        let target = rounded_capacity(size);
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|e| AllocError::from_reserve(target, e))
    }

    /// Sets the logical size. New bytes are zeroed.
    ///
    /// On failure the buffer is left untouched.
    pub fn resize(&mut self, new_size: usize) -> Result<(), AllocError> {
        self.reserve_for(new_size)?;
        self.data.resize(new_size, 0);
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), AllocError> {
        self.reserve_for(self.data.len() + bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Converts the buffer into an immutable, cheaply clonable byte string.
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.data)
    }
}

/// UTF-8 text kept NUL-terminated inside a [`GrowableBuffer`].
///
/// `len()` is the logical length and never counts the terminator.
#[derive(Debug, Clone)]
pub struct GrowableString {
    buf: GrowableBuffer,
}

impl GrowableString {
    pub fn new() -> Self {
        let mut buf = GrowableBuffer::new();
        buf.data.push(0);
        Self { buf }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut buf = GrowableBuffer::with_capacity(capacity + 1)?;
        buf.data.push(0);
        Ok(Self { buf })
    }

    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn push_str(&mut self, s: &str) -> Result<(), AllocError> {
        let len = self.len();
        self.buf.reserve_for(len + s.len() + 1)?;
        self.buf.data.truncate(len);
        self.buf.data.extend_from_slice(s.as_bytes());
        self.buf.data.push(0);
        Ok(())
    }

    pub fn push(&mut self, c: char) -> Result<(), AllocError> {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp))
    }

    pub fn clear(&mut self) {
        self.buf.data.truncate(0);
        self.buf.data.push(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_slice()[..self.len()]
    }

    /// Content including the trailing NUL.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn as_str(&self) -> &str {
        // Only whole `&str`s are ever appended.
        match std::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&self.as_bytes()[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    /// Drops the terminator and hands the text out as immutable bytes.
    pub fn freeze(mut self) -> Bytes {
        let len = self.len();
        self.buf.data.truncate(len);
        self.buf.freeze()
    }
}

impl Default for GrowableString {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for GrowableString {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}

impl fmt::Display for GrowableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounding() {
        assert_eq!(rounded_capacity(1), 1);
        assert_eq!(rounded_capacity(3), 4);
        assert_eq!(rounded_capacity(1000), 1024);
        assert_eq!(rounded_capacity(MIB), MIB);
        assert_eq!(rounded_capacity(MIB + 1), 2 * MIB);
        assert_eq!(rounded_capacity(3 * MIB - 5), 3 * MIB);
    }
}
