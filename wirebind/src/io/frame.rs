use super::*;

/// A [`Reader`] bounded to an exact window of bytes.
///
/// Reads that would cross the end of the window fail with [`ReadError::FrameBoundary`]
/// rather than [`ReadError::ReadSizeLimit`], which lets the engine tell a decoder that
/// overran its declared length apart from an input that ended early.
///
/// ```
/// use wirebind::io::{Frame, Reader, ReadError};
///
/// let bytes = [1, 2, 3, 4];
/// let mut frame = Frame::new(&bytes[..2]);
/// let mut dst = [0u8; 2];
/// frame.read_exact(&mut dst).unwrap();
/// assert!(frame.is_exhausted());
/// assert!(matches!(frame.peek(), Err(ReadError::FrameBoundary { needed: 1, remaining: 0 })));
/// ```
#[derive(Debug)]
pub struct Frame<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Frame<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Total length of the window.
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes consumed so far.
    pub const fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes left in the window.
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether every byte of the window has been consumed.
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl Reader for Frame<'_> {
    #[inline]
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let src = &self.bytes[self.pos..];
        Ok(&src[..n_bytes.min(src.len())])
    }

    #[inline]
    fn fill_exact(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let remaining = self.remaining();
        let Some(src) = self.bytes[self.pos..].get(..n_bytes) else {
            return Err(frame_boundary(n_bytes, remaining));
        };
        Ok(src)
    }

    #[inline]
    fn consume(&mut self, amt: usize) -> ReadResult<()> {
        if self.remaining() < amt {
            return Err(frame_boundary(amt, self.remaining()));
        }
        self.pos += amt;
        Ok(())
    }
}
