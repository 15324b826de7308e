use super::*;

/// `Cursor` wraps an in-memory buffer, providing [`Reader`] and [`Writer`] functionality
/// for types implementing <code>[AsRef]<\[u8]></code>.
///
/// Unlike `&[u8]`, the cursor keeps the whole buffer and tracks its position, so it can be
/// rewound with [`Cursor::set_position`] and inspected after a read.
///
/// # Examples
///
/// Writing over a fixed buffer, then reading it back.
///
/// ```
/// use wirebind::io::{Cursor, Reader, Writer};
///
/// let mut data = [0u8; 4];
/// let mut cursor = Cursor::new(&mut data[..]);
/// cursor.write(&[1, 2]).unwrap();
/// cursor.write(&[3, 4]).unwrap();
/// assert_eq!(cursor.position(), 4);
///
/// let mut cursor = Cursor::new(&data[..]);
/// let mut dst = [0u8; 4];
/// cursor.read_exact(&mut dst).unwrap();
/// assert_eq!(dst, [1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Cursor<T> {
    inner: T,
    pos: usize,
}

impl<T> Cursor<T> {
    pub const fn new(inner: T) -> Self {
        Self { inner, pos: 0 }
    }

    /// Creates a new cursor at the given position.
    pub const fn new_at(inner: T, pos: usize) -> Self {
        Self { inner, pos }
    }

    /// Sets the position of the cursor.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Consumes the cursor and returns the inner value.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Returns the current position of the cursor.
    pub const fn position(&self) -> usize {
        self.pos
    }
}

impl<T> Cursor<T>
where
    T: AsRef<[u8]>,
{
    /// Returns a slice of the remaining bytes in the cursor.
    #[inline]
    fn cur_slice(&self) -> &[u8] {
        let slice = self.inner.as_ref();
        &slice[self.pos.min(slice.len())..]
    }

    /// Returns the number of bytes remaining in the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.inner.as_ref().len().saturating_sub(self.pos)
    }
}

impl<T> Reader for Cursor<T>
where
    T: AsRef<[u8]>,
{
    #[inline]
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let src = self.cur_slice();
        Ok(&src[..n_bytes.min(src.len())])
    }

    #[inline]
    fn fill_exact(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let Some(src) = self.cur_slice().get(..n_bytes) else {
            return Err(read_size_limit(n_bytes));
        };
        Ok(src)
    }

    fn consume(&mut self, amt: usize) -> ReadResult<()> {
        if self.remaining() < amt {
            return Err(read_size_limit(amt));
        }
        self.pos += amt;
        Ok(())
    }
}

/// Overwrites the underlying slice at the current position; never grows it.
impl Writer for Cursor<&mut [u8]> {
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        let Some(dst) = self
            .pos
            .checked_add(src.len())
            .and_then(|end| self.inner.get_mut(self.pos..end))
        else {
            return Err(write_size_limit(src.len()));
        };
        dst.copy_from_slice(src);
        self.pos += src.len();
        Ok(())
    }
}

/// Overwrites the vector at the current position, growing it when writing past the end.
impl Writer for Cursor<&mut Vec<u8>> {
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        let end = self
            .pos
            .checked_add(src.len())
            .ok_or_else(|| write_size_limit(src.len()))?;
        if end > self.inner.len() {
            self.inner.resize(end, 0);
        }
        self.inner[self.pos..end].copy_from_slice(src);
        self.pos = end;
        Ok(())
    }
}
