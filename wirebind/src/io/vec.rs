use super::*;

/// Writer implementation for `Vec<u8>` that appends to the vector. The vector will grow as needed.
///
/// # Examples
///
/// Writing to an existing vector.
/// ```
/// # use wirebind::io::Writer;
/// let mut vec = vec![1, 2, 3];
/// let bytes = [4, 5, 6];
/// vec.write(&bytes).unwrap();
/// assert_eq!(vec, &[1, 2, 3, 4, 5, 6]);
/// ```
impl Writer for Vec<u8> {
    #[inline]
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// [`Writer`] that discards its input and only counts bytes.
///
/// Used to compute the serialized size of a value without allocating the output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SizeCounter {
    written: usize,
}

impl SizeCounter {
    pub const fn new() -> Self {
        Self { written: 0 }
    }

    /// Number of bytes written so far.
    pub const fn written(&self) -> usize {
        self.written
    }
}

impl Writer for SizeCounter {
    #[inline]
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        self.written = self
            .written
            .checked_add(src.len())
            .ok_or_else(|| write_size_limit(src.len()))?;
        Ok(())
    }
}
