use {super::*, core::mem};

impl Reader for &[u8] {
    #[inline]
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        Ok(&self[..n_bytes.min(self.len())])
    }

    #[inline]
    fn fill_exact(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let Some(src) = self.get(..n_bytes) else {
            return Err(read_size_limit(n_bytes));
        };
        Ok(src)
    }

    #[inline]
    fn consume(&mut self, amt: usize) -> ReadResult<()> {
        let Some(rest) = self.get(amt..) else {
            return Err(read_size_limit(amt));
        };
        *self = rest;
        Ok(())
    }
}

/// Get a slice of `len` bytes for writing, advancing the writer by `len` bytes, or
/// returning an error if the input slice does not have at least `len` bytes remaining.
#[inline]
fn advance_slice_mut_checked<'a>(
    input: &mut &'a mut [u8],
    len: usize,
) -> WriteResult<&'a mut [u8]> {
    if input.len() < len {
        return Err(write_size_limit(len));
    }
    let (dst, rest) = mem::take(input).split_at_mut(len);
    *input = rest;
    Ok(dst)
}

impl Writer for &mut [u8] {
    #[inline]
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        let dst = advance_slice_mut_checked(self, src.len())?;
        dst.copy_from_slice(src);
        Ok(())
    }
}
