//! [`Reader`] and [`Writer`] implementations.
//!
//! Both traits are object safe: the engine and custom [`Codec`](crate::codec::Codec)s
//! operate on `&mut dyn Reader` / `&mut dyn Writer`, so a codec chosen at schema build
//! time never has to be generic over the stream.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Attempting to read {0} bytes")]
    ReadSizeLimit(usize),
    #[error("Attempting to read {needed} bytes with {remaining} bytes left in the frame")]
    FrameBoundary { needed: usize, remaining: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ReadResult<T> = core::result::Result<T, ReadError>;

#[cold]
pub const fn read_size_limit(len: usize) -> ReadError {
    ReadError::ReadSizeLimit(len)
}

#[cold]
pub const fn frame_boundary(needed: usize, remaining: usize) -> ReadError {
    ReadError::FrameBoundary { needed, remaining }
}

/// Trait for structured reading of bytes from a source.
///
/// # Advancement semantics
/// - `fill_*` and [`Reader::peek`] never advance.
/// - [`Reader::consume`] and [`Reader::read_exact`] advance by the number of bytes read.
pub trait Reader {
    /// Return up to `n_bytes` from the internal buffer without advancing. Implementations may
    /// read more data internally to satisfy future requests. Returns fewer than `n_bytes` at EOF.
    ///
    /// This is _not_ required to return exactly `n_bytes`, it is required to return _up to_ `n_bytes`.
    /// Use [`Reader::fill_exact`] if you need exactly `n_bytes`.
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]>;

    /// Return exactly `n_bytes` without advancing.
    ///
    /// Errors if the source cannot provide enough bytes.
    fn fill_exact(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        let src = self.fill_buf(n_bytes)?;
        if src.len() != n_bytes {
            return Err(read_size_limit(n_bytes));
        }
        Ok(src)
    }

    /// Advance the reader exactly `amt` bytes, returning an error if the source does not have enough bytes.
    fn consume(&mut self, amt: usize) -> ReadResult<()>;

    /// Return the next byte without advancing.
    ///
    /// May buffer more bytes if necessary. Errors if no bytes remain.
    #[inline]
    fn peek(&mut self) -> ReadResult<u8> {
        self.fill_exact(1).map(|src| src[0])
    }

    /// Copy and consume exactly `dst.len()` bytes from the [`Reader`] into `dst`.
    #[inline]
    fn read_exact(&mut self, dst: &mut [u8]) -> ReadResult<()> {
        let src = self.fill_exact(dst.len())?;
        dst.copy_from_slice(src);
        self.consume(dst.len())
    }
}

impl<R: Reader + ?Sized> Reader for &mut R {
    #[inline]
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        (**self).fill_buf(n_bytes)
    }

    #[inline]
    fn fill_exact(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        (**self).fill_exact(n_bytes)
    }

    #[inline]
    fn consume(&mut self, amt: usize) -> ReadResult<()> {
        (**self).consume(amt)
    }
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Attempting to write {0} bytes")]
    WriteSizeLimit(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cold]
pub const fn write_size_limit(len: usize) -> WriteError {
    WriteError::WriteSizeLimit(len)
}

pub type WriteResult<T> = core::result::Result<T, WriteError>;

/// Trait for structured writing of bytes into a sink.
pub trait Writer {
    /// Finalize the writer by performing any required cleanup or flushing.
    fn finish(&mut self) -> WriteResult<()> {
        Ok(())
    }

    /// Write exactly `src.len()` bytes from the given `src` into the writer.
    fn write(&mut self, src: &[u8]) -> WriteResult<()>;
}

impl<W: Writer + ?Sized> Writer for &mut W {
    #[inline]
    fn finish(&mut self) -> WriteResult<()> {
        (**self).finish()
    }

    #[inline]
    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        (**self).write(src)
    }
}

mod adapter;
mod cursor;
mod frame;
mod slice;
mod vec;
pub use {
    adapter::{ReadAdapter, WriteAdapter},
    cursor::Cursor,
    frame::Frame,
    vec::SizeCounter,
};
