use {
    super::*,
    std::io::{self, Read, Write},
};

const READ_CHUNK: usize = 8 << 10; // 8 KiB

/// [`Reader`] over any [`std::io::Read`] source.
///
/// Bytes are buffered internally so that [`Reader::fill_exact`] can hand out a contiguous
/// window. The source is read in fixed chunks, so an open-ended request such as
/// `fill_buf(usize::MAX)` buffers up to the end of the source.
#[derive(Debug)]
pub struct ReadAdapter<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> ReadAdapter<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Consumes the adapter, returning the inner source. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Pull from the source until `n_bytes` are buffered or the source is exhausted.
    fn buffer_at_least(&mut self, n_bytes: usize) -> io::Result<()> {
        if self.pos > 0 && self.buf.len() - self.pos < n_bytes {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        while self.buf.len() - self.pos < n_bytes {
            let start = self.buf.len();
            self.buf.resize(start + READ_CHUNK, 0);
            let read = self.inner.read(&mut self.buf[start..]);
            let read = match read {
                Ok(read) => read,
                Err(e) => {
                    self.buf.truncate(start);
                    if e.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(e);
                }
            };
            self.buf.truncate(start + read);
            if read == 0 {
                break;
            }
        }
        Ok(())
    }
}

impl<R: Read> Reader for ReadAdapter<R> {
    fn fill_buf(&mut self, n_bytes: usize) -> ReadResult<&[u8]> {
        self.buffer_at_least(n_bytes)?;
        let src = &self.buf[self.pos..];
        Ok(&src[..n_bytes.min(src.len())])
    }

    fn consume(&mut self, amt: usize) -> ReadResult<()> {
        self.buffer_at_least(amt)?;
        if self.buf.len() - self.pos < amt {
            return Err(read_size_limit(amt));
        }
        self.pos += amt;
        Ok(())
    }
}

/// [`Writer`] over any [`std::io::Write`] sink. [`Writer::finish`] flushes the sink.
#[derive(Debug)]
pub struct WriteAdapter<W> {
    inner: W,
}

impl<W: Write> WriteAdapter<W> {
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Writer for WriteAdapter<W> {
    fn finish(&mut self) -> WriteResult<()> {
        Ok(self.inner.flush()?)
    }

    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        Ok(self.inner.write_all(src)?)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    /// Hands out at most one byte per `read` call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some((first, rest)) = self.0.split_first() else {
                return Ok(0);
            };
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = *first;
            self.0 = rest;
            Ok(1)
        }
    }

    #[test]
    fn read_adapter_reports_short_source() {
        let mut reader = ReadAdapter::new(Trickle(&[1, 2]));
        assert!(matches!(reader.fill_exact(3), Err(ReadError::ReadSizeLimit(3))));
        assert_eq!(reader.fill_exact(2).unwrap(), &[1, 2]);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn read_adapter_reassembles_trickled_input(
            bytes in proptest::collection::vec(any::<u8>(), 0..=256),
            split in 0usize..=256,
        ) {
            let mut reader = ReadAdapter::new(Trickle(&bytes));
            let split = split.min(bytes.len());
            let mut head = vec![0; split];
            reader.read_exact(&mut head).unwrap();
            let mut tail = vec![0; bytes.len() - split];
            reader.read_exact(&mut tail).unwrap();
            head.extend(tail);
            prop_assert_eq!(head, bytes);
        }

        #[test]
        fn write_adapter_writes_through(bytes in proptest::collection::vec(any::<u8>(), 0..=256)) {
            let mut writer = WriteAdapter::new(Vec::new());
            writer.write(&bytes).unwrap();
            writer.finish().unwrap();
            prop_assert_eq!(writer.into_inner(), bytes);
        }
    }
}
