//! Write-side lookahead for bound integers.
//!
//! A bound integer precedes the payload it measures, so its bytes cannot be final when the
//! walker reaches it. [`Staging`] reserves a zeroed placeholder and holds every byte written
//! after it until the placeholder is patched. Bytes pass straight through to the underlying
//! writer whenever no placeholder is pending.
use crate::io::{WriteResult, Writer};

/// Reserved bytes at an absolute output position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub pos: usize,
    pub width: usize,
}

pub(crate) struct Staging<'w> {
    out: &'w mut dyn Writer,
    /// Bytes handed to `out` so far.
    flushed: usize,
    pending: Vec<u8>,
    holes: usize,
}

impl<'w> Staging<'w> {
    pub(crate) fn new(out: &'w mut dyn Writer) -> Self {
        Self {
            out,
            flushed: 0,
            pending: Vec::new(),
            holes: 0,
        }
    }

    /// Total bytes written through this stage, flushed or not.
    pub(crate) fn position(&self) -> usize {
        self.flushed + self.pending.len()
    }

    pub(crate) fn reserve(&mut self, width: usize) -> Placeholder {
        let placeholder = Placeholder {
            pos: self.position(),
            width,
        };
        self.pending.resize(self.pending.len() + width, 0);
        self.holes += 1;
        placeholder
    }

    /// Fill a placeholder. Flushes the staged bytes once nothing is pending.
    ///
    /// `bytes` must be exactly `placeholder.width` long.
    pub(crate) fn patch(&mut self, placeholder: Placeholder, bytes: &[u8]) -> WriteResult<()> {
        let start = placeholder.pos - self.flushed;
        self.pending[start..start + placeholder.width].copy_from_slice(bytes);
        self.holes -= 1;
        if self.holes == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> WriteResult<()> {
        if !self.pending.is_empty() {
            self.out.write(&self.pending)?;
            self.flushed += self.pending.len();
            self.pending.clear();
        }
        Ok(())
    }
}

impl Writer for Staging<'_> {
    fn finish(&mut self) -> WriteResult<()> {
        self.flush()?;
        self.out.finish()
    }

    fn write(&mut self, src: &[u8]) -> WriteResult<()> {
        if self.holes == 0 {
            self.out.write(src)?;
            self.flushed += src.len();
        } else {
            self.pending.extend_from_slice(src);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    #[test]
    fn bytes_after_a_hole_are_held_back() {
        let mut out = Vec::new();
        let mut stage = Staging::new(&mut out);
        stage.write(&[0xaa]).unwrap();
        let hole = stage.reserve(2);
        stage.write(&[1, 2, 3]).unwrap();
        assert_eq!(stage.position(), 6);
        stage.patch(hole, &[0, 3]).unwrap();
        stage.write(&[0xbb]).unwrap();
        stage.finish().unwrap();
        assert_eq!(out, [0xaa, 0, 3, 1, 2, 3, 0xbb]);
    }

    #[test]
    fn nested_holes_flush_when_outermost_resolves() {
        let mut out = Vec::new();
        let mut stage = Staging::new(&mut out);
        let outer = stage.reserve(1);
        let inner = stage.reserve(1);
        stage.write(&[7]).unwrap();
        stage.patch(inner, &[1]).unwrap();
        stage.write(&[8]).unwrap();
        stage.patch(outer, &[3]).unwrap();
        drop(stage);
        assert_eq!(out, [3, 1, 7, 8]);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn position_counts_every_byte(
            chunks in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..=16),
                0..=8,
            ),
        ) {
            let mut out = Vec::new();
            let mut stage = Staging::new(&mut out);
            let hole = stage.reserve(4);
            for chunk in &chunks {
                stage.write(chunk).unwrap();
            }
            let total: usize = chunks.iter().map(Vec::len).sum();
            prop_assert_eq!(stage.position(), total + 4);
            stage.patch(hole, &(total as u32).to_be_bytes()).unwrap();
            drop(stage);
            prop_assert_eq!(&out[..4], &(total as u32).to_be_bytes());
            prop_assert_eq!(out.len(), total + 4);
        }
    }
}
