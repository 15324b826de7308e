//! Fixed-width integer encoding and byte order.
//!
//! Every integer that crosses the wire is normalized to its raw bit pattern in a `u64`
//! ("bits"), zero-extended from its declared width. Bound lengths and counts are carried
//! through the engine in this form. Subtype keys are compared by numeric value instead, so
//! they are re-encoded at the width of the discriminator they are written to.
use {
    crate::io::{ReadResult, Reader, WriteResult, Writer},
    core::fmt::Debug,
};

/// Byte order of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Network byte order; the schema default.
    #[default]
    Big,
    Little,
}

/// Integer types that can be written as fixed-width scalars and used as bound fields.
///
/// Implemented for `u8..=u64` and `i8..=i64`. Implement it for a fieldless enum to use the
/// enum directly as a discriminator:
///
/// ```
/// use wirebind::codec::Integer;
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// enum OpCode {
///     #[default]
///     Ping = 1,
///     Pong = 2,
/// }
///
/// impl Integer for OpCode {
///     const WIDTH: usize = 2;
///
///     fn to_bits(self) -> u64 {
///         self as u64
///     }
///
///     fn from_bits(bits: u64) -> Option<Self> {
///         match bits {
///             1 => Some(OpCode::Ping),
///             2 => Some(OpCode::Pong),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Integer: Copy + Default + Debug + Send + Sync + 'static {
    /// Encoded width in bytes. Must be 1, 2, 4 or 8.
    const WIDTH: usize;

    /// Raw bit pattern, truncated to [`Integer::WIDTH`] bytes.
    fn to_bits(self) -> u64;

    /// Rebuild a value from a raw bit pattern of [`Integer::WIDTH`] bytes.
    ///
    /// Returns `None` for patterns the type cannot represent.
    fn from_bits(bits: u64) -> Option<Self>;

    /// Numeric value. Signed types sign-extend.
    #[inline]
    fn to_i128(self) -> i128 {
        i128::from(self.to_bits())
    }

    /// Bit pattern for a numeric value, if the type can represent it.
    #[inline]
    fn value_to_bits(value: i128) -> Option<u64> {
        let bits = u64::try_from(value).ok()?;
        (bits <= max_unsigned(Self::WIDTH) && Self::from_bits(bits).is_some()).then_some(bits)
    }

    /// Interpret a bit pattern as a length or element count.
    #[inline]
    fn bits_to_count(bits: u64) -> Option<usize> {
        usize::try_from(bits).ok()
    }

    /// Bit pattern for a length or element count, if it fits in [`Integer::WIDTH`] bytes.
    #[inline]
    fn count_to_bits(count: usize) -> Option<u64> {
        let bits = u64::try_from(count).ok()?;
        (bits <= max_unsigned(Self::WIDTH)).then_some(bits)
    }
}

/// Largest unsigned value representable in `width` bytes.
#[inline]
pub(crate) const fn max_unsigned(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Integer for $ty {
                const WIDTH: usize = size_of::<$ty>();

                #[inline]
                fn to_bits(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn from_bits(bits: u64) -> Option<Self> {
                    <$ty>::try_from(bits).ok()
                }
            }
        )*
    };
}

macro_rules! impl_signed {
    ($($ty:ty => $unsigned:ty),*) => {
        $(
            impl Integer for $ty {
                const WIDTH: usize = size_of::<$ty>();

                #[inline]
                fn to_bits(self) -> u64 {
                    self as $unsigned as u64
                }

                #[inline]
                fn from_bits(bits: u64) -> Option<Self> {
                    <$unsigned>::try_from(bits).ok().map(|raw| raw as $ty)
                }

                #[inline]
                fn to_i128(self) -> i128 {
                    i128::from(self)
                }

                #[inline]
                fn value_to_bits(value: i128) -> Option<u64> {
                    <$ty>::try_from(value).ok().map(Self::to_bits)
                }

                #[inline]
                fn bits_to_count(bits: u64) -> Option<usize> {
                    let value = Self::from_bits(bits)?;
                    usize::try_from(value).ok()
                }

                #[inline]
                fn count_to_bits(count: usize) -> Option<u64> {
                    <$ty>::try_from(count).ok().map(Self::to_bits)
                }
            }
        )*
    };
}

impl_unsigned!(u8, u16, u32, u64);
impl_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);

/// Write the low `width` bytes of `bits` in the given byte order.
#[inline]
pub fn encode_bits(
    writer: &mut dyn Writer,
    bits: u64,
    width: usize,
    endian: Endian,
) -> WriteResult<()> {
    writer.write(&bits_to_bytes(bits, width, endian)[..width])
}

/// Serialize the low `width` bytes of `bits` into the front of an 8 byte buffer.
#[inline]
pub(crate) fn bits_to_bytes(bits: u64, width: usize, endian: Endian) -> [u8; 8] {
    let mut out = [0u8; 8];
    match endian {
        Endian::Big => out[..width].copy_from_slice(&bits.to_be_bytes()[8 - width..]),
        Endian::Little => out[..width].copy_from_slice(&bits.to_le_bytes()[..width]),
    }
    out
}

/// Read `width` bytes in the given byte order, zero-extended into a `u64`.
#[inline]
pub fn decode_bits(reader: &mut dyn Reader, width: usize, endian: Endian) -> ReadResult<u64> {
    let mut raw = [0u8; 8];
    match endian {
        Endian::Big => {
            reader.read_exact(&mut raw[8 - width..])?;
            Ok(u64::from_be_bytes(raw))
        }
        Endian::Little => {
            reader.read_exact(&mut raw[..width])?;
            Ok(u64::from_le_bytes(raw))
        }
    }
}
