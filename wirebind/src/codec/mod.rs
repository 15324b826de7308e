//! Pluggable field codecs.
//!
//! A [`Codec`] replaces the default encoding strategy of a single field. Codecs are chosen
//! once, when a schema is built, and are driven through `&mut dyn Writer` / `&mut dyn Reader`
//! so that one codec instance can serve every stream type.
//!
//! When a field is length-bound, its codec sees a [`Frame`](crate::io::Frame) holding exactly
//! the declared number of bytes, and must consume all of them.
use {
    crate::{
        error::BoxError,
        io::{Reader, Writer},
    },
    core::any::{type_name, Any, TypeId},
    std::{
        collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
        sync::Arc,
    },
    thiserror::Error,
};

mod int;
mod string;
pub use {
    int::{decode_bits, encode_bits, Endian, Integer},
    string::{BytesEncoding, StringEncoding},
};
pub(crate) use {
    int::bits_to_bytes,
    string::{decode_bytes, decode_string, encode_bytes, encode_string},
};

/// Runtime identity of the type a codec is asked to produce.
///
/// Polymorphic fields hand the codec the tag of the variant selected by the discriminator.
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub const fn id(&self) -> TypeId {
        self.id
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

/// Type-erased field codec.
pub trait Codec: Send + Sync {
    /// Write `value` to `writer`.
    fn encode(&self, writer: &mut dyn Writer, value: &dyn Any) -> Result<(), BoxError>;

    /// Read a value of the type identified by `tag`.
    fn decode(
        &self,
        reader: &mut dyn Reader,
        tag: TypeTag,
    ) -> Result<Box<dyn Any + Send + Sync>, BoxError>;
}

impl<C: Codec + ?Sized> Codec for Arc<C> {
    fn encode(&self, writer: &mut dyn Writer, value: &dyn Any) -> Result<(), BoxError> {
        (**self).encode(writer, value)
    }

    fn decode(
        &self,
        reader: &mut dyn Reader,
        tag: TypeTag,
    ) -> Result<Box<dyn Any + Send + Sync>, BoxError> {
        (**self).decode(reader, tag)
    }
}

/// Statically typed codec for a single value type.
///
/// Wrap it in [`Typed`] to register it on a field.
///
/// ```
/// use wirebind::{codec::{Typed, TypedCodec}, io::{Reader, Writer}, BoxError};
///
/// struct Ascii;
///
/// impl TypedCodec for Ascii {
///     type Value = String;
///
///     fn encode(&self, writer: &mut dyn Writer, value: &String) -> Result<(), BoxError> {
///         writer.write(value.as_bytes())?;
///         Ok(())
///     }
///
///     fn decode(&self, reader: &mut dyn Reader) -> Result<String, BoxError> {
///         let bytes = reader.fill_buf(usize::MAX)?.to_vec();
///         reader.consume(bytes.len())?;
///         Ok(String::from_utf8(bytes)?)
///     }
/// }
///
/// let codec = Typed(Ascii);
/// # let _ = codec;
/// ```
pub trait TypedCodec: Send + Sync {
    type Value: Any + Send + Sync;

    fn encode(&self, writer: &mut dyn Writer, value: &Self::Value) -> Result<(), BoxError>;

    fn decode(&self, reader: &mut dyn Reader) -> Result<Self::Value, BoxError>;
}

/// Adapts a [`TypedCodec`] to the erased [`Codec`] interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Typed<C>(pub C);

/// A codec was handed, or produced, a value of an unexpected type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Expected a value of type `{expected}`")]
pub struct UnexpectedType {
    pub expected: &'static str,
}

impl<C: TypedCodec> Codec for Typed<C> {
    fn encode(&self, writer: &mut dyn Writer, value: &dyn Any) -> Result<(), BoxError> {
        let value = value.downcast_ref::<C::Value>().ok_or(UnexpectedType {
            expected: type_name::<C::Value>(),
        })?;
        self.0.encode(writer, value)
    }

    fn decode(
        &self,
        reader: &mut dyn Reader,
        tag: TypeTag,
    ) -> Result<Box<dyn Any + Send + Sync>, BoxError> {
        if !tag.is::<C::Value>() {
            return Err(UnexpectedType {
                expected: type_name::<C::Value>(),
            }
            .into());
        }
        Ok(Box::new(self.0.decode(reader)?))
    }
}

/// Collections whose element count can be the measured side of a count binding.
pub trait ElementCount {
    fn element_count(&self) -> usize;
}

macro_rules! impl_element_count_len {
    ($($ty:ty => [$($generics:tt)*]),* $(,)?) => {
        $(
            impl<$($generics)*> ElementCount for $ty {
                #[inline]
                fn element_count(&self) -> usize {
                    self.len()
                }
            }
        )*
    };
}

impl_element_count_len!(
    Vec<T> => [T],
    VecDeque<T> => [T],
    BTreeSet<T> => [T],
    BTreeMap<K, V> => [K, V],
    HashSet<T, S> => [T, S],
    HashMap<K, V, S> => [K, V, S],
);

/// Counts characters, not bytes.
impl ElementCount for String {
    #[inline]
    fn element_count(&self) -> usize {
        self.chars().count()
    }
}

/// Element count of an erased value known to be an `F`.
pub(crate) fn count_of<F: ElementCount + Any>(value: &dyn Any) -> Option<usize> {
    value.downcast_ref::<F>().map(F::element_count)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::io::Frame};

    struct Upper;

    impl TypedCodec for Upper {
        type Value = String;

        fn encode(&self, writer: &mut dyn Writer, value: &String) -> Result<(), BoxError> {
            writer.write(value.to_uppercase().as_bytes())?;
            Ok(())
        }

        fn decode(&self, reader: &mut dyn Reader) -> Result<String, BoxError> {
            let bytes = reader.fill_buf(usize::MAX)?.to_vec();
            reader.consume(bytes.len())?;
            Ok(String::from_utf8(bytes)?)
        }
    }

    #[test]
    fn typed_adapter_roundtrip() {
        let codec = Typed(Upper);
        let mut buf = Vec::new();
        codec.encode(&mut buf, &String::from("ping")).unwrap();
        assert_eq!(buf, b"PING");
        let decoded = codec.decode(&mut Frame::new(&buf), TypeTag::of::<String>()).unwrap();
        assert_eq!(decoded.downcast_ref::<String>().map(String::as_str), Some("PING"));
    }

    #[test]
    fn typed_adapter_rejects_wrong_type() {
        let codec = Typed(Upper);
        let err = codec.encode(&mut Vec::new(), &7u32).unwrap_err();
        assert!(err.downcast_ref::<UnexpectedType>().is_some());
        let err = codec.decode(&mut Frame::new(&[]), TypeTag::of::<u32>()).unwrap_err();
        assert!(err.downcast_ref::<UnexpectedType>().is_some());
    }

    #[test]
    fn element_counts() {
        let map: BTreeMap<&str, u8> = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(map.element_count(), 2);
        assert_eq!(String::from("héllo").element_count(), 5);
        assert_eq!(count_of::<Vec<u8>>(&vec![1u8, 2, 3]), Some(3));
        assert_eq!(count_of::<Vec<u8>>(&1u8), None);
    }

    #[test]
    fn type_tags_compare_by_id() {
        assert_eq!(TypeTag::of::<u8>(), TypeTag::of::<u8>());
        assert_ne!(TypeTag::of::<u8>(), TypeTag::of::<i8>());
        assert!(TypeTag::of::<String>().is::<String>());
    }
}
