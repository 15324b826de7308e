//! Typed field accessors and their type-erased views.
//!
//! A [`Lens`] is declared against the concrete record type. Once a schema is built, the
//! engine only sees the record as `dyn Any`, so each strategy reaches its field through one
//! of the object-safe traits below; every one of them downcasts the owner first and returns
//! `None` when handed a record of the wrong type.
use {
    super::Record,
    crate::{
        codec::{decode_bits, encode_bits, Endian, Integer},
        error::{invalid_value, preallocation_size_limit, read_error, type_mismatch, Result},
        io::{Reader, Writer},
    },
    core::any::{type_name, Any},
};

/// Getter/setter pair for one field of `T`.
///
/// Usually created with [`lens!`](crate::lens).
pub struct Lens<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> Lens<T, F> {
    pub const fn new(get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self {
        Self { get, get_mut }
    }

    #[inline]
    pub fn get<'a>(&self, owner: &'a T) -> &'a F {
        (self.get)(owner)
    }

    #[inline]
    pub fn get_mut<'a>(&self, owner: &'a mut T) -> &'a mut F {
        (self.get_mut)(owner)
    }
}

impl<T, F> Clone for Lens<T, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, F> Copy for Lens<T, F> {}

/// Build a [`Lens`] for a named field.
///
/// ```
/// use wirebind::{lens, schema::Lens};
///
/// #[derive(Default)]
/// struct Ping {
///     serial: u32,
/// }
///
/// let serial: Lens<Ping, u32> = lens!(Ping, serial);
/// let mut ping = Ping::default();
/// *serial.get_mut(&mut ping) = 7;
/// assert_eq!(*serial.get(&ping), 7);
/// ```
#[macro_export]
macro_rules! lens {
    ($ty:ty, $field:tt) => {
        $crate::schema::Lens::<$ty, _>::new(|owner| &owner.$field, |owner| &mut owner.$field)
    };
}

pub(crate) trait FieldAccess<F>: Send + Sync {
    fn field<'a>(&self, owner: &'a dyn Any) -> Option<&'a F>;
    fn field_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut F>;
}

impl<T: Any, F: Any> FieldAccess<F> for Lens<T, F> {
    #[inline]
    fn field<'a>(&self, owner: &'a dyn Any) -> Option<&'a F> {
        owner.downcast_ref::<T>().map(self.get)
    }

    #[inline]
    fn field_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut F> {
        owner.downcast_mut::<T>().map(self.get_mut)
    }
}

/// Integer field seen through its raw bit pattern.
pub(crate) trait IntValue: Send + Sync {
    fn width(&self) -> usize;
    fn get(&self, owner: &dyn Any) -> Option<u64>;
    /// `None` if `owner` has the wrong type, `Some(false)` if the integer type rejects `bits`.
    fn set(&self, owner: &mut dyn Any, bits: u64) -> Option<bool>;
    fn bits_to_count(&self, bits: u64) -> Option<usize>;
    fn count_to_bits(&self, count: usize) -> Option<u64>;
    fn to_i128(&self, bits: u64) -> i128;
    fn value_to_bits(&self, value: i128) -> Option<u64>;
}

impl<T: Any, I: Integer> IntValue for Lens<T, I> {
    #[inline]
    fn width(&self) -> usize {
        I::WIDTH
    }

    #[inline]
    fn get(&self, owner: &dyn Any) -> Option<u64> {
        owner.downcast_ref::<T>().map(|owner| self.get(owner).to_bits())
    }

    #[inline]
    fn set(&self, owner: &mut dyn Any, bits: u64) -> Option<bool> {
        let owner = owner.downcast_mut::<T>()?;
        Some(match I::from_bits(bits) {
            Some(value) => {
                *self.get_mut(owner) = value;
                true
            }
            None => false,
        })
    }

    #[inline]
    fn bits_to_count(&self, bits: u64) -> Option<usize> {
        I::bits_to_count(bits)
    }

    #[inline]
    fn count_to_bits(&self, count: usize) -> Option<u64> {
        I::count_to_bits(count)
    }

    fn to_i128(&self, bits: u64) -> i128 {
        I::from_bits(bits).map_or(i128::from(bits), I::to_i128)
    }

    #[inline]
    fn value_to_bits(&self, value: i128) -> Option<u64> {
        I::value_to_bits(value)
    }
}

/// Nested record field.
pub(crate) trait RecordValue: Send + Sync {
    fn record<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;
    fn record_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

impl<T: Any, R: Record> RecordValue for Lens<T, R> {
    fn record<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        owner
            .downcast_ref::<T>()
            .map(|owner| self.get(owner) as &dyn Any)
    }

    fn record_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        owner
            .downcast_mut::<T>()
            .map(|owner| self.get_mut(owner) as &mut dyn Any)
    }
}

/// `Vec` of nested records.
pub(crate) trait RecordSeq: Send + Sync {
    fn len(&self, owner: &dyn Any) -> Option<usize>;
    fn element<'a>(&self, owner: &'a dyn Any, index: usize) -> Option<&'a dyn Any>;
    /// Clear the sequence and reserve room for `capacity` elements.
    fn reset(&self, owner: &mut dyn Any, capacity: usize) -> Option<()>;
    /// Append a default element and return it for decoding in place.
    fn push_default<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
    fn element_size(&self) -> usize;
}

impl<T: Any, R: Record> RecordSeq for Lens<T, Vec<R>> {
    fn len(&self, owner: &dyn Any) -> Option<usize> {
        owner.downcast_ref::<T>().map(|owner| self.get(owner).len())
    }

    fn element<'a>(&self, owner: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<T>()?;
        self.get(owner).get(index).map(|elem| elem as &dyn Any)
    }

    fn reset(&self, owner: &mut dyn Any, capacity: usize) -> Option<()> {
        let seq = self.get_mut(owner.downcast_mut::<T>()?);
        seq.clear();
        seq.reserve_exact(capacity);
        Some(())
    }

    fn push_default<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let seq = self.get_mut(owner.downcast_mut::<T>()?);
        seq.push(R::default());
        seq.last_mut().map(|elem| elem as &mut dyn Any)
    }

    fn element_size(&self) -> usize {
        size_of::<R>()
    }
}

/// `Vec` of integers, encoded back to back.
pub(crate) trait IntSeq: Send + Sync {
    fn len(&self, owner: &dyn Any) -> Option<usize>;
    /// Returns the number of elements written.
    fn encode(&self, owner: &dyn Any, writer: &mut dyn Writer, endian: Endian) -> Result<usize>;
    fn decode(
        &self,
        owner: &mut dyn Any,
        reader: &mut dyn Reader,
        field: &'static str,
        count: usize,
        endian: Endian,
        limit: usize,
    ) -> Result<()>;
}

impl<T: Any, I: Integer> IntSeq for Lens<T, Vec<I>> {
    fn len(&self, owner: &dyn Any) -> Option<usize> {
        owner.downcast_ref::<T>().map(|owner| self.get(owner).len())
    }

    fn encode(&self, owner: &dyn Any, writer: &mut dyn Writer, endian: Endian) -> Result<usize> {
        let owner = owner
            .downcast_ref::<T>()
            .ok_or_else(|| type_mismatch(type_name::<T>()))?;
        let seq = self.get(owner);
        for value in seq {
            encode_bits(writer, value.to_bits(), I::WIDTH, endian)?;
        }
        Ok(seq.len())
    }

    fn decode(
        &self,
        owner: &mut dyn Any,
        reader: &mut dyn Reader,
        field: &'static str,
        count: usize,
        endian: Endian,
        limit: usize,
    ) -> Result<()> {
        let owner = owner
            .downcast_mut::<T>()
            .ok_or_else(|| type_mismatch(type_name::<T>()))?;
        let needed = count
            .checked_mul(size_of::<I>())
            .ok_or_else(|| preallocation_size_limit(usize::MAX, limit))?;
        if needed > limit {
            return Err(preallocation_size_limit(needed, limit));
        }
        let seq = self.get_mut(owner);
        seq.clear();
        seq.reserve_exact(count);
        for _ in 0..count {
            let bits = decode_bits(reader, I::WIDTH, endian).map_err(|e| read_error(field, e))?;
            let value = I::from_bits(bits)
                .ok_or_else(|| invalid_value(field, "element is not a valid value of its type"))?;
            seq.push(value);
        }
        Ok(())
    }
}

/// Field handled entirely by a custom codec.
pub(crate) trait CustomValue: Send + Sync {
    fn value<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;
    /// `None` if `owner` has the wrong type, `Some(false)` if `value` does.
    fn replace(&self, owner: &mut dyn Any, value: Box<dyn Any + Send + Sync>) -> Option<bool>;
}

impl<T: Any, F: Any> CustomValue for Lens<T, F> {
    fn value<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        owner
            .downcast_ref::<T>()
            .map(|owner| self.get(owner) as &dyn Any)
    }

    fn replace(&self, owner: &mut dyn Any, value: Box<dyn Any + Send + Sync>) -> Option<bool> {
        let owner = owner.downcast_mut::<T>()?;
        Some(match value.downcast::<F>() {
            Ok(value) => {
                *self.get_mut(owner) = *value;
                true
            }
            Err(_) => false,
        })
    }
}
