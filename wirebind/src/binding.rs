//! Cross-field numeric bindings.
//!
//! A binding ties a *measured* field (a payload) to a *bound* integer field declared earlier
//! in the same schema. The integer is never trusted on the write path: the engine reserves a
//! placeholder for it, encodes the payload, and patches the placeholder with what it actually
//! measured. On the read path the integer is read first and used to frame the payload.
use {
    crate::{
        error::{binding_overflow, Result},
        schema::IntValue,
    },
    core::fmt,
};

/// What a bound integer records about its measured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Encoded size of the measured field, in bytes.
    ByteLength,
    /// Number of elements in the measured collection.
    ElementCount,
    /// Subtype map key of the measured field's runtime type.
    SubtypeKey,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::ByteLength => f.write_str("byte-length"),
            Relation::ElementCount => f.write_str("element-count"),
            Relation::SubtypeKey => f.write_str("subtype-key"),
        }
    }
}

/// A resolved binding on a measured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub(crate) relation: Relation,
    pub(crate) target: usize,
    pub(crate) target_name: &'static str,
}

impl Binding {
    pub const fn relation(&self) -> Relation {
        self.relation
    }

    /// Position of the bound integer in [`Schema::fields`](crate::schema::Schema::fields).
    pub const fn target(&self) -> usize {
        self.target
    }

    pub const fn target_name(&self) -> &'static str {
        self.target_name
    }
}

/// What the engine observed while encoding a measured field.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Measurement {
    pub bytes: usize,
    pub elements: Option<usize>,
    pub key: Option<i128>,
}

/// Bit pattern to patch into the bound integer for `relation`.
pub(crate) fn measured_bits(
    field: &'static str,
    relation: Relation,
    target: &dyn IntValue,
    measurement: &Measurement,
) -> Result<u64> {
    let count = match relation {
        Relation::ByteLength => measurement.bytes,
        Relation::ElementCount => measurement.elements.unwrap_or_default(),
        Relation::SubtypeKey => {
            let key = measurement.key.unwrap_or_default();
            return target
                .value_to_bits(key)
                .ok_or_else(|| binding_overflow(field, key));
        }
    };
    target
        .count_to_bits(count)
        .ok_or_else(|| binding_overflow(field, count as i128))
}

/// Length or count carried by a bound integer read off the wire.
pub(crate) fn bound_count(field: &'static str, target: &dyn IntValue, bits: u64) -> Result<usize> {
    target
        .bits_to_count(bits)
        .ok_or_else(|| binding_overflow(field, target.to_i128(bits)))
}
