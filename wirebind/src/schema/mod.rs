//! Per-type field layouts.
//!
//! A type opts in by implementing [`Record`], declaring its fields through a
//! [`SchemaBuilder`]. The builder validates the declaration eagerly and produces an immutable
//! [`Schema`], cached per type by a [`SchemaCache`].
//!
//! Records may recurse through list elements and variants, which is how tree-shaped formats
//! are declared. A record that contains itself through composite fields only is rejected
//! with [`SchemaError::CompositionCycle`].
//!
//! # Examples
//!
//! A length- and key-bound polymorphic payload:
//!
//! ```
//! use wirebind::{lens, Record, SchemaBuilder, SchemaError, SubtypeRegistry, Variant};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Ping {
//!     serial: u32,
//! }
//!
//! impl Record for Ping {
//!     fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
//!         schema.int(1, "serial", lens!(Ping, serial));
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Event {
//!     len: u32,
//!     op: u16,
//!     body: Variant,
//! }
//!
//! impl Record for Event {
//!     fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
//!         let registry = SubtypeRegistry::builder("events").register::<Ping>(1u16)?.build();
//!         let len = schema.int(1, "len", lens!(Event, len)).handle();
//!         let op = schema.int(2, "op", lens!(Event, op)).handle();
//!         schema
//!             .subtype(3, "body", lens!(Event, body))
//!             .registry(registry)
//!             .length_from(len)
//!             .key_from(op);
//!         Ok(())
//!     }
//! }
//!
//! let event = Event { len: 0, op: 0, body: Variant::new(Ping { serial: 7 }) };
//! let bytes = wirebind::serialize(&event)?;
//! assert_eq!(bytes, [0, 0, 0, 4, 0, 1, 0, 0, 0, 7]);
//! # Ok::<(), wirebind::Error>(())
//! ```
use {
    crate::{
        binding::{Binding, Relation},
        codec::{Codec, BytesEncoding, Endian, StringEncoding, TypeTag},
        error::SchemaError,
        subtype::{SubtypeRegistry, Variant},
    },
    core::{
        any::{Any, TypeId},
        fmt,
    },
    hashbrown::HashMap,
    std::sync::Arc,
};

mod access;
mod builder;
mod cache;
pub use {
    access::Lens,
    builder::{FieldDecl, FieldRef, SchemaBuilder},
    cache::SchemaCache,
};
pub(crate) use {
    access::{CustomValue, FieldAccess, IntSeq, IntValue, RecordSeq, RecordValue},
    cache::{Edge, NestedSchema, SchemaResolver},
};

/// A type with a declared wire layout.
pub trait Record: Any + Default + Send + Sync {
    /// Declare the fields of `Self`.
    ///
    /// Declaration problems are reported when the builder finishes, so this only fails for
    /// errors raised by the implementation itself (for example building a
    /// [`SubtypeRegistry`]).
    fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError>;
}

/// Encoding strategy of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Int,
    String(StringEncoding),
    Bytes(BytesEncoding),
    Composite,
    List,
    IntList,
    Subtype,
    Custom,
}

pub(crate) enum Strategy {
    Int(Box<dyn IntValue>),
    String {
        access: Box<dyn FieldAccess<String>>,
        encoding: StringEncoding,
    },
    Bytes {
        access: Box<dyn FieldAccess<Vec<u8>>>,
        encoding: BytesEncoding,
    },
    Composite {
        access: Box<dyn RecordValue>,
        schema: NestedSchema,
    },
    List {
        access: Box<dyn RecordSeq>,
        schema: NestedSchema,
    },
    IntList(Box<dyn IntSeq>),
    Subtype {
        access: Box<dyn FieldAccess<Variant>>,
        registry: Arc<SubtypeRegistry>,
        payload: VariantPayload,
    },
    Custom {
        access: Box<dyn CustomValue>,
        codec: Arc<dyn Codec>,
        tag: TypeTag,
        count: Option<fn(&dyn Any) -> Option<usize>>,
    },
}

/// How the payload of a subtype field is encoded.
pub(crate) enum VariantPayload {
    Codec(Arc<dyn Codec>),
    Schemas(HashMap<TypeId, NestedSchema>),
}

impl Strategy {
    fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Int(_) => StrategyKind::Int,
            Strategy::String { encoding, .. } => StrategyKind::String(*encoding),
            Strategy::Bytes { encoding, .. } => StrategyKind::Bytes(*encoding),
            Strategy::Composite { .. } => StrategyKind::Composite,
            Strategy::List { .. } => StrategyKind::List,
            Strategy::IntList(_) => StrategyKind::IntList,
            Strategy::Subtype { .. } => StrategyKind::Subtype,
            Strategy::Custom { .. } => StrategyKind::Custom,
        }
    }
}

/// One field of a [`Schema`].
pub struct FieldDescriptor {
    pub(crate) order: u16,
    pub(crate) name: &'static str,
    pub(crate) endian: Endian,
    pub(crate) bindings: Vec<Binding>,
    /// Set on integers that are the target of a binding.
    pub(crate) bound_by: Option<(usize, Relation)>,
    pub(crate) strategy: Strategy,
}

impl FieldDescriptor {
    pub const fn order(&self) -> u16 {
        self.order
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn endian(&self) -> Endian {
        self.endian
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Bindings declared on this field, when it is the measured side.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The measured field and relation, when this integer is bound.
    pub const fn bound_by(&self) -> Option<(usize, Relation)> {
        self.bound_by
    }

    /// This field's binding for `relation`, if declared.
    pub fn binding(&self, relation: Relation) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.relation == relation)
    }

    pub(crate) fn int_value(&self) -> Option<&dyn IntValue> {
        match &self.strategy {
            Strategy::Int(access) => Some(access.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("order", &self.order)
            .field("name", &self.name)
            .field("strategy", &self.strategy())
            .field("endian", &self.endian)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Immutable, ordered field table of one record type.
pub struct Schema {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in wire order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

#[cfg(test)]
mod tests;
