//! wirebind maps typed record graphs to exact binary wire layouts and back.
//!
//! Each record type declares its layout once, through [`Record::layout`]: the order of its
//! fields, how each one is encoded, and how fields depend on one another. The [`Engine`]
//! walks that layout to serialize and deserialize values.
//!
//! # Bindings
//!
//! Wire formats routinely carry numbers that describe other fields: a payload length, an
//! element count, a discriminator that selects the payload's type. wirebind models these
//! as *bindings* from the payload to an earlier integer field. On serialize, the integer is
//! always recomputed from the payload as written, so a stale value set by the caller never
//! reaches the wire. On deserialize, the integer frames the payload: a length-bound field
//! must consume exactly the declared number of bytes.
//!
//! # Example
//!
//! A frame with a 4 byte payload length and a 2 byte opcode selecting the payload type:
//!
//! ```
//! use wirebind::{lens, Engine, Record, SchemaBuilder, SchemaError, SubtypeRegistry, Variant};
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
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Pong {
//!     serial: u32,
//!     time: u64,
//! }
//!
//! impl Record for Pong {
//!     fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
//!         schema.int(1, "serial", lens!(Pong, serial));
//!         schema.int(2, "time", lens!(Pong, time));
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Event {
//!     data_length: u32,
//!     op_code: u16,
//!     data: Variant,
//! }
//!
//! impl Record for Event {
//!     fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
//!         let events = SubtypeRegistry::builder("events")
//!             .register::<Ping>(1u16)?
//!             .register::<Pong>(2u16)?
//!             .build();
//!         let len = schema.int(1, "data_length", lens!(Event, data_length)).handle();
//!         let op = schema.int(2, "op_code", lens!(Event, op_code)).handle();
//!         schema
//!             .subtype(3, "data", lens!(Event, data))
//!             .registry(events)
//!             .length_from(len)
//!             .key_from(op);
//!         Ok(())
//!     }
//! }
//!
//! let engine = Engine::new();
//! // Length and opcode are derived from the payload.
//! let event = Event {
//!     data_length: 0,
//!     op_code: 0,
//!     data: Variant::new(Pong { serial: 3, time: 9 }),
//! };
//! let bytes = engine.serialize(&event)?;
//! assert_eq!(&bytes[..6], &[0, 0, 0, 12, 0, 2]);
//!
//! let decoded: Event = engine.deserialize(&bytes)?;
//! assert_eq!(decoded.data_length, 12);
//! assert_eq!(decoded.op_code, 2);
//! assert_eq!(decoded.data, event.data);
//! # Ok::<(), wirebind::Error>(())
//! ```
pub mod binding;
pub mod codec;
pub mod config;
mod engine;
mod error;
pub mod io;
#[cfg(test)]
mod proptest_config;
pub mod schema;
pub mod subtype;

pub use {
    binding::{Binding, Relation},
    codec::{BytesEncoding, Codec, Endian, Integer, StringEncoding, TypeTag, Typed, TypedCodec},
    config::Config,
    engine::Engine,
    error::{
        BoxError, CodecError, Error, FrameUnit, Result, SchemaError, UnknownSubtypeError,
    },
    schema::{FieldRef, Lens, Record, Schema, SchemaBuilder, SchemaCache},
    subtype::{SubtypeRegistry, Variant},
};

/// Serialize `value` with a default [`Engine`].
pub fn serialize<T: Record>(value: &T) -> Result<Vec<u8>> {
    Engine::new().serialize(value)
}

/// Deserialize a `T` spanning all of `bytes` with a default [`Engine`].
pub fn deserialize<T: Record>(bytes: &[u8]) -> Result<T> {
    Engine::new().deserialize(bytes)
}

/// Serialized size of `value` with a default [`Engine`].
pub fn serialized_size<T: Record>(value: &T) -> Result<usize> {
    Engine::new().serialized_size(value)
}
