//! Serialization entry points.
use {
    crate::{
        config::Config,
        error::{frame_overrun, FrameUnit, Result},
        io::{Reader, SizeCounter, Writer},
        schema::{Record, Schema, SchemaCache},
    },
    context::Context,
    staging::Staging,
    std::sync::Arc,
    tracing::debug_span,
};

mod context;
mod staging;
mod walker;

/// Walks record graphs to and from their wire layout.
///
/// An engine is a [`Config`] plus a handle to a [`SchemaCache`]. It is cheap to clone and
/// can be shared between threads; every call carries its own traversal state.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    cache: Arc<SchemaCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the default [`Config`] and the process-wide schema cache.
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            cache: SchemaCache::shared(),
        }
    }

    /// Use `cache` instead of the process-wide schema cache.
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Schema of `T`, building it on first use.
    pub fn schema<T: Record>(&self) -> Result<Arc<Schema>> {
        Ok(self.cache.get_or_build::<T>()?)
    }

    pub fn serialize<T: Record>(&self, value: &T) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_into(value, &mut out)?;
        Ok(out)
    }

    /// Serialize `value` into `writer`, then [`finish`](Writer::finish) it.
    ///
    /// On error, bytes already handed to `writer` are left in place.
    pub fn serialize_into<T: Record>(&self, value: &T, writer: &mut impl Writer) -> Result<()> {
        let schema = self.schema::<T>()?;
        let span = debug_span!("serialize", ty = schema.type_name());
        let _enter = span.enter();
        let mut ctx = Context::new(self.config, Arc::clone(&self.cache));
        let mut sink = Staging::new(writer);
        walker::encode_record(&mut ctx, &mut sink, &schema, value)?;
        sink.finish()?;
        Ok(())
    }

    /// Number of bytes [`Engine::serialize`] would produce for `value`.
    pub fn serialized_size<T: Record>(&self, value: &T) -> Result<usize> {
        let mut counter = SizeCounter::new();
        self.serialize_into(value, &mut counter)?;
        Ok(counter.written())
    }

    /// Deserialize a `T` that spans all of `bytes`.
    ///
    /// Bytes left over after the root record are an [`Error::FrameOverrun`](crate::Error).
    pub fn deserialize<T: Record>(&self, bytes: &[u8]) -> Result<T> {
        let mut reader = bytes;
        let value = self.deserialize_from::<T>(&mut reader)?;
        if !reader.is_empty() {
            let consumed = bytes.len() - reader.len();
            return Err(frame_overrun(
                core::any::type_name::<T>(),
                FrameUnit::Bytes,
                consumed,
                bytes.len(),
            ));
        }
        Ok(value)
    }

    /// Deserialize a `T` from the front of `reader`, leaving any following bytes unread.
    pub fn deserialize_from<T: Record>(&self, reader: &mut impl Reader) -> Result<T> {
        let schema = self.schema::<T>()?;
        let span = debug_span!("deserialize", ty = schema.type_name());
        let _enter = span.enter();
        let mut value = T::default();
        let mut ctx = Context::new(self.config, Arc::clone(&self.cache));
        walker::decode_record(&mut ctx, reader, &schema, &mut value)?;
        Ok(value)
    }
}
