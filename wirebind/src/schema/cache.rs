use {
    super::{Record, Schema, SchemaBuilder},
    crate::error::SchemaError,
    core::any::{type_name, TypeId},
    hashbrown::HashMap,
    std::{
        cell::RefCell,
        fmt,
        sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock},
    },
    tracing::debug,
};

static SHARED: LazyLock<Arc<SchemaCache>> = LazyLock::new(|| Arc::new(SchemaCache::new()));

thread_local! {
    /// Types whose schemas are being built on this thread, outermost first, with the edge
    /// each was reached through.
    static BUILDING: RefCell<Vec<(TypeId, &'static str, Edge)>> =
        const { RefCell::new(Vec::new()) };
}

/// How a record reaches the schema of a nested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    /// Composite field: the nested record is always present.
    Required,
    /// List element or variant: a count of zero or another variant ends the recursion.
    Optional,
}

/// Pops the build stack when a build finishes or unwinds.
struct BuildGuard;

impl BuildGuard {
    /// Push `T`, reached through `edge`.
    ///
    /// If `T` is already being built, a recursion made only of required edges is a
    /// composition cycle. Any optional edge on the way makes it a recursive declaration,
    /// reported as `Ok(None)`.
    fn enter<T: Record>(edge: Edge) -> Result<Option<Self>, SchemaError> {
        BUILDING.with(|stack| {
            let mut stack = stack.borrow_mut();
            let id = TypeId::of::<T>();
            if let Some(start) = stack.iter().position(|(building, ..)| *building == id) {
                let required = edge == Edge::Required
                    && stack[start + 1..]
                        .iter()
                        .all(|(.., entered)| *entered == Edge::Required);
                if !required {
                    debug!(ty = type_name::<T>(), "recursive schema resolved on first use");
                    return Ok(None);
                }
                let mut chain: Vec<&str> =
                    stack[start..].iter().map(|(_, name, _)| *name).collect();
                chain.push(type_name::<T>());
                let chain = chain.join(" -> ");
                debug!(%chain, "schema composition cycle");
                return Err(SchemaError::CompositionCycle { chain });
            }
            stack.push((id, type_name::<T>(), edge));
            Ok(Some(BuildGuard))
        })
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        BUILDING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) type SchemaResolver = fn(&SchemaCache, Edge) -> Result<NestedSchema, SchemaError>;

/// Schema of a nested record.
///
/// Resolved while the enclosing schema is built, except for a record that recurses into a
/// type still being built: that one is looked up on first use.
pub(crate) struct NestedSchema {
    type_name: &'static str,
    lookup: fn(&SchemaCache, Edge) -> Result<Option<Arc<Schema>>, SchemaError>,
    schema: OnceLock<Arc<Schema>>,
}

impl NestedSchema {
    pub(crate) fn of<R: Record>(cache: &SchemaCache, edge: Edge) -> Result<Self, SchemaError> {
        let schema = match cache.nested::<R>(edge)? {
            Some(schema) => OnceLock::from(schema),
            None => OnceLock::new(),
        };
        Ok(Self {
            type_name: type_name::<R>(),
            lookup: SchemaCache::nested::<R>,
            schema,
        })
    }

    pub(crate) fn get(&self, cache: &SchemaCache) -> Result<&Arc<Schema>, SchemaError> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let schema = (self.lookup)(cache, Edge::Required)?.ok_or_else(|| {
            SchemaError::CompositionCycle {
                chain: self.type_name.to_owned(),
            }
        })?;
        Ok(self.schema.get_or_init(|| schema))
    }
}

/// Process-lifetime store of built schemas, keyed by record type.
///
/// Schemas are built on first use and never change afterwards. Builds run without holding
/// the lock: two threads racing on the same type both build, the first to publish wins and
/// both observe that one `Arc<Schema>`. Failed builds are not cached.
#[derive(Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by every [`Engine::new`](crate::Engine::new).
    pub fn shared() -> Arc<SchemaCache> {
        Arc::clone(&SHARED)
    }

    /// Schema of `T`, built and published on first request.
    pub fn get_or_build<T: Record>(&self) -> Result<Arc<Schema>, SchemaError> {
        self.nested::<T>(Edge::Required)?
            .ok_or_else(|| SchemaError::CompositionCycle {
                chain: type_name::<T>().to_owned(),
            })
    }

    /// Schema of `T` reached through `edge`, or `None` for a recursive declaration whose
    /// schema is still being built.
    pub(crate) fn nested<T: Record>(
        &self,
        edge: Edge,
    ) -> Result<Option<Arc<Schema>>, SchemaError> {
        let id = TypeId::of::<T>();
        if let Some(schema) = self.read().get(&id) {
            return Ok(Some(Arc::clone(schema)));
        }

        let Some(guard) = BuildGuard::enter::<T>(edge)? else {
            return Ok(None);
        };
        let mut builder = SchemaBuilder::<T>::new();
        T::layout(&mut builder)?;
        let schema = Arc::new(builder.finish(self)?);
        drop(guard);

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        let published = schemas.entry(id).or_insert_with(|| {
            debug!(ty = schema.type_name(), fields = schema.fields().len(), "schema published");
            Arc::clone(&schema)
        });
        Ok(Some(Arc::clone(published)))
    }

    pub fn contains<T: Record>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, Arc<Schema>>> {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache").field("len", &self.len()).finish()
    }
}
