//! Polymorphic fields.
//!
//! A [`SubtypeRegistry`] is a bidirectional map between discriminator keys and concrete
//! types, scoped to the polymorphic fields it is attached to. A [`Variant`] holds the value
//! of such a field.
use {
    crate::{
        codec::{Integer, TypeTag},
        error::{SchemaError, UnknownSubtypeError},
        schema::{NestedSchema, Record, SchemaResolver},
    },
    core::{
        any::{type_name, Any, TypeId},
        fmt,
    },
    hashbrown::HashMap,
    std::sync::Arc,
};

/// Values that can live inside a [`Variant`].
///
/// Implemented for every `Any + Debug + Clone + PartialEq + Send + Sync` type.
pub trait VariantValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn tag(&self) -> TypeTag;
    fn clone_box(&self) -> Box<dyn VariantValue>;
    fn eq_variant(&self, other: &dyn VariantValue) -> bool;
}

impl<T> VariantValue for T
where
    T: Any + fmt::Debug + Clone + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn tag(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn clone_box(&self) -> Box<dyn VariantValue> {
        Box::new(self.clone())
    }

    fn eq_variant(&self, other: &dyn VariantValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

/// Value of a polymorphic field. Empty until a concrete value is stored.
///
/// ```
/// use wirebind::Variant;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Ping {
///     serial: u32,
/// }
///
/// let value = Variant::new(Ping { serial: 7 });
/// assert_eq!(value.downcast_ref::<Ping>(), Some(&Ping { serial: 7 }));
/// assert!(Variant::default().is_empty());
/// ```
#[derive(Default)]
pub struct Variant(Option<Box<dyn VariantValue>>);

impl Variant {
    pub fn new<T: VariantValue>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub const fn empty() -> Self {
        Self(None)
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn set<T: VariantValue>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    pub fn take(&mut self) -> Option<Box<dyn VariantValue>> {
        self.0.take()
    }

    pub fn get(&self) -> Option<&dyn VariantValue> {
        self.0.as_deref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.get()?.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut()?.as_any_mut().downcast_mut()
    }

    /// Type of the stored value, if any.
    pub fn tag(&self) -> Option<TypeTag> {
        self.get().map(VariantValue::tag)
    }

    pub(crate) fn set_boxed(&mut self, value: Box<dyn VariantValue>) {
        self.0 = Some(value);
    }
}

impl Clone for Variant {
    fn clone(&self) -> Self {
        Self(self.get().map(VariantValue::clone_box))
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (Some(a), Some(b)) => a.eq_variant(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Variant").field(&value).finish(),
            None => f.write_str("Variant(<empty>)"),
        }
    }
}

/// Hooks for a variant the engine walks through its own schema.
#[derive(Clone, Copy)]
pub(crate) struct RecordHooks {
    pub new: fn() -> Box<dyn VariantValue>,
    pub schema: SchemaResolver,
}

/// One `(key, type)` pair of a [`SubtypeRegistry`].
#[derive(Clone)]
pub struct VariantEntry {
    key: i128,
    tag: TypeTag,
    record: Option<RecordHooks>,
    lift: fn(Box<dyn Any + Send + Sync>) -> Option<Box<dyn VariantValue>>,
}

impl VariantEntry {
    /// Discriminator value of this variant.
    pub const fn key(&self) -> i128 {
        self.key
    }

    pub const fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Whether the variant has a layout of its own.
    pub const fn has_layout(&self) -> bool {
        self.record.is_some()
    }

    pub(crate) const fn record(&self) -> Option<RecordHooks> {
        self.record
    }

    /// Rewrap a value produced by a custom codec.
    pub(crate) fn lift(&self, value: Box<dyn Any + Send + Sync>) -> Option<Box<dyn VariantValue>> {
        (self.lift)(value)
    }
}

impl fmt::Debug for VariantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantEntry")
            .field("key", &self.key)
            .field("type", &self.tag.name())
            .field("has_layout", &self.has_layout())
            .finish()
    }
}

fn new_default<T: Record + VariantValue>() -> Box<dyn VariantValue> {
    Box::new(T::default())
}

fn lift<T: VariantValue>(value: Box<dyn Any + Send + Sync>) -> Option<Box<dyn VariantValue>> {
    value
        .downcast::<T>()
        .ok()
        .map(|value| value as Box<dyn VariantValue>)
}

/// Bidirectional discriminator key ↔ concrete type map.
///
/// Keys are any [`Integer`], normalized to their numeric value so that a key matches the
/// same number on a discriminator of any width or signedness. Both directions are
/// injective; registering a key or a type twice fails.
///
/// ```
/// use wirebind::{lens, Record, SchemaBuilder, SchemaError, SubtypeRegistry};
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Ping {
///     serial: u32,
/// }
///
/// impl Record for Ping {
///     fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
///         schema.int(1, "serial", lens!(Ping, serial));
///         Ok(())
///     }
/// }
///
/// let registry = SubtypeRegistry::builder("events")
///     .register::<Ping>(1u16)?
///     .build();
/// assert_eq!(registry.resolve_type(1)?.tag().name(), core::any::type_name::<Ping>());
/// assert!(registry.resolve_type(2).is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct SubtypeRegistry {
    name: &'static str,
    by_key: HashMap<i128, VariantEntry>,
    by_type: HashMap<TypeId, i128>,
}

impl SubtypeRegistry {
    pub fn builder(name: &'static str) -> SubtypeRegistryBuilder {
        SubtypeRegistryBuilder {
            registry: SubtypeRegistry {
                name,
                by_key: HashMap::new(),
                by_type: HashMap::new(),
            },
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Key registered for the type identified by `tag`.
    pub fn resolve_key(&self, tag: TypeTag) -> Result<i128, UnknownSubtypeError> {
        self.by_type
            .get(&tag.id())
            .copied()
            .ok_or(UnknownSubtypeError::ForSerialize {
                field: self.name,
                type_name: tag.name(),
            })
    }

    /// Entry registered under `key`.
    pub fn resolve_type(&self, key: i128) -> Result<&VariantEntry, UnknownSubtypeError> {
        self.by_key
            .get(&key)
            .ok_or(UnknownSubtypeError::ForDeserialize {
                field: self.name,
                key,
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = &VariantEntry> {
        self.by_key.values()
    }
}

impl fmt::Debug for SubtypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.by_key.values().collect();
        entries.sort_by_key(|entry| entry.key);
        f.debug_struct("SubtypeRegistry")
            .field("name", &self.name)
            .field("entries", &entries)
            .finish()
    }
}

#[must_use]
pub struct SubtypeRegistryBuilder {
    registry: SubtypeRegistry,
}

impl SubtypeRegistryBuilder {
    /// Register a variant that the engine walks through its own schema.
    pub fn register<T: Record + VariantValue>(
        self,
        key: impl Integer,
    ) -> Result<Self, SchemaError> {
        self.insert::<T>(
            key.to_i128(),
            Some(RecordHooks {
                new: new_default::<T>,
                schema: NestedSchema::of::<T>,
            }),
        )
    }

    /// Register a variant without a layout. Only usable on fields with a custom codec.
    pub fn register_opaque<T: VariantValue>(self, key: impl Integer) -> Result<Self, SchemaError> {
        self.insert::<T>(key.to_i128(), None)
    }

    fn insert<T: VariantValue>(
        mut self,
        key: i128,
        record: Option<RecordHooks>,
    ) -> Result<Self, SchemaError> {
        let registry = &mut self.registry;
        if registry.by_key.contains_key(&key) {
            return Err(SchemaError::DuplicateSubtypeKey {
                registry: registry.name,
                key,
            });
        }
        if registry.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(SchemaError::DuplicateSubtypeType {
                registry: registry.name,
                type_name: type_name::<T>(),
            });
        }
        registry.by_type.insert(TypeId::of::<T>(), key);
        registry.by_key.insert(
            key,
            VariantEntry {
                key,
                tag: TypeTag::of::<T>(),
                record,
                lift: lift::<T>,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Arc<SubtypeRegistry> {
        Arc::new(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::SchemaBuilder};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Ping {
        serial: u32,
    }

    impl Record for Ping {
        fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
            schema.int(1, "serial", crate::lens!(Ping, serial));
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pong {
        serial: u32,
        time: u64,
    }

    impl Record for Pong {
        fn layout(schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
            schema.int(1, "serial", crate::lens!(Pong, serial));
            schema.int(2, "time", crate::lens!(Pong, time));
            Ok(())
        }
    }

    fn events() -> Arc<SubtypeRegistry> {
        SubtypeRegistry::builder("events")
            .register::<Ping>(1u16)
            .and_then(|b| b.register::<Pong>(2u16))
            .and_then(|b| b.register_opaque::<String>(3u8))
            .unwrap()
            .build()
    }

    #[test]
    fn lookups_are_symmetric() {
        let registry = events();
        for entry in registry.entries() {
            assert_eq!(registry.resolve_key(entry.tag()).unwrap(), entry.key());
            assert_eq!(registry.resolve_type(entry.key()).unwrap().tag(), entry.tag());
        }
        assert_eq!(registry.len(), 3);
        assert!(!registry.resolve_type(3).unwrap().has_layout());
    }

    #[test]
    fn unknown_lookups_fail() {
        let registry = events();
        assert_eq!(
            registry.resolve_type(99).unwrap_err(),
            UnknownSubtypeError::ForDeserialize {
                field: "events",
                key: 99
            }
        );
        assert!(matches!(
            registry.resolve_key(TypeTag::of::<u8>()),
            Err(UnknownSubtypeError::ForSerialize { .. })
        ));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let err = SubtypeRegistry::builder("events")
            .register::<Ping>(1u16)
            .and_then(|b| b.register::<Pong>(1u32))
            .err();
        assert_eq!(
            err,
            Some(SchemaError::DuplicateSubtypeKey {
                registry: "events",
                key: 1
            })
        );
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let err = SubtypeRegistry::builder("events")
            .register::<Ping>(1u16)
            .and_then(|b| b.register::<Ping>(2u16))
            .err();
        assert!(matches!(err, Some(SchemaError::DuplicateSubtypeType { registry: "events", .. })));
    }

    #[test]
    fn signed_keys_keep_their_value() {
        let registry = SubtypeRegistry::builder("signed")
            .register::<Ping>(-1i8)
            .and_then(|b| b.register::<Pong>(255u8))
            .unwrap()
            .build();
        assert_eq!(registry.resolve_key(TypeTag::of::<Ping>()).unwrap(), -1);
        assert_eq!(registry.resolve_type(255).unwrap().tag(), TypeTag::of::<Pong>());
        assert_eq!(
            SubtypeRegistry::builder("signed")
                .register::<Ping>(-1i16)
                .and_then(|b| b.register::<Pong>(-1i64))
                .err(),
            Some(SchemaError::DuplicateSubtypeKey {
                registry: "signed",
                key: -1
            })
        );
    }

    #[test]
    fn lift_checks_type() {
        let registry = events();
        let entry = registry.resolve_type(1).unwrap();
        assert!(entry.lift(Box::new(Ping { serial: 1 })).is_some());
        assert!(entry.lift(Box::new(Pong::default())).is_none());
    }

    #[test]
    fn variant_equality_and_clone() {
        let a = Variant::new(Ping { serial: 7 });
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Variant::new(Pong { serial: 7, time: 0 }));
        assert_ne!(a, Variant::empty());
        assert_eq!(a.tag(), Some(TypeTag::of::<Ping>()));
        assert_eq!(format!("{:?}", Variant::empty()), "Variant(<empty>)");
    }
}
