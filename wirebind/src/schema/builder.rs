use {
    super::{
        CustomValue, Edge, FieldAccess, FieldDescriptor, IntSeq, IntValue, Lens, NestedSchema,
        Record, RecordSeq, RecordValue, Schema, SchemaCache, SchemaResolver, Strategy,
        VariantPayload,
    },
    crate::{
        binding::{Binding, Relation},
        codec::{
            count_of, BytesEncoding, Codec, ElementCount, Endian, Integer, StringEncoding, TypeTag,
        },
        error::SchemaError,
        subtype::{SubtypeRegistry, Variant},
    },
    core::{
        any::{type_name, Any, TypeId},
        marker::PhantomData,
    },
    hashbrown::HashMap,
    std::sync::Arc,
};

/// Typed handle to a declared field, used as the target of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    owner: TypeId,
    slot: usize,
    name: &'static str,
}

impl FieldRef {
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Collects the field declarations of `T`.
///
/// Fields may be declared in any order; the wire order is given by their order indices.
/// Every declaration method returns a [`FieldDecl`] for attaching bindings and options.
pub struct SchemaBuilder<T> {
    endian: Endian,
    fields: Vec<PendingField>,
    _owner: PhantomData<fn() -> T>,
}

struct PendingField {
    order: u16,
    name: &'static str,
    endian: Option<Endian>,
    bindings: Vec<(Relation, FieldRef)>,
    kind: PendingKind,
}

enum PendingKind {
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
        schema: SchemaResolver,
    },
    List {
        access: Box<dyn RecordSeq>,
        schema: SchemaResolver,
    },
    IntList(Box<dyn IntSeq>),
    Subtype {
        access: Box<dyn FieldAccess<Variant>>,
        registry: Option<Arc<SubtypeRegistry>>,
        codec: Option<Arc<dyn Codec>>,
    },
    Custom {
        access: Box<dyn CustomValue>,
        codec: Arc<dyn Codec>,
        tag: TypeTag,
        count: Option<fn(&dyn Any) -> Option<usize>>,
    },
}

impl PendingKind {
    fn supports(&self, relation: Relation) -> bool {
        use Relation::*;
        match (self, relation) {
            (
                PendingKind::String {
                    encoding: StringEncoding::Prefixed,
                    ..
                }
                | PendingKind::Bytes {
                    encoding: BytesEncoding::Prefixed,
                    ..
                }
                | PendingKind::Composite { .. },
                ByteLength,
            ) => true,
            (PendingKind::List { .. } | PendingKind::IntList(_), ByteLength | ElementCount) => true,
            (PendingKind::Subtype { .. }, ByteLength | SubtypeKey) => true,
            (PendingKind::Custom { .. }, ByteLength) => true,
            (PendingKind::Custom { count, .. }, ElementCount) => count.is_some(),
            _ => false,
        }
    }

    fn required(&self) -> Option<Relation> {
        match self {
            PendingKind::String {
                encoding: StringEncoding::Prefixed,
                ..
            }
            | PendingKind::Bytes {
                encoding: BytesEncoding::Prefixed,
                ..
            } => Some(Relation::ByteLength),
            PendingKind::List { .. } | PendingKind::IntList(_) => Some(Relation::ElementCount),
            PendingKind::Subtype { .. } => Some(Relation::SubtypeKey),
            _ => None,
        }
    }

    fn has_zero_width(&self) -> bool {
        matches!(
            self,
            PendingKind::String {
                encoding: StringEncoding::Fixed(0),
                ..
            } | PendingKind::Bytes {
                encoding: BytesEncoding::Fixed(0),
                ..
            }
        )
    }

    fn resolve(
        self,
        cache: &SchemaCache,
        type_name: &'static str,
        field: &'static str,
    ) -> Result<Strategy, SchemaError> {
        Ok(match self {
            PendingKind::Int(access) => Strategy::Int(access),
            PendingKind::String { access, encoding } => Strategy::String { access, encoding },
            PendingKind::Bytes { access, encoding } => Strategy::Bytes { access, encoding },
            PendingKind::Composite { access, schema } => Strategy::Composite {
                access,
                schema: schema(cache, Edge::Required)?,
            },
            PendingKind::List { access, schema } => Strategy::List {
                access,
                schema: schema(cache, Edge::Optional)?,
            },
            PendingKind::IntList(access) => Strategy::IntList(access),
            PendingKind::Subtype {
                access,
                registry,
                codec,
            } => {
                let Some(registry) = registry.filter(|r| !r.is_empty()) else {
                    return Err(SchemaError::MissingSubtypeMap { type_name, field });
                };
                let payload = match codec {
                    Some(codec) => VariantPayload::Codec(codec),
                    None => {
                        let mut schemas = HashMap::with_capacity(registry.len());
                        for entry in registry.entries() {
                            if let Some(hooks) = entry.record() {
                                let schema = (hooks.schema)(cache, Edge::Optional)?;
                                schemas.insert(entry.tag().id(), schema);
                            }
                        }
                        VariantPayload::Schemas(schemas)
                    }
                };
                Strategy::Subtype {
                    access,
                    registry,
                    payload,
                }
            }
            PendingKind::Custom {
                access,
                codec,
                tag,
                count,
            } => Strategy::Custom {
                access,
                codec,
                tag,
                count,
            },
        })
    }
}

impl<T: Record> SchemaBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            endian: Endian::default(),
            fields: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// Default byte order for the integers of this schema. Big-endian unless set.
    pub fn endian(&mut self, endian: Endian) -> &mut Self {
        self.endian = endian;
        self
    }

    fn push<F>(
        &mut self,
        order: u16,
        name: &'static str,
        kind: PendingKind,
    ) -> FieldDecl<'_, T, F> {
        let slot = self.fields.len();
        self.fields.push(PendingField {
            order,
            name,
            endian: None,
            bindings: Vec::new(),
            kind,
        });
        FieldDecl {
            builder: self,
            slot,
            _field: PhantomData,
        }
    }

    /// Fixed-width integer.
    pub fn int<I: Integer>(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, I>,
    ) -> FieldDecl<'_, T, I> {
        self.push(order, name, PendingKind::Int(Box::new(lens)))
    }

    pub fn string(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, String>,
        encoding: StringEncoding,
    ) -> FieldDecl<'_, T, String> {
        let access = Box::new(lens);
        self.push(order, name, PendingKind::String { access, encoding })
    }

    pub fn bytes(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, Vec<u8>>,
        encoding: BytesEncoding,
    ) -> FieldDecl<'_, T, Vec<u8>> {
        let access = Box::new(lens);
        self.push(order, name, PendingKind::Bytes { access, encoding })
    }

    /// Nested record, walked through its own schema.
    pub fn composite<R: Record>(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, R>,
    ) -> FieldDecl<'_, T, R> {
        let kind = PendingKind::Composite {
            access: Box::new(lens),
            schema: NestedSchema::of::<R>,
        };
        self.push(order, name, kind)
    }

    /// Count-bound sequence of records. `R` may be `T` itself, or contain it.
    pub fn list<R: Record>(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, Vec<R>>,
    ) -> FieldDecl<'_, T, Vec<R>> {
        let kind = PendingKind::List {
            access: Box::new(lens),
            schema: NestedSchema::of::<R>,
        };
        self.push(order, name, kind)
    }

    /// Count-bound sequence of integers.
    pub fn int_list<I: Integer>(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, Vec<I>>,
    ) -> FieldDecl<'_, T, Vec<I>> {
        self.push(order, name, PendingKind::IntList(Box::new(lens)))
    }

    /// Polymorphic field. Needs a [`SubtypeRegistry`] and a key binding.
    pub fn subtype(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, Variant>,
    ) -> FieldDecl<'_, T, Variant> {
        let kind = PendingKind::Subtype {
            access: Box::new(lens),
            registry: None,
            codec: None,
        };
        self.push(order, name, kind)
    }

    /// Field encoded entirely by `codec`.
    pub fn custom<F: Any>(
        &mut self,
        order: u16,
        name: &'static str,
        lens: Lens<T, F>,
        codec: impl Codec + 'static,
    ) -> FieldDecl<'_, T, F> {
        let kind = PendingKind::Custom {
            access: Box::new(lens),
            codec: Arc::new(codec),
            tag: TypeTag::of::<F>(),
            count: None,
        };
        self.push(order, name, kind)
    }

    /// Validate the declarations and produce the schema, resolving nested schemas through
    /// `cache`.
    pub(crate) fn finish(self, cache: &SchemaCache) -> Result<Schema, SchemaError> {
        let type_name = type_name::<T>();
        let owner = TypeId::of::<T>();
        let endian = self.endian;

        let mut fields: Vec<(usize, PendingField)> = self.fields.into_iter().enumerate().collect();
        fields.sort_by_key(|(_, field)| field.order);
        if let Some(pair) = fields.windows(2).find(|pair| pair[0].1.order == pair[1].1.order) {
            return Err(SchemaError::DuplicateOrder {
                type_name,
                order: pair[0].1.order,
            });
        }

        // Declaration slot -> wire position.
        let mut position = vec![0; fields.len()];
        for (pos, (slot, _)) in fields.iter().enumerate() {
            position[*slot] = pos;
        }

        let mut bound_by: Vec<Option<(usize, Relation)>> = vec![None; fields.len()];
        let mut bindings: Vec<Vec<Binding>> = vec![Vec::new(); fields.len()];
        for (pos, (_, field)) in fields.iter().enumerate() {
            let mut seen = Vec::with_capacity(field.bindings.len());
            for &(relation, target) in &field.bindings {
                if target.owner != owner || target.slot >= position.len() {
                    return Err(SchemaError::ForeignField {
                        type_name,
                        field: field.name,
                    });
                }
                if seen.contains(&relation) {
                    return Err(SchemaError::DuplicateBinding {
                        type_name,
                        field: field.name,
                        relation,
                    });
                }
                seen.push(relation);
                if !field.kind.supports(relation) {
                    return Err(SchemaError::UnsupportedBinding {
                        type_name,
                        field: field.name,
                        relation,
                    });
                }
                let target_pos = position[target.slot];
                if target_pos >= pos {
                    return Err(SchemaError::ForwardBinding {
                        type_name,
                        field: field.name,
                        target: target.name,
                    });
                }
                if !matches!(fields[target_pos].1.kind, PendingKind::Int(_)) {
                    return Err(SchemaError::BindingTargetNotInteger {
                        type_name,
                        field: field.name,
                        target: target.name,
                    });
                }
                if bound_by[target_pos].is_some() {
                    return Err(SchemaError::SharedBinding {
                        type_name,
                        target: target.name,
                    });
                }
                bound_by[target_pos] = Some((pos, relation));
                bindings[pos].push(Binding {
                    relation,
                    target: target_pos,
                    target_name: target.name,
                });
            }
            if let Some(relation) = field.kind.required().filter(|r| !seen.contains(r)) {
                return Err(SchemaError::MissingBinding {
                    type_name,
                    field: field.name,
                    relation,
                });
            }
            if field.kind.has_zero_width() {
                return Err(SchemaError::InvalidWidth {
                    type_name,
                    field: field.name,
                });
            }
            if let PendingKind::Subtype { registry, codec, .. } = &field.kind {
                let Some(registry) = registry.as_ref().filter(|r| !r.is_empty()) else {
                    return Err(SchemaError::MissingSubtypeMap {
                        type_name,
                        field: field.name,
                    });
                };
                let opaque = registry
                    .entries()
                    .filter(|entry| !entry.has_layout())
                    .min_by_key(|entry| entry.key());
                if let (None, Some(entry)) = (codec, opaque) {
                    return Err(SchemaError::OpaqueVariant {
                        type_name,
                        field: field.name,
                        variant: entry.tag().name(),
                    });
                }
            }
        }

        let mut descriptors = Vec::with_capacity(fields.len());
        for ((pos, (_, field)), bindings) in fields.into_iter().enumerate().zip(bindings) {
            descriptors.push(FieldDescriptor {
                order: field.order,
                name: field.name,
                endian: field.endian.unwrap_or(endian),
                bindings,
                bound_by: bound_by[pos],
                strategy: field.kind.resolve(cache, type_name, field.name)?,
            });
        }
        Ok(Schema {
            type_id: owner,
            type_name,
            fields: descriptors,
        })
    }
}

/// A field being declared. Obtained from a [`SchemaBuilder`] method.
pub struct FieldDecl<'b, T, F> {
    builder: &'b mut SchemaBuilder<T>,
    slot: usize,
    _field: PhantomData<fn() -> F>,
}

impl<T: Record, F> FieldDecl<'_, T, F> {
    fn pending(&mut self) -> &mut PendingField {
        &mut self.builder.fields[self.slot]
    }

    fn bind(mut self, relation: Relation, target: FieldRef) -> Self {
        self.pending().bindings.push((relation, target));
        self
    }

    /// Bind the encoded byte length of this field to the integer `target`.
    pub fn length_from(self, target: FieldRef) -> Self {
        self.bind(Relation::ByteLength, target)
    }

    /// Byte order of this field, overriding the schema default.
    pub fn endian(mut self, endian: Endian) -> Self {
        self.pending().endian = Some(endian);
        self
    }

    /// Handle for binding later fields to this one.
    pub fn handle(self) -> FieldRef {
        FieldRef {
            owner: TypeId::of::<T>(),
            slot: self.slot,
            name: self.builder.fields[self.slot].name,
        }
    }
}

impl<T: Record, F: ElementCount + Any> FieldDecl<'_, T, F> {
    /// Bind the element count of this field to the integer `target`.
    pub fn count_from(mut self, target: FieldRef) -> Self {
        if let PendingKind::Custom { count, .. } = &mut self.pending().kind {
            *count = Some(count_of::<F>);
        }
        self.bind(Relation::ElementCount, target)
    }
}

impl<T: Record> FieldDecl<'_, T, Variant> {
    /// Bind the subtype key of this field's runtime type to the integer `target`.
    pub fn key_from(self, target: FieldRef) -> Self {
        self.bind(Relation::SubtypeKey, target)
    }

    pub fn registry(mut self, registry: Arc<SubtypeRegistry>) -> Self {
        if let PendingKind::Subtype { registry: slot, .. } = &mut self.pending().kind {
            *slot = Some(registry);
        }
        self
    }

    /// Encode the variant payload with `codec` instead of the variant's own schema.
    pub fn codec(mut self, codec: impl Codec + 'static) -> Self {
        if let PendingKind::Subtype { codec: slot, .. } = &mut self.pending().kind {
            *slot = Some(Arc::new(codec));
        }
        self
    }
}
