use {
    super::*,
    crate::{codec::Endian, lens, subtype::SubtypeRegistry, Config, Engine, Error},
    core::any::type_name,
};

macro_rules! record {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? } |$schema:ident| $body:block) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct $name {
            $($field: $ty),*
        }

        impl Record for $name {
            fn layout($schema: &mut SchemaBuilder<Self>) -> Result<(), SchemaError> {
                $body
                Ok(())
            }
        }
    };
}

fn build<T: Record>() -> Result<Arc<Schema>, SchemaError> {
    SchemaCache::new().get_or_build::<T>()
}

record!(Leaf { value: u16 } |schema| {
    schema.int(1, "value", lens!(Leaf, value));
});

record!(Shuffled {
    tail: Leaf,
    name: String,
    name_len: u8,
    kind: u32,
    items: Vec<Leaf>,
    item_count: u16,
} |schema| {
    schema.composite(50, "tail", lens!(Shuffled, tail));
    let count = schema.int(30, "item_count", lens!(Shuffled, item_count)).handle();
    schema.list(40, "items", lens!(Shuffled, items)).count_from(count);
    let len = schema
        .int(10, "name_len", lens!(Shuffled, name_len))
        .endian(Endian::Little)
        .handle();
    schema
        .string(20, "name", lens!(Shuffled, name), StringEncoding::Prefixed)
        .length_from(len);
    schema.int(5, "kind", lens!(Shuffled, kind));
});

#[test]
fn fields_follow_order_indices() {
    let schema = build::<Shuffled>().unwrap();
    let names: Vec<_> = schema.fields().iter().map(FieldDescriptor::name).collect();
    assert_eq!(names, ["kind", "name_len", "name", "item_count", "items", "tail"]);
    let orders: Vec<_> = schema.fields().iter().map(FieldDescriptor::order).collect();
    assert_eq!(orders, [5, 10, 20, 30, 40, 50]);
    assert_eq!(schema.type_name(), type_name::<Shuffled>());
    assert_eq!((*schema).type_id(), TypeId::of::<Shuffled>());
}

#[test]
fn field_introspection() {
    let schema = build::<Shuffled>().unwrap();
    let kinds: Vec<_> = schema.fields().iter().map(FieldDescriptor::strategy).collect();
    assert_eq!(
        kinds,
        [
            StrategyKind::Int,
            StrategyKind::Int,
            StrategyKind::String(StringEncoding::Prefixed),
            StrategyKind::Int,
            StrategyKind::List,
            StrategyKind::Composite,
        ]
    );

    let kind = schema.field("kind").unwrap();
    assert_eq!(kind.endian(), Endian::Big);
    assert!(kind.bindings().is_empty());
    assert_eq!(kind.bound_by(), None);

    let name_len = schema.field("name_len").unwrap();
    assert_eq!(name_len.endian(), Endian::Little);
    assert_eq!(name_len.bound_by(), Some((2, Relation::ByteLength)));

    let name = schema.field("name").unwrap();
    let binding = name.binding(Relation::ByteLength).unwrap();
    assert_eq!(binding.target(), 1);
    assert_eq!(binding.target_name(), "name_len");
    assert!(name.binding(Relation::ElementCount).is_none());

    let items = schema.field("items").unwrap();
    assert_eq!(items.bindings().len(), 1);
    assert_eq!(items.bindings()[0].relation(), Relation::ElementCount);
    assert_eq!(schema.field("item_count").unwrap().bound_by(), Some((4, Relation::ElementCount)));
    assert!(schema.field("missing").is_none());
}

record!(LittleDefault { a: u16, b: u16 } |schema| {
    schema.endian(Endian::Little);
    schema.int(1, "a", lens!(LittleDefault, a));
    schema.int(2, "b", lens!(LittleDefault, b)).endian(Endian::Big);
});

#[test]
fn schema_endian_applies_unless_overridden() {
    let schema = build::<LittleDefault>().unwrap();
    assert_eq!(schema.field("a").unwrap().endian(), Endian::Little);
    assert_eq!(schema.field("b").unwrap().endian(), Endian::Big);
}

record!(DuplicateOrder { a: u8, b: u8 } |schema| {
    schema.int(7, "a", lens!(DuplicateOrder, a));
    schema.int(7, "b", lens!(DuplicateOrder, b));
});

#[test]
fn duplicate_order_is_rejected() {
    assert_eq!(
        build::<DuplicateOrder>().unwrap_err(),
        SchemaError::DuplicateOrder {
            type_name: type_name::<DuplicateOrder>(),
            order: 7
        }
    );
}

record!(Foreign { name: String } |schema| {
    let mut other = SchemaBuilder::<Leaf>::new();
    let len = other.int(1, "value", lens!(Leaf, value)).handle();
    schema
        .string(1, "name", lens!(Foreign, name), StringEncoding::Prefixed)
        .length_from(len);
});

#[test]
fn binding_to_another_schema_is_rejected() {
    assert_eq!(
        build::<Foreign>().unwrap_err(),
        SchemaError::ForeignField {
            type_name: type_name::<Foreign>(),
            field: "name"
        }
    );
}

record!(Forward { name: String, len: u8 } |schema| {
    let len = schema.int(3, "len", lens!(Forward, len)).handle();
    schema
        .string(2, "name", lens!(Forward, name), StringEncoding::Prefixed)
        .length_from(len);
});

#[test]
fn binding_must_point_backwards() {
    assert_eq!(
        build::<Forward>().unwrap_err(),
        SchemaError::ForwardBinding {
            type_name: type_name::<Forward>(),
            field: "name",
            target: "len"
        }
    );
}

record!(NotInteger { label: String, name: String } |schema| {
    let label = schema
        .string(1, "label", lens!(NotInteger, label), StringEncoding::Fixed(4))
        .handle();
    schema
        .string(2, "name", lens!(NotInteger, name), StringEncoding::Prefixed)
        .length_from(label);
});

#[test]
fn binding_target_must_be_an_integer() {
    assert_eq!(
        build::<NotInteger>().unwrap_err(),
        SchemaError::BindingTargetNotInteger {
            type_name: type_name::<NotInteger>(),
            field: "name",
            target: "label"
        }
    );
}

record!(TwoLengths { a: u8, b: u8, name: String } |schema| {
    let a = schema.int(1, "a", lens!(TwoLengths, a)).handle();
    let b = schema.int(2, "b", lens!(TwoLengths, b)).handle();
    schema
        .string(3, "name", lens!(TwoLengths, name), StringEncoding::Prefixed)
        .length_from(a)
        .length_from(b);
});

#[test]
fn one_binding_per_relation() {
    assert_eq!(
        build::<TwoLengths>().unwrap_err(),
        SchemaError::DuplicateBinding {
            type_name: type_name::<TwoLengths>(),
            field: "name",
            relation: Relation::ByteLength
        }
    );
}

record!(Shared { len: u8, first: String, second: String } |schema| {
    let len = schema.int(1, "len", lens!(Shared, len)).handle();
    schema
        .string(2, "first", lens!(Shared, first), StringEncoding::Prefixed)
        .length_from(len);
    schema
        .string(3, "second", lens!(Shared, second), StringEncoding::Prefixed)
        .length_from(len);
});

#[test]
fn integer_is_bound_at_most_once() {
    assert_eq!(
        build::<Shared>().unwrap_err(),
        SchemaError::SharedBinding {
            type_name: type_name::<Shared>(),
            target: "len"
        }
    );
}

record!(IntLength { a: u8, b: u8 } |schema| {
    let a = schema.int(1, "a", lens!(IntLength, a)).handle();
    schema.int(2, "b", lens!(IntLength, b)).length_from(a);
});

record!(FixedLength { len: u8, name: String } |schema| {
    let len = schema.int(1, "len", lens!(FixedLength, len)).handle();
    schema
        .string(2, "name", lens!(FixedLength, name), StringEncoding::Fixed(8))
        .length_from(len);
});

record!(StringCount { count: u8, len: u8, name: String } |schema| {
    let count = schema.int(1, "count", lens!(StringCount, count)).handle();
    let len = schema.int(2, "len", lens!(StringCount, len)).handle();
    schema
        .string(3, "name", lens!(StringCount, name), StringEncoding::Prefixed)
        .length_from(len)
        .count_from(count);
});

#[test]
fn unsupported_bindings_are_rejected() {
    assert_eq!(
        build::<IntLength>().unwrap_err(),
        SchemaError::UnsupportedBinding {
            type_name: type_name::<IntLength>(),
            field: "b",
            relation: Relation::ByteLength
        }
    );
    assert_eq!(
        build::<FixedLength>().unwrap_err(),
        SchemaError::UnsupportedBinding {
            type_name: type_name::<FixedLength>(),
            field: "name",
            relation: Relation::ByteLength
        }
    );
    assert_eq!(
        build::<StringCount>().unwrap_err(),
        SchemaError::UnsupportedBinding {
            type_name: type_name::<StringCount>(),
            field: "name",
            relation: Relation::ElementCount
        }
    );
}

record!(UncountedList { items: Vec<Leaf> } |schema| {
    schema.list(1, "items", lens!(UncountedList, items));
});

record!(UnframedString { name: String } |schema| {
    schema.string(1, "name", lens!(UnframedString, name), StringEncoding::Prefixed);
});

record!(UnkeyedVariant { data: Variant } |schema| {
    let registry = SubtypeRegistry::builder("leaves").register::<Leaf>(1u8)?.build();
    schema.subtype(1, "data", lens!(UnkeyedVariant, data)).registry(registry);
});

#[test]
fn required_bindings_must_be_declared() {
    assert_eq!(
        build::<UncountedList>().unwrap_err(),
        SchemaError::MissingBinding {
            type_name: type_name::<UncountedList>(),
            field: "items",
            relation: Relation::ElementCount
        }
    );
    assert_eq!(
        build::<UnframedString>().unwrap_err(),
        SchemaError::MissingBinding {
            type_name: type_name::<UnframedString>(),
            field: "name",
            relation: Relation::ByteLength
        }
    );
    assert_eq!(
        build::<UnkeyedVariant>().unwrap_err(),
        SchemaError::MissingBinding {
            type_name: type_name::<UnkeyedVariant>(),
            field: "data",
            relation: Relation::SubtypeKey
        }
    );
}

record!(NoRegistry { key: u8, data: Variant } |schema| {
    let key = schema.int(1, "key", lens!(NoRegistry, key)).handle();
    schema.subtype(2, "data", lens!(NoRegistry, data)).key_from(key);
});

record!(EmptyRegistry { key: u8, data: Variant } |schema| {
    let key = schema.int(1, "key", lens!(EmptyRegistry, key)).handle();
    schema
        .subtype(2, "data", lens!(EmptyRegistry, data))
        .registry(SubtypeRegistry::builder("empty").build())
        .key_from(key);
});

#[test]
fn subtype_field_needs_a_populated_registry() {
    assert_eq!(
        build::<NoRegistry>().unwrap_err(),
        SchemaError::MissingSubtypeMap {
            type_name: type_name::<NoRegistry>(),
            field: "data"
        }
    );
    assert_eq!(
        build::<EmptyRegistry>().unwrap_err(),
        SchemaError::MissingSubtypeMap {
            type_name: type_name::<EmptyRegistry>(),
            field: "data"
        }
    );
}

#[derive(Debug, Clone, PartialEq)]
struct Opaque;

record!(OpaqueVariant { key: u8, data: Variant } |schema| {
    let registry = SubtypeRegistry::builder("mixed")
        .register::<Leaf>(1u8)?
        .register_opaque::<Opaque>(2u8)?
        .build();
    let key = schema.int(1, "key", lens!(OpaqueVariant, key)).handle();
    schema
        .subtype(2, "data", lens!(OpaqueVariant, data))
        .registry(registry)
        .key_from(key);
});

#[test]
fn opaque_variant_needs_a_codec() {
    assert_eq!(
        build::<OpaqueVariant>().unwrap_err(),
        SchemaError::OpaqueVariant {
            type_name: type_name::<OpaqueVariant>(),
            field: "data",
            variant: type_name::<Opaque>()
        }
    );
}

record!(ZeroWidth { tag: Vec<u8> } |schema| {
    schema.bytes(1, "tag", lens!(ZeroWidth, tag), BytesEncoding::Fixed(0));
});

#[test]
fn fixed_width_must_be_positive() {
    assert_eq!(
        build::<ZeroWidth>().unwrap_err(),
        SchemaError::InvalidWidth {
            type_name: type_name::<ZeroWidth>(),
            field: "tag"
        }
    );
}

record!(Registered { key: u8, data: Variant } |schema| {
    let registry = SubtypeRegistry::builder("twice")
        .register::<Leaf>(1u8)?
        .register::<Shuffled>(1u8)?
        .build();
    let key = schema.int(1, "key", lens!(Registered, key)).handle();
    schema
        .subtype(2, "data", lens!(Registered, data))
        .registry(registry)
        .key_from(key);
});

#[test]
fn layout_errors_propagate() {
    assert_eq!(
        build::<Registered>().unwrap_err(),
        SchemaError::DuplicateSubtypeKey {
            registry: "twice",
            key: 1
        }
    );
}

record!(Node { count: u8, children: Vec<Node> } |schema| {
    let count = schema.int(1, "count", lens!(Node, count)).handle();
    schema.list(2, "children", lens!(Node, children)).count_from(count);
});

record!(Upper { count: u8, lowers: Vec<Lower> } |schema| {
    let count = schema.int(1, "count", lens!(Upper, count)).handle();
    schema.list(2, "lowers", lens!(Upper, lowers)).count_from(count);
});

record!(Lower { upper: Upper } |schema| {
    schema.composite(1, "upper", lens!(Lower, upper));
});

record!(Tree { key: u8, child: Variant } |schema| {
    let registry = SubtypeRegistry::builder("trees")
        .register::<Leaf>(1u8)?
        .register::<Tree>(2u8)?
        .build();
    let key = schema.int(1, "key", lens!(Tree, key)).handle();
    schema
        .subtype(2, "child", lens!(Tree, child))
        .registry(registry)
        .key_from(key);
});

fn fresh_engine() -> Engine {
    Engine::new().with_cache(Arc::new(SchemaCache::new()))
}

#[test]
fn self_containing_list_roundtrips() {
    let cache = SchemaCache::new();
    assert!(cache.get_or_build::<Node>().is_ok());
    assert!(cache.contains::<Node>());

    let engine = fresh_engine();
    assert_eq!(engine.serialize(&Node::default()).unwrap(), [0]);
    let tree = Node {
        count: 2,
        children: vec![
            Node {
                count: 1,
                children: vec![Node::default()],
            },
            Node::default(),
        ],
    };
    let bytes = engine.serialize(&tree).unwrap();
    assert_eq!(bytes, [2, 1, 0, 0]);
    assert_eq!(engine.deserialize::<Node>(&bytes).unwrap(), tree);
}

#[test]
fn recursion_is_bounded_by_max_depth() {
    let engine = Engine::with_config(Config::new().with_max_depth(2))
        .with_cache(Arc::new(SchemaCache::new()));
    assert!(engine.deserialize::<Node>(&[1, 0]).is_ok());
    assert!(matches!(
        engine.deserialize::<Node>(&[1, 1, 0]),
        Err(Error::DepthLimit(2))
    ));
}

#[test]
fn mutual_recursion_through_a_list_roundtrips() {
    let upper = Upper {
        count: 1,
        lowers: vec![Lower {
            upper: Upper::default(),
        }],
    };
    // Either side may be built first.
    let engine = fresh_engine();
    assert!(engine.schema::<Lower>().is_ok());
    assert_eq!(engine.serialize(&upper).unwrap(), [1, 0]);

    let engine = fresh_engine();
    let bytes = engine.serialize(&upper).unwrap();
    assert_eq!(engine.deserialize::<Upper>(&bytes).unwrap(), upper);
    assert!(engine.cache().contains::<Lower>());
}

#[test]
fn recursive_variant_roundtrips() {
    let tree = Tree {
        key: 2,
        child: Variant::new(Tree {
            key: 1,
            child: Variant::new(Leaf { value: 5 }),
        }),
    };
    let engine = fresh_engine();
    let bytes = engine.serialize(&tree).unwrap();
    assert_eq!(bytes, [2, 1, 0, 5]);
    assert_eq!(engine.deserialize::<Tree>(&bytes).unwrap(), tree);
}

record!(Knot { value: u8 } |schema| {
    schema.int(1, "value", lens!(Knot, value));
    // The record itself, seen as one of its own fields.
    schema.composite(2, "again", Lens::<Knot, Knot>::new(|knot| knot, |knot| knot));
});

record!(Coil { count: u8, knots: Vec<Knot> } |schema| {
    let count = schema.int(1, "count", lens!(Coil, count)).handle();
    schema.list(2, "knots", lens!(Coil, knots)).count_from(count);
});

#[test]
fn self_composition_is_a_cycle() {
    let cache = SchemaCache::new();
    let SchemaError::CompositionCycle { chain } = cache.get_or_build::<Knot>().unwrap_err() else {
        panic!("expected a composition cycle");
    };
    assert_eq!(chain, format!("{0} -> {0}", type_name::<Knot>()));
    assert!(cache.is_empty());

    // The build stack unwound; unrelated types still build.
    assert!(cache.get_or_build::<Leaf>().is_ok());
}

#[test]
fn composition_cycle_inside_a_list_element_is_reported() {
    let cache = SchemaCache::new();
    let SchemaError::CompositionCycle { chain } = cache.get_or_build::<Coil>().unwrap_err() else {
        panic!("expected a composition cycle");
    };
    assert_eq!(chain, format!("{0} -> {0}", type_name::<Knot>()));
    assert!(!cache.contains::<Coil>());
}

#[test]
fn cache_returns_the_published_schema() {
    let cache = SchemaCache::new();
    assert!(cache.is_empty());
    let first = cache.get_or_build::<Shuffled>().unwrap();
    let second = cache.get_or_build::<Shuffled>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    // Nested schemas are published along the way.
    assert!(cache.contains::<Leaf>());
    assert_eq!(cache.len(), 2);

    let Strategy::Composite { schema: tail, .. } = &first.field("tail").unwrap().strategy else {
        panic!("tail is a composite");
    };
    assert!(Arc::ptr_eq(tail.get(&cache).unwrap(), &cache.get_or_build::<Leaf>().unwrap()));
}

#[test]
fn failed_builds_are_not_cached() {
    let cache = SchemaCache::new();
    assert!(cache.get_or_build::<DuplicateOrder>().is_err());
    assert!(!cache.contains::<DuplicateOrder>());
    assert!(cache.get_or_build::<DuplicateOrder>().is_err());
}

#[test]
fn concurrent_builds_agree() {
    let cache = SchemaCache::new();
    let schemas: Vec<Arc<Schema>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| cache.get_or_build::<Shuffled>().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let published = cache.get_or_build::<Shuffled>().unwrap();
    assert!(schemas.iter().all(|schema| Arc::ptr_eq(schema, &published)));
    assert_eq!(cache.len(), 2);
}
