//! Depth-first traversal of a schema.
use {
    super::{
        context::{Bound, Context},
        staging::Staging,
    },
    crate::{
        binding::{bound_count, measured_bits, Measurement, Relation},
        codec::{
            bits_to_bytes, decode_bits, decode_bytes, decode_string, encode_bits, encode_bytes,
            encode_string, UnexpectedType,
        },
        error::{
            codec_error, frame_overrun, invalid_value, read_error, type_mismatch, BoxError, Error,
            FrameUnit, Result, UnknownSubtypeError,
        },
        io::{Frame, ReadError, Reader, WriteError},
        schema::{FieldDescriptor, IntValue, Schema, Strategy, VariantPayload},
    },
    core::any::Any,
    tracing::trace,
};

/// Bound values read for a measured field.
#[derive(Debug, Default)]
struct Bounds {
    length: Option<usize>,
    count: Option<usize>,
    key: Option<i128>,
}

pub(crate) fn encode_record(
    ctx: &mut Context,
    sink: &mut Staging<'_>,
    schema: &Schema,
    value: &dyn Any,
) -> Result<()> {
    let mut ctx = ctx.enter(schema.fields.len())?;
    for (slot, field) in schema.fields.iter().enumerate() {
        trace!(ty = schema.type_name, field = field.name, depth = ctx.depth(), "encode");
        encode_field(&mut ctx, sink, schema, slot, field, value)?;
    }
    Ok(())
}

pub(crate) fn decode_record(
    ctx: &mut Context,
    reader: &mut dyn Reader,
    schema: &Schema,
    value: &mut dyn Any,
) -> Result<()> {
    let mut ctx = ctx.enter(schema.fields.len())?;
    for (slot, field) in schema.fields.iter().enumerate() {
        trace!(ty = schema.type_name, field = field.name, depth = ctx.depth(), "decode");
        decode_field(&mut ctx, reader, schema, slot, field, value)?;
    }
    Ok(())
}

fn bound_target<'s>(
    schema: &'s Schema,
    slot: usize,
) -> Result<(&'s FieldDescriptor, &'s dyn IntValue)> {
    let target = &schema.fields[slot];
    let int = target
        .int_value()
        .ok_or_else(|| type_mismatch(schema.type_name))?;
    Ok((target, int))
}

fn encode_field(
    ctx: &mut Context,
    sink: &mut Staging<'_>,
    schema: &Schema,
    slot: usize,
    field: &FieldDescriptor,
    owner: &dyn Any,
) -> Result<()> {
    if let Strategy::Int(access) = &field.strategy {
        if field.bound_by.is_some() {
            // Caller value is ignored; the measured field decides.
            let hole = sink.reserve(access.width());
            ctx.set_bound(slot, Bound::Hole(hole));
        } else {
            let bits = access
                .get(owner)
                .ok_or_else(|| type_mismatch(schema.type_name))?;
            encode_bits(sink, bits, access.width(), field.endian)?;
        }
        return Ok(());
    }

    let start = sink.position();
    let mut measurement = encode_payload(ctx, sink, schema, field, owner)?;
    measurement.bytes = sink.position() - start;

    for binding in &field.bindings {
        let (target, int) = bound_target(schema, binding.target)?;
        let bits = measured_bits(field.name, binding.relation, int, &measurement)?;
        let hole = ctx
            .take_hole(binding.target)
            .ok_or_else(|| invalid_value(target.name, "bound field was not reserved"))?;
        let bytes = bits_to_bytes(bits, hole.width, target.endian);
        sink.patch(hole, &bytes[..hole.width])?;
        trace!(
            field = field.name,
            target = target.name,
            relation = %binding.relation,
            bits,
            "binding patched"
        );
    }
    Ok(())
}

fn encode_payload(
    ctx: &mut Context,
    sink: &mut Staging<'_>,
    schema: &Schema,
    field: &FieldDescriptor,
    owner: &dyn Any,
) -> Result<Measurement> {
    let mismatch = || type_mismatch(schema.type_name);
    let mut measurement = Measurement::default();
    match &field.strategy {
        Strategy::Int(_) => {}
        Strategy::String { access, encoding } => {
            let value = access.field(owner).ok_or_else(mismatch)?;
            encode_string(sink, field.name, value, *encoding)?;
        }
        Strategy::Bytes { access, encoding } => {
            let value = access.field(owner).ok_or_else(mismatch)?;
            encode_bytes(sink, field.name, value, *encoding)?;
        }
        Strategy::Composite { access, schema } => {
            let record = access.record(owner).ok_or_else(mismatch)?;
            let schema = schema.get(ctx.cache())?;
            encode_record(ctx, sink, schema, record)?;
        }
        Strategy::List {
            access,
            schema: element_schema,
        } => {
            let len = access.len(owner).ok_or_else(mismatch)?;
            let element_schema = element_schema.get(ctx.cache())?;
            for index in 0..len {
                let element = access.element(owner, index).ok_or_else(mismatch)?;
                encode_record(ctx, sink, element_schema, element)?;
            }
            measurement.elements = Some(len);
        }
        Strategy::IntList(access) => {
            measurement.elements = Some(access.encode(owner, sink, field.endian)?);
        }
        Strategy::Subtype {
            access,
            registry,
            payload,
        } => {
            let variant = access.field(owner).ok_or_else(mismatch)?;
            let Some(value) = variant.get() else {
                return Err(UnknownSubtypeError::ForSerialize {
                    field: field.name,
                    type_name: "<unset>",
                }
                .into());
            };
            let tag = value.tag();
            let key = registry.resolve_key(tag).map_err(|e| e.at(field.name))?;
            match payload {
                VariantPayload::Codec(codec) => codec
                    .encode(sink, value.as_any())
                    .map_err(|e| codec_failure(field.name, e))?,
                VariantPayload::Schemas(schemas) => {
                    let Some(variant_schema) = schemas.get(&tag.id()) else {
                        return Err(UnknownSubtypeError::ForSerialize {
                            field: field.name,
                            type_name: tag.name(),
                        }
                        .into());
                    };
                    let variant_schema = variant_schema.get(ctx.cache())?;
                    encode_record(ctx, sink, variant_schema, value.as_any())?;
                }
            }
            measurement.key = Some(key);
        }
        Strategy::Custom {
            access,
            codec,
            count,
            ..
        } => {
            let value = access.value(owner).ok_or_else(mismatch)?;
            codec
                .encode(sink, value)
                .map_err(|e| codec_failure(field.name, e))?;
            measurement.elements = count.and_then(|count| count(value));
        }
    }
    Ok(measurement)
}

fn decode_field(
    ctx: &mut Context,
    reader: &mut dyn Reader,
    schema: &Schema,
    slot: usize,
    field: &FieldDescriptor,
    owner: &mut dyn Any,
) -> Result<()> {
    if let Strategy::Int(access) = &field.strategy {
        let bits = decode_bits(reader, access.width(), field.endian)
            .map_err(|e| read_error(field.name, e))?;
        if field.bound_by.is_some() {
            ctx.set_bound(slot, Bound::Value(bits));
        }
        return match access.set(owner, bits) {
            Some(true) => Ok(()),
            // A discriminator whose type cannot represent the key is an unknown subtype.
            Some(false) => Err(match field.bound_by {
                Some((measured, Relation::SubtypeKey)) => UnknownSubtypeError::ForDeserialize {
                    field: schema.fields[measured].name,
                    key: access.to_i128(bits),
                }
                .into(),
                _ => invalid_value(field.name, "not a valid value of the field type"),
            }),
            None => Err(type_mismatch(schema.type_name)),
        };
    }

    let mut bounds = Bounds::default();
    for binding in &field.bindings {
        let (target, int) = bound_target(schema, binding.target)?;
        let Bound::Value(bits) = ctx.bound(binding.target) else {
            return Err(invalid_value(target.name, "bound field was not read"));
        };
        match binding.relation {
            Relation::ByteLength => bounds.length = Some(bound_count(field.name, int, bits)?),
            Relation::ElementCount => bounds.count = Some(bound_count(field.name, int, bits)?),
            Relation::SubtypeKey => bounds.key = Some(int.to_i128(bits)),
        }
    }

    let Some(len) = bounds.length else {
        return decode_payload(ctx, reader, schema, field, owner, &bounds);
    };
    ctx.check_preallocation(len)?;
    let window = reader
        .fill_exact(len)
        .map_err(|e| read_error(field.name, e))?;
    trace!(field = field.name, len, "frame opened");
    let mut frame = Frame::new(window);
    decode_payload(ctx, &mut frame, schema, field, owner, &bounds)?;
    if !frame.is_exhausted() {
        return Err(frame_overrun(field.name, FrameUnit::Bytes, len, frame.consumed()));
    }
    reader.consume(len).map_err(|e| read_error(field.name, e))
}

fn decode_payload(
    ctx: &mut Context,
    reader: &mut dyn Reader,
    schema: &Schema,
    field: &FieldDescriptor,
    owner: &mut dyn Any,
    bounds: &Bounds,
) -> Result<()> {
    let mismatch = || type_mismatch(schema.type_name);
    let limit = ctx.preallocation_limit();
    match &field.strategy {
        Strategy::Int(_) => {}
        Strategy::String { access, encoding } => {
            let len = bounds.length.unwrap_or_default();
            let value = decode_string(reader, field.name, *encoding, len, limit)?;
            *access.field_mut(owner).ok_or_else(mismatch)? = value;
        }
        Strategy::Bytes { access, encoding } => {
            let len = bounds.length.unwrap_or_default();
            let value = decode_bytes(reader, field.name, *encoding, len, limit)?;
            *access.field_mut(owner).ok_or_else(mismatch)? = value;
        }
        Strategy::Composite { access, schema } => {
            let record = access.record_mut(owner).ok_or_else(mismatch)?;
            let schema = schema.get(ctx.cache())?;
            decode_record(ctx, reader, schema, record)?;
        }
        Strategy::List {
            access,
            schema: element_schema,
        } => {
            let count = bounds.count.unwrap_or_default();
            ctx.check_preallocation(count.saturating_mul(access.element_size()))?;
            let element_schema = element_schema.get(ctx.cache())?;
            access.reset(owner, count).ok_or_else(mismatch)?;
            for _ in 0..count {
                let element = access.push_default(owner).ok_or_else(mismatch)?;
                decode_record(ctx, reader, element_schema, element)?;
            }
        }
        Strategy::IntList(access) => {
            let count = bounds.count.unwrap_or_default();
            access.decode(owner, reader, field.name, count, field.endian, limit)?;
        }
        Strategy::Subtype {
            access,
            registry,
            payload,
        } => {
            let key = bounds.key.unwrap_or_default();
            let entry = registry.resolve_type(key).map_err(|e| e.at(field.name))?;
            let value = match payload {
                VariantPayload::Codec(codec) => {
                    let decoded = codec
                        .decode(reader, entry.tag())
                        .map_err(|e| codec_failure(field.name, e))?;
                    entry.lift(decoded).ok_or_else(|| {
                        codec_error(
                            field.name,
                            UnexpectedType {
                                expected: entry.tag().name(),
                            },
                        )
                    })?
                }
                VariantPayload::Schemas(schemas) => {
                    let (Some(hooks), Some(variant_schema)) =
                        (entry.record(), schemas.get(&entry.tag().id()))
                    else {
                        return Err(UnknownSubtypeError::ForDeserialize {
                            field: field.name,
                            key,
                        }
                        .into());
                    };
                    let variant_schema = variant_schema.get(ctx.cache())?;
                    let mut value = (hooks.new)();
                    decode_record(ctx, reader, variant_schema, value.as_any_mut())?;
                    value
                }
            };
            trace!(field = field.name, key, ty = entry.tag().name(), "variant resolved");
            access.field_mut(owner).ok_or_else(mismatch)?.set_boxed(value);
        }
        Strategy::Custom {
            access,
            codec,
            tag,
            count,
        } => {
            let decoded = codec
                .decode(reader, *tag)
                .map_err(|e| codec_failure(field.name, e))?;
            match access.replace(owner, decoded) {
                Some(true) => {}
                Some(false) => {
                    return Err(codec_error(
                        field.name,
                        UnexpectedType {
                            expected: tag.name(),
                        },
                    ))
                }
                None => return Err(mismatch()),
            }
            if let (Some(expected), Some(count)) = (bounds.count, count) {
                let actual = access
                    .value(owner)
                    .and_then(|value| count(value))
                    .ok_or_else(mismatch)?;
                if actual != expected {
                    return Err(frame_overrun(field.name, FrameUnit::Elements, expected, actual));
                }
            }
        }
    }
    Ok(())
}

/// Classify an error returned by a custom codec.
///
/// Stream errors keep their meaning: a codec reading past its frame is a frame overrun, and
/// a failing sink is a write error. Anything else is the codec's own failure.
fn codec_failure(field: &'static str, error: BoxError) -> Error {
    let error = match error.downcast::<ReadError>() {
        Ok(read) => {
            return match *read {
                read @ (ReadError::ReadSizeLimit(_) | ReadError::FrameBoundary { .. }) => {
                    read_error(field, read)
                }
                read => codec_error(field, read),
            }
        }
        Err(error) => error,
    };
    match error.downcast::<WriteError>() {
        Ok(write) => Error::Write(*write),
        Err(error) => codec_error(field, error),
    }
}
