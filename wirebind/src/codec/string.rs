//! Default string and byte blob codecs.
use crate::{
    error::{invalid_value, preallocation_size_limit, read_error, Result},
    io::{Reader, Writer},
};

/// Wire shape of a `String` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// Exactly `n` bytes: zero padded on write, trailing zeros trimmed on read. A value
    /// ending in a zero byte is rejected, since it could not be read back.
    Fixed(usize),
    /// Length taken from a bound integer field.
    Prefixed,
    /// Bytes up to and including the given terminator.
    Terminated(u8),
}

impl Default for StringEncoding {
    fn default() -> Self {
        StringEncoding::Terminated(0)
    }
}

/// Wire shape of a `Vec<u8>` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesEncoding {
    /// Exactly `n` bytes; the value must have that length.
    Fixed(usize),
    /// Length taken from a bound integer field.
    Prefixed,
}

pub(crate) fn encode_string(
    writer: &mut dyn Writer,
    field: &'static str,
    value: &str,
    encoding: StringEncoding,
) -> Result<()> {
    let bytes = value.as_bytes();
    match encoding {
        StringEncoding::Fixed(width) => {
            if bytes.len() > width {
                return Err(invalid_value(field, "string is longer than its fixed width"));
            }
            if bytes.last() == Some(&0) {
                return Err(invalid_value(field, "fixed-width string ends with a zero byte"));
            }
            writer.write(bytes)?;
            write_zeros(writer, width - bytes.len())?;
        }
        StringEncoding::Prefixed => writer.write(bytes)?,
        StringEncoding::Terminated(terminator) => {
            if bytes.contains(&terminator) {
                return Err(invalid_value(field, "string contains its terminator"));
            }
            writer.write(bytes)?;
            writer.write(&[terminator])?;
        }
    }
    Ok(())
}

/// Decode a string. `len` is the bound byte length of a prefixed string.
pub(crate) fn decode_string(
    reader: &mut dyn Reader,
    field: &'static str,
    encoding: StringEncoding,
    len: usize,
    limit: usize,
) -> Result<String> {
    let mut bytes = match encoding {
        StringEncoding::Fixed(width) => {
            let mut bytes = read_bytes(reader, field, width, limit)?;
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            bytes.truncate(end);
            bytes
        }
        StringEncoding::Prefixed => read_bytes(reader, field, len, limit)?,
        StringEncoding::Terminated(terminator) => {
            read_terminated(reader, field, terminator, limit)?
        }
    };
    bytes.shrink_to_fit();
    String::from_utf8(bytes).map_err(|_| invalid_value(field, "string is not valid UTF-8"))
}

pub(crate) fn encode_bytes(
    writer: &mut dyn Writer,
    field: &'static str,
    value: &[u8],
    encoding: BytesEncoding,
) -> Result<()> {
    if let BytesEncoding::Fixed(width) = encoding {
        if value.len() != width {
            return Err(invalid_value(field, "blob length differs from its fixed width"));
        }
    }
    writer.write(value)?;
    Ok(())
}

pub(crate) fn decode_bytes(
    reader: &mut dyn Reader,
    field: &'static str,
    encoding: BytesEncoding,
    len: usize,
    limit: usize,
) -> Result<Vec<u8>> {
    match encoding {
        BytesEncoding::Fixed(width) => read_bytes(reader, field, width, limit),
        BytesEncoding::Prefixed => read_bytes(reader, field, len, limit),
    }
}

fn write_zeros(writer: &mut dyn Writer, mut n: usize) -> Result<()> {
    const ZEROS: [u8; 64] = [0; 64];
    while n > 0 {
        let chunk = n.min(ZEROS.len());
        writer.write(&ZEROS[..chunk])?;
        n -= chunk;
    }
    Ok(())
}

fn read_bytes(
    reader: &mut dyn Reader,
    field: &'static str,
    len: usize,
    limit: usize,
) -> Result<Vec<u8>> {
    if len > limit {
        return Err(preallocation_size_limit(len, limit));
    }
    let mut bytes = vec![0; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| read_error(field, e))?;
    Ok(bytes)
}

fn read_terminated(
    reader: &mut dyn Reader,
    field: &'static str,
    terminator: u8,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    loop {
        let byte = reader.peek().map_err(|e| read_error(field, e))?;
        reader.consume(1).map_err(|e| read_error(field, e))?;
        if byte == terminator {
            return Ok(bytes);
        }
        if bytes.len() == limit {
            return Err(preallocation_size_limit(bytes.len() + 1, limit));
        }
        bytes.push(byte);
    }
}
