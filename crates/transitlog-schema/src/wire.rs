//! Schema-framed encoding of keys and values.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{SchemaError, SchemaHandle, SchemaId, SchemaRegistry};

/// First byte of every framed payload.
pub const MAGIC_BYTE: u8 = 0;

// magic(1) + schema_id(4)
const HEADER_LEN: usize = 5;

/// Validates `value` against the handle's schema and frames it.
pub fn encode(handle: &SchemaHandle, value: &Value) -> Result<Bytes, SchemaError> {
    handle.schema().validate(value)?;

    let payload = serde_json::to_vec(value)?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(MAGIC_BYTE);
    buf.put_u32(handle.id().as_u32());
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Serializes a typed record and frames it. See [`encode`].
pub fn encode_record<T: Serialize>(handle: &SchemaHandle, record: &T) -> Result<Bytes, SchemaError> {
    encode(handle, &serde_json::to_value(record)?)
}

/// Unframes a payload, resolving and validating against the writer's schema.
pub fn decode<R: SchemaRegistry + ?Sized>(
    registry: &R,
    data: &[u8],
) -> Result<(SchemaId, Value), SchemaError> {
    if data.len() < HEADER_LEN {
        return Err(SchemaError::Truncated(data.len()));
    }
    if data[0] != MAGIC_BYTE {
        return Err(SchemaError::UnknownMagicByte(data[0]));
    }

    let id = SchemaId::new(u32::from_be_bytes([data[1], data[2], data[3], data[4]]));
    let schema = registry.schema_by_id(id)?;
    let value: Value = serde_json::from_slice(&data[HEADER_LEN..])?;
    schema.validate(&value)?;

    Ok((id, value))
}

/// Unframes a payload into a typed record. See [`decode`].
pub fn decode_record<T: DeserializeOwned, R: SchemaRegistry + ?Sized>(
    registry: &R,
    data: &[u8],
) -> Result<T, SchemaError> {
    let (_, value) = decode(registry, data)?;
    Ok(serde_json::from_value(value)?)
}
