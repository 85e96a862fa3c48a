//! On-disk record framing for [`FileBroker`](crate::FileBroker) partitions.
//!
//! # Record Format
//!
//! ```text
//! [offset:u64][timestamp:i64][key_len:i32][key:bytes][value_len:u32][value:bytes][crc32:u32]
//!      8B          8B            4B        variable        4B          variable        4B
//! ```
//!
//! A `key_len` of `-1` marks a record without a key. All integers are
//! little-endian. The CRC covers everything before it.

use bytes::Bytes;
use transitlog_types::Offset;

use crate::LogError;

// offset(8) + timestamp(8) + key_len(4)
const FIXED_HEADER: usize = 20;

const NO_KEY: i32 = -1;

/// A single record in a partition file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    offset: Offset,
    timestamp_ms: i64,
    key: Option<Bytes>,
    value: Bytes,
}

impl Record {
    pub fn new(offset: Offset, timestamp_ms: i64, key: Option<Bytes>, value: Bytes) -> Self {
        Self {
            offset,
            timestamp_ms,
            key,
            value,
        }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub(crate) fn into_parts(self) -> (Offset, i64, Option<Bytes>, Bytes) {
        (self.offset, self.timestamp_ms, self.key, self.value)
    }

    /// Serializes the record to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let key_len = self.key.as_ref().map_or(0, Bytes::len);
        let mut buf = Vec::with_capacity(FIXED_HEADER + key_len + 4 + self.value.len() + 4);

        buf.extend_from_slice(&self.offset.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.timestamp_ms.to_le_bytes());

        match &self.key {
            Some(key) => {
                buf.extend_from_slice(&(key.len() as i32).to_le_bytes());
                buf.extend_from_slice(key);
            }
            None => buf.extend_from_slice(&NO_KEY.to_le_bytes()),
        }

        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Deserializes a record from the front of `data`.
    ///
    /// Returns the parsed record and the number of bytes consumed. Key and
    /// value are zero-copy slices of `data`.
    ///
    /// # Errors
    ///
    /// - [`LogError::UnexpectedEof`] if the data is truncated
    /// - [`LogError::CorruptedRecord`] if the CRC doesn't match or a length
    ///   field is nonsensical
    pub fn from_bytes(data: &Bytes) -> Result<(Self, usize), LogError> {
        if data.len() < FIXED_HEADER {
            return Err(LogError::UnexpectedEof);
        }

        let offset = Offset::new(read_u64(data, 0));
        let timestamp_ms = read_u64(data, 8) as i64;
        let key_len = read_u32(data, 16) as i32;

        let mut pos = FIXED_HEADER;
        let key = match key_len {
            NO_KEY => None,
            len if len < 0 => return Err(LogError::CorruptedRecord),
            len => {
                let len = len as usize;
                if data.len() < pos + len {
                    return Err(LogError::UnexpectedEof);
                }
                let key = data.slice(pos..pos + len);
                pos += len;
                Some(key)
            }
        };

        if data.len() < pos + 4 {
            return Err(LogError::UnexpectedEof);
        }
        let value_len = read_u32(data, pos) as usize;
        pos += 4;

        let total_size = pos + value_len + 4;
        if data.len() < total_size {
            return Err(LogError::UnexpectedEof);
        }
        let value = data.slice(pos..pos + value_len);
        pos += value_len;

        let stored_crc = read_u32(data, pos);
        let computed_crc = crc32fast::hash(&data[0..pos]);
        if stored_crc != computed_crc {
            return Err(LogError::CorruptedRecord);
        }

        Ok((
            Record {
                offset,
                timestamp_ms,
                key,
                value,
            },
            total_size,
        ))
    }
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(
        data[at..at + 8]
            .try_into()
            .expect("slice is exactly 8 bytes after bounds check"),
    )
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(
        data[at..at + 4]
            .try_into()
            .expect("slice is exactly 4 bytes after bounds check"),
    )
}
