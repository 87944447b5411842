//! On-disk node layout for [`crate::btree::BTreeIndex`]: the stat block, and
//! the leaf/interior node encodings. Each node occupies exactly one page.

use crate::constants::{BlockId, Handle, PAGE_SIZE};
use crate::error::RelationError;
use crate::io::{read_i32, read_text, read_u32, read_u64, write_text, write_u32, write_u64};
use crate::value::{DataType, Value};

/// An ordered sequence of values matching an index's key columns.
pub type KeyValue = Vec<Value>;

const LEAF_TAG: u8 = 0;
const INTERIOR_TAG: u8 = 1;

/// Persisted at [`crate::constants::STAT_BLOCK`] in every index file.
#[derive(Debug, Clone)]
pub struct BTreeStat {
    pub root_id: BlockId,
    pub height: u32,
    pub key_profile: Vec<DataType>,
}

impl BTreeStat {
    pub fn encode(&self) -> [u8; PAGE_SIZE] {
        let mut buf = [0u8; PAGE_SIZE];
        write_u32(&mut buf, 0, self.root_id);
        write_u32(&mut buf, 4, self.height);
        buf[8] = self.key_profile.len() as u8;
        for (i, dt) in self.key_profile.iter().enumerate() {
            buf[9 + i] = data_type_tag(*dt);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let root_id = read_u32(bytes, 0);
        let height = read_u32(bytes, 4);
        let n = bytes[8] as usize;
        let key_profile = (0..n).map(|i| data_type_from_tag(bytes[9 + i])).collect();
        Self {
            root_id,
            height,
            key_profile,
        }
    }
}

fn data_type_tag(dt: DataType) -> u8 {
    match dt {
        DataType::Int => 0,
        DataType::Text => 1,
        DataType::Bool => 2,
    }
}

fn data_type_from_tag(tag: u8) -> DataType {
    match tag {
        0 => DataType::Int,
        1 => DataType::Text,
        _ => DataType::Bool,
    }
}

/// Encode a key in the order dictated by `profile`.
pub fn encode_key(buf: &mut Vec<u8>, key: &KeyValue) {
    for value in key {
        match value {
            Value::Int(i) => buf.extend_from_slice(&i.to_le_bytes()),
            Value::Text(s) => write_text(buf, s),
            Value::Bool(b) => buf.push(if *b { 1 } else { 0 }),
        }
    }
}

/// Decode a key given the index's `profile`, advancing `offset`.
pub fn decode_key(bytes: &[u8], offset: &mut usize, profile: &[DataType]) -> KeyValue {
    profile
        .iter()
        .map(|dt| match dt {
            DataType::Int => {
                let v = read_i32(bytes, *offset);
                *offset += 4;
                Value::Int(v)
            }
            DataType::Text => {
                let (s, consumed) = read_text(bytes, *offset);
                *offset += consumed;
                Value::Text(s)
            }
            DataType::Bool => {
                let b = bytes[*offset] != 0;
                *offset += 1;
                Value::Bool(b)
            }
        })
        .collect()
}

fn encode_handle(buf: &mut Vec<u8>, handle: Handle) {
    buf.extend_from_slice(&handle.block_id.to_le_bytes());
    buf.extend_from_slice(&handle.record_id.to_le_bytes());
}

fn decode_handle(bytes: &[u8], offset: &mut usize) -> Handle {
    let block_id = read_u32(bytes, *offset);
    let record_id = u16::from_le_bytes([bytes[*offset + 4], bytes[*offset + 5]]);
    *offset += 6;
    Handle::new(block_id, record_id)
}

/// A leaf node: sorted `(KeyValue, Handle)` entries, plus a reserved
/// next-leaf pointer (range scans are unimplemented, so it is never
/// followed, but it is kept up to date on split).
#[derive(Debug, Clone, Default)]
pub struct BTreeLeaf {
    pub entries: Vec<(KeyValue, Handle)>,
    pub next: u64,
}

impl BTreeLeaf {
    pub fn encode(&self, _profile: &[DataType]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.push(LEAF_TAG);
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.next.to_le_bytes());
        for (key, handle) in &self.entries {
            encode_key(&mut buf, key);
            encode_handle(&mut buf, *handle);
        }
        buf.resize(PAGE_SIZE, 0);
        buf
    }

    pub fn decode(bytes: &[u8], profile: &[DataType]) -> Self {
        let count = read_u32(bytes, 1) as usize;
        let next = read_u64(bytes, 5);
        let mut offset = 13;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = decode_key(bytes, &mut offset, profile);
            let handle = decode_handle(bytes, &mut offset);
            entries.push((key, handle));
        }
        Self { entries, next }
    }

    /// Serialized size this leaf would occupy, used to decide whether a
    /// pending insertion overflows the page.
    pub fn encoded_len(&self, _profile: &[DataType]) -> usize {
        let mut len = 1 + 4 + 8;
        for (key, _) in &self.entries {
            let mut buf = Vec::new();
            encode_key(&mut buf, key);
            len += buf.len() + 6;
        }
        len
    }
}

/// An interior node: `n` sorted separator keys with `n+1` child block ids.
/// `first` is the child to the left of `keys[0]`.
#[derive(Debug, Clone, Default)]
pub struct BTreeInterior {
    pub first: BlockId,
    pub keys: Vec<KeyValue>,
    pub children: Vec<BlockId>,
}

impl BTreeInterior {
    /// All `n+1` child block ids, `first` followed by `children`.
    pub fn all_children(&self) -> Vec<BlockId> {
        let mut v = vec![self.first];
        v.extend(self.children.iter().copied());
        v
    }

    pub fn encode(&self, _profile: &[DataType]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.push(INTERIOR_TAG);
        buf.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.first.to_le_bytes());
        for (key, child) in self.keys.iter().zip(self.children.iter()) {
            encode_key(&mut buf, key);
            buf.extend_from_slice(&child.to_le_bytes());
        }
        buf.resize(PAGE_SIZE, 0);
        buf
    }

    pub fn decode(bytes: &[u8], profile: &[DataType]) -> Self {
        let count = read_u32(bytes, 1) as usize;
        let first = read_u32(bytes, 5);
        let mut offset = 9;
        let mut keys = Vec::with_capacity(count);
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let key = decode_key(bytes, &mut offset, profile);
            let child = read_u32(bytes, offset);
            offset += 4;
            keys.push(key);
            children.push(child);
        }
        Self {
            first,
            keys,
            children,
        }
    }

    pub fn encoded_len(&self, _profile: &[DataType]) -> usize {
        let mut len = 1 + 4 + 4;
        for key in &self.keys {
            let mut buf = Vec::new();
            encode_key(&mut buf, key);
            len += buf.len() + 4;
        }
        len
    }
}

/// Tag byte at offset 0 of any node block.
pub fn node_tag(bytes: &[u8]) -> u8 {
    bytes[0]
}

pub fn is_leaf(bytes: &[u8]) -> bool {
    node_tag(bytes) == LEAF_TAG
}

/// Validate a key dictionary against `key_columns`/`profile`, producing a
/// `KeyValue` in profile order.
pub fn tkey_from_row(
    key_columns: &[String],
    profile: &[DataType],
    row: &crate::value::Row,
) -> Result<KeyValue, RelationError> {
    let mut key = Vec::with_capacity(key_columns.len());
    for (col, expected) in key_columns.iter().zip(profile.iter()) {
        let value = row
            .get(col)
            .ok_or_else(|| RelationError::UnknownColumn(col.clone()))?;
        if value.data_type() != *expected {
            return Err(RelationError::TypeMismatch {
                column: col.clone(),
                expected: *expected,
                actual: value.data_type(),
            });
        }
        key.push(value.clone());
    }
    Ok(key)
}
