use serde::{Deserialize, Serialize};

use crate::ids::FileId;

/// Free-form element property (stroke color, text, font size, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    FileRef(FileId),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::FileRef(a), Self::FileRef(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    /// Feed a canonical, tagged encoding of this value into `hasher`.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            FieldValue::Null => {
                hasher.update(&[0]);
            }
            FieldValue::Text(s) => {
                hasher.update(&[1]);
                hash_bytes(hasher, s.as_bytes());
            }
            FieldValue::Integer(n) => {
                hasher.update(&[2]);
                hasher.update(&n.to_be_bytes());
            }
            FieldValue::Float(f) => {
                hasher.update(&[3]);
                hasher.update(&f.to_bits().to_be_bytes());
            }
            FieldValue::Boolean(b) => {
                hasher.update(&[4, *b as u8]);
            }
            FieldValue::FileRef(id) => {
                hasher.update(&[5]);
                hash_bytes(hasher, id.as_str().as_bytes());
            }
            FieldValue::Bytes(bytes) => {
                hasher.update(&[6]);
                hash_bytes(hasher, bytes);
            }
            FieldValue::List(items) => {
                hasher.update(&[7]);
                hasher.update(&(items.len() as u64).to_be_bytes());
                for item in items {
                    item.hash_into(hasher);
                }
            }
        }
    }
}

/// Length-prefixed so adjacent variable-length fields cannot alias.
pub(crate) fn hash_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
