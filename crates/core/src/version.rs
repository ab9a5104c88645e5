use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::field_value::hash_bytes;

/// Content-derived fingerprint of a scene.
///
/// Only compared for equality (is the stored scene the one we hold?), never
/// used to order or merge scenes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneVersion(i64);

impl SceneVersion {
    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for SceneVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneVersion({:016x})", self.0)
    }
}

impl fmt::Display for SceneVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Compute the version of an element set.
///
/// Elements are hashed in id order, so the result does not depend on the
/// order of the slice; z-order is persisted through each element's `index`
/// and is covered that way.
pub fn scene_version(elements: &[Element]) -> SceneVersion {
    let mut sorted: Vec<&Element> = elements.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(sorted.len() as u64).to_be_bytes());
    for element in sorted {
        hash_element(&mut hasher, element);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    // Stored in a signed integer column.
    SceneVersion(i64::from_be_bytes(head))
}

/// Digest of a single element, used as the last-resort merge tie-break.
pub fn element_digest(element: &Element) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hash_element(&mut hasher, element);
    *hasher.finalize().as_bytes()
}

fn hash_element(hasher: &mut blake3::Hasher, el: &Element) {
    hash_bytes(hasher, el.id.as_str().as_bytes());
    hash_bytes(hasher, el.kind.as_str().as_bytes());
    hasher.update(&el.version.to_be_bytes());
    hasher.update(&el.version_nonce.to_be_bytes());
    hasher.update(&[el.is_deleted as u8]);
    hasher.update(&el.updated.to_be_bytes());
    match &el.index {
        Some(index) => {
            hasher.update(&[1]);
            hash_bytes(hasher, index.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    for coord in [el.x, el.y, el.width, el.height] {
        hasher.update(&coord.to_bits().to_be_bytes());
    }
    hasher.update(&(el.points.len() as u64).to_be_bytes());
    for (px, py) in &el.points {
        hasher.update(&px.to_bits().to_be_bytes());
        hasher.update(&py.to_bits().to_be_bytes());
    }
    hasher.update(&(el.props.len() as u64).to_be_bytes());
    for (key, value) in &el.props {
        hash_bytes(hasher, key.as_bytes());
        value.hash_into(hasher);
    }
}
