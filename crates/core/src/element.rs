use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::ids::ElementId;

/// Tombstones stay syncable for a day after deletion. Peers that were
/// offline longer than this may resurrect the element.
pub const DEFAULT_TOMBSTONE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Diamond,
    Ellipse,
    Text,
    Line,
    Arrow,
    Freedraw,
    Image,
    Frame,
    Embeddable,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Diamond => "diamond",
            Self::Ellipse => "ellipse",
            Self::Text => "text",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Freedraw => "freedraw",
            Self::Image => "image",
            Self::Frame => "frame",
            Self::Embeddable => "embeddable",
        }
    }

    /// Point-based kinds whose extent comes from `points`, not width/height.
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Line | Self::Arrow | Self::Freedraw)
    }
}

fn default_version() -> u64 {
    1
}

/// One drawable unit of a scene.
///
/// Elements are values: an edit produces a new `Element` with the same `id`
/// and a higher `version`. `version_nonce` is re-rolled on every edit so two
/// peers that reach the same `version` independently can still be ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default)]
    pub version_nonce: u32,
    #[serde(default)]
    pub is_deleted: bool,
    /// Wall-clock ms of the last edit. Only used for tombstone expiry.
    #[serde(default)]
    pub updated: i64,
    /// Fractional index giving the z-order within the scene.
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub points: Vec<(f64, f64)>,
    #[serde(default)]
    pub props: BTreeMap<String, FieldValue>,
}

impl Element {
    pub fn new(id: impl Into<ElementId>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            version: 1,
            version_nonce: rand::random(),
            is_deleted: false,
            updated: 0,
            index: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            points: Vec::new(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_points(mut self, points: Vec<(f64, f64)>) -> Self {
        self.points = points;
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_updated(mut self, updated: i64) -> Self {
        self.updated = updated;
        self
    }

    /// The next version of this element: version + 1, fresh nonce.
    pub fn bumped(&self, now_ms: i64) -> Self {
        let mut next = self.clone();
        next.version += 1;
        next.version_nonce = rand::random();
        next.updated = now_ms;
        next
    }

    /// Tombstone for this element. Content is kept so the tombstone still
    /// hashes uniquely.
    pub fn deleted(&self, now_ms: i64) -> Self {
        let mut next = self.bumped(now_ms);
        next.is_deleted = true;
        next
    }

    pub fn is_invisibly_small(&self) -> bool {
        if self.kind.is_linear() {
            self.points.len() < 2
        } else {
            self.width == 0.0 && self.height == 0.0
        }
    }

    /// Whether this element should be persisted and sent to peers.
    pub fn is_syncable(&self, now_ms: i64, tombstone_ttl_ms: i64) -> bool {
        if self.is_deleted {
            return self.updated > now_ms - tombstone_ttl_ms;
        }
        !self.is_invisibly_small()
    }
}

/// Identifiers of elements the local user is actively manipulating.
/// The reconciler never replaces these with a remote copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub editing_element_id: Option<ElementId>,
    pub resizing_element_id: Option<ElementId>,
    pub new_element_id: Option<ElementId>,
}

impl AppState {
    pub fn is_locally_active(&self, id: &ElementId) -> bool {
        [
            &self.editing_element_id,
            &self.resizing_element_id,
            &self.new_element_id,
        ]
        .into_iter()
        .any(|active| active.as_ref() == Some(id))
    }
}

/// An element set in which every member is persistable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncableElements(Vec<Element>);

impl SyncableElements {
    /// Keep only syncable elements, preserving order.
    pub fn filter(
        elements: impl IntoIterator<Item = Element>,
        now_ms: i64,
        tombstone_ttl_ms: i64,
    ) -> Self {
        Self(
            elements
                .into_iter()
                .filter(|el| el.is_syncable(now_ms, tombstone_ttl_ms))
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Element> {
        self.0
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.0.iter().find(|el| &el.id == id)
    }
}

impl Deref for SyncableElements {
    type Target = [Element];

    fn deref(&self) -> &[Element] {
        &self.0
    }
}

impl IntoIterator for SyncableElements {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Normalize elements read back from storage.
///
/// Duplicate ids keep their first occurrence; a zero version is lifted to 1.
/// With `drop_deleted`, tombstones are removed. That is only for hydrating a
/// display, never for reconciliation input.
pub fn restore_elements(elements: Vec<Element>, drop_deleted: bool) -> Vec<Element> {
    let mut seen = HashSet::new();
    elements
        .into_iter()
        .filter(|el| !(drop_deleted && el.is_deleted))
        .filter(|el| seen.insert(el.id.clone()))
        .map(|mut el| {
            if el.version == 0 {
                el.version = 1;
            }
            el
        })
        .collect()
}
