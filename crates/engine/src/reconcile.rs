use std::cmp::Ordering;
use std::collections::BTreeMap;

use roomstore_core::version::element_digest;
use roomstore_core::{AppState, Element, ElementId};

/// Total order over two copies of the same element: `Greater` means `a`
/// wins.
///
/// Higher `version` wins. At equal versions the lower `version_nonce` wins.
/// If both match, the lower content digest wins, so only byte-identical
/// copies compare `Equal`. Nothing here depends on which side is local or
/// on arrival order.
pub fn precedence(a: &Element, b: &Element) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| b.version_nonce.cmp(&a.version_nonce))
        .then_with(|| element_digest(b).cmp(&element_digest(a)))
}

fn insert_winner(merged: &mut BTreeMap<ElementId, Element>, candidate: &Element) {
    match merged.get(&candidate.id) {
        Some(current) if precedence(current, candidate) != Ordering::Less => {}
        _ => {
            merged.insert(candidate.id.clone(), candidate.clone());
        }
    }
}

/// Merge a local candidate scene with the remote stored scene.
///
/// Every id from either side appears exactly once. Tombstones are kept;
/// pruning them is the syncable filter's job, never this function's.
/// Elements named in `app_state` keep their local copy; with an empty
/// `app_state` the result is symmetric in its arguments.
///
/// Output is ordered by fractional index, then id. Elements without an
/// index sort last.
pub fn reconcile(local: &[Element], remote: &[Element], app_state: &AppState) -> Vec<Element> {
    let mut merged: BTreeMap<ElementId, Element> = BTreeMap::new();
    for element in local.iter().chain(remote) {
        insert_winner(&mut merged, element);
    }

    // In-progress local edits override whatever the remote holds.
    let mut pinned: BTreeMap<&ElementId, &Element> = BTreeMap::new();
    for element in local.iter().filter(|el| app_state.is_locally_active(&el.id)) {
        match pinned.get(&element.id) {
            Some(current) if precedence(current, element) != Ordering::Less => {}
            _ => {
                pinned.insert(&element.id, element);
            }
        }
    }
    for (id, element) in pinned {
        merged.insert(id.clone(), element.clone());
    }

    let mut result: Vec<Element> = merged.into_values().collect();
    result.sort_by(|a, b| match (&a.index, &b.index) {
        (Some(ia), Some(ib)) => ia.cmp(ib).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomstore_core::{ElementKind, FieldValue};
    use std::collections::HashMap;

    const NOW: i64 = 1_700_000_000_000;

    fn rect(id: &str, index: &str) -> Element {
        Element::new(id, ElementKind::Rectangle)
            .with_bounds(0.0, 0.0, 10.0, 10.0)
            .with_index(index)
            .with_updated(NOW)
    }

    fn by_id(elements: &[Element]) -> HashMap<String, Element> {
        elements
            .iter()
            .map(|el| (el.id.to_string(), el.clone()))
            .collect()
    }

    #[test]
    fn reconcile_with_self_is_identity() {
        let scene = vec![rect("a", "a0"), rect("b", "a1"), rect("c", "a2").deleted(NOW)];
        let merged = reconcile(&scene, &scene, &AppState::default());
        assert_eq!(by_id(&merged), by_id(&scene));
    }

    #[test]
    fn union_without_duplicates() {
        let local = vec![rect("a", "a0"), rect("b", "a1")];
        let remote = vec![rect("b", "a1"), rect("c", "a2")];
        let merged = reconcile(&local, &remote, &AppState::default());
        let ids: Vec<&str> = merged.iter().map(|el| el.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn higher_version_wins_either_side() {
        let base = rect("a", "a0");
        let edited = base.bumped(NOW + 1).with_prop("color", FieldValue::Text("red".into()));

        let merged = reconcile(&[base.clone()], &[edited.clone()], &AppState::default());
        assert_eq!(merged, vec![edited.clone()]);

        let merged = reconcile(&[edited.clone()], &[base], &AppState::default());
        assert_eq!(merged, vec![edited]);
    }

    #[test]
    fn equal_versions_break_ties_by_nonce() {
        let base = rect("a", "a0");
        let mut left = base.bumped(NOW);
        let mut right = base.bumped(NOW);
        left.version_nonce = 10;
        right.version_nonce = 20;
        right.x = 99.0;

        let ab = reconcile(&[left.clone()], &[right.clone()], &AppState::default());
        let ba = reconcile(&[right], &[left.clone()], &AppState::default());
        assert_eq!(ab, vec![left.clone()]);
        assert_eq!(ba, vec![left]);
    }

    #[test]
    fn full_tie_breaks_by_digest_symmetrically() {
        let base = rect("a", "a0");
        let mut left = base.clone();
        let mut right = base.clone();
        left.version_nonce = 7;
        right.version_nonce = 7;
        right.width = 42.0;

        let ab = reconcile(&[left.clone()], &[right.clone()], &AppState::default());
        let ba = reconcile(&[right], &[left], &AppState::default());
        assert_eq!(ab, ba);
    }

    #[test]
    fn tombstone_is_not_resurrected() {
        let original = rect("a", "a0");
        let tombstone = original.deleted(NOW + 10);

        let merged = reconcile(&[tombstone.clone()], &[original.clone()], &AppState::default());
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_deleted);

        let merged = reconcile(&[original], &[tombstone], &AppState::default());
        assert!(merged[0].is_deleted);
    }

    #[test]
    fn converges_regardless_of_order() {
        let a0 = rect("a", "a0");
        let b0 = rect("b", "a1");
        let snapshot_1 = vec![a0.bumped(NOW), b0.clone()];
        let snapshot_2 = vec![a0.clone(), b0.deleted(NOW), rect("c", "a2")];
        let local = vec![a0.clone(), b0.bumped(NOW)];
        let state = AppState::default();

        let one_then_two = reconcile(&reconcile(&local, &snapshot_1, &state), &snapshot_2, &state);
        let two_then_one = reconcile(&reconcile(&local, &snapshot_2, &state), &snapshot_1, &state);
        assert_eq!(by_id(&one_then_two), by_id(&two_then_one));
    }

    #[test]
    fn locally_edited_element_is_kept() {
        let base = rect("a", "a0");
        let local_draft = base.bumped(NOW).with_prop("text", FieldValue::Text("typing".into()));
        let remote_newer = local_draft.bumped(NOW).bumped(NOW);
        let state = AppState {
            editing_element_id: Some("a".into()),
            ..Default::default()
        };

        let merged = reconcile(&[local_draft.clone()], &[remote_newer.clone()], &state);
        assert_eq!(merged, vec![local_draft]);

        let merged = reconcile(&[base], &[remote_newer.clone()], &AppState::default());
        assert_eq!(merged, vec![remote_newer]);
    }

    #[test]
    fn ordered_by_index_then_id() {
        let local = vec![rect("z", "a0"), Element::new("n", ElementKind::Ellipse)];
        let remote = vec![rect("y", "a0"), rect("x", "Zz")];
        let merged = reconcile(&local, &remote, &AppState::default());
        let ids: Vec<&str> = merged.iter().map(|el| el.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z", "n"]);
    }
}
