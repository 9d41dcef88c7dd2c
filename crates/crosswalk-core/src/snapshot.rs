use crate::edge::MappingEdge;
use crate::framework::{FrameworkItem, FrameworkPair, ItemKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Consistent read of the registry plus all active edges in scope, taken in
/// one storage transaction. The validator and query layer are pure functions
/// over this value; they never reach back into the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingSnapshot {
    pub items: BTreeMap<ItemKey, FrameworkItem>,
    /// Active edges in creation order.
    pub edges: Vec<MappingEdge>,
    pub pairs: Vec<FrameworkPair>,
    pub taken_at: DateTime<Utc>,
    /// SHA-256 over the canonical item/edge listing. Two snapshots of
    /// unchanged data carry the same fingerprint, which is what makes
    /// validation reports diffable audit artifacts.
    pub fingerprint: String,
}

impl MappingSnapshot {
    pub fn new(
        items: BTreeMap<ItemKey, FrameworkItem>,
        edges: Vec<MappingEdge>,
        pairs: Vec<FrameworkPair>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        let fingerprint = snapshot_fingerprint(&items, &edges);
        Self {
            items,
            edges,
            pairs,
            taken_at,
            fingerprint,
        }
    }

    pub fn item(&self, key: &ItemKey) -> Option<&FrameworkItem> {
        self.items.get(key)
    }

    pub fn is_active_item(&self, key: &ItemKey) -> bool {
        self.items.get(key).map(|i| i.is_active()).unwrap_or(false)
    }
}

/// Canonical content hash of a snapshot. Items are hashed in key order (the
/// map is already ordered), edges in creation order.
pub fn snapshot_fingerprint(
    items: &BTreeMap<ItemKey, FrameworkItem>,
    edges: &[MappingEdge],
) -> String {
    let mut hasher = Sha256::new();
    for (key, item) in items {
        hasher.update(b"item|");
        hasher.update(key.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(item.status.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(item.parent_id.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(item.superseded_by.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(item.title.as_bytes());
        hasher.update(b"\n");
    }
    for edge in edges {
        hasher.update(b"edge|");
        hasher.update(edge.id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(edge.source.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(edge.target.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(edge.kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(edge.confidence.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(edge.status.as_str().as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{Confidence, EdgeId, EdgeStatus, RelationshipKind};
    use crate::framework::FrameworkCode;
    use chrono::TimeZone;

    fn sample_item(id: &str) -> FrameworkItem {
        FrameworkItem::new(ItemKey::new(FrameworkCode::Sdg, id), format!("target {id}"))
    }

    fn sample_edge(id: i64) -> MappingEdge {
        MappingEdge {
            id: EdgeId(id),
            source: ItemKey::new(FrameworkCode::Sdg, "13.2"),
            target: ItemKey::new(FrameworkCode::Gri, "305-5"),
            kind: RelationshipKind::Equivalent,
            confidence: Confidence::Authoritative,
            provenance: String::new(),
            status: EdgeStatus::Active,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            retracted_at: None,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_unchanged_data() {
        let mut items = BTreeMap::new();
        items.insert(sample_item("13.2").key.clone(), sample_item("13.2"));
        let edges = vec![sample_edge(1)];

        let a = snapshot_fingerprint(&items, &edges);
        let b = snapshot_fingerprint(&items, &edges);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_changes_when_an_edge_changes() {
        let mut items = BTreeMap::new();
        items.insert(sample_item("13.2").key.clone(), sample_item("13.2"));

        let base = snapshot_fingerprint(&items, &[sample_edge(1)]);
        let mut retracted = sample_edge(1);
        retracted.status = EdgeStatus::Retracted;
        let changed = snapshot_fingerprint(&items, &[retracted]);
        assert_ne!(base, changed);
    }

    #[test]
    fn snapshot_taken_at_does_not_affect_fingerprint() {
        let mut items = BTreeMap::new();
        items.insert(sample_item("13.2").key.clone(), sample_item("13.2"));
        let edges = vec![sample_edge(1)];

        let early = MappingSnapshot::new(
            items.clone(),
            edges.clone(),
            Vec::new(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        );
        let late = MappingSnapshot::new(
            items,
            edges,
            Vec::new(),
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        );
        assert_eq!(early.fingerprint, late.fingerprint);
    }
}
