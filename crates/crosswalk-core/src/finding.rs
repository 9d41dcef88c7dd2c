use crate::edge::{EdgeId, MappingEdge, RelationshipKind};
use crate::framework::ItemKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Report order is severity-major: every error before every warning before
/// every info. The derived `Ord` relies on declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    DanglingReference,
    OrphanItem,
    MissingReciprocal,
    TransitiveContradiction,
    DuplicateEdge,
    StaleReference,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::DanglingReference => "dangling-reference",
            FindingKind::OrphanItem => "orphan-item",
            FindingKind::MissingReciprocal => "missing-reciprocal",
            FindingKind::TransitiveContradiction => "transitive-contradiction",
            FindingKind::DuplicateEdge => "duplicate-edge",
            FindingKind::StaleReference => "stale-reference",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finding is about: a registry item or a mapping edge. Edge subjects
/// carry enough of the edge to render a report without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingSubject {
    Item { key: ItemKey },
    Edge {
        id: EdgeId,
        source: ItemKey,
        target: ItemKey,
        kind: RelationshipKind,
    },
}

impl FindingSubject {
    pub fn item(key: ItemKey) -> Self {
        FindingSubject::Item { key }
    }

    pub fn edge(edge: &MappingEdge) -> Self {
        FindingSubject::Edge {
            id: edge.id,
            source: edge.source.clone(),
            target: edge.target.clone(),
            kind: edge.kind,
        }
    }

    /// Key used for the deterministic report sort: the item key itself, or
    /// the edge's source key. Item subjects sort with edge id 0 so an item
    /// finding precedes edge findings on the same key.
    fn sort_key(&self) -> (&ItemKey, i64) {
        match self {
            FindingSubject::Item { key } => (key, 0),
            FindingSubject::Edge { id, source, .. } => (source, id.0),
        }
    }
}

impl fmt::Display for FindingSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingSubject::Item { key } => write!(f, "item {key}"),
            FindingSubject::Edge {
                id,
                source,
                target,
                kind,
            } => write!(f, "edge #{id} {source} -[{kind}]-> {target}"),
        }
    }
}

/// One detected structural or semantic defect in the mapping graph.
/// Ephemeral: produced fresh per validation run, never stored as a mutable
/// entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsistencyFinding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub subject: FindingSubject,
    pub message: String,
}

impl ConsistencyFinding {
    pub fn new(
        severity: Severity,
        kind: FindingKind,
        subject: FindingSubject,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            subject,
            message: message.into(),
        }
    }
}

impl Ord for ConsistencyFinding {
    fn cmp(&self, other: &Self) -> Ordering {
        let (key_a, edge_a) = self.subject.sort_key();
        let (key_b, edge_b) = other.subject.sort_key();
        self.severity
            .cmp(&other.severity)
            .then_with(|| key_a.cmp(key_b))
            .then_with(|| edge_a.cmp(&edge_b))
            .then_with(|| self.kind.as_str().cmp(other.kind.as_str()))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl PartialOrd for ConsistencyFinding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
