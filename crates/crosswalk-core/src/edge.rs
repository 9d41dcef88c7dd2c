use crate::framework::ItemKey;
use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier; ascending in creation order, which the
/// validator relies on as the final deterministic sort tiebreaker.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(transparent)]
pub struct EdgeId(pub i64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    Equivalent,
    PartiallyOverlaps,
    Informs,
    Requires,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Equivalent => "equivalent",
            RelationshipKind::PartiallyOverlaps => "partially-overlaps",
            RelationshipKind::Informs => "informs",
            RelationshipKind::Requires => "requires",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "equivalent" => Ok(RelationshipKind::Equivalent),
            "partially-overlaps" | "partially_overlaps" => Ok(RelationshipKind::PartiallyOverlaps),
            "informs" => Ok(RelationshipKind::Informs),
            "requires" => Ok(RelationshipKind::Requires),
            other => Err(CoreError::InvalidValue {
                what: "relationship kind",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Authoritative,
    Derived,
    Heuristic,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Authoritative => "authoritative",
            Confidence::Derived => "derived",
            Confidence::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "authoritative" => Ok(Confidence::Authoritative),
            "derived" => Ok(Confidence::Derived),
            "heuristic" => Ok(Confidence::Heuristic),
            other => Err(CoreError::InvalidValue {
                what: "confidence",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Active,
    Retracted,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Active => "active",
            EdgeStatus::Retracted => "retracted",
        }
    }
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeStatus {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "active" => Ok(EdgeStatus::Active),
            "retracted" => Ok(EdgeStatus::Retracted),
            other => Err(CoreError::InvalidValue {
                what: "edge status",
                value: other.to_string(),
            }),
        }
    }
}

/// Curator input for a new correspondence. Construction rejects edges whose
/// endpoints live in the same framework; everything else is a data-quality
/// question for the validator, not a type error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEdge {
    pub source: ItemKey,
    pub target: ItemKey,
    pub kind: RelationshipKind,
    pub confidence: Confidence,
    pub provenance: String,
}

impl NewEdge {
    pub fn new(
        source: ItemKey,
        target: ItemKey,
        kind: RelationshipKind,
        confidence: Confidence,
        provenance: impl Into<String>,
    ) -> Result<Self, CoreError> {
        if source.framework == target.framework {
            return Err(CoreError::SameFramework(source.framework));
        }
        Ok(Self {
            source,
            target,
            kind,
            confidence,
            provenance: provenance.into(),
        })
    }
}

/// A persisted, directed correspondence edge. Retraction flips the status
/// flag; rows are never physically deleted so historical reports stay
/// reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEdge {
    pub id: EdgeId,
    pub source: ItemKey,
    pub target: ItemKey,
    pub kind: RelationshipKind,
    pub confidence: Confidence,
    pub provenance: String,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retracted_at: Option<DateTime<Utc>>,
}

impl MappingEdge {
    pub fn is_active(&self) -> bool {
        self.status == EdgeStatus::Active
    }

    /// The write-path uniqueness key: at most one active edge may exist per
    /// (source, target, kind) triple.
    pub fn identity(&self) -> (&ItemKey, &ItemKey, RelationshipKind) {
        (&self.source, &self.target, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::FrameworkCode;

    #[test]
    fn new_edge_rejects_same_framework_endpoints() {
        let err = NewEdge::new(
            ItemKey::new(FrameworkCode::Gri, "305-1"),
            ItemKey::new(FrameworkCode::Gri, "305-5"),
            RelationshipKind::Equivalent,
            Confidence::Derived,
            "",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SameFramework(FrameworkCode::Gri)));
    }

    #[test]
    fn relationship_kind_roundtrips_through_display_and_parse() {
        for kind in [
            RelationshipKind::Equivalent,
            RelationshipKind::PartiallyOverlaps,
            RelationshipKind::Informs,
            RelationshipKind::Requires,
        ] {
            assert_eq!(kind.as_str().parse::<RelationshipKind>().unwrap(), kind);
        }
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&RelationshipKind::PartiallyOverlaps).unwrap();
        assert_eq!(json, "\"partially-overlaps\"");
    }
}
