use crate::CoreError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Closed set of supported reporting standards. Adding a standard is a code
/// change, not a runtime/schema change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameworkCode {
    Sdg,
    Gri,
    Tsrs,
    Esrs,
}

impl FrameworkCode {
    pub const ALL: [FrameworkCode; 4] = [
        FrameworkCode::Sdg,
        FrameworkCode::Gri,
        FrameworkCode::Tsrs,
        FrameworkCode::Esrs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkCode::Sdg => "SDG",
            FrameworkCode::Gri => "GRI",
            FrameworkCode::Tsrs => "TSRS",
            FrameworkCode::Esrs => "ESRS",
        }
    }
}

impl fmt::Display for FrameworkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameworkCode {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_uppercase().as_str() {
            "SDG" => Ok(FrameworkCode::Sdg),
            "GRI" => Ok(FrameworkCode::Gri),
            "TSRS" => Ok(FrameworkCode::Tsrs),
            "ESRS" => Ok(FrameworkCode::Esrs),
            other => Err(CoreError::InvalidFramework(other.to_string())),
        }
    }
}

/// Unordered pair of distinct frameworks, the unit of validation scope.
/// Normalized on construction so `SDG:GRI` and `GRI:SDG` are the same pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameworkPair {
    pub a: FrameworkCode,
    pub b: FrameworkCode,
}

impl FrameworkPair {
    pub fn new(x: FrameworkCode, y: FrameworkCode) -> Result<Self, CoreError> {
        if x == y {
            return Err(CoreError::SameFramework(x));
        }
        if x.as_str() <= y.as_str() {
            Ok(Self { a: x, b: y })
        } else {
            Ok(Self { a: y, b: x })
        }
    }

    pub fn matches(&self, source: FrameworkCode, target: FrameworkCode) -> bool {
        (self.a == source && self.b == target) || (self.a == target && self.b == source)
    }
}

impl fmt::Display for FrameworkPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.a, self.b)
    }
}

impl FromStr for FrameworkPair {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (left, right) = input
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidPair(input.to_string()))?;
        FrameworkPair::new(left.parse()?, right.parse()?)
    }
}

/// Composite key identifying one item across the whole mapping graph.
/// Ordering is lexicographic on (framework code, item id) so that any
/// key-ordered listing is stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub framework: FrameworkCode,
    pub item_id: String,
}

impl ItemKey {
    pub fn new(framework: FrameworkCode, item_id: impl Into<String>) -> Self {
        Self {
            framework,
            item_id: item_id.into(),
        }
    }
}

impl Ord for ItemKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.framework
            .as_str()
            .cmp(other.framework.as_str())
            .then_with(|| self.item_id.cmp(&other.item_id))
    }
}

impl PartialOrd for ItemKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.framework, self.item_id)
    }
}

impl FromStr for ItemKey {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (code, id) = input
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidItemKey(input.to_string()))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(CoreError::InvalidItemKey(input.to_string()));
        }
        Ok(ItemKey::new(code.parse()?, id))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Deprecated,
    Superseded,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Deprecated => "deprecated",
            ItemStatus::Superseded => "superseded",
        }
    }
}

impl Default for ItemStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "active" => Ok(ItemStatus::Active),
            "deprecated" => Ok(ItemStatus::Deprecated),
            "superseded" => Ok(ItemStatus::Superseded),
            other => Err(CoreError::InvalidValue {
                what: "item status",
                value: other.to_string(),
            }),
        }
    }
}

/// One addressable unit of a reporting standard (goal, target, indicator,
/// disclosure, requirement). Items are only ever superseded, never deleted,
/// so historical mappings stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameworkItem {
    pub key: ItemKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<NaiveDate>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

impl FrameworkItem {
    pub fn new(key: ItemKey, title: impl Into<String>) -> Self {
        Self {
            key,
            parent_id: None,
            title: title.into(),
            effective_from: None,
            effective_to: None,
            status: ItemStatus::Active,
            superseded_by: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }
}
