use crosswalk_core::{
    Confidence, FrameworkCode, FrameworkItem, ItemKey, MappingSnapshot, RelationshipKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemKey),
    #[error("fact source failure: {0}")]
    Facts(#[from] FactsError),
}

#[derive(Debug, Error)]
pub enum FactsError {
    #[error("fact backend failure: {0}")]
    Backend(String),
}

/// Externally-owned "company has reported data for item X" fact set. The
/// query layer only ever reads it; ownership and writes stay outside this
/// core.
pub trait MetricFacts {
    fn reported_items(&self, company_id: &str) -> Result<BTreeSet<ItemKey>, FactsError>;
}

/// Plain in-memory fact set for tests, tooling, and store adapters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFacts {
    by_company: std::collections::BTreeMap<String, BTreeSet<ItemKey>>,
}

impl InMemoryFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, company_id: &str, key: ItemKey) {
        self.by_company
            .entry(company_id.to_string())
            .or_default()
            .insert(key);
    }
}

impl MetricFacts for InMemoryFacts {
    fn reported_items(&self, company_id: &str) -> Result<BTreeSet<ItemKey>, FactsError> {
        Ok(self
            .by_company
            .get(company_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// One correspondence returned by `translate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Translation {
    pub item: FrameworkItem,
    pub kind: RelationshipKind,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    pub company_id: String,
    pub framework: FrameworkCode,
    pub covered: usize,
    pub total: usize,
    pub percentage: f64,
    pub covered_items: Vec<ItemKey>,
    pub uncovered_items: Vec<ItemKey>,
}

/// What does `source` correspond to in `target_framework`?
///
/// Follows only active edges whose target item exists and is active; edges
/// into missing or superseded items are silently skipped, exactly as the
/// validator flags them. An unmapped item yields an empty sequence, which is
/// a valid, reportable state, not a fault. A missing *source* item is the
/// caller's error.
pub fn translate(
    snapshot: &MappingSnapshot,
    source: &ItemKey,
    target_framework: FrameworkCode,
) -> Result<Vec<Translation>, QueryError> {
    if snapshot.item(source).is_none() {
        return Err(QueryError::ItemNotFound(source.clone()));
    }

    let mut translations: Vec<Translation> = snapshot
        .edges
        .iter()
        .filter(|edge| &edge.source == source && edge.target.framework == target_framework)
        .filter_map(|edge| {
            let item = snapshot.item(&edge.target)?;
            if !item.is_active() {
                return None;
            }
            Some(Translation {
                item: item.clone(),
                kind: edge.kind,
                confidence: edge.confidence,
            })
        })
        .collect();

    translations.sort_by(|a, b| {
        a.item
            .key
            .cmp(&b.item.key)
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
    });
    translations.dedup();
    Ok(translations)
}

/// Disclosure coverage of one company against one framework: the share of
/// the framework's active items reachable from data the company actually
/// submitted, through active edges between active items (traversed in both
/// directions; the framework set is small and fixed, so reachability is
/// bounded by a visited set rather than hop counting).
pub fn coverage(
    snapshot: &MappingSnapshot,
    facts: &dyn MetricFacts,
    company_id: &str,
    framework: FrameworkCode,
) -> Result<CoverageReport, QueryError> {
    let reported = facts.reported_items(company_id)?;
    let reachable = reachable_items(snapshot, &reported);
    debug!(
        company = company_id,
        reported = reported.len(),
        reachable = reachable.len(),
        "computed coverage reachability"
    );

    let mut covered_items = Vec::new();
    let mut uncovered_items = Vec::new();
    for item in snapshot.items.values() {
        if item.key.framework != framework || !item.is_active() {
            continue;
        }
        if reachable.contains(&item.key) {
            covered_items.push(item.key.clone());
        } else {
            uncovered_items.push(item.key.clone());
        }
    }

    let covered = covered_items.len();
    let total = covered + uncovered_items.len();
    let percentage = if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    };

    Ok(CoverageReport {
        company_id: company_id.to_string(),
        framework,
        covered,
        total,
        percentage,
        covered_items,
        uncovered_items,
    })
}

/// Breadth-first closure of the reported set over the mapping graph. Only
/// active items participate; a dangling or stale edge contributes nothing.
fn reachable_items(snapshot: &MappingSnapshot, reported: &BTreeSet<ItemKey>) -> BTreeSet<ItemKey> {
    let mut reachable: BTreeSet<ItemKey> = reported
        .iter()
        .filter(|key| snapshot.is_active_item(key))
        .cloned()
        .collect();
    let mut queue: VecDeque<ItemKey> = reachable.iter().cloned().collect();

    while let Some(current) = queue.pop_front() {
        for edge in &snapshot.edges {
            let neighbor = if edge.source == current {
                &edge.target
            } else if edge.target == current {
                &edge.source
            } else {
                continue;
            };
            if !snapshot.is_active_item(neighbor) || reachable.contains(neighbor) {
                continue;
            }
            reachable.insert(neighbor.clone());
            queue.push_back(neighbor.clone());
        }
    }
    reachable
}
