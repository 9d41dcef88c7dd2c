use chrono::{DateTime, Utc};
use crosswalk_core::{
    ConsistencyFinding, FindingKind, FindingSubject, FrameworkCode, FrameworkPair, ItemKey,
    ItemStatus, MappingEdge, MappingSnapshot, RelationshipKind, Severity,
};
use crosswalk_storage::{CrosswalkStore, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// A failed run never carries findings: either the whole report exists, or
/// an error does. "Run failed" and "clean run" are structurally distinct.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("snapshot read failure: {0}")]
    SnapshotRead(#[from] StorageError),
    #[error("validation run cancelled before completion")]
    Cancelled,
}

/// Cooperative cancellation: an explicit cancel flag plus an optional
/// deadline, checked inside every per-item and per-edge loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    fn checkpoint(&self) -> Result<(), ValidationError> {
        if self.is_cancelled() {
            Err(ValidationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Framework pairs in scope for this run.
    pub pairs: Vec<FrameworkPair>,
    /// Frameworks expected to be fully mapped; their unmapped active items
    /// raise orphan warnings.
    pub fully_mapped: BTreeSet<FrameworkCode>,
    /// Whether an equivalence chain A = B = C with no explicit A-C edge is
    /// flagged. Off by default: closure policy is a curation-workflow
    /// decision, and an absent edge is only suspicious where policy says the
    /// pair must be complete.
    pub require_equivalence_closure: bool,
}

impl ValidatorConfig {
    pub fn for_pairs(pairs: Vec<FrameworkPair>) -> Self {
        Self {
            pairs,
            fully_mapped: BTreeSet::new(),
            require_equivalence_closure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationStats {
    pub items_checked: usize,
    pub edges_checked: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

/// The immutable artifact of one completed validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub run_at: DateTime<Utc>,
    pub snapshot_fingerprint: String,
    pub checked_pairs: Vec<FrameworkPair>,
    pub stats: ValidationStats,
    pub findings: Vec<ConsistencyFinding>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    /// Serialization that excludes the run timestamp, so two runs over an
    /// unchanged snapshot are byte-identical and diffable.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Canonical<'a> {
            snapshot_fingerprint: &'a str,
            checked_pairs: &'a [FrameworkPair],
            stats: &'a ValidationStats,
            findings: &'a [ConsistencyFinding],
        }
        serde_json::to_string_pretty(&Canonical {
            snapshot_fingerprint: &self.snapshot_fingerprint,
            checked_pairs: &self.checked_pairs,
            stats: &self.stats,
            findings: &self.findings,
        })
    }
}

/// Adjacency over the snapshot's active edges, built once per run.
struct EdgeIndex<'a> {
    outgoing: BTreeMap<&'a ItemKey, Vec<&'a MappingEdge>>,
    incoming: BTreeMap<&'a ItemKey, Vec<&'a MappingEdge>>,
}

impl<'a> EdgeIndex<'a> {
    fn build(snapshot: &'a MappingSnapshot) -> Self {
        let mut outgoing: BTreeMap<&ItemKey, Vec<&MappingEdge>> = BTreeMap::new();
        let mut incoming: BTreeMap<&ItemKey, Vec<&MappingEdge>> = BTreeMap::new();
        for edge in &snapshot.edges {
            outgoing.entry(&edge.source).or_default().push(edge);
            incoming.entry(&edge.target).or_default().push(edge);
        }
        Self { outgoing, incoming }
    }

    fn has_any_edge(&self, key: &ItemKey) -> bool {
        self.outgoing.contains_key(key) || self.incoming.contains_key(key)
    }

    fn has_equivalent(&self, source: &ItemKey, target: &ItemKey) -> bool {
        self.outgoing
            .get(source)
            .map(|edges| {
                edges
                    .iter()
                    .any(|e| e.kind == RelationshipKind::Equivalent && &e.target == target)
            })
            .unwrap_or(false)
    }

    /// Explicit edges between two items, either direction.
    fn edges_between(&self, a: &ItemKey, b: &ItemKey) -> Vec<&'a MappingEdge> {
        let mut edges = Vec::new();
        if let Some(out) = self.outgoing.get(a) {
            edges.extend(out.iter().filter(|e| &e.target == b).copied());
        }
        if let Some(out) = self.outgoing.get(b) {
            edges.extend(out.iter().filter(|e| &e.target == a).copied());
        }
        edges
    }
}

/// The consistency validator: a pure function of a snapshot. Malformed data
/// produces findings; only infrastructure failure or cancellation aborts the
/// run, and an aborted run emits nothing.
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Convenience path: take the snapshot and validate it in one call.
    /// A store read failure surfaces as `SnapshotRead` and aborts the run.
    pub fn run_over_store(
        &self,
        store: &CrosswalkStore,
        cancel: &CancelToken,
    ) -> Result<ValidationReport, ValidationError> {
        let snapshot = store.snapshot(&self.config.pairs)?;
        self.run(&snapshot, cancel)
    }

    pub fn run(
        &self,
        snapshot: &MappingSnapshot,
        cancel: &CancelToken,
    ) -> Result<ValidationReport, ValidationError> {
        cancel.checkpoint()?;
        info!(
            fingerprint = %snapshot.fingerprint,
            items = snapshot.items.len(),
            edges = snapshot.edges.len(),
            "starting validation run"
        );

        let index = EdgeIndex::build(snapshot);
        let mut findings = Vec::new();

        self.check_dangling_references(snapshot, &mut findings, cancel)?;
        self.check_stale_references(snapshot, &mut findings, cancel)?;
        self.check_duplicate_edges(snapshot, &mut findings, cancel)?;
        self.check_missing_reciprocals(snapshot, &index, &mut findings, cancel)?;
        self.check_transitive_contradictions(snapshot, &index, &mut findings, cancel)?;
        self.check_orphan_items(snapshot, &index, &mut findings, cancel)?;

        findings.sort();

        let stats = ValidationStats {
            items_checked: snapshot.items.len(),
            edges_checked: snapshot.edges.len(),
            errors: count(&findings, Severity::Error),
            warnings: count(&findings, Severity::Warning),
            infos: count(&findings, Severity::Info),
        };
        info!(
            errors = stats.errors,
            warnings = stats.warnings,
            infos = stats.infos,
            "validation run complete"
        );

        Ok(ValidationReport {
            run_at: Utc::now(),
            snapshot_fingerprint: snapshot.fingerprint.clone(),
            checked_pairs: self.config.pairs.clone(),
            stats,
            findings,
        })
    }

    /// An edge endpoint that is absent from the registry, or present but
    /// deprecated, cannot anchor a correspondence. One error per bad edge.
    fn check_dangling_references(
        &self,
        snapshot: &MappingSnapshot,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        for edge in &snapshot.edges {
            cancel.checkpoint()?;
            let mut problems = Vec::new();
            for key in [&edge.source, &edge.target] {
                match snapshot.item(key) {
                    None => problems.push(format!("references missing item {key}")),
                    Some(item) if item.status == ItemStatus::Deprecated => {
                        problems.push(format!("references deprecated item {key}"))
                    }
                    Some(_) => {}
                }
            }
            if !problems.is_empty() {
                findings.push(ConsistencyFinding::new(
                    Severity::Error,
                    FindingKind::DanglingReference,
                    FindingSubject::edge(edge),
                    problems.join("; "),
                ));
            }
        }
        Ok(())
    }

    /// Superseded endpoints keep the edge historically valid but flag it for
    /// review against the superseding item.
    fn check_stale_references(
        &self,
        snapshot: &MappingSnapshot,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        for edge in &snapshot.edges {
            cancel.checkpoint()?;
            let mut notes = Vec::new();
            for key in [&edge.source, &edge.target] {
                if let Some(item) = snapshot.item(key) {
                    if item.status == ItemStatus::Superseded {
                        match &item.superseded_by {
                            Some(successor) => notes
                                .push(format!("{key} is superseded by {successor}")),
                            None => notes.push(format!("{key} is superseded")),
                        }
                    }
                }
            }
            if !notes.is_empty() {
                findings.push(ConsistencyFinding::new(
                    Severity::Info,
                    FindingKind::StaleReference,
                    FindingSubject::edge(edge),
                    format!("{}; review against the superseding item", notes.join("; ")),
                ));
            }
        }
        Ok(())
    }

    /// The store's unique index prevents duplicates on the normal write
    /// path; this re-check catches store-bypassing writes such as bulk
    /// imports. Exactly one finding per duplicate group, attributed to the
    /// latest edge regardless of snapshot order.
    fn check_duplicate_edges(
        &self,
        snapshot: &MappingSnapshot,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        let mut groups: BTreeMap<(String, String, &str), Vec<&MappingEdge>> = BTreeMap::new();
        for edge in &snapshot.edges {
            cancel.checkpoint()?;
            groups
                .entry((
                    edge.source.to_string(),
                    edge.target.to_string(),
                    edge.kind.as_str(),
                ))
                .or_default()
                .push(edge);
        }

        for ((source, target, kind), group) in groups {
            cancel.checkpoint()?;
            if group.len() < 2 {
                continue;
            }
            let earliest = group.iter().map(|e| e.id).min().unwrap_or_default();
            let latest = group
                .iter()
                .max_by_key(|e| e.id)
                .copied()
                .unwrap_or(group[0]);
            findings.push(ConsistencyFinding::new(
                Severity::Error,
                FindingKind::DuplicateEdge,
                FindingSubject::edge(latest),
                format!(
                    "{} active edges share ({source}, {target}, {kind}); first was edge #{earliest}",
                    group.len()
                ),
            ));
        }
        Ok(())
    }

    /// Equivalence is expected to be symmetric; a one-way equivalent edge
    /// usually means an incomplete curation pass.
    fn check_missing_reciprocals(
        &self,
        snapshot: &MappingSnapshot,
        index: &EdgeIndex<'_>,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        for edge in &snapshot.edges {
            cancel.checkpoint()?;
            if edge.kind != RelationshipKind::Equivalent {
                continue;
            }
            if !index.has_equivalent(&edge.target, &edge.source) {
                findings.push(ConsistencyFinding::new(
                    Severity::Warning,
                    FindingKind::MissingReciprocal,
                    FindingSubject::edge(edge),
                    format!(
                        "equivalent declared {} -> {} but no reverse equivalent edge exists",
                        edge.source, edge.target
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Two-hop lookahead over equivalence chains spanning three frameworks.
    /// A triple A = B = C with an explicit A-C edge of a different kind is
    /// surfaced for curator review, never auto-resolved.
    fn check_transitive_contradictions(
        &self,
        snapshot: &MappingSnapshot,
        index: &EdgeIndex<'_>,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        let mut seen_triples: BTreeSet<(String, String, String)> = BTreeSet::new();

        for ab in &snapshot.edges {
            cancel.checkpoint()?;
            if ab.kind != RelationshipKind::Equivalent {
                continue;
            }
            let Some(bc_edges) = index.outgoing.get(&ab.target) else {
                continue;
            };
            for bc in bc_edges {
                cancel.checkpoint()?;
                if bc.kind != RelationshipKind::Equivalent {
                    continue;
                }
                let (a, b, c) = (&ab.source, &ab.target, &bc.target);
                if c.framework == a.framework || c == a {
                    continue;
                }

                // One verdict per unordered (A, C) endpoint pair via B.
                let (lo, hi) = if a <= c { (a, c) } else { (c, a) };
                if !seen_triples.insert((lo.to_string(), hi.to_string(), b.to_string())) {
                    continue;
                }

                let direct = index.edges_between(a, c);
                if direct
                    .iter()
                    .any(|e| e.kind == RelationshipKind::Equivalent)
                {
                    continue;
                }
                if let Some(conflicting) = direct.first() {
                    findings.push(ConsistencyFinding::new(
                        Severity::Warning,
                        FindingKind::TransitiveContradiction,
                        FindingSubject::edge(conflicting),
                        format!(
                            "{a} = {b} = {c} implies equivalence, but the explicit edge is '{}'",
                            conflicting.kind
                        ),
                    ));
                } else if self.config.require_equivalence_closure
                    && self.pair_in_scope(a.framework, c.framework)
                {
                    findings.push(ConsistencyFinding::new(
                        Severity::Warning,
                        FindingKind::TransitiveContradiction,
                        FindingSubject::item(a.clone()),
                        format!("{a} = {b} = {c} holds but no explicit {a} <-> {c} edge exists"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Active items of a framework designated fully-mapped must carry at
    /// least one active edge in either direction.
    fn check_orphan_items(
        &self,
        snapshot: &MappingSnapshot,
        index: &EdgeIndex<'_>,
        findings: &mut Vec<ConsistencyFinding>,
        cancel: &CancelToken,
    ) -> Result<(), ValidationError> {
        for item in snapshot.items.values() {
            cancel.checkpoint()?;
            if !self.config.fully_mapped.contains(&item.key.framework) || !item.is_active() {
                continue;
            }
            if !index.has_any_edge(&item.key) {
                findings.push(ConsistencyFinding::new(
                    Severity::Warning,
                    FindingKind::OrphanItem,
                    FindingSubject::item(item.key.clone()),
                    format!(
                        "active item {} of fully-mapped framework {} has no mapping edges",
                        item.key, item.key.framework
                    ),
                ));
            }
        }
        Ok(())
    }

    fn pair_in_scope(&self, a: FrameworkCode, b: FrameworkCode) -> bool {
        self.config.pairs.iter().any(|pair| pair.matches(a, b))
    }
}

fn count(findings: &[ConsistencyFinding], severity: Severity) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crosswalk_core::{Confidence, EdgeId, EdgeStatus, FrameworkItem};

    fn key(raw: &str) -> ItemKey {
        raw.parse().expect("item key")
    }

    fn active_item(raw: &str) -> FrameworkItem {
        FrameworkItem::new(key(raw), format!("item {raw}"))
    }

    fn edge(id: i64, source: &str, target: &str, kind: RelationshipKind) -> MappingEdge {
        MappingEdge {
            id: EdgeId(id),
            source: key(source),
            target: key(target),
            kind,
            confidence: Confidence::Authoritative,
            provenance: String::new(),
            status: EdgeStatus::Active,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            retracted_at: None,
        }
    }

    fn snapshot_of(items: Vec<FrameworkItem>, edges: Vec<MappingEdge>) -> MappingSnapshot {
        let items = items
            .into_iter()
            .map(|item| (item.key.clone(), item))
            .collect();
        MappingSnapshot::new(
            items,
            edges,
            vec![
                FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Gri).unwrap(),
                FrameworkPair::new(FrameworkCode::Gri, FrameworkCode::Tsrs).unwrap(),
                FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Tsrs).unwrap(),
            ],
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    fn validator() -> Validator {
        Validator::new(ValidatorConfig::for_pairs(vec![
            FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Gri).unwrap(),
            FrameworkPair::new(FrameworkCode::Gri, FrameworkCode::Tsrs).unwrap(),
            FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Tsrs).unwrap(),
        ]))
    }

    #[test]
    fn one_way_equivalence_yields_exactly_one_reciprocal_warning() {
        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2"), active_item("GRI:305-5")],
            vec![edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent)],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");

        assert_eq!(report.stats.errors, 0);
        assert_eq!(report.stats.warnings, 1);
        let finding = &report.findings[0];
        assert_eq!(finding.kind, FindingKind::MissingReciprocal);
        match &finding.subject {
            FindingSubject::Edge { source, target, .. } => {
                assert_eq!(source.to_string(), "SDG:13.2");
                assert_eq!(target.to_string(), "GRI:305-5");
            }
            other => panic!("unexpected subject: {other:?}"),
        }
    }

    #[test]
    fn reciprocal_equivalence_is_clean() {
        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2"), active_item("GRI:305-5")],
            vec![
                edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
                edge(2, "GRI:305-5", "SDG:13.2", RelationshipKind::Equivalent),
            ],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");
        assert!(report.findings.is_empty());
        assert!(!report.has_errors());
    }

    #[test]
    fn edge_to_unknown_item_is_one_dangling_error_naming_it() {
        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2")],
            vec![edge(1, "SDG:13.2", "GRI:999-9", RelationshipKind::Informs)],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");

        let dangling: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::DanglingReference)
            .collect();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].severity, Severity::Error);
        assert!(dangling[0].message.contains("GRI:999-9"));
    }

    #[test]
    fn deprecated_endpoint_is_dangling_but_superseded_is_stale() {
        let mut deprecated = active_item("GRI:102-1");
        deprecated.status = ItemStatus::Deprecated;
        let mut superseded = active_item("GRI:305-5");
        superseded.status = ItemStatus::Superseded;
        superseded.superseded_by = Some("305-5-rev2".to_string());

        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2"), deprecated, superseded],
            vec![
                edge(1, "SDG:13.2", "GRI:102-1", RelationshipKind::Informs),
                edge(2, "SDG:13.2", "GRI:305-5", RelationshipKind::Informs),
            ],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");

        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.infos, 1);
        let stale = report
            .findings
            .iter()
            .find(|f| f.kind == FindingKind::StaleReference)
            .expect("stale finding");
        assert_eq!(stale.severity, Severity::Info);
        assert!(stale.message.contains("305-5-rev2"));
    }

    #[test]
    fn duplicate_edges_yield_one_finding_regardless_of_order() {
        let items = vec![active_item("SDG:13.2"), active_item("GRI:305-5")];
        let forward = vec![
            edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Informs),
            edge(2, "SDG:13.2", "GRI:305-5", RelationshipKind::Informs),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        for edges in [forward, reversed] {
            let report = validator()
                .run(&snapshot_of(items.clone(), edges), &CancelToken::new())
                .expect("run");
            let duplicates: Vec<_> = report
                .findings
                .iter()
                .filter(|f| f.kind == FindingKind::DuplicateEdge)
                .collect();
            assert_eq!(duplicates.len(), 1);
            match &duplicates[0].subject {
                FindingSubject::Edge { id, .. } => assert_eq!(id.0, 2),
                other => panic!("unexpected subject: {other:?}"),
            }
        }
    }

    #[test]
    fn contradicting_direct_edge_behind_equivalence_chain_is_flagged() {
        let snapshot = snapshot_of(
            vec![
                active_item("SDG:13.2"),
                active_item("GRI:305-5"),
                active_item("TSRS:E1-6"),
            ],
            vec![
                edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
                edge(2, "GRI:305-5", "SDG:13.2", RelationshipKind::Equivalent),
                edge(3, "GRI:305-5", "TSRS:E1-6", RelationshipKind::Equivalent),
                edge(4, "TSRS:E1-6", "GRI:305-5", RelationshipKind::Equivalent),
                edge(5, "SDG:13.2", "TSRS:E1-6", RelationshipKind::Informs),
            ],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");

        let contradictions: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::TransitiveContradiction)
            .collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].severity, Severity::Warning);
        match &contradictions[0].subject {
            FindingSubject::Edge { id, kind, .. } => {
                assert_eq!(id.0, 5);
                assert_eq!(*kind, RelationshipKind::Informs);
            }
            other => panic!("unexpected subject: {other:?}"),
        }
    }

    #[test]
    fn missing_closure_is_silent_unless_policy_requires_it() {
        let items = vec![
            active_item("SDG:13.2"),
            active_item("GRI:305-5"),
            active_item("TSRS:E1-6"),
        ];
        let edges = vec![
            edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
            edge(2, "GRI:305-5", "SDG:13.2", RelationshipKind::Equivalent),
            edge(3, "GRI:305-5", "TSRS:E1-6", RelationshipKind::Equivalent),
            edge(4, "TSRS:E1-6", "GRI:305-5", RelationshipKind::Equivalent),
        ];

        let report = validator()
            .run(&snapshot_of(items.clone(), edges.clone()), &CancelToken::new())
            .expect("default run");
        assert!(report
            .findings
            .iter()
            .all(|f| f.kind != FindingKind::TransitiveContradiction));

        let mut config = ValidatorConfig::for_pairs(vec![
            FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Gri).unwrap(),
            FrameworkPair::new(FrameworkCode::Gri, FrameworkCode::Tsrs).unwrap(),
            FrameworkPair::new(FrameworkCode::Sdg, FrameworkCode::Tsrs).unwrap(),
        ]);
        config.require_equivalence_closure = true;
        let strict = Validator::new(config)
            .run(&snapshot_of(items, edges), &CancelToken::new())
            .expect("strict run");
        let closures: Vec<_> = strict
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::TransitiveContradiction)
            .collect();
        assert_eq!(closures.len(), 1);
    }

    #[test]
    fn orphan_items_flagged_only_for_fully_mapped_frameworks() {
        let items = vec![
            active_item("SDG:13.2"),
            active_item("SDG:14.1"),
            active_item("GRI:305-5"),
            active_item("GRI:201-1"),
        ];
        let edges = vec![
            edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
            edge(2, "GRI:305-5", "SDG:13.2", RelationshipKind::Equivalent),
        ];

        let report = validator()
            .run(&snapshot_of(items.clone(), edges.clone()), &CancelToken::new())
            .expect("default run");
        assert!(report
            .findings
            .iter()
            .all(|f| f.kind != FindingKind::OrphanItem));

        let mut config = ValidatorConfig::for_pairs(vec![FrameworkPair::new(
            FrameworkCode::Sdg,
            FrameworkCode::Gri,
        )
        .unwrap()]);
        config.fully_mapped.insert(FrameworkCode::Sdg);
        let report = Validator::new(config)
            .run(&snapshot_of(items, edges), &CancelToken::new())
            .expect("orphan run");

        let orphans: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::OrphanItem)
            .collect();
        assert_eq!(orphans.len(), 1);
        match &orphans[0].subject {
            FindingSubject::Item { key } => assert_eq!(key.to_string(), "SDG:14.1"),
            other => panic!("unexpected subject: {other:?}"),
        }
    }

    #[test]
    fn repeated_runs_produce_byte_identical_canonical_reports() {
        let snapshot = snapshot_of(
            vec![
                active_item("SDG:13.2"),
                active_item("GRI:305-5"),
                active_item("TSRS:E1-6"),
            ],
            vec![
                edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
                edge(2, "SDG:13.2", "GRI:999-9", RelationshipKind::Informs),
                edge(3, "GRI:305-5", "TSRS:E1-6", RelationshipKind::Requires),
            ],
        );

        let validator = validator();
        let first = validator.run(&snapshot, &CancelToken::new()).expect("first");
        let second = validator
            .run(&snapshot, &CancelToken::new())
            .expect("second");

        assert_eq!(
            first.canonical_json().expect("json"),
            second.canonical_json().expect("json")
        );
    }

    #[test]
    fn findings_are_ordered_severity_major() {
        let mut superseded = active_item("GRI:403-1");
        superseded.status = ItemStatus::Superseded;
        let snapshot = snapshot_of(
            vec![
                active_item("SDG:13.2"),
                active_item("GRI:305-5"),
                superseded,
            ],
            vec![
                edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent),
                edge(2, "SDG:13.2", "GRI:999-9", RelationshipKind::Informs),
                edge(3, "SDG:13.2", "GRI:403-1", RelationshipKind::Informs),
            ],
        );

        let report = validator()
            .run(&snapshot, &CancelToken::new())
            .expect("run");

        let severities: Vec<Severity> = report.findings.iter().map(|f| f.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
        assert_eq!(report.findings.first().map(|f| f.severity), Some(Severity::Error));
    }

    #[test]
    fn cancelled_token_aborts_with_no_findings() {
        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2"), active_item("GRI:305-5")],
            vec![edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent)],
        );

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = validator().run(&snapshot, &cancel).unwrap_err();
        assert!(matches!(err, ValidationError::Cancelled));
    }

    #[test]
    fn expired_deadline_cancels_the_run() {
        let snapshot = snapshot_of(
            vec![active_item("SDG:13.2"), active_item("GRI:305-5")],
            vec![edge(1, "SDG:13.2", "GRI:305-5", RelationshipKind::Equivalent)],
        );

        let cancel = CancelToken::with_timeout(Duration::from_secs(0));
        let err = validator().run(&snapshot, &cancel).unwrap_err();
        assert!(matches!(err, ValidationError::Cancelled));
    }
}
