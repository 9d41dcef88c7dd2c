//! Small demonstration dataset: a handful of climate-and-energy items from
//! each supported standard, the published correspondences between them, and
//! one reporting company. Safe to run repeatedly; existing edges are kept.

use anyhow::Result;
use crosswalk_core::{Confidence, FrameworkCode, FrameworkItem, ItemKey, NewEdge, RelationshipKind};
use crosswalk_storage::{CrosswalkStore, StorageError};

pub struct SeedSummary {
    pub items: usize,
    pub edges: usize,
}

pub fn seed(store: &CrosswalkStore) -> Result<SeedSummary> {
    let items = seed_items(store)?;
    let edges = seed_edges(store)?;
    store.record_metric(
        "demo-corp",
        &key(FrameworkCode::Gri, "305-5"),
        "2024",
        Some("12.5"),
    )?;
    store.record_metric("demo-corp", &key(FrameworkCode::Gri, "302-1"), "2024", None)?;
    Ok(SeedSummary { items, edges })
}

fn key(framework: FrameworkCode, id: &str) -> ItemKey {
    ItemKey::new(framework, id)
}

fn seed_items(store: &CrosswalkStore) -> Result<usize> {
    use FrameworkCode::*;

    let items = vec![
        FrameworkItem::new(key(Sdg, "7"), "Affordable and Clean Energy"),
        FrameworkItem::new(
            key(Sdg, "7.2"),
            "Increase substantially the share of renewable energy",
        )
        .with_parent("7"),
        FrameworkItem::new(
            key(Sdg, "7.3"),
            "Double the global rate of improvement in energy efficiency",
        )
        .with_parent("7"),
        FrameworkItem::new(key(Sdg, "13"), "Climate Action"),
        FrameworkItem::new(
            key(Sdg, "13.1"),
            "Strengthen resilience and adaptive capacity to climate-related hazards",
        )
        .with_parent("13"),
        FrameworkItem::new(
            key(Sdg, "13.2"),
            "Integrate climate change measures into policies and planning",
        )
        .with_parent("13"),
        FrameworkItem::new(key(Gri, "302"), "GRI 302: Energy 2016"),
        FrameworkItem::new(key(Gri, "302-1"), "Energy consumption within the organization")
            .with_parent("302"),
        FrameworkItem::new(key(Gri, "302-3"), "Energy intensity").with_parent("302"),
        FrameworkItem::new(key(Gri, "305"), "GRI 305: Emissions 2016"),
        FrameworkItem::new(key(Gri, "305-1"), "Direct (Scope 1) GHG emissions").with_parent("305"),
        FrameworkItem::new(key(Gri, "305-5"), "Reduction of GHG emissions").with_parent("305"),
        FrameworkItem::new(key(Tsrs, "S2"), "TSRS 2: Climate-related Disclosures"),
        FrameworkItem::new(key(Tsrs, "S2-29"), "Greenhouse gas emissions metrics")
            .with_parent("S2"),
        FrameworkItem::new(key(Esrs, "E1"), "ESRS E1: Climate Change"),
        FrameworkItem::new(
            key(Esrs, "E1-4"),
            "Targets related to climate change mitigation and adaptation",
        )
        .with_parent("E1"),
        FrameworkItem::new(
            key(Esrs, "E1-6"),
            "Gross Scopes 1, 2, 3 and total GHG emissions",
        )
        .with_parent("E1"),
    ];

    let count = items.len();
    for item in &items {
        store.upsert_item(item)?;
    }
    Ok(count)
}

fn seed_edges(store: &CrosswalkStore) -> Result<usize> {
    use Confidence::*;
    use FrameworkCode::*;
    use RelationshipKind::*;

    const SDG_GRI_LINKAGE: &str = "SDG-GRI linkage document (GRI/UNGC, 2022)";
    const ESRS_GRI_INDEX: &str = "GRI-ESRS interoperability index (2024)";
    const TSRS_IFRS_ALIGNMENT: &str = "TSRS alignment with IFRS S2 (2023)";

    // Reciprocal pairs are spelled out explicitly; the validator treats a
    // missing reverse direction as a curation defect, not an inference.
    let edges = [
        edge(key(Sdg, "13.2"), key(Gri, "305-5"), Equivalent, Authoritative, SDG_GRI_LINKAGE)?,
        edge(key(Gri, "305-5"), key(Sdg, "13.2"), Equivalent, Authoritative, SDG_GRI_LINKAGE)?,
        edge(key(Sdg, "7.2"), key(Gri, "302-1"), PartiallyOverlaps, Derived, SDG_GRI_LINKAGE)?,
        edge(key(Gri, "302-1"), key(Sdg, "7.2"), PartiallyOverlaps, Derived, SDG_GRI_LINKAGE)?,
        edge(key(Sdg, "7.3"), key(Gri, "302-3"), PartiallyOverlaps, Derived, SDG_GRI_LINKAGE)?,
        edge(key(Gri, "302-3"), key(Sdg, "7.3"), PartiallyOverlaps, Derived, SDG_GRI_LINKAGE)?,
        edge(key(Gri, "305-1"), key(Esrs, "E1-6"), Equivalent, Authoritative, ESRS_GRI_INDEX)?,
        edge(key(Esrs, "E1-6"), key(Gri, "305-1"), Equivalent, Authoritative, ESRS_GRI_INDEX)?,
        edge(key(Gri, "305-1"), key(Tsrs, "S2-29"), Equivalent, Derived, TSRS_IFRS_ALIGNMENT)?,
        edge(key(Tsrs, "S2-29"), key(Gri, "305-1"), Equivalent, Derived, TSRS_IFRS_ALIGNMENT)?,
        edge(key(Esrs, "E1-4"), key(Gri, "305-5"), Requires, Heuristic, ESRS_GRI_INDEX)?,
    ];

    let mut added = 0;
    for new_edge in &edges {
        match store.add_edge(new_edge) {
            Ok(_) => added += 1,
            Err(StorageError::DuplicateEdge { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(added)
}

fn edge(
    source: ItemKey,
    target: ItemKey,
    kind: RelationshipKind,
    confidence: Confidence,
    provenance: &str,
) -> Result<NewEdge> {
    Ok(NewEdge::new(source, target, kind, confidence, provenance)?)
}
