use chrono::{DateTime, NaiveDate, Utc};
use crosswalk_core::{
    Confidence, CoreError, EdgeId, EdgeStatus, FrameworkCode, FrameworkItem, FrameworkPair,
    ItemKey, ItemStatus, MappingEdge, MappingSnapshot, NewEdge, RelationshipKind,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub const CROSSWALK_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("item not found: {0}")]
    ItemNotFound(ItemKey),
    #[error("edge not found or not active: {0}")]
    EdgeNotFound(EdgeId),
    // Field names avoid `source`, which thiserror reserves for error chaining.
    #[error("active edge already exists: {source_key} -[{kind}]-> {target_key}")]
    DuplicateEdge {
        source_key: ItemKey,
        target_key: ItemKey,
        kind: RelationshipKind,
    },
    #[error("parent {parent_id} of {key} does not exist in its framework")]
    MissingParent { key: ItemKey, parent_id: String },
    #[error("parent chain of {0} would form a cycle")]
    ParentCycle(ItemKey),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// Filter for `list_edges`. Empty filter lists everything in creation order.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub pair: Option<FrameworkPair>,
    pub kind: Option<RelationshipKind>,
    pub status: Option<EdgeStatus>,
}

impl EdgeFilter {
    pub fn active() -> Self {
        Self {
            status: Some(EdgeStatus::Active),
            ..Self::default()
        }
    }

    pub fn pair(mut self, pair: FrameworkPair) -> Self {
        self.pair = Some(pair);
        self
    }

    pub fn kind(mut self, kind: RelationshipKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn accepts(&self, edge: &MappingEdge) -> bool {
        if let Some(pair) = &self.pair {
            if !pair.matches(edge.source.framework, edge.target.framework) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if edge.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if edge.status != status {
                return false;
            }
        }
        true
    }
}

/// Framework Registry and Mapping Store over one SQLite database.
///
/// The registry side is write-once-then-supersede: items are upserted by the
/// ingestion path and flagged, never deleted. The mapping side soft-deletes
/// via the status column, with the duplicate-edge constraint enforced by a
/// partial unique index rather than application locking.
pub struct CrosswalkStore {
    conn: Connection,
}

impl CrosswalkStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > CROSSWALK_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: CROSSWALK_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_crosswalk_schema.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
            info!(version = 1, "applied crosswalk schema migration");
        }

        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // --- Framework Registry -------------------------------------------------

    /// Ingestion-path write. Rejects parents that do not exist in the same
    /// framework and re-parenting that would close a cycle.
    pub fn upsert_item(&self, item: &FrameworkItem) -> Result<(), StorageError> {
        if let Some(parent_id) = &item.parent_id {
            let parent_key = ItemKey::new(item.key.framework, parent_id.clone());
            if self.fetch_item(&parent_key)?.is_none() {
                return Err(StorageError::MissingParent {
                    key: item.key.clone(),
                    parent_id: parent_id.clone(),
                });
            }
            self.check_parent_chain(&item.key, parent_id)?;
        }

        self.conn.execute(
            "
            INSERT INTO framework_items (
                framework,
                item_id,
                parent_id,
                title,
                effective_from,
                effective_to,
                status,
                superseded_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(framework, item_id) DO UPDATE SET
                parent_id=excluded.parent_id,
                title=excluded.title,
                effective_from=excluded.effective_from,
                effective_to=excluded.effective_to,
                status=excluded.status,
                superseded_by=excluded.superseded_by
            ",
            params![
                item.key.framework.as_str(),
                item.key.item_id,
                item.parent_id,
                item.title,
                item.effective_from.map(|d| d.to_string()),
                item.effective_to.map(|d| d.to_string()),
                item.status.as_str(),
                item.superseded_by,
            ],
        )?;

        Ok(())
    }

    fn check_parent_chain(&self, key: &ItemKey, first_parent: &str) -> Result<(), StorageError> {
        let mut seen = BTreeSet::new();
        let mut cursor = first_parent.to_string();
        loop {
            if cursor == key.item_id || !seen.insert(cursor.clone()) {
                return Err(StorageError::ParentCycle(key.clone()));
            }
            let next: Option<Option<String>> = self
                .conn
                .query_row(
                    "SELECT parent_id FROM framework_items WHERE framework = ?1 AND item_id = ?2",
                    params![key.framework.as_str(), cursor],
                    |row| row.get(0),
                )
                .optional()?;
            match next {
                Some(Some(parent)) => cursor = parent,
                _ => return Ok(()),
            }
        }
    }

    pub fn item(&self, key: &ItemKey) -> Result<FrameworkItem, StorageError> {
        self.fetch_item(key)?
            .ok_or_else(|| StorageError::ItemNotFound(key.clone()))
    }

    fn fetch_item(&self, key: &ItemKey) -> Result<Option<FrameworkItem>, StorageError> {
        let item = self
            .conn
            .query_row(
                "
                SELECT framework, item_id, parent_id, title, effective_from, effective_to,
                       status, superseded_by
                FROM framework_items
                WHERE framework = ?1 AND item_id = ?2
                ",
                params![key.framework.as_str(), key.item_id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn is_active(&self, key: &ItemKey) -> Result<bool, StorageError> {
        Ok(self.item(key)?.is_active())
    }

    /// Items of one framework in hierarchy order: parents before children,
    /// siblings by item id. Items whose parent chain is defective (missing
    /// parent already rejected at write time, cycles from external bulk
    /// loads) are appended in id order instead of being dropped.
    pub fn list_items(&self, framework: FrameworkCode) -> Result<Vec<FrameworkItem>, StorageError> {
        let mut statement = self.conn.prepare(
            "
            SELECT framework, item_id, parent_id, title, effective_from, effective_to,
                   status, superseded_by
            FROM framework_items
            WHERE framework = ?1
            ORDER BY item_id ASC
            ",
        )?;
        let rows = statement.query_map([framework.as_str()], item_from_row)?;

        let mut by_id: BTreeMap<String, FrameworkItem> = BTreeMap::new();
        for row in rows {
            let item = row?;
            by_id.insert(item.key.item_id.clone(), item);
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut roots: Vec<String> = Vec::new();
        for item in by_id.values() {
            match &item.parent_id {
                Some(parent) if by_id.contains_key(parent) => children
                    .entry(parent.clone())
                    .or_default()
                    .push(item.key.item_id.clone()),
                _ => roots.push(item.key.item_id.clone()),
            }
        }

        let mut ordered: Vec<String> = Vec::with_capacity(by_id.len());
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<String> = roots;
        stack.reverse();
        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(kids) = children.get(&id) {
                for kid in kids.iter().rev() {
                    stack.push(kid.clone());
                }
            }
            ordered.push(id);
        }
        for id in by_id.keys() {
            if !visited.contains(id) {
                ordered.push(id.clone());
            }
        }

        Ok(ordered
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }

    pub fn supersede_item(&self, key: &ItemKey, superseded_by: &str) -> Result<(), StorageError> {
        let changes = self.conn.execute(
            "
            UPDATE framework_items
            SET status = 'superseded', superseded_by = ?3
            WHERE framework = ?1 AND item_id = ?2
            ",
            params![key.framework.as_str(), key.item_id, superseded_by],
        )?;
        if changes == 0 {
            return Err(StorageError::ItemNotFound(key.clone()));
        }
        Ok(())
    }

    // --- Mapping Store ------------------------------------------------------

    /// Single-statement insert; the partial unique index makes the write
    /// atomic with respect to the duplicate-edge invariant.
    pub fn add_edge(&self, edge: &NewEdge) -> Result<EdgeId, StorageError> {
        let result = self.conn.execute(
            "
            INSERT INTO mapping_edges (
                source_framework,
                source_item,
                target_framework,
                target_item,
                relationship,
                confidence,
                provenance,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8)
            ",
            params![
                edge.source.framework.as_str(),
                edge.source.item_id,
                edge.target.framework.as_str(),
                edge.target.item_id,
                edge.kind.as_str(),
                edge.confidence.as_str(),
                edge.provenance,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(EdgeId(self.conn.last_insert_rowid())),
            Err(err) if is_unique_violation(&err) => Err(StorageError::DuplicateEdge {
                source_key: edge.source.clone(),
                target_key: edge.target.clone(),
                kind: edge.kind,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Soft delete. Retracting an absent or already-retracted edge is
    /// `EdgeNotFound`, never a second side effect.
    pub fn retract_edge(&self, id: EdgeId) -> Result<(), StorageError> {
        let changes = self.conn.execute(
            "
            UPDATE mapping_edges
            SET status = 'retracted', retracted_at = ?2
            WHERE edge_id = ?1 AND status = 'active'
            ",
            params![id.0, Utc::now().to_rfc3339()],
        )?;
        if changes == 0 {
            return Err(StorageError::EdgeNotFound(id));
        }
        Ok(())
    }

    pub fn edge(&self, id: EdgeId) -> Result<MappingEdge, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {EDGE_COLUMNS} FROM mapping_edges WHERE edge_id = ?1"),
                [id.0],
                edge_from_row,
            )
            .optional()?
            .ok_or(StorageError::EdgeNotFound(id))
    }

    pub fn list_edges(&self, filter: &EdgeFilter) -> Result<Vec<MappingEdge>, StorageError> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {EDGE_COLUMNS} FROM mapping_edges ORDER BY edge_id ASC"
        ))?;
        let rows = statement.query_map([], edge_from_row)?;

        let mut edges = Vec::new();
        for row in rows {
            let edge = row?;
            if filter.accepts(&edge) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    // --- Snapshot -----------------------------------------------------------

    /// Consistent read of every item of the frameworks named by `pairs` plus
    /// all active edges between them, inside one transaction. Any read
    /// failure aborts the whole snapshot; a partial snapshot is never
    /// returned.
    pub fn snapshot(&self, pairs: &[FrameworkPair]) -> Result<MappingSnapshot, StorageError> {
        let tx = self.conn.unchecked_transaction()?;

        let frameworks: BTreeSet<FrameworkCode> =
            pairs.iter().flat_map(|pair| [pair.a, pair.b]).collect();

        let mut items = BTreeMap::new();
        {
            let mut statement = tx.prepare(
                "
                SELECT framework, item_id, parent_id, title, effective_from, effective_to,
                       status, superseded_by
                FROM framework_items
                WHERE framework = ?1
                ",
            )?;
            for framework in &frameworks {
                let rows = statement.query_map([framework.as_str()], item_from_row)?;
                for row in rows {
                    let item = row?;
                    items.insert(item.key.clone(), item);
                }
            }
        }

        let mut edges = Vec::new();
        {
            let mut statement = tx.prepare(&format!(
                "
                SELECT {EDGE_COLUMNS} FROM mapping_edges
                WHERE status = 'active'
                ORDER BY edge_id ASC
                "
            ))?;
            let rows = statement.query_map([], edge_from_row)?;
            for row in rows {
                let edge = row?;
                if pairs
                    .iter()
                    .any(|pair| pair.matches(edge.source.framework, edge.target.framework))
                {
                    edges.push(edge);
                }
            }
        }

        tx.commit()?;
        Ok(MappingSnapshot::new(
            items,
            edges,
            pairs.to_vec(),
            Utc::now(),
        ))
    }

    // --- Company metric facts (read-only to this core) ----------------------

    /// Seeding/test helper; production writes happen in the data-collection
    /// modules outside this core.
    pub fn record_metric(
        &self,
        company_id: &str,
        key: &ItemKey,
        period: &str,
        value: Option<&str>,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "
            INSERT OR REPLACE INTO company_metrics (
                company_id, framework, item_id, period, value, submitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                company_id,
                key.framework.as_str(),
                key.item_id,
                period,
                value,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Every item the company has submitted at least one metric for.
    pub fn reported_items(&self, company_id: &str) -> Result<BTreeSet<ItemKey>, StorageError> {
        let mut statement = self.conn.prepare(
            "SELECT DISTINCT framework, item_id FROM company_metrics WHERE company_id = ?1",
        )?;
        let rows = statement.query_map([company_id], |row| {
            let framework: FrameworkCode = parse_column(row.get::<_, String>(0)?, 0)?;
            Ok(ItemKey::new(framework, row.get::<_, String>(1)?))
        })?;

        let mut keys = BTreeSet::new();
        for row in rows {
            keys.insert(row?);
        }
        Ok(keys)
    }
}

const EDGE_COLUMNS: &str = "edge_id, source_framework, source_item, target_framework, \
     target_item, relationship, confidence, provenance, status, created_at, retracted_at";

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

fn parse_column<T>(raw: String, index: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn parse_timestamp(raw: String, index: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

fn item_from_row(row: &rusqlite::Row<'_>) -> Result<FrameworkItem, rusqlite::Error> {
    let framework: FrameworkCode = parse_column(row.get::<_, String>(0)?, 0)?;
    let item_id: String = row.get(1)?;
    let effective_from = row
        .get::<_, Option<String>>(4)?
        .map(|raw| parse_column::<NaiveDate>(raw, 4))
        .transpose()?;
    let effective_to = row
        .get::<_, Option<String>>(5)?
        .map(|raw| parse_column::<NaiveDate>(raw, 5))
        .transpose()?;
    let status: ItemStatus = parse_column(row.get::<_, String>(6)?, 6)?;

    Ok(FrameworkItem {
        key: ItemKey::new(framework, item_id),
        parent_id: row.get(2)?,
        title: row.get(3)?,
        effective_from,
        effective_to,
        status,
        superseded_by: row.get(7)?,
    })
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> Result<MappingEdge, rusqlite::Error> {
    let source_framework: FrameworkCode = parse_column(row.get::<_, String>(1)?, 1)?;
    let target_framework: FrameworkCode = parse_column(row.get::<_, String>(3)?, 3)?;
    let kind: RelationshipKind = parse_column(row.get::<_, String>(5)?, 5)?;
    let confidence: Confidence = parse_column(row.get::<_, String>(6)?, 6)?;
    let status: EdgeStatus = parse_column(row.get::<_, String>(8)?, 8)?;
    let created_at = parse_timestamp(row.get::<_, String>(9)?, 9)?;
    let retracted_at = row
        .get::<_, Option<String>>(10)?
        .map(|raw| parse_timestamp(raw, 10))
        .transpose()?;

    Ok(MappingEdge {
        id: EdgeId(row.get(0)?),
        source: ItemKey::new(source_framework, row.get::<_, String>(2)?),
        target: ItemKey::new(target_framework, row.get::<_, String>(4)?),
        kind,
        confidence,
        provenance: row.get(7)?,
        status,
        created_at,
        retracted_at,
    })
}
