//! Schema replication from source to destination.
//!
//! Replication runs in three passes, in this order:
//!
//! 1. Tables - every table definition, verbatim from the source catalog
//! 2. Other objects - indexes, then views (triggers are not replicated)
//! 3. Data - full contents of every table not replaced by the transcode
//!
//! For a flat source the `tiles` table and its indexes are swapped for the
//! canonical `map`/`images` pair and a `tiles` view, so clients that read
//! `tiles` keep working against the destination.

use crate::archive::ident::quote_identifier;
use crate::archive::layout::{TileLayout, CANONICAL_OBJECTS, CANONICAL_TABLES};
use crate::archive::ArchiveError;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

/// Kind of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
    View,
    Trigger,
}

impl ObjectKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(ObjectKind::Table),
            "index" => Some(ObjectKind::Index),
            "view" => Some(ObjectKind::View),
            "trigger" => Some(ObjectKind::Trigger),
            _ => None,
        }
    }
}

/// A structural definition from the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: String,
    /// Table the object belongs to (same as `name` for tables)
    pub table: String,
    pub sql: String,
}

/// What a replication pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub tables_created: usize,
    pub indexes_created: usize,
    pub views_created: usize,
    pub triggers_skipped: usize,
    /// Rows copied per table, in copy order
    pub rows_copied: Vec<(String, u64)>,
}

impl ReplicationReport {
    pub fn total_rows(&self) -> u64 {
        self.rows_copied.iter().map(|(_, n)| n).sum()
    }
}

/// Read every user-defined catalog object, in creation order.
///
/// Internal `sqlite_*` objects and implicit autoindexes (which have no SQL)
/// are left out. Every name is checked against the identifier allow-list.
pub fn read_catalog(conn: &Connection) -> Result<Vec<SchemaObject>, ArchiveError> {
    let mut stmt = conn.prepare(
        "SELECT type, name, tbl_name, sql FROM sqlite_master
         WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%'
         ORDER BY rowid",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut objects = Vec::new();
    for row in rows {
        let (kind, name, table, sql) = row?;
        let Some(kind) = ObjectKind::parse(&kind) else {
            continue;
        };
        quote_identifier(&name)?;
        quote_identifier(&table)?;
        objects.push(SchemaObject {
            kind,
            name,
            table,
            sql,
        });
    }
    Ok(objects)
}

/// Replicates a source catalog into an empty destination.
pub struct SchemaReplicator<'a> {
    source: &'a Connection,
    layout: TileLayout,
}

impl<'a> SchemaReplicator<'a> {
    pub fn new(source: &'a Connection, layout: TileLayout) -> Self {
        Self { source, layout }
    }

    /// Recreate structure, then copy every non-image table.
    ///
    /// Any failing statement aborts replication; the destination is then in
    /// an unspecified state and must be discarded.
    pub fn replicate(&self, dest: &mut Connection) -> Result<ReplicationReport, ArchiveError> {
        let catalog = read_catalog(self.source)?;
        let mut report = self.create_structure(dest, &catalog)?;

        for object in catalog.iter().filter(|o| o.kind == ObjectKind::Table) {
            if self.layout.is_transformed_table(&object.name) {
                continue;
            }
            let rows = copy_table(self.source, dest, &object.name)?;
            debug!(table = %object.name, rows, "Table copied");
            report.rows_copied.push((object.name.clone(), rows));
        }

        info!(
            tables = report.tables_created,
            indexes = report.indexes_created,
            views = report.views_created,
            rows = report.total_rows(),
            "Schema replicated"
        );
        Ok(report)
    }

    fn create_structure(
        &self,
        dest: &mut Connection,
        catalog: &[SchemaObject],
    ) -> Result<ReplicationReport, ArchiveError> {
        let flat = self.layout == TileLayout::Flat;
        let mut report = ReplicationReport::default();
        let tx = dest.transaction()?;

        for object in catalog.iter().filter(|o| o.kind == ObjectKind::Table) {
            if flat && self.layout.is_transformed_table(&object.name) {
                continue;
            }
            tx.execute_batch(&object.sql)?;
            report.tables_created += 1;
        }
        if flat {
            tx.execute_batch(CANONICAL_TABLES)?;
            report.tables_created += 2;
        }

        for object in catalog.iter().filter(|o| o.kind == ObjectKind::Index) {
            if flat && self.layout.is_transformed_table(&object.table) {
                debug!(index = %object.name, "Skipping index on flat tiles table");
                continue;
            }
            tx.execute_batch(&object.sql)?;
            report.indexes_created += 1;
        }
        if flat {
            tx.execute_batch(CANONICAL_OBJECTS)?;
            report.indexes_created += 2;
            report.views_created += 1;
        }

        for object in catalog.iter() {
            match object.kind {
                ObjectKind::View => {
                    tx.execute_batch(&object.sql)?;
                    report.views_created += 1;
                }
                ObjectKind::Trigger => {
                    warn!(trigger = %object.name, table = %object.table, "Trigger not replicated");
                    report.triggers_skipped += 1;
                }
                _ => {}
            }
        }

        tx.commit()?;
        Ok(report)
    }
}

/// Copy every row of `table` with one prepared select and one prepared insert.
///
/// Runs inside a single destination transaction.
pub fn copy_table(
    source: &Connection,
    dest: &mut Connection,
    table: &str,
) -> Result<u64, ArchiveError> {
    let quoted = quote_identifier(table)?;
    let mut select = source.prepare(&format!("SELECT * FROM {}", quoted))?;
    let column_count = select.column_count();
    let placeholders = (1..=column_count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = dest.transaction()?;
    let mut copied = 0u64;
    {
        let mut insert = tx.prepare(&format!("INSERT INTO {} VALUES ({})", quoted, placeholders))?;
        let mut rows = select.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()?;
            insert.execute(params_from_iter(values.iter()))?;
            copied += 1;
        }
    }
    tx.commit()?;
    Ok(copied)
}

/// Point the `format` metadata entry at the new image format.
///
/// Returns false if the archive has no `metadata` table or no `format` row.
pub fn update_format_metadata(conn: &Connection, format: &str) -> Result<bool, ArchiveError> {
    let tables = crate::archive::layout::table_names(conn)?;
    if !tables.contains("metadata") {
        return Ok(false);
    }
    let updated = conn.execute(
        "UPDATE metadata SET value = ?1 WHERE name = 'format'",
        [format],
    )?;
    Ok(updated > 0)
}
