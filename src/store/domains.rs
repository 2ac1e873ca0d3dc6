// SPDX-License-Identifier: MPL-2.0

use crate::store::{Database, StoreError};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};

const DOMAIN_COLUMNS: &str = r#"
    d.id, d.name, d.color, d.pattern, d.sort, d.deleted_at, d.created_at, d.updated_at,
    (SELECT COUNT(*) FROM history h WHERE h.domain_id = d.id AND h.deleted_at = 0) AS item_count
"#;

/// A site grouping for history entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub pattern: String,
    pub sort: i64,
    pub deleted_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Live history entries pointing at this domain
    pub item_count: i64,
}

impl Domain {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            pattern: row.get(3)?,
            sort: row.get(4)?,
            deleted_at: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            item_count: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDomain {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUpdate {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort: Option<i64>,
}

/// Domain operations
pub struct DomainStore<'a> {
    db: &'a Database,
}

impl<'a> DomainStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Live domains ordered by their sort key, optionally narrowed by id or pattern
    pub fn select(&self, id: Option<i64>, pattern: Option<&str>) -> Result<Vec<Domain>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT {DOMAIN_COLUMNS}
                FROM domain d
                WHERE d.deleted_at = 0
                AND (?1 IS NULL OR d.id = ?1)
                AND (?2 IS NULL OR d.pattern = ?2)
                ORDER BY d.sort, d.id
                "#
            ))?;
            let domains = stmt
                .query_map(params![id, pattern], Domain::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(domains)
        })
    }

    /// Insert a domain; its sort key starts out equal to its id
    pub fn insert(&self, domain: &NewDomain) -> Result<Domain, StoreError> {
        self.db.with_conn(|conn| {
            let color = domain
                .color
                .clone()
                .unwrap_or_else(|| color_for(&domain.pattern));
            let id = insert_domain(conn, &domain.name, &color, &domain.pattern, Database::now())?;
            find(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    pub fn update(&self, update: &DomainUpdate) -> Result<Domain, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                r#"
                UPDATE domain SET
                    name = COALESCE(?2, name),
                    color = COALESCE(?3, color),
                    sort = COALESCE(?4, sort),
                    updated_at = ?5
                WHERE id = ?1 AND deleted_at = 0
                "#,
                params![
                    update.id,
                    update.name,
                    update.color,
                    update.sort,
                    Database::now()
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            find(conn, update.id)?.ok_or(StoreError::NotFound)
        })
    }

    /// Soft delete
    pub fn remove(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Database::now();
            let changed = conn.execute(
                "UPDATE domain SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at = 0",
                params![id, now],
            )?;
            if changed == 0 {
                Err(StoreError::NotFound)
            } else {
                Ok(())
            }
        })
    }
}

fn find(conn: &Connection, id: i64) -> Result<Option<Domain>, StoreError> {
    let domain = conn
        .query_row(
            &format!("SELECT {DOMAIN_COLUMNS} FROM domain d WHERE d.id = ?1 AND d.deleted_at = 0"),
            [id],
            Domain::from_row,
        )
        .optional()?;
    Ok(domain)
}

/// Look up a domain by pattern, including soft deleted ones since the
/// pattern column is unique. Returns the id and whether the domain is live.
pub(crate) fn lookup_pattern(
    conn: &Connection,
    pattern: &str,
) -> Result<Option<(i64, bool)>, StoreError> {
    let found = conn
        .query_row(
            "SELECT id, deleted_at = 0 FROM domain WHERE pattern = ?1",
            [pattern],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn insert_domain(
    conn: &Connection,
    name: &str,
    color: &str,
    pattern: &str,
    now: i64,
) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO domain (name, color, pattern, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        "#,
        params![name, color, pattern, now],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute("UPDATE domain SET sort = ?1 WHERE id = ?1", [id])?;
    Ok(id)
}

/// Stable color for a pattern so the same site keeps its color across imports
pub(crate) fn color_for(pattern: &str) -> String {
    let mut hasher = DefaultHasher::new();
    pattern.hash(&mut hasher);
    let hash = hasher.finish();
    format!("#{:06x}", hash & 0x00ff_ffff)
}
