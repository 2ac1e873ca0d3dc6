// SPDX-License-Identifier: MPL-2.0

use crate::store::domains::{color_for, insert_domain, lookup_pattern};
use crate::store::{Database, Domain, StoreError};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// A visited page together with the domain it was filed under
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub last_visited: i64,
    pub domain_id: i64,
    pub deleted_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub domain: Domain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistory {
    pub title: String,
    pub url: String,
    pub last_visited: i64,
}

/// Query options for history listings. Bounds on `last_visited` are exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryFilter {
    pub domain_id: Option<i64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl HistoryFilter {
    fn keyword_pattern(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{k}%"))
    }

    /// (limit, offset), only when both page and size are positive. An offset
    /// past `i64::MAX` is rejected.
    fn window(&self) -> Result<(i64, i64), StoreError> {
        match (self.page, self.size) {
            (Some(page), Some(size)) if page > 0 && size > 0 => {
                let offset = (page - 1)
                    .checked_mul(size)
                    .ok_or(StoreError::InvalidPage { page, size })?;
                Ok((size, offset))
            }
            _ => Ok((-1, 0)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub list: Vec<HistoryEntry>,
    pub next: bool,
    pub count: i64,
}

/// History operations
pub struct HistoryStore<'a> {
    db: &'a Database,
}

impl<'a> HistoryStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store visited pages in one transaction, filing each under the domain
    /// for its host. Domains are created on first sight. Entries without a
    /// usable host are skipped. Returns the number of inserted rows that are
    /// visible, which leaves out those filed under a removed domain.
    pub fn batch_insert(&self, entries: &[NewHistory]) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = Database::now();
            let mut domains: HashMap<String, (i64, bool)> = HashMap::new();
            let mut inserted = 0;

            for entry in entries {
                let Some(pattern) = domain_pattern(&entry.url) else {
                    tracing::debug!(url = %entry.url, "skipping history entry without host");
                    continue;
                };

                let (domain_id, live) = match domains.get(&pattern) {
                    Some(found) => *found,
                    None => {
                        let found = match lookup_pattern(&tx, &pattern)? {
                            Some(found) => found,
                            None => {
                                let id = insert_domain(&tx, &pattern, &color_for(&pattern), &pattern, now)?;
                                (id, true)
                            }
                        };
                        if !found.1 {
                            tracing::debug!(pattern = %pattern, "filing history under a removed domain");
                        }
                        domains.insert(pattern, found);
                        found
                    }
                };

                tx.execute(
                    r#"
                    INSERT INTO history (title, url, last_visited, domain_id, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    "#,
                    params![entry.title, entry.url, entry.last_visited, domain_id, now],
                )?;
                if live {
                    inserted += 1;
                }
            }

            tx.commit()?;
            Ok(inserted)
        })
    }

    /// Live entries with a non-empty title, newest first
    pub fn select(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StoreError> {
        self.db.with_conn(|conn| select_in(conn, filter))
    }

    /// Number of entries `select` would return without paging
    pub fn count(&self, keyword: Option<&str>) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| count_in(conn, keyword))
    }

    /// One page plus the total, read in a single transaction so both agree.
    /// `page` and `size` must be positive.
    pub fn pagination_select(
        &self,
        keyword: Option<String>,
        page: i64,
        size: i64,
    ) -> Result<HistoryPage, StoreError> {
        let end = match page.checked_mul(size) {
            Some(end) if page > 0 && size > 0 => end,
            _ => return Err(StoreError::InvalidPage { page, size }),
        };

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let count = count_in(&tx, keyword.as_deref())?;
            let list = select_in(
                &tx,
                &HistoryFilter {
                    keyword,
                    page: Some(page),
                    size: Some(size),
                    ..Default::default()
                },
            )?;
            tx.commit()?;

            Ok(HistoryPage {
                list,
                next: count > end,
                count,
            })
        })
    }

    /// Soft delete
    pub fn remove(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Database::now();
            let changed = conn.execute(
                "UPDATE history SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at = 0",
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

fn select_in(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StoreError> {
    let (limit, offset) = filter.window()?;
    let keyword = filter.keyword_pattern();

    let mut stmt = conn.prepare(
        r#"
        SELECT
            h.id, h.title, h.url, h.last_visited, h.domain_id,
            h.deleted_at, h.created_at, h.updated_at,
            d.id, d.name, d.color, d.pattern, d.sort,
            d.deleted_at, d.created_at, d.updated_at,
            (SELECT COUNT(*) FROM history x WHERE x.domain_id = d.id AND x.deleted_at = 0)
        FROM history h
        JOIN domain d ON d.id = h.domain_id AND d.deleted_at = 0
        WHERE h.deleted_at = 0
        AND length(h.title) != 0
        AND (?1 IS NULL OR h.domain_id = ?1)
        AND (?2 IS NULL OR h.last_visited > ?2)
        AND (?3 IS NULL OR h.last_visited < ?3)
        AND (?4 IS NULL OR h.title LIKE ?4)
        ORDER BY h.last_visited DESC, h.id DESC
        LIMIT ?5 OFFSET ?6
        "#,
    )?;

    let entries = stmt
        .query_map(
            params![
                filter.domain_id,
                filter.start,
                filter.end,
                keyword,
                limit,
                offset
            ],
            |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    url: row.get(2)?,
                    last_visited: row.get(3)?,
                    domain_id: row.get(4)?,
                    deleted_at: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                    domain: Domain {
                        id: row.get(8)?,
                        name: row.get(9)?,
                        color: row.get(10)?,
                        pattern: row.get(11)?,
                        sort: row.get(12)?,
                        deleted_at: row.get(13)?,
                        created_at: row.get(14)?,
                        updated_at: row.get(15)?,
                        item_count: row.get(16)?,
                    },
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn count_in(conn: &Connection, keyword: Option<&str>) -> Result<i64, StoreError> {
    let keyword = keyword.filter(|k| !k.is_empty()).map(|k| format!("%{k}%"));

    let count = conn.query_row(
        r#"
        SELECT IFNULL(COUNT(*), 0)
        FROM history h
        JOIN domain d ON d.id = h.domain_id AND d.deleted_at = 0
        WHERE h.deleted_at = 0
        AND length(h.title) != 0
        AND (?1 IS NULL OR h.title LIKE ?1)
        "#,
        params![keyword],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Domain pattern for a URL: its lowercased host without a leading `www.`
pub(crate) fn domain_pattern(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DomainStore;

    fn open() -> (tempfile::TempDir, Database) {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        (tmp, db)
    }

    fn visit(title: &str, url: &str, last_visited: i64) -> NewHistory {
        NewHistory {
            title: title.to_string(),
            url: url.to_string(),
            last_visited,
        }
    }

    fn seed(db: &Database) {
        HistoryStore::new(db)
            .batch_insert(&[
                visit("Rust Book", "https://doc.rust-lang.org/book/", 100),
                visit("Rust std", "https://doc.rust-lang.org/std/", 200),
                visit("Example", "https://www.example.com/", 300),
                visit("", "https://example.com/untitled", 400),
                visit("Example docs", "https://example.com/docs", 500),
            ])
            .unwrap();
    }

    #[test]
    fn test_domain_pattern() {
        assert_eq!(
            domain_pattern("https://WWW.Example.com/a?b=c"),
            Some("example.com".to_string())
        );
        assert_eq!(
            domain_pattern("http://127.0.0.1:8080/"),
            Some("127.0.0.1".to_string())
        );
        assert_eq!(domain_pattern("not a url"), None);
        assert_eq!(domain_pattern("file:///tmp/x.html"), None);
    }

    #[test]
    fn test_batch_insert_groups_by_domain() {
        let (_tmp, db) = open();
        seed(&db);

        let domains = DomainStore::new(&db).select(None, None).unwrap();
        let patterns: Vec<_> = domains.iter().map(|d| d.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["doc.rust-lang.org", "example.com"]);
        assert_eq!(domains[0].item_count, 2);
        assert_eq!(domains[1].item_count, 3);
        assert_eq!(domains[0].name, "doc.rust-lang.org");
    }

    #[test]
    fn test_batch_insert_reuses_existing_domain_and_skips_hostless() {
        let (_tmp, db) = open();
        seed(&db);

        let store = HistoryStore::new(&db);
        let inserted = store
            .batch_insert(&[
                visit("More std", "https://doc.rust-lang.org/std/vec/", 600),
                visit("Local file", "file:///home/me/notes.html", 700),
            ])
            .unwrap();
        assert_eq!(inserted, 1);

        let domains = DomainStore::new(&db).select(None, None).unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].item_count, 3);
    }

    #[test]
    fn test_select_skips_untitled_and_orders_newest_first() {
        let (_tmp, db) = open();
        seed(&db);

        let list = HistoryStore::new(&db)
            .select(&HistoryFilter::default())
            .unwrap();
        let titles: Vec<_> = list.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Example docs", "Example", "Rust std", "Rust Book"]);
        assert_eq!(list[0].domain.pattern, "example.com");
    }

    #[test]
    fn test_select_filters() {
        let (_tmp, db) = open();
        seed(&db);
        let store = HistoryStore::new(&db);

        let ranged = store
            .select(&HistoryFilter {
                start: Some(100),
                end: Some(500),
                ..Default::default()
            })
            .unwrap();
        let titles: Vec<_> = ranged.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Example", "Rust std"]);

        let rust = store
            .select(&HistoryFilter {
                keyword: Some("rust".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rust.len(), 2);

        let domain_id = rust[0].domain_id;
        let by_domain = store
            .select(&HistoryFilter {
                domain_id: Some(domain_id),
                ..Default::default()
            })
            .unwrap();
        assert!(by_domain.iter().all(|h| h.domain_id == domain_id));
        assert_eq!(by_domain.len(), 2);
    }

    #[test]
    fn test_pagination() {
        let (_tmp, db) = open();
        seed(&db);
        let store = HistoryStore::new(&db);

        let first = store.pagination_select(None, 1, 3).unwrap();
        assert_eq!(first.count, 4);
        assert_eq!(first.list.len(), 3);
        assert!(first.next);

        let second = store.pagination_select(None, 2, 3).unwrap();
        assert_eq!(second.list.len(), 1);
        assert!(!second.next);
        assert_eq!(second.list[0].title, "Rust Book");

        let keyword = store
            .pagination_select(Some("example".to_string()), 1, 10)
            .unwrap();
        assert_eq!(keyword.count, 2);
        assert!(!keyword.next);
    }

    #[test]
    fn test_pagination_rejects_bad_pages() {
        let (_tmp, db) = open();
        seed(&db);
        let store = HistoryStore::new(&db);

        for (page, size) in [(0, 10), (1, 0), (-1, 3), (i64::MAX, 2), (2, i64::MAX)] {
            let err = store.pagination_select(None, page, size).unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidPage { .. }),
                "page {page} size {size}: {err}"
            );
        }
    }

    #[test]
    fn test_select_with_overflowing_offset_is_an_error() {
        let (_tmp, db) = open();
        seed(&db);
        let store = HistoryStore::new(&db);

        let err = store
            .select(&HistoryFilter {
                page: Some(i64::MAX),
                size: Some(2),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPage { .. }));

        // Non-positive paging still means "no paging"
        let all = store
            .select(&HistoryFilter {
                page: Some(0),
                size: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_page_agrees_with_count_under_concurrent_inserts() {
        let (_tmp, db) = open();
        seed(&db);

        let writer = {
            let db = db.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    HistoryStore::new(&db)
                        .batch_insert(&[visit("More", "https://example.net/", 1000 + i)])
                        .unwrap();
                }
            })
        };

        let store = HistoryStore::new(&db);
        for _ in 0..50 {
            let page = store.pagination_select(None, 1, 10).unwrap();
            assert_eq!(page.list.len() as i64, page.count.min(10));
            assert_eq!(page.next, page.count > 10);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_insert_under_removed_domain_is_not_reported() {
        let (_tmp, db) = open();
        seed(&db);

        let domains = DomainStore::new(&db);
        let example = domains.select(None, Some("example.com")).unwrap()[0].id;
        domains.remove(example).unwrap();

        let store = HistoryStore::new(&db);
        let inserted = store
            .batch_insert(&[
                visit("Hidden", "https://example.com/hidden", 900),
                visit("Shown", "https://doc.rust-lang.org/nomicon/", 901),
            ])
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.count(None).unwrap(), 3);
    }

    #[test]
    fn test_remove_hides_entry() {
        let (_tmp, db) = open();
        seed(&db);
        let store = HistoryStore::new(&db);

        let newest = store.select(&HistoryFilter::default()).unwrap()[0].id;
        store.remove(newest).unwrap();

        assert_eq!(store.count(None).unwrap(), 3);
        assert!(matches!(store.remove(newest), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_removed_domain_hides_its_history() {
        let (_tmp, db) = open();
        seed(&db);

        let domains = DomainStore::new(&db);
        let example = domains.select(None, Some("example.com")).unwrap()[0].id;
        domains.remove(example).unwrap();

        assert_eq!(HistoryStore::new(&db).count(None).unwrap(), 2);
    }
}
