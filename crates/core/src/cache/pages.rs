//! Page cache reads and writes.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Entries older than this many milliseconds are treated as absent.
pub const DEFAULT_TTL_MS: i64 = 3_600_000;

/// A cached page, keyed by the URL the search provider returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    /// Plain text of the extracted article.
    pub content: String,
    pub markdown: String,
    pub title: String,
    /// Unix epoch milliseconds of the last write.
    pub cached_at: i64,
}

/// Extracted content to store for a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub content: String,
    pub markdown: String,
    pub title: String,
}

impl CacheDb {
    /// Look up a page, expiring it if it outlived the TTL.
    pub async fn get_page(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        self.get_page_at(url, Utc::now()).await
    }

    /// Look up a page as of `now`.
    ///
    /// An entry with `now - cached_at > ttl` is deleted and reported as a
    /// miss. An entry exactly at the TTL boundary is still served.
    pub async fn get_page_at(&self, url: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, Error> {
        let url = url.to_string();
        let now_ms = now.timestamp_millis();
        let ttl_ms = self.ttl.num_milliseconds();

        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let row = conn.query_row(
                    "SELECT url, content, markdown, title, cached_at FROM page_cache WHERE url = ?1",
                    params![url],
                    |row| {
                        Ok(CacheEntry {
                            url: row.get(0)?,
                            content: row.get(1)?,
                            markdown: row.get(2)?,
                            title: row.get(3)?,
                            cached_at: row.get(4)?,
                        })
                    },
                );

                let entry = match row {
                    Ok(entry) => entry,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                if now_ms - entry.cached_at > ttl_ms {
                    conn.execute("DELETE FROM page_cache WHERE url = ?1", params![entry.url])?;
                    tracing::debug!(url = %entry.url, "expired page cache entry");
                    return Ok(None);
                }

                Ok(Some(entry))
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace the cached page for `url`, stamped with now.
    pub async fn put_page(&self, url: &str, page: &PageContent) -> Result<(), Error> {
        self.put_page_at(url, page, Utc::now()).await
    }

    /// Insert or replace the cached page for `url` with an explicit write time.
    pub async fn put_page_at(&self, url: &str, page: &PageContent, cached_at: DateTime<Utc>) -> Result<(), Error> {
        let url = url.to_string();
        let page = page.clone();
        let cached_at = cached_at.timestamp_millis();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO page_cache (url, content, markdown, title, cached_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(url) DO UPDATE SET
                        content = excluded.content,
                        markdown = excluded.markdown,
                        title = excluded.title,
                        cached_at = excluded.cached_at",
                    params![url, page.content, page.markdown, page.title, cached_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored rows, expired or not.
    pub async fn page_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM page_cache", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> PageContent {
        PageContent {
            content: "Ownership is a set of rules.".into(),
            markdown: "# Ownership\n\nOwnership is a set of rules.".into(),
            title: "Ownership".into(),
        }
    }

    #[tokio::test]
    async fn test_put_and_get_page() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_page("https://doc.rust-lang.org/book/ch04-01.html", &sample())
            .await
            .unwrap();

        let entry = db
            .get_page("https://doc.rust-lang.org/book/ch04-01.html")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.title, "Ownership");
        assert_eq!(entry.content, "Ownership is a set of rules.");
        assert!(entry.markdown.starts_with("# Ownership"));
        assert!(entry.cached_at > 0);
    }

    #[tokio::test]
    async fn test_get_missing_page() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_page("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_served_up_to_ttl_boundary() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let written = Utc::now();
        db.put_page_at("https://example.com/a", &sample(), written)
            .await
            .unwrap();

        let at_boundary = written + Duration::milliseconds(DEFAULT_TTL_MS);
        assert!(
            db.get_page_at("https://example.com/a", at_boundary)
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(db.page_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_purged_on_read() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let written = Utc::now();
        db.put_page_at("https://example.com/a", &sample(), written)
            .await
            .unwrap();

        let past_ttl = written + Duration::milliseconds(DEFAULT_TTL_MS + 1);
        assert!(
            db.get_page_at("https://example.com/a", past_ttl)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(db.page_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry_is_lazy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stale = Utc::now() - Duration::hours(3);
        db.put_page_at("https://example.com/old", &sample(), stale)
            .await
            .unwrap();
        db.put_page("https://example.com/new", &sample()).await.unwrap();

        // Reading one URL never touches another.
        assert!(db.get_page("https://example.com/new").await.unwrap().is_some());
        assert_eq!(db.page_count().await.unwrap(), 2);

        assert!(db.get_page("https://example.com/old").await.unwrap().is_none());
        assert_eq!(db.page_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_page("https://example.com/", &sample()).await.unwrap();

        let updated = PageContent { title: "Borrowing".into(), ..sample() };
        db.put_page("https://example.com/", &updated).await.unwrap();

        let entry = db.get_page("https://example.com/").await.unwrap().unwrap();
        assert_eq!(entry.title, "Borrowing");
        assert_eq!(db.page_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let db = CacheDb::open_in_memory()
            .await
            .unwrap()
            .with_ttl(Duration::seconds(10));
        let written = Utc::now();
        db.put_page_at("https://example.com/", &sample(), written)
            .await
            .unwrap();

        let later = written + Duration::seconds(11);
        assert!(db.get_page_at("https://example.com/", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_puts_for_different_urls() {
        let db = CacheDb::open_in_memory().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let url = format!("https://example.com/{i}");
                db.put_page(&url, &PageContent { title: format!("page {i}"), ..Default::default() })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(db.page_count().await.unwrap(), 8);
        let entry = db.get_page("https://example.com/5").await.unwrap().unwrap();
        assert_eq!(entry.title, "page 5");
    }
}
