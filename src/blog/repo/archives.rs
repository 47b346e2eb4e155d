use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::blog::models::ArchiveDate;

fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchiveDate> {
    Ok(ArchiveDate {
        id: row.get(0)?,
        month: row.get(1)?,
        article_count: row.get(2)?,
        published_article_count: row.get(3)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<ArchiveDate>> {
    conn.query_row(
        "SELECT id, month, article_count, published_article_count FROM archive_dates WHERE id = ?1",
        params![id],
        read,
    )
    .optional()
    .context("Failed to read archive date")
}

/// Newest month first.
pub fn list(conn: &Connection) -> Result<Vec<ArchiveDate>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, month, article_count, published_article_count
             FROM archive_dates ORDER BY month DESC",
        )
        .context("Failed to prepare archive date query")?;
    let rows = stmt
        .query_map([], read)
        .context("Failed to query archive dates")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read archive date row")
}

fn archive_of(conn: &Connection, article_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT archive_date_id FROM archive_date_article WHERE article_id = ?1",
        params![article_id],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up article archive date")
}

/// File `article_id` under `month` (`yyyy/MM`), creating the archive date
/// with an id from `new_id` when the month is new.
pub fn link(
    conn: &Connection,
    article_id: &str,
    month: &str,
    published: bool,
    new_id: impl FnOnce() -> String,
) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM archive_dates WHERE month = ?1",
            params![month],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to look up archive date")?;
    let archive_id = match existing {
        Some(id) => id,
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO archive_dates (id, month) VALUES (?1, ?2)",
                params![id, month],
            )
            .context("Failed to insert archive date")?;
            id
        }
    };
    conn.execute(
        "INSERT INTO archive_date_article (archive_date_id, article_id) VALUES (?1, ?2)",
        params![archive_id, article_id],
    )
    .context("Failed to link article to archive date")?;
    conn.execute(
        "UPDATE archive_dates SET article_count = article_count + 1,
             published_article_count = published_article_count + ?1
         WHERE id = ?2",
        params![i64::from(published), archive_id],
    )
    .context("Failed to update archive date counts")?;
    Ok(())
}

/// Remove `article_id` from its archive date. Archive dates left without
/// articles are deleted.
pub fn unlink(conn: &Connection, article_id: &str, published: bool) -> Result<()> {
    let Some(archive_id) = archive_of(conn, article_id)? else {
        return Ok(());
    };
    conn.execute(
        "DELETE FROM archive_date_article WHERE article_id = ?1",
        params![article_id],
    )
    .context("Failed to unlink article from archive date")?;
    conn.execute(
        "UPDATE archive_dates SET article_count = MAX(0, article_count - 1),
             published_article_count = MAX(0, published_article_count - ?1)
         WHERE id = ?2",
        params![i64::from(published), archive_id],
    )
    .context("Failed to update archive date counts")?;
    conn.execute(
        "DELETE FROM archive_dates WHERE id = ?1 AND article_count = 0",
        params![archive_id],
    )
    .context("Failed to remove empty archive date")?;
    Ok(())
}

/// Shift the published count of the article's archive date by `delta`.
pub fn adjust_published(conn: &Connection, article_id: &str, delta: i64) -> Result<()> {
    if let Some(archive_id) = archive_of(conn, article_id)? {
        conn.execute(
            "UPDATE archive_dates
             SET published_article_count = MAX(0, published_article_count + ?1)
             WHERE id = ?2",
            params![delta, archive_id],
        )
        .context("Failed to update archive date published count")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::db::SoloDb;
    use crate::blog::repo::articles;

    #[test]
    fn test_link_groups_articles_by_month() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        articles::insert(db.conn(), &articles::sample("a1", "/a", true))?;
        articles::insert(db.conn(), &articles::sample("a2", "/b", false))?;

        link(db.conn(), "a1", "2018/01", true, || "d1".to_string())?;
        link(db.conn(), "a2", "2018/01", false, || "unused".to_string())?;

        let dates = list(db.conn())?;
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].id, "d1");
        assert_eq!(dates[0].article_count, 2);
        assert_eq!(dates[0].published_article_count, 1);
        assert_eq!(articles::count_by_archive_date(db.conn(), "d1")?, 2);
        Ok(())
    }

    #[test]
    fn test_unlink_last_article_removes_archive_date() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        articles::insert(db.conn(), &articles::sample("a1", "/a", true))?;
        link(db.conn(), "a1", "2018/01", true, || "d1".to_string())?;

        unlink(db.conn(), "a1", true)?;
        assert!(get(db.conn(), "d1")?.is_none());
        // Unlinking an unfiled article is a no-op.
        unlink(db.conn(), "a1", true)?;
        Ok(())
    }

    #[test]
    fn test_adjust_published_never_negative() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        articles::insert(db.conn(), &articles::sample("a1", "/a", false))?;
        link(db.conn(), "a1", "2018/01", false, || "d1".to_string())?;
        adjust_published(db.conn(), "a1", -1)?;
        assert_eq!(get(db.conn(), "d1")?.unwrap().published_article_count, 0);
        adjust_published(db.conn(), "a1", 1)?;
        assert_eq!(get(db.conn(), "d1")?.unwrap().published_article_count, 1);
        Ok(())
    }
}
