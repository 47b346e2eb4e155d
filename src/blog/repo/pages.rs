use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{Connection, Params, Row, params};

use crate::blog::models::{Page, PageType};

const COLUMNS: &str = "id, title, content, page_order, permalink, comment_count, commentable, page_type, editor_type, icon, open_target";

/// Intermediate row struct for reading pages from SQLite before converting
/// the page type string into its typed value.
struct PageRow {
    id: String,
    title: String,
    content: String,
    order: i64,
    permalink: String,
    comment_count: i64,
    commentable: bool,
    page_type: String,
    editor_type: String,
    icon: String,
    open_target: String,
}

impl PageRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            order: row.get(3)?,
            permalink: row.get(4)?,
            comment_count: row.get(5)?,
            commentable: row.get(6)?,
            page_type: row.get(7)?,
            editor_type: row.get(8)?,
            icon: row.get(9)?,
            open_target: row.get(10)?,
        })
    }

    fn into_page(self) -> Result<Page> {
        let page_type = PageType::from_str(&self.page_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse page type")?;
        Ok(Page {
            id: self.id,
            title: self.title,
            content: self.content,
            order: self.order,
            permalink: self.permalink,
            comment_count: self.comment_count,
            commentable: self.commentable,
            page_type,
            editor_type: self.editor_type,
            icon: self.icon,
            open_target: self.open_target,
        })
    }
}

fn query<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Page>> {
    let sql = format!("SELECT {COLUMNS} FROM pages {clause}");
    let mut stmt = conn.prepare(&sql).context("Failed to prepare page query")?;
    let rows = stmt
        .query_map(params, PageRow::read)
        .context("Failed to query pages")?;
    let mut pages = Vec::new();
    for row in rows {
        let r = row.context("Failed to read page row")?;
        pages.push(r.into_page()?);
    }
    Ok(pages)
}

pub fn insert(conn: &Connection, page: &Page) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO pages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            page.id,
            page.title,
            page.content,
            page.order,
            page.permalink,
            page.comment_count,
            page.commentable,
            page.page_type.as_str(),
            page.editor_type,
            page.icon,
            page.open_target,
        ],
    )
    .context("Failed to insert page")?;
    Ok(())
}

pub fn update(conn: &Connection, page: &Page) -> Result<()> {
    conn.execute(
        "UPDATE pages SET title = ?1, content = ?2, page_order = ?3, permalink = ?4,
             comment_count = ?5, commentable = ?6, page_type = ?7, editor_type = ?8,
             icon = ?9, open_target = ?10
         WHERE id = ?11",
        params![
            page.title,
            page.content,
            page.order,
            page.permalink,
            page.comment_count,
            page.commentable,
            page.page_type.as_str(),
            page.editor_type,
            page.icon,
            page.open_target,
            page.id,
        ],
    )
    .context("Failed to update page")?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Page>> {
    Ok(query(conn, "WHERE id = ?1", params![id])?.into_iter().next())
}

pub fn exists_with_permalink(conn: &Connection, permalink: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM pages WHERE permalink = ?1",
        params![permalink],
        |row| row.get(0),
    )
    .context("Failed to check page permalink")
}

pub fn remove(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn
        .execute("DELETE FROM pages WHERE id = ?1", params![id])
        .context("Failed to delete page")?;
    Ok(count > 0)
}

/// Highest order value in use, or `-1` when there are no pages.
pub fn max_order(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(page_order), -1) FROM pages", [], |row| {
        row.get(0)
    })
    .context("Failed to get max page order")
}

/// The page directly above `order` (next-lower order value).
pub fn get_upper(conn: &Connection, order: i64) -> Result<Option<Page>> {
    Ok(query(
        conn,
        "WHERE page_order < ?1 ORDER BY page_order DESC LIMIT 1",
        params![order],
    )?
    .into_iter()
    .next())
}

/// The page directly below `order` (next-higher order value).
pub fn get_under(conn: &Connection, order: i64) -> Result<Option<Page>> {
    Ok(query(
        conn,
        "WHERE page_order > ?1 ORDER BY page_order ASC LIMIT 1",
        params![order],
    )?
    .into_iter()
    .next())
}

pub fn set_order(conn: &Connection, id: &str, order: i64) -> Result<()> {
    conn.execute(
        "UPDATE pages SET page_order = ?1 WHERE id = ?2",
        params![order, id],
    )
    .context("Failed to update page order")?;
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
        .context("Failed to count pages")
}

pub fn list(conn: &Connection, offset: i64, limit: i64) -> Result<Vec<Page>> {
    query(
        conn,
        "ORDER BY page_order ASC LIMIT ?1 OFFSET ?2",
        params![limit, offset],
    )
}

/// Shift the cached comment count by `delta`, never below zero.
pub fn adjust_comment_count(conn: &Connection, id: &str, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE pages SET comment_count = MAX(0, comment_count + ?1) WHERE id = ?2",
        params![delta, id],
    )
    .context("Failed to update page comment count")?;
    Ok(())
}

/// Rebuild every page's cached comment count from the comment rows.
pub fn recount_comments(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE pages SET comment_count =
             (SELECT COUNT(*) FROM comments WHERE comments.owner_id = pages.id)",
        [],
    )
    .context("Failed to recount page comments")
}

#[cfg(test)]
pub(crate) fn sample(id: &str, order: i64, permalink: &str) -> Page {
    Page {
        id: id.to_string(),
        title: format!("Page {id}"),
        content: String::new(),
        order,
        permalink: permalink.to_string(),
        comment_count: 0,
        commentable: true,
        page_type: PageType::Page,
        editor_type: "CodeMirror-Markdown".to_string(),
        icon: String::new(),
        open_target: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::db::SoloDb;

    #[test]
    fn test_insert_and_get_page() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let page = sample("1", 0, "/about");
        insert(db.conn(), &page)?;
        let fetched = get(db.conn(), "1")?.expect("page should exist");
        assert_eq!(fetched, page);
        assert!(get(db.conn(), "2")?.is_none());
        Ok(())
    }

    #[test]
    fn test_max_order_of_empty_table() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert_eq!(max_order(db.conn())?, -1);
        insert(db.conn(), &sample("1", 4, "/a"))?;
        assert_eq!(max_order(db.conn())?, 4);
        Ok(())
    }

    #[test]
    fn test_upper_and_under_skip_gaps() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        insert(db.conn(), &sample("1", 0, "/a"))?;
        insert(db.conn(), &sample("2", 3, "/b"))?;
        insert(db.conn(), &sample("3", 7, "/c"))?;

        assert_eq!(get_upper(db.conn(), 3)?.map(|p| p.id), Some("1".to_string()));
        assert_eq!(get_under(db.conn(), 3)?.map(|p| p.id), Some("3".to_string()));
        assert!(get_upper(db.conn(), 0)?.is_none());
        assert!(get_under(db.conn(), 7)?.is_none());
        Ok(())
    }

    #[test]
    fn test_list_orders_by_page_order() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        insert(db.conn(), &sample("1", 2, "/a"))?;
        insert(db.conn(), &sample("2", 0, "/b"))?;
        insert(db.conn(), &sample("3", 1, "/c"))?;
        let ids: Vec<String> = list(db.conn(), 0, 10)?.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
        assert_eq!(list(db.conn(), 2, 10)?.len(), 1);
        assert_eq!(count(db.conn())?, 3);
        Ok(())
    }

    #[test]
    fn test_adjust_comment_count_floors_at_zero() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        insert(db.conn(), &sample("1", 0, "/a"))?;
        adjust_comment_count(db.conn(), "1", 2)?;
        adjust_comment_count(db.conn(), "1", -5)?;
        assert_eq!(get(db.conn(), "1")?.unwrap().comment_count, 0);
        Ok(())
    }
}
