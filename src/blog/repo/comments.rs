use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{Connection, Params, Row, params};

use crate::blog::models::{Comment, OwnerType};

const COLUMNS: &str = "id, owner_id, owner_type, name, email, url, content, created, sharp_url, original_comment_id, original_comment_name";

/// Intermediate row struct. The reply columns are nullable in storage and
/// come back as `Option` here; `into_comment` maps NULL to the empty string.
struct CommentRow {
    id: String,
    owner_id: String,
    owner_type: String,
    name: String,
    email: String,
    url: String,
    content: String,
    created: String,
    sharp_url: String,
    original_comment_id: Option<String>,
    original_comment_name: Option<String>,
}

impl CommentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            owner_type: row.get(2)?,
            name: row.get(3)?,
            email: row.get(4)?,
            url: row.get(5)?,
            content: row.get(6)?,
            created: row.get(7)?,
            sharp_url: row.get(8)?,
            original_comment_id: row.get(9)?,
            original_comment_name: row.get(10)?,
        })
    }

    fn into_comment(self) -> Result<Comment> {
        let owner_type = OwnerType::from_str(&self.owner_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse comment owner type")?;
        Ok(Comment {
            id: self.id,
            owner_id: self.owner_id,
            owner_type,
            name: self.name,
            email: self.email,
            url: self.url,
            content: self.content,
            created: self.created,
            sharp_url: self.sharp_url,
            original_comment_id: self.original_comment_id.unwrap_or_default(),
            original_comment_name: self.original_comment_name.unwrap_or_default(),
        })
    }
}

fn query<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Comment>> {
    let sql = format!("SELECT {COLUMNS} FROM comments {clause}");
    let mut stmt = conn.prepare(&sql).context("Failed to prepare comment query")?;
    let rows = stmt
        .query_map(params, CommentRow::read)
        .context("Failed to query comments")?;
    let mut comments = Vec::new();
    for row in rows {
        let r = row.context("Failed to read comment row")?;
        comments.push(r.into_comment()?);
    }
    Ok(comments)
}

pub fn insert(conn: &Connection, comment: &Comment) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO comments ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            comment.id,
            comment.owner_id,
            comment.owner_type.as_str(),
            comment.name,
            comment.email,
            comment.url,
            comment.content,
            comment.created,
            comment.sharp_url,
            comment.original_comment_id,
            comment.original_comment_name,
        ],
    )
    .context("Failed to insert comment")?;
    Ok(())
}

/// Persist the derived fields of a comment: sharp URL and reply linkage.
pub fn update(conn: &Connection, comment: &Comment) -> Result<()> {
    conn.execute(
        "UPDATE comments SET sharp_url = ?1, original_comment_id = ?2, original_comment_name = ?3
         WHERE id = ?4",
        params![
            comment.sharp_url,
            comment.original_comment_id,
            comment.original_comment_name,
            comment.id,
        ],
    )
    .context("Failed to update comment")?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Comment>> {
    Ok(query(conn, "WHERE id = ?1", params![id])?.into_iter().next())
}

pub fn remove(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn
        .execute("DELETE FROM comments WHERE id = ?1", params![id])
        .context("Failed to delete comment")?;
    Ok(count > 0)
}

/// All comments of one owner, oldest first.
pub fn list_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<Comment>> {
    query(conn, "WHERE owner_id = ?1 ORDER BY id ASC", params![owner_id])
}

/// Delete every comment of `owner_id`, returning how many rows went away.
pub fn remove_by_owner(conn: &Connection, owner_id: &str) -> Result<usize> {
    conn.execute("DELETE FROM comments WHERE owner_id = ?1", params![owner_id])
        .context("Failed to delete owner comments")
}

/// Newest comments across the blog.
pub fn list_recent(conn: &Connection, offset: i64, limit: i64) -> Result<Vec<Comment>> {
    query(
        conn,
        "ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        params![limit, offset],
    )
}

pub fn count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
        .context("Failed to count comments")
}

/// Comments that count as published: every page comment plus the
/// comments of published articles.
pub fn count_published(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM comments
         WHERE owner_type = 'page'
            OR owner_id IN (SELECT id FROM articles WHERE published = 1)",
        [],
        |row| row.get(0),
    )
    .context("Failed to count published comments")
}

#[cfg(test)]
pub(crate) fn sample(id: &str, owner_id: &str, owner_type: OwnerType, sharp_url: &str) -> Comment {
    Comment {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        owner_type,
        name: "reader".to_string(),
        email: String::new(),
        url: String::new(),
        content: "nice post".to_string(),
        created: "2018-01-02T03:04:05+00:00".to_string(),
        sharp_url: sharp_url.to_string(),
        original_comment_id: String::new(),
        original_comment_name: String::new(),
    }
}
