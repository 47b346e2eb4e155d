use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::blog::models::Tag;

/// Split a comma separated tag string into trimmed, de-duplicated titles.
pub fn parse_titles(tags: &str) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for title in tags.split([',', '，']).map(str::trim) {
        if !title.is_empty() && !titles.iter().any(|t| t == title) {
            titles.push(title.to_string());
        }
    }
    titles
}

fn find_id(conn: &Connection, title: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM tags WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to look up tag")
}

/// Relate `article_id` to each title, creating missing tags with ids from
/// `new_id`.
pub fn relate(
    conn: &Connection,
    article_id: &str,
    titles: &[String],
    mut new_id: impl FnMut() -> String,
) -> Result<()> {
    for title in titles {
        let tag_id = match find_id(conn, title)? {
            Some(id) => id,
            None => {
                let id = new_id();
                conn.execute(
                    "INSERT INTO tags (id, title) VALUES (?1, ?2)",
                    params![id, title],
                )
                .context("Failed to insert tag")?;
                id
            }
        };
        conn.execute(
            "INSERT OR IGNORE INTO tag_article (tag_id, article_id) VALUES (?1, ?2)",
            params![tag_id, article_id],
        )
        .context("Failed to relate tag")?;
    }
    Ok(())
}

/// Drop every tag relation of `article_id` and delete tags left with no
/// article.
pub fn unrelate(conn: &Connection, article_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM tag_article WHERE article_id = ?1",
        params![article_id],
    )
    .context("Failed to unrelate tags")?;
    conn.execute(
        "DELETE FROM tags WHERE id NOT IN (SELECT tag_id FROM tag_article)",
        [],
    )
    .context("Failed to remove orphan tags")?;
    Ok(())
}

pub fn list(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.title, COUNT(ta.article_id)
             FROM tags t LEFT JOIN tag_article ta ON ta.tag_id = t.id
             GROUP BY t.id, t.title
             ORDER BY t.title ASC",
        )
        .context("Failed to prepare tag query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                title: row.get(1)?,
                article_count: row.get(2)?,
            })
        })
        .context("Failed to query tags")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read tag row")
}
