use anyhow::{Context, Result};
use rusqlite::{Connection, Params, Row, params};

use crate::blog::models::Article;

const COLUMNS: &str = "id, title, abstract, content, permalink, published, had_been_published, top, tags, author_id, commentable, view_pwd, comment_count, created, updated";

fn read(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        content: row.get(3)?,
        permalink: row.get(4)?,
        published: row.get(5)?,
        had_been_published: row.get(6)?,
        top: row.get(7)?,
        tags: row.get(8)?,
        author_id: row.get(9)?,
        commentable: row.get(10)?,
        view_pwd: row.get(11)?,
        comment_count: row.get(12)?,
        created: row.get(13)?,
        updated: row.get(14)?,
    })
}

fn query<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Article>> {
    let sql = format!("SELECT {COLUMNS} FROM articles {clause}");
    let mut stmt = conn.prepare(&sql).context("Failed to prepare article query")?;
    let rows = stmt
        .query_map(params, read)
        .context("Failed to query articles")?;
    let mut articles = Vec::new();
    for row in rows {
        articles.push(row.context("Failed to read article row")?);
    }
    Ok(articles)
}

pub fn insert(conn: &Connection, article: &Article) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO articles ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            article.id,
            article.title,
            article.summary,
            article.content,
            article.permalink,
            article.published,
            article.had_been_published,
            article.top,
            article.tags,
            article.author_id,
            article.commentable,
            article.view_pwd,
            article.comment_count,
            article.created,
            article.updated,
        ],
    )
    .context("Failed to insert article")?;
    Ok(())
}

pub fn update(conn: &Connection, article: &Article) -> Result<()> {
    conn.execute(
        "UPDATE articles SET title = ?1, abstract = ?2, content = ?3, permalink = ?4,
             published = ?5, had_been_published = ?6, top = ?7, tags = ?8,
             commentable = ?9, view_pwd = ?10, comment_count = ?11, updated = ?12
         WHERE id = ?13",
        params![
            article.title,
            article.summary,
            article.content,
            article.permalink,
            article.published,
            article.had_been_published,
            article.top,
            article.tags,
            article.commentable,
            article.view_pwd,
            article.comment_count,
            article.updated,
            article.id,
        ],
    )
    .context("Failed to update article")?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Article>> {
    Ok(query(conn, "WHERE id = ?1", params![id])?.into_iter().next())
}

pub fn exists_with_permalink(conn: &Connection, permalink: &str) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM articles WHERE permalink = ?1",
        params![permalink],
        |row| row.get(0),
    )
    .context("Failed to check article permalink")
}

pub fn remove(conn: &Connection, id: &str) -> Result<bool> {
    let count = conn
        .execute("DELETE FROM articles WHERE id = ?1", params![id])
        .context("Failed to delete article")?;
    Ok(count > 0)
}

pub fn set_top(conn: &Connection, id: &str, top: bool) -> Result<()> {
    conn.execute(
        "UPDATE articles SET top = ?1 WHERE id = ?2",
        params![top, id],
    )
    .context("Failed to update article top flag")?;
    Ok(())
}

fn keyword_pattern(keyword: Option<&str>) -> String {
    match keyword {
        Some(k) if !k.trim().is_empty() => format!("%{}%", k.trim()),
        _ => "%".to_string(),
    }
}

/// Articles with the given publish status matching `keyword` in title or
/// content, pinned articles first, newest first.
pub fn list(
    conn: &Connection,
    published: bool,
    keyword: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    query(
        conn,
        "WHERE published = ?1 AND (title LIKE ?2 OR content LIKE ?2)
         ORDER BY top DESC, updated DESC, id DESC LIMIT ?3 OFFSET ?4",
        params![published, keyword_pattern(keyword), limit, offset],
    )
}

pub fn count(conn: &Connection, published: bool, keyword: Option<&str>) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM articles WHERE published = ?1 AND (title LIKE ?2 OR content LIKE ?2)",
        params![published, keyword_pattern(keyword)],
        |row| row.get(0),
    )
    .context("Failed to count articles")
}

pub fn list_by_archive_date(
    conn: &Connection,
    archive_date_id: &str,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    query(
        conn,
        "WHERE id IN (SELECT article_id FROM archive_date_article WHERE archive_date_id = ?1)
         ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        params![archive_date_id, limit, offset],
    )
}

pub fn count_by_archive_date(conn: &Connection, archive_date_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM archive_date_article WHERE archive_date_id = ?1",
        params![archive_date_id],
        |row| row.get(0),
    )
    .context("Failed to count archived articles")
}

/// Shift the cached comment count by `delta`, never below zero.
pub fn adjust_comment_count(conn: &Connection, id: &str, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE articles SET comment_count = MAX(0, comment_count + ?1) WHERE id = ?2",
        params![delta, id],
    )
    .context("Failed to update article comment count")?;
    Ok(())
}

/// Rebuild every article's cached comment count from the comment rows.
pub fn recount_comments(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE articles SET comment_count =
             (SELECT COUNT(*) FROM comments WHERE comments.owner_id = articles.id)",
        [],
    )
    .context("Failed to recount article comments")
}

#[cfg(test)]
pub(crate) fn sample(id: &str, permalink: &str, published: bool) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Article {id}"),
        summary: String::new(),
        content: format!("content of {id}"),
        permalink: permalink.to_string(),
        published,
        had_been_published: published,
        top: false,
        tags: String::new(),
        author_id: "author".to_string(),
        commentable: true,
        view_pwd: String::new(),
        comment_count: 0,
        created: "2018-01-02T03:04:05+00:00".to_string(),
        updated: format!("2018-01-02T03:04:0{}+00:00", id.len() % 10),
    }
}
