use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::blog::models::Statistic;

pub fn get(conn: &Connection) -> Result<Statistic> {
    conn.query_row(
        "SELECT blog_article_count, published_blog_article_count,
                blog_comment_count, published_blog_comment_count
         FROM statistic WHERE id = 1",
        [],
        |row| {
            Ok(Statistic {
                blog_article_count: row.get(0)?,
                published_blog_article_count: row.get(1)?,
                blog_comment_count: row.get(2)?,
                published_blog_comment_count: row.get(3)?,
            })
        },
    )
    .context("Failed to read statistic")
}

pub fn save(conn: &Connection, stat: &Statistic) -> Result<()> {
    conn.execute(
        "UPDATE statistic SET blog_article_count = ?1, published_blog_article_count = ?2,
             blog_comment_count = ?3, published_blog_comment_count = ?4
         WHERE id = 1",
        params![
            stat.blog_article_count,
            stat.published_blog_article_count,
            stat.blog_comment_count,
            stat.published_blog_comment_count,
        ],
    )
    .context("Failed to update statistic")?;
    Ok(())
}
