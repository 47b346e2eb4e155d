//! Blog-wide counters.
//!
//! The statistic row caches article and comment totals. Every mutation that
//! adds or removes articles or comments adjusts it in the same transaction.
//! A counter never drops below zero: an adjustment that would take it
//! negative is clamped and logged, since it means the cache has drifted
//! from the rows it counts. `repair_counters` rebuilds it from scratch.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::blog::db::SoloDb;
use crate::blog::models::Statistic;
use crate::blog::repo::{articles, comments, pages, statistic};
use crate::errors::ServiceError;

fn apply(counter: &'static str, current: i64, delta: i64) -> i64 {
    let next = current + delta;
    if next < 0 {
        warn!(counter, current, delta, "Statistic counter would go negative, clamping to zero");
        0
    } else {
        next
    }
}

/// Add the signed deltas to the blog comment counters.
pub fn adjust_comment_counts(
    conn: &Connection,
    delta: i64,
    published_delta: i64,
) -> Result<Statistic, ServiceError> {
    let mut stat = statistic::get(conn)?;
    stat.blog_comment_count = apply("blogCommentCount", stat.blog_comment_count, delta);
    stat.published_blog_comment_count = apply(
        "publishedBlogCommentCount",
        stat.published_blog_comment_count,
        published_delta,
    );
    statistic::save(conn, &stat)?;
    Ok(stat)
}

/// Add the signed deltas to the blog article counters.
pub fn adjust_article_counts(
    conn: &Connection,
    delta: i64,
    published_delta: i64,
) -> Result<Statistic, ServiceError> {
    let mut stat = statistic::get(conn)?;
    stat.blog_article_count = apply("blogArticleCount", stat.blog_article_count, delta);
    stat.published_blog_article_count = apply(
        "publishedBlogArticleCount",
        stat.published_blog_article_count,
        published_delta,
    );
    statistic::save(conn, &stat)?;
    Ok(stat)
}

impl SoloDb {
    pub fn statistic(&self) -> Result<Statistic, ServiceError> {
        Ok(statistic::get(self.conn())?)
    }

    /// Recompute every cached count (per-page and per-article comment
    /// counts and the blog statistic) from the source rows.
    pub fn repair_counters(&self) -> Result<Statistic, ServiceError> {
        self.in_transaction(|conn| {
            pages::recount_comments(conn)?;
            articles::recount_comments(conn)?;
            let published = articles::count(conn, true, None)?;
            let drafts = articles::count(conn, false, None)?;
            let stat = Statistic {
                blog_article_count: published + drafts,
                published_blog_article_count: published,
                blog_comment_count: comments::count(conn)?,
                published_blog_comment_count: comments::count_published(conn)?,
            };
            statistic::save(conn, &stat)?;
            debug!(?stat, "Repaired statistic counters");
            Ok(stat)
        })
    }
}
