//! Permalink validation for pages and articles.
//!
//! A permalink is resolved in three steps: a blank candidate is replaced by
//! the generated default, anything else is normalized (trimmed, leading
//! slash, spaces to dashes); the result is then checked against the
//! permalink grammar and, when it differs from the entity's current
//! permalink, against every page and article permalink in the store.
//! Link pages hold an external URL and skip both checks.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::Connection;

use crate::blog::models::PageType;
use crate::blog::repo::{articles, pages};
use crate::errors::ServiceError;

static DEFAULT_PAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/pages/\d+\.html$").unwrap());

static DEFAULT_ARTICLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/articles/\d{4}/\d{2}/\d{2}/\d+\.html$").unwrap());

static USER_DEFINED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[A-Za-z0-9\-._~!$&'()*+,;=:@%\p{L}\p{N}]+$").unwrap());

static NUMERIC_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/\d+$").unwrap());

const RESERVED_PATHS: &[&str] = &[
    "/console",
    "/admin-index.do",
    "/login",
    "/logout",
    "/add-page-comment.do",
    "/add-article-comment.do",
    "/health",
];

const RESERVED_PREFIXES: &[&str] = &["/console/", "/api/"];

/// The entity a permalink is being resolved for.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Page { id: &'a str, page_type: PageType },
    Article { id: &'a str, created: DateTime<Utc> },
}

pub fn default_page_permalink(id: &str) -> String {
    format!("/pages/{id}.html")
}

pub fn default_article_permalink(id: &str, created: DateTime<Utc>) -> String {
    format!("/articles/{}/{id}.html", created.format("%Y/%m/%d"))
}

/// Trim, add the leading slash and replace spaces with dashes.
pub fn normalize(candidate: &str) -> String {
    let trimmed = candidate.trim();
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    with_slash.replace(' ', "-")
}

/// Whether a normalized permalink is acceptable for a page or article.
pub fn is_valid_format(permalink: &str) -> bool {
    if DEFAULT_PAGE_REGEX.is_match(permalink) || DEFAULT_ARTICLE_REGEX.is_match(permalink) {
        return true;
    }
    if RESERVED_PATHS.contains(&permalink)
        || RESERVED_PREFIXES.iter().any(|p| permalink.starts_with(p))
    {
        return false;
    }
    !NUMERIC_REGEX.is_match(permalink) && USER_DEFINED_REGEX.is_match(permalink)
}

fn is_link(owner: Owner<'_>) -> bool {
    matches!(
        owner,
        Owner::Page {
            page_type: PageType::Link,
            ..
        }
    )
}

/// Whether any page or article already uses `permalink`.
pub fn exists(conn: &Connection, permalink: &str) -> Result<bool, ServiceError> {
    Ok(pages::exists_with_permalink(conn, permalink)?
        || articles::exists_with_permalink(conn, permalink)?)
}

/// Resolve `candidate` into the permalink to persist for `owner`.
///
/// `previous` is the owner's persisted permalink on update and `None` on
/// add. Uniqueness is only checked when the result differs from it.
pub fn resolve(
    conn: &Connection,
    candidate: &str,
    owner: Owner<'_>,
    previous: Option<&str>,
) -> Result<String, ServiceError> {
    let permalink = if candidate.trim().is_empty() {
        match owner {
            Owner::Page { id, .. } => default_page_permalink(id),
            Owner::Article { id, created } => default_article_permalink(id, created),
        }
    } else if is_link(owner) {
        candidate.trim().replace(' ', "-")
    } else {
        normalize(candidate)
    };

    if is_link(owner) {
        return Ok(permalink);
    }

    if !is_valid_format(&permalink) {
        return Err(ServiceError::InvalidPermalinkFormat { permalink });
    }

    if previous != Some(permalink.as_str()) && exists(conn, &permalink)? {
        return Err(ServiceError::DuplicatePermalink { permalink });
    }

    Ok(permalink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::db::SoloDb;
    use anyhow::Result;
    use chrono::TimeZone;

    fn page(id: &str) -> Owner<'_> {
        Owner::Page {
            id,
            page_type: PageType::Page,
        }
    }

    #[test]
    fn normalize_adds_slash_and_dashes() {
        assert_eq!(normalize("  about me "), "/about-me");
        assert_eq!(normalize("/about"), "/about");
    }

    #[test]
    fn default_formats_are_valid() {
        let created = Utc.with_ymd_and_hms(2018, 3, 9, 12, 0, 0).unwrap();
        let article = default_article_permalink("1520596800000", created);
        assert_eq!(article, "/articles/2018/03/09/1520596800000.html");
        assert!(is_valid_format(&article));
        assert!(is_valid_format(&default_page_permalink("42")));
    }

    #[test]
    fn user_defined_grammar() {
        assert!(is_valid_format("/about"));
        assert!(is_valid_format("/über-uns"));
        assert!(is_valid_format("/a.b_c~d"));
        assert!(!is_valid_format("/"));
        assert!(!is_valid_format("/a/b"));
        assert!(!is_valid_format("/123"));
        assert!(!is_valid_format("/a?b"));
        assert!(!is_valid_format("/a#b"));
    }

    #[test]
    fn reserved_paths_are_rejected() {
        assert!(!is_valid_format("/console"));
        assert!(!is_valid_format("/login"));
        assert!(!is_valid_format("/add-article-comment.do"));
        assert!(!is_valid_format("/console/page"));
        assert!(!is_valid_format("/api/x"));
    }

    #[test]
    fn blank_candidate_generates_default() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert_eq!(resolve(db.conn(), "  ", page("7"), None)?, "/pages/7.html");
        Ok(())
    }

    #[test]
    fn malformed_candidate_is_rejected() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let err = resolve(db.conn(), "a/b", page("7"), None).unwrap_err();
        match err {
            ServiceError::InvalidPermalinkFormat { permalink } => assert_eq!(permalink, "/a/b"),
            other => panic!("Expected InvalidPermalinkFormat, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn duplicate_across_pages_and_articles() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        pages::insert(db.conn(), &pages::sample("1", 0, "/about"))?;
        articles::insert(db.conn(), &articles::sample("2", "/hello", true))?;

        assert!(matches!(
            resolve(db.conn(), "about", page("9"), None),
            Err(ServiceError::DuplicatePermalink { .. })
        ));
        assert!(matches!(
            resolve(db.conn(), "/hello", page("9"), None),
            Err(ServiceError::DuplicatePermalink { .. })
        ));
        Ok(())
    }

    #[test]
    fn unchanged_permalink_skips_uniqueness() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        pages::insert(db.conn(), &pages::sample("1", 0, "/about"))?;
        assert_eq!(
            resolve(db.conn(), "/about", page("1"), Some("/about"))?,
            "/about"
        );
        Ok(())
    }

    #[test]
    fn link_pages_skip_checks() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        pages::insert(db.conn(), &pages::sample("1", 0, "/about"))?;
        let owner = Owner::Page {
            id: "2",
            page_type: PageType::Link,
        };
        assert_eq!(
            resolve(db.conn(), "https://example.com/a b", owner, None)?,
            "https://example.com/a-b"
        );
        assert_eq!(resolve(db.conn(), "/about", owner, None)?, "/about");
        Ok(())
    }
}
