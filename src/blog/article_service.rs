//! Article management: add, update, remove, publish state, top flag and
//! the tag and archive queries that hang off articles.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, error};

use crate::blog::cascade;
use crate::blog::db::SoloDb;
use crate::blog::ids::next_id;
use crate::blog::models::{ArchiveDate, Article, ArticleInput, Tag};
use crate::blog::page_service::remove_owner_comments;
use crate::blog::pagination::{PageQuery, Paged, Pagination};
use crate::blog::permalink::{self, Owner};
use crate::blog::repo::{archives, articles, tags};
use crate::blog::statistics;
use crate::errors::ServiceError;

fn require_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::BadRequest("Article title must not be blank".into()));
    }
    Ok(())
}

fn parse_created(created: &str) -> Result<DateTime<Utc>, ServiceError> {
    let parsed = DateTime::parse_from_rfc3339(created)
        .with_context(|| format!("Invalid article creation time: {created}"))?;
    Ok(parsed.with_timezone(&Utc))
}

fn load(conn: &Connection, article_id: &str) -> Result<Article, ServiceError> {
    articles::get(conn, article_id)?.ok_or_else(|| ServiceError::not_found("Article", article_id))
}

/// Move an article into or out of the published set, carrying its
/// comments along in the published comment counter.
fn shift_published(conn: &Connection, article: &Article, publish: bool) -> Result<(), ServiceError> {
    let sign = if publish { 1 } else { -1 };
    statistics::adjust_article_counts(conn, 0, sign)?;
    statistics::adjust_comment_counts(conn, 0, sign * article.comment_count)?;
    archives::adjust_published(conn, &article.id, sign)?;
    Ok(())
}

impl SoloDb {
    /// Create an article owned by `author_id`. Returns its id.
    pub fn add_article(&self, input: ArticleInput, author_id: &str) -> Result<String, ServiceError> {
        self.in_transaction(|conn| {
            require_title(&input.title)?;
            let id = next_id();
            let created = Utc::now();
            let permalink = permalink::resolve(
                conn,
                &input.permalink,
                Owner::Article { id: &id, created },
                None,
            )?;
            let titles = tags::parse_titles(&input.tags);
            let timestamp = created.to_rfc3339();
            let article = Article {
                id: id.clone(),
                title: input.title,
                summary: input.summary,
                content: input.content,
                permalink,
                published: input.published,
                had_been_published: input.published,
                top: false,
                tags: titles.join(","),
                author_id: author_id.to_string(),
                commentable: input.commentable,
                view_pwd: input.view_pwd,
                comment_count: 0,
                created: timestamp.clone(),
                updated: timestamp,
            };
            articles::insert(conn, &article)?;
            tags::relate(conn, &id, &titles, next_id)?;
            archives::link(
                conn,
                &id,
                &created.format("%Y/%m").to_string(),
                article.published,
                next_id,
            )?;
            statistics::adjust_article_counts(conn, 1, i64::from(article.published))?;
            debug!(article_id = %id, permalink = %article.permalink, "Added an article");
            Ok(id)
        })
        .inspect_err(|e| error!(error = %e, "Adds an article failed"))
    }

    /// Update an article. Top flag, author, comment count and creation time
    /// are kept from the stored article.
    pub fn update_article(&self, input: ArticleInput) -> Result<(), ServiceError> {
        let Some(article_id) = input.id.clone() else {
            return Err(ServiceError::BadRequest("Article id is required".into()));
        };
        self.in_transaction(|conn| {
            require_title(&input.title)?;
            let old = load(conn, &article_id)?;
            let permalink = permalink::resolve(
                conn,
                &input.permalink,
                Owner::Article {
                    id: &article_id,
                    created: parse_created(&old.created)?,
                },
                Some(&old.permalink),
            )?;
            let titles = tags::parse_titles(&input.tags);
            let article = Article {
                id: article_id.clone(),
                title: input.title,
                summary: input.summary,
                content: input.content,
                permalink,
                published: input.published,
                had_been_published: old.had_been_published || input.published,
                top: old.top,
                tags: titles.join(","),
                author_id: old.author_id.clone(),
                commentable: input.commentable,
                view_pwd: input.view_pwd,
                comment_count: old.comment_count,
                created: old.created.clone(),
                updated: Utc::now().to_rfc3339(),
            };

            if article.published != old.published {
                shift_published(conn, &old, article.published)?;
            }
            if article.tags != old.tags {
                tags::unrelate(conn, &article_id)?;
                tags::relate(conn, &article_id, &titles, next_id)?;
            }
            if article.permalink != old.permalink {
                cascade::on_owner_permalink_changed(conn, &article_id, &article.permalink)?;
            }
            articles::update(conn, &article)?;
            debug!(article_id = %article_id, "Updated an article");
            Ok(())
        })
        .inspect_err(|e| error!(article_id = ?input.id, error = %e, "Updates an article failed"))
    }

    /// Remove an article with its comments, tag relations and archive entry.
    pub fn remove_article(&self, article_id: &str) -> Result<(), ServiceError> {
        self.in_transaction(|conn| {
            let article = load(conn, article_id)?;
            let removed = remove_owner_comments(conn, article_id, article.published)?;
            tags::unrelate(conn, article_id)?;
            archives::unlink(conn, article_id, article.published)?;
            statistics::adjust_article_counts(conn, -1, -i64::from(article.published))?;
            articles::remove(conn, article_id)?;
            debug!(article_id, removed_comments = removed, "Removed an article");
            Ok(())
        })
        .inspect_err(|e| error!(article_id, error = %e, "Removes an article failed"))
    }

    /// Pin or unpin an article. Only the flag changes.
    pub fn top_article(&self, article_id: &str, top: bool) -> Result<(), ServiceError> {
        self.in_transaction(|conn| {
            load(conn, article_id)?;
            articles::set_top(conn, article_id, top)?;
            debug!(article_id, top, "Updated article top flag");
            Ok(())
        })
        .inspect_err(|e| error!(article_id, error = %e, "Updates article top flag failed"))
    }

    /// Return a published article to draft state.
    pub fn cancel_publish_article(&self, article_id: &str) -> Result<(), ServiceError> {
        self.in_transaction(|conn| {
            let mut article = load(conn, article_id)?;
            if !article.published {
                debug!(article_id, "Article is already a draft");
                return Ok(());
            }
            shift_published(conn, &article, false)?;
            article.published = false;
            article.updated = Utc::now().to_rfc3339();
            articles::update(conn, &article)?;
            debug!(article_id, "Cancelled article publication");
            Ok(())
        })
        .inspect_err(|e| error!(article_id, error = %e, "Cancels article publication failed"))
    }

    pub fn get_article(&self, article_id: &str) -> Result<Article, ServiceError> {
        load(self.conn(), article_id)
    }

    pub fn list_articles(
        &self,
        published: bool,
        query: &PageQuery,
        keyword: Option<&str>,
    ) -> Result<Paged<Article>, ServiceError> {
        let total = articles::count(self.conn(), published, keyword)?;
        Ok(Paged {
            pagination: Pagination::new(query, total),
            items: articles::list(
                self.conn(),
                published,
                keyword,
                query.offset(),
                query.limit(),
            )?,
        })
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>, ServiceError> {
        Ok(tags::list(self.conn())?)
    }

    pub fn list_archive_dates(&self) -> Result<Vec<ArchiveDate>, ServiceError> {
        Ok(archives::list(self.conn())?)
    }

    pub fn articles_by_archive_date(
        &self,
        archive_date_id: &str,
        query: &PageQuery,
    ) -> Result<Paged<Article>, ServiceError> {
        if archives::get(self.conn(), archive_date_id)?.is_none() {
            return Err(ServiceError::not_found("Archive date", archive_date_id));
        }
        let total = articles::count_by_archive_date(self.conn(), archive_date_id)?;
        Ok(Paged {
            pagination: Pagination::new(query, total),
            items: articles::list_by_archive_date(
                self.conn(),
                archive_date_id,
                query.offset(),
                query.limit(),
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::models::{CommentInput, OwnerType, Statistic};
    use crate::blog::repo::comments;
    use anyhow::Result;

    fn input(title: &str, permalink: &str, published: bool) -> ArticleInput {
        ArticleInput {
            title: title.to_string(),
            permalink: permalink.to_string(),
            published,
            commentable: true,
            content: "body".into(),
            ..Default::default()
        }
    }

    fn comment_on(db: &SoloDb, article_id: &str) -> Result<String> {
        Ok(db.add_comment(
            OwnerType::Article,
            CommentInput {
                owner_id: article_id.to_string(),
                name: "reader".into(),
                content: "great read".into(),
                ..Default::default()
            },
        )?)
    }

    #[test]
    fn add_article_generates_dated_permalink() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(input("Hello", "", true), "admin")?;
        let article = db.get_article(&id)?;
        let created = parse_created(&article.created)?;
        assert_eq!(
            article.permalink,
            format!("/articles/{}/{id}.html", created.format("%Y/%m/%d"))
        );
        assert_eq!(article.author_id, "admin");
        assert!(article.had_been_published);
        Ok(())
    }

    #[test]
    fn add_article_updates_counters_tags_and_archive() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.add_article(
            ArticleInput {
                tags: "rust, solo".into(),
                ..input("A", "/a", true)
            },
            "admin",
        )?;
        db.add_article(input("B", "/b", false), "admin")?;

        let stat = db.statistic()?;
        assert_eq!(stat.blog_article_count, 2);
        assert_eq!(stat.published_blog_article_count, 1);
        assert_eq!(db.list_tags()?.len(), 2);
        let dates = db.list_archive_dates()?;
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].article_count, 2);
        assert_eq!(dates[0].published_article_count, 1);
        Ok(())
    }

    #[test]
    fn article_permalinks_are_always_validated() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.add_article(input("A", "/hello", true), "admin")?;
        assert!(matches!(
            db.add_article(input("B", "/hello", true), "admin"),
            Err(ServiceError::DuplicatePermalink { .. })
        ));
        assert!(matches!(
            db.add_article(input("C", "/a/b", true), "admin"),
            Err(ServiceError::InvalidPermalinkFormat { .. })
        ));
        assert_eq!(db.statistic()?.blog_article_count, 1);
        Ok(())
    }

    #[test]
    fn update_article_cascades_permalink_and_keeps_top() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(input("A", "/first", true), "admin")?;
        let cid = comment_on(&db, &id)?;
        db.top_article(&id, true)?;

        db.update_article(ArticleInput {
            id: Some(id.clone()),
            ..input("A2", "/second", true)
        })?;

        let article = db.get_article(&id)?;
        assert!(article.top);
        assert_eq!(article.comment_count, 1);
        assert_eq!(
            comments::get(db.conn(), &cid)?.unwrap().sharp_url,
            format!("/second#{cid}")
        );
        Ok(())
    }

    #[test]
    fn update_article_replaces_tags() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(
            ArticleInput {
                tags: "old".into(),
                ..input("A", "/a", true)
            },
            "admin",
        )?;
        db.update_article(ArticleInput {
            id: Some(id.clone()),
            tags: "new".into(),
            ..input("A", "/a", true)
        })?;
        let titles: Vec<String> = db.list_tags()?.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["new"]);
        assert_eq!(db.get_article(&id)?.tags, "new");
        Ok(())
    }

    #[test]
    fn unpublish_moves_comments_out_of_published_count() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(input("A", "/a", true), "admin")?;
        comment_on(&db, &id)?;
        comment_on(&db, &id)?;

        db.cancel_publish_article(&id)?;
        let stat = db.statistic()?;
        assert_eq!(stat.published_blog_article_count, 0);
        assert_eq!(stat.blog_comment_count, 2);
        assert_eq!(stat.published_blog_comment_count, 0);
        assert!(!db.get_article(&id)?.published);

        // Idempotent on drafts.
        db.cancel_publish_article(&id)?;
        assert_eq!(db.statistic()?, stat);

        db.update_article(ArticleInput {
            id: Some(id.clone()),
            ..input("A", "/a", true)
        })?;
        assert_eq!(db.statistic()?.published_blog_comment_count, 2);
        Ok(())
    }

    #[test]
    fn remove_article_cleans_up_everything() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(
            ArticleInput {
                tags: "rust".into(),
                ..input("A", "/a", true)
            },
            "admin",
        )?;
        comment_on(&db, &id)?;
        comment_on(&db, &id)?;

        db.remove_article(&id)?;
        assert_eq!(db.statistic()?, Statistic::default());
        assert!(db.list_tags()?.is_empty());
        assert!(db.list_archive_dates()?.is_empty());
        assert!(comments::list_by_owner(db.conn(), &id)?.is_empty());
        assert!(matches!(
            db.remove_article(&id),
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn remove_article_is_all_or_nothing() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_article(
            ArticleInput {
                tags: "rust".into(),
                ..input("A", "/a", true)
            },
            "admin",
        )?;
        comment_on(&db, &id)?;
        comment_on(&db, &id)?;
        let before = db.statistic()?;
        db.conn().execute_batch(
            "CREATE TRIGGER refuse_delete BEFORE DELETE ON articles \
             BEGIN SELECT RAISE(ABORT, 'write refused'); END;",
        )?;

        let err = db.remove_article(&id).unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(_)), "{err:?}");
        assert_eq!(db.statistic()?, before);
        assert_eq!(before.blog_comment_count, 2);
        assert_eq!(comments::list_by_owner(db.conn(), &id)?.len(), 2);
        let tags = db.list_tags()?;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].article_count, 1);
        let dates = db.list_archive_dates()?;
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].published_article_count, 1);
        assert!(db.get_article(&id)?.published);
        Ok(())
    }

    #[test]
    fn list_articles_by_status_and_archive() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.add_article(input("Rust notes", "/r", true), "admin")?;
        db.add_article(input("Solo notes", "/s", true), "admin")?;
        db.add_article(input("Draft", "/d", false), "admin")?;

        let q = PageQuery::new(1, 10, 5)?;
        assert_eq!(db.list_articles(true, &q, None)?.items.len(), 2);
        assert_eq!(db.list_articles(false, &q, None)?.items.len(), 1);
        assert_eq!(db.list_articles(true, &q, Some("Rust"))?.items.len(), 1);

        let month = db.list_archive_dates()?.remove(0);
        let paged = db.articles_by_archive_date(&month.id, &q)?;
        assert_eq!(paged.items.len(), 3);
        assert!(matches!(
            db.articles_by_archive_date("missing", &q),
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }
}
