//! Page management: add, update, remove and queries.

use rusqlite::Connection;
use tracing::{debug, error};

use crate::blog::cascade;
use crate::blog::db::{EDITOR_TYPE_SETTING, SoloDb, get_setting};
use crate::blog::ids::next_id;
use crate::blog::models::{Page, PageInput};
use crate::blog::ordering::next_page_order;
use crate::blog::pagination::{PageQuery, Paged, Pagination};
use crate::blog::permalink::{self, Owner};
use crate::blog::repo::{comments, pages};
use crate::blog::statistics;
use crate::errors::ServiceError;

/// Editor used when neither the request nor the preferences name one.
pub const DEFAULT_EDITOR_TYPE: &str = "CodeMirror-Markdown";

fn require_title(title: &str) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::BadRequest("Page title must not be blank".into()));
    }
    Ok(())
}

fn editor_type(conn: &Connection, requested: Option<String>) -> Result<String, ServiceError> {
    match requested.filter(|e| !e.trim().is_empty()) {
        Some(editor) => Ok(editor),
        None => Ok(get_setting(conn, EDITOR_TYPE_SETTING)?
            .unwrap_or_else(|| DEFAULT_EDITOR_TYPE.to_string())),
    }
}

/// Delete every comment of a page or article and take them off the blog
/// counters. Returns how many comments were removed.
pub(crate) fn remove_owner_comments(
    conn: &Connection,
    owner_id: &str,
    published: bool,
) -> Result<usize, ServiceError> {
    let removed = comments::remove_by_owner(conn, owner_id)?;
    let n = removed as i64;
    statistics::adjust_comment_counts(conn, -n, if published { -n } else { 0 })?;
    Ok(removed)
}

impl SoloDb {
    /// Create a page at the end of the navigation order. Returns its id.
    pub fn add_page(&self, input: PageInput) -> Result<String, ServiceError> {
        self.in_transaction(|conn| {
            require_title(&input.title)?;
            let id = next_id();
            let permalink = permalink::resolve(
                conn,
                &input.permalink,
                Owner::Page {
                    id: &id,
                    page_type: input.page_type,
                },
                None,
            )?;
            let page = Page {
                id: id.clone(),
                title: input.title,
                content: input.content,
                order: next_page_order(conn)?,
                permalink,
                comment_count: 0,
                commentable: input.commentable,
                page_type: input.page_type,
                editor_type: editor_type(conn, input.editor_type)?,
                icon: input.icon,
                open_target: input.open_target,
            };
            pages::insert(conn, &page)?;
            debug!(page_id = %id, permalink = %page.permalink, order = page.order, "Added a page");
            Ok(id)
        })
        .inspect_err(|e| error!(error = %e, "Adds a page failed"))
    }

    /// Update a page's content and permalink. Order and comment count are
    /// kept from the stored page. A changed permalink rewrites the sharp
    /// URL of every comment on the page.
    pub fn update_page(&self, input: PageInput) -> Result<(), ServiceError> {
        let Some(page_id) = input.id.clone() else {
            return Err(ServiceError::BadRequest("Page id is required".into()));
        };
        self.in_transaction(|conn| {
            require_title(&input.title)?;
            let old = pages::get(conn, &page_id)?
                .ok_or_else(|| ServiceError::not_found("Page", &page_id))?;
            let permalink = permalink::resolve(
                conn,
                &input.permalink,
                Owner::Page {
                    id: &page_id,
                    page_type: input.page_type,
                },
                Some(&old.permalink),
            )?;
            let page = Page {
                id: page_id.clone(),
                title: input.title,
                content: input.content,
                order: old.order,
                permalink,
                comment_count: old.comment_count,
                commentable: input.commentable,
                page_type: input.page_type,
                editor_type: editor_type(conn, input.editor_type)?,
                icon: input.icon,
                open_target: input.open_target,
            };
            if page.permalink != old.permalink {
                cascade::on_owner_permalink_changed(conn, &page_id, &page.permalink)?;
            }
            pages::update(conn, &page)?;
            debug!(page_id = %page_id, "Updated a page");
            Ok(())
        })
        .inspect_err(|e| error!(page_id = ?input.id, error = %e, "Updates a page failed"))
    }

    /// Remove a page together with its comments.
    pub fn remove_page(&self, page_id: &str) -> Result<(), ServiceError> {
        self.in_transaction(|conn| {
            if pages::get(conn, page_id)?.is_none() {
                return Err(ServiceError::not_found("Page", page_id));
            }
            let removed = remove_owner_comments(conn, page_id, true)?;
            pages::remove(conn, page_id)?;
            debug!(page_id, removed_comments = removed, "Removed a page");
            Ok(())
        })
        .inspect_err(|e| error!(page_id, error = %e, "Removes a page failed"))
    }

    pub fn get_page(&self, page_id: &str) -> Result<Page, ServiceError> {
        pages::get(self.conn(), page_id)?.ok_or_else(|| ServiceError::not_found("Page", page_id))
    }

    pub fn list_pages(&self, query: &PageQuery) -> Result<Paged<Page>, ServiceError> {
        let total = pages::count(self.conn())?;
        Ok(Paged {
            pagination: Pagination::new(query, total),
            items: pages::list(self.conn(), query.offset(), query.limit())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::models::{CommentInput, OwnerType, PageType};
    use anyhow::Result;

    fn input(title: &str, permalink: &str) -> PageInput {
        PageInput {
            title: title.to_string(),
            permalink: permalink.to_string(),
            commentable: true,
            ..Default::default()
        }
    }

    fn comment_on(db: &SoloDb, page_id: &str) -> Result<String> {
        Ok(db.add_comment(
            OwnerType::Page,
            CommentInput {
                owner_id: page_id.to_string(),
                name: "reader".into(),
                content: "hello there".into(),
                ..Default::default()
            },
        )?)
    }

    /// Make SQLite abort any `op` on `table` that matches `when`.
    fn refuse_writes(db: &SoloDb, op: &str, table: &str, when: &str) -> Result<()> {
        db.conn().execute_batch(&format!(
            "CREATE TRIGGER refuse_write BEFORE {op} ON {table} WHEN {when} \
             BEGIN SELECT RAISE(ABORT, 'write refused'); END;"
        ))?;
        Ok(())
    }

    #[test]
    fn add_page_with_blank_permalink_uses_generated_id() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("About", ""))?;
        let page = db.get_page(&id)?;
        assert_eq!(page.permalink, format!("/pages/{id}.html"));
        assert_eq!(page.order, 0);
        assert_eq!(page.editor_type, DEFAULT_EDITOR_TYPE);
        Ok(())
    }

    #[test]
    fn add_page_appends_order_and_uses_preferred_editor() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.set_setting(EDITOR_TYPE_SETTING, "tinyMCE")?;
        db.add_page(input("A", "a"))?;
        let id = db.add_page(input("B", "b"))?;
        let page = db.get_page(&id)?;
        assert_eq!(page.order, 1);
        assert_eq!(page.permalink, "/b");
        assert_eq!(page.editor_type, "tinyMCE");
        Ok(())
    }

    #[test]
    fn add_page_rejects_duplicate_without_writing() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.add_page(input("A", "/about"))?;
        let err = db.add_page(input("B", "about")).unwrap_err();
        assert!(matches!(err, ServiceError::DuplicatePermalink { .. }));
        assert_eq!(pages::count(db.conn())?, 1);
        Ok(())
    }

    #[test]
    fn add_link_page_keeps_external_url() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(PageInput {
            page_type: PageType::Link,
            ..input("GitHub", "https://github.com")
        })?;
        assert_eq!(db.get_page(&id)?.permalink, "https://github.com");
        Ok(())
    }

    #[test]
    fn update_page_cascades_new_permalink_to_comments() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("A", "/old"))?;
        let c1 = comment_on(&db, &id)?;
        let c2 = comment_on(&db, &id)?;

        db.update_page(PageInput {
            id: Some(id.clone()),
            ..input("A", "/new")
        })?;

        for cid in [c1, c2] {
            let c = comments::get(db.conn(), &cid)?.unwrap();
            assert_eq!(c.sharp_url, format!("/new#{cid}"));
        }
        let page = db.get_page(&id)?;
        assert_eq!(page.permalink, "/new");
        assert_eq!(page.comment_count, 2);
        Ok(())
    }

    #[test]
    fn update_page_with_same_permalink_leaves_comments_alone() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("A", "/about"))?;
        let cid = comment_on(&db, &id)?;
        db.conn().execute(
            "UPDATE comments SET sharp_url = 'untouched' WHERE id = ?1",
            [&cid],
        )?;

        db.update_page(PageInput {
            id: Some(id.clone()),
            ..input("Renamed", "/about")
        })?;
        assert_eq!(comments::get(db.conn(), &cid)?.unwrap().sharp_url, "untouched");
        assert_eq!(db.get_page(&id)?.title, "Renamed");
        Ok(())
    }

    #[test]
    fn update_page_duplicate_permalink_rolls_back() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        db.add_page(input("A", "/taken"))?;
        let id = db.add_page(input("B", "/mine"))?;
        let err = db
            .update_page(PageInput {
                id: Some(id.clone()),
                ..input("B renamed", "/taken")
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicatePermalink { .. }));
        let page = db.get_page(&id)?;
        assert_eq!(page.title, "B");
        assert_eq!(page.permalink, "/mine");
        Ok(())
    }

    #[test]
    fn update_page_rolls_back_when_cascade_fails_midway() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("A", "/old"))?;
        let c1 = comment_on(&db, &id)?;
        let c2 = comment_on(&db, &id)?;
        refuse_writes(&db, "UPDATE", "comments", &format!("OLD.id = '{c2}'"))?;

        let err = db
            .update_page(PageInput {
                id: Some(id.clone()),
                ..input("A", "/new")
            })
            .unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(_)), "{err:?}");
        assert_eq!(db.get_page(&id)?.permalink, "/old");
        for cid in [c1, c2] {
            let c = comments::get(db.conn(), &cid)?.unwrap();
            assert_eq!(c.sharp_url, format!("/old#{cid}"));
        }
        Ok(())
    }

    #[test]
    fn update_page_without_editor_uses_preference() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(PageInput {
            editor_type: Some("CodeMirror-Markdown".into()),
            ..input("A", "/a")
        })?;
        db.set_setting(EDITOR_TYPE_SETTING, "tinyMCE")?;

        db.update_page(PageInput {
            id: Some(id.clone()),
            ..input("A", "/a")
        })?;
        assert_eq!(db.get_page(&id)?.editor_type, "tinyMCE");

        db.update_page(PageInput {
            id: Some(id.clone()),
            editor_type: Some("KindEditor".into()),
            ..input("A", "/a")
        })?;
        assert_eq!(db.get_page(&id)?.editor_type, "KindEditor");
        Ok(())
    }

    #[test]
    fn update_page_requires_existing_id() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert!(matches!(
            db.update_page(input("A", "/a")),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            db.update_page(PageInput {
                id: Some("missing".into()),
                ..input("A", "/a")
            }),
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn remove_page_drops_comments_and_counters() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("A", "/a"))?;
        let other = db.add_page(input("B", "/b"))?;
        comment_on(&db, &id)?;
        comment_on(&db, &id)?;
        comment_on(&db, &other)?;
        assert_eq!(db.statistic()?.blog_comment_count, 3);

        db.remove_page(&id)?;
        let stat = db.statistic()?;
        assert_eq!(stat.blog_comment_count, 1);
        assert_eq!(stat.published_blog_comment_count, 1);
        assert!(comments::list_by_owner(db.conn(), &id)?.is_empty());
        assert!(matches!(
            db.get_page(&id),
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn remove_page_is_all_or_nothing() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        let id = db.add_page(input("A", "/a"))?;
        comment_on(&db, &id)?;
        comment_on(&db, &id)?;
        let before = db.statistic()?;
        refuse_writes(&db, "DELETE", "pages", "1")?;

        let err = db.remove_page(&id).unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(_)), "{err:?}");
        assert_eq!(db.statistic()?, before);
        assert_eq!(comments::list_by_owner(db.conn(), &id)?.len(), 2);
        assert_eq!(db.get_page(&id)?.comment_count, 2);
        Ok(())
    }

    #[test]
    fn remove_missing_page_is_not_found() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert!(matches!(
            db.remove_page("missing"),
            Err(ServiceError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn list_pages_paginates_in_order() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        for name in ["a", "b", "c"] {
            db.add_page(input(name, name))?;
        }
        let paged = db.list_pages(&PageQuery::new(2, 2, 5)?)?;
        assert_eq!(paged.pagination.pagination_page_count, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].title, "c");
        Ok(())
    }
}
