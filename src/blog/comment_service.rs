//! Comment management: posting, removal and listings.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, error};

use crate::blog::cascade::sharp_url;
use crate::blog::db::SoloDb;
use crate::blog::ids::next_id;
use crate::blog::models::{Comment, CommentInput, OwnerType};
use crate::blog::pagination::{PageQuery, Paged, Pagination};
use crate::blog::repo::{articles, comments, pages};
use crate::blog::statistics;
use crate::errors::ServiceError;

const MAX_NAME_CHARS: usize = 20;
const MIN_CONTENT_CHARS: usize = 2;
const MAX_CONTENT_CHARS: usize = 500;

/// What a comment needs to know about the entity it hangs off.
struct OwnerInfo {
    permalink: String,
    commentable: bool,
    /// Whether the owner's comments count towards the published counter.
    published: bool,
}

fn owner_info(
    conn: &Connection,
    owner_type: OwnerType,
    owner_id: &str,
) -> Result<OwnerInfo, ServiceError> {
    match owner_type {
        OwnerType::Page => {
            let page = pages::get(conn, owner_id)?
                .ok_or_else(|| ServiceError::not_found("Page", owner_id))?;
            Ok(OwnerInfo {
                permalink: page.permalink,
                commentable: page.commentable,
                published: true,
            })
        }
        OwnerType::Article => {
            let article = articles::get(conn, owner_id)?
                .ok_or_else(|| ServiceError::not_found("Article", owner_id))?;
            Ok(OwnerInfo {
                permalink: article.permalink,
                commentable: article.commentable,
                published: article.published,
            })
        }
    }
}

fn adjust_owner_count(
    conn: &Connection,
    owner_type: OwnerType,
    owner_id: &str,
    delta: i64,
) -> Result<(), ServiceError> {
    match owner_type {
        OwnerType::Page => pages::adjust_comment_count(conn, owner_id, delta)?,
        OwnerType::Article => articles::adjust_comment_count(conn, owner_id, delta)?,
    }
    Ok(())
}

fn validate(input: &CommentInput) -> Result<(), ServiceError> {
    let name = input.name.trim().chars().count();
    if name == 0 || name > MAX_NAME_CHARS {
        return Err(ServiceError::BadRequest(format!(
            "Commenter name must be 1 to {MAX_NAME_CHARS} characters"
        )));
    }
    let content = input.content.trim().chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&content) {
        return Err(ServiceError::BadRequest(format!(
            "Comment content must be {MIN_CONTENT_CHARS} to {MAX_CONTENT_CHARS} characters"
        )));
    }
    let email = input.email.trim();
    if !email.is_empty() && !email.contains('@') {
        return Err(ServiceError::BadRequest(format!("Invalid email: {email}")));
    }
    Ok(())
}

impl SoloDb {
    /// Post a comment on a page or article. Returns the comment id.
    pub fn add_comment(
        &self,
        owner_type: OwnerType,
        input: CommentInput,
    ) -> Result<String, ServiceError> {
        validate(&input)?;
        self.in_transaction(|conn| {
            let owner = owner_info(conn, owner_type, &input.owner_id)?;
            if !owner.commentable {
                return Err(ServiceError::BadRequest(format!(
                    "Comments are disabled on {} {}",
                    owner_type.as_str(),
                    input.owner_id
                )));
            }

            let (original_comment_id, original_comment_name) =
                match input.original_comment_id.as_deref().map(str::trim) {
                    Some(reply_to) if !reply_to.is_empty() => {
                        match comments::get(conn, reply_to)? {
                            Some(original) if original.owner_id == input.owner_id => {
                                (original.id, original.name)
                            }
                            _ => (String::new(), String::new()),
                        }
                    }
                    _ => (String::new(), String::new()),
                };

            let id = next_id();
            let comment = Comment {
                id: id.clone(),
                owner_id: input.owner_id.clone(),
                owner_type,
                name: input.name.trim().to_string(),
                email: input.email.trim().to_string(),
                url: input.url.trim().to_string(),
                content: input.content.trim().to_string(),
                created: Utc::now().to_rfc3339(),
                sharp_url: sharp_url(&owner.permalink, &id),
                original_comment_id,
                original_comment_name,
            };
            comments::insert(conn, &comment)?;
            adjust_owner_count(conn, owner_type, &comment.owner_id, 1)?;
            statistics::adjust_comment_counts(conn, 1, i64::from(owner.published))?;
            debug!(comment_id = %id, owner_id = %comment.owner_id, "Added a comment");
            Ok(id)
        })
        .inspect_err(|e| error!(owner_id = %input.owner_id, error = %e, "Adds a comment failed"))
    }

    pub fn remove_page_comment(&self, comment_id: &str) -> Result<(), ServiceError> {
        self.remove_comment(OwnerType::Page, comment_id)
    }

    pub fn remove_article_comment(&self, comment_id: &str) -> Result<(), ServiceError> {
        self.remove_comment(OwnerType::Article, comment_id)
    }

    fn remove_comment(&self, owner_type: OwnerType, comment_id: &str) -> Result<(), ServiceError> {
        self.in_transaction(|conn| {
            let comment = comments::get(conn, comment_id)?
                .filter(|c| c.owner_type == owner_type)
                .ok_or_else(|| ServiceError::not_found("Comment", comment_id))?;
            let owner = owner_info(conn, owner_type, &comment.owner_id)?;
            comments::remove(conn, comment_id)?;
            adjust_owner_count(conn, owner_type, &comment.owner_id, -1)?;
            statistics::adjust_comment_counts(conn, -1, -i64::from(owner.published))?;
            debug!(comment_id, owner_id = %comment.owner_id, "Removed a comment");
            Ok(())
        })
        .inspect_err(|e| error!(comment_id, error = %e, "Removes a comment failed"))
    }

    pub fn get_comment(&self, comment_id: &str) -> Result<Comment, ServiceError> {
        comments::get(self.conn(), comment_id)?
            .ok_or_else(|| ServiceError::not_found("Comment", comment_id))
    }

    /// Newest comments across the blog.
    pub fn list_comments(&self, query: &PageQuery) -> Result<Paged<Comment>, ServiceError> {
        let total = comments::count(self.conn())?;
        Ok(Paged {
            pagination: Pagination::new(query, total),
            items: comments::list_recent(self.conn(), query.offset(), query.limit())?,
        })
    }

    /// Every comment of one page or article, oldest first.
    pub fn comments_of(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
    ) -> Result<Vec<Comment>, ServiceError> {
        owner_info(self.conn(), owner_type, owner_id)?;
        Ok(comments::list_by_owner(self.conn(), owner_id)?)
    }
}
