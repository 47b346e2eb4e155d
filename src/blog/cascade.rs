use rusqlite::Connection;
use tracing::debug;

use crate::blog::repo::comments;
use crate::errors::ServiceError;

/// Anchor link from a comment back to its owner.
pub fn sharp_url(owner_permalink: &str, comment_id: &str) -> String {
    format!("{owner_permalink}#{comment_id}")
}

/// Rewrite the sharp URL of every comment of `owner_id` to point at
/// `new_permalink`, normalizing blank reply fields to the empty string.
/// Returns the number of comments rewritten.
///
/// Runs inside the owner update's transaction; callers only invoke it
/// when the permalink actually changed.
pub fn on_owner_permalink_changed(
    conn: &Connection,
    owner_id: &str,
    new_permalink: &str,
) -> Result<usize, ServiceError> {
    let owned = comments::list_by_owner(conn, owner_id)?;
    let count = owned.len();
    for mut comment in owned {
        comment.sharp_url = sharp_url(new_permalink, &comment.id);
        if comment.original_comment_id.trim().is_empty() {
            comment.original_comment_id = String::new();
        }
        if comment.original_comment_name.trim().is_empty() {
            comment.original_comment_name = String::new();
        }
        comments::update(conn, &comment)?;
    }
    debug!(owner_id, count, "Rewrote comment sharp URLs");
    Ok(count)
}
