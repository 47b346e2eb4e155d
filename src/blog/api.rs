use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State, rejection::JsonRejection,
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::access::{self, AccessPolicy, CurrentUser, Entity, Role};
use super::db::DbHandle;
#[cfg(test)]
use super::db::SoloDb;
use super::models::{ArticleInput, CommentInput, OwnerType, PageInput};
use super::ordering::{Direction, OrderChange};
use super::pagination::PageQuery;
use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-solo-user-id";
pub const USER_ROLE_HEADER: &str = "x-solo-user-role";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub access: Arc<dyn AccessPolicy>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PageRequest {
    pub page: PageInput,
}

#[derive(Deserialize)]
pub struct ArticleRequest {
    pub article: ArticleInput,
}

#[derive(Deserialize)]
pub struct ChangeOrderRequest {
    #[serde(rename = "oId")]
    pub id: String,
    pub direction: String,
}

#[derive(Deserialize)]
pub struct KeywordQuery {
    pub k: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({"sc": false, "msg": message}))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let msg = err.to_string();
        match err {
            ServiceError::InvalidPermalinkFormat { .. }
            | ServiceError::DuplicatePermalink { .. }
            | ServiceError::BadRequest(_) => ApiError::BadRequest(msg),
            ServiceError::NotFound { .. } => ApiError::NotFound(msg),
            ServiceError::Forbidden => ApiError::Forbidden(msg),
            ServiceError::LockPoisoned | ServiceError::Persistence(_) => {
                error!(error = %msg, "Console request failed");
                ApiError::Internal(msg)
            }
        }
    }
}

// ── JSON body ─────────────────────────────────────────────────────────

/// `Json` whose rejection is the console failure envelope instead of
/// axum's plain-text body.
pub struct ConsoleJson<T>(pub T);

impl<S, T> FromRequest<S> for ConsoleJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

// ── Current user ──────────────────────────────────────────────────────

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(id) = header_value(parts, USER_ID_HEADER) else {
            return Err(ApiError::Forbidden("Forbidden".into()));
        };
        let role = match header_value(parts, USER_ROLE_HEADER) {
            Some(role) => Role::from_str(role).map_err(ApiError::Forbidden)?,
            None => Role::Author,
        };
        Ok(CurrentUser {
            id: id.to_string(),
            role,
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/console/page/", post(add_page).put(update_page))
        .route("/console/page/order/", put(change_page_order))
        .route("/console/page/{id}", get(get_page).delete(remove_page))
        .route("/console/pages/{page}/{size}/{window}", get(list_pages))
        .route("/console/article/", post(add_article).put(update_article))
        .route("/console/article/{id}", get(get_article).delete(remove_article))
        .route("/console/article/puttop/{id}", put(put_top_article))
        .route("/console/article/canceltop/{id}", put(cancel_top_article))
        .route("/console/article/unpublish/{id}", put(cancel_publish_article))
        .route(
            "/console/articles/status/{status}/{page}/{size}/{window}",
            get(list_articles),
        )
        .route("/console/comments/{page}/{size}/{window}", get(list_comments))
        .route("/console/comments/article/{id}", get(article_comments))
        .route("/console/comments/page/{id}", get(page_comments))
        .route("/console/page/comment/{id}", delete(remove_page_comment))
        .route("/console/article/comment/{id}", delete(remove_article_comment))
        .route("/console/tags", get(list_tags))
        .route("/console/archive-dates", get(list_archive_dates))
        .route(
            "/console/archive-date/{id}/articles/{page}/{size}/{window}",
            get(articles_by_archive_date),
        )
        .route("/console/statistic", get(get_statistic))
        .route("/console/statistic/repair", post(repair_statistic))
        .route("/add-page-comment.do", post(add_page_comment))
        .route("/add-article-comment.do", post(add_article_comment))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn add_page(
    State(state): State<SharedState>,
    user: CurrentUser,
    ConsoleJson(req): ConsoleJson<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let id = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Blog, &user)?;
            db.add_page(req.page)
        })
        .await?;
    Ok(Json(json!({"sc": true, "oId": id, "msg": "Page added"})))
}

async fn update_page(
    State(state): State<SharedState>,
    user: CurrentUser,
    ConsoleJson(req): ConsoleJson<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            let id = req.page.id.clone().unwrap_or_default();
            access::ensure(policy.as_ref(), db, Entity::Page(&id), &user)?;
            db.update_page(req.page)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Page updated"})))
}

async fn remove_page(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Page(&id), &user)?;
            db.remove_page(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Page removed"})))
}

async fn change_page_order(
    State(state): State<SharedState>,
    user: CurrentUser,
    ConsoleJson(req): ConsoleJson<ChangeOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let direction = Direction::from_str(&req.direction).map_err(ApiError::BadRequest)?;
    let policy = state.access.clone();
    let change = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Page(&req.id), &user)?;
            db.change_page_order(&req.id, direction)
        })
        .await?;
    Ok(Json(json!({
        "sc": true,
        "changed": change == OrderChange::Swapped,
    })))
}

async fn get_page(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let page = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Page(&id), &user)?;
            db.get_page(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "page": page})))
}

async fn list_pages(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path((page, size, window)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let query = PageQuery::new(page, size, window)?;
    let policy = state.access.clone();
    let paged = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Blog, &user)?;
            db.list_pages(&query)
        })
        .await?;
    Ok(Json(json!({
        "sc": true,
        "pagination": paged.pagination,
        "pages": paged.items,
    })))
}

async fn add_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    ConsoleJson(req): ConsoleJson<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .db
        .call(move |db| db.add_article(req.article, &user.id))
        .await?;
    Ok(Json(json!({"sc": true, "oId": id, "msg": "Article added"})))
}

async fn update_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    ConsoleJson(req): ConsoleJson<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            let id = req.article.id.clone().unwrap_or_default();
            access::ensure(policy.as_ref(), db, Entity::Article(&id), &user)?;
            db.update_article(req.article)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Article updated"})))
}

async fn remove_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Article(&id), &user)?;
            db.remove_article(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Article removed"})))
}

async fn get_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let article = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Article(&id), &user)?;
            db.get_article(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "article": article})))
}

async fn set_article_top(
    state: SharedState,
    user: CurrentUser,
    id: String,
    top: bool,
) -> Result<Json<serde_json::Value>, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Blog, &user)?;
            db.top_article(&id, top)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Article updated"})))
}

async fn put_top_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_article_top(state, user, id, true).await
}

async fn cancel_top_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_article_top(state, user, id, false).await
}

async fn cancel_publish_article(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Article(&id), &user)?;
            db.cancel_publish_article(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Article unpublished"})))
}

async fn list_articles(
    State(state): State<SharedState>,
    _user: CurrentUser,
    Path((status, page, size, window)): Path<(String, i64, i64, i64)>,
    Query(q): Query<KeywordQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let published = match status.as_str() {
        "published" => true,
        "draft" => false,
        other => return Err(ApiError::BadRequest(format!("Invalid article status: {other}"))),
    };
    let query = PageQuery::new(page, size, window)?;
    let paged = state
        .db
        .call(move |db| db.list_articles(published, &query, q.k.as_deref()))
        .await?;
    Ok(Json(json!({
        "sc": true,
        "pagination": paged.pagination,
        "articles": paged.items,
    })))
}

async fn list_comments(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path((page, size, window)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let query = PageQuery::new(page, size, window)?;
    let policy = state.access.clone();
    let paged = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Blog, &user)?;
            db.list_comments(&query)
        })
        .await?;
    Ok(Json(json!({
        "sc": true,
        "pagination": paged.pagination,
        "comments": paged.items,
    })))
}

async fn article_comments(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let comments = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Article(&id), &user)?;
            db.comments_of(OwnerType::Article, &id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "comments": comments})))
}

async fn page_comments(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let comments = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Page(&id), &user)?;
            db.comments_of(OwnerType::Page, &id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "comments": comments})))
}

async fn remove_page_comment(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Comment(&id), &user)?;
            db.remove_page_comment(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Comment removed"})))
}

async fn remove_article_comment(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    state
        .db
        .call(move |db| {
            let comment = db.get_comment(&id)?;
            access::ensure(policy.as_ref(), db, Entity::Article(&comment.owner_id), &user)?;
            db.remove_article_comment(&id)
        })
        .await?;
    Ok(Json(json!({"sc": true, "msg": "Comment removed"})))
}

async fn list_tags(
    State(state): State<SharedState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state.db.call(|db| db.list_tags()).await?;
    Ok(Json(json!({"sc": true, "tags": tags})))
}

async fn list_archive_dates(
    State(state): State<SharedState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let dates = state.db.call(|db| db.list_archive_dates()).await?;
    Ok(Json(json!({"sc": true, "archiveDates": dates})))
}

async fn articles_by_archive_date(
    State(state): State<SharedState>,
    _user: CurrentUser,
    Path((id, page, size, window)): Path<(String, i64, i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let query = PageQuery::new(page, size, window)?;
    let paged = state
        .db
        .call(move |db| db.articles_by_archive_date(&id, &query))
        .await?;
    Ok(Json(json!({
        "sc": true,
        "pagination": paged.pagination,
        "articles": paged.items,
    })))
}

async fn get_statistic(
    State(state): State<SharedState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let stat = state.db.call(|db| db.statistic()).await?;
    Ok(Json(json!({"sc": true, "statistic": stat})))
}

async fn repair_statistic(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let policy = state.access.clone();
    let stat = state
        .db
        .call(move |db| {
            access::ensure(policy.as_ref(), db, Entity::Blog, &user)?;
            db.repair_counters()
        })
        .await?;
    Ok(Json(json!({"sc": true, "statistic": stat})))
}

async fn add_comment(
    state: SharedState,
    owner_type: OwnerType,
    input: CommentInput,
) -> Result<Json<serde_json::Value>, ApiError> {
    let comment = state
        .db
        .call(move |db| {
            let id = db.add_comment(owner_type, input)?;
            db.get_comment(&id)
        })
        .await?;
    Ok(Json(json!({
        "sc": true,
        "oId": comment.id,
        "commentSharpURL": comment.sharp_url,
    })))
}

async fn add_page_comment(
    State(state): State<SharedState>,
    ConsoleJson(input): ConsoleJson<CommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    add_comment(state, OwnerType::Page, input).await
}

async fn add_article_comment(
    State(state): State<SharedState>,
    ConsoleJson(input): ConsoleJson<CommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    add_comment(state, OwnerType::Article, input).await
}
