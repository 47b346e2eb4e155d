use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of a navigation page. `Link` pages carry an external URL as their
/// permalink and are exempt from permalink format and uniqueness checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    #[default]
    Page,
    Link,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Link => "link",
        }
    }
}

impl FromStr for PageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "link" => Ok(Self::Link),
            _ => Err(format!("Invalid page type: {}", s)),
        }
    }
}

/// The entity a comment belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Page,
    Article,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Article => "article",
        }
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(Self::Page),
            "article" => Ok(Self::Article),
            _ => Err(format!("Invalid comment owner type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    pub content: String,
    pub order: i64,
    pub permalink: String,
    pub comment_count: i64,
    pub commentable: bool,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub editor_type: String,
    pub icon: String,
    pub open_target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub content: String,
    pub permalink: String,
    pub published: bool,
    pub had_been_published: bool,
    pub top: bool,
    /// Denormalized comma separated tag titles; the `tag_article` rows are
    /// the relation of record.
    pub tags: String,
    pub author_id: String,
    pub commentable: bool,
    pub view_pwd: String,
    pub comment_count: i64,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub owner_id: String,
    pub owner_type: OwnerType,
    pub name: String,
    pub email: String,
    pub url: String,
    pub content: String,
    pub created: String,
    #[serde(rename = "sharpURL")]
    pub sharp_url: String,
    pub original_comment_id: String,
    pub original_comment_name: String,
}

/// Blog-wide counters. These are caches over the page, article and comment
/// rows; `SoloDb::repair_counters` rebuilds them from the source rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub blog_article_count: i64,
    pub published_blog_article_count: i64,
    pub blog_comment_count: i64,
    pub published_blog_comment_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub title: String,
    pub article_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveDate {
    pub id: String,
    /// `yyyy/MM`
    pub month: String,
    pub article_count: i64,
    pub published_article_count: i64,
}

// ── Requests ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

/// Page fields accepted by add/update. `id` is required on update and
/// ignored on add.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    #[serde(default, alias = "oId")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default = "default_true")]
    pub commentable: bool,
    #[serde(default, rename = "type")]
    pub page_type: PageType,
    #[serde(default)]
    pub editor_type: Option<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub open_target: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArticleInput {
    #[serde(default, alias = "oId")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_true")]
    pub commentable: bool,
    #[serde(default)]
    pub view_pwd: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    /// Id of the page or article being commented on.
    #[serde(alias = "oId")]
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
    pub content: String,
    /// Set when replying to an existing comment of the same owner.
    #[serde(default)]
    pub original_comment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_serializes_contract_field_names() {
        let page = Page {
            id: "1".into(),
            title: "About".into(),
            content: String::new(),
            order: 3,
            permalink: "/about".into(),
            comment_count: 2,
            commentable: true,
            page_type: PageType::Page,
            editor_type: "CodeMirror-Markdown".into(),
            icon: String::new(),
            open_target: "_self".into(),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["order"], 3);
        assert_eq!(json["commentCount"], 2);
        assert_eq!(json["type"], "page");
        assert_eq!(json["editorType"], "CodeMirror-Markdown");
    }

    #[test]
    fn comment_serializes_sharp_url_field() {
        let comment = Comment {
            id: "2".into(),
            owner_id: "1".into(),
            owner_type: OwnerType::Page,
            name: "reader".into(),
            email: String::new(),
            url: String::new(),
            content: "hello".into(),
            created: String::new(),
            sharp_url: "/about#2".into(),
            original_comment_id: String::new(),
            original_comment_name: String::new(),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["sharpURL"], "/about#2");
        assert_eq!(json["ownerId"], "1");
        assert_eq!(json["originalCommentId"], "");
    }

    #[test]
    fn page_input_defaults() {
        let input: PageInput = serde_json::from_str(r#"{"title": "Links"}"#).unwrap();
        assert!(input.id.is_none());
        assert!(input.commentable);
        assert_eq!(input.page_type, PageType::Page);
        assert!(input.editor_type.is_none());
        assert!(input.permalink.is_empty());
    }

    #[test]
    fn article_input_reads_abstract_and_oid() {
        let input: ArticleInput = serde_json::from_str(
            r#"{"oId": "7", "title": "T", "abstract": "short", "published": true}"#,
        )
        .unwrap();
        assert_eq!(input.id.as_deref(), Some("7"));
        assert_eq!(input.summary, "short");
        assert!(input.published);
    }

    #[test]
    fn enums_round_trip_through_strings() {
        assert_eq!(PageType::from_str("link").unwrap(), PageType::Link);
        assert!(PageType::from_str("nav").is_err());
        assert_eq!(OwnerType::Article.as_str(), "article");
        assert!(OwnerType::from_str("tag").is_err());
    }
}
