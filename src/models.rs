use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Persisted Records ---

/// BlogPost
///
/// A row of `blog_posts`. `content` is the Markdown source; it is rendered on read and
/// never stored as HTML.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    // Set the first time the post is published, kept across unpublish/republish.
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PortfolioProject
///
/// A showcase entry on the portfolio page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PortfolioProject {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub tech_stack: Vec<String>,
    pub live_url: Option<String>,
    pub repo_url: Option<String>,
    pub featured: bool,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Venture
///
/// A company or product the owner runs or co-founded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Venture {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    // Free-form lifecycle label, e.g. "active", "acquired", "sunset".
    pub status: String,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ContactSubmission
///
/// A message left through the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// SiteSettings
///
/// The single-row `site_settings` table driving the hero, footer and contact details.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct SiteSettings {
    pub site_title: String,
    pub tagline: String,
    pub about: String,
    pub contact_email: String,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub available_for_work: bool,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// CreatePostRequest
///
/// `slug` is derived from the title when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

/// NewPost
///
/// A validated post ready for insertion (slug resolved).
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
}

/// UpdatePostRequest
///
/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PreviewRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PreviewResponse {
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProjectInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VentureInput {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default = "default_venture_status")]
    pub status: String,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_venture_status() -> String {
    "active".to_string()
}

/// ContactRequest
///
/// Public contact-form payload (POST /contact).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MarkContactRequest {
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_for_work: Option<bool>,
}

/// LoginForm
///
/// Fields posted by the HTML sign-in form. The password is forwarded to the identity
/// provider and never stored or logged.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for an admin media file.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "cover.png")]
    pub filename: String,
    /// Must be an `image/*` MIME type.
    #[schema(example = "image/png")]
    pub file_type: String,
}

// --- Responses ---

/// RenderedPost
///
/// A published post as served to readers, with its Markdown already rendered.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RenderedPost {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
    pub html: String,
}

impl RenderedPost {
    pub fn from_post(post: BlogPost, html: String) -> Self {
        Self {
            slug: post.slug,
            title: post.title,
            excerpt: post.excerpt,
            cover_image: post.cover_image,
            tags: post.tags,
            published_at: post.published_at,
            html,
        }
    }
}

/// ContactView
///
/// A contact submission as shown in the admin inbox. `message_html` is sanitized: the
/// text comes from anonymous visitors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContactView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub submission: ContactSubmission,
    pub message_html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}

/// DashboardStats
///
/// Counters for the admin landing page (GET /admin).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_projects: i64,
    pub total_ventures: i64,
    pub unread_contacts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Dashboard {
    pub email: String,
    pub stats: DashboardStats,
}

/// slugify
///
/// URL slug from a title: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
