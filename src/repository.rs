use crate::models::{
    BlogPost, ContactRequest, ContactSubmission, DashboardStats, NewPost, PortfolioProject,
    ProjectInput, SiteSettings, UpdatePostRequest, UpdateSettingsRequest, Venture, VentureInput,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Abstract contract for all persistence. Handlers only see this trait, so tests swap in
/// an in-memory implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Blog ---
    /// All posts (`published_only = false`, admin) or published posts only, newest first.
    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<BlogPost>>;
    async fn get_post(&self, id: Uuid) -> RepoResult<Option<BlogPost>>;
    /// Published post by slug. Drafts are invisible here.
    async fn get_published_post(&self, slug: &str) -> RepoResult<Option<BlogPost>>;
    async fn create_post(&self, post: NewPost) -> RepoResult<BlogPost>;
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> RepoResult<Option<BlogPost>>;
    async fn delete_post(&self, id: Uuid) -> RepoResult<bool>;

    // --- Portfolio ---
    async fn list_projects(&self) -> RepoResult<Vec<PortfolioProject>>;
    async fn create_project(&self, input: ProjectInput) -> RepoResult<PortfolioProject>;
    async fn update_project(&self, id: Uuid, input: ProjectInput) -> RepoResult<Option<PortfolioProject>>;
    async fn delete_project(&self, id: Uuid) -> RepoResult<bool>;

    // --- Ventures ---
    async fn list_ventures(&self) -> RepoResult<Vec<Venture>>;
    async fn create_venture(&self, input: VentureInput) -> RepoResult<Venture>;
    async fn update_venture(&self, id: Uuid, input: VentureInput) -> RepoResult<Option<Venture>>;
    async fn delete_venture(&self, id: Uuid) -> RepoResult<bool>;

    // --- Contact ---
    async fn create_contact(&self, req: ContactRequest) -> RepoResult<ContactSubmission>;
    async fn list_contacts(&self) -> RepoResult<Vec<ContactSubmission>>;
    async fn mark_contact(&self, id: Uuid, is_read: bool) -> RepoResult<bool>;
    async fn delete_contact(&self, id: Uuid) -> RepoResult<bool>;

    // --- Settings & Dashboard ---
    async fn get_settings(&self) -> RepoResult<SiteSettings>;
    async fn update_settings(&self, req: UpdateSettingsRequest) -> RepoResult<SiteSettings>;
    async fn get_stats(&self) -> RepoResult<DashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const POST_COLUMNS: &str = "id, slug, title, excerpt, content, cover_image, tags, published, \
     published_at, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, title, description, image_url, tech_stack, live_url, \
     repo_url, featured, sort_order, created_at";
const VENTURE_COLUMNS: &str =
    "id, name, description, url, logo_url, status, sort_order, created_at";
const CONTACT_COLUMNS: &str = "id, name, email, subject, message, is_read, created_at";
const SETTINGS_COLUMNS: &str = "site_title, tagline, about, contact_email, github_url, \
     linkedin_url, twitter_url, available_for_work, updated_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Queries are checked at runtime so
/// the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<BlogPost>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts \
             WHERE ($1 = false OR published = true) \
             ORDER BY COALESCE(published_at, created_at) DESC"
        );
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(published_only)
            .fetch_all(&self.pool)
            .await
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<BlogPost>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE id = $1");
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_published_post(&self, slug: &str) -> RepoResult<Option<BlogPost>> {
        let sql =
            format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = $1 AND published = true");
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<BlogPost> {
        let sql = format!(
            "INSERT INTO blog_posts (slug, title, excerpt, content, cover_image, tags, published, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 THEN now() ELSE NULL END) \
             RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(post.slug)
            .bind(post.title)
            .bind(post.excerpt)
            .bind(post.content)
            .bind(post.cover_image)
            .bind(post.tags)
            .bind(post.published)
            .fetch_one(&self.pool)
            .await
    }

    /// Partial update via COALESCE. `published_at` is stamped on first publication only.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> RepoResult<Option<BlogPost>> {
        let sql = format!(
            "UPDATE blog_posts SET \
                title = COALESCE($2, title), \
                slug = COALESCE($3, slug), \
                excerpt = COALESCE($4, excerpt), \
                content = COALESCE($5, content), \
                cover_image = COALESCE($6, cover_image), \
                tags = COALESCE($7, tags), \
                published = COALESCE($8, published), \
                published_at = CASE \
                    WHEN COALESCE($8, published) AND published_at IS NULL THEN now() \
                    ELSE published_at END, \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, BlogPost>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.slug)
            .bind(req.excerpt)
            .bind(req.content)
            .bind(req.cover_image)
            .bind(req.tags)
            .bind(req.published)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_projects(&self) -> RepoResult<Vec<PortfolioProject>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM portfolio_projects \
             ORDER BY featured DESC, sort_order ASC, created_at DESC"
        );
        sqlx::query_as::<_, PortfolioProject>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn create_project(&self, input: ProjectInput) -> RepoResult<PortfolioProject> {
        let sql = format!(
            "INSERT INTO portfolio_projects \
                (title, description, image_url, tech_stack, live_url, repo_url, featured, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, PortfolioProject>(&sql)
            .bind(input.title)
            .bind(input.description)
            .bind(input.image_url)
            .bind(input.tech_stack)
            .bind(input.live_url)
            .bind(input.repo_url)
            .bind(input.featured)
            .bind(input.sort_order)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_project(&self, id: Uuid, input: ProjectInput) -> RepoResult<Option<PortfolioProject>> {
        let sql = format!(
            "UPDATE portfolio_projects SET \
                title = $2, description = $3, image_url = $4, tech_stack = $5, \
                live_url = $6, repo_url = $7, featured = $8, sort_order = $9 \
             WHERE id = $1 \
             RETURNING {PROJECT_COLUMNS}"
        );
        sqlx::query_as::<_, PortfolioProject>(&sql)
            .bind(id)
            .bind(input.title)
            .bind(input.description)
            .bind(input.image_url)
            .bind(input.tech_stack)
            .bind(input.live_url)
            .bind(input.repo_url)
            .bind(input.featured)
            .bind(input.sort_order)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_project(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM portfolio_projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_ventures(&self) -> RepoResult<Vec<Venture>> {
        let sql = format!(
            "SELECT {VENTURE_COLUMNS} FROM ventures ORDER BY sort_order ASC, created_at DESC"
        );
        sqlx::query_as::<_, Venture>(&sql).fetch_all(&self.pool).await
    }

    async fn create_venture(&self, input: VentureInput) -> RepoResult<Venture> {
        let sql = format!(
            "INSERT INTO ventures (name, description, url, logo_url, status, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {VENTURE_COLUMNS}"
        );
        sqlx::query_as::<_, Venture>(&sql)
            .bind(input.name)
            .bind(input.description)
            .bind(input.url)
            .bind(input.logo_url)
            .bind(input.status)
            .bind(input.sort_order)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_venture(&self, id: Uuid, input: VentureInput) -> RepoResult<Option<Venture>> {
        let sql = format!(
            "UPDATE ventures SET \
                name = $2, description = $3, url = $4, logo_url = $5, status = $6, sort_order = $7 \
             WHERE id = $1 \
             RETURNING {VENTURE_COLUMNS}"
        );
        sqlx::query_as::<_, Venture>(&sql)
            .bind(id)
            .bind(input.name)
            .bind(input.description)
            .bind(input.url)
            .bind(input.logo_url)
            .bind(input.status)
            .bind(input.sort_order)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_venture(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM ventures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_contact(&self, req: ContactRequest) -> RepoResult<ContactSubmission> {
        let sql = format!(
            "INSERT INTO contact_submissions (name, email, subject, message) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {CONTACT_COLUMNS}"
        );
        sqlx::query_as::<_, ContactSubmission>(&sql)
            .bind(req.name)
            .bind(req.email)
            .bind(req.subject)
            .bind(req.message)
            .fetch_one(&self.pool)
            .await
    }

    async fn list_contacts(&self) -> RepoResult<Vec<ContactSubmission>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_submissions ORDER BY is_read ASC, created_at DESC"
        );
        sqlx::query_as::<_, ContactSubmission>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn mark_contact(&self, id: Uuid, is_read: bool) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE contact_submissions SET is_read = $2 WHERE id = $1")
            .bind(id)
            .bind(is_read)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_contact(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM contact_submissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The settings row is seeded by the initial migration.
    async fn get_settings(&self) -> RepoResult<SiteSettings> {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM site_settings WHERE id = 1");
        sqlx::query_as::<_, SiteSettings>(&sql)
            .fetch_one(&self.pool)
            .await
    }

    async fn update_settings(&self, req: UpdateSettingsRequest) -> RepoResult<SiteSettings> {
        let sql = format!(
            "UPDATE site_settings SET \
                site_title = COALESCE($1, site_title), \
                tagline = COALESCE($2, tagline), \
                about = COALESCE($3, about), \
                contact_email = COALESCE($4, contact_email), \
                github_url = COALESCE($5, github_url), \
                linkedin_url = COALESCE($6, linkedin_url), \
                twitter_url = COALESCE($7, twitter_url), \
                available_for_work = COALESCE($8, available_for_work), \
                updated_at = now() \
             WHERE id = 1 \
             RETURNING {SETTINGS_COLUMNS}"
        );
        sqlx::query_as::<_, SiteSettings>(&sql)
            .bind(req.site_title)
            .bind(req.tagline)
            .bind(req.about)
            .bind(req.contact_email)
            .bind(req.github_url)
            .bind(req.linkedin_url)
            .bind(req.twitter_url)
            .bind(req.available_for_work)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM blog_posts) AS total_posts,
                (SELECT COUNT(*) FROM blog_posts WHERE published) AS published_posts,
                (SELECT COUNT(*) FROM portfolio_projects) AS total_projects,
                (SELECT COUNT(*) FROM ventures) AS total_ventures,
                (SELECT COUNT(*) FROM contact_submissions WHERE NOT is_read) AS unread_contacts
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }
}
