#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use chrono::Utc;
use folio_backend::{
    AppConfig, AppState, MockMediaStore, create_router,
    auth::{IdentityProvider, SessionUser},
    models::{
        BlogPost, ContactRequest, ContactSubmission, DashboardStats, NewPost, PortfolioProject,
        ProjectInput, SiteSettings, UpdatePostRequest, UpdateSettingsRequest, Venture,
        VentureInput,
    },
    notify::{Notifier, NotifyError},
    repository::{RepoResult, Repository},
};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- In-memory persistence ---

#[derive(Default)]
struct Tables {
    posts: Vec<BlogPost>,
    projects: Vec<PortfolioProject>,
    ventures: Vec<Venture>,
    contacts: Vec<ContactSubmission>,
    settings: SiteSettings,
}

#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let repo = Self::default();
        repo.tables.lock().unwrap().settings.site_title = "My Site".to_string();
        repo
    }

    pub fn contacts(&self) -> Vec<ContactSubmission> {
        self.tables.lock().unwrap().contacts.clone()
    }

    pub fn seed_post(&self, slug: &str, content: &str, published: bool) -> BlogPost {
        let now = Utc::now();
        let post = BlogPost {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: slug.to_string(),
            content: content.to_string(),
            published,
            published_at: published.then_some(now),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        self.tables.lock().unwrap().posts.push(post.clone());
        post
    }

    pub fn seed_contact(&self, message: &str) -> ContactSubmission {
        let submission = ContactSubmission {
            id: Uuid::new_v4(),
            name: "Visitor".to_string(),
            email: "visitor@example.com".to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            ..Default::default()
        };
        self.tables.lock().unwrap().contacts.push(submission.clone());
        submission
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_posts(&self, published_only: bool) -> RepoResult<Vec<BlogPost>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter()
            .filter(|p| !published_only || p.published)
            .cloned()
            .collect())
    }

    async fn get_post(&self, id: Uuid) -> RepoResult<Option<BlogPost>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn get_published_post(&self, slug: &str) -> RepoResult<Option<BlogPost>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter()
            .find(|p| p.slug == slug && p.published)
            .cloned())
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<BlogPost> {
        let now = Utc::now();
        let created = BlogPost {
            id: Uuid::new_v4(),
            slug: post.slug,
            title: post.title,
            excerpt: post.excerpt,
            content: post.content,
            cover_image: post.cover_image,
            tags: post.tags,
            published: post.published,
            published_at: post.published.then_some(now),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> RepoResult<Option<BlogPost>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(slug) = req.slug {
            post.slug = slug;
        }
        if let Some(content) = req.content {
            post.content = content;
        }
        if let Some(published) = req.published {
            post.published = published;
            if published && post.published_at.is_none() {
                post.published_at = Some(Utc::now());
            }
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        Ok(tables.posts.len() != before)
    }

    async fn list_projects(&self) -> RepoResult<Vec<PortfolioProject>> {
        Ok(self.tables.lock().unwrap().projects.clone())
    }

    async fn create_project(&self, input: ProjectInput) -> RepoResult<PortfolioProject> {
        let project = PortfolioProject {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            image_url: input.image_url,
            tech_stack: input.tech_stack,
            live_url: input.live_url,
            repo_url: input.repo_url,
            featured: input.featured,
            sort_order: input.sort_order,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: Uuid, input: ProjectInput) -> RepoResult<Option<PortfolioProject>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.projects.iter_mut().find(|p| p.id == id).map(|p| {
            p.title = input.title;
            p.description = input.description;
            p.clone()
        }))
    }

    async fn delete_project(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        Ok(tables.projects.len() != before)
    }

    async fn list_ventures(&self) -> RepoResult<Vec<Venture>> {
        Ok(self.tables.lock().unwrap().ventures.clone())
    }

    async fn create_venture(&self, input: VentureInput) -> RepoResult<Venture> {
        let venture = Venture {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            url: input.url,
            logo_url: input.logo_url,
            status: input.status,
            sort_order: input.sort_order,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().ventures.push(venture.clone());
        Ok(venture)
    }

    async fn update_venture(&self, id: Uuid, input: VentureInput) -> RepoResult<Option<Venture>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.ventures.iter_mut().find(|v| v.id == id).map(|v| {
            v.name = input.name;
            v.description = input.description;
            v.status = input.status;
            v.clone()
        }))
    }

    async fn delete_venture(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.ventures.len();
        tables.ventures.retain(|v| v.id != id);
        Ok(tables.ventures.len() != before)
    }

    async fn create_contact(&self, req: ContactRequest) -> RepoResult<ContactSubmission> {
        let submission = ContactSubmission {
            id: Uuid::new_v4(),
            name: req.name,
            email: req.email,
            subject: req.subject,
            message: req.message,
            is_read: false,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().contacts.push(submission.clone());
        Ok(submission)
    }

    async fn list_contacts(&self) -> RepoResult<Vec<ContactSubmission>> {
        Ok(self.tables.lock().unwrap().contacts.clone())
    }

    async fn mark_contact(&self, id: Uuid, is_read: bool) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.contacts.iter_mut().find(|c| c.id == id) {
            Some(contact) => {
                contact.is_read = is_read;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_contact(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.contacts.len();
        tables.contacts.retain(|c| c.id != id);
        Ok(tables.contacts.len() != before)
    }

    async fn get_settings(&self) -> RepoResult<SiteSettings> {
        Ok(self.tables.lock().unwrap().settings.clone())
    }

    async fn update_settings(&self, req: UpdateSettingsRequest) -> RepoResult<SiteSettings> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(title) = req.site_title {
            tables.settings.site_title = title;
        }
        if let Some(tagline) = req.tagline {
            tables.settings.tagline = tagline;
        }
        if let Some(available) = req.available_for_work {
            tables.settings.available_for_work = available;
        }
        tables.settings.updated_at = Utc::now();
        Ok(tables.settings.clone())
    }

    async fn get_stats(&self) -> RepoResult<DashboardStats> {
        let tables = self.tables.lock().unwrap();
        Ok(DashboardStats {
            total_posts: tables.posts.len() as i64,
            published_posts: tables.posts.iter().filter(|p| p.published).count() as i64,
            total_projects: tables.projects.len() as i64,
            total_ventures: tables.ventures.len() as i64,
            unread_contacts: tables.contacts.iter().filter(|c| !c.is_read).count() as i64,
        })
    }
}

// --- Notifications ---

/// Records every notification; optionally fails after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Uuid>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn contact_received(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(submission.id);
        if self.fail {
            return Err(NotifyError::Rejected(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(())
    }
}

// --- App construction ---

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub notifier: Arc<RecordingNotifier>,
}

pub struct TestAppBuilder {
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<RecordingNotifier>,
    storage: MockMediaStore,
    config: AppConfig,
}

impl TestAppBuilder {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            notifier: Arc::new(RecordingNotifier::default()),
            storage: MockMediaStore::new(),
            config: AppConfig::default(),
        }
    }

    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn storage(mut self, storage: MockMediaStore) -> Self {
        self.storage = storage;
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TestApp {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState {
            repo: repo.clone(),
            storage: Arc::new(self.storage),
            identity: self.identity,
            notifier: self.notifier.clone(),
            config: self.config,
        };

        TestApp {
            router: create_router(state),
            repo,
            notifier: self.notifier,
        }
    }
}

/// Bare state for routers assembled by hand in a test.
pub fn state(identity: Arc<dyn IdentityProvider>, config: AppConfig) -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()),
        storage: Arc::new(MockMediaStore::new()),
        identity,
        notifier: Arc::new(RecordingNotifier::default()),
        config,
    }
}

pub fn admin_user() -> SessionUser {
    SessionUser {
        id: Uuid::new_v4(),
        email: "owner@example.com".to_string(),
    }
}

// --- Request helpers ---

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}
