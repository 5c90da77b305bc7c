use crate::{
    AppState,
    auth::{self, ACCESS_COOKIE},
    error::{AppError, AppResult},
    gate::{ADMIN_ROOT, AdminSession, GuestOnly, LOGIN_PATH},
    markdown,
    storage,
    models::{
        BlogPost, ContactRequest, ContactSubmission, ContactView, CreatePostRequest, Dashboard,
        LoginForm, MarkContactRequest, NewPost, PortfolioProject, PresignedUrlRequest,
        PresignedUrlResponse, PreviewRequest, PreviewResponse, ProjectInput, RenderedPost,
        SiteSettings, UpdatePostRequest, UpdateSettingsRequest, Venture, VentureInput, slugify,
    },
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

// --- Input limits ---

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 320;
const MAX_SUBJECT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5_000;

// --- Public: Blog ---

/// list_posts
///
/// [Public Route] Published posts, newest first. Drafts never appear here.
#[utoipa::path(
    get,
    path = "/blog",
    responses((status = 200, description = "Published posts", body = [BlogPost]))
)]
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<BlogPost>>> {
    Ok(Json(state.repo.list_posts(true).await?))
}

/// get_post
///
/// [Public Route] A single published post with its Markdown rendered to HTML.
#[utoipa::path(
    get,
    path = "/blog/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Rendered post", body = RenderedPost),
        (status = 404, description = "Missing or unpublished")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<RenderedPost>> {
    let post = state
        .repo
        .get_published_post(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let html = markdown::render(&post.content);
    Ok(Json(RenderedPost::from_post(post, html)))
}

// --- Public: Showcase ---

#[utoipa::path(
    get,
    path = "/portfolio",
    responses((status = 200, description = "Portfolio projects", body = [PortfolioProject]))
)]
pub async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Vec<PortfolioProject>>> {
    Ok(Json(state.repo.list_projects().await?))
}

#[utoipa::path(
    get,
    path = "/ventures",
    responses((status = 200, description = "Ventures", body = [Venture]))
)]
pub async fn list_ventures(State(state): State<AppState>) -> AppResult<Json<Vec<Venture>>> {
    Ok(Json(state.repo.list_ventures().await?))
}

#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Site settings", body = SiteSettings))
)]
pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<SiteSettings>> {
    Ok(Json(state.repo.get_settings().await?))
}

// --- Public: Contact ---

fn validate_contact(req: &ContactRequest) -> AppResult<ContactRequest> {
    let name = req.name.trim();
    let email = req.email.trim();
    let message = req.message.trim();
    let subject = req
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if email.len() > MAX_EMAIL_LEN || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if message.is_empty() || message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "message is required and must be at most {MAX_MESSAGE_LEN} bytes"
        )));
    }
    if subject.is_some_and(|s| s.len() > MAX_SUBJECT_LEN) {
        return Err(AppError::Validation("subject is too long".to_string()));
    }

    Ok(ContactRequest {
        name: name.to_string(),
        email: email.to_string(),
        subject: subject.map(str::to_string),
        message: message.to_string(),
    })
}

/// submit_contact
///
/// [Public Route] Stores a contact-form submission, then notifies the owner by email.
/// The notification is best effort: once stored, the submission is not lost.
#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Stored", body = ContactSubmission),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<(StatusCode, Json<ContactSubmission>)> {
    let request = validate_contact(&payload)?;
    let submission = state.repo.create_contact(request).await?;

    if let Err(e) = state.notifier.contact_received(&submission).await {
        tracing::warn!(error = %e, contact_id = %submission.id, "contact notification failed");
    }

    Ok((StatusCode::CREATED, Json(submission)))
}

// --- Login ---

#[derive(Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "invalid" => "Invalid email or password.",
        "unavailable" => "Sign-in is temporarily unavailable. Please try again.",
        _ => "Please sign in.",
    }
}

/// login_page
///
/// [Login Route] The sign-in form. Signed-in callers never see it: `GuestOnly` sends them
/// to the dashboard.
pub async fn login_page(_guest: GuestOnly, Query(query): Query<LoginQuery>) -> Html<String> {
    let notice = query
        .error
        .as_deref()
        .map(|code| format!("<p class=\"error\" role=\"alert\">{}</p>", login_error_message(code)))
        .unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Admin sign in</title></head>
<body>
<main>
<h1>Admin</h1>
{notice}
<form method="post" action="{LOGIN_PATH}">
<label>Email <input type="email" name="email" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</main>
</body>
</html>"#
    ))
}

/// login
///
/// [Login Route] Exchanges credentials for a session, stores it in cookies and sends the
/// admin to the dashboard. Failures go back to the form with an error code.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.identity.sign_in(form.email.trim(), &form.password).await {
        Ok(signed_in) => {
            tracing::info!(user_id = %signed_in.user.id, "admin signed in");
            let jar = signed_in.tokens.store(jar, state.config.secure_cookies());
            (jar, Redirect::to(ADMIN_ROOT)).into_response()
        }
        Err(auth::AuthError::InvalidCredentials) => {
            Redirect::to(&format!("{LOGIN_PATH}?error=invalid")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "sign-in failed");
            Redirect::to(&format!("{LOGIN_PATH}?error=unavailable")).into_response()
        }
    }
}

// --- Admin ---

/// logout
///
/// [Admin Route] Revokes the session at the provider (best effort) and clears cookies.
pub async fn logout(
    AdminSession { user }: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Response {
    if let Some(access) = jar.get(ACCESS_COOKIE) {
        if let Err(e) = state.identity.sign_out(access.value()).await {
            tracing::warn!(error = %e, user_id = %user.id, "provider sign-out failed");
        }
    }

    (auth::clear_session(jar), Redirect::to(LOGIN_PATH)).into_response()
}

/// dashboard
///
/// [Admin Route] Landing page counters.
#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Dashboard", body = Dashboard))
)]
pub async fn dashboard(
    AdminSession { user }: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<Dashboard>> {
    let stats = state.repo.get_stats().await?;
    Ok(Json(Dashboard {
        email: user.email,
        stats,
    }))
}

/// Resolves the slug for a new post: explicit slug if given, else derived from the title.
fn resolve_slug(explicit: Option<&str>, title: &str) -> AppResult<String> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => slugify(explicit),
        None => slugify(title),
    };
    if slug.is_empty() {
        return Err(AppError::Validation(
            "slug must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

#[utoipa::path(
    get,
    path = "/admin/blog",
    responses((status = 200, description = "All posts, drafts included", body = [BlogPost]))
)]
pub async fn admin_list_posts(
    _session: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<BlogPost>>> {
    Ok(Json(state.repo.list_posts(false).await?))
}

#[utoipa::path(
    get,
    path = "/admin/blog/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 200, description = "Post", body = BlogPost))
)]
pub async fn admin_get_post(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BlogPost>> {
    state
        .repo
        .get_post(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// create_post
///
/// [Admin Route] New post. A duplicate slug is a 409.
#[utoipa::path(
    post,
    path = "/admin/blog",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = BlogPost),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_post(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let post = NewPost {
        slug: resolve_slug(payload.slug.as_deref(), title)?,
        title: title.to_string(),
        excerpt: payload.excerpt,
        content: payload.content,
        cover_image: payload.cover_image,
        tags: payload.tags,
        published: payload.published,
    };

    let created = state.repo.create_post(post).await?;
    tracing::info!(post_id = %created.id, slug = %created.slug, "post created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/admin/blog/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses((status = 200, description = "Updated", body = BlogPost))
)]
pub async fn update_post(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdatePostRequest>,
) -> AppResult<Json<BlogPost>> {
    if let Some(slug) = payload.slug.take() {
        payload.slug = Some(resolve_slug(Some(slug.as_str()), "")?);
    }
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    state
        .repo
        .update_post(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/admin/blog/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_post(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    match state.repo.delete_post(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::NotFound),
    }
}

/// preview_post
///
/// [Admin Route] Renders unsaved Markdown exactly as readers will see it.
#[utoipa::path(
    post,
    path = "/admin/blog/preview",
    request_body = PreviewRequest,
    responses((status = 200, description = "Rendered HTML", body = PreviewResponse))
)]
pub async fn preview_post(
    _session: AdminSession,
    Json(payload): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    Json(PreviewResponse {
        html: markdown::render(&payload.content),
    })
}

#[utoipa::path(
    get,
    path = "/admin/portfolio",
    responses((status = 200, description = "Portfolio projects", body = [PortfolioProject]))
)]
pub async fn admin_list_projects(
    _session: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PortfolioProject>>> {
    Ok(Json(state.repo.list_projects().await?))
}

#[utoipa::path(
    post,
    path = "/admin/portfolio",
    request_body = ProjectInput,
    responses((status = 201, description = "Created", body = PortfolioProject))
)]
pub async fn create_project(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<ProjectInput>,
) -> AppResult<(StatusCode, Json<PortfolioProject>)> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    Ok((StatusCode::CREATED, Json(state.repo.create_project(payload).await?)))
}

#[utoipa::path(
    put,
    path = "/admin/portfolio/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = ProjectInput,
    responses((status = 200, description = "Updated", body = PortfolioProject))
)]
pub async fn update_project(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectInput>,
) -> AppResult<Json<PortfolioProject>> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    state
        .repo
        .update_project(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/admin/portfolio/{id}",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_project(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    match state.repo.delete_project(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::NotFound),
    }
}

#[utoipa::path(
    get,
    path = "/admin/ventures",
    responses((status = 200, description = "Ventures", body = [Venture]))
)]
pub async fn admin_list_ventures(
    _session: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Venture>>> {
    Ok(Json(state.repo.list_ventures().await?))
}

#[utoipa::path(
    post,
    path = "/admin/ventures",
    request_body = VentureInput,
    responses((status = 201, description = "Created", body = Venture))
)]
pub async fn create_venture(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<VentureInput>,
) -> AppResult<(StatusCode, Json<Venture>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    Ok((StatusCode::CREATED, Json(state.repo.create_venture(payload).await?)))
}

#[utoipa::path(
    put,
    path = "/admin/ventures/{id}",
    params(("id" = Uuid, Path, description = "Venture ID")),
    request_body = VentureInput,
    responses((status = 200, description = "Updated", body = Venture))
)]
pub async fn update_venture(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VentureInput>,
) -> AppResult<Json<Venture>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    state
        .repo
        .update_venture(id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/admin/ventures/{id}",
    params(("id" = Uuid, Path, description = "Venture ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_venture(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    match state.repo.delete_venture(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::NotFound),
    }
}

/// list_contacts
///
/// [Admin Route] The contact inbox, unread first. Messages come from anonymous visitors,
/// so their HTML goes through the sanitizing renderer.
#[utoipa::path(
    get,
    path = "/admin/contacts",
    responses((status = 200, description = "Contact submissions", body = [ContactView]))
)]
pub async fn list_contacts(
    _session: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ContactView>>> {
    let contacts = state
        .repo
        .list_contacts()
        .await?
        .into_iter()
        .map(|submission| ContactView {
            message_html: markdown::render_untrusted(&submission.message),
            submission,
        })
        .collect();

    Ok(Json(contacts))
}

#[utoipa::path(
    patch,
    path = "/admin/contacts/{id}",
    params(("id" = Uuid, Path, description = "Submission ID")),
    request_body = MarkContactRequest,
    responses((status = 204, description = "Updated"), (status = 404, description = "Not Found"))
)]
pub async fn mark_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkContactRequest>,
) -> AppResult<StatusCode> {
    match state.repo.mark_contact(id, payload.is_read).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::NotFound),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/contacts/{id}",
    params(("id" = Uuid, Path, description = "Submission ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    match state.repo.delete_contact(id).await? {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(AppError::NotFound),
    }
}

#[utoipa::path(
    get,
    path = "/admin/settings",
    responses((status = 200, description = "Site settings", body = SiteSettings))
)]
pub async fn admin_get_settings(
    _session: AdminSession,
    State(state): State<AppState>,
) -> AppResult<Json<SiteSettings>> {
    Ok(Json(state.repo.get_settings().await?))
}

#[utoipa::path(
    put,
    path = "/admin/settings",
    request_body = UpdateSettingsRequest,
    responses((status = 200, description = "Updated", body = SiteSettings))
)]
pub async fn update_settings(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SiteSettings>> {
    if payload.site_title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("site title cannot be empty".to_string()));
    }
    Ok(Json(state.repo.update_settings(payload).await?))
}

/// get_presigned_url
///
/// [Admin Route] Short-lived direct-to-storage upload URL for an image. The object key
/// is a fresh UUID; only the extension comes from the client.
#[utoipa::path(
    post,
    path = "/admin/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Not an image")
    )
)]
pub async fn get_presigned_url(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    if !payload.file_type.starts_with("image/") {
        return Err(AppError::BadRequest("only image uploads are accepted".to_string()));
    }

    let object_key = storage::upload_key(&payload.filename);
    let upload_url = state
        .storage
        .presign_upload(&object_key, &payload.file_type)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}
