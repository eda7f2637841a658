use crate::{
    AppState,
    auth::{self, AuthUser, MaybeUser},
    error::ApiError,
    models::{
        self, BlogChanges, BlogResponse, BlogStatus, Category, MIN_PASSWORD_LEN, NewBlog,
        PublicUser, RejectRequest, SigninRequest, SignupRequest, SubscribeForm,
    },
    policy,
    storage::{self, UploadedFile},
};
use axum::{
    Form, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

// --- Multipart Helpers ---

/// BlogForm
///
/// The decoded multipart payload shared by blog create and update. Every field
/// is optional at this level; the create handler enforces which ones are
/// required. Empty text fields are dropped so a blank form input reads as
/// "not supplied" for partial updates.
#[derive(Default)]
struct BlogForm {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    author: Option<String>,
    image: Option<UploadedFile>,
    // The authorImg field is a file when uploaded from disk, or a plain URL
    // string when the client passes a link through.
    author_img_file: Option<UploadedFile>,
    author_img_url: Option<String>,
}

fn multipart_error(_: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation("Malformed multipart body".to_string())
}

async fn read_file_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<Option<UploadedFile>, ApiError> {
    let filename = field.file_name().unwrap_or("upload.bin").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedFile {
        filename,
        content_type,
        bytes,
    }))
}

async fn read_blog_form(mut multipart: Multipart) -> Result<BlogForm, ApiError> {
    let mut form = BlogForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                form.title = Some(field.text().await.map_err(multipart_error)?)
                    .filter(|s| !s.is_empty());
            }
            "description" => {
                form.description = Some(field.text().await.map_err(multipart_error)?)
                    .filter(|s| !s.is_empty());
            }
            "category" => {
                form.category = Some(field.text().await.map_err(multipart_error)?)
                    .filter(|s| !s.is_empty());
            }
            "author" => {
                form.author = Some(field.text().await.map_err(multipart_error)?)
                    .filter(|s| !s.is_empty());
            }
            "image" => {
                form.image = read_file_field(field).await?;
            }
            "authorImg" => {
                if field.file_name().is_some() {
                    form.author_img_file = read_file_field(field).await?;
                } else {
                    form.author_img_url = Some(field.text().await.map_err(multipart_error)?)
                        .filter(|s| !s.is_empty());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    Category::from_str(raw).map_err(|_| ApiError::Validation("Invalid category".to_string()))
}

// --- Auth Handlers ---

/// signup
///
/// [Public Route] Registers a new account and signs the user in. Only the
/// argon2 hash of the password is stored, and the session cookie is set on the
/// response.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = PublicUser),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }
    if !models::validate_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Case-insensitive uniqueness: emails are lowercased before every lookup
    // and insert. A concurrent signup race is caught by the unique constraint
    // below.
    if state.repo.find_user_by_email(&payload.email).await.is_some() {
        return Err(ApiError::Duplicate("Email already registered".to_string()));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user = state
        .repo
        .create_user(payload.name.trim(), &payload.email, &password_hash)
        .await
        .ok_or(ApiError::Duplicate("Email already registered".to_string()))?;

    let token = auth::sign_session_token(&user, &state.config.jwt_secret)?;
    let jar = jar.add(auth::session_cookie(token, &state.config));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({
            "success": true,
            "message": "Account created successfully",
            "user": PublicUser::from(&user),
        })),
    ))
}

/// signin
///
/// [Public Route] Authenticates by email + password and sets the session
/// cookie. The failure message never distinguishes "no such user" from "wrong
/// password", to avoid user enumeration; the hash comparison itself is
/// constant-time inside argon2.
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Logged in", body = PublicUser),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .repo
        .find_user_by_email(&payload.email)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = auth::sign_session_token(&user, &state.config.jwt_secret)?;
    let jar = jar.add(auth::session_cookie(token, &state.config));

    Ok((
        jar,
        Json(json!({
            "success": true,
            "message": "Logged in successfully",
            "user": PublicUser::from(&user),
        })),
    ))
}

/// signout
///
/// [Public Route] Clears the client-held session cookie. The server keeps no
/// session list, so this is advisory only: a copied token stays valid until
/// its expiry.
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn signout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(auth::removal_cookie()),
        Json(json!({
            "success": true,
            "message": "Logged out",
        })),
    )
}

/// me
///
/// [Authenticated Route] Returns the fresh user record behind the session
/// claim. Unlike the claim itself, this endpoint does consult the database, so
/// a deleted account shows up as 404 here even while its token is still
/// technically valid.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Profile", body = PublicUser),
        (status = 404, description = "Account no longer exists")
    )
)]
pub async fn me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::from(&user),
    })))
}

/// update_avatar
///
/// [Authenticated Route] Uploads a new profile picture through the media store
/// and records its URL on the user. Subsequent tokens and blog bylines pick it
/// up; already-issued tokens keep the stale snapshot until expiry.
#[utoipa::path(
    post,
    path = "/me/avatar",
    responses(
        (status = 200, description = "Avatar updated"),
        (status = 400, description = "Avatar file missing")
    )
)]
pub async fn update_avatar(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut avatar: Option<UploadedFile> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("avatar") {
            avatar = read_file_field(field).await?;
        }
    }

    let file =
        avatar.ok_or_else(|| ApiError::Validation("Avatar file is required".to_string()))?;

    let url = state
        .storage
        .store(file.bytes, "avatars", &file.filename, &file.content_type)
        .await
        .map_err(|e| {
            tracing::error!("avatar upload failed: {}", e);
            ApiError::Upload("Failed to update avatar".to_string())
        })?;

    let user = state
        .repo
        .set_user_avatar(id, &url)
        .await
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Avatar updated successfully!",
        "avatar": user.avatar,
    })))
}

// --- Blog Handlers ---

/// list_blogs
///
/// [Public Route] Lists blogs newest-first, filtered per-post through the read
/// policy: anonymous visitors see only approved (and legacy) blogs, while an
/// authenticated reader additionally sees their own pending/rejected ones and
/// an admin sees everything. Category filtering happens client-side on this
/// list.
#[utoipa::path(
    get,
    path = "/blogs",
    responses((status = 200, description = "Visible blogs", body = [BlogResponse]))
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    MaybeUser(claim): MaybeUser,
) -> Json<serde_json::Value> {
    let blogs: Vec<BlogResponse> = state
        .repo
        .list_blogs()
        .await
        .iter()
        .filter(|blog| policy::can_read(blog, claim.as_ref()))
        .map(BlogResponse::from)
        .collect();

    Json(json!({ "success": true, "blogs": blogs }))
}

/// my_blogs
///
/// [Authenticated Route] Lists the requesting user's own blogs in every
/// status; admins get the full set instead, which drives the moderation
/// pending queue (the admin UI filters it to `status == pending`).
#[utoipa::path(
    get,
    path = "/me/blogs",
    responses((status = 200, description = "Own blogs (all for admins)", body = [BlogResponse]))
)]
pub async fn my_blogs(claim: AuthUser, State(state): State<AppState>) -> Json<serde_json::Value> {
    let blogs = if policy::can_moderate(&claim) {
        state.repo.list_blogs().await
    } else {
        state.repo.list_blogs_by_owner(claim.id).await
    };
    let blogs: Vec<BlogResponse> = blogs.iter().map(BlogResponse::from).collect();

    Json(json!({ "success": true, "blogs": blogs }))
}

/// get_blog_details
///
/// [Public Route] Single blog by id. A missing blog is 404; an existing blog
/// the reader may not see is 403, distinctly.
#[utoipa::path(
    get,
    path = "/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Found", body = BlogResponse),
        (status = 403, description = "Not visible to this reader"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_blog_details(
    State(state): State<AppState>,
    MaybeUser(claim): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let blog = state
        .repo
        .get_blog(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    if !policy::can_read(&blog, claim.as_ref()) {
        return Err(ApiError::Forbidden(
            "You are not allowed to view this blog".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true, "blog": BlogResponse::from(&blog) })))
}

/// create_blog
///
/// [Authenticated Route] Submits a new blog from a multipart form. Title,
/// description, category, and the image file are all required; the category
/// must be one of the fixed set. The image goes through the media store first
/// and an upload failure fails the whole create rather than persisting a blog
/// without its image. The initial status comes from the creator's role: admin
/// submissions are approved immediately, user submissions queue as pending.
#[utoipa::path(
    post,
    path = "/blogs",
    responses(
        (status = 201, description = "Created", body = BlogResponse),
        (status = 400, description = "Missing field or invalid category"),
        (status = 502, description = "Media store failure")
    )
)]
pub async fn create_blog(
    claim: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    if !policy::can_create(&claim) {
        return Err(ApiError::Forbidden(
            "You are not allowed to create blogs".to_string(),
        ));
    }

    let form = read_blog_form(multipart).await?;

    let (Some(title), Some(description), Some(category)) =
        (form.title, form.description, form.category)
    else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };
    let Some(image) = form.image else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };
    let category = parse_category(&category)?;

    let image_url = state
        .storage
        .store(image.bytes, "blog_images", &image.filename, &image.content_type)
        .await
        .map_err(|e| {
            tracing::error!("blog image upload failed: {}", e);
            ApiError::Upload("Failed to upload image".to_string())
        })?;

    // Byline data comes from the identity record where available; the claim's
    // snapshot covers a record deleted mid-session.
    let user = state.repo.get_user(claim.id).await;
    let author = if !claim.name.is_empty() {
        claim.name.clone()
    } else {
        form.author.unwrap_or_else(|| "Anonymous".to_string())
    };
    let stored_avatar = user.as_ref().and_then(|u| u.avatar.as_deref());
    let author_img = storage::resolve_author_image(
        &state.storage,
        form.author_img_file,
        form.author_img_url,
        stored_avatar,
    )
    .await?;

    let blog = state
        .repo
        .create_blog(NewBlog {
            title,
            description,
            category,
            image: image_url,
            author,
            author_img,
            user_id: claim.id,
            status: BlogStatus::initial_for(claim.role),
        })
        .await
        .ok_or(ApiError::Server)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Blog added successfully!",
            "blog": BlogResponse::from(&blog),
        })),
    ))
}

/// update_blog
///
/// [Authenticated Route] Partial update of an existing blog: only supplied
/// multipart fields are overwritten, and the image is re-uploaded only when
/// new bytes arrive. Allowed for the owner and for admins. Updating never
/// resets moderation status; an approved blog stays approved after an edit.
#[utoipa::path(
    patch,
    path = "/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Updated", body = BlogResponse),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_blog(
    claim: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let blog = state
        .repo
        .get_blog(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    if !policy::can_mutate(&blog, &claim) {
        return Err(ApiError::Forbidden(
            "You can only update your own blogs".to_string(),
        ));
    }

    let form = read_blog_form(multipart).await?;

    let category = match form.category {
        Some(raw) => Some(parse_category(&raw)?),
        None => None,
    };

    let image = match form.image {
        Some(file) => Some(
            state
                .storage
                .store(file.bytes, "blog_images", &file.filename, &file.content_type)
                .await
                .map_err(|e| {
                    tracing::error!("blog image upload failed: {}", e);
                    ApiError::Upload("Failed to upload image".to_string())
                })?,
        ),
        None => None,
    };

    // The byline avatar only changes when the form explicitly supplies one,
    // keeping the update strictly partial.
    let author_img = if form.author_img_file.is_some() || form.author_img_url.is_some() {
        Some(
            storage::resolve_author_image(
                &state.storage,
                form.author_img_file,
                form.author_img_url,
                None,
            )
            .await?,
        )
    } else {
        None
    };

    let updated = state
        .repo
        .update_blog(
            id,
            BlogChanges {
                title: form.title,
                description: form.description,
                category,
                image,
                author_img,
            },
        )
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog updated successfully",
        "blog": BlogResponse::from(&updated),
    })))
}

/// delete_blog
///
/// [Authenticated Route] Deletes a blog. Allowed for the owner and for admins.
/// The stored image is removed best-effort afterwards: a media store failure
/// is logged but never turns a completed delete into an error.
#[utoipa::path(
    delete,
    path = "/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_blog(
    claim: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let blog = state
        .repo
        .get_blog(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    if !policy::can_mutate(&blog, &claim) {
        return Err(ApiError::Forbidden(
            "You can only delete your own blogs".to_string(),
        ));
    }

    if !state.repo.delete_blog(id).await {
        return Err(ApiError::NotFound("Blog not found".to_string()));
    }

    if let Err(e) = state.storage.remove(&blog.image).await {
        tracing::warn!("failed to remove blog image {}: {}", blog.image, e);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Blog deleted successfully!",
    })))
}

// --- Moderation Handlers ---

/// approve_blog
///
/// [Admin Route] Moves a pending blog to approved, recording the moderator and
/// the timestamp. Approving a blog that is not pending is a 409: moderation
/// only ever acts on the pending queue, which also makes replayed approvals
/// harmless.
#[utoipa::path(
    post,
    path = "/admin/blogs/{id}/approve",
    params(("id" = Uuid, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Approved"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn approve_blog(
    claim: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !policy::can_moderate(&claim) {
        return Err(ApiError::Forbidden(
            "Only admins can approve blogs".to_string(),
        ));
    }

    let blog = state
        .repo
        .get_blog(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    if blog.effective_status() != BlogStatus::Pending {
        return Err(ApiError::InvalidState(
            "Only pending blogs can be approved".to_string(),
        ));
    }

    state
        .repo
        .approve_blog(id, claim.id)
        .await
        .ok_or(ApiError::Server)?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog approved successfully",
    })))
}

/// reject_blog
///
/// [Admin Route] Moves a pending blog to rejected, storing the reason (or a
/// placeholder when none is given). Restricted to pending blogs for the same
/// reason approval is.
#[utoipa::path(
    post,
    path = "/admin/blogs/{id}/reject",
    params(("id" = Uuid, Path, description = "Blog ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn reject_blog(
    claim: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !policy::can_moderate(&claim) {
        return Err(ApiError::Forbidden(
            "Only admins can reject blogs".to_string(),
        ));
    }

    let blog = state
        .repo
        .get_blog(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))?;

    if blog.effective_status() != BlogStatus::Pending {
        return Err(ApiError::InvalidState(
            "Only pending blogs can be rejected".to_string(),
        ));
    }

    let reason = payload
        .and_then(|Json(body)| body.reason)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "No reason provided".to_string());

    state
        .repo
        .reject_blog(id, &reason)
        .await
        .ok_or(ApiError::Server)?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog rejected",
    })))
}

// --- Subscription Handlers ---

/// subscribe
///
/// [Public Route] Captures a newsletter subscription from a form post.
/// Duplicate emails are a 409.
#[utoipa::path(
    post,
    path = "/subscriptions",
    responses(
        (status = 201, description = "Subscribed"),
        (status = 400, description = "Missing or malformed email"),
        (status = 409, description = "Already subscribed")
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Form(payload): Form<SubscribeForm>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }
    if !models::validate_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    if state
        .repo
        .find_subscription(&payload.email)
        .await
        .is_some()
    {
        return Err(ApiError::Duplicate("Email already subscribed".to_string()));
    }

    state
        .repo
        .create_subscription(&payload.email)
        .await
        .ok_or(ApiError::Duplicate("Email already subscribed".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Email subscribed successfully!",
        })),
    ))
}

/// list_subscriptions
///
/// [Admin Route] Lists every captured subscription, newest first.
#[utoipa::path(
    get,
    path = "/admin/subscriptions",
    responses(
        (status = 200, description = "Subscriptions", body = [models::Subscription]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_subscriptions(
    claim: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !policy::can_moderate(&claim) {
        return Err(ApiError::Forbidden("Forbidden. Admins only.".to_string()));
    }

    let subscriptions = state.repo.list_subscriptions().await;
    Ok(Json(json!({
        "success": true,
        "subscriptions": subscriptions,
    })))
}

/// delete_subscription
///
/// [Admin Route] Removes a subscription by id.
#[utoipa::path(
    delete,
    path = "/admin/subscriptions/{id}",
    params(("id" = Uuid, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_subscription(
    claim: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !policy::can_moderate(&claim) {
        return Err(ApiError::Forbidden("Forbidden. Admins only.".to_string()));
    }

    if !state.repo.delete_subscription(id).await {
        return Err(ApiError::NotFound("Email not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Email deleted successfully!",
    })))
}
