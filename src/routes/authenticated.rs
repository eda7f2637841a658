use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer. This module implements the core contributor features:
/// blog submission, editing, deletion, the personal dashboard list, and avatar
/// management.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above it. That guarantees the handlers
/// receive a validated `AuthUser` claim containing the user's ID and role,
/// which drives all owner-or-admin checks (via `policy::can_mutate`).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        // Retrieves the fresh user record behind the session claim. 404 if the
        // account was deleted while its token was still circulating.
        .route("/auth/me", get(handlers::me))
        // GET /me/blogs
        // Lists the authenticated user's own blogs in every moderation status.
        // Admins receive the full set, which drives the pending-review queue.
        .route("/me/blogs", get(handlers::my_blogs))
        // POST /me/avatar
        // Uploads a new profile image through the media store and records its
        // URL on the user record.
        .route("/me/avatar", post(handlers::update_avatar))
        // POST /blogs
        // Submits a new blog from a multipart form (text fields + image file).
        // Initial status depends on role: admin posts go live, user posts queue
        // as pending.
        .route("/blogs", post(handlers::create_blog))
        // PATCH/DELETE /blogs/{id}
        // Partial update or removal of an existing blog. Strict ownership
        // (owner-or-admin) is enforced inside the handlers.
        .route(
            "/blogs/{id}",
            patch(handlers::update_blog).delete(handlers::delete_blog),
        )
}
