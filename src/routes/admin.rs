use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'admin' role:
/// the moderation verbs for the submission queue and subscription oversight.
///
/// Access Control:
/// This router is nested under `/admin` behind the same authentication layer
/// as the user routes, so every request carries a validated `AuthUser` claim.
/// The `role='admin'` requirement itself is checked inside each handler via
/// `policy::can_moderate`, so a non-admin session gets a 403 rather than a
/// pretend-404.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/blogs/{id}/approve
        // Publishes a pending blog, recording the moderator and timestamp.
        // Approving anything not pending is a 409 conflict.
        .route("/blogs/{id}/approve", post(handlers::approve_blog))
        // POST /admin/blogs/{id}/reject
        // Rejects a pending blog with an optional reason (a placeholder is
        // stored when none is supplied) so the owner sees why on their
        // dashboard.
        .route("/blogs/{id}/reject", post(handlers::reject_blog))
        // GET /admin/subscriptions
        // Lists every captured newsletter subscription, newest first.
        .route("/subscriptions", get(handlers::list_subscriptions))
        // DELETE /admin/subscriptions/{id}
        // Removes a subscription by id.
        .route("/subscriptions/{id}", delete(handlers::delete_subscription))
}
