use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client
/// (anonymous or logged-in). These cover the credential gateway, the public
/// blog catalog, and newsletter capture.
///
/// Security Mandate:
/// The blog listing and detail handlers in this module must filter every post
/// through `policy::can_read` before it leaves the server. An anonymous reader
/// only ever sees approved posts; pending and rejected submissions stay
/// visible solely to their owner and to admins.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/signup
        // Creates a new account (role 'user') and signs it in immediately by
        // setting the session cookie on the response.
        .route("/auth/signup", post(handlers::signup))
        // POST /auth/signin
        // Verifies email + password and issues a fresh session cookie.
        // Rejections are deliberately indistinguishable between unknown email
        // and wrong password.
        .route("/auth/signin", post(handlers::signin))
        // POST /auth/signout
        // Clears the session cookie. Stateless on the server side.
        .route("/auth/signout", post(handlers::signout))
        // GET /blogs
        // Lists blogs newest-first, filtered by the reader's identity through
        // the read policy.
        .route("/blogs", get(handlers::list_blogs))
        // GET /blogs/{id}
        // Single blog detail, with the same read-policy gate. 404 for an
        // unknown id, 403 for an existing post the reader may not see.
        .route("/blogs/{id}", get(handlers::get_blog_details))
        // POST /subscriptions
        // Newsletter capture from a URL-encoded form. Duplicate emails are 409.
        .route("/subscriptions", post(handlers::subscribe))
}
