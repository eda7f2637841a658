use blog_portal::{
    AppConfig, AppState, MockStorageService, create_router,
    auth::hash_password,
    models::Role,
    repository::{MemoryRepository, RepositoryState, seeded_user},
    storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

// --- Test Harness ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub storage: Arc<MockStorageService>,
}

/// Boots the full router on an ephemeral port against the in-memory repository
/// and the mock media store, so the whole HTTP surface (routing, middleware,
/// extractors, handlers) is exercised without external services.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let storage = Arc::new(MockStorageService::new());
    let config = AppConfig::default();

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: storage.clone() as StorageState,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        storage,
    }
}

/// A client that keeps the session cookie across requests, like a browser.
fn session_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

/// Registers an account through the API and leaves its session cookie in the
/// client's jar.
async fn signup(app: &TestApp, client: &reqwest::Client, name: &str, email: &str, password: &str) {
    let response = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({ "name": name, "email": email, "password": password }))
        .send()
        .await
        .expect("signup request failed");
    assert_eq!(response.status(), 201);
}

/// Seeds an admin account directly (signup only ever produces the 'user'
/// role) and signs it in through the API.
async fn signin_as_admin(app: &TestApp, client: &reqwest::Client) {
    let mut admin = seeded_user("Admin", "admin@example.com", Role::Admin);
    admin.password_hash = hash_password("adminpassword").unwrap();
    app.repo.seed_user(admin);

    let response = client
        .post(format!("{}/auth/signin", app.address))
        .json(&json!({ "email": "admin@example.com", "password": "adminpassword" }))
        .send()
        .await
        .expect("signin request failed");
    assert_eq!(response.status(), 200);
}

fn blog_form(title: &str, category: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("title", title.to_string())
        .text("description", "<p>body</p>".to_string())
        .text("category", category.to_string())
        .part(
            "image",
            reqwest::multipart::Part::bytes(vec![0xde, 0xad, 0xbe, 0xef])
                .file_name("cover.png")
                .mime_str("image/png")
                .unwrap(),
        )
}

async fn create_blog(app: &TestApp, client: &reqwest::Client, title: &str) -> Value {
    let response = client
        .post(format!("{}/blogs", app.address))
        .multipart(blog_form(title, "Technology"))
        .send()
        .await
        .expect("create blog failed");
    assert_eq!(response.status(), 201);
    response.json::<Value>().await.unwrap()
}

async fn listed_titles(app: &TestApp, client: &reqwest::Client) -> Vec<String> {
    let body: Value = client
        .get(format!("{}/blogs", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["blogs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect()
}

// --- Health / Auth ---

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_signup_validation_failures() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Too-short password
    let response = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({ "name": "A", "email": "a@example.com", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Malformed email
    let response = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({ "name": "A", "email": "not-an-email", "password": "longenough" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_signup_duplicate_email_conflicts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    signup(&app, &session_client(), "First", "dup@example.com", "password1").await;

    let response = client
        .post(format!("{}/auth/signup", app.address))
        .json(&json!({ "name": "Second", "email": "DUP@example.com", "password": "password2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_signin_rejections_are_indistinguishable() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    signup(&app, &session_client(), "Riley", "riley@example.com", "password1").await;

    let wrong_password: reqwest::Response = client
        .post(format!("{}/auth/signin", app.address))
        .json(&json!({ "email": "riley@example.com", "password": "password2" }))
        .send()
        .await
        .unwrap();
    let unknown_user = client
        .post(format!("{}/auth/signin", app.address))
        .json(&json!({ "email": "ghost@example.com", "password": "password1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_user.status(), 401);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn test_me_requires_session_and_signout_clears_it() {
    let app = spawn_app().await;

    // Anonymous access to the session surface is a 401.
    let response = reqwest::Client::new()
        .get(format!("{}/auth/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let client = session_client();
    signup(&app, &client, "Riley", "riley@example.com", "password1").await;

    let body: Value = client
        .get(format!("{}/auth/me", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["user"]["email"], "riley@example.com");
    assert!(body["user"].get("password_hash").is_none());

    // Signout removes the cookie from the jar; the session surface closes.
    client
        .post(format!("{}/auth/signout", app.address))
        .send()
        .await
        .unwrap();
    let response = client
        .get(format!("{}/auth/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

// --- Submission & Visibility ---

#[tokio::test]
async fn test_admin_submission_is_live_immediately() {
    let app = spawn_app().await;
    let admin = session_client();
    signin_as_admin(&app, &admin).await;

    let body = create_blog(&app, &admin, "Platform update").await;
    assert_eq!(body["blog"]["status"], "approved");

    // Anonymous readers see it right away.
    let anon = reqwest::Client::new();
    assert_eq!(listed_titles(&app, &anon).await, vec!["Platform update"]);
}

#[tokio::test]
async fn test_user_submission_queues_as_pending() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;

    let body = create_blog(&app, &user, "My first post").await;
    assert_eq!(body["blog"]["status"], "pending");
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    // Hidden from the anonymous catalog.
    let anon = reqwest::Client::new();
    assert!(listed_titles(&app, &anon).await.is_empty());

    // But present on the owner's dashboard and detail view.
    assert_eq!(listed_titles(&app, &user).await, vec!["My first post"]);
    let detail = user
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(detail.status(), 200);

    // Detail access for strangers distinguishes hidden (403) from absent (404).
    let detail_anon = anon
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(detail_anon.status(), 403);
    let missing = anon
        .get(format!(
            "{}/blogs/{}",
            app.address,
            uuid::Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    // And the personal queue under /me/blogs carries it for the owner.
    let mine: Value = user
        .get(format!("{}/me/blogs", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["blogs"][0]["status"], "pending");
}

#[tokio::test]
async fn test_detail_reads_are_stable_without_intervening_mutation() {
    // Fetching a blog is a pure projection: two reads back to back return
    // byte-identical bodies, including the derived `date` alias.
    let app = spawn_app().await;
    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    let body = create_blog(&app, &admin, "Steady state").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let anon = reqwest::Client::new();
    let first: Value = anon
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: Value = anon
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_create_blog_rejects_missing_image_and_bad_category() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;

    // No image part at all.
    let form = reqwest::multipart::Form::new()
        .text("title", "t")
        .text("description", "d")
        .text("category", "Technology");
    let response = user
        .post(format!("{}/blogs", app.address))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Category outside the fixed set.
    let response = user
        .post(format!("{}/blogs", app.address))
        .multipart(blog_form("t", "Gardening"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_create_blog_requires_authentication() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .post(format!("{}/blogs", app.address))
        .multipart(blog_form("t", "Technology"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

// --- Moderation ---

#[tokio::test]
async fn test_approval_publishes_pending_blog() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let body = create_blog(&app, &user, "Queued post").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let admin = session_client();
    signin_as_admin(&app, &admin).await;

    let response = admin
        .post(format!("{}/admin/blogs/{}/approve", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Now publicly visible, carrying the moderation metadata.
    let anon = reqwest::Client::new();
    assert_eq!(listed_titles(&app, &anon).await, vec!["Queued post"]);
    let detail: Value = anon
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["blog"]["status"], "approved");
    assert!(detail["blog"]["approvedAt"].is_string());

    // Replaying the approval conflicts: the blog is no longer pending.
    let replay = admin
        .post(format!("{}/admin/blogs/{}/approve", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 409);
}

#[tokio::test]
async fn test_rejection_stores_reason_for_the_owner() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let body = create_blog(&app, &user, "Rough draft").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let admin = session_client();
    signin_as_admin(&app, &admin).await;

    let response = admin
        .post(format!("{}/admin/blogs/{}/reject", app.address, blog_id))
        .json(&json!({ "reason": "Low quality" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The owner sees the verdict and its reason on their dashboard.
    let mine: Value = user
        .get(format!("{}/me/blogs", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["blogs"][0]["status"], "rejected");
    assert_eq!(mine["blogs"][0]["rejectionReason"], "Low quality");

    // Rejecting a non-pending blog conflicts.
    let replay = admin
        .post(format!("{}/admin/blogs/{}/reject", app.address, blog_id))
        .json(&json!({ "reason": "again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), 409);
}

#[tokio::test]
async fn test_rejection_without_reason_stores_placeholder() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let body = create_blog(&app, &user, "Draft").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    admin
        .post(format!("{}/admin/blogs/{}/reject", app.address, blog_id))
        .send()
        .await
        .unwrap();

    let mine: Value = user
        .get(format!("{}/me/blogs", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["blogs"][0]["rejectionReason"], "No reason provided");
}

#[tokio::test]
async fn test_moderation_is_admin_only() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let body = create_blog(&app, &user, "Mine").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    // The owner cannot approve their own submission.
    let response = user
        .post(format!("{}/admin/blogs/{}/approve", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Anonymous callers never reach the handler at all.
    let response = reqwest::Client::new()
        .post(format!("{}/admin/blogs/{}/approve", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

// --- Update & Delete ---

#[tokio::test]
async fn test_owner_partial_update_preserves_status() {
    let app = spawn_app().await;
    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    let body = create_blog(&app, &admin, "Original title").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let form = reqwest::multipart::Form::new().text("title", "Revised title");
    let response = admin
        .patch(format!("{}/blogs/{}", app.address, blog_id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["blog"]["title"], "Revised title");
    // Unsupplied fields survive and the moderation status is untouched.
    assert_eq!(updated["blog"]["category"], "Technology");
    assert_eq!(updated["blog"]["status"], "approved");
}

#[tokio::test]
async fn test_competing_updates_are_last_write_wins() {
    // Updates read the blog, check policy, then write with no version guard:
    // when two editors overlap, the later PATCH overwrites the earlier one
    // wholesale. This is the accepted concurrency behavior.
    let app = spawn_app().await;
    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    let body = create_blog(&app, &admin, "Contended post").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let first = reqwest::multipart::Form::new().text("title", "First revision");
    admin
        .patch(format!("{}/blogs/{}", app.address, blog_id))
        .multipart(first)
        .send()
        .await
        .unwrap();

    let second = reqwest::multipart::Form::new().text("title", "Second revision");
    let response = admin
        .patch(format!("{}/blogs/{}", app.address, blog_id))
        .multipart(second)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The earlier revision is gone without a trace.
    let detail: Value = admin
        .get(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["blog"]["title"], "Second revision");
}

#[tokio::test]
async fn test_strangers_cannot_update_or_delete() {
    let app = spawn_app().await;
    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    let body = create_blog(&app, &admin, "Admin post").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();

    let stranger = session_client();
    signup(&app, &stranger, "Sam", "sam@example.com", "password1").await;

    let form = reqwest::multipart::Form::new().text("title", "Hijacked");
    let response = stranger
        .patch(format!("{}/blogs/{}", app.address, blog_id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = stranger
        .delete(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_owner_delete_removes_blog_and_media() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let body = create_blog(&app, &user, "Ephemeral").await;
    let blog_id = body["blog"]["id"].as_str().unwrap().to_string();
    let image_url = body["blog"]["image"].as_str().unwrap().to_string();

    let response = user
        .delete(format!("{}/blogs/{}", app.address, blog_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Gone from the owner's own view too.
    assert!(listed_titles(&app, &user).await.is_empty());

    // The stored image was handed to the media store for removal.
    assert!(app.storage.removed.lock().unwrap().contains(&image_url));
}

// --- Subscriptions ---

#[tokio::test]
async fn test_subscription_capture_and_admin_oversight() {
    let app = spawn_app().await;
    let anon = reqwest::Client::new();

    let response = anon
        .post(format!("{}/subscriptions", app.address))
        .form(&[("email", "reader@example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // Duplicate capture conflicts.
    let response = anon
        .post(format!("{}/subscriptions", app.address))
        .form(&[("email", "Reader@example.com")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Malformed email never reaches the store.
    let response = anon
        .post(format!("{}/subscriptions", app.address))
        .form(&[("email", "not-an-email")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Oversight is admin-only.
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;
    let response = user
        .get(format!("{}/admin/subscriptions", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let admin = session_client();
    signin_as_admin(&app, &admin).await;
    let body: Value = admin
        .get(format!("{}/admin/subscriptions", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subs = body["subscriptions"].as_array().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["email"], "reader@example.com");

    // Admin removal, then a repeat delete misses.
    let sub_id = subs[0]["id"].as_str().unwrap().to_string();
    let response = admin
        .delete(format!("{}/admin/subscriptions/{}", app.address, sub_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let response = admin
        .delete(format!("{}/admin/subscriptions/{}", app.address, sub_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

// --- Avatar ---

#[tokio::test]
async fn test_avatar_upload_feeds_future_bylines() {
    let app = spawn_app().await;
    let user = session_client();
    signup(&app, &user, "Riley", "riley@example.com", "password1").await;

    let form = reqwest::multipart::Form::new().part(
        "avatar",
        reqwest::multipart::Part::bytes(vec![1, 2, 3])
            .file_name("face.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = user
        .post(format!("{}/me/avatar", app.address))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let avatar_url = body["avatar"].as_str().unwrap().to_string();
    assert!(avatar_url.contains("avatars"));

    // A blog created afterwards picks the stored avatar up as its byline image.
    let blog = create_blog(&app, &user, "With my face on it").await;
    assert_eq!(blog["blog"]["authorImg"], avatar_url.as_str());
}
