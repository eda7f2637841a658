use crate::models::{Blog, BlogChanges, BlogStatus, NewBlog, Role, Subscription, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Repository Trait
///
/// The abstract contract for all persistence operations, letting handlers talk
/// to the data layer without knowing the implementation (Postgres in
/// deployment, the in-memory store in tests).
///
/// The store handle is constructed once at startup and injected through the
/// application state; there is no module-level connection.
///
/// Authorization is deliberately NOT performed here: handlers fetch the
/// entity, consult the policy module, and only then call a mutation. The
/// read-then-write sequence is not guarded by any concurrency control, so two
/// concurrent updates to the same blog race with last-write-wins semantics.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Lookup by lowercased email. Drives both signin and the duplicate check.
    async fn find_user_by_email(&self, email: &str) -> Option<User>;
    async fn get_user(&self, id: Uuid) -> Option<User>;
    /// Inserts a user with the default role. Returns None on failure
    /// (including a lost race on the unique email constraint).
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Option<User>;
    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Option<User>;

    // --- Blogs ---
    /// All blogs, newest first, regardless of status. Callers filter
    /// per-reader through the policy module.
    async fn list_blogs(&self) -> Vec<Blog>;
    /// Blogs owned by one user, newest first, regardless of status.
    async fn list_blogs_by_owner(&self, user_id: Uuid) -> Vec<Blog>;
    async fn get_blog(&self, id: Uuid) -> Option<Blog>;
    async fn create_blog(&self, new: NewBlog) -> Option<Blog>;
    /// Partial update: only `Some` fields of `changes` are written
    /// (COALESCE). Never touches owner or moderation state.
    async fn update_blog(&self, id: Uuid, changes: BlogChanges) -> Option<Blog>;
    async fn delete_blog(&self, id: Uuid) -> bool;
    /// Moderation transition to approved: records the moderator and the
    /// timestamp, clears any stale rejection reason.
    async fn approve_blog(&self, id: Uuid, moderator: Uuid) -> Option<Blog>;
    /// Moderation transition to rejected, storing the reason.
    async fn reject_blog(&self, id: Uuid, reason: &str) -> Option<Blog>;

    // --- Subscriptions ---
    async fn find_subscription(&self, email: &str) -> Option<Subscription>;
    async fn create_subscription(&self, email: &str) -> Option<Subscription>;
    async fn list_subscriptions(&self) -> Vec<Subscription>;
    async fn delete_subscription(&self, id: Uuid) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const BLOG_COLUMNS: &str = "id, title, description, category, image, author, author_img, \
                            user_id, status, rejection_reason, approved_by, approved_at, \
                            created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, password_hash, role, avatar, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation backed by PostgreSQL. Queries use runtime
/// binding; errors are logged and collapsed into the empty/None result the
/// trait promises, never panicking a request.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("find_user_by_email error: {:?}", e);
                None
            })
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Option<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'user', NOW(), NOW()) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(email.to_lowercase())
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                // A unique-constraint violation lands here when two signups race.
                tracing::error!("create_user error: {:?}", e);
                None
            })
    }

    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Option<User> {
        let sql = format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(avatar)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("set_user_avatar error: {:?}", e);
                None
            })
    }

    async fn list_blogs(&self) -> Vec<Blog> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs ORDER BY created_at DESC");
        sqlx::query_as::<_, Blog>(&sql)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_blogs error: {:?}", e);
                vec![]
            })
    }

    async fn list_blogs_by_owner(&self, user_id: Uuid) -> Vec<Blog> {
        let sql = format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Blog>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_blogs_by_owner error: {:?}", e);
                vec![]
            })
    }

    async fn get_blog(&self, id: Uuid) -> Option<Blog> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1");
        sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_blog error: {:?}", e);
                None
            })
    }

    async fn create_blog(&self, new: NewBlog) -> Option<Blog> {
        let sql = format!(
            "INSERT INTO blogs (id, title, description, category, image, author, author_img, \
             user_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING {BLOG_COLUMNS}"
        );
        sqlx::query_as::<_, Blog>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.title)
            .bind(new.description)
            .bind(new.category)
            .bind(new.image)
            .bind(new.author)
            .bind(new.author_img)
            .bind(new.user_id)
            .bind(new.status)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("create_blog error: {:?}", e);
                None
            })
    }

    async fn update_blog(&self, id: Uuid, changes: BlogChanges) -> Option<Blog> {
        let sql = format!(
            "UPDATE blogs \
             SET title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 image = COALESCE($5, image), \
                 author_img = COALESCE($6, author_img), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {BLOG_COLUMNS}"
        );
        sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.category)
            .bind(changes.image)
            .bind(changes.author_img)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("update_blog error: {:?}", e);
                None
            })
    }

    async fn delete_blog(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_blog error: {:?}", e);
                false
            }
        }
    }

    async fn approve_blog(&self, id: Uuid, moderator: Uuid) -> Option<Blog> {
        let sql = format!(
            "UPDATE blogs \
             SET status = 'approved', approved_by = $2, approved_at = NOW(), \
                 rejection_reason = NULL, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {BLOG_COLUMNS}"
        );
        sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .bind(moderator)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("approve_blog error: {:?}", e);
                None
            })
    }

    async fn reject_blog(&self, id: Uuid, reason: &str) -> Option<Blog> {
        let sql = format!(
            "UPDATE blogs \
             SET status = 'rejected', rejection_reason = $2, \
                 approved_by = NULL, approved_at = NULL, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {BLOG_COLUMNS}"
        );
        sqlx::query_as::<_, Blog>(&sql)
            .bind(id)
            .bind(reason)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("reject_blog error: {:?}", e);
                None
            })
    }

    async fn find_subscription(&self, email: &str) -> Option<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, email, created_at FROM subscriptions WHERE email = $1",
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_subscription error: {:?}", e);
            None
        })
    }

    async fn create_subscription(&self, email: &str) -> Option<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscriptions (id, email, created_at) VALUES ($1, $2, NOW()) \
             RETURNING id, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_subscription error: {:?}", e);
            None
        })
    }

    async fn list_subscriptions(&self) -> Vec<Subscription> {
        sqlx::query_as::<_, Subscription>(
            "SELECT id, email, created_at FROM subscriptions ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_subscriptions error: {:?}", e);
            vec![]
        })
    }

    async fn delete_subscription(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_subscription error: {:?}", e);
                false
            }
        }
    }
}

/// MemoryRepository
///
/// In-memory implementation of `Repository` used by the test suite, playing
/// the same role `MockStorageService` plays for the storage layer. Locks are
/// short-lived and never held across an await point.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<Vec<User>>,
    blogs: RwLock<Vec<Blog>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test seeding hook: inserts a fully formed user, including role and
    /// password hash, the way integration tests seed rows directly in SQL.
    pub fn seed_user(&self, user: User) {
        self.users.write().unwrap().push(user);
    }

    /// Test seeding hook for pre-moderation rows (e.g. legacy blogs with no
    /// status).
    pub fn seed_blog(&self, blog: Blog) {
        self.blogs.write().unwrap().push(blog);
    }
}

/// Ready-made user row for seeding, with a throwaway password hash.
pub fn seeded_user(name: &str, email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_lowercase(),
        password_hash: String::new(),
        role,
        avatar: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let email = email.to_lowercase();
        self.users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.read().unwrap().iter().find(|u| u.id == id).cloned()
    }

    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Option<User> {
        let email = email.to_lowercase();
        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| u.email == email) {
            return None;
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            password_hash: password_hash.to_string(),
            role: Role::User,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Some(user)
    }

    async fn set_user_avatar(&self, id: Uuid, avatar: &str) -> Option<User> {
        let mut users = self.users.write().unwrap();
        let user = users.iter_mut().find(|u| u.id == id)?;
        user.avatar = Some(avatar.to_string());
        user.updated_at = Utc::now();
        Some(user.clone())
    }

    async fn list_blogs(&self) -> Vec<Blog> {
        // Insertion order reversed stands in for ORDER BY created_at DESC.
        self.blogs.read().unwrap().iter().rev().cloned().collect()
    }

    async fn list_blogs_by_owner(&self, user_id: Uuid) -> Vec<Blog> {
        self.blogs
            .read()
            .unwrap()
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }

    async fn get_blog(&self, id: Uuid) -> Option<Blog> {
        self.blogs.read().unwrap().iter().find(|b| b.id == id).cloned()
    }

    async fn create_blog(&self, new: NewBlog) -> Option<Blog> {
        let now = Utc::now();
        let blog = Blog {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            image: new.image,
            author: new.author,
            author_img: new.author_img,
            user_id: new.user_id,
            status: Some(new.status),
            rejection_reason: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.blogs.write().unwrap().push(blog.clone());
        Some(blog)
    }

    async fn update_blog(&self, id: Uuid, changes: BlogChanges) -> Option<Blog> {
        let mut blogs = self.blogs.write().unwrap();
        let blog = blogs.iter_mut().find(|b| b.id == id)?;
        if let Some(title) = changes.title {
            blog.title = title;
        }
        if let Some(description) = changes.description {
            blog.description = description;
        }
        if let Some(category) = changes.category {
            blog.category = category;
        }
        if let Some(image) = changes.image {
            blog.image = image;
        }
        if let Some(author_img) = changes.author_img {
            blog.author_img = author_img;
        }
        blog.updated_at = Utc::now();
        Some(blog.clone())
    }

    async fn delete_blog(&self, id: Uuid) -> bool {
        let mut blogs = self.blogs.write().unwrap();
        let before = blogs.len();
        blogs.retain(|b| b.id != id);
        blogs.len() < before
    }

    async fn approve_blog(&self, id: Uuid, moderator: Uuid) -> Option<Blog> {
        let mut blogs = self.blogs.write().unwrap();
        let blog = blogs.iter_mut().find(|b| b.id == id)?;
        blog.status = Some(BlogStatus::Approved);
        blog.approved_by = Some(moderator);
        blog.approved_at = Some(Utc::now());
        blog.rejection_reason = None;
        blog.updated_at = Utc::now();
        Some(blog.clone())
    }

    async fn reject_blog(&self, id: Uuid, reason: &str) -> Option<Blog> {
        let mut blogs = self.blogs.write().unwrap();
        let blog = blogs.iter_mut().find(|b| b.id == id)?;
        blog.status = Some(BlogStatus::Rejected);
        blog.rejection_reason = Some(reason.to_string());
        blog.approved_by = None;
        blog.approved_at = None;
        blog.updated_at = Utc::now();
        Some(blog.clone())
    }

    async fn find_subscription(&self, email: &str) -> Option<Subscription> {
        let email = email.to_lowercase();
        self.subscriptions
            .read()
            .unwrap()
            .iter()
            .find(|s| s.email == email)
            .cloned()
    }

    async fn create_subscription(&self, email: &str) -> Option<Subscription> {
        let email = email.to_lowercase();
        let mut subs = self.subscriptions.write().unwrap();
        if subs.iter().any(|s| s.email == email) {
            return None;
        }
        let sub = Subscription {
            id: Uuid::new_v4(),
            email,
            created_at: Utc::now(),
        };
        subs.push(sub.clone());
        Some(sub)
    }

    async fn list_subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .unwrap()
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    async fn delete_subscription(&self, id: Uuid) -> bool {
        let mut subs = self.subscriptions.write().unwrap();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() < before
    }
}
