use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fallback avatar asset served by the frontend when a user never uploaded one.
pub const DEFAULT_AVATAR: &str = "/profile_icon.png";

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field carried on every user record and inside every session claim.
/// Admins can moderate blogs and manage subscriptions; regular users can only
/// submit and manage their own blogs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// BlogStatus
///
/// The moderation state machine: a blog is created `pending` (or `approved`
/// directly when an admin submits it), and an admin moves a pending blog to
/// `approved` or `rejected`. Legacy rows predating moderation carry no status
/// and read as approved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BlogStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl BlogStatus {
    /// The status a freshly created blog receives, determined by the creator's
    /// role: admin submissions go live immediately, everything else queues for
    /// moderation.
    pub fn initial_for(role: Role) -> Self {
        match role {
            Role::Admin => BlogStatus::Approved,
            Role::User => BlogStatus::Pending,
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlogStatus::Pending => write!(f, "pending"),
            BlogStatus::Approved => write!(f, "approved"),
            BlogStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Category
///
/// The fixed set of blog categories. Submissions carrying anything else are
/// rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text")]
#[ts(export)]
pub enum Category {
    Technology,
    AI,
    Startups,
    Events,
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Technology" => Ok(Category::Technology),
            "AI" => Ok(Category::AI),
            "Startups" => Ok(Category::Startups),
            "Events" => Ok(Category::Events),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Technology => write!(f, "Technology"),
            Category::AI => write!(f, "AI"),
            Category::Startups => write!(f, "Startups"),
            Category::Events => write!(f, "Events"),
        }
    }
}

/// User
///
/// The canonical identity record stored in the `users` table. The password
/// hash is write-only: it is skipped by serde so it can never leak through a
/// response body, mirroring a `select: false` column.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Stored lowercase; uniqueness is enforced case-insensitively at signup.
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PublicUser
///
/// The outward-facing projection of a user, used in auth responses. Never
/// carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
        }
    }
}

/// Blog
///
/// A blog post record from the `blogs` table. This is the primary data
/// structure for the moderation workflow.
///
/// `status` is nullable: rows created before moderation existed carry no
/// status and are treated as approved everywhere (see `effective_status`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Blog {
    pub id: Uuid,
    pub title: String,
    // Rich text, sanitized upstream; treated as an opaque string here.
    pub description: String,
    pub category: Category,
    // Media URL produced by the storage service.
    pub image: String,
    // Display name snapshot taken at creation time.
    pub author: String,
    // Avatar URL snapshot taken at creation time.
    pub author_img: String,
    // FK to users.id (owner). Immutable after creation.
    pub user_id: Uuid,
    pub status: Option<BlogStatus>,
    // Meaningful only while status = rejected.
    pub rejection_reason: Option<String>,
    // The moderator who approved, present only while status = approved.
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// Legacy rows lacking a status read as approved for backward compatibility.
    pub fn effective_status(&self) -> BlogStatus {
        self.status.unwrap_or(BlogStatus::Approved)
    }
}

/// Subscription
///
/// A newsletter subscription record. Plain CRUD entity with no state machine,
/// included because it shares the admin-only authorization pattern.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Subscription {
    pub id: Uuid,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for POST /auth/signup. The password is hashed immediately and
/// the plaintext is never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// SigninRequest
///
/// Input payload for POST /auth/signin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// RejectRequest
///
/// Input payload for the admin rejection endpoint. The reason is optional and
/// falls back to a placeholder so a rejected blog always carries one.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// SubscribeForm
///
/// Form payload for the public subscription capture endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubscribeForm {
    pub email: String,
}

// --- Repository Write Payloads ---

/// NewBlog
///
/// Fully resolved insert payload handed to the repository: media inputs have
/// already been turned into URLs and the initial status has been decided from
/// the creator's role.
#[derive(Debug, Clone)]
pub struct NewBlog {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub image: String,
    pub author: String,
    pub author_img: String,
    pub user_id: Uuid,
    pub status: BlogStatus,
}

/// BlogChanges
///
/// Partial update payload: only `Some` fields are overwritten, COALESCE-style.
/// Updating never touches ownership or moderation status.
#[derive(Debug, Clone, Default)]
pub struct BlogChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub image: Option<String>,
    pub author_img: Option<String>,
}

// --- Response Projections ---

/// BlogResponse
///
/// The wire projection of a blog. Field names are camelCase for the frontend,
/// `date` aliases `createdAt` for backward-compatible clients, and a legacy
/// NULL status is presented as `approved`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BlogResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub author: String,
    pub author_img: String,
    pub image: String,
    pub user_id: Uuid,
    pub status: BlogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null", optional)]
    pub approved_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Alias of created_at kept for older clients.
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
}

impl From<&Blog> for BlogResponse {
    fn from(blog: &Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.title.clone(),
            description: blog.description.clone(),
            category: blog.category,
            author: blog.author.clone(),
            author_img: blog.author_img.clone(),
            image: blog.image.clone(),
            user_id: blog.user_id,
            status: blog.effective_status(),
            rejection_reason: blog.rejection_reason.clone(),
            approved_by: blog.approved_by,
            approved_at: blog.approved_at,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
            date: blog.created_at,
        }
    }
}

// --- Validation Helpers ---

/// validate_email
///
/// Minimal structural check mirroring the frontend regex: one '@' separating a
/// non-empty local part from a domain containing a dot, no whitespace.
pub fn validate_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
