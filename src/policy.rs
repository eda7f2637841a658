use crate::auth::AuthUser;
use crate::models::{Blog, BlogStatus, Role};

// Authorization Policy
//
// Pure decision functions with no I/O: given (actor, resource, action) they
// answer allow/deny. Every read and mutation handler routes its check through
// here instead of re-implementing role/ownership logic inline, so the rules
// live in exactly one place. These functions never fail; callers translate
// `false` into the appropriate `ApiError` variant.

/// can_read
///
/// Approved blogs (and legacy rows lacking a status) are visible to everyone.
/// Pending and rejected blogs are visible only to their owner or an admin.
pub fn can_read(blog: &Blog, claim: Option<&AuthUser>) -> bool {
    if blog.effective_status() == BlogStatus::Approved {
        return true;
    }
    match claim {
        Some(user) => user.id == blog.user_id || user.role == Role::Admin,
        None => false,
    }
}

/// can_mutate
///
/// Update and delete are allowed for the owner and for admins, and nobody else.
pub fn can_mutate(blog: &Blog, claim: &AuthUser) -> bool {
    claim.id == blog.user_id || claim.role == Role::Admin
}

/// can_moderate
///
/// Gates approve/reject, the full blog listing, and subscription management.
pub fn can_moderate(claim: &AuthUser) -> bool {
    claim.role == Role::Admin
}

/// can_create
///
/// Any authenticated identity may submit a blog; anonymous visitors cannot.
/// Kept as an explicit function so the creation path reads like every other
/// policy-gated operation.
pub fn can_create(_claim: &AuthUser) -> bool {
    true
}
