/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// so that access control is applied explicitly at the module level (via Axum
/// layers) instead of being scattered per-handler where it could be forgotten.
///
/// The three modules map directly to the defined access roles.

/// Routes accessible to all users (anonymous, read-only, plus the auth gateway).
/// Read handlers must enforce per-post visibility through the `policy` module.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated user session.
pub mod authenticated;

/// Routes restricted exclusively to users with the 'admin' role.
/// Implements mandatory authorization checks.
pub mod admin;
