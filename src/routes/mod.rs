/// Router modules, split by who may reach them.

/// Anonymous, read-only site content plus the contact form.
pub mod public;

/// The admin sign-in form. Reachable without a session by construction.
pub mod login;

/// Everything else under `/admin`. Guarded by the access gate middleware and, again, by the
/// `AdminSession` extractor in every handler.
pub mod admin;
