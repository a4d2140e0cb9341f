/// Router Module Index
///
/// Splits the route table by access policy. Access control is applied to a whole
/// module at once (via an Axum route layer) so that a protected endpoint cannot be
/// exposed by forgetting a per-handler check.

/// Routes open to anonymous clients: health, registration, login and the listing.
pub mod public;

/// Routes behind the bearer-token authentication gate (`/api/*`).
pub mod authenticated;
