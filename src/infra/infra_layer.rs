// The infra module contains implementations of core traits.
// Each integration goes in its own submodule.

#[path = "google_api/mod.rs"]
pub mod google_api;

#[path = "google_auth/mod.rs"]
pub mod google_auth;
