// Google credential providers.
// - `service_account.rs` signs JWTs for a service account key.
// - `installed_app.rs` runs the OAuth consent flow for a desktop client.
// - `auth_config.rs` picks one of them from the environment.

#[path = "auth_config.rs"]
pub mod auth_config;

#[path = "installed_app.rs"]
pub mod installed_app;

#[path = "service_account.rs"]
pub mod service_account;

#[path = "token_cache.rs"]
pub mod token_cache;

pub use auth_config::AuthConfig;

/// Every API the tools touch. Requested together so one consent covers all.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/script.projects",
];

pub fn scope_string() -> String {
    SCOPES.join(" ")
}
