// REST adapters for the four workspace ports.
// Every adapter goes through `api_client.rs`, which attaches the bearer token
// and turns Google's error envelope into `RemoteError`.

#[path = "api_client.rs"]
pub mod api_client;

#[path = "docs_api.rs"]
pub mod docs_api;

#[path = "drive_api.rs"]
pub mod drive_api;

#[path = "script_api.rs"]
pub mod script_api;

#[path = "service_factory.rs"]
pub mod service_factory;

#[path = "sheets_api.rs"]
pub mod sheets_api;

pub use service_factory::GoogleServiceFactory;
