pub mod credentials;
pub mod service_set;
pub mod session_manager;

pub use credentials::{AuthError, CredentialProvider, CredentialSession};
pub use service_set::{ServiceClientSet, ServiceFactory, ServiceHandle, ServiceKind};
pub use session_manager::SessionManager;
