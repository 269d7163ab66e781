//! examrun-client — collaborators for the exam session runtime.
//!
//! Implements `SessionStore` and `Authenticator` against the backend REST
//! API, and `ExamCatalog` over a JSON exam data file.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;

pub use api::HttpSessionStore;
pub use auth::{ApiAuthenticator, CredentialPrompt, OfflineAuthenticator};
pub use catalog::JsonCatalog;
pub use config::{load_config, load_config_from, ApiConfig, ExamrunConfig};
pub use error::LoginError;
