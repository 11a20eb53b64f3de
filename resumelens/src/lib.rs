pub mod auth;
pub mod client;
mod error;
pub mod export;
pub mod guard;
pub mod models;
pub mod sections;
pub mod session;
pub mod storage;
pub mod upload;

pub use client::{ApiClient, HttpMethod, Validation};
pub use error::{Error, Result};
pub use guard::{Navigation, Route};
pub use session::{Role, Session, SessionStore};
