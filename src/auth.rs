//! Credential model, payload validation, and the single-flight token lifecycle manager.

pub mod repository;
pub mod secret;
pub mod token;

pub use repository::*;
pub use secret::*;
pub use token::*;
