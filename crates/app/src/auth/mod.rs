//! Authentication

mod errors;
mod password;
mod records;
mod repository;
mod service;
mod session;

pub use errors::*;
pub use password::{PasswordError, hash_password, verify_password};
pub use records::*;
pub use service::*;
pub use session::*;
