mod access_token;
mod credential_service_impl;
mod password_hasher;
mod session_manager;

pub use access_token::*;
pub use credential_service_impl::*;
pub use password_hasher::*;
pub use session_manager::*;
