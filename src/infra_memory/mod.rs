mod identity_repo_memory;
mod token_cache_memory;

pub use identity_repo_memory::*;
pub use token_cache_memory::*;
