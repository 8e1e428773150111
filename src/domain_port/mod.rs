// store

mod token_cache;

pub use token_cache::*;

// repo

mod identity_repo;

pub use identity_repo::*;
