mod identity;
mod token;

pub use identity::*;
pub use token::*;
