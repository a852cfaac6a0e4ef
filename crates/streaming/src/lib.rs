pub mod assets;
pub mod cache;
pub mod loader;
pub mod token;

pub use assets::*;
pub use cache::*;
pub use loader::*;
pub use token::*;
