pub mod primitive;
pub mod transform;

pub use primitive::*;
pub use transform::*;
