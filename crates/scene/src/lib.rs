pub mod camera;
pub mod components;
pub mod graph;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod picking;
pub mod texture;

pub use camera::*;
pub use components::*;
pub use graph::*;
pub use lighting::*;
pub use material::*;
pub use mesh::*;
pub use picking::*;
pub use texture::*;
