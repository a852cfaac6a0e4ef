pub mod camera_rig;
pub mod config;
pub mod events;
pub mod handle;
pub mod hover;
pub mod input;
pub mod level;
pub mod options;
pub mod progress;
pub mod scene;
pub mod surface;

#[cfg(test)]
mod fixtures;

pub use camera_rig::*;
pub use config::*;
pub use events::*;
pub use handle::*;
pub use hover::*;
pub use input::*;
pub use level::*;
pub use options::*;
pub use progress::*;
pub use scene::*;
pub use surface::*;
