pub mod event_bus;
pub mod frame;
pub mod throttle;
pub mod tween;

pub use event_bus::*;
pub use frame::*;
pub use throttle::*;
pub use tween::*;
