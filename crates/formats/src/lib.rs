pub mod display_data;
pub mod geojson;

pub use display_data::*;
pub use geojson::*;
