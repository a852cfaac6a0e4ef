pub mod edges;
pub mod environment;
pub mod extrude;
pub mod labels;
pub mod markers;
pub mod region;
pub mod symbology;
pub mod transformer;

#[cfg(test)]
mod fixtures;

pub use edges::*;
pub use environment::*;
pub use extrude::*;
pub use labels::*;
pub use markers::*;
pub use region::*;
pub use symbology::*;
pub use transformer::*;
