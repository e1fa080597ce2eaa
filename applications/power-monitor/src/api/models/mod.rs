pub mod alerts;
pub mod predict;

pub use alerts::*;
pub use predict::*;
