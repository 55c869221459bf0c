pub mod catalog;
pub mod projection;

pub use catalog::*;
pub use projection::*;
