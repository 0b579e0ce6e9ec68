pub mod gas;
pub mod generators;

pub use gas::*;
pub use generators::*;
