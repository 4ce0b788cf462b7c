pub mod fixtures;
pub mod observers;

pub use fixtures::*;
pub use observers::*;
