pub mod contracts;
pub mod controller;
pub mod memory;

pub use contracts::*;
pub use controller::*;
pub use memory::*;
