pub mod actions;
pub mod config;
pub mod error;
pub mod merge;
pub mod presentation;
pub mod reducer;
pub mod slug;
pub mod state;
pub mod wire;

pub use actions::*;
pub use config::*;
pub use error::*;
pub use merge::*;
pub use presentation::*;
pub use reducer::*;
pub use state::*;
