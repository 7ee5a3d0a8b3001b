//! Request handlers.

pub mod compose;
pub mod health;
pub mod stories;

pub use compose::*;
pub use health::*;
pub use stories::*;
