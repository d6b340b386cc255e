pub mod engine;
pub mod rule;
pub mod slots;

pub use engine::*;
pub use rule::*;
