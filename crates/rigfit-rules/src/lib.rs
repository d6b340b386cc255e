pub mod engine;
pub mod error;
pub mod evaluate;
pub mod fingerprint;
pub mod index;
pub mod options;

pub use engine::*;
pub use error::*;
pub use evaluate::*;
pub use fingerprint::*;
pub use index::*;
pub use options::*;
