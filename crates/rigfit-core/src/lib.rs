pub mod accessor;
pub mod error;
pub mod ids;
pub mod model;
pub mod outcomes;
pub mod snapshot;
pub mod types;

pub use accessor::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use outcomes::*;
pub use snapshot::*;
pub use types::*;
