pub mod candidates;
pub mod catalog;
pub mod config;
pub mod service;
pub mod validator;

pub use candidates::*;
pub use catalog::*;
pub use config::*;
pub use service::*;
pub use validator::*;
