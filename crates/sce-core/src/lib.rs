pub mod error;
pub mod types;
pub mod value;

pub use error::SceError;
pub use types::*;
pub use value::*;
