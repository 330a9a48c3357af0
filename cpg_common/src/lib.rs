mod cents;
pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError};
pub use secret::Secret;
