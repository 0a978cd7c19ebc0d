extern crate approx;

pub mod cast;
mod error;
pub mod interpolate;

#[doc(inline)]
pub use error::{Context, Error, ErrorContext, ErrorKind, Result};
