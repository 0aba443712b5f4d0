//! Safe SQL builder: identifiers from the resolved spec only, values as parameters.

mod builder;
pub use builder::*;
