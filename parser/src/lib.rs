pub mod analyzer;
mod demofile;
mod error;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test_support;

pub use demofile::*;
pub use error::*;
pub use strum;
