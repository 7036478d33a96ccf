//! Data models for costwatch

mod alert;
mod analysis;
mod cost;

pub use alert::*;
pub use analysis::*;
pub use cost::*;
