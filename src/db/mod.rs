//! Image store database: entity models and SQL repositories.
//!
//! - `model`: typed records returned by repositories.
//! - `repo`: SQL-only functions that map rows into records.
//!
//! Callers normally go through [`crate::store::ImageStore`]; the repository API
//! is re-exported here for the inspect tool and tests.

pub mod model;
pub mod repo;

pub use model::StoredImage;
pub use repo::*;
