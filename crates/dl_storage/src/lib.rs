pub mod backends;
pub mod database;
pub mod format;
pub mod mapping;

pub use backends::*;
pub use database::{DatabaseStats, LearningDatabase};

pub mod prelude {
    pub use super::backends::*;
    pub use super::database::{DatabaseStats, LearningDatabase};
    pub use dl_core::storage::{DatabaseApi, Page, PropertyType, Schema};
}
