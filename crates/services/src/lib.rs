#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod sessions;
pub mod stats;

pub use quiz_core::Clock;

pub use catalog::{CatalogService, CatalogSource};
pub use error::{CatalogError, QuizSessionError, StatsError};
pub use sessions::{QuizLoopService, QuizSession, REPORT_GRACE, SessionProgress};
pub use stats::{GlobalStats, StatsClient};
