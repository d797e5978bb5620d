pub mod catalog;
mod ids;
mod question;
pub mod raw;
mod run;

pub use catalog::{CategoryGroup, Manifest, TopicData, TopicEntry};
pub use ids::{TopicId, TopicIdError};
pub use question::{Explanation, Question, QuestionError};
pub use raw::{NormalizeError, RawQuestion};
pub use run::{Phase, RunProgress};
