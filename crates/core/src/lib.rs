#![forbid(unsafe_code)]

pub mod engine;
pub mod model;
pub mod shuffle;
pub mod time;

pub use engine::{Intent, QuizEngine, QuizState, Transition};
pub use model::{Phase, Question, RunProgress, TopicId};
pub use time::Clock;
