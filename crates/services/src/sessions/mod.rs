mod progress;
mod service;
mod workflow;

pub use progress::SessionProgress;
pub use service::QuizSession;
pub use workflow::{QuizLoopService, REPORT_GRACE};
