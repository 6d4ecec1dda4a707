pub mod progress;
pub mod submission;

pub use progress::{SubmissionProgress, SubmissionStatus};
pub use submission::{FormType, NewSubmission, QueuedSubmission};
