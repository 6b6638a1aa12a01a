pub mod orientation;
pub mod summary;
pub mod work;

pub use orientation::OrientationCode;
pub use summary::RunSummary;
pub use work::{FailureKind, Stage, WorkItem, WorkResult, WorkStatus};
