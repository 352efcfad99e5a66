pub mod jobs;
pub mod metrics;
pub mod routes;

pub use jobs::{Job, JobStatus, JobStore};
pub use metrics::Metrics;
pub use routes::{router, AppState};
