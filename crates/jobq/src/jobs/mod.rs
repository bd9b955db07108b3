pub mod error;
pub mod executor;
pub mod guard;
pub mod inspect;
pub mod maintenance;
pub mod model;
pub mod runner;
pub mod scheduler;
pub mod stall;
pub mod store;

pub use error::QueueError;
pub use executor::{JobExecutor, WorkerCommand};
pub use guard::SingleInstanceGuard;
pub use inspect::{HostInspector, ProcessInspector, ProcessMatch};
pub use maintenance::Maintenance;
pub use model::{Job, JobStatus};
pub use runner::{Runner, RunnerConfig};
pub use scheduler::Scheduler;
pub use stall::StallDetector;
pub use store::JobStore;
