pub mod orchestrator;
pub mod production;
pub mod profile;
pub mod runner;
pub mod time;

pub use orchestrator::{Orchestrator, OrchestratorOptions, SyncReport};
pub use profile::{AccountId, AccountProfile, ProfileSnapshot};
pub use runner::{CycleReport, EventPhase, EventRunner, RunOutcome, RunnerOptions};
pub use time::{Clock, DailyReset, ManualClock, SystemClock};
