//! C7/C8: the proof-of-work worker and the orchestrator state machine that
//! drives it.

pub mod orchestrator;
pub mod worker;

pub use orchestrator::{MinerOrchestrator, MinerState, MiningOutcome};
pub use worker::{spawn_worker, WorkerHandle, WorkerRequest, WorkerResponse};
