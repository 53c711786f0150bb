pub mod active_set;
pub mod admission;
pub mod completion_handler;
pub mod monitor_loop;
pub mod orchestrator;
pub mod stop_signal;

pub use active_set::ActiveSet;
pub use admission::{Admission, AdmissionController, AdmissionReport, DeferReason};
pub use completion_handler::{CompletionHandler, CompletionReport};
pub use monitor_loop::{CheckStage, CycleReport, MonitorLoop, Observation};
pub use orchestrator::{Collaborators, Orchestrator};
pub use stop_signal::StopSignal;
