//! CLI command implementations.

pub mod complete;
pub mod init;
pub mod next;
pub mod rank;
pub mod run;
pub mod status;
pub mod stop;
