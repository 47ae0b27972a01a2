//! Command implementations.

mod run;
mod validate;

pub use run::run_workload;
pub use validate::run_validate;
