//! Desktop shell: an eframe window in front of a worker thread.

pub mod polar_app;
pub mod run;
pub mod worker;

pub use polar_app::{AppOptions, PolarApp};
pub use run::{run_live, run_record};
pub use worker::{Mode, RecordSource};
