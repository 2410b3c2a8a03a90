//! Output rendering (run artifact, terminal summary)

pub mod report;
pub mod summary;

pub use report::{result_path, write_run_result};
pub use summary::render_summary;
