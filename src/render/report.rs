//! Run artifact writing.

use crate::domain::RunResult;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const RESULT_FILE_NAME: &str = "issue.json";

/// `<output_dir>/<owner>-<repo>-<YYYYMMDD>/issue.json`, dated by the crawl time.
pub fn result_path(output_dir: &Path, result: &RunResult) -> PathBuf {
    let run_dir = format!("{}-{}", result.repo.replace('/', "-"), result.crawl_time.format("%Y%m%d"));
    output_dir.join(run_dir).join(RESULT_FILE_NAME)
}

/// Write `result` as pretty JSON.
///
/// The file is written next to its destination and renamed into place, so
/// readers see either the previous artifact or the complete new one.
pub fn write_run_result(output_dir: &Path, result: &RunResult) -> Result<PathBuf> {
    let path = result_path(output_dir, result);
    let parent = path.parent().unwrap_or(output_dir);
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create output directory {}", parent.display()))?;

    let json = serde_json::to_string_pretty(result)?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(json.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).with_context(|| format!("Failed to move result into {}", path.display()))?;

    tracing::info!("Wrote {} issues to {}", result.total_count, path.display());
    Ok(path)
}
