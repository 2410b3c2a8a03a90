//! issue-hook: collect closed issues resolved by merged pull requests
//! and classify them with an LLM judge.

use anyhow::Result;

fn main() -> Result<()> {
    issue_hook::cli::run()
}
