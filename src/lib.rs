//! issue-hook: find closed GitHub issues that were fixed by a merged pull
//! request and classify them with an LLM judge.
//!
//! The crawl links every closed issue to its changes, either through the
//! GitHub API or by scanning the commit history of a temporary clone,
//! keeps the issues whose fix landed on the default branch, classifies
//! those in one batch and writes a single JSON artifact.

pub mod associate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod github;
pub mod orchestrate;
pub mod pipeline;
pub mod qualify;
pub mod render;
pub mod retry;
