//! Single-writer progress reporting.
//!
//! Workers never touch the terminal. They send [`ProgressEvent`]s down a
//! channel and one thread owns the progress bar and all per-issue lines.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Finished { number: u64, qualifying: bool, summary: String },
}

/// What the writer saw by the time the channel closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub processed: usize,
    pub qualifying: usize,
}

pub struct ProgressReporter {
    sender: Sender<ProgressEvent>,
    writer: JoinHandle<ProgressTally>,
}

impl ProgressReporter {
    /// Spawn the writer. The bar is drawn only when `visible` and stderr is a terminal.
    pub fn start(total: usize, label: &str, visible: bool) -> Self {
        let draw = visible && std::io::stderr().is_terminal();
        let (sender, receiver) = mpsc::channel::<ProgressEvent>();
        let label = label.to_string();

        let writer = thread::spawn(move || {
            let bar = if draw { styled_bar(total as u64, &label) } else { ProgressBar::hidden() };
            let mut tally = ProgressTally::default();

            for event in receiver {
                let ProgressEvent::Finished { number, qualifying, summary } = event;
                tally.processed += 1;
                if qualifying {
                    tally.qualifying += 1;
                }
                let line = format_line(number, qualifying, &summary);
                if draw {
                    bar.println(line);
                } else {
                    tracing::info!("{}", console::strip_ansi_codes(&line));
                }
                bar.inc(1);
            }

            bar.finish_and_clear();
            tally
        });

        Self { sender, writer }
    }

    pub fn sender(&self) -> Sender<ProgressEvent> {
        self.sender.clone()
    }

    /// Close the channel and wait for the writer to drain it.
    pub fn finish(self) -> ProgressTally {
        drop(self.sender);
        self.writer.join().unwrap_or_default()
    }
}

fn styled_bar(total: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_prefix(label.to_string());
    bar
}

fn format_line(number: u64, qualifying: bool, summary: &str) -> String {
    let mark = if qualifying { style("✓").green() } else { style("✗").dim() };
    format!("Issue #{}: {} {}", number, mark, summary)
}
