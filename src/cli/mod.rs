//! Command implementations behind `spurge <command>`.
//!
//! Every command prints through the colored status macros and exits with the
//! code of the [`SyncError`] that stopped it. Library layers never print.

mod apply;
mod auth;
mod maintenance;
mod plan;
mod resolve;

pub use apply::apply;
pub use auth::auth;
pub use maintenance::{cache_clear, forget, history, logout};
pub use plan::plan;
pub use resolve::resolve;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncReadExt;

use crate::{error::SyncError, info, session::Session, spotify::TransportObserver};

/// Prints `context` and the error, then exits with the error's exit code.
pub(crate) fn fail(context: &str, e: SyncError) -> ! {
    {
        use colored::Colorize;
        println!("[{}] {}: {}", "!".red().bold(), context, e);
    }
    if e.requires_login() {
        info!("Run `spurge auth` to log in again.");
    }
    std::process::exit(e.exit_code());
}

/// Reads a pasted list from `source`, or from stdin when it is `-`.
pub(crate) async fn read_input(source: &str) -> String {
    let read = if source == "-" {
        let mut buf = String::new();
        let mut stdin = tokio::io::stdin();
        match stdin.read_to_string(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(e) => Err(e),
        }
    } else {
        async_fs::read_to_string(source).await
    };

    match read {
        Ok(text) => text,
        Err(e) => fail(&format!("Cannot read {}", source), e.into()),
    }
}

pub(crate) async fn open_session() -> Session {
    match Session::from_env().await {
        Ok(session) => session,
        Err(e) => fail("Cannot open session", e),
    }
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Shows transport retries on a progress bar.
pub(crate) struct BarObserver<'a>(pub &'a ProgressBar);

impl TransportObserver for BarObserver<'_> {
    fn on_rate_limit(&self, retry_after_secs: u64) {
        self.0
            .set_message(format!("Rate limited, waiting {}s...", retry_after_secs));
    }

    fn on_retry(&self, attempt: u32, status: u16) {
        self.0
            .set_message(format!("Server error {}, retry {}...", status, attempt));
    }
}
