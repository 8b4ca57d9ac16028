//! Spotify Library Purge CLI Library
//!
//! This library reconciles a user's Spotify library against a boycott list of
//! artists and record labels. It contains the synchronization pipeline (API
//! transport, read cache, name resolution, plan building and plan execution)
//! together with the CLI surface and local state management.
//!
//! # Modules
//!
//! - `api` - HTTP API endpoints for the local OAuth callback server
//! - `apply` - Phased, batched execution of a removal plan
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by every layer
//! - `management` - Token, read cache and local state management
//! - `planner` - Diff planner computing the removal plan
//! - `resolver` - Free-text artist names to verified Spotify ids
//! - `server` - Local HTTP server for OAuth callbacks
//! - `session` - Upward-facing API with the single in-flight guard
//! - `spotify` - Spotify Web API transport and endpoints
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use spurge::{config, session::Session};
//!
//! #[tokio::main]
//! async fn main() -> spurge::Res<()> {
//!     config::load_env().await?;
//!     let session = Session::from_env().await?;
//!     // Resolve, plan, apply...
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod apply;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod planner;
pub mod resolver;
pub mod server;
pub mod session;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Every layer of the pipeline reports failures through [`error::SyncError`],
/// so callers can match on the taxonomy (auth, server, network, storage)
/// instead of inspecting strings.
///
/// # Example
///
/// ```
/// use spurge::Res;
///
/// async fn fetch_data() -> Res<String> {
///     Ok("data".to_string())
/// }
/// ```
pub type Res<T> = std::result::Result<T, error::SyncError>;

/// Prints an informational message with a blue bullet point.
///
/// Creates a formatted output line with a distinctive blue "o" indicator
/// followed by the provided message. Used for general information and
/// status updates throughout the application.
///
/// # Example
///
/// ```
/// info!("Starting authentication process...");
/// info!("Found {} tracks", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authentication completed successfully");
/// success!("Unfollowed {} artists", count);
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Creates a formatted error output with a red "!" indicator and immediately
/// terminates the program with exit code 1. Used only by the CLI layer for
/// unrecoverable errors; library code returns [`Res`] instead.
///
/// # Example
///
/// ```
/// error!("Failed to load configuration");
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("Cache file not found, will create new one");
/// warning!("Rate limited, waiting {} seconds", secs);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
