//! HTTP endpoints served by the local login server.
//!
//! - [`callback`] completes the PKCE login by exchanging the authorization
//!   code Spotify redirects back with.
//! - [`health`] reports that the server is up, so `spurge auth` can tell a
//!   stale listener from its own.

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
