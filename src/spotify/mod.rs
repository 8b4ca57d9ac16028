//! # Spotify Integration Module
//!
//! This module is the transport layer between spurge and the Spotify Web API.
//! It owns authentication against the API, the retry protocol, the shared
//! rate-limit deadline and pagination. Everything above it (resolver, planner,
//! executor) issues requests through [`SpotifyClient`] and never sees a
//! retryable failure.
//!
//! ## Architecture
//!
//! ```text
//! Session (resolve / plan / apply)
//!          ↓
//! Spotify Integration Layer
//!     ├── Client (auth header, 401 refresh, 429 gate, 5xx backoff)
//!     ├── Pagination (flat / nested tracks / nested artists)
//!     ├── Artists (following, search, lookup, unfollow)
//!     ├── Tracks (liked songs, removal)
//!     ├── Albums (saved albums, lookup, removal)
//!     └── Auth (token endpoint, PKCE helpers)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Error Handling Philosophy
//!
//! ### Rate Limiting
//! - A 429 pushes a process-wide deadline forward by `Retry-After` (default 1s,
//!   capped at one hour). Every request waits for that deadline, so concurrent
//!   callers stall together. Rate limits are never fatal.
//!
//! ### Server Errors
//! - 5xx responses are retried with a linear backoff (1s × attempt) for up to
//!   five attempts, then surface as `SyncError::Server` with status and body.
//!
//! ### Authentication Errors
//! - Tokens expiring within a minute are refreshed before use.
//! - A 401 triggers exactly one refresh and one replay of the same request.
//! - A 403 mentioning an insufficient client scope is surfaced immediately.
//!
//! ## API Coverage
//!
//! - `GET /me/following?type=artist` - followed artists (cursor pagination)
//! - `GET /me/tracks` - liked tracks
//! - `GET /me/albums` - saved albums
//! - `GET /search?type=artist` - artist search
//! - `GET /albums?ids=` - batch album lookup (labels)
//! - `GET /artists?ids=` - batch artist lookup
//! - `DELETE /me/following`, `DELETE /me/tracks`, `DELETE /me/albums` - removals
//! - `POST /api/token` - code exchange and refresh

pub mod albums;
pub mod artists;
pub mod auth;
pub mod client;
pub mod pagination;
pub mod rate_limit;
pub mod tracks;

pub use client::{ClientConfig, SpotifyClient, TransportObserver};
pub use pagination::{PageShape, Pages};
pub use rate_limit::RateLimitGate;
