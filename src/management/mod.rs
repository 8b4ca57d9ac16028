mod auth;
mod cache;
mod state;

pub use auth::REFRESH_MARGIN_SECS;
pub use auth::TokenManager;
pub use auth::token_path;
pub use cache::CACHE_TTL;
pub use cache::CacheKey;
pub use cache::CachedValue;
pub use cache::ReadCache;
pub use cache::cache_dir;
pub use state::LocalState;
pub use state::StateManager;
