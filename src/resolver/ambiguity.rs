use async_trait::async_trait;

use crate::types::Artist;

/// Outcome of an ambiguity prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Use this candidate. Must be one of the offered candidates.
    Accept(Artist),
    /// Never resolve this name; remembered as the `skip` sentinel.
    Skip,
    /// Stop resolving the remaining names of this call.
    Cancel,
}

/// Strategy consulted when a name matches several artists.
#[async_trait]
pub trait AmbiguityResolver: Send + Sync {
    /// `candidates` holds at most five artists, best ranked first.
    async fn resolve(&self, input: &str, candidates: &[Artist]) -> Decision;
}

/// Non-interactive strategy: the best ranked candidate wins, which is the most
/// popular one.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighestPopularity;

#[async_trait]
impl AmbiguityResolver for HighestPopularity {
    async fn resolve(&self, _input: &str, candidates: &[Artist]) -> Decision {
        candidates
            .first()
            .cloned()
            .map(Decision::Accept)
            .unwrap_or(Decision::Skip)
    }
}
