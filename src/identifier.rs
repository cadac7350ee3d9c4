//! Candidate file identifiers.
//!
//! Generation is pure and does not check uniqueness; intake retries against the
//! metadata store until it finds a free candidate.

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::storage::models::IdentifierStrategy;

pub const ALPHANUMERIC_LENGTH: usize = 8;
pub const TIMESTAMP_FORMAT: &str = "%d%m%Y-%H%M%S";

/// Produce one candidate identifier for the given strategy.
pub fn generate(strategy: IdentifierStrategy) -> String {
    match strategy {
        IdentifierStrategy::RandomUuid => uuid::Uuid::new_v4().to_string(),
        IdentifierStrategy::RandomAlphanumeric => random_alphanumeric(ALPHANUMERIC_LENGTH),
        IdentifierStrategy::Timestamp => chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
