//! Business logic services.
//!
//! - [`RegistryService`] - record lookups, listings, creation and match bookkeeping
//! - [`MatchSearchEngine`] - finds and records matches for a new record
//! - [`MatchQueue`] - runs match searches in the background
//! - [`BackendFactory`] - opens the configured store and notifier

mod backend_factory;
mod match_queue;
mod match_search;
mod registry;

pub use backend_factory::BackendFactory;
pub use match_queue::MatchQueue;
pub use match_search::{MatchOutcome, MatchSearchEngine, candidate_groups};
pub use registry::RegistryService;
