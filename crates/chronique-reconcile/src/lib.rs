//! chronique-reconcile — mention matching, duplicate detection, merge.

pub mod cache;
pub mod critics;
pub mod dedup;
pub mod error;
pub mod matching;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod sources;

pub use cache::ResolutionCache;
pub use critics::CriticResolver;
pub use dedup::DuplicateDetector;
pub use error::{ReconcileError, Result};
pub use matching::{MatchCandidate, MatchingEngine};
pub use merge::{MergeCoordinator, MergeEvent, MergeOutcome, MergeSupervisor};
pub use pipeline::{ProcessSummary, ReconcilePipeline};
pub use sources::{CanonicalSource, CatalogSource};
