//! civic-pulse/crates/cp-engine/src/lib.rs
//!
//! The trust-weighted voting integrity & moderation engine: trust ledger,
//! vote aggregation, anomaly detection, and the moderation workflow, all
//! expressed over the `cp-core` ports.
//!
//! Dependency order: the ledger is foundational; aggregation and moderation
//! both consume it; anomaly detection consumes aggregation (through the
//! aggregate cache).

pub mod aggregation;
pub mod anomaly;
pub mod cache;
pub mod ledger;
pub mod moderation;
pub mod notify;
pub mod voting;

pub use aggregation::{aggregate_votes, weight, VoteAggregationEngine};
pub use anomaly::{divergence_percent, AnomalyDetector};
pub use cache::AggregateCache;
pub use ledger::{ContentOutcome, TrustScoreLedger};
pub use moderation::{ModerationWorkflow, ReviewRequest};
pub use notify::TracingNotifier;
pub use voting::{CastOutcome, VotingService};
