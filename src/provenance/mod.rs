pub mod tracker;

pub use tracker::{DecisionContext, ProvenanceQuery, ProvenanceTracker};
