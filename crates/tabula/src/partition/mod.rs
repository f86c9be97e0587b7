//! Conditional synthesis by partitioning on parent variables.
//!
//! A [`ConditionalSpec`] names parent fields and numbered buckets of their
//! values. Every combination of buckets is a partition with its own key
//! (`"1-2"`), its own training rows and its own copula over the child fields.
//! At sampling time the [`PartitionOrchestrator`] finds the rows of a global
//! sample that land in each partition and redraws their children.

mod index;
mod orchestrator;
mod selector;
mod spec;

pub use index::{KEY_SEPARATOR, composite_keys};
pub use orchestrator::{FitReport, Partition, PartitionGroup, PartitionOrchestrator, PartitionState};
pub use spec::{
    Bucket, ChildSelection, CompareOp, ConditionKind, ConditionalSettings, ConditionalSpec,
    CovariateSelection, ParentCondition, Predicate,
};
