//! Track-list curation primitives.
//!
//! ```text
//! [candidates] → range::in_range → dedup → select / order / combine → [final list]
//! ```

pub mod combine;
pub mod dedup;
pub mod matching;
pub mod order;
pub mod range;
pub mod select;

pub use combine::Bound;
pub use dedup::Partition;
pub use order::{Direction, SortKey};
pub use range::{Constraint, DateWindow, RangeRules};
