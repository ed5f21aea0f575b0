//! Tagset Algebra
//!
//! Tags classify events instead of a fixed schema, and queries are written
//! as tagset patterns:
//!
//! - **types**: `Tag` and the multiset `Tagset`
//! - **algebra**: subset, intersection, template and permutation matching
//! - **comparator**: ordering tagsets by selected names
//! - **parser**: the canonical `name=value,name` text form
//! - **error**: error types
//!
//! # Example
//!
//! ```rust
//! use tagstore::tagset::Tagset;
//!
//! let pattern = Tagset::parse("color=red,size").unwrap();
//! let candidate = Tagset::parse("color=red,size=xl,shape=round").unwrap();
//!
//! assert!(pattern.is_subset_of(&candidate));
//! assert_eq!(pattern.template(&candidate).to_string(), "color=red,size=xl");
//! ```

mod algebra;
mod comparator;
mod error;
mod parser;
mod types;

pub use algebra::{assign_candidates, permutation_is_superset};
pub use comparator::TagsetComparator;
pub use error::{TagsetError, TagsetResult};
pub use parser::{format_tagset, format_tagsets, parse_tagset, parse_tagsets};
pub use types::{Tag, Tagset};
