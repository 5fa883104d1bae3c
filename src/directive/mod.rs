//! Directive expansion.
//!
//! - `header`: finds `//= require ...` style lines in a file's leading comments
//! - `order`: pure bundle and tree ordering over callbacks
//! - `graph`: the walk over real files, producing a [`BundlePlan`]
//! - `record`: what the walk collected ([`DependencyRecord`])

mod graph;
pub mod header;
mod order;
mod record;

pub use graph::{BundlePlan, walk};
pub use header::{CommentSyntax, Directive, Header};
pub use order::{Step, bundle_order, tree_order};
pub use record::{DependedOn, DependencyRecord};
