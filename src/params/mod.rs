//! Parameters: hierarchical prior, non-centered transform and sampler layout.
//!
//! The prior draws group hyper-parameters and standard-normal subject
//! deviations; the transform maps them onto bounded subject parameters.

pub mod draw;
pub mod layout;
pub mod prior;
pub mod transform;

pub use draw::{HyperParams, ModelParams};
pub use layout::ParameterLayout;
pub use prior::{HierarchicalPrior, PriorConfig};
pub use transform::{CdfKind, GroupSummary, Pooled, SubjectParams};
