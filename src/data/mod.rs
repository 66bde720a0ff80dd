//! Task data: validated tensors, tabular file I/O and synthetic generation.

pub mod dataset;
pub mod io;
pub mod synthetic;

pub use dataset::{SubjectData, TaskData, Trial};
