//! Model-comparison diagnostics over predictive draws.

pub mod hdi;
pub mod pointwise;
pub mod waic;

pub use hdi::{hdi, summarize_group, zscore, Summary};
pub use pointwise::{pointwise_log_lik, Observations};
pub use waic::{compare, log_mean_exp, waic, Comparison, Waic};
