pub mod bootstrap;
pub mod pipeline;

pub use bootstrap::run;
pub use pipeline::{Pipeline, RunSummary};
