mod stats;
mod tracing;

pub use self::stats::Stats;
pub use self::tracing::{init_tracing, TracingConfig};
