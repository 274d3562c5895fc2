pub mod accumulator;
pub mod metric;
pub mod stats;

pub use accumulator::Accumulator;
pub use metric::{FieldValue, Metric};
pub use stats::{AgentStats, Stat, StatBundle, StatIdentity, StatRegistry, StatSnapshot};
