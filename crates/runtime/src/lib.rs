pub mod event_bus;
pub mod metrics;
pub mod turn;

pub use event_bus::*;
pub use metrics::*;
pub use turn::*;
