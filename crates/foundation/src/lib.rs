pub mod area;
pub mod bounds;
pub mod time;

// Foundation crate: small, well-tested geographic and calendar primitives only.
pub use area::*;
pub use bounds::*;
pub use time::*;
