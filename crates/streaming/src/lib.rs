pub mod coordinator;
pub mod fingerprint;
pub mod protocol;

pub use coordinator::{Begin, FetchCoordinator, FetchTicket, Settled};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use protocol::*;
