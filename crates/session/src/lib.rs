pub mod config;
pub mod selection;
pub mod session;

#[cfg(test)]
mod scenarios;

pub use config::SessionConfig;
pub use selection::{ClassicParams, SelectionController, area_from_feature};
pub use session::{Outbound, Session};
