pub mod bridge;
pub mod interrupt;
pub mod state;

pub use bridge::{AgentBridge, BridgeUpdate, Viewport};
pub use interrupt::{
    ConfirmationView, InterruptError, InterruptEvent, InterruptHandler, Resolution, ResolveHandle,
    ResumeValue,
};
pub use state::{AgentState, SearchSource, Stage};
