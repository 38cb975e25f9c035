pub mod composer;
pub mod kind;
pub mod layer;
pub mod mode;
pub mod payload;
pub mod registry;
pub mod surface;
pub mod symbology;

pub use composer::{LayerOperation, OverlayInputs, compose};
pub use kind::{LayerKind, RenderType};
pub use layer::*;
pub use mode::AnalysisMode;
pub use payload::*;
pub use registry::{LayerEntry, LayerRegistry, LayerSnapshot};
pub use surface::{MapSurface, RecordingSurface, SurfaceCall, SurfaceError};
pub use symbology::{LayerVisibility, VisibilityState};
