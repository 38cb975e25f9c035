use std::collections::BTreeMap;

use layers::kind::LayerKind;
use layers::mode::AnalysisMode;
use layers::symbology::{LayerVisibility, VisibilityState};
use serde::{Deserialize, Serialize};

/// Session tunables. Every field has a default, so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_mode: AnalysisMode,
    /// Opacity each classic layer starts with.
    pub classic_opacity: BTreeMap<LayerKind, f64>,
    pub historical_layers: Vec<LayerKind>,
    pub hotspot_layers: Vec<LayerKind>,
    /// Starting visibility of agent-mode kinds.
    pub agent_visibility: BTreeMap<LayerKind, LayerVisibility>,
    pub recenter_zoom: f64,
    pub fit_padding_px: u32,
    pub recognized_interrupts: Vec<String>,
    /// Map layer whose features are selectable by clicking.
    pub interactive_layer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let classic_opacity = LayerKind::CLASSIC.into_iter().map(|k| (k, 0.8)).collect();

        let mut agent_visibility = BTreeMap::new();
        for kind in LayerKind::AGENT_IMAGERY {
            agent_visibility.insert(kind, LayerVisibility::new(true, 1.0));
        }
        for kind in LayerKind::IMPACT {
            agent_visibility.insert(kind, LayerVisibility::new(false, 0.7));
        }
        agent_visibility.insert(LayerKind::BoundaryGeometry, LayerVisibility::new(true, 1.0));

        Self {
            initial_mode: AnalysisMode::Historical,
            classic_opacity,
            historical_layers: vec![LayerKind::Water, LayerKind::FloodExtent],
            hotspot_layers: LayerKind::CLASSIC.to_vec(),
            agent_visibility,
            recenter_zoom: 8.0,
            fit_padding_px: 40,
            recognized_interrupts: vec!["confirm_flood_event".to_string()],
            interactive_layer: "admin-boundaries-fill".to_string(),
        }
    }
}

impl SessionConfig {
    /// Classic layer set requested in `mode`; empty for agent mode.
    pub fn layers_for(&self, mode: AnalysisMode) -> Vec<LayerKind> {
        match mode {
            AnalysisMode::Historical => self.historical_layers.clone(),
            AnalysisMode::Hotspot => self.hotspot_layers.clone(),
            AnalysisMode::Agent => Vec::new(),
        }
    }

    pub fn initial_visibility(&self) -> VisibilityState {
        let classic = self
            .classic_opacity
            .iter()
            .map(|(k, o)| (*k, LayerVisibility::new(true, *o)));
        let agent = self.agent_visibility.iter().map(|(k, v)| (*k, *v));
        VisibilityState::with_defaults(classic.chain(agent))
    }
}
