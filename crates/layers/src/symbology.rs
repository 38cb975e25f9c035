use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kind::LayerKind;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerVisibility {
    pub visible: bool,
    /// Configured opacity in `[0, 1]`; kept while the layer is hidden.
    pub opacity: f64,
}

impl LayerVisibility {
    pub const fn new(visible: bool, opacity: f64) -> Self {
        Self { visible, opacity }
    }

    /// Opacity the renderer should use right now.
    pub fn effective_opacity(&self) -> f64 {
        if self.visible { self.opacity } else { 0.0 }
    }
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 0.8,
        }
    }
}

/// Per-kind visibility toggles.
///
/// Only explicit user actions mutate this; refetching data never resets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityState {
    entries: BTreeMap<LayerKind, LayerVisibility>,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: impl IntoIterator<Item = (LayerKind, LayerVisibility)>) -> Self {
        let mut s = Self::new();
        for (kind, v) in defaults {
            s.entries.insert(kind, sanitize(v));
        }
        s
    }

    pub fn get(&self, kind: LayerKind) -> LayerVisibility {
        self.entries.get(&kind).copied().unwrap_or_default()
    }

    pub fn is_visible(&self, kind: LayerKind) -> bool {
        self.get(kind).visible
    }

    pub fn any_visible(&self, kinds: &[LayerKind]) -> bool {
        kinds.iter().any(|k| self.is_visible(*k))
    }

    /// Flips visibility; returns the new state.
    pub fn toggle(&mut self, kind: LayerKind) -> bool {
        let mut v = self.get(kind);
        v.visible = !v.visible;
        self.entries.insert(kind, v);
        v.visible
    }

    pub fn set_visible(&mut self, kind: LayerKind, visible: bool) {
        let mut v = self.get(kind);
        v.visible = visible;
        self.entries.insert(kind, v);
    }

    /// Sets the configured opacity, clamped to `[0, 1]`. NaN is ignored.
    pub fn set_opacity(&mut self, kind: LayerKind, opacity: f64) {
        if opacity.is_nan() {
            return;
        }
        let mut v = self.get(kind);
        v.opacity = opacity.clamp(0.0, 1.0);
        self.entries.insert(kind, v);
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerKind, LayerVisibility)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

fn sanitize(v: LayerVisibility) -> LayerVisibility {
    let opacity = if v.opacity.is_nan() {
        LayerVisibility::default().opacity
    } else {
        v.opacity.clamp(0.0, 1.0)
    };
    LayerVisibility::new(v.visible, opacity)
}

#[cfg(test)]
mod tests {
    use super::{LayerVisibility, VisibilityState};
    use crate::kind::LayerKind;

    #[test]
    fn toggle_keeps_configured_opacity() {
        let mut s = VisibilityState::new();
        s.set_opacity(LayerKind::Water, 0.35);
        assert!(!s.toggle(LayerKind::Water));
        assert_eq!(s.get(LayerKind::Water).effective_opacity(), 0.0);
        assert!(s.toggle(LayerKind::Water));
        assert_eq!(s.get(LayerKind::Water).effective_opacity(), 0.35);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut s = VisibilityState::new();
        s.set_opacity(LayerKind::Urban, 4.0);
        assert_eq!(s.get(LayerKind::Urban).opacity, 1.0);
        s.set_opacity(LayerKind::Urban, f64::NAN);
        assert_eq!(s.get(LayerKind::Urban).opacity, 1.0);
    }

    #[test]
    fn defaults_apply_and_unknown_kinds_fall_back() {
        let s = VisibilityState::with_defaults([(
            LayerKind::Population,
            LayerVisibility::new(false, 0.7),
        )]);
        assert!(!s.is_visible(LayerKind::Population));
        assert_eq!(s.get(LayerKind::Water), LayerVisibility::default());
        assert!(!s.any_visible(&[LayerKind::Population]));
    }
}
