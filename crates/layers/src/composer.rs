//! Overlay composition: current state in, layer operations out.
//!
//! `compose` is a pure function of its inputs and the registry's actual
//! layer set. Identical inputs always produce the identical operation list.
//!
//! Two policies coexist:
//! - classic thematic layers stay on the map while hidden; visibility is
//!   expressed as opacity (`visible ? configured : 0`), so re-enabling is
//!   instant and needs no refetch.
//! - agent imagery and impact layers exist only while visible, with their
//!   opacity baked into the layer paint. Their tile templates change with the
//!   selected period and sources are immutable, so any relevant change means
//!   remove + re-create.

use std::collections::BTreeMap;

use foundation::area::AreaOfInterest;
use serde_json::Value;

use crate::kind::LayerKind;
use crate::layer::{LayerSpec, SourceSpec};
use crate::mode::AnalysisMode;
use crate::payload::{AgentImagery, ClassicPayloads, ImageryPeriod, ImpactAssessment};
use crate::registry::LayerSnapshot;
use crate::symbology::VisibilityState;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerOperation {
    Ensure {
        kind: LayerKind,
        source: SourceSpec,
        layers: Vec<LayerSpec>,
    },
    SetOpacity {
        kind: LayerKind,
        value: f64,
    },
    Remove(LayerKind),
}

impl LayerOperation {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerOperation::Ensure { kind, .. } => *kind,
            LayerOperation::SetOpacity { kind, .. } => *kind,
            LayerOperation::Remove(kind) => *kind,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayInputs<'a> {
    pub selection: Option<&'a AreaOfInterest>,
    pub mode: AnalysisMode,
    pub visibility: &'a VisibilityState,
    pub classic: Option<&'a ClassicPayloads>,
    pub agent_imagery: Option<&'a AgentImagery>,
    pub agent_impact: Option<&'a ImpactAssessment>,
    pub agent_geometry: Option<&'a Value>,
    pub period: ImageryPeriod,
}

struct Desired {
    source: SourceSpec,
    layers: Vec<LayerSpec>,
    opacity: Option<f64>,
}

pub fn compose(inputs: &OverlayInputs<'_>, current: &LayerSnapshot) -> Vec<LayerOperation> {
    let desired = desired_layers(inputs);

    let mut ops = Vec::new();
    for kind in LayerKind::ALL {
        match desired.get(&kind) {
            Some(d) => {
                match current.get(&kind) {
                    Some(e) if e.source == d.source && e.layers == d.layers => {}
                    Some(_) => {
                        ops.push(LayerOperation::Remove(kind));
                        ops.push(ensure(kind, d));
                    }
                    None => ops.push(ensure(kind, d)),
                }
                if let Some(value) = d.opacity {
                    ops.push(LayerOperation::SetOpacity { kind, value });
                }
            }
            None => {
                if current.contains_key(&kind) {
                    ops.push(LayerOperation::Remove(kind));
                }
            }
        }
    }
    ops
}

fn ensure(kind: LayerKind, d: &Desired) -> LayerOperation {
    LayerOperation::Ensure {
        kind,
        source: d.source.clone(),
        layers: d.layers.clone(),
    }
}

fn desired_layers(inputs: &OverlayInputs<'_>) -> BTreeMap<LayerKind, Desired> {
    let mut out = BTreeMap::new();

    if inputs.mode.is_classic() {
        let Some(area) = inputs.selection else {
            return out;
        };
        insert_boundary(&mut out, inputs.visibility, area.to_geojson());
        let Some(classic) = inputs.classic else {
            return out;
        };
        for kind in LayerKind::CLASSIC {
            let Some(payload) = classic.get(kind) else {
                continue;
            };
            out.insert(
                kind,
                Desired {
                    source: SourceSpec::raster(payload),
                    layers: LayerSpec::defaults_for(kind),
                    opacity: Some(inputs.visibility.get(kind).effective_opacity()),
                },
            );
        }
        return out;
    }

    for kind in LayerKind::AGENT_IMAGERY {
        let tile = inputs
            .agent_imagery
            .and_then(|img| img.tile(kind, inputs.period));
        if let Some(payload) = tile {
            insert_agent_raster(&mut out, inputs.visibility, kind, SourceSpec::raster(payload));
        }
    }

    for kind in LayerKind::IMPACT {
        if let Some(payload) = inputs.agent_impact.and_then(|i| i.tile(kind)) {
            insert_agent_raster(&mut out, inputs.visibility, kind, SourceSpec::raster(payload));
        }
    }

    if let Some(geometry) = inputs.agent_geometry {
        insert_boundary(&mut out, inputs.visibility, geometry.clone());
    }

    out
}

/// Outline of the analysed region: the selection in classic modes, the
/// agent's event boundary in agent mode.
fn insert_boundary(
    out: &mut BTreeMap<LayerKind, Desired>,
    visibility: &VisibilityState,
    geometry: Value,
) {
    let kind = LayerKind::BoundaryGeometry;
    if !visibility.is_visible(kind) {
        return;
    }
    out.insert(
        kind,
        Desired {
            source: SourceSpec::geojson(geometry),
            layers: LayerSpec::defaults_for(kind),
            opacity: None,
        },
    );
}

fn insert_agent_raster(
    out: &mut BTreeMap<LayerKind, Desired>,
    visibility: &VisibilityState,
    kind: LayerKind,
    source: SourceSpec,
) {
    let v = visibility.get(kind);
    if !v.visible {
        return;
    }
    let layers = LayerSpec::defaults_for(kind)
        .into_iter()
        .map(|l| {
            let property = l.render.opacity_property();
            l.with_paint(property, v.opacity)
        })
        .collect();
    out.insert(
        kind,
        Desired {
            source,
            layers,
            opacity: None,
        },
    );
}
