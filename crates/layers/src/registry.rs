use std::collections::{BTreeMap, VecDeque};

use foundation::bounds::{BoundingBox, LonLat};
use tracing::{debug, warn};

use crate::composer::LayerOperation;
use crate::kind::LayerKind;
use crate::layer::{LayerSpec, PaintValue, SourceSpec};
use crate::surface::{MapSurface, SurfaceError};

/// What the registry has put on the surface for one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub source: SourceSpec,
    /// Render layers as created. Paint changes made afterwards are tracked
    /// in `paint`, not here.
    pub layers: Vec<LayerSpec>,
    pub paint: BTreeMap<(String, String), PaintValue>,
}

/// The registry's actual layer set, keyed by kind.
pub type LayerSnapshot = BTreeMap<LayerKind, LayerEntry>;

#[derive(Debug, Clone, PartialEq)]
enum SurfaceOp {
    AddSource { id: String, spec: SourceSpec },
    AddLayer(LayerSpec),
    RemoveLayer(String),
    RemoveSource(String),
    SetPaint {
        layer: String,
        property: String,
        value: PaintValue,
    },
    FitBounds { bounds: BoundingBox, padding_px: u32 },
    FlyTo { center: LonLat, zoom: f64 },
}

/// Idempotent adapter over a [`MapSurface`], keyed by [`LayerKind`].
///
/// Bookkeeping is updated immediately, so callers always see the intended
/// layer set. Surface calls made before the surface signalled readiness are
/// queued and replayed in FIFO order, exactly once, on [`LayerRegistry::on_ready`].
#[derive(Debug)]
pub struct LayerRegistry<S> {
    surface: S,
    ready: bool,
    pending: VecDeque<SurfaceOp>,
    entries: LayerSnapshot,
    failures: u64,
}

impl<S: MapSurface> LayerRegistry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            ready: false,
            pending: VecDeque::new(),
            entries: BTreeMap::new(),
            failures: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Surface calls the renderer refused so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn snapshot(&self) -> &LayerSnapshot {
        &self.entries
    }

    pub fn contains(&self, kind: LayerKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// The surface finished loading. Replays queued calls; later signals are ignored.
    pub fn on_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        debug!(queued = self.pending.len(), "map surface ready, flushing");
        while let Some(op) = self.pending.pop_front() {
            self.execute(op);
        }
    }

    /// Creates the source and its layers unless the kind is already present.
    ///
    /// Returns `false` when the kind existed; its source is left untouched.
    pub fn ensure_layer(
        &mut self,
        kind: LayerKind,
        source: SourceSpec,
        layers: Vec<LayerSpec>,
    ) -> bool {
        if self.entries.contains_key(&kind) {
            return false;
        }

        self.dispatch(SurfaceOp::AddSource {
            id: kind.source_id(),
            spec: source.clone(),
        });
        for layer in &layers {
            self.dispatch(SurfaceOp::AddLayer(layer.clone()));
        }
        self.entries.insert(
            kind,
            LayerEntry {
                source,
                layers,
                paint: BTreeMap::new(),
            },
        );
        true
    }

    /// Sets `property` on every render layer of `kind`. No-op when absent.
    pub fn set_paint_property(&mut self, kind: LayerKind, property: &str, value: PaintValue) {
        let Some(entry) = self.entries.get(&kind) else {
            return;
        };
        let targets: Vec<String> = entry.layers.iter().map(|l| l.id.clone()).collect();
        for layer in targets {
            self.set_layer_paint(kind, layer, property.to_string(), value.clone());
        }
    }

    /// Sets the type-appropriate opacity property on every render layer of `kind`.
    pub fn set_opacity(&mut self, kind: LayerKind, opacity: f64) {
        let Some(entry) = self.entries.get(&kind) else {
            return;
        };
        let targets: Vec<(String, &'static str)> = entry
            .layers
            .iter()
            .map(|l| (l.id.clone(), l.render.opacity_property()))
            .collect();
        for (layer, property) in targets {
            self.set_layer_paint(kind, layer, property.to_string(), PaintValue::Number(opacity));
        }
    }

    fn set_layer_paint(
        &mut self,
        kind: LayerKind,
        layer: String,
        property: String,
        value: PaintValue,
    ) {
        let Some(entry) = self.entries.get_mut(&kind) else {
            return;
        };
        let key = (layer, property);
        if entry.paint.get(&key) == Some(&value) {
            return;
        }
        entry.paint.insert(key.clone(), value.clone());
        let (layer, property) = key;
        self.dispatch(SurfaceOp::SetPaint {
            layer,
            property,
            value,
        });
    }

    /// Removes every render layer of `kind`, then its source. No-op when absent.
    pub fn remove_layer(&mut self, kind: LayerKind) -> bool {
        let Some(entry) = self.entries.remove(&kind) else {
            return false;
        };
        for layer in entry.layers.iter().rev() {
            self.dispatch(SurfaceOp::RemoveLayer(layer.id.clone()));
        }
        self.dispatch(SurfaceOp::RemoveSource(kind.source_id()));
        true
    }

    pub fn fit_bounds(&mut self, bounds: BoundingBox, padding_px: u32) {
        self.dispatch(SurfaceOp::FitBounds { bounds, padding_px });
    }

    pub fn fly_to(&mut self, center: LonLat, zoom: f64) {
        self.dispatch(SurfaceOp::FlyTo { center, zoom });
    }

    /// Applies a composed operation list in order.
    pub fn apply(&mut self, ops: Vec<LayerOperation>) {
        for op in ops {
            match op {
                LayerOperation::Ensure {
                    kind,
                    source,
                    layers,
                } => {
                    self.ensure_layer(kind, source, layers);
                }
                LayerOperation::SetOpacity { kind, value } => self.set_opacity(kind, value),
                LayerOperation::Remove(kind) => {
                    self.remove_layer(kind);
                }
            }
        }
    }

    fn dispatch(&mut self, op: SurfaceOp) {
        if self.ready {
            self.execute(op);
        } else {
            self.pending.push_back(op);
        }
    }

    fn execute(&mut self, op: SurfaceOp) {
        let result: Result<(), SurfaceError> = match op {
            SurfaceOp::AddSource { id, spec } => self.surface.add_source(&id, &spec),
            SurfaceOp::AddLayer(spec) => self.surface.add_layer(&spec),
            SurfaceOp::RemoveLayer(id) => self.surface.remove_layer(&id),
            SurfaceOp::RemoveSource(id) => self.surface.remove_source(&id),
            SurfaceOp::SetPaint {
                layer,
                property,
                value,
            } => self.surface.set_paint_property(&layer, &property, &value),
            SurfaceOp::FitBounds { bounds, padding_px } => {
                self.surface.fit_bounds(bounds, padding_px);
                Ok(())
            }
            SurfaceOp::FlyTo { center, zoom } => {
                self.surface.fly_to(center, zoom);
                Ok(())
            }
        };
        if let Err(err) = result {
            self.failures += 1;
            warn!("map surface rejected operation: {err}");
        }
    }
}
