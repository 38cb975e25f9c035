use foundation::bounds::{BoundingBox, LonLat};
use layers::layer::{LayerSpec, PaintValue, SourceSpec};
use layers::surface::{MapSurface, RecordingSurface, SurfaceError};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Headless map surface: keeps the style in memory and traces every call.
#[derive(Debug, Default)]
pub struct LoggingSurface {
    inner: RecordingSurface,
}

impl LoggingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &RecordingSurface {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut RecordingSurface {
        &mut self.inner
    }
}

fn traced(op: &str, id: &str, result: Result<(), SurfaceError>) -> Result<(), SurfaceError> {
    match &result {
        Ok(()) => debug!(op, id, "surface"),
        Err(err) => warn!(op, id, "surface rejected call: {err}"),
    }
    result
}

impl MapSurface for LoggingSurface {
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if let SourceSpec::Raster { tiles, .. } = spec {
            info!(id, tiles = ?tiles, "add raster source");
        }
        traced("add_source", id, self.inner.add_source(id, spec))
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        traced("remove_source", id, self.inner.remove_source(id))
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        traced("add_layer", &spec.id, self.inner.add_layer(spec))
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        traced("remove_layer", id, self.inner.remove_layer(id))
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: &PaintValue,
    ) -> Result<(), SurfaceError> {
        debug!(layer_id, property, ?value, "set paint");
        traced(
            "set_paint_property",
            layer_id,
            self.inner.set_paint_property(layer_id, property, value),
        )
    }

    fn fit_bounds(&mut self, bounds: BoundingBox, padding_px: u32) {
        info!(?bounds, padding_px, "fit bounds");
        self.inner.fit_bounds(bounds, padding_px);
    }

    fn fly_to(&mut self, center: LonLat, zoom: f64) {
        info!(lon = center.lon, lat = center.lat, zoom, "fly to");
        self.inner.fly_to(center, zoom);
    }

    fn query_features(&self, point: LonLat, layer_id: &str) -> Vec<Value> {
        self.inner.query_features(point, layer_id)
    }
}
