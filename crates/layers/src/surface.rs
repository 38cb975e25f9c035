//! Capability surface of the external map renderer.
//!
//! The renderer itself is out of scope; the core only needs these calls.
//! `RecordingSurface` is an in-memory implementation that enforces the same
//! structural rules a real style engine does (no layer without its source,
//! no source removal while layers still use it).

use std::collections::BTreeMap;

use foundation::bounds::{BoundingBox, LonLat};
use serde_json::Value;

use crate::layer::{LayerSpec, PaintValue, SourceSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    DuplicateSource(String),
    DuplicateLayer(String),
    UnknownSource(String),
    UnknownLayer(String),
    SourceInUse { source: String, layer: String },
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::DuplicateSource(id) => write!(f, "source already exists: {id}"),
            SurfaceError::DuplicateLayer(id) => write!(f, "layer already exists: {id}"),
            SurfaceError::UnknownSource(id) => write!(f, "no such source: {id}"),
            SurfaceError::UnknownLayer(id) => write!(f, "no such layer: {id}"),
            SurfaceError::SourceInUse { source, layer } => {
                write!(f, "source {source} is still used by layer {layer}")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

pub trait MapSurface {
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: &PaintValue,
    ) -> Result<(), SurfaceError>;
    fn fit_bounds(&mut self, bounds: BoundingBox, padding_px: u32);
    fn fly_to(&mut self, center: LonLat, zoom: f64);

    /// GeoJSON features of `layer_id` rendered under `point`, topmost first.
    fn query_features(&self, point: LonLat, layer_id: &str) -> Vec<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddSource(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetPaint {
        layer: String,
        property: String,
        value: PaintValue,
    },
    FitBounds(BoundingBox),
    FlyTo {
        center: LonLat,
        zoom: f64,
    },
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    sources: BTreeMap<String, SourceSpec>,
    /// Draw order.
    layers: Vec<LayerSpec>,
    calls: Vec<SurfaceCall>,
    features: BTreeMap<String, Vec<Value>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn paint(&self, layer_id: &str, property: &str) -> Option<&PaintValue> {
        self.layer(layer_id)?.paint.get(property)
    }

    /// Features returned for clicks on `layer_id`, regardless of position.
    pub fn set_features(&mut self, layer_id: impl Into<String>, features: Vec<Value>) {
        self.features.insert(layer_id.into(), features);
    }
}

impl MapSurface for RecordingSurface {
    fn add_source(&mut self, id: &str, spec: &SourceSpec) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), spec.clone());
        self.calls.push(SurfaceCall::AddSource(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if let Some(l) = self.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::SourceInUse {
                source: id.to_string(),
                layer: l.id.clone(),
            });
        }
        if self.sources.remove(id).is_none() {
            return Err(SurfaceError::UnknownSource(id.to_string()));
        }
        self.calls.push(SurfaceCall::RemoveSource(id.to_string()));
        Ok(())
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        if !self.sources.contains_key(&spec.source) {
            return Err(SurfaceError::UnknownSource(spec.source.clone()));
        }
        if self.layer(&spec.id).is_some() {
            return Err(SurfaceError::DuplicateLayer(spec.id.clone()));
        }
        self.layers.push(spec.clone());
        self.calls.push(SurfaceCall::AddLayer(spec.id.clone()));
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let Some(pos) = self.layers.iter().position(|l| l.id == id) else {
            return Err(SurfaceError::UnknownLayer(id.to_string()));
        };
        self.layers.remove(pos);
        self.calls.push(SurfaceCall::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: &PaintValue,
    ) -> Result<(), SurfaceError> {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == layer_id) else {
            return Err(SurfaceError::UnknownLayer(layer_id.to_string()));
        };
        layer.paint.insert(property.to_string(), value.clone());
        self.calls.push(SurfaceCall::SetPaint {
            layer: layer_id.to_string(),
            property: property.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: BoundingBox, _padding_px: u32) {
        self.calls.push(SurfaceCall::FitBounds(bounds));
    }

    fn fly_to(&mut self, center: LonLat, zoom: f64) {
        self.calls.push(SurfaceCall::FlyTo { center, zoom });
    }

    fn query_features(&self, _point: LonLat, layer_id: &str) -> Vec<Value> {
        self.features.get(layer_id).cloned().unwrap_or_default()
    }
}
