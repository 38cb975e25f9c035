use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::kind::{LayerKind, RenderType};
use crate::payload::TileLayerPayload;

/// Definition of a map source. Immutable once added to the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    Raster {
        tiles: Vec<String>,
        #[serde(rename = "tileSize")]
        tile_size: u32,
    },
    Geojson {
        data: Value,
    },
}

impl SourceSpec {
    pub fn raster(payload: &TileLayerPayload) -> Self {
        SourceSpec::Raster {
            tiles: vec![payload.tile_url_template.clone()],
            tile_size: payload.tile_size,
        }
    }

    pub fn geojson(data: Value) -> Self {
        SourceSpec::Geojson { data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaintValue {
    Number(f64),
    Color(String),
}

impl From<f64> for PaintValue {
    fn from(v: f64) -> Self {
        PaintValue::Number(v)
    }
}

impl From<&str> for PaintValue {
    fn from(v: &str) -> Self {
        PaintValue::Color(v.to_string())
    }
}

/// One render layer drawing a kind's source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub render: RenderType,
    pub source: String,
    pub paint: BTreeMap<String, PaintValue>,
}

impl LayerSpec {
    /// Default render layers for `kind`, in draw order.
    pub fn defaults_for(kind: LayerKind) -> Vec<LayerSpec> {
        let source = kind.source_id();
        kind.render_layers()
            .into_iter()
            .map(|(id, render)| {
                let mut paint = BTreeMap::new();
                match render {
                    RenderType::Raster => {}
                    RenderType::Fill => {
                        paint.insert("fill-color".to_string(), PaintValue::from("#0080ff"));
                        paint.insert("fill-opacity".to_string(), PaintValue::from(0.1));
                    }
                    RenderType::Line => {
                        paint.insert("line-color".to_string(), PaintValue::from("#0080ff"));
                        paint.insert("line-width".to_string(), PaintValue::from(2.0));
                    }
                }
                LayerSpec {
                    id,
                    render,
                    source: source.clone(),
                    paint,
                }
            })
            .collect()
    }

    pub fn with_paint(mut self, property: &str, value: impl Into<PaintValue>) -> Self {
        self.paint.insert(property.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerSpec, PaintValue, SourceSpec};
    use crate::kind::{LayerKind, RenderType};
    use crate::payload::TileLayerPayload;

    #[test]
    fn raster_source_serializes_like_a_style_source() {
        let s = SourceSpec::raster(&TileLayerPayload::new("https://t/{z}/{x}/{y}", 512));
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["type"], "raster");
        assert_eq!(v["tileSize"], 512);
        assert_eq!(v["tiles"][0], "https://t/{z}/{x}/{y}");
    }

    #[test]
    fn boundary_has_fill_then_line() {
        let specs = LayerSpec::defaults_for(LayerKind::BoundaryGeometry);
        let renders: Vec<RenderType> = specs.iter().map(|s| s.render).collect();
        assert_eq!(renders, vec![RenderType::Fill, RenderType::Line]);
        assert!(specs.iter().all(|s| s.source == "boundaryGeometry-source"));
    }

    #[test]
    fn with_paint_overrides() {
        let spec = LayerSpec::defaults_for(LayerKind::Water)
            .remove(0)
            .with_paint("raster-opacity", 0.5);
        assert_eq!(spec.paint.get("raster-opacity"), Some(&PaintValue::Number(0.5)));
    }
}
