//! Fetched data that overlays are built from.
//!
//! Payloads are immutable once stored; a new fetch produces a new value, so
//! they are shared behind `Arc` by the fetch side and read here by reference.

use std::collections::BTreeMap;

use foundation::bounds::{BoundingBox, LonLat};
use serde::{Deserialize, Serialize};

use crate::kind::LayerKind;

pub const DEFAULT_TILE_SIZE: u32 = 256;

/// XYZ tile template produced by a backend for one layer kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayerPayload {
    pub tile_url_template: String,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

impl TileLayerPayload {
    pub fn new(tile_url_template: impl Into<String>, tile_size: u32) -> Self {
        Self {
            tile_url_template: tile_url_template.into(),
            tile_size,
        }
    }
}

/// Classic-mode layer data. A kind with no entry has no data under the
/// current parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassicPayloads {
    layers: BTreeMap<LayerKind, TileLayerPayload>,
}

impl ClassicPayloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(
        layers: impl IntoIterator<Item = (LayerKind, Option<TileLayerPayload>)>,
    ) -> Self {
        Self {
            layers: layers
                .into_iter()
                .filter(|(k, _)| k.is_classic())
                .filter_map(|(k, p)| p.map(|p| (k, p)))
                .collect(),
        }
    }

    pub fn get(&self, kind: LayerKind) -> Option<&TileLayerPayload> {
        self.layers.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = LayerKind> + '_ {
        self.layers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageryPeriod {
    Pre,
    Peak,
    Post,
}

impl ImageryPeriod {
    pub const ALL: [ImageryPeriod; 3] =
        [ImageryPeriod::Pre, ImageryPeriod::Peak, ImageryPeriod::Post];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodImagery {
    pub sentinel2: Option<TileLayerPayload>,
    pub sentinel1: Option<TileLayerPayload>,
}

/// Satellite imagery for one flood event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentImagery {
    pub periods: BTreeMap<ImageryPeriod, PeriodImagery>,
    pub flood_detection: Option<TileLayerPayload>,
    pub bounds: Option<BoundingBox>,
    pub center: Option<LonLat>,
}

impl AgentImagery {
    /// Tile template for an imagery kind as shown for `period`.
    ///
    /// Flood detection is period independent.
    pub fn tile(&self, kind: LayerKind, period: ImageryPeriod) -> Option<&TileLayerPayload> {
        match kind {
            LayerKind::FloodDetection => self.flood_detection.as_ref(),
            LayerKind::Sentinel2 => self.periods.get(&period)?.sentinel2.as_ref(),
            LayerKind::Sentinel1 => self.periods.get(&period)?.sentinel1.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareStat {
    pub affected: f64,
    pub total: f64,
    pub percentage: f64,
}

/// Summary numbers of an impact assessment, for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactStatistics {
    pub analysis_period: Option<String>,
    pub flood_area_km2: Option<f64>,
    pub population: Option<ShareStat>,
    pub urban_km2: Option<ShareStat>,
    /// Affected area per land cover class.
    pub landcover_km2: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactAssessment {
    pub layers: BTreeMap<LayerKind, TileLayerPayload>,
    pub statistics: ImpactStatistics,
}

impl ImpactAssessment {
    pub fn tile(&self, kind: LayerKind) -> Option<&TileLayerPayload> {
        self.layers.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentImagery, ClassicPayloads, ImageryPeriod, PeriodImagery, TileLayerPayload};
    use crate::kind::LayerKind;

    #[test]
    fn classic_payloads_drop_absent_and_foreign_kinds() {
        let p = ClassicPayloads::from_layers([
            (LayerKind::Water, Some(TileLayerPayload::new("w/{z}/{x}/{y}", 256))),
            (LayerKind::FloodExtent, None),
            (LayerKind::Sentinel1, Some(TileLayerPayload::new("s1", 256))),
        ]);
        assert_eq!(p.kinds().collect::<Vec<_>>(), vec![LayerKind::Water]);
    }

    #[test]
    fn tile_size_defaults_when_missing() {
        let p: TileLayerPayload =
            serde_json::from_str(r#"{"tileUrlTemplate":"https://t/{z}/{x}/{y}"}"#).unwrap();
        assert_eq!(p.tile_size, 256);
    }

    #[test]
    fn imagery_tile_follows_period() {
        let mut img = AgentImagery::default();
        img.periods.insert(
            ImageryPeriod::Pre,
            PeriodImagery {
                sentinel2: Some(TileLayerPayload::new("pre-s2", 256)),
                sentinel1: None,
            },
        );
        img.flood_detection = Some(TileLayerPayload::new("fd", 256));

        assert_eq!(
            img.tile(LayerKind::Sentinel2, ImageryPeriod::Pre)
                .map(|t| t.tile_url_template.as_str()),
            Some("pre-s2")
        );
        assert!(img.tile(LayerKind::Sentinel2, ImageryPeriod::Peak).is_none());
        assert!(img.tile(LayerKind::FloodDetection, ImageryPeriod::Post).is_some());
        assert!(img.tile(LayerKind::Water, ImageryPeriod::Pre).is_none());
    }
}
