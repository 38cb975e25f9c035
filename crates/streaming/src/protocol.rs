//! Wire formats of the backends the session talks to.
//!
//! - the geospatial analysis backend (classic historical / hotspot layers)
//! - the agent service's imagery and impact endpoints
//!
//! Requests serialize deterministically so they can be fingerprinted as-is.
//! Responses are decoded leniently (unknown fields ignored, absent entries
//! become "no data") and converted into the typed payloads in `layers`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use foundation::area::AreaOfInterest;
use foundation::bounds::{BoundingBox, LonLat};
use foundation::time::{DatePair, DateRange, DateTriple, YearWindow};
use layers::kind::LayerKind;
use layers::mode::AnalysisMode;
use layers::payload::{
    AgentImagery, ClassicPayloads, DEFAULT_TILE_SIZE, ImageryPeriod, ImpactAssessment,
    ImpactStatistics, PeriodImagery, ShareStat, TileLayerPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ANALYSIS_PATH: &str = "/api/flood-analysis";
pub const IMAGERY_PATH: &str = "/api/flood-images";
pub const IMPACT_PATH: &str = "/api/flood-impact";
pub const STATUS_PATH: &str = "/api/gee-status";

/// `{ success, data?, error? }` wrapper used by the agent service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    Rejected(String),
    MissingData,
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::Rejected(msg) => write!(f, "backend reported failure: {msg}"),
            EnvelopeError::MissingData => write!(f, "backend response carried no data"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl<T> ApiEnvelope<T> {
    pub fn into_data(self) -> Result<T, EnvelopeError> {
        if !self.success {
            return Err(EnvelopeError::Rejected(
                self.error.unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }
        self.data.ok_or(EnvelopeError::MissingData)
    }
}

/// Region an agent request is evaluated over. The boundary polygon is the
/// more precise one and wins when both are known.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    Boundary(Value),
    Bounds(BoundingBox),
}

impl Region {
    pub fn pick(boundary: Option<&Value>, bounds: Option<BoundingBox>) -> Option<Self> {
        match (boundary, bounds) {
            (Some(geojson), _) => Some(Region::Boundary(geojson.clone())),
            (None, Some(b)) => Some(Region::Bounds(b)),
            (None, None) => None,
        }
    }

    fn split(self) -> (Option<BoundingBox>, Option<Value>) {
        match self {
            Region::Boundary(v) => (None, Some(v)),
            Region::Bounds(b) => (Some(b), None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageryRequest {
    pub pre_date: NaiveDate,
    pub peek_date: NaiveDate,
    pub after_date: NaiveDate,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
}

impl ImageryRequest {
    pub fn new(dates: DateTriple, center: LonLat, region: Region) -> Self {
        let (bounds, geojson) = region.split();
        Self {
            pre_date: dates.pre,
            peek_date: dates.peak,
            after_date: dates.post,
            longitude: center.lon,
            latitude: center.lat,
            bounds,
            geojson,
        }
    }

    pub fn dates(&self) -> DateTriple {
        DateTriple {
            pre: self.pre_date,
            peak: self.peek_date,
            post: self.after_date,
        }
    }
}

/// One imagery product: a tile template, or the reason there is none.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TileEntry {
    #[serde(default)]
    pub tile_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TileEntry {
    pub fn payload(&self) -> Option<TileLayerPayload> {
        if self.error.is_some() {
            return None;
        }
        self.tile_url
            .as_ref()
            .map(|url| TileLayerPayload::new(url.clone(), DEFAULT_TILE_SIZE))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorEntries {
    #[serde(default)]
    pub sentinel2: Option<TileEntry>,
    #[serde(default)]
    pub sentinel1: Option<TileEntry>,
}

impl SensorEntries {
    fn into_period(self) -> PeriodImagery {
        PeriodImagery {
            sentinel2: self.sentinel2.and_then(|e| e.payload()),
            sentinel1: self.sentinel1.and_then(|e| e.payload()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageryResponse {
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    #[serde(default)]
    pub pre_date: Option<SensorEntries>,
    #[serde(default)]
    pub peek_date: Option<SensorEntries>,
    #[serde(default)]
    pub after_date: Option<SensorEntries>,
    #[serde(default)]
    pub flood_detection: Option<TileEntry>,
}

impl From<ImageryResponse> for AgentImagery {
    fn from(r: ImageryResponse) -> Self {
        let mut periods = BTreeMap::new();
        for (period, entries) in [
            (ImageryPeriod::Pre, r.pre_date),
            (ImageryPeriod::Peak, r.peek_date),
            (ImageryPeriod::Post, r.after_date),
        ] {
            if let Some(entries) = entries {
                periods.insert(period, entries.into_period());
            }
        }
        AgentImagery {
            periods,
            flood_detection: r.flood_detection.and_then(|e| e.payload()),
            bounds: r.bounds,
            center: r.center.map(LonLat::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactRequest {
    pub pre_date: NaiveDate,
    pub peek_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
}

impl ImpactRequest {
    pub fn new(dates: DatePair, region: Region) -> Self {
        let (bounds, geojson) = region.split();
        Self {
            pre_date: dates.pre,
            peek_date: dates.peak,
            bounds,
            geojson,
        }
    }

    pub fn dates(&self) -> DatePair {
        DatePair {
            pre: self.pre_date,
            peak: self.peek_date,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Measured {
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Affected / total / percentage triple. Urban figures use `*_area_km2` names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ShareEntry {
    #[serde(default, alias = "affected_area_km2")]
    pub affected: Option<f64>,
    #[serde(default, alias = "total_area_km2")]
    pub total: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ShareEntry {
    fn stat(&self) -> Option<ShareStat> {
        if self.error.is_some() {
            return None;
        }
        let (affected, total) = (self.affected?, self.total?);
        let percentage = self.percentage.unwrap_or(if total > 0.0 {
            affected / total * 100.0
        } else {
            0.0
        });
        Some(ShareStat {
            affected,
            total,
            percentage,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LandcoverClass {
    #[serde(default)]
    pub name: Option<String>,
    pub area_km2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LandcoverEntry {
    #[serde(default)]
    pub breakdown: BTreeMap<String, LandcoverClass>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImpactResponse {
    #[serde(default)]
    pub analysis_period: Option<String>,
    #[serde(default)]
    pub flood_area: Option<Measured>,
    #[serde(default)]
    pub population: Option<ShareEntry>,
    #[serde(default)]
    pub urban: Option<ShareEntry>,
    #[serde(default)]
    pub landcover: Option<LandcoverEntry>,
    #[serde(default)]
    pub layers: BTreeMap<String, TileEntry>,
}

impl From<ImpactResponse> for ImpactAssessment {
    fn from(r: ImpactResponse) -> Self {
        let layers = r
            .layers
            .iter()
            .filter_map(|(name, entry)| {
                let kind = LayerKind::parse(name).filter(|k| k.is_impact())?;
                Some((kind, entry.payload()?))
            })
            .collect();
        let statistics = ImpactStatistics {
            analysis_period: r.analysis_period,
            flood_area_km2: r.flood_area.map(|m| m.value),
            population: r.population.as_ref().and_then(ShareEntry::stat),
            urban_km2: r.urban.as_ref().and_then(ShareEntry::stat),
            landcover_km2: r
                .landcover
                .map(|l| {
                    l.breakdown
                        .into_iter()
                        .map(|(class, c)| (class, c.area_km2))
                        .collect()
                })
                .unwrap_or_default(),
        };
        ImpactAssessment { layers, statistics }
    }
}

/// Classic historical / hotspot analysis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub polygon: AreaOfInterest,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_window: Option<YearWindow>,
    pub mode: AnalysisMode,
    pub layers: Vec<LayerKind>,
}

impl AnalysisRequest {
    pub fn new(
        polygon: AreaOfInterest,
        range: DateRange,
        year_window: Option<YearWindow>,
        mode: AnalysisMode,
        mut layers: Vec<LayerKind>,
    ) -> Self {
        layers.sort();
        layers.dedup();
        Self {
            polygon,
            start_date: range.start,
            end_date: range.end,
            year_window,
            mode,
            layers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClassicResponse {
    /// Keyed by layer kind name; `null` means no data for that kind.
    #[serde(default)]
    pub layers: BTreeMap<String, Option<TileLayerPayload>>,
    #[serde(default)]
    pub script: Option<String>,
}

/// Decoded classic analysis result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassicResult {
    pub payloads: ClassicPayloads,
    /// Downloadable script reproducing the analysis, when the backend sends one.
    pub script: Option<String>,
}

impl From<ClassicResponse> for ClassicResult {
    fn from(r: ClassicResponse) -> Self {
        let payloads = ClassicPayloads::from_layers(
            r.layers
                .into_iter()
                .filter_map(|(name, p)| Some((LayerKind::parse(&name)?, p))),
        );
        ClassicResult {
            payloads,
            script: r.script,
        }
    }
}

/// `GET /api/gee-status`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeeStatus {
    pub initialized: bool,
    #[serde(default)]
    pub message: Option<String>,
}
