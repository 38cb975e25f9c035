use serde::{Deserialize, Serialize};

/// Named thematic overlay category.
///
/// The first six kinds belong to the classic (historical / hotspot) analysis,
/// the rest to the agent-driven flow. Declaration order is the canonical
/// ordering used everywhere determinism matters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    Water,
    FloodExtent,
    LandCoverLandUse,
    PopulationDensity,
    SoilTexture,
    HealthcareAccess,
    Sentinel2,
    Sentinel1,
    FloodDetection,
    Population,
    Urban,
    Landcover,
    BoundaryGeometry,
}

/// How a render layer draws its source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    Raster,
    Fill,
    Line,
}

impl RenderType {
    /// Paint property that carries this layer type's opacity.
    pub fn opacity_property(self) -> &'static str {
        match self {
            RenderType::Raster => "raster-opacity",
            RenderType::Fill => "fill-opacity",
            RenderType::Line => "line-opacity",
        }
    }
}

impl LayerKind {
    pub const CLASSIC: [LayerKind; 6] = [
        LayerKind::Water,
        LayerKind::FloodExtent,
        LayerKind::LandCoverLandUse,
        LayerKind::PopulationDensity,
        LayerKind::SoilTexture,
        LayerKind::HealthcareAccess,
    ];

    pub const AGENT_IMAGERY: [LayerKind; 3] = [
        LayerKind::Sentinel2,
        LayerKind::Sentinel1,
        LayerKind::FloodDetection,
    ];

    pub const IMPACT: [LayerKind; 3] =
        [LayerKind::Population, LayerKind::Urban, LayerKind::Landcover];

    pub const ALL: [LayerKind; 13] = [
        LayerKind::Water,
        LayerKind::FloodExtent,
        LayerKind::LandCoverLandUse,
        LayerKind::PopulationDensity,
        LayerKind::SoilTexture,
        LayerKind::HealthcareAccess,
        LayerKind::Sentinel2,
        LayerKind::Sentinel1,
        LayerKind::FloodDetection,
        LayerKind::Population,
        LayerKind::Urban,
        LayerKind::Landcover,
        LayerKind::BoundaryGeometry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Water => "water",
            LayerKind::FloodExtent => "floodExtent",
            LayerKind::LandCoverLandUse => "landCoverLandUse",
            LayerKind::PopulationDensity => "populationDensity",
            LayerKind::SoilTexture => "soilTexture",
            LayerKind::HealthcareAccess => "healthcareAccess",
            LayerKind::Sentinel2 => "sentinel2",
            LayerKind::Sentinel1 => "sentinel1",
            LayerKind::FloodDetection => "floodDetection",
            LayerKind::Population => "population",
            LayerKind::Urban => "urban",
            LayerKind::Landcover => "landcover",
            LayerKind::BoundaryGeometry => "boundaryGeometry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn is_classic(self) -> bool {
        Self::CLASSIC.contains(&self)
    }

    pub fn is_impact(self) -> bool {
        Self::IMPACT.contains(&self)
    }

    pub fn is_agent(self) -> bool {
        !self.is_classic()
    }

    pub fn source_id(self) -> String {
        format!("{}-source", self.as_str())
    }

    /// Render layers of this kind, in draw order.
    pub fn render_layers(self) -> Vec<(String, RenderType)> {
        match self {
            LayerKind::BoundaryGeometry => vec![
                (format!("{}-fill", self.as_str()), RenderType::Fill),
                (format!("{}-line", self.as_str()), RenderType::Line),
            ],
            _ => vec![(format!("{}-layer", self.as_str()), RenderType::Raster)],
        }
    }

    pub fn layer_ids(self) -> Vec<String> {
        self.render_layers().into_iter().map(|(id, _)| id).collect()
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
