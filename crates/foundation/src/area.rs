use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::bounds::{BoundingBox, LonLat};

#[derive(Debug, Clone, PartialEq)]
pub enum AreaError {
    TooFewVertices { distinct: usize },
    InvalidCoordinate { index: usize },
}

impl std::fmt::Display for AreaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaError::TooFewVertices { distinct } => {
                write!(f, "polygon needs at least 3 distinct vertices, got {distinct}")
            }
            AreaError::InvalidCoordinate { index } => {
                write!(f, "vertex {index} is not a valid lon/lat coordinate")
            }
        }
    }
}

impl std::error::Error for AreaError {}

/// User-selected polygon bounding the analysis region.
///
/// The ring is stored open: the closing vertex is implied. Equality is
/// structural, vertex by vertex, so re-selecting the same feature compares
/// equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct AreaOfInterest {
    ring: Vec<LonLat>,
}

impl AreaOfInterest {
    pub fn new(ring: impl IntoIterator<Item = LonLat>) -> Result<Self, AreaError> {
        let mut ring: Vec<LonLat> = ring.into_iter().collect();

        if let Some(index) = ring.iter().position(|p| !p.is_valid()) {
            return Err(AreaError::InvalidCoordinate { index });
        }

        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        let mut distinct: Vec<&LonLat> = Vec::with_capacity(ring.len());
        for p in &ring {
            if !distinct.contains(&p) {
                distinct.push(p);
            }
        }
        if distinct.len() < 3 {
            return Err(AreaError::TooFewVertices {
                distinct: distinct.len(),
            });
        }

        Ok(Self { ring })
    }

    pub fn vertices(&self) -> &[LonLat] {
        &self.ring
    }

    pub fn bbox(&self) -> BoundingBox {
        // Non-empty by construction.
        BoundingBox::from_points(&self.ring).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// GeoJSON `Polygon` geometry with the ring explicitly closed.
    pub fn to_geojson(&self) -> Value {
        let mut coords: Vec<[f64; 2]> = self.ring.iter().map(|p| [p.lon, p.lat]).collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        json!({
            "type": "Polygon",
            "coordinates": [coords],
        })
    }
}

impl TryFrom<Vec<[f64; 2]>> for AreaOfInterest {
    type Error = AreaError;

    fn try_from(v: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::new(v.into_iter().map(LonLat::from))
    }
}

impl From<AreaOfInterest> for Vec<[f64; 2]> {
    fn from(a: AreaOfInterest) -> Self {
        a.ring.iter().map(|p| [p.lon, p.lat]).collect()
    }
}
