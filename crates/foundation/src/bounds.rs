use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Upstream producers use `(0, 0)` as their "not geocoded yet" default,
    /// so a position is only meaningful when both coordinates are non-zero.
    pub fn is_unset(&self) -> bool {
        self.lon == 0.0 || self.lat == 0.0
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

/// Axis-aligned lon/lat box.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LonLat>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut b = Self::new(first.lon, first.lat, first.lon, first.lat);
        for p in it {
            b.west = b.west.min(p.lon);
            b.south = b.south.min(p.lat);
            b.east = b.east.max(p.lon);
            b.north = b.north.max(p.lat);
        }
        Some(b)
    }

    pub fn center(&self) -> LonLat {
        LonLat::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    pub fn contains(&self, p: &LonLat) -> bool {
        p.lon >= self.west && p.lon <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }
}
