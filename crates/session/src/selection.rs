use foundation::area::AreaOfInterest;
use foundation::bounds::LonLat;
use foundation::time::{DateRange, YearWindow};
use layers::mode::AnalysisMode;
use serde_json::Value;

/// Complete parameter set of a classic analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicParams {
    pub area: AreaOfInterest,
    pub mode: AnalysisMode,
    pub range: DateRange,
    pub year_window: Option<YearWindow>,
}

/// Sole owner of the area of interest and the analysis parameters.
///
/// Every setter reports whether anything changed; structurally equal input
/// is a no-op so repeated clicks on the same area never refetch.
#[derive(Debug, Clone)]
pub struct SelectionController {
    area: Option<AreaOfInterest>,
    mode: AnalysisMode,
    range: Option<DateRange>,
    year_window: Option<YearWindow>,
}

impl SelectionController {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            area: None,
            mode,
            range: None,
            year_window: None,
        }
    }

    pub fn area(&self) -> Option<&AreaOfInterest> {
        self.area.as_ref()
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    pub fn year_window(&self) -> Option<YearWindow> {
        self.year_window
    }

    pub fn select(&mut self, area: AreaOfInterest) -> bool {
        if self.area.as_ref() == Some(&area) {
            return false;
        }
        self.area = Some(area);
        true
    }

    pub fn clear_area(&mut self) -> bool {
        self.area.take().is_some()
    }

    pub fn set_mode(&mut self, mode: AnalysisMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn set_range(&mut self, range: DateRange) -> bool {
        if self.range == Some(range) {
            return false;
        }
        self.range = Some(range);
        true
    }

    pub fn set_year_window(&mut self, window: Option<YearWindow>) -> bool {
        if self.year_window == window {
            return false;
        }
        self.year_window = window;
        true
    }

    /// Classic mode without an area: the UI should prompt for one.
    pub fn needs_area(&self) -> bool {
        self.mode.is_classic() && self.area.is_none()
    }

    /// Parameters for a classic fetch, once the mode is classic and both an
    /// area and a date range are known. The year window only applies to
    /// hotspot analysis.
    pub fn classic_params(&self) -> Option<ClassicParams> {
        if !self.mode.is_classic() {
            return None;
        }
        Some(ClassicParams {
            area: self.area.clone()?,
            mode: self.mode,
            range: self.range?,
            year_window: match self.mode {
                AnalysisMode::Hotspot => self.year_window,
                _ => None,
            },
        })
    }
}

/// Area of a clicked GeoJSON feature: its polygon's outer ring, or the outer
/// ring of a multipolygon's first part.
pub fn area_from_feature(feature: &Value) -> Option<AreaOfInterest> {
    let geometry = feature.get("geometry").unwrap_or(feature);
    let coords = geometry.get("coordinates")?;
    let ring = match geometry.get("type")?.as_str()? {
        "Polygon" => coords.get(0)?,
        "MultiPolygon" => coords.get(0)?.get(0)?,
        _ => return None,
    };
    let points: Option<Vec<LonLat>> = ring
        .as_array()?
        .iter()
        .map(|p| Some(LonLat::new(p.get(0)?.as_f64()?, p.get(1)?.as_f64()?)))
        .collect();
    AreaOfInterest::new(points?).ok()
}
