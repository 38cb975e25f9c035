use foundation::bounds::{BoundingBox, LonLat};
use foundation::time::{DateTriple, parse_date};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use streaming::protocol::Region;

/// Workflow position of the conversational agent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    PendingConfirmation,
    Confirmed,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
}

/// Read-only mirror of the agent's shared state object.
///
/// Every field is optional: the agent fills them in as the conversation
/// progresses, and a push replaces the whole mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentState {
    pub event: Option<String>,
    pub event_description: Option<String>,
    pub flood_report: Option<String>,
    pub report_document: Option<String>,
    pub pre_date: Option<String>,
    pub peek_date: Option<String>,
    pub after_date: Option<String>,
    pub is_valid_flood_query: Option<bool>,
    pub stage: Option<Stage>,
    pub user_confirmed: Option<bool>,
    pub location: Option<String>,
    /// `[lon, lat]`; `[0, 0]` means not geocoded yet.
    pub coordinates: Option<Vec<f64>>,
    pub bounds: Option<BoundingBox>,
    pub geojson: Option<Value>,
    pub search_sources: Vec<SearchSource>,
}

impl AgentState {
    /// Event centre, unless unset or malformed.
    pub fn centroid(&self) -> Option<LonLat> {
        let c = self.coordinates.as_deref()?;
        let [lon, lat] = c else {
            return None;
        };
        let p = LonLat::new(*lon, *lat);
        (!p.is_unset() && p.is_valid()).then_some(p)
    }

    /// All three event dates, once every one of them parses.
    pub fn date_triple(&self) -> Option<DateTriple> {
        let parse = |raw: &Option<String>| parse_date(raw.as_deref()?).ok();
        Some(DateTriple {
            pre: parse(&self.pre_date)?,
            peak: parse(&self.peek_date)?,
            post: parse(&self.after_date)?,
        })
    }

    /// Boundary polygon, when the agent has one.
    pub fn boundary(&self) -> Option<&Value> {
        self.geojson.as_ref().filter(|g| g.get("type").is_some())
    }

    pub fn has_geometry(&self) -> bool {
        self.boundary().is_some() || self.bounds.is_some()
    }

    pub fn region(&self) -> Option<Region> {
        Region::pick(self.boundary(), self.bounds)
    }

    /// Centre to report alongside an imagery request.
    pub fn request_center(&self) -> LonLat {
        self.centroid()
            .or_else(|| self.bounds.map(|b| b.center()))
            .unwrap_or(LonLat::new(0.0, 0.0))
    }

    pub fn stage(&self) -> Stage {
        self.stage.unwrap_or(Stage::Initial)
    }
}
