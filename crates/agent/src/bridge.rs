use std::sync::Arc;

use foundation::bounds::{BoundingBox, LonLat};
use foundation::time::{DatePair, DateTriple};
use layers::kind::LayerKind;
use layers::payload::{AgentImagery, ImpactAssessment, ImpactStatistics};
use layers::symbology::VisibilityState;
use serde_json::Value;
use streaming::protocol::{ImageryRequest, ImpactRequest};
use tracing::debug;

use crate::state::AgentState;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Viewport {
    FlyTo(LonLat),
    FitBounds(BoundingBox),
}

/// What one agent state push asks of the rest of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeUpdate {
    pub viewport: Option<Viewport>,
    pub imagery: Option<ImageryRequest>,
}

/// Mirrors the agent's state and derives map and fetch intents from it.
///
/// Imagery is fetched once per distinct date triple. Impact assessment is
/// fetched on demand and cached per (pre, peak) pair; a pair change drops the
/// cached result before a new fetch may start.
///
/// A mirror taken while a confirmation was pending stays stale after the
/// confirmation resolves, until the agent pushes a fresh state.
#[derive(Debug, Default)]
pub struct AgentBridge {
    mirror: Option<AgentState>,
    stale: bool,
    last_viewport: Option<Viewport>,
    imagery_dates: Option<DateTriple>,
    imagery: Option<Arc<AgentImagery>>,
    impact_requested: Option<DatePair>,
    impact: Option<(DatePair, Arc<ImpactAssessment>)>,
}

impl AgentBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&AgentState> {
        self.mirror.as_ref()
    }

    /// Boundary geometry to draw, if the agent has one.
    pub fn geometry(&self) -> Option<&Value> {
        self.mirror.as_ref()?.boundary()
    }

    pub fn imagery(&self) -> Option<&Arc<AgentImagery>> {
        self.imagery.as_ref()
    }

    pub fn impact(&self) -> Option<&Arc<ImpactAssessment>> {
        self.impact.as_ref().map(|(_, a)| a)
    }

    pub fn statistics(&self) -> Option<&ImpactStatistics> {
        self.impact().map(|a| &a.statistics)
    }

    /// The current mirror predates a resolved confirmation and must not
    /// drive fetches until the next state push.
    pub fn mark_stale(&mut self) {
        if self.mirror.is_some() {
            debug!("confirmation resolved, agent mirror stale until next push");
            self.stale = true;
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replaces the mirror. While `suspended` (a confirmation is pending) the
    /// snapshot is mirrored only: no recentre, no fetch.
    pub fn on_state(&mut self, state: AgentState, suspended: bool) -> BridgeUpdate {
        let mut update = BridgeUpdate::default();

        if !suspended {
            let viewport = match (state.centroid(), state.bounds) {
                (Some(c), _) => Some(Viewport::FlyTo(c)),
                (None, Some(b)) => Some(Viewport::FitBounds(b)),
                (None, None) => None,
            };
            if viewport.is_some() && viewport != self.last_viewport {
                self.last_viewport = viewport;
                update.viewport = viewport;
            }

            if let Some(dates) = state.date_triple() {
                self.drop_stale_impact(dates.pair());
                if let Some(region) = state.region() {
                    if self.imagery_dates == Some(dates) {
                        debug!(?dates, "imagery already requested for these dates");
                    } else {
                        self.imagery_dates = Some(dates);
                        update.imagery =
                            Some(ImageryRequest::new(dates, state.request_center(), region));
                    }
                }
            }
        } else {
            debug!("agent suspended, mirroring state only");
        }

        self.mirror = Some(state);
        self.stale = false;
        update
    }

    fn current_pair(&self) -> Option<DatePair> {
        self.mirror.as_ref()?.date_triple().map(|t| t.pair())
    }

    fn drop_stale_impact(&mut self, pair: DatePair) {
        if self.impact.as_ref().is_some_and(|(p, _)| *p != pair) {
            debug!("event dates changed, dropping cached impact assessment");
            self.impact = None;
        }
        if self.impact_requested.is_some_and(|p| p != pair) {
            self.impact_requested = None;
        }
    }

    pub fn store_imagery(&mut self, dates: DateTriple, imagery: Arc<AgentImagery>) -> bool {
        if self.imagery_dates != Some(dates) {
            debug!(?dates, "imagery for superseded dates, dropping");
            return false;
        }
        self.imagery = Some(imagery);
        true
    }

    /// Releases the date guard so the next state push may try again.
    pub fn imagery_failed(&mut self, dates: DateTriple) {
        if self.imagery_dates == Some(dates) {
            self.imagery_dates = None;
        }
    }

    /// Impact request to issue now, if an impact layer is enabled and nothing
    /// is cached or in flight for the current dates.
    pub fn request_impact(&mut self, visibility: &VisibilityState) -> Option<ImpactRequest> {
        if self.stale || !visibility.any_visible(&LayerKind::IMPACT) {
            return None;
        }
        let state = self.mirror.as_ref()?;
        let pair = state.date_triple()?.pair();
        let region = state.region()?;
        self.drop_stale_impact(pair);
        if self.impact.is_some() || self.impact_requested == Some(pair) {
            return None;
        }
        self.impact_requested = Some(pair);
        Some(ImpactRequest::new(pair, region))
    }

    pub fn store_impact(&mut self, dates: DatePair, assessment: Arc<ImpactAssessment>) -> bool {
        if self.impact_requested == Some(dates) {
            self.impact_requested = None;
        }
        if self.current_pair() != Some(dates) {
            debug!(?dates, "impact for superseded dates, dropping");
            return false;
        }
        self.impact = Some((dates, assessment));
        true
    }

    pub fn impact_failed(&mut self, dates: DatePair) {
        if self.impact_requested == Some(dates) {
            self.impact_requested = None;
        }
    }
}
