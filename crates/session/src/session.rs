use std::sync::Arc;

use agent::bridge::{AgentBridge, Viewport};
use agent::interrupt::{
    ConfirmationView, InterruptError, InterruptEvent, InterruptHandler, ResumeValue,
};
use agent::state::AgentState;
use foundation::area::AreaOfInterest;
use foundation::bounds::LonLat;
use foundation::time::{DateRange, YearWindow};
use layers::composer::{OverlayInputs, compose};
use layers::kind::LayerKind;
use layers::mode::AnalysisMode;
use layers::payload::{AgentImagery, ImageryPeriod, ImpactAssessment, ImpactStatistics};
use layers::registry::LayerRegistry;
use layers::surface::MapSurface;
use layers::symbology::VisibilityState;
use runtime::event_bus::{Notice, NoticeBus};
use runtime::metrics::Metrics;
use runtime::turn::Turn;
use serde_json::Value;
use streaming::coordinator::{Begin, FetchCoordinator, FetchTicket, Settled};
use streaming::protocol::{AnalysisRequest, ClassicResult, ImageryRequest, ImpactRequest};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::selection::{SelectionController, area_from_feature};

/// A backend request the caller must perform and report back through the
/// matching `on_*_result` method.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Analysis(FetchTicket<AnalysisRequest>),
    Imagery(FetchTicket<ImageryRequest>),
    Impact(FetchTicket<ImpactRequest>),
}

/// Application state and its single coordinator.
///
/// Each public mutator runs one turn: it updates the owning component,
/// composes the overlay and applies the result to the registry before
/// returning. Requests to perform are returned as [`Outbound`] values; the
/// session itself never does I/O.
pub struct Session<S> {
    config: SessionConfig,
    turn: Turn,
    registry: LayerRegistry<S>,
    selection: SelectionController,
    visibility: VisibilityState,
    period: ImageryPeriod,
    analysis: FetchCoordinator<AnalysisRequest, ClassicResult>,
    imagery: FetchCoordinator<ImageryRequest, AgentImagery>,
    impact: FetchCoordinator<ImpactRequest, ImpactAssessment>,
    classic: Option<Arc<ClassicResult>>,
    bridge: AgentBridge,
    interrupts: InterruptHandler,
    notices: NoticeBus,
    metrics: Metrics,
}

impl<S: MapSurface> Session<S> {
    pub fn new(surface: S, config: SessionConfig) -> Self {
        Self {
            turn: Turn::default(),
            registry: LayerRegistry::new(surface),
            selection: SelectionController::new(config.initial_mode),
            visibility: config.initial_visibility(),
            period: ImageryPeriod::Peak,
            analysis: FetchCoordinator::new("analysis"),
            imagery: FetchCoordinator::new("imagery"),
            impact: FetchCoordinator::new("impact"),
            classic: None,
            bridge: AgentBridge::new(),
            interrupts: InterruptHandler::new(config.recognized_interrupts.iter().cloned()),
            notices: NoticeBus::new(),
            metrics: Metrics::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn area(&self) -> Option<&AreaOfInterest> {
        self.selection.area()
    }

    pub fn mode(&self) -> AnalysisMode {
        self.selection.mode()
    }

    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }

    pub fn period(&self) -> ImageryPeriod {
        self.period
    }

    pub fn registry(&self) -> &LayerRegistry<S> {
        &self.registry
    }

    pub fn surface(&self) -> &S {
        self.registry.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.registry.surface_mut()
    }

    pub fn is_loading(&self) -> bool {
        self.analysis.is_loading() || self.imagery.is_loading() || self.impact.is_loading()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.analysis
            .last_error()
            .or(self.imagery.last_error())
            .or(self.impact.last_error())
    }

    /// Script text of the last applied classic result.
    pub fn script(&self) -> Option<&str> {
        self.classic.as_ref()?.script.as_deref()
    }

    pub fn agent_state(&self) -> Option<&AgentState> {
        self.bridge.state()
    }

    pub fn impact_statistics(&self) -> Option<&ImpactStatistics> {
        self.bridge.statistics()
    }

    pub fn confirmation(&self) -> Option<ConfirmationView> {
        self.interrupts.view()
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.notices()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn begin_turn(&mut self, what: &'static str) {
        self.turn = self.turn.next();
        debug!(turn = self.turn.index, what, "turn");
    }

    /// The map surface finished loading.
    pub fn on_surface_ready(&mut self) {
        self.begin_turn("surface_ready");
        self.registry.on_ready();
    }

    pub fn select(&mut self, area: AreaOfInterest) -> Vec<Outbound> {
        self.begin_turn("select");
        if !self.selection.select(area) {
            self.metrics.inc("select_unchanged");
            return Vec::new();
        }
        self.teardown_classic("selection changed");
        self.fetch_classic()
    }

    /// Selects the interactive feature under `point`, if any.
    pub fn click(&mut self, point: LonLat) -> Vec<Outbound> {
        let features = self
            .registry
            .surface()
            .query_features(point, &self.config.interactive_layer);
        match features.iter().find_map(area_from_feature) {
            Some(area) => self.select(area),
            None => {
                debug!(?point, "click hit no selectable feature");
                Vec::new()
            }
        }
    }

    pub fn set_mode(&mut self, mode: AnalysisMode) -> Vec<Outbound> {
        self.begin_turn("mode");
        if !self.selection.set_mode(mode) {
            return Vec::new();
        }
        info!(%mode, "analysis mode changed");
        self.teardown_classic("mode changed");
        if self.selection.needs_area() {
            self.notices
                .info(self.turn, "select_area", "Select an area on the map to analyse");
        }

        let mut out = self.fetch_classic();
        // A mirror left over from a resolved confirmation waits for a fresh push.
        if mode == AnalysisMode::Agent && !self.bridge.is_stale() {
            if let Some(state) = self.bridge.state().cloned() {
                out.extend(self.apply_agent_state(state));
            }
        }
        self.recompose();
        out
    }

    pub fn set_dates(&mut self, range: DateRange) -> Vec<Outbound> {
        self.begin_turn("dates");
        if !self.selection.set_range(range) {
            return Vec::new();
        }
        self.fetch_classic()
    }

    pub fn set_year_window(&mut self, window: Option<YearWindow>) -> Vec<Outbound> {
        self.begin_turn("year_window");
        if !self.selection.set_year_window(window) {
            return Vec::new();
        }
        if self.selection.mode() != AnalysisMode::Hotspot {
            return Vec::new();
        }
        self.fetch_classic()
    }

    /// Explicit re-submit of the current parameters, e.g. after a failure.
    pub fn submit(&mut self) -> Vec<Outbound> {
        self.begin_turn("submit");
        if self.selection.mode() == AnalysisMode::Agent {
            return self.request_impact();
        }
        let out = self.fetch_classic();
        if out.is_empty() && !self.analysis.is_loading() {
            self.notices.info(
                self.turn,
                "parameters_missing",
                "Select an area and a date range first",
            );
        }
        out
    }

    pub fn toggle(&mut self, kind: LayerKind) -> Vec<Outbound> {
        self.begin_turn("toggle");
        let visible = self.visibility.toggle(kind);
        debug!(%kind, visible, "visibility toggled");
        let out = if visible && kind.is_impact() {
            self.request_impact()
        } else {
            Vec::new()
        };
        self.recompose();
        out
    }

    pub fn set_opacity(&mut self, kind: LayerKind, opacity: f64) {
        self.begin_turn("opacity");
        self.visibility.set_opacity(kind, opacity);
        self.recompose();
    }

    pub fn set_period(&mut self, period: ImageryPeriod) {
        self.begin_turn("period");
        if self.period == period {
            return;
        }
        self.period = period;
        self.recompose();
    }

    pub fn on_analysis_result<E: std::fmt::Display>(
        &mut self,
        ticket: &FetchTicket<AnalysisRequest>,
        outcome: Result<ClassicResult, E>,
    ) {
        self.begin_turn("analysis_result");
        match self.analysis.settle(&ticket.fingerprint, outcome) {
            Settled::Fresh(result) => {
                self.classic = Some(result);
                self.recompose();
            }
            Settled::Stale => self.metrics.inc("stale_discarded"),
            Settled::Failed(msg) => self.fetch_failed("analysis", msg),
        }
    }

    pub fn on_imagery_result<E: std::fmt::Display>(
        &mut self,
        ticket: &FetchTicket<ImageryRequest>,
        outcome: Result<AgentImagery, E>,
    ) {
        self.begin_turn("imagery_result");
        let dates = ticket.request.dates();
        match self.imagery.settle(&ticket.fingerprint, outcome) {
            Settled::Fresh(imagery) => {
                if self.bridge.store_imagery(dates, imagery) {
                    self.recompose();
                }
            }
            Settled::Stale => self.metrics.inc("stale_discarded"),
            Settled::Failed(msg) => {
                self.bridge.imagery_failed(dates);
                self.fetch_failed("imagery", msg);
            }
        }
    }

    pub fn on_impact_result<E: std::fmt::Display>(
        &mut self,
        ticket: &FetchTicket<ImpactRequest>,
        outcome: Result<ImpactAssessment, E>,
    ) {
        self.begin_turn("impact_result");
        let dates = ticket.request.dates();
        match self.impact.settle(&ticket.fingerprint, outcome) {
            Settled::Fresh(assessment) => {
                if self.bridge.store_impact(dates, assessment) {
                    self.recompose();
                }
            }
            Settled::Stale => {
                self.bridge.impact_failed(dates);
                self.metrics.inc("stale_discarded");
            }
            Settled::Failed(msg) => {
                self.bridge.impact_failed(dates);
                self.fetch_failed("impact", msg);
            }
        }
    }

    /// A new agent state snapshot arrived.
    pub fn on_agent_state(&mut self, state: AgentState) -> Vec<Outbound> {
        self.begin_turn("agent_state");
        let out = self.apply_agent_state(state);
        self.recompose();
        out
    }

    fn apply_agent_state(&mut self, state: AgentState) -> Vec<Outbound> {
        // Outside agent mode the conversation may continue, but it does not
        // drive the map.
        let suspended =
            self.interrupts.is_awaiting() || self.selection.mode() != AnalysisMode::Agent;
        let update = self.bridge.on_state(state, suspended);

        match update.viewport {
            Some(Viewport::FlyTo(center)) => {
                self.registry.fly_to(center, self.config.recenter_zoom)
            }
            Some(Viewport::FitBounds(bounds)) => {
                self.registry.fit_bounds(bounds, self.config.fit_padding_px)
            }
            None => {}
        }

        let mut out = Vec::new();
        if let Some(request) = update.imagery {
            let dates = request.dates();
            match self.imagery.begin(request) {
                Ok(begin) => out.extend(self.issued(begin, Outbound::Imagery)),
                Err(err) => {
                    self.bridge.imagery_failed(dates);
                    self.fetch_failed("imagery", err.to_string());
                }
            }
        }
        if !suspended {
            out.extend(self.request_impact());
        }
        out
    }

    fn request_impact(&mut self) -> Vec<Outbound> {
        if self.selection.mode() != AnalysisMode::Agent || self.interrupts.is_awaiting() {
            return Vec::new();
        }
        let Some(request) = self.bridge.request_impact(&self.visibility) else {
            return Vec::new();
        };
        let dates = request.dates();
        match self.impact.begin(request) {
            Ok(begin) => self.issued(begin, Outbound::Impact),
            Err(err) => {
                self.bridge.impact_failed(dates);
                self.fetch_failed("impact", err.to_string());
                Vec::new()
            }
        }
    }

    /// Idle -> AwaitingConfirmation. The receiver yields the resume value
    /// once the user confirms or cancels.
    pub fn on_agent_interrupt(
        &mut self,
        event: InterruptEvent,
    ) -> Result<oneshot::Receiver<ResumeValue>, InterruptError> {
        self.begin_turn("interrupt");
        let prompt = event.message.clone();
        let rx = self.interrupts.on_pause(event)?;
        self.notices.info(self.turn, "confirm", prompt);
        Ok(rx)
    }

    pub fn edit_confirmation(&mut self, field: &str, value: Value) -> Result<(), InterruptError> {
        self.begin_turn("edit");
        self.interrupts.edit_field(field, value)
    }

    pub fn confirm(&mut self) -> Result<(), InterruptError> {
        self.begin_turn("confirm");
        self.interrupts.confirm()?;
        self.bridge.mark_stale();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), InterruptError> {
        self.begin_turn("cancel");
        self.interrupts.cancel()?;
        self.bridge.mark_stale();
        Ok(())
    }

    fn teardown_classic(&mut self, reason: &'static str) {
        self.analysis.supersede();
        if self.classic.take().is_some() {
            self.notices.info(self.turn, "cleared", reason);
        }
        // Removal reaches the surface before any new request leaves the turn.
        self.recompose();
    }

    fn fetch_classic(&mut self) -> Vec<Outbound> {
        let Some(params) = self.selection.classic_params() else {
            return Vec::new();
        };
        let request = AnalysisRequest::new(
            params.area,
            params.range,
            params.year_window,
            params.mode,
            self.config.layers_for(params.mode),
        );
        match self.analysis.begin(request) {
            Ok(begin) => self.issued(begin, Outbound::Analysis),
            Err(err) => {
                self.fetch_failed("analysis", err.to_string());
                Vec::new()
            }
        }
    }

    fn issued<Q>(
        &mut self,
        begin: Begin<Q>,
        wrap: fn(FetchTicket<Q>) -> Outbound,
    ) -> Vec<Outbound> {
        match begin {
            Begin::Issued(ticket) => {
                self.metrics.inc("fetch_issued");
                vec![wrap(ticket)]
            }
            Begin::Attached(_) => {
                self.metrics.inc("fetch_attached");
                Vec::new()
            }
        }
    }

    fn fetch_failed(&mut self, endpoint: &'static str, msg: String) {
        warn!(endpoint, "{msg}");
        self.metrics.inc("fetch_failed");
        self.notices
            .warn(self.turn, "fetch_failed", format!("{endpoint} request failed: {msg}"));
    }

    fn recompose(&mut self) {
        let inputs = OverlayInputs {
            selection: self.selection.area(),
            mode: self.selection.mode(),
            visibility: &self.visibility,
            classic: self.classic.as_deref().map(|c| &c.payloads),
            agent_imagery: self.bridge.imagery().map(|a| a.as_ref()),
            agent_impact: self.bridge.impact().map(|a| a.as_ref()),
            agent_geometry: self.bridge.geometry(),
            period: self.period,
        };
        let ops = compose(&inputs, self.registry.snapshot());
        if !ops.is_empty() {
            debug!(turn = self.turn.index, ops = ops.len(), "applying overlay");
        }
        self.registry.apply(ops);
        self.metrics
            .set_gauge("layers_present", self.registry.snapshot().len() as i64);
        self.metrics
            .set_gauge("surface_failures", self.registry.failures() as i64);
    }
}
