//! Cross-component behaviour of a full session against a recording surface.

use agent::interrupt::{InterruptError, InterruptEvent};
use agent::state::AgentState;
use foundation::area::AreaOfInterest;
use foundation::bounds::{BoundingBox, LonLat};
use foundation::time::DateRange;
use layers::kind::LayerKind;
use layers::layer::{PaintValue, SourceSpec};
use layers::mode::AnalysisMode;
use layers::payload::{
    AgentImagery, ClassicPayloads, ImageryPeriod, ImpactAssessment, PeriodImagery,
    TileLayerPayload,
};
use layers::surface::{RecordingSurface, SurfaceCall};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use streaming::coordinator::FetchTicket;
use streaming::fingerprint::Fingerprint;
use streaming::protocol::{AnalysisRequest, ClassicResult, ImageryRequest, ImpactRequest};

use crate::config::SessionConfig;
use crate::session::{Outbound, Session};

fn session() -> Session<RecordingSurface> {
    let mut s = Session::new(RecordingSurface::new(), SessionConfig::default());
    s.on_surface_ready();
    s
}

fn area(offset: f64) -> AreaOfInterest {
    AreaOfInterest::new([
        LonLat::new(100.0 + offset, 10.0),
        LonLat::new(101.0 + offset, 10.0),
        LonLat::new(101.0 + offset, 11.0),
        LonLat::new(100.0 + offset, 11.0),
    ])
    .unwrap()
}

fn year_2020() -> DateRange {
    DateRange::parse("2020-01-01", "2020-12-31").unwrap()
}

fn tile(url: &str) -> TileLayerPayload {
    TileLayerPayload::new(url, 256)
}

fn classic_result(prefix: &str) -> ClassicResult {
    ClassicResult {
        payloads: ClassicPayloads::from_layers([
            (LayerKind::Water, Some(tile(&format!("{prefix}/water/{{z}}/{{x}}/{{y}}")))),
            (LayerKind::FloodExtent, Some(tile(&format!("{prefix}/flood/{{z}}/{{x}}/{{y}}")))),
        ]),
        script: Some(format!("// {prefix}")),
    }
}

fn analysis_ticket(out: Vec<Outbound>) -> FetchTicket<AnalysisRequest> {
    match out.as_slice() {
        [Outbound::Analysis(t)] => t.clone(),
        other => panic!("expected one analysis request, got {other:?}"),
    }
}

fn imagery_ticket(out: Vec<Outbound>) -> FetchTicket<ImageryRequest> {
    match out.as_slice() {
        [Outbound::Imagery(t)] => t.clone(),
        other => panic!("expected one imagery request, got {other:?}"),
    }
}

fn impact_ticket(out: Vec<Outbound>) -> FetchTicket<ImpactRequest> {
    match out.as_slice() {
        [Outbound::Impact(t)] => t.clone(),
        other => panic!("expected one impact request, got {other:?}"),
    }
}

fn raster_url(s: &Session<RecordingSurface>, kind: LayerKind) -> Option<String> {
    match s.surface().source(&kind.source_id())? {
        SourceSpec::Raster { tiles, .. } => tiles.first().cloned(),
        SourceSpec::Geojson { .. } => None,
    }
}

fn agent_state(dates: [&str; 3], bounds: Option<BoundingBox>) -> AgentState {
    AgentState {
        event: Some("Henan floods".into()),
        pre_date: Some(dates[0].into()),
        peek_date: Some(dates[1].into()),
        after_date: Some(dates[2].into()),
        coordinates: Some(vec![113.6, 34.7]),
        bounds,
        ..Default::default()
    }
}

fn henan_box() -> Option<BoundingBox> {
    Some(BoundingBox::new(113.0, 34.0, 114.0, 35.0))
}

fn agent_session() -> Session<RecordingSurface> {
    let mut s = session();
    assert!(s.set_mode(AnalysisMode::Agent).is_empty());
    s
}

fn imagery() -> AgentImagery {
    let mut img = AgentImagery::default();
    for (period, name) in [
        (ImageryPeriod::Pre, "pre"),
        (ImageryPeriod::Peak, "peak"),
        (ImageryPeriod::Post, "post"),
    ] {
        img.periods.insert(
            period,
            PeriodImagery {
                sentinel2: Some(tile(&format!("https://ee/{name}/s2"))),
                sentinel1: Some(tile(&format!("https://ee/{name}/s1"))),
            },
        );
    }
    img.flood_detection = Some(tile("https://ee/fd"));
    img
}

#[test]
fn selecting_the_same_polygon_twice_fetches_once() {
    let mut s = session();
    s.set_dates(year_2020());
    assert_eq!(s.select(area(0.0)).len(), 1);
    assert!(s.select(area(0.0)).is_empty());
    assert_eq!(s.metrics().counter("fetch_issued"), 1);
    assert_eq!(s.metrics().counter("select_unchanged"), 1);
}

#[test]
fn historical_selection_applies_water_and_flood_extent() {
    let mut s = session();
    assert!(s.set_dates(year_2020()).is_empty());
    let ticket = analysis_ticket(s.select(area(0.0)));

    let expected = AnalysisRequest::new(
        area(0.0),
        year_2020(),
        None,
        AnalysisMode::Historical,
        vec![LayerKind::Water, LayerKind::FloodExtent],
    );
    assert_eq!(ticket.request, expected);
    assert_eq!(ticket.fingerprint, Fingerprint::of(&expected).unwrap());
    assert!(s.is_loading());

    s.on_analysis_result(&ticket, Ok::<_, String>(classic_result("https://gee/a")));
    assert!(!s.is_loading());
    assert!(s.registry().contains(LayerKind::Water));
    assert!(s.registry().contains(LayerKind::FloodExtent));
    assert!(!s.registry().contains(LayerKind::SoilTexture));
    assert_eq!(s.script(), Some("// https://gee/a"));
    assert_eq!(
        s.surface().paint("water-layer", "raster-opacity"),
        Some(&PaintValue::Number(0.8))
    );
}

#[test]
fn selection_waits_for_a_date_range() {
    let mut s = session();
    assert!(s.select(area(0.0)).is_empty());
    let ticket = analysis_ticket(s.set_dates(year_2020()));
    assert_eq!(ticket.request.polygon, area(0.0));
}

#[test]
fn superseded_result_never_reaches_the_map() {
    let mut s = session();
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));
    let b = analysis_ticket(s.select(area(5.0)));
    assert_ne!(a.fingerprint, b.fingerprint);

    s.surface_mut().take_calls();
    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));
    assert!(s.surface().calls().is_empty());
    assert!(!s.registry().contains(LayerKind::Water));
    assert_eq!(s.metrics().counter("stale_discarded"), 1);
    assert!(s.is_loading());

    s.on_analysis_result(&b, Ok::<_, String>(classic_result("https://gee/b")));
    assert_eq!(
        raster_url(&s, LayerKind::Water).as_deref(),
        Some("https://gee/b/water/{z}/{x}/{y}")
    );
}

#[test]
fn new_selection_tears_down_before_fetching() {
    let mut s = session();
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));
    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));
    s.surface_mut().take_calls();

    let out = s.select(area(5.0));
    assert_eq!(out.len(), 1);
    let calls = s.surface().calls().to_vec();
    assert!(calls.contains(&SurfaceCall::RemoveSource("water-source".into())));
    assert!(calls.contains(&SurfaceCall::RemoveSource("floodExtent-source".into())));
    assert!(!s.registry().contains(LayerKind::Water));
    assert_eq!(s.notices().iter().filter(|n| n.kind == "cleared").count(), 1);
}

#[test]
fn failure_keeps_layers_and_warns() {
    let mut s = session();
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));
    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));

    let again = analysis_ticket(s.submit());
    s.surface_mut().take_calls();
    s.on_analysis_result(&again, Err::<ClassicResult, _>("503 Service Unavailable"));

    assert!(s.surface().calls().is_empty());
    assert!(s.registry().contains(LayerKind::Water));
    assert_eq!(s.last_error(), Some("503 Service Unavailable"));
    assert!(s.notices().iter().any(|n| n.kind == "fetch_failed"));
}

#[test]
fn toggling_restores_configured_opacity_without_refetch() {
    let mut s = session();
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));
    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));
    s.set_opacity(LayerKind::Water, 0.35);

    assert!(s.toggle(LayerKind::Water).is_empty());
    assert_eq!(
        s.surface().paint("water-layer", "raster-opacity"),
        Some(&PaintValue::Number(0.0))
    );
    assert!(s.registry().contains(LayerKind::Water));

    assert!(s.toggle(LayerKind::Water).is_empty());
    assert_eq!(
        s.surface().paint("water-layer", "raster-opacity"),
        Some(&PaintValue::Number(0.35))
    );
    assert_eq!(s.metrics().counter("fetch_issued"), 1);
}

#[test]
fn mode_change_discards_in_flight_result() {
    let mut s = session();
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));

    let hotspot = analysis_ticket(s.set_mode(AnalysisMode::Hotspot));
    assert_eq!(hotspot.request.layers.len(), 6);

    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));
    assert!(!s.registry().contains(LayerKind::Water));
    assert_eq!(s.visibility().get(LayerKind::Water).opacity, 0.8);
}

#[test]
fn operations_before_surface_ready_are_replayed() {
    let mut s = Session::new(RecordingSurface::new(), SessionConfig::default());
    s.set_dates(year_2020());
    let a = analysis_ticket(s.select(area(0.0)));
    s.on_analysis_result(&a, Ok::<_, String>(classic_result("https://gee/a")));
    assert!(s.surface().calls().is_empty());

    s.on_surface_ready();
    assert!(s.surface().has_source("water-source"));
    assert!(s.surface().has_source("boundaryGeometry-source"));
    assert_eq!(s.registry().failures(), 0);
}

#[test]
fn clicking_a_feature_selects_it() {
    let mut s = session();
    s.set_dates(year_2020());
    let layer = s.config().interactive_layer.clone();
    s.surface_mut().set_features(
        layer,
        vec![json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[
                [100.0, 10.0], [101.0, 10.0], [101.0, 11.0], [100.0, 11.0], [100.0, 10.0]
            ]]}
        })],
    );
    let ticket = analysis_ticket(s.click(LonLat::new(100.5, 10.5)));
    assert_eq!(ticket.request.polygon, area(0.0));
    assert!(s.click(LonLat::new(100.5, 10.5)).is_empty());
}

#[test]
fn agent_imagery_fires_once_per_date_triple() {
    let mut s = agent_session();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];

    let t = imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));
    assert_eq!(t.request.longitude, 113.6);
    assert!(s.on_agent_state(agent_state(dates, henan_box())).is_empty());

    let moved = ["2021-07-10", "2021-07-21", "2021-07-30"];
    imagery_ticket(s.on_agent_state(agent_state(moved, henan_box())));
    assert!(s.on_agent_state(agent_state(moved, henan_box())).is_empty());
    assert_eq!(s.metrics().counter("fetch_issued"), 2);
}

#[test]
fn agent_waits_for_geometry() {
    let mut s = agent_session();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    assert!(s.on_agent_state(agent_state(dates, None)).is_empty());

    let mut with_geometry = agent_state(dates, None);
    with_geometry.geojson = Some(json!({
        "type": "Polygon",
        "coordinates": [[[113.0, 34.0], [114.0, 34.0], [114.0, 35.0], [113.0, 34.0]]]
    }));
    let t = imagery_ticket(s.on_agent_state(with_geometry));
    assert!(t.request.geojson.is_some());
    assert!(s.surface().has_source("boundaryGeometry-source"));
}

#[test]
fn agent_recentres_on_centroid() {
    let mut s = agent_session();
    s.surface_mut().take_calls();
    s.on_agent_state(agent_state(["", "", ""], None));
    assert_eq!(
        s.surface().calls(),
        &[SurfaceCall::FlyTo {
            center: LonLat::new(113.6, 34.7),
            zoom: 8.0
        }]
    );
}

#[test]
fn agent_imagery_follows_selected_period() {
    let mut s = agent_session();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    let t = imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));
    s.on_imagery_result(&t, Ok::<_, String>(imagery()));

    assert_eq!(raster_url(&s, LayerKind::Sentinel2).as_deref(), Some("https://ee/peak/s2"));
    s.set_period(ImageryPeriod::Pre);
    assert_eq!(raster_url(&s, LayerKind::Sentinel2).as_deref(), Some("https://ee/pre/s2"));
    assert_eq!(raster_url(&s, LayerKind::FloodDetection).as_deref(), Some("https://ee/fd"));

    s.toggle(LayerKind::Sentinel1);
    assert!(!s.surface().has_source("sentinel1-source"));
    assert_eq!(s.registry().failures(), 0);
}

#[test]
fn failed_imagery_can_be_retried_by_the_next_push() {
    let mut s = agent_session();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    let t = imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));
    s.on_imagery_result(&t, Err::<AgentImagery, _>("GEE not initialized"));
    assert!(s.notices().iter().any(|n| n.kind == "fetch_failed"));

    imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));
}

#[test]
fn impact_is_fetched_when_an_impact_layer_is_enabled() {
    let mut s = agent_session();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));

    let t = impact_ticket(s.toggle(LayerKind::Population));
    assert_eq!(t.request.peek_date.to_string(), "2021-07-20");
    // Second impact layer: request already in flight.
    assert!(s.toggle(LayerKind::Urban).is_empty());

    let mut assessment = ImpactAssessment::default();
    assessment.layers.insert(LayerKind::Population, tile("https://ee/pop"));
    assessment.statistics.flood_area_km2 = Some(412.5);
    s.on_impact_result(&t, Ok::<_, String>(assessment));

    assert!(s.surface().has_source("population-source"));
    assert_eq!(s.impact_statistics().and_then(|st| st.flood_area_km2), Some(412.5));
    assert!(s.toggle(LayerKind::Landcover).is_empty());
}

#[test]
fn confirmation_edit_and_single_resolution() {
    let mut s = agent_session();
    let Value::Object(data) = json!({"event": "X", "location": "Zhengzhou"}) else {
        unreachable!()
    };
    let mut rx = s
        .on_agent_interrupt(InterruptEvent {
            kind: "confirm_flood_event".into(),
            message: "Please confirm".into(),
            data,
            resume_token: "r1".into(),
        })
        .unwrap();

    let view = s.confirmation().unwrap();
    assert_eq!(view.fields[0], ("event".to_string(), json!("X")));

    s.edit_confirmation("event", json!("X (2021)")).unwrap();
    s.confirm().unwrap();
    assert_eq!(s.confirm(), Err(InterruptError::NothingPending));
    assert!(s.confirmation().is_none());

    let resume = rx.try_recv().unwrap();
    assert_eq!(resume.token, "r1");
    assert_eq!(resume.value, json!({"event": "X (2021)", "location": "Zhengzhou"}));
    assert!(rx.try_recv().is_err());
}

#[test]
fn suspended_agent_does_not_fetch_or_recentre() {
    let mut s = agent_session();
    let _rx = s
        .on_agent_interrupt(InterruptEvent {
            kind: "confirm_flood_event".into(),
            message: String::new(),
            data: Default::default(),
            resume_token: "r2".into(),
        })
        .unwrap();
    s.surface_mut().take_calls();

    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    assert!(s.on_agent_state(agent_state(dates, henan_box())).is_empty());
    assert!(s.surface().calls().is_empty());

    s.cancel().unwrap();
    imagery_ticket(s.on_agent_state(agent_state(dates, henan_box())));
}

#[test]
fn resolved_confirmation_leaves_the_suspended_state_inert() {
    let mut s = agent_session();
    let _rx = s
        .on_agent_interrupt(InterruptEvent {
            kind: "confirm_flood_event".into(),
            message: String::new(),
            data: Default::default(),
            resume_token: "r3".into(),
        })
        .unwrap();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    assert!(s.on_agent_state(agent_state(dates, henan_box())).is_empty());
    s.confirm().unwrap();

    assert!(s.toggle(LayerKind::Population).is_empty());
    assert!(s.set_mode(AnalysisMode::Historical).is_empty());
    assert!(s.set_mode(AnalysisMode::Agent).is_empty());
    assert_eq!(s.metrics().counter("fetch_issued"), 0);

    let out = s.on_agent_state(agent_state(dates, henan_box()));
    assert!(matches!(out.as_slice(), [Outbound::Imagery(_), Outbound::Impact(_)]));
}

#[test]
fn cancelled_confirmation_also_waits_for_a_fresh_push() {
    let mut s = agent_session();
    let _rx = s
        .on_agent_interrupt(InterruptEvent {
            kind: "confirm_flood_event".into(),
            message: String::new(),
            data: Default::default(),
            resume_token: "r4".into(),
        })
        .unwrap();
    let dates = ["2021-07-10", "2021-07-20", "2021-07-30"];
    s.on_agent_state(agent_state(dates, henan_box()));
    s.cancel().unwrap();

    assert!(s.toggle(LayerKind::Urban).is_empty());
    s.set_mode(AnalysisMode::Hotspot);
    assert!(s.set_mode(AnalysisMode::Agent).is_empty());
}
