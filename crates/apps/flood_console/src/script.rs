//! Session scripts: one JSON command per line, `#` starts a comment line.
//!
//! ```text
//! {"cmd": "surface_ready"}
//! {"cmd": "dates", "start": "2021-07-01", "end": "2021-07-31"}
//! {"cmd": "select", "polygon": [[113.0, 34.0], [114.0, 34.0], [114.0, 35.0]]}
//! {"cmd": "wait"}
//! ```

use agent::interrupt::InterruptEvent;
use agent::state::AgentState;
use foundation::area::AreaOfInterest;
use foundation::bounds::LonLat;
use layers::kind::LayerKind;
use layers::mode::AnalysisMode;
use layers::payload::ImageryPeriod;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ScriptCommand {
    SurfaceReady,
    Select {
        polygon: AreaOfInterest,
    },
    /// Registers clickable features, then clicks at `at`.
    Click {
        at: LonLat,
        #[serde(default)]
        features: Vec<Value>,
    },
    Mode {
        mode: AnalysisMode,
    },
    Dates {
        start: String,
        end: String,
    },
    YearWindow {
        start_year: Option<i32>,
        end_year: Option<i32>,
    },
    Submit,
    Toggle {
        layer: LayerKind,
    },
    Opacity {
        layer: LayerKind,
        value: f64,
    },
    Period {
        period: ImageryPeriod,
    },
    AgentState {
        state: AgentState,
    },
    Interrupt {
        event: InterruptEvent,
    },
    Edit {
        field: String,
        value: Value,
    },
    Confirm,
    Cancel,
    /// Blocks until every outstanding request has been settled.
    Wait,
}

#[derive(Debug)]
pub struct ScriptError {
    pub line: usize,
    pub source: serde_json::Error,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "script line {}: {}", self.line, self.source)
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub fn parse_script(text: &str) -> Result<Vec<ScriptCommand>, ScriptError> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, raw)| serde_json::from_str(raw).map_err(|source| ScriptError { line, source }))
        .collect()
}

#[cfg(test)]
mod tests {
    use layers::kind::LayerKind;
    use layers::mode::AnalysisMode;
    use pretty_assertions::assert_eq;

    use super::{parse_script, ScriptCommand};

    #[test]
    fn parses_commands_and_skips_comments() {
        let script = r#"
            # warm up
            {"cmd": "surface_ready"}
            {"cmd": "mode", "mode": "hotspot"}
            {"cmd": "year_window", "start_year": 2015, "end_year": 2020}
            {"cmd": "toggle", "layer": "floodExtent"}
            {"cmd": "wait"}
        "#;
        let cmds = parse_script(script).unwrap();
        assert_eq!(
            cmds,
            vec![
                ScriptCommand::SurfaceReady,
                ScriptCommand::Mode {
                    mode: AnalysisMode::Hotspot
                },
                ScriptCommand::YearWindow {
                    start_year: Some(2015),
                    end_year: Some(2020)
                },
                ScriptCommand::Toggle {
                    layer: LayerKind::FloodExtent
                },
                ScriptCommand::Wait,
            ]
        );
    }

    #[test]
    fn select_polygon_is_validated() {
        let ok = parse_script(r#"{"cmd": "select", "polygon": [[0, 0], [1, 0], [1, 1]]}"#).unwrap();
        assert!(matches!(ok[0], ScriptCommand::Select { .. }));

        let script = "{\"cmd\": \"submit\"}\n{\"cmd\": \"select\", \"polygon\": [[0, 0], [1, 0]]}";
        let err = parse_script(script).unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn interrupt_uses_the_agent_wire_shape() {
        let line = serde_json::json!({
            "cmd": "interrupt",
            "event": {
                "type": "confirm_flood_event",
                "message": "ok?",
                "data": {"event": "X"},
                "resume_token": "t"
            }
        });
        let cmds = parse_script(&line.to_string()).unwrap();
        let ScriptCommand::Interrupt { event } = &cmds[0] else {
            panic!("expected interrupt, got {cmds:?}");
        };
        assert_eq!(event.kind, "confirm_flood_event");
        assert_eq!(event.data["event"], "X");
    }
}
