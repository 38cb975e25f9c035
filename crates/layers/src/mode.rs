use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Historical,
    Hotspot,
    Agent,
}

impl AnalysisMode {
    /// Historical and hotspot modes are driven by direct user parameters and
    /// render the classic thematic layers.
    pub fn is_classic(self) -> bool {
        !matches!(self, AnalysisMode::Agent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Historical => "historical",
            AnalysisMode::Hotspot => "hotspot",
            AnalysisMode::Agent => "agent",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
