//! Serializable compile summary for UI and tooling consumers.

use compiscript_base::Diagnostic;
use serde::{Deserialize, Serialize};

/// The result of one compilation: either a diagnostic list, or the
/// lowered TAC and MIPS listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileReport {
    /// Rendered diagnostics (`Line l:c - message`), empty on success.
    pub diagnostics: Vec<String>,
    /// TAC listing; absent when diagnostics are present.
    pub tac: Option<String>,
    /// MIPS listing; absent when diagnostics are present.
    pub mips: Option<String>,
}

impl CompileReport {
    pub fn success(tac: String, mips: String) -> Self {
        Self { diagnostics: Vec::new(), tac: Some(tac), mips: Some(mips) }
    }

    pub fn failure(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics: diagnostics.iter().map(|d| d.to_string()).collect(),
            tac: None,
            mips: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiscript_base::Loc;

    #[test]
    fn failure_report_renders_diagnostics() {
        let report = CompileReport::failure(vec![Diagnostic::new(
            "Variable 'x' not declared",
            Loc::new(2, 4),
        )]);
        assert!(!report.is_success());
        assert_eq!(report.diagnostics, ["Line 2:4 - Variable 'x' not declared"]);
        assert!(report.tac.is_none());
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = CompileReport::success("FUNCTION main:\n".into(), ".data\n".into());
        let json = serde_json::to_string(&report).expect("serialize");
        let back: CompileReport = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_success());
        assert_eq!(back.tac.as_deref(), Some("FUNCTION main:\n"));
    }
}
