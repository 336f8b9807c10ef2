//! ---
//! iop_section: "05-verification-suites"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "Run reports in text and JSON form."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use iop_logging::CheckOutcomeKind;
use serde::Serialize;
use strum::{Display, EnumString};

/// Output format for a finished report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    pub suite: String,
    pub check: String,
    pub outcome: CheckOutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errored
    }
}

/// Every check record of one run against one server.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: Summary,
    pub records: Vec<CheckRecord>,
}

impl Report {
    pub fn new(server: impl Into<String>, user: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            server: server.into(),
            user: user.map(str::to_owned),
            started_at: now,
            finished_at: now,
            summary: Summary::default(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: CheckRecord) {
        match record.outcome {
            CheckOutcomeKind::Passed => self.summary.passed += 1,
            CheckOutcomeKind::Failed => self.summary.failed += 1,
            CheckOutcomeKind::Skipped => self.summary.skipped += 1,
            CheckOutcomeKind::Errored => self.summary.errored += 1,
        }
        self.records.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// True when nothing failed or errored.
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }

    pub fn records_with(&self, outcome: CheckOutcomeKind) -> impl Iterator<Item = &CheckRecord> {
        self.records
            .iter()
            .filter(move |record| record.outcome == outcome)
    }

    pub fn render(&self, format: ReportFormat) -> serde_json::Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "IOP deployment checks on {} ({})",
            self.server,
            self.user.as_deref().unwrap_or("rootful")
        );
        let mut current_suite = "";
        for record in &self.records {
            if record.suite != current_suite {
                current_suite = record.suite.as_str();
                let _ = writeln!(out, "\n[{}]", current_suite);
            }
            let _ = write!(
                out,
                "  {:<8} {} ({}ms)",
                record.outcome.as_str().to_uppercase(),
                record.check,
                record.duration_ms
            );
            match &record.message {
                Some(message) => {
                    let _ = writeln!(out, ": {}", message);
                }
                None => out.push('\n'),
            }
        }
        let elapsed = self.finished_at - self.started_at;
        let _ = writeln!(
            out,
            "\n{} checks: {} passed, {} failed, {} errored, {} skipped in {:.1}s",
            self.summary.total(),
            self.summary.passed,
            self.summary.failed,
            self.summary.errored,
            self.summary.skipped,
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(suite: &str, check: &str, outcome: CheckOutcomeKind, message: Option<&str>) -> CheckRecord {
        CheckRecord {
            suite: suite.into(),
            check: check.into(),
            outcome,
            message: message.map(str::to_owned),
            duration_ms: 3,
        }
    }

    #[test]
    fn summary_tracks_outcomes() {
        let mut report = Report::new("quadlet", Some("foremanctl"));
        report.push(record("kafka", "kafka_service", CheckOutcomeKind::Passed, None));
        report.push(record("network", "dns_resolution", CheckOutcomeKind::Skipped, Some("rootful")));
        assert!(report.is_success());
        report.push(record(
            "kafka",
            "kafka_topics",
            CheckOutcomeKind::Failed,
            Some("profile platform is missing platform.inventory.events"),
        ));
        report.finish();
        assert!(!report.is_success());
        assert_eq!(report.summary.total(), 3);
        assert_eq!(report.records_with(CheckOutcomeKind::Failed).count(), 1);

        let text = report.to_text();
        assert!(text.contains("[kafka]"));
        assert!(text.contains("FAILED   kafka_topics"));
        assert!(text.contains("1 passed, 1 failed, 0 errored, 1 skipped"));
    }

    #[test]
    fn json_uses_lowercase_outcomes() {
        let mut report = Report::new("quadlet", None);
        report.push(record("gateway", "gateway_port", CheckOutcomeKind::Errored, Some("ssh")));
        let json: serde_json::Value =
            serde_json::from_str(&report.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["records"][0]["outcome"], "errored");
        assert_eq!(json["summary"]["errored"], 1);
        assert!(json.get("user").is_none());
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::Text.to_string(), "text");
        assert!("yaml".parse::<ReportFormat>().is_err());
    }
}
