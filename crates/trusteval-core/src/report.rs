//! Run report: the structured record and its HTML rendering.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provenance::{ProvenanceMode, ProvenanceRecord};
use crate::scoring::Metrics;

/// Final report for an evaluation run.
///
/// Field order and names are the report's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_name: String,

    /// UTC date of the run, `YYYY-MM-DD`
    pub timestamp: NaiveDate,

    #[serde(rename = "AEM")]
    pub aem: f64,

    #[serde(rename = "TokenF1")]
    pub token_f1: f64,

    #[serde(rename = "SpanF1")]
    pub span_f1: f64,

    #[serde(rename = "PI")]
    pub pi: f64,

    pub provenance: ProvenanceMode,
    pub manifest_hash_ok: bool,
    pub signature_verified: bool,
}

impl Report {
    pub fn new(
        run_name: impl Into<String>,
        date: NaiveDate,
        metrics: Metrics,
        provenance: &ProvenanceRecord,
    ) -> Self {
        Self {
            run_name: run_name.into(),
            timestamp: date,
            aem: metrics.aem,
            token_f1: metrics.token_f1,
            span_f1: metrics.span_f1,
            pi: provenance.indicator(),
            provenance: provenance.mode,
            manifest_hash_ok: provenance.manifest_hash_ok(),
            signature_verified: provenance.signature_verified(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Standalone HTML page with the same fields.
    ///
    /// Metrics keep a decimal point (`1.0`, not `1`).
    pub fn to_html(&self) -> String {
        let run = escape_html(&self.run_name);
        format!(
            r#"<!doctype html>
<html><head><meta charset="utf-8"><title>TrustEval Report: {run}</title>
<style>body{{font-family:system-ui, -apple-system, Segoe UI, Roboto, sans-serif; padding:24px;}}
table{{border-collapse:collapse}} th,td{{border:1px solid #ddd; padding:8px}}</style></head>
<body>
<h1>TrustEval Report</h1>
<p><b>Run:</b> {run} &nbsp; <b>Date (UTC):</b> {date}</p>
<table>
<tr><th>AEM</th><th>TokenF1</th><th>SpanF1</th><th>PI</th></tr>
<tr><td>{aem:?}</td><td>{token_f1:?}</td><td>{span_f1:?}</td><td>{pi:?}</td></tr>
</table>
<p><b>Provenance:</b> {mode} &nbsp; | &nbsp; <b>manifest_hash_ok:</b> {hash_ok} &nbsp; | &nbsp; <b>signature_verified:</b> {sig_ok}</p>
</body></html>
"#,
            run = run,
            date = self.timestamp.format("%Y-%m-%d"),
            aem = self.aem,
            token_f1 = self.token_f1,
            span_f1 = self.span_f1,
            pi = self.pi,
            mode = self.provenance,
            hash_ok = self.manifest_hash_ok,
            sig_ok = self.signature_verified,
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): AEM={:.4} TokenF1={:.4} SpanF1={:.4} PI={:.1} [{} hash_ok={} signature_verified={}]",
            self.run_name,
            self.timestamp.format("%Y-%m-%d"),
            self.aem,
            self.token_f1,
            self.span_f1,
            self.pi,
            self.provenance,
            self.manifest_hash_ok,
            self.signature_verified,
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            run_name: "baseline".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            aem: 0.5,
            token_f1: 0.5,
            span_f1: 0.5,
            pi: 0.5,
            provenance: ProvenanceMode::Derived,
            manifest_hash_ok: true,
            signature_verified: false,
        }
    }

    #[test]
    fn test_json_field_names_and_order() {
        let json = sample().to_json().unwrap();
        let keys: Vec<&str> = [
            "run_name",
            "timestamp",
            "AEM",
            "TokenF1",
            "SpanF1",
            "PI",
            "provenance",
            "manifest_hash_ok",
            "signature_verified",
        ]
        .to_vec();

        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["timestamp"], "2025-03-14");
        assert_eq!(value["provenance"], "DERIVED");
        assert_eq!(value["PI"], 0.5);
    }

    #[test]
    fn test_html_contains_metrics() {
        let html = sample().to_html();
        assert!(html.contains("<b>Run:</b> baseline"));
        assert!(html.contains("<b>Date (UTC):</b> 2025-03-14"));
        assert!(html.contains("<td>0.5</td>"));
        assert!(html.contains("<b>Provenance:</b> DERIVED"));
    }

    #[test]
    fn test_html_whole_numbers_keep_decimal_point() {
        let mut report = sample();
        report.aem = 0.0;
        report.token_f1 = 1.0;
        report.span_f1 = 0.3333;
        report.pi = 1.0;
        let html = report.to_html();
        assert!(html.contains("<tr><td>0.0</td><td>1.0</td><td>0.3333</td><td>1.0</td></tr>"));
    }

    #[test]
    fn test_html_escapes_run_name() {
        let mut report = sample();
        report.run_name = "<script>&".to_string();
        let html = report.to_html();
        assert!(html.contains("&lt;script&gt;&amp;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_display_summary() {
        let line = sample().to_string();
        assert_eq!(
            line,
            "baseline (2025-03-14): AEM=0.5000 TokenF1=0.5000 SpanF1=0.5000 PI=0.5 [DERIVED hash_ok=true signature_verified=false]"
        );
    }
}
