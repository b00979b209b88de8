use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::core::error::PhishyError;
use crate::core::types::{AnalysisResponse, BatchEntry, LocalVerdict, ThreatVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Markdown,
}

pub fn render_results(entries: &[BatchEntry], format: OutputFormat) -> Result<String, PhishyError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
        OutputFormat::Jsonl => render_jsonl(entries),
        OutputFormat::Markdown => Ok(render_markdown(entries)),
    }
}

pub fn write_results(
    entries: &[BatchEntry],
    format: OutputFormat,
    path: &Path,
) -> Result<(), PhishyError> {
    let body = render_results(entries, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

fn render_jsonl(entries: &[BatchEntry]) -> Result<String, PhishyError> {
    let mut lines = String::new();
    for entry in entries {
        lines.push_str(&serde_json::to_string(entry)?);
        lines.push('\n');
    }
    Ok(lines)
}

fn render_markdown(entries: &[BatchEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Phishy URL Analysis\n\n");
    out.push_str(&format!("Generated: {}\n\n", Utc::now().to_rfc3339()));
    if entries.is_empty() {
        out.push_str("_No URLs analysed._\n");
        return out;
    }

    let (mut malicious, mut suspicious, mut clean, mut failed) = (0, 0, 0, 0);
    for entry in entries {
        match entry {
            BatchEntry::Analyzed(r) => match r.final_verdict {
                ThreatVerdict::Malicious => malicious += 1,
                ThreatVerdict::Suspicious => suspicious += 1,
                ThreatVerdict::Clean => clean += 1,
            },
            BatchEntry::Failed(_) => failed += 1,
        }
    }
    out.push_str(&format!(
        "- Malicious: {}\n- Suspicious: {}\n- Clean: {}\n- Failed: {}\n\n",
        malicious, suspicious, clean, failed
    ));

    out.push_str("| URL | Verdict | Intensity | VirusTotal | Local model | Top feature |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for entry in entries {
        match entry {
            BatchEntry::Analyzed(r) => out.push_str(&markdown_row(r)),
            BatchEntry::Failed(e) => out.push_str(&format!(
                "| {} | FAILED | - | - | - | {} |\n",
                escape_cell(&e.url),
                escape_cell(&e.detail)
            )),
        }
    }
    out
}

fn markdown_row(r: &AnalysisResponse) -> String {
    let intel = &r.hybrid_report.global_threat_intel;
    let local = &r.hybrid_report.local_ml_engine;
    let vt = match intel.malicious_count.zip(intel.total_engines) {
        Some((m, t)) => format!("{:?} ({}/{})", intel.verdict, m, t),
        None => format!("{:?}", intel.verdict),
    };
    let ml = match local.verdict {
        LocalVerdict::Error => "Error".to_string(),
        v => format!("{:?} ({:.4})", v, local.confidence_score),
    };
    let top = local
        .feature_impacts
        .as_ref()
        .and_then(|i| i.strongest_positive())
        .map(|(name, v)| format!("{} (+{:.4})", name, v))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "| {} | {:?} | {} | {} | {} | {} |\n",
        escape_cell(&r.url),
        r.final_verdict,
        r.malicious_intensity,
        vt,
        ml,
        top
    )
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
