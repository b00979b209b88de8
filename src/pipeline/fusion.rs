//! Verdict fusion: blends the reputation lookup and the local model into one
//! verdict and a 0-100 intensity score.
//!
//! Evaluation order:
//! 1. reputation safety override (can only force CLEAN),
//! 2. intensity thresholds.
//!
//! Failed or inconclusive sources (ERROR, CONNECTION_FAILED, NOT_FOUND)
//! contribute zero evidence. When both sources fail the result is intensity 0
//! and CLEAN; [`FusedVerdict::degraded`] marks that case so callers can tell
//! "no evidence of harm" from "no evidence at all".

use crate::core::types::{
    FusedVerdict, LocalInferenceReport, LocalVerdict, ReputationReport, ReputationVerdict,
    ThreatVerdict,
};

// Tunable policy.

/// Flagging engines at which external evidence saturates.
pub const VT_SATURATION_ENGINES: f64 = 5.0;
/// Reputation strictly above this, with zero malicious votes, forces CLEAN.
pub const REPUTATION_OVERRIDE_MIN: i64 = 100;
pub const REPUTATION_WEIGHT: f64 = 0.6;
pub const LOCAL_WEIGHT: f64 = 0.4;
pub const MALICIOUS_INTENSITY: f64 = 75.0;
pub const SUSPICIOUS_INTENSITY: f64 = 40.0;

/// Share of saturation reached by malicious engine votes, in [0, 1].
pub fn vt_ratio(report: &ReputationReport) -> f64 {
    if report.total_engines.unwrap_or(0) == 0 {
        return 0.0;
    }
    let malicious = report.malicious_count.unwrap_or(0) as f64;
    (malicious / VT_SATURATION_ENGINES).min(1.0)
}

/// Local maliciousness probability, or 0 when the model did not produce one.
pub fn ml_probability(report: &LocalInferenceReport) -> f64 {
    match report.verdict {
        LocalVerdict::Error => 0.0,
        _ if report.confidence_score.is_finite() => report.confidence_score.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Weighted blend as a percentage, rounded to two decimals.
pub fn intensity(vt_ratio: f64, ml_prob: f64) -> f64 {
    let raw = (vt_ratio * REPUTATION_WEIGHT + ml_prob * LOCAL_WEIGHT) * 100.0;
    ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

pub fn verdict_for_intensity(intensity: f64) -> ThreatVerdict {
    if intensity >= MALICIOUS_INTENSITY {
        ThreatVerdict::Malicious
    } else if intensity >= SUSPICIOUS_INTENSITY {
        ThreatVerdict::Suspicious
    } else {
        ThreatVerdict::Clean
    }
}

/// High external trust with no malicious votes vetoes a positive verdict.
pub fn reputation_override(report: &ReputationReport) -> bool {
    match report.reputation {
        Some(score) => score > REPUTATION_OVERRIDE_MIN && report.malicious_count.unwrap_or(0) == 0,
        None => false,
    }
}

pub fn fuse(reputation: ReputationReport, local: LocalInferenceReport) -> FusedVerdict {
    let ratio = vt_ratio(&reputation);
    let prob = ml_probability(&local);
    let score = intensity(ratio, prob);
    let by_score = verdict_for_intensity(score);

    let mut rule_trace = vec![format!(
        "intensity:{:.2} (vt_ratio={:.2} x {}, ml_prob={:.4} x {})",
        score, ratio, REPUTATION_WEIGHT, prob, LOCAL_WEIGHT
    )];

    let override_applied = reputation_override(&reputation);
    let verdict = if override_applied {
        rule_trace.push(format!(
            "override:reputation {} > {} with 0 malicious engines -> CLEAN (score alone: {:?})",
            reputation.reputation.unwrap_or_default(),
            REPUTATION_OVERRIDE_MIN,
            by_score
        ));
        ThreatVerdict::Clean
    } else {
        rule_trace.push(format!(
            "threshold:{:?} (malicious>={}, suspicious>={})",
            by_score, MALICIOUS_INTENSITY, SUSPICIOUS_INTENSITY
        ));
        by_score
    };

    let remote_failed = !reputation.verdict.is_conclusive();
    let local_failed = local.verdict == LocalVerdict::Error;
    if remote_failed {
        rule_trace.push(format!("source:reputation unavailable ({:?})", reputation.verdict));
    } else if reputation.verdict == ReputationVerdict::NotFound {
        rule_trace.push("source:reputation has no record; treated as no evidence".to_string());
    }
    if local_failed {
        rule_trace.push("source:local model unavailable".to_string());
    }
    let degraded = remote_failed && local_failed;
    if degraded {
        rule_trace.push("degraded: no usable evidence from either source; CLEAN means unknown".to_string());
    }

    FusedVerdict {
        verdict,
        intensity: score,
        reputation_report: reputation,
        local_report: local,
        override_applied,
        degraded,
        rule_trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FeatureImpacts;

    fn remote(malicious: u64, total: u64, reputation: i64) -> ReputationReport {
        ReputationReport {
            verdict: if malicious > 0 {
                ReputationVerdict::Malicious
            } else {
                ReputationVerdict::Clean
            },
            malicious_count: Some(malicious),
            suspicious_count: Some(0),
            total_engines: Some(total),
            reputation: Some(reputation),
            message: None,
            engine: None,
        }
    }

    fn local(prob: f64) -> LocalInferenceReport {
        LocalInferenceReport {
            verdict: crate::modules::inference::verdict_for_probability(prob),
            confidence_score: prob,
            feature_impacts: Some(FeatureImpacts::default()),
            message: None,
            engine: None,
        }
    }

    #[test]
    fn saturated_votes_and_confident_model_are_malicious() {
        let fused = fuse(remote(5, 70, 0), local(0.9));
        assert_eq!(fused.intensity, 96.0);
        assert_eq!(fused.verdict, ThreatVerdict::Malicious);
        assert!(!fused.override_applied);
        assert!(!fused.degraded);
    }

    #[test]
    fn high_reputation_overrides_confident_model() {
        let fused = fuse(remote(0, 70, 200), local(0.95));
        assert_eq!(fused.verdict, ThreatVerdict::Clean);
        assert!(fused.override_applied);
        assert_eq!(fused.intensity, 38.0);
    }

    #[test]
    fn override_applies_for_any_local_confidence() {
        for prob in [0.0, 0.5, 0.99, 1.0] {
            let fused = fuse(remote(0, 70, 150), local(prob));
            assert_eq!(fused.verdict, ThreatVerdict::Clean);
        }
    }

    #[test]
    fn override_needs_zero_malicious_votes_and_strict_threshold() {
        let fused = fuse(remote(5, 70, 500), local(0.9));
        assert!(!fused.override_applied);
        assert_eq!(fused.verdict, ThreatVerdict::Malicious);

        assert!(!reputation_override(&remote(0, 70, 100)));
        assert!(reputation_override(&remote(0, 70, 101)));
    }

    #[test]
    fn override_never_escalates() {
        let fused = fuse(remote(0, 70, 300), local(0.1));
        assert_eq!(fused.verdict, ThreatVerdict::Clean);
        assert_eq!(verdict_for_intensity(fused.intensity), ThreatVerdict::Clean);
    }

    #[test]
    fn threshold_boundaries() {
        assert_eq!(verdict_for_intensity(75.0), ThreatVerdict::Malicious);
        assert_eq!(verdict_for_intensity(74.99), ThreatVerdict::Suspicious);
        assert_eq!(verdict_for_intensity(40.0), ThreatVerdict::Suspicious);
        assert_eq!(verdict_for_intensity(39.99), ThreatVerdict::Clean);
    }

    #[test]
    fn boundary_scores_reach_fusion_exactly() {
        // 1.0 * 60 + 0.375 * 40 = 75
        let fused = fuse(remote(5, 70, 0), local(0.375));
        assert_eq!(fused.intensity, 75.0);
        assert_eq!(fused.verdict, ThreatVerdict::Malicious);
        // 0 * 60 + 1.0 * 40 = 40
        let fused = fuse(remote(0, 70, 0), local(1.0));
        assert_eq!(fused.intensity, 40.0);
        assert_eq!(fused.verdict, ThreatVerdict::Suspicious);
    }

    #[test]
    fn total_failure_degrades_to_clean() {
        let reputation = ReputationReport::failure(ReputationVerdict::Error, "API Key missing");
        let local = LocalInferenceReport::failure("ML model not loaded");
        let fused = fuse(reputation, local);
        assert_eq!(fused.intensity, 0.0);
        assert_eq!(fused.verdict, ThreatVerdict::Clean);
        assert!(fused.degraded);
        assert!(fused.rule_trace.iter().any(|t| t.starts_with("degraded")));
    }

    #[test]
    fn connection_failure_and_not_found_contribute_nothing() {
        let failed = ReputationReport::failure(ReputationVerdict::ConnectionFailed, "timed out");
        assert_eq!(vt_ratio(&failed), 0.0);
        let missing = ReputationReport::failure(ReputationVerdict::NotFound, "URL not in VT database.");
        let fused = fuse(missing, local(0.9));
        assert_eq!(fused.intensity, 36.0);
        assert_eq!(fused.verdict, ThreatVerdict::Clean);
        assert!(!fused.degraded);
    }

    #[test]
    fn errored_local_report_counts_as_zero_even_with_score() {
        let mut broken = LocalInferenceReport::failure("Inference failed");
        broken.confidence_score = 0.99;
        assert_eq!(ml_probability(&broken), 0.0);
    }

    #[test]
    fn zero_engines_means_zero_ratio() {
        assert_eq!(vt_ratio(&remote(3, 0, 0)), 0.0);
        assert_eq!(vt_ratio(&remote(3, 10, 0)), 0.6);
        assert_eq!(vt_ratio(&remote(40, 70, 0)), 1.0);
    }

    #[test]
    fn intensity_is_bounded_and_monotonic() {
        let probs: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
        for malicious in 0..=7u64 {
            let mut last = -1.0;
            for &p in &probs {
                let score = fuse(remote(malicious, 70, 0), local(p)).intensity;
                assert!((0.0..=100.0).contains(&score));
                assert!(score >= last);
                last = score;
            }
        }
        for &p in &probs {
            let mut last = -1.0;
            for malicious in 0..=7u64 {
                let score = fuse(remote(malicious, 70, 0), local(p)).intensity;
                assert!(score >= last);
                last = score;
            }
        }
    }
}
