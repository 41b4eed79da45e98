//! Time-aware SecScore computation: the Asymmetric Laplace CDF, signal
//! blending, and the ordered human-readable explanation.

use chrono::{DateTime, Utc};

use crate::types::{ExplanationEntry, ModelParams, ScoreComputation};

/// Additive bump applied when EPSS is present, multiplied by `epss.score`.
pub const EPSS_BLEND_WEIGHT: f64 = 2.5;
/// Additive bump applied when at least one piece of exploit evidence exists.
pub const POC_BONUS_MAX: f64 = 1.0;
/// A KEV-listed CVE is never reported below this score.
pub const KEV_MIN_FLOOR: f64 = 8.0;
/// `eMin` used for any CVSS version that isn't 4.x.
const E_MIN_DEFAULT: f64 = 0.91;
const E_MAX: f64 = 1.0;

/// Rounds half-away-from-zero to `decimals` places, nudged by a tiny bias
/// in the direction of the value to avoid binary-float representation
/// artifacts landing a true `.x5` just under the rounding boundary.
pub fn round_half_away_from_zero(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let bias = if value >= 0.0 { 1e-9 } else { -1e-9 };
    ((value * factor) + bias).round() / factor
}

fn round1(value: f64) -> f64 {
    round_half_away_from_zero(value, 1)
}

/// Weeks elapsed between `published` and `now`, clamped to a minimum of 0.
/// A missing publication date yields 0 weeks.
pub fn weeks_since(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match published {
        Some(p) => {
            let ms = (now - p).num_milliseconds() as f64;
            (ms / (7.0 * 86_400.0 * 1000.0)).max(0.0)
        }
        None => 0.0,
    }
}

/// Asymmetric Laplace CDF over elapsed weeks `t`, parameterized by (μ, λ, κ).
///
/// Non-finite inputs return 0. Exponent arguments are bounded to [-50, 50]
/// before exponentiating to avoid overflow on extreme parameter values.
pub fn asymmetric_laplace_cdf(t: f64, mu: f64, lambda: f64, kappa: f64) -> f64 {
    if !t.is_finite() || !mu.is_finite() || !lambda.is_finite() || !kappa.is_finite() {
        return 0.0;
    }

    let t = t.max(0.0);
    let bounded_exp = |x: f64| x.clamp(-50.0, 50.0).exp();

    let result = if t <= mu {
        let kappa_sq = kappa * kappa;
        (kappa_sq / (1.0 + kappa_sq)) * bounded_exp((lambda / kappa) * (t - mu))
    } else {
        1.0 - (1.0 / (1.0 + kappa * kappa)) * bounded_exp(-(lambda * kappa) * (t - mu))
    };

    result.clamp(0.0, 1.0)
}

/// `eMin` for a given CVSS version string: a fixed 0.9 for v4.x, else 0.91.
pub fn e_min_for_version(cvss_version: Option<&str>) -> f64 {
    match cvss_version {
        Some(v) if v.starts_with('4') => crate::cvss::cvss_v4_e_min(),
        _ => E_MIN_DEFAULT,
    }
}

/// All inputs `computeSecScore` needs. `weeks` and `exploit_prob` are
/// computed by the caller (`weeks_since` then `asymmetric_laplace_cdf`)
/// against the category's `ModelParams` before this is invoked.
#[derive(Debug, Clone)]
pub struct ScoreInputs {
    pub cvss_base: Option<f64>,
    pub remediation_level: Option<f64>,
    pub report_confidence: Option<f64>,
    pub cvss_version: Option<String>,
    pub weeks: f64,
    pub exploit_prob: f64,
    pub epss_score: Option<f64>,
    pub has_exploit: bool,
    pub kev: bool,
}

/// Blend CVSS base, the AL-CDF-derived exploit probability, EPSS, PoC
/// evidence, and the KEV floor into a final `[0, 10]` score.
pub fn compute_secscore(inputs: &ScoreInputs) -> ScoreComputation {
    let base_score = inputs.cvss_base.filter(|v| v.is_finite()).unwrap_or(0.0);
    let rl = inputs.remediation_level.unwrap_or(1.0);
    let rc = inputs.report_confidence.unwrap_or(1.0);
    let temporal_kernel = round1(base_score * rl * rc);

    let e_min = e_min_for_version(inputs.cvss_version.as_deref());
    let exploit_maturity = e_min + (E_MAX - e_min) * inputs.exploit_prob;

    let mut score = temporal_kernel * exploit_maturity;

    if let Some(epss) = inputs.epss_score {
        score += EPSS_BLEND_WEIGHT * epss;
    }
    if inputs.has_exploit {
        score += POC_BONUS_MAX;
    }
    if inputs.kev && score < KEV_MIN_FLOOR {
        score = KEV_MIN_FLOOR;
    }

    let secscore = round1(score.clamp(0.0, 10.0));

    ScoreComputation {
        secscore,
        temporal_kernel,
        exploit_maturity,
        e_min,
        weeks: inputs.weeks,
        exploit_prob: inputs.exploit_prob,
    }
}

/// Context `buildExplanation` needs beyond `ScoreComputation`: the raw
/// signals whose presence/absence decides which entries appear.
pub struct ExplanationContext<'a> {
    pub category: &'a str,
    pub params: ModelParams,
    pub kev: bool,
    pub exploits: &'a [crate::types::ExploitEvidence],
    pub epss_score: Option<f64>,
    pub epss_percentile: Option<f64>,
    pub cvss_base: Option<f64>,
    pub computation: &'a ScoreComputation,
}

/// Build the ordered, human-readable explanation for a computed score.
/// Entries whose triggering condition doesn't hold are omitted entirely;
/// "Temporal model" and "SecScore" always appear, first and last.
pub fn build_explanation(ctx: &ExplanationContext<'_>) -> Vec<ExplanationEntry> {
    let mut entries = Vec::with_capacity(6);

    entries.push(ExplanationEntry {
        title: "Temporal model".to_string(),
        detail: format!(
            "category={} mu={:.2} lambda={:.2} kappa={:.2} weeks={:.2} exploitProb={:.3} E_S={:.3} K={:.1}",
            ctx.category,
            ctx.params.mu,
            ctx.params.lambda,
            ctx.params.kappa,
            ctx.computation.weeks,
            ctx.computation.exploit_prob,
            ctx.computation.exploit_maturity,
            ctx.computation.temporal_kernel,
        ),
        source: "secscore".to_string(),
    });

    if ctx.kev {
        entries.push(ExplanationEntry {
            title: "CISA KEV".to_string(),
            detail: format!(
                "Listed in the CISA KEV catalog; score floored to {:.1}",
                KEV_MIN_FLOOR
            ),
            source: "cisa-kev".to_string(),
        });
    }

    if let Some(first) = ctx.exploits.first() {
        let date = first.published_date.as_deref().unwrap_or("unknown date");
        entries.push(ExplanationEntry {
            title: "Exploit PoC".to_string(),
            detail: format!("Public proof-of-concept exploit published {}", date),
            source: "exploitdb".to_string(),
        });
    }

    if let (Some(score), Some(percentile)) = (ctx.epss_score, ctx.epss_percentile) {
        let bonus = EPSS_BLEND_WEIGHT * score;
        entries.push(ExplanationEntry {
            title: "EPSS".to_string(),
            detail: format!(
                "EPSS score {:.3} (percentile {:.3}) added +{:.2}",
                score, percentile, bonus
            ),
            source: "epss".to_string(),
        });
    }

    match ctx.cvss_base {
        Some(base) => entries.push(ExplanationEntry {
            title: "CVSS Base".to_string(),
            detail: format!("CVSS base score {:.1} used for kernel", base),
            source: "cvss".to_string(),
        }),
        None => entries.push(ExplanationEntry {
            title: "CVSS Missing".to_string(),
            detail: "No CVSS base score available; temporal kernel defaulted to 0".to_string(),
            source: "cvss".to_string(),
        }),
    }

    entries.push(ExplanationEntry {
        title: "SecScore".to_string(),
        detail: format!("Final SecScore {:.1}", ctx.computation.secscore),
        source: "secscore".to_string(),
    });

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExploitEvidence;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    // S5
    #[test]
    fn al_cdf_of_nan_is_zero() {
        assert_eq!(asymmetric_laplace_cdf(f64::NAN, 1.0, 1.0, 1.0), 0.0);
    }

    // S6
    #[test]
    fn al_cdf_matches_known_points() {
        assert!(approx(asymmetric_laplace_cdf(2.0, 4.0, 0.5, 1.2), 0.256, 0.01));
        assert!(approx(asymmetric_laplace_cdf(6.0, 4.0, 0.5, 1.2), 0.877, 0.01));
    }

    #[test]
    fn al_cdf_at_t_equals_mu_is_kappa_sq_over_one_plus_kappa_sq() {
        let kappa = 1.2;
        let expected = (kappa * kappa) / (1.0 + kappa * kappa);
        assert!(approx(asymmetric_laplace_cdf(4.0, 4.0, 0.5, kappa), expected, 1e-9));
    }

    #[test]
    fn al_cdf_is_monotone_nondecreasing_in_t() {
        let mut prev = asymmetric_laplace_cdf(0.0, 5.0, 0.3, 1.1);
        for i in 1..200 {
            let t = i as f64 * 0.5;
            let next = asymmetric_laplace_cdf(t, 5.0, 0.3, 1.1);
            assert!(next >= prev - 1e-12);
            prev = next;
        }
    }

    #[test]
    fn al_cdf_stays_in_unit_interval_for_extreme_params() {
        let v = asymmetric_laplace_cdf(1e308, 1.0, 1e300, 1e300);
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn weeks_since_missing_date_is_zero() {
        assert_eq!(weeks_since(None, Utc::now()), 0.0);
    }

    // S1
    #[test]
    fn scenario_s1_standard_blend_no_kev_no_exploit() {
        let inputs = ScoreInputs {
            cvss_base: Some(7.5),
            remediation_level: Some(0.95),
            report_confidence: Some(0.96),
            cvss_version: Some("3.1".to_string()),
            weeks: 10.0,
            exploit_prob: 0.5,
            epss_score: None,
            has_exploit: false,
            kev: false,
        };
        let result = compute_secscore(&inputs);
        assert_eq!(result.temporal_kernel, 6.8);
        assert!(approx(result.exploit_maturity, 0.955, 0.001));
        assert_eq!(result.secscore, 6.5);
        assert_eq!(result.e_min, 0.91);
    }

    // S2
    #[test]
    fn scenario_s2_kev_floor_applies() {
        let inputs = ScoreInputs {
            cvss_base: Some(1.0),
            remediation_level: None,
            report_confidence: None,
            cvss_version: Some("3.1".to_string()),
            weeks: 0.0,
            exploit_prob: 0.0,
            epss_score: None,
            has_exploit: false,
            kev: true,
        };
        let result = compute_secscore(&inputs);
        assert_eq!(result.temporal_kernel, 1.0);
        assert!(approx(result.exploit_maturity, 0.91, 0.001));
        assert_eq!(result.secscore, 8.0);
    }

    // S3
    #[test]
    fn scenario_s3_v4_epss_and_poc_bonus() {
        let inputs = ScoreInputs {
            cvss_base: Some(4.0),
            remediation_level: None,
            report_confidence: None,
            cvss_version: Some("4.0".to_string()),
            weeks: 3.0,
            exploit_prob: 0.2,
            epss_score: Some(0.42),
            has_exploit: true,
            kev: false,
        };
        let result = compute_secscore(&inputs);
        assert_eq!(result.temporal_kernel, 4.0);
        assert_eq!(result.e_min, 0.9);
        assert!(approx(result.exploit_maturity, 0.92, 0.001));
        assert_eq!(result.secscore, 5.7);
    }

    #[test]
    fn cvss_missing_yields_zero_kernel() {
        let inputs = ScoreInputs {
            cvss_base: None,
            remediation_level: None,
            report_confidence: None,
            cvss_version: None,
            weeks: 0.0,
            exploit_prob: 0.0,
            epss_score: None,
            has_exploit: false,
            kev: false,
        };
        let result = compute_secscore(&inputs);
        assert_eq!(result.temporal_kernel, 0.0);
    }

    #[test]
    fn secscore_is_always_within_bounds() {
        let inputs = ScoreInputs {
            cvss_base: Some(10.0),
            remediation_level: Some(1.0),
            report_confidence: Some(1.0),
            cvss_version: Some("3.1".to_string()),
            weeks: 1000.0,
            exploit_prob: 1.0,
            epss_score: Some(1.0),
            has_exploit: true,
            kev: true,
        };
        let result = compute_secscore(&inputs);
        assert!(result.secscore <= 10.0 && result.secscore >= 0.0);
    }

    // S7
    #[test]
    fn scenario_s7_explanation_order_and_content() {
        let computation = ScoreComputation {
            secscore: 8.4,
            temporal_kernel: 6.3,
            exploit_maturity: 0.95,
            e_min: 0.91,
            weeks: 12.0,
            exploit_prob: 0.8,
        };
        let exploits = vec![ExploitEvidence {
            source: "exploitdb".to_string(),
            url: None,
            published_date: Some("2024-05-01".to_string()),
        }];
        let ctx = ExplanationContext {
            category: "default",
            params: ModelParams { mu: 10.0, lambda: 0.3, kappa: 1.0 },
            kev: true,
            exploits: &exploits,
            epss_score: Some(0.42),
            epss_percentile: Some(0.9),
            cvss_base: Some(7.2),
            computation: &computation,
        };
        let entries = build_explanation(&ctx);

        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].title, "Temporal model");
        assert_eq!(entries[1].title, "CISA KEV");
        assert_eq!(entries[2].title, "Exploit PoC");
        assert!(entries[2].detail.contains("2024-05-01"));
        assert_eq!(entries[3].title, "EPSS");
        assert!(entries[3].detail.contains("+1.05"));
        assert_eq!(entries[4].title, "CVSS Base");
        assert!(entries[4].detail.contains("7.2"));
        assert_eq!(entries[5].title, "SecScore");
        assert!(entries[5].detail.contains("8.4"));
    }

    #[test]
    fn explanation_omits_kev_exploit_epss_when_absent() {
        let computation = ScoreComputation {
            secscore: 0.0,
            temporal_kernel: 0.0,
            exploit_maturity: 0.91,
            e_min: 0.91,
            weeks: 0.0,
            exploit_prob: 0.0,
        };
        let ctx = ExplanationContext {
            category: "default",
            params: ModelParams { mu: 10.0, lambda: 0.3, kappa: 1.0 },
            kev: false,
            exploits: &[],
            epss_score: None,
            epss_percentile: None,
            cvss_base: None,
            computation: &computation,
        };
        let entries = build_explanation(&ctx);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Temporal model");
        assert_eq!(entries[1].title, "CVSS Missing");
        assert_eq!(entries[2].title, "SecScore");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_half_away_from_zero(7.35, 1), 7.4);
        assert_eq!(round_half_away_from_zero(-7.35, 1), -7.4);
        assert_eq!(round_half_away_from_zero(6.84, 1), 6.8);
    }
}
