//! Empirical-Bayes shrinkage strength estimation.
//!
//! Estimates one global pseudo-count strength α by moment-matching the
//! observed context-to-context rate variance against a Beta-Binomial
//! model: variance in excess of the binomial sampling variance is
//! attributed to genuine heterogeneity, and α is the median of the
//! per-target-value estimates.

use std::collections::BTreeMap;

use anomaly_map_stats_models::SufficientStats;

/// Fallback shrinkage strength when no target value shows usable excess
/// variance. Deliberately strong: with nothing to learn from, estimates
/// stay close to the global prior.
pub const DEFAULT_ALPHA: f64 = 100.0;

/// Estimates the shrinkage strength for one sufficient-statistics
/// table.
///
/// Per target value, computes the sample variance of the observed rates
/// `count / context_total` across contexts and compares it with the
/// binomial variance `p_k (1 - p_k) / mean_n` expected under a single
/// shared rate. Target values observed in fewer than two contexts, with
/// zero variance, or with no excess over the binomial floor contribute
/// no estimate. Falls back to [`DEFAULT_ALPHA`] when nothing remains.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_alpha(stats: &SufficientStats) -> f64 {
    // (p_obs, context_total) samples grouped by target value.
    let mut per_target: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for (key, count) in &stats.counts {
        let Some(&total) = stats.context_totals.get(&key.context) else {
            continue;
        };
        if total == 0 {
            continue;
        }
        per_target
            .entry(key.target_value.as_str())
            .or_default()
            .push((*count as f64 / total as f64, total as f64));
    }

    let mut alphas = Vec::new();
    for (target_value, samples) in per_target {
        let Some(&p_k) = stats.global_prior.get(target_value) else {
            continue;
        };
        if samples.len() < 2 {
            continue;
        }

        let n = samples.len() as f64;
        let mean_p = samples.iter().map(|(p, _)| p).sum::<f64>() / n;
        let var_obs = samples
            .iter()
            .map(|(p, _)| (p - mean_p).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        if var_obs == 0.0 {
            continue;
        }

        let mean_n = samples.iter().map(|(_, total)| total).sum::<f64>() / n;
        let binomial_var = p_k * (1.0 - p_k) / mean_n;
        if var_obs > binomial_var {
            let alpha_k = p_k * (1.0 - p_k) / (var_obs - binomial_var) - 1.0;
            if alpha_k > 0.0 && alpha_k.is_finite() {
                alphas.push(alpha_k);
            }
        }
    }

    median(&mut alphas).unwrap_or_else(|| {
        log::debug!("No target value with usable excess variance; falling back to default alpha");
        DEFAULT_ALPHA
    })
}

/// Median of a sample, averaging the two middle values for even sizes.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    }
}
