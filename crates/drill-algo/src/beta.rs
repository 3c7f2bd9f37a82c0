use serde::{Deserialize, Serialize};

use crate::error::DrillError;

/// Floor applied to mixture alpha/beta so downstream consumers never divide
/// by (or sample from) a degenerate Beta. See spec §4.2.4 / §7.
const BETA_FLOOR: f64 = 0.1;

/// Parameters of a Beta distribution summarizing a success probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaParams {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaParams {
    pub fn new(alpha: f64, beta: f64) -> Self {
        if !alpha.is_finite() || !beta.is_finite() || alpha <= 0.0 || beta <= 0.0 {
            tracing::warn!(
                error = %DrillError::FloatingDegeneracy,
                alpha, beta,
                "non-finite or non-positive Beta parameters; falling back to uniform"
            );
            return Self::uniform();
        }
        Self { alpha, beta }
    }

    pub fn uniform() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn total_observations(&self) -> f64 {
        self.alpha + self.beta
    }

    fn variance(&self) -> f64 {
        let n = self.alpha + self.beta;
        (self.alpha * self.beta) / (n * n * (n + 1.0))
    }

    /// Moment-matched approximation of an equal-weight mixture of two Betas.
    /// Grounded on `beta_mixture_approx` in
    /// `examples/original_source/backend/app/ml/beta_utils.py`. Result is
    /// floored at [`BETA_FLOOR`] to prevent downstream divide-by-zero, per
    /// spec §4.2.4.
    pub fn mixture(a: BetaParams, b: BetaParams) -> BetaParams {
        Self::mixture_n(&[a, b])
    }

    /// Equal-weight moment-matched mixture of `n` Betas. The two-component
    /// case reduces exactly to [`Self::mixture`]'s formula (the `1/4
    /// (mu1-mu2)^2` term is the variance of two equally-weighted means
    /// around their grand mean); this generalizes it to four-choice subset
    /// stats, where the set has more than two members. Result is floored at
    /// [`BETA_FLOOR`].
    pub fn mixture_n(components: &[BetaParams]) -> BetaParams {
        if components.is_empty() {
            return BetaParams::uniform();
        }
        let n = components.len() as f64;
        let mu = components.iter().map(|c| c.mean()).sum::<f64>() / n;
        let mean_var = components.iter().map(|c| c.variance()).sum::<f64>() / n;
        let spread = components
            .iter()
            .map(|c| (c.mean() - mu).powi(2))
            .sum::<f64>()
            / n;
        let var = mean_var + spread;

        if var <= 0.0 || !var.is_finite() {
            tracing::warn!(
                error = %DrillError::FloatingDegeneracy,
                var, "degenerate mixture variance; falling back to uniform"
            );
            return BetaParams::uniform();
        }

        let nu = mu * (1.0 - mu) / var - 1.0;
        if nu <= 0.0 || !nu.is_finite() {
            tracing::warn!(
                error = %DrillError::FloatingDegeneracy,
                nu, "degenerate mixture pseudocount; falling back to uniform"
            );
            return BetaParams::uniform();
        }

        let alpha = (mu * nu).max(BETA_FLOOR);
        let beta = ((1.0 - mu) * nu).max(BETA_FLOOR);
        if !alpha.is_finite() || !beta.is_finite() {
            tracing::warn!(
                error = %DrillError::FloatingDegeneracy,
                alpha, beta, "non-finite mixture result; falling back to uniform"
            );
            return BetaParams::uniform();
        }
        BetaParams { alpha, beta }
    }
}
