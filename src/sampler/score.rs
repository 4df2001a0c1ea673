use crate::sampler::ScoreConfig;
use crate::state::Amount;

/// Tenure half of the score, saturating towards `max_score / 2`
pub fn duration_component(duration_periods: u64, periods_per_year: u64, config: &ScoreConfig) -> f64 {
    let cap = config.max_score as f64 / 2.0;
    if periods_per_year == 0 {
        return 0.0;
    }
    let periods_per_month = periods_per_year as f64 / 12.0;
    let months = duration_periods as f64 / periods_per_month;
    (cap * (1.0 - (-months / config.duration_scale_months).exp())).clamp(0.0, cap)
}

/// Balance half of the score, logarithmic in base units
pub fn balance_component(balance: Amount, config: &ScoreConfig) -> f64 {
    let cap = config.max_score as f64 / 2.0;
    (config.balance_log_weight * (balance as f64 + 1.0).log10()).clamp(0.0, cap)
}

/// Reputation score in `[0, max_score]`, non-decreasing in both inputs
pub fn reputation_score(
    duration_periods: u64,
    balance: Amount,
    periods_per_year: u64,
    config: &ScoreConfig,
) -> u16 {
    let total = duration_component(duration_periods, periods_per_year, config)
        + balance_component(balance, config);
    (total.floor() as u16).min(config.max_score)
}
