use serde::{Serialize, Deserialize};

use crate::sampler::SamplerConfig;
use crate::state::{Period, ValidationError};

/// Samples needed for `duration` periods at the configured density, rounded up
pub fn required_samples(duration: u64, samples_per_year: u64, periods_per_year: u64) -> u64 {
    if duration == 0 || periods_per_year == 0 {
        return 0;
    }
    let numerator = duration as u128 * samples_per_year as u128;
    let denominator = periods_per_year as u128;
    numerator.div_ceil(denominator).min(u64::MAX as u128) as u64
}

/// Samples actually taken once the minimum gap is enforced
pub fn actual_samples(duration: u64, required: u64, min_gap: u64) -> u64 {
    if min_gap == 0 {
        return required;
    }
    required.min(duration / min_gap)
}

/// Check the sampling density implied by a claim's period range.
///
/// Rejects when the gap between required samples would fall below `min_gap`.
pub fn check_density(start: Period, end: Period, config: &SamplerConfig) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::InvalidPeriodRange { start, end });
    }
    let duration = end - start;
    let required = required_samples(duration, config.samples_per_year, config.periods_per_year);
    let gap = duration / required.max(1);
    if gap < config.min_gap {
        return Err(ValidationError::InsufficientSampleGap {
            gap,
            min_gap: config.min_gap,
        });
    }
    Ok(())
}

/// Deterministic set of periods at which a balance is observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSchedule {
    pub start: Period,
    pub end: Period,
    pub required_samples: u64,
    pub sample_count: u64,
    pub gap: u64,
    /// Ascending sample points; the end period is always the last entry
    pub points: Vec<Period>,
}

impl SampleSchedule {
    /// Compute the schedule for `[start, end]`
    pub fn compute(start: Period, end: Period, config: &SamplerConfig) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidPeriodRange { start, end });
        }
        let duration = end - start;
        let required = required_samples(duration, config.samples_per_year, config.periods_per_year);
        let sample_count = actual_samples(duration, required, config.min_gap);
        if sample_count == 0 {
            return Err(ValidationError::InsufficientSampleGap {
                gap: duration,
                min_gap: config.min_gap,
            });
        }
        let gap = duration / sample_count;

        let mut points: Vec<Period> = (0..sample_count).map(|i| start + i * gap).collect();
        if points.last() != Some(&end) {
            points.push(end);
        }

        Ok(Self {
            start,
            end,
            required_samples: required,
            sample_count,
            gap,
            points,
        })
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}
