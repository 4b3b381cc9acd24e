use crate::error::{AnalysisError, Result};
use crate::source::{SourceFormat, city_observations};
use crate::structs::{
    AnalysisConfig, AnnualMean, Observation, TrendAnalysis, TrendReport, TrendSegment,
};
use log::debug;
use std::{collections::BTreeMap, path::Path};

/// Running total of one calendar year's readings.
///
/// Keeping the sum and count (rather than only the mean) lets the moving
/// average weight each year by how many readings it has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualBucket {
    pub year: i32,
    pub sum: f64,
    pub count: u32,
}

impl AnnualBucket {
    fn new(year: i32, temperature: f64) -> Self {
        Self {
            year,
            sum: temperature,
            count: 1,
        }
    }

    fn update(&mut self, temperature: f64) {
        self.sum += temperature;
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Direction of the run currently being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undetermined,
    Warming,
    Cooling,
}

/// Segmenter state threaded through the scan, replaced once per step.
#[derive(Debug, Clone, Copy)]
struct ScanState {
    direction: Direction,
    start: AnnualMean,
}

/// Warming and cooling runs, each in the order they were closed
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Segments {
    pub warming: Vec<TrendSegment>,
    pub cooling: Vec<TrendSegment>,
}

impl Segments {
    fn close(&mut self, direction: Direction, start: AnnualMean, end: AnnualMean) {
        let segment = TrendSegment {
            start_year: start.year,
            end_year: end.year,
            average_rate: (end.mean - start.mean) / f64::from(end.year - start.year),
        };
        match direction {
            Direction::Warming => self.warming.push(segment),
            Direction::Cooling => self.cooling.push(segment),
            Direction::Undetermined => {}
        }
    }
}

/// Groups one city's observations into per-year buckets, sorted by year.
///
/// Years without readings are absent. An empty input gives an empty result.
pub fn aggregate_annual(observations: &[Observation]) -> Vec<AnnualBucket> {
    let mut buckets: BTreeMap<i32, AnnualBucket> = BTreeMap::new();
    for observation in observations {
        buckets
            .entry(observation.year)
            .and_modify(|bucket| bucket.update(observation.temperature))
            .or_insert_with(|| AnnualBucket::new(observation.year, observation.temperature));
    }
    buckets.into_values().collect()
}

/// Mean of each bucket, in bucket order.
pub fn annual_series(buckets: &[AnnualBucket]) -> Vec<AnnualMean> {
    buckets
        .iter()
        .map(|bucket| AnnualMean {
            year: bucket.year,
            mean: bucket.mean(),
        })
        .collect()
}

/// Trailing moving average over `window_size` years, keyed by the last year
/// of each window.
///
/// Every individual reading in the window counts once, so a year with twelve
/// readings weighs more than a year with three. A window longer than the
/// series yields an empty map.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidWindow` for a zero window.
pub fn moving_averages(buckets: &[AnnualBucket], window_size: usize) -> Result<BTreeMap<i32, f64>> {
    if window_size == 0 {
        return Err(AnalysisError::InvalidWindow(window_size));
    }

    Ok(buckets
        .windows(window_size)
        .map(|window| {
            let (sum, count) = window.iter().fold((0.0, 0u64), |(sum, count), bucket| {
                (sum + bucket.sum, count + u64::from(bucket.count))
            });
            (window[window.len() - 1].year, sum / count as f64)
        })
        .collect())
}

/// Splits a chronological annual series into maximal warming and cooling runs.
///
/// A run changes only when the year-over-year difference changes sign; equal
/// consecutive means extend whatever run is open. A new run starts at the
/// year the previous one ended, so neighbouring runs share that year. Leading
/// flat years belong to the first run, and a series that never moves yields
/// no runs at all.
pub fn segment_trends(series: &[AnnualMean]) -> Segments {
    let mut segments = Segments::default();
    let (Some(&first), Some(&last)) = (series.first(), series.last()) else {
        return segments;
    };

    let mut state = ScanState {
        direction: Direction::Undetermined,
        start: first,
    };
    for pair in series.windows(2) {
        state = advance(state, pair[0], pair[1], &mut segments);
    }
    segments.close(state.direction, state.start, last);

    segments
}

fn advance(
    state: ScanState,
    prev: AnnualMean,
    curr: AnnualMean,
    segments: &mut Segments,
) -> ScanState {
    let rate = curr.mean - prev.mean;
    let direction = if rate > 0.0 {
        Direction::Warming
    } else if rate < 0.0 {
        Direction::Cooling
    } else {
        return state;
    };

    if direction == state.direction {
        return state;
    }

    match state.direction {
        Direction::Undetermined => ScanState {
            direction,
            start: state.start,
        },
        open => {
            segments.close(open, state.start, prev);
            ScanState {
                direction,
                start: prev,
            }
        }
    }
}

/// Average change per year between the first and last annual mean.
///
/// # Errors
///
/// Returns `EmptySeries` for an empty series and `InsufficientRange` when it
/// covers a single year.
pub fn overall_slope(city: &str, series: &[AnnualMean]) -> Result<f64> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(AnalysisError::EmptySeries {
                city: city.to_string(),
            });
        }
    };
    if last.year == first.year {
        return Err(AnalysisError::InsufficientRange {
            city: city.to_string(),
        });
    }
    Ok((last.mean - first.mean) / f64::from(last.year - first.year))
}

/// Builds the trend report for one city from its observations.
///
/// `observations` must all belong to `city`; their order does not matter
/// because the annual series is sorted by year before it is scanned.
///
/// # Arguments
///
/// * `city` - City the observations belong to, used in the report and errors
/// * `observations` - Valid monthly readings of that city
/// * `config` - Analysis configuration; only `window_size` is used here
///
/// # Returns
///
/// Returns a `TrendReport` with the annual means, the weighted moving
/// averages, the overall slope and the warming and cooling periods.
///
/// # Errors
///
/// - `EmptySeries` when there are no observations
/// - `InsufficientRange` when they span a single year
/// - `InvalidWindow` when `config.window_size` is zero
pub fn compute_temperature_trends(
    city: &str,
    observations: &[Observation],
    config: &AnalysisConfig,
) -> Result<TrendReport> {
    let buckets = aggregate_annual(observations);
    if buckets.is_empty() {
        return Err(AnalysisError::EmptySeries {
            city: city.to_string(),
        });
    }
    debug!(
        "Aggregated {} observations for {} into {} years",
        observations.len(),
        city,
        buckets.len()
    );

    let series = annual_series(&buckets);
    let moving_averages = moving_averages(&buckets, config.window_size)?;
    let overall_slope = overall_slope(city, &series)?;
    let segments = segment_trends(&series);
    debug!(
        "{}: {} warming and {} cooling periods, overall slope {:.4}",
        city,
        segments.warming.len(),
        segments.cooling.len(),
        overall_slope
    );

    Ok(TrendReport {
        city: city.to_string(),
        annual_means: series.iter().map(|annual| (annual.year, annual.mean)).collect(),
        moving_averages,
        trend_analysis: TrendAnalysis {
            overall_slope,
            warming_periods: segments.warming,
            cooling_periods: segments.cooling,
        },
    })
}

/// Reads `city` from the dataset at `path` and builds its trend report.
pub fn temperature_trends(
    path: &Path,
    format: SourceFormat,
    city: &str,
    config: &AnalysisConfig,
) -> Result<TrendReport> {
    let observations = city_observations(path, format, config.unit, city)?;
    compute_temperature_trends(city, &observations, config)
}
