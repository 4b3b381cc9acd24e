use crate::error::{AnalysisError, Result};
use crate::source::{SourceFormat, city_observations, scan};
use crate::structs::{
    AnalysisConfig, CityAverage, DecadeComparison, DecadeSummary, DecadeTrend, Extreme,
    Extremes, Observation, Season, SeasonalAverage, SimilarCities, SimilarCity, TemperatureUnit,
    YearMonth,
};
use log::{debug, info};
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::ControlFlow,
    path::Path,
};

/// Reads one temperature per month for a city.
///
/// When the dataset holds several rows for the same month, the last one read
/// wins.
pub fn monthly_temperatures(
    path: &Path,
    format: SourceFormat,
    city: &str,
    config: &AnalysisConfig,
) -> Result<BTreeMap<YearMonth, f64>> {
    let observations = city_observations(path, format, config.unit, city)?;
    Ok(monthly_map(&observations))
}

fn monthly_map(observations: &[Observation]) -> BTreeMap<YearMonth, f64> {
    observations
        .iter()
        .map(|observation| (observation.year_month(), observation.temperature))
        .collect()
}

/// Lists the distinct city names in the dataset, sorted.
///
/// Every row counts, whether or not its reading is usable. With a `limit`,
/// the scan stops as soon as that many distinct names have been seen, so the
/// result is the first `limit` cities in file order, sorted. A limit of zero
/// means no limit.
pub fn available_cities(
    path: &Path,
    format: SourceFormat,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let limit = limit.filter(|&limit| limit > 0);
    let mut cities: BTreeSet<String> = BTreeSet::new();
    scan(path, format, TemperatureUnit::Celsius, |row| {
        if !cities.contains(row.city) {
            cities.insert(row.city.to_string());
        }
        match limit {
            Some(limit) if cities.len() >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    })?;
    debug!("Found {} distinct cities", cities.len());
    Ok(cities.into_iter().collect())
}

#[derive(Debug, Default)]
struct CityAccumulator {
    country: String,
    sum: f64,
    count: u64,
}

/// Computes the long-run average temperature of every city in one pass.
///
/// Cities without a single valid reading are left out. The country is the
/// one on the last row read for the city.
pub fn average_temperatures(
    path: &Path,
    format: SourceFormat,
    config: &AnalysisConfig,
) -> Result<BTreeMap<String, CityAverage>> {
    let mut accumulators: BTreeMap<String, CityAccumulator> = BTreeMap::new();
    scan(path, format, config.unit, |row| {
        if !accumulators.contains_key(row.city) {
            accumulators.insert(row.city.to_string(), CityAccumulator::default());
        }
        if let Some(acc) = accumulators.get_mut(row.city) {
            acc.country.clear();
            acc.country.push_str(row.country);
            if let Some(temperature) = row.temperature {
                acc.sum += temperature;
                acc.count += 1;
            }
        }
        ControlFlow::Continue(())
    })?;

    let averages: BTreeMap<String, CityAverage> = accumulators
        .into_iter()
        .filter(|(_, acc)| acc.count > 0)
        .map(|(city, acc)| {
            let average = CityAverage {
                country: acc.country,
                average: acc.sum / acc.count as f64,
                count: acc.count,
            };
            (city, average)
        })
        .collect();
    info!("Computed averages for {} cities", averages.len());
    Ok(averages)
}

/// Finds the hottest and coldest monthly readings of a city.
///
/// # Errors
///
/// Returns `EmptySeries` when the city has no valid reading.
pub fn temperature_extremes(
    path: &Path,
    format: SourceFormat,
    city: &str,
    config: &AnalysisConfig,
) -> Result<Extremes> {
    let observations = city_observations(path, format, config.unit, city)?;
    extremes_of(city, &observations)
}

/// Hottest and coldest of `observations`; the earliest reading wins a tie.
pub fn extremes_of(city: &str, observations: &[Observation]) -> Result<Extremes> {
    let (first, rest) = observations
        .split_first()
        .ok_or_else(|| AnalysisError::EmptySeries {
            city: city.to_string(),
        })?;

    let mut hottest = first;
    let mut coldest = first;
    for observation in rest {
        if observation.temperature > hottest.temperature {
            hottest = observation;
        }
        if observation.temperature < coldest.temperature {
            coldest = observation;
        }
    }

    Ok(Extremes {
        city: city.to_string(),
        hottest: Extreme {
            date: hottest.year_month(),
            temperature: hottest.temperature,
        },
        coldest: Extreme {
            date: coldest.year_month(),
            temperature: coldest.temperature,
        },
    })
}

/// Average temperature of a city over every month of one season.
///
/// # Errors
///
/// Returns `DivisionByZero` when no month of the season has a reading.
pub fn seasonal_average(
    path: &Path,
    format: SourceFormat,
    city: &str,
    season: Season,
    config: &AnalysisConfig,
) -> Result<SeasonalAverage> {
    let monthly = monthly_temperatures(path, format, city, config)?;
    seasonal_average_of(city, &monthly, season)
}

/// Seasonal average over an already loaded monthly map.
pub fn seasonal_average_of(
    city: &str,
    monthly: &BTreeMap<YearMonth, f64>,
    season: Season,
) -> Result<SeasonalAverage> {
    let (average_temperature, data_points) = mean_of(
        monthly
            .iter()
            .filter(|(date, _)| season.contains(date.month))
            .map(|(_, &temp)| temp),
        || format!("{:?} in {}", season, city),
    )?;

    Ok(SeasonalAverage {
        city: city.to_string(),
        season,
        average_temperature,
        data_points,
    })
}

/// Compares the average temperature of two decades for a city.
///
/// The difference is `decade2 - decade1`; within `config.stable_threshold` of
/// zero the trend is stable.
///
/// # Errors
///
/// - `InvalidDecade` when either decade is not a multiple of 10
/// - `DivisionByZero` when either decade has no reading
pub fn compare_decades(
    path: &Path,
    format: SourceFormat,
    city: &str,
    decade1: i32,
    decade2: i32,
    config: &AnalysisConfig,
) -> Result<DecadeComparison> {
    let monthly = monthly_temperatures(path, format, city, config)?;
    compare_decade_temperatures(city, &monthly, decade1, decade2, config.stable_threshold)
}

fn validate_decade(decade: i32) -> Result<()> {
    if decade % 10 != 0 {
        return Err(AnalysisError::InvalidDecade(decade));
    }
    Ok(())
}

/// Decade comparison over an already loaded monthly map.
///
/// Each decade covers January of `decade` up to, not including, January of
/// `decade + 10`.
///
/// # Errors
///
/// - `InvalidDecade` when either decade is not a multiple of 10
/// - `DivisionByZero` when either decade has no reading
pub fn compare_decade_temperatures(
    city: &str,
    monthly: &BTreeMap<YearMonth, f64>,
    decade1: i32,
    decade2: i32,
    stable_threshold: f64,
) -> Result<DecadeComparison> {
    validate_decade(decade1)?;
    validate_decade(decade2)?;

    let first = summarize_decade(city, monthly, decade1)?;
    let second = summarize_decade(city, monthly, decade2)?;
    let difference = second.avg_temp - first.avg_temp;
    let trend = if difference < -stable_threshold {
        DecadeTrend::Cooling
    } else if difference > stable_threshold {
        DecadeTrend::Warming
    } else {
        DecadeTrend::Stable
    };
    debug!(
        "{}: {} -> {} changed by {:.3} ({:?})",
        city, first.period, second.period, difference, trend
    );

    Ok(DecadeComparison {
        city: city.to_string(),
        decade1: first,
        decade2: second,
        difference,
        trend,
    })
}

fn summarize_decade(
    city: &str,
    monthly: &BTreeMap<YearMonth, f64>,
    decade: i32,
) -> Result<DecadeSummary> {
    let period = format!("{}s", decade);
    let start = YearMonth {
        year: decade,
        month: 1,
    };
    let end = YearMonth {
        year: decade + 10,
        month: 1,
    };
    let (avg_temp, data_points) = mean_of(
        monthly.range(start..end).map(|(_, &temp)| temp),
        || format!("the {} in {}", period, city),
    )?;
    Ok(DecadeSummary {
        period,
        avg_temp,
        data_points,
    })
}

/// Finds every other city whose long-run average is within
/// `config.similarity_tolerance` of the target's.
///
/// # Errors
///
/// Returns `UnknownCity` when the target has no average.
pub fn similar_cities(
    path: &Path,
    format: SourceFormat,
    target_city: &str,
    config: &AnalysisConfig,
) -> Result<SimilarCities> {
    let averages = average_temperatures(path, format, config)?;
    similar_to(target_city, &averages, config.similarity_tolerance)
}

/// Similarity search over precomputed city averages, sorted by city name.
pub fn similar_to(
    target_city: &str,
    averages: &BTreeMap<String, CityAverage>,
    tolerance: f64,
) -> Result<SimilarCities> {
    let target = averages
        .get(target_city)
        .ok_or_else(|| AnalysisError::UnknownCity(target_city.to_string()))?;

    let similar_cities: Vec<SimilarCity> = averages
        .iter()
        .filter(|(city, _)| city.as_str() != target_city)
        .filter_map(|(city, average)| {
            let difference = (target.average - average.average).abs();
            (difference <= tolerance).then(|| SimilarCity {
                city: city.clone(),
                country: average.country.clone(),
                avg_temp: average.average,
                difference,
            })
        })
        .collect();
    debug!(
        "{} cities within {} of {}",
        similar_cities.len(),
        tolerance,
        target_city
    );

    Ok(SimilarCities {
        target_city: target_city.to_string(),
        target_avg_temp: target.average,
        similar_cities,
        tolerance,
    })
}

/// Mean and count of `values`, or `DivisionByZero` naming `what` when empty.
fn mean_of<I, F>(values: I, what: F) -> Result<(f64, usize)>
where
    I: Iterator<Item = f64>,
    F: FnOnce() -> String,
{
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), temp| (sum + temp, count + 1));
    if count == 0 {
        return Err(AnalysisError::DivisionByZero(what()));
    }
    Ok((sum / count as f64, count))
}
