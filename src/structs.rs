use log::{Log, Metadata, Record as LogRecord};
use serde::{Deserialize, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

/// Simple logger implementation
///
/// Writes to stderr so report output on stdout stays machine readable.
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &LogRecord) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// A single valid monthly temperature reading for one city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city: String,
    pub year: i32,
    pub month: u32,
    pub temperature: f64,
}

impl Observation {
    pub fn year_month(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

/// Calendar month key, ordered chronologically and rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Temperature unit conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

/// Meteorological seasons (northern hemisphere month grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn months(self) -> [u32; 3] {
        match self {
            Season::Spring => [3, 4, 5],
            Season::Summer => [6, 7, 8],
            Season::Autumn => [9, 10, 11],
            Season::Winter => [12, 1, 2],
        }
    }

    pub fn contains(self, month: u32) -> bool {
        self.months().contains(&month)
    }
}

/// Configuration shared by the analysis operations
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Unit readings are converted to at ingestion
    pub unit: TemperatureUnit,
    /// Trailing window, in years, for the moving average
    pub window_size: usize,
    /// Maximum absolute difference of averages for two cities to count as similar
    pub similarity_tolerance: f64,
    /// Decade differences within this band are reported as stable
    pub stable_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            unit: TemperatureUnit::Celsius,
            window_size: 5,
            similarity_tolerance: 2.0,
            stable_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extreme {
    pub date: YearMonth,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremes {
    pub city: String,
    pub hottest: Extreme,
    pub coldest: Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalAverage {
    pub city: String,
    pub season: Season,
    pub average_temperature: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecadeTrend {
    Warming,
    Cooling,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecadeSummary {
    pub period: String,
    pub avg_temp: f64,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecadeComparison {
    pub city: String,
    pub decade1: DecadeSummary,
    pub decade2: DecadeSummary,
    pub difference: f64,
    pub trend: DecadeTrend,
}

/// Long-run average of every valid reading for one city
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityAverage {
    pub country: String,
    pub average: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCity {
    pub city: String,
    pub country: String,
    pub avg_temp: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCities {
    pub target_city: String,
    pub target_avg_temp: f64,
    pub similar_cities: Vec<SimilarCity>,
    pub tolerance: f64,
}

/// Mean temperature of one calendar year
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualMean {
    pub year: i32,
    pub mean: f64,
}

/// A closed run of consistently warming or cooling annual means
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSegment {
    pub start_year: i32,
    pub end_year: i32,
    /// Change in annual mean per elapsed year: `(end_mean - start_mean) / (end_year - start_year)`
    pub average_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub overall_slope: f64,
    pub warming_periods: Vec<TrendSegment>,
    pub cooling_periods: Vec<TrendSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub city: String,
    pub annual_means: BTreeMap<i32, f64>,
    pub moving_averages: BTreeMap<i32, f64>,
    pub trend_analysis: TrendAnalysis,
}
