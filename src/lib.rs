pub mod error;
pub mod source;
pub mod structs;
pub mod transform;
pub mod trends;

// Re-export public API
pub use error::{AnalysisError, Result};
pub use source::{Row, ScanStats, SourceFormat, city_observations, scan};
pub use structs::{
    AnalysisConfig, AnnualMean, CityAverage, DecadeComparison, DecadeTrend, Extremes,
    Observation, Season, SeasonalAverage, SimilarCities, SimpleLogger, TemperatureUnit,
    TrendReport, TrendSegment, YearMonth,
};
pub use transform::{
    available_cities, average_temperatures, compare_decades, monthly_temperatures,
    seasonal_average, similar_cities, temperature_extremes,
};
pub use trends::{compute_temperature_trends, temperature_trends};
