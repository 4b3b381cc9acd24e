use crate::error::{AnalysisError, Result};
use crate::structs::{Observation, TemperatureUnit, YearMonth};
use arrow_array::{Array, Float64Array, RecordBatch, StringArray};
use arrow_schema::DataType;
use chrono::{Datelike, NaiveDate};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use std::{fs::File, ops::ControlFlow, path::Path};

const DATE_FORMAT: &str = "%Y-%m-%d";

const CITY_COLUMN: &str = "City";
const COUNTRY_COLUMN: &str = "Country";
const DATE_COLUMN: &str = "dt";
const TEMPERATURE_COLUMN: &str = "AverageTemperature";

/// On-disk layout of the temperature dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    /// Picks the format from the file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "parquet" || ext == "pq" => SourceFormat::Parquet,
            _ => SourceFormat::Csv,
        }
    }
}

/// One dataset row after cell-level parsing.
///
/// `date` and `temperature` are `None` when the cell could not be used; such
/// rows still carry their city so that city listings see every name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row<'a> {
    pub city: &'a str,
    pub country: &'a str,
    pub date: Option<YearMonth>,
    pub temperature: Option<f64>,
}

impl Row<'_> {
    pub fn observation(&self) -> Option<Observation> {
        let date = self.date?;
        let temperature = self.temperature?;
        Some(Observation {
            city: self.city.to_string(),
            year: date.year,
            month: date.month,
            temperature,
        })
    }
}

/// Row counters for a single scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub rows: usize,
    pub skipped: usize,
}

impl ScanStats {
    fn record(&mut self, row: &Row<'_>) {
        self.rows += 1;
        if row.date.is_none() || row.temperature.is_none() {
            self.skipped += 1;
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Country", default)]
    country: String,
    #[serde(rename = "dt")]
    date: String,
    #[serde(rename = "AverageTemperature", default)]
    average_temperature: String,
}

/// Scans the whole dataset once, handing every parsed row to `visit`.
///
/// Readings are converted to `unit` before they reach the visitor. The scan
/// stops early when the visitor returns `ControlFlow::Break`.
///
/// # Arguments
///
/// * `path` - Dataset file, CSV with a header row or Parquet
/// * `format` - How to read `path`; see `SourceFormat::from_path`
/// * `unit` - Unit every reading is converted to
/// * `visit` - Called once per row, in file order
///
/// # Returns
///
/// Returns `ScanStats` with the number of rows read and how many of them had
/// no usable date or reading. Short or long CSV rows are read as far as they
/// go; a CSV row missing its city or date is counted as skipped and never
/// reaches `visit`.
///
/// # Errors
///
/// Returns `AnalysisError` if the file cannot be read or is not valid CSV or
/// Parquet, if the CSV header lacks `City` or `dt`, or if a Parquet file
/// lacks one of the `City`, `dt` or `AverageTemperature` columns.
pub fn scan<F>(
    path: &Path,
    format: SourceFormat,
    unit: TemperatureUnit,
    mut visit: F,
) -> Result<ScanStats>
where
    F: FnMut(&Row<'_>) -> ControlFlow<()>,
{
    debug!("Scanning {} as {:?}", path.display(), format);
    let stats = match format {
        SourceFormat::Csv => scan_csv(path, unit, &mut visit)?,
        SourceFormat::Parquet => scan_parquet(path, unit, &mut visit)?,
    };
    debug!(
        "Scanned {} rows, skipped {} unusable readings",
        stats.rows, stats.skipped
    );
    Ok(stats)
}

/// Collects the valid observations of one city, in file order.
pub fn city_observations(
    path: &Path,
    format: SourceFormat,
    unit: TemperatureUnit,
    city: &str,
) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();
    scan(path, format, unit, |row| {
        if row.city == city {
            if let Some(observation) = row.observation() {
                observations.push(observation);
            }
        }
        ControlFlow::Continue(())
    })?;
    debug!("Found {} observations for {}", observations.len(), city);
    Ok(observations)
}

fn scan_csv<F>(path: &Path, unit: TemperatureUnit, visit: &mut F) -> Result<ScanStats>
where
    F: FnMut(&Row<'_>) -> ControlFlow<()>,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?;
    for name in [CITY_COLUMN, DATE_COLUMN] {
        if !headers.iter().any(|header| header == name) {
            return Err(AnalysisError::Data(format!("Column not found: {}", name)));
        }
    }
    let mut stats = ScanStats::default();

    for result in reader.deserialize::<CsvRow>() {
        let record = match result {
            Ok(record) => record,
            Err(err) if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) => {
                debug!("Skipping malformed row: {}", err);
                stats.rows += 1;
                stats.skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let row = Row {
            city: &record.city,
            country: &record.country,
            date: parse_year_month(&record.date),
            temperature: parse_temperature(&record.average_temperature)
                .map(|temp| convert_temp(temp, unit)),
        };
        stats.record(&row);
        if visit(&row).is_break() {
            break;
        }
    }

    Ok(stats)
}

fn scan_parquet<F>(path: &Path, unit: TemperatureUnit, visit: &mut F) -> Result<ScanStats>
where
    F: FnMut(&Row<'_>) -> ControlFlow<()>,
{
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut stats = ScanStats::default();

    for batch_result in reader {
        let batch = batch_result.map_err(AnalysisError::Arrow)?;
        let city_col = get_column_str(&batch, CITY_COLUMN)?;
        let country_col = match batch.column_by_name(COUNTRY_COLUMN) {
            Some(_) => Some(get_column_str(&batch, COUNTRY_COLUMN)?),
            None => None,
        };
        let date_col = get_column_str(&batch, DATE_COLUMN)?;
        let temp_col = TemperatureColumn::from_batch(&batch, TEMPERATURE_COLUMN)?;

        for i in 0..batch.num_rows() {
            let row = Row {
                city: city_col.value(i),
                country: country_col.map_or("", |col| col.value(i)),
                date: if date_col.is_null(i) {
                    None
                } else {
                    parse_year_month(date_col.value(i))
                },
                temperature: temp_col.value(i).map(|temp| convert_temp(temp, unit)),
            };
            stats.record(&row);
            if visit(&row).is_break() {
                return Ok(stats);
            }
        }
    }

    Ok(stats)
}

/// Temperature column as stored in Parquet: either numeric or text.
enum TemperatureColumn<'a> {
    Numeric(&'a Float64Array),
    Text(&'a StringArray),
}

impl<'a> TemperatureColumn<'a> {
    fn from_batch(batch: &'a RecordBatch, name: &str) -> Result<Self> {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| AnalysisError::Data(format!("Column not found: {}", name)))?;
        match column.data_type() {
            DataType::Float64 => Ok(TemperatureColumn::Numeric(get_column_f64(batch, name)?)),
            DataType::Utf8 => Ok(TemperatureColumn::Text(get_column_str(batch, name)?)),
            other => Err(AnalysisError::Data(format!(
                "Column {} has unsupported type {:?}",
                name, other
            ))),
        }
    }

    fn value(&self, i: usize) -> Option<f64> {
        match self {
            TemperatureColumn::Numeric(array) => {
                if array.is_null(i) {
                    return None;
                }
                Some(array.value(i)).filter(|temp| temp.is_finite())
            }
            TemperatureColumn::Text(array) => {
                if array.is_null(i) {
                    return None;
                }
                parse_temperature(array.value(i))
            }
        }
    }
}

/// Extracts a Float64 column from an Arrow RecordBatch by name.
///
/// # Errors
///
/// Returns `AnalysisError::Data` if the column is missing or is not Float64.
fn get_column_f64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AnalysisError::Data(format!("Column not found: {}", name)))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| AnalysisError::Data(format!("Column {} is not Float64", name)))
}

/// Extracts a String column from an Arrow RecordBatch by name.
///
/// # Errors
///
/// Returns `AnalysisError::Data` if the column is missing or is not Utf8.
fn get_column_str<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AnalysisError::Data(format!("Column not found: {}", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AnalysisError::Data(format!("Column {} is not Utf8/String", name)))
}

/// Parses a temperature cell.
///
/// Empty, non-numeric and non-finite cells yield `None`: the row is skipped,
/// not reported.
pub fn parse_temperature(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|temp| temp.is_finite())
}

/// Reads the `YYYY-MM` prefix of a `dt` cell such as `1849-01-01`.
pub fn parse_year_month(dt: &str) -> Option<YearMonth> {
    let prefix = dt.trim().get(..7)?;
    let date = NaiveDate::parse_from_str(&format!("{}-01", prefix), DATE_FORMAT).ok()?;
    Some(YearMonth {
        year: date.year(),
        month: date.month(),
    })
}

/// Converts temperature from Celsius to the specified unit.
///
/// - **Celsius**: No conversion (identity)
/// - **Fahrenheit**: °F = (°C × 9/5) + 32
/// - **Kelvin**: K = °C + 273.15
pub fn convert_temp(temp_celsius: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => temp_celsius,
        TemperatureUnit::Fahrenheit => temp_celsius * 9.0 / 5.0 + 32.0,
        TemperatureUnit::Kelvin => temp_celsius + 273.15,
    }
}
