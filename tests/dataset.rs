use arrow_array::{Float64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use lib::{
    AnalysisConfig, AnalysisError, DecadeTrend, Season, SourceFormat, TemperatureUnit,
    available_cities, average_temperatures, city_observations, compare_decades,
    monthly_temperatures, scan, seasonal_average, similar_cities, temperature_extremes,
    temperature_trends,
};
use parquet::arrow::ArrowWriter;
use std::{fs::File, io::Write, ops::ControlFlow, path::Path, sync::Arc};
use tempfile::TempDir;

const HEADER: &str = "dt,AverageTemperature,AverageTemperatureUncertainty,City,Country,Latitude,Longitude";

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Small dataset in the layout of the Berkeley Earth major-city file.
fn sample_rows() -> Vec<String> {
    let rows = [
        ("1980-01-01", "25.0", "Kano", "Nigeria"),
        ("1980-07-01", "27.0", "Kano", "Nigeria"),
        ("1980-01-01", "15.0", "Cairo", "Egypt"),
        ("1981-01-01", "", "Kano", "Nigeria"),
        ("1981-07-01", "30.0", "Kano", "Nigeria"),
        ("1982-01-01", "24.0", "Kano", "Nigeria"),
        ("1982-07-01", "n/a", "Kano", "Nigeria"),
        ("1982-01-01", "16.0", "Cairo", "Egypt"),
        ("1983-07-01", "29.0", "Kano", "Nigeria"),
        ("1983-01-01", "27.0", "Lagos", "Nigeria"),
        ("2000-07-01", "31.0", "Kano", "Nigeria"),
        ("2000-01-01", "", "Oslo", "Norway"),
    ];
    rows.iter()
        .map(|(dt, temp, city, country)| {
            format!("{},{},0.5,{},{},12.05N,8.38E", dt, temp, city, country)
        })
        .collect()
}

fn write_csv(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("GlobalLandTemperaturesByMajorCity.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in sample_rows() {
        writeln!(file, "{}", row).unwrap();
    }
    path
}

fn write_parquet(dir: &TempDir, path_name: &str) -> std::path::PathBuf {
    let schema = Arc::new(Schema::new(vec![
        Field::new("dt", DataType::Utf8, false),
        Field::new("AverageTemperature", DataType::Float64, true),
        Field::new("City", DataType::Utf8, false),
        Field::new("Country", DataType::Utf8, false),
    ]));

    let dates = StringArray::from(vec!["1990-01-01", "1990-06-01", "1991-01-01", "1992-01-01"]);
    let temps = Float64Array::from(vec![Some(10.0), Some(14.0), None, Some(9.0)]);
    let cities = StringArray::from(vec!["Paris", "Paris", "Paris", "Paris"]);
    let countries = StringArray::from(vec!["France", "France", "France", "France"]);

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(dates),
            Arc::new(temps),
            Arc::new(cities),
            Arc::new(countries),
        ],
    )
    .unwrap();

    let path = dir.path().join(path_name);
    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
}

fn csv_format(path: &Path) -> SourceFormat {
    SourceFormat::from_path(path)
}

#[test]
fn unusable_readings_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let observations =
        city_observations(&path, csv_format(&path), TemperatureUnit::Celsius, "Kano").unwrap();
    let temps: Vec<_> = observations.iter().map(|o| o.temperature).collect();
    assert_eq!(temps, vec![25.0, 27.0, 30.0, 24.0, 29.0, 31.0]);
}

#[test]
fn city_listing_sees_every_row() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let format = csv_format(&path);

    let all = available_cities(&path, format, None).unwrap();
    assert_eq!(all, vec!["Cairo", "Kano", "Lagos", "Oslo"]);

    let first_two = available_cities(&path, format, Some(2)).unwrap();
    assert_eq!(first_two, vec!["Cairo", "Kano"]);

    let unlimited = available_cities(&path, format, Some(0)).unwrap();
    assert_eq!(unlimited, all);
}

#[test]
fn ragged_rows_do_not_stop_the_scan() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ragged.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "dt,AverageTemperature,City,Country").unwrap();
    writeln!(file, "1980-01-01,1.0,Kano,Nigeria").unwrap();
    writeln!(file, "1981-01-01,,Kano").unwrap();
    writeln!(file, "1981-06-01,2.0").unwrap();
    writeln!(file, "1982-01-01,3.0,Kano,Nigeria,extra").unwrap();
    drop(file);

    let mut rows = 0;
    let stats = scan(&path, SourceFormat::Csv, TemperatureUnit::Celsius, |_| {
        rows += 1;
        ControlFlow::Continue(())
    })
    .unwrap();
    assert_eq!(stats.rows, 4);
    assert_eq!(stats.skipped, 2);
    assert_eq!(rows, 3);

    let observations =
        city_observations(&path, SourceFormat::Csv, TemperatureUnit::Celsius, "Kano").unwrap();
    let temps: Vec<_> = observations.iter().map(|o| o.temperature).collect();
    assert_eq!(temps, vec![1.0, 3.0]);
}

#[test]
fn csv_without_city_column_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no_city.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "dt,AverageTemperature,Country").unwrap();
    writeln!(file, "1980-01-01,1.0,Nigeria").unwrap();
    drop(file);

    assert!(matches!(
        available_cities(&path, SourceFormat::Csv, None),
        Err(AnalysisError::Data(_))
    ));
}

#[test]
fn monthly_and_extremes() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let format = csv_format(&path);
    let config = AnalysisConfig::default();

    let monthly = monthly_temperatures(&path, format, "Kano", &config).unwrap();
    let keys: Vec<_> = monthly.keys().map(|ym| ym.to_string()).collect();
    assert_eq!(
        keys,
        vec!["1980-01", "1980-07", "1981-07", "1982-01", "1983-07", "2000-07"]
    );

    let extremes = temperature_extremes(&path, format, "Kano", &config).unwrap();
    assert_eq!(extremes.hottest.date.to_string(), "2000-07");
    assert_eq!(extremes.hottest.temperature, 31.0);
    assert_eq!(extremes.coldest.date.to_string(), "1982-01");

    assert!(matches!(
        temperature_extremes(&path, format, "Oslo", &config),
        Err(AnalysisError::EmptySeries { .. })
    ));
}

#[test]
fn seasons_and_decades() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let format = csv_format(&path);
    let config = AnalysisConfig::default();

    let summer = seasonal_average(&path, format, "Kano", Season::Summer, &config).unwrap();
    assert_eq!(summer.data_points, 4);
    assert!(close(summer.average_temperature, (27.0 + 30.0 + 29.0 + 31.0) / 4.0));

    let decades = compare_decades(&path, format, "Kano", 1980, 2000, &config).unwrap();
    assert_eq!(decades.decade1.data_points, 5);
    assert!(close(decades.decade1.avg_temp, 27.0));
    assert!(close(decades.difference, 4.0));
    assert_eq!(decades.trend, DecadeTrend::Warming);

    assert!(matches!(
        compare_decades(&path, format, "Kano", 1980, 1990, &config),
        Err(AnalysisError::DivisionByZero(_))
    ));
    assert!(matches!(
        compare_decades(&path, format, "Kano", 1981, 1990, &config),
        Err(AnalysisError::InvalidDecade(1981))
    ));
}

#[test]
fn averages_and_similarity() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let format = csv_format(&path);
    let config = AnalysisConfig::default();

    let averages = average_temperatures(&path, format, &config).unwrap();
    assert!(!averages.contains_key("Oslo"));
    assert_eq!(averages["Kano"].count, 6);
    assert_eq!(averages["Kano"].country, "Nigeria");
    assert!(close(averages["Cairo"].average, 15.5));

    let similar = similar_cities(&path, format, "Lagos", &config).unwrap();
    let names: Vec<_> = similar
        .similar_cities
        .iter()
        .map(|c| c.city.as_str())
        .collect();
    assert_eq!(names, vec!["Kano"]);

    let wide = AnalysisConfig {
        similarity_tolerance: 20.0,
        ..AnalysisConfig::default()
    };
    let similar = similar_cities(&path, format, "Lagos", &wide).unwrap();
    assert_eq!(similar.similar_cities.len(), 2);

    assert!(matches!(
        similar_cities(&path, format, "Oslo", &config),
        Err(AnalysisError::UnknownCity(_))
    ));
}

#[test]
fn trends_from_csv() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let format = csv_format(&path);
    let config = AnalysisConfig {
        window_size: 2,
        ..AnalysisConfig::default()
    };

    let report = temperature_trends(&path, format, "Kano", &config).unwrap();
    let years: Vec<_> = report.annual_means.keys().copied().collect();
    assert_eq!(years, vec![1980, 1981, 1982, 1983, 2000]);
    assert!(close(report.annual_means[&1980], 26.0));

    // 1980 has two readings and 1981 one: (25 + 27 + 30) / 3
    assert!(close(report.moving_averages[&1981], 82.0 / 3.0));
    assert_eq!(report.moving_averages.len(), 4);

    let analysis = &report.trend_analysis;
    assert!(close(analysis.overall_slope, (31.0 - 26.0) / 20.0));
    let warming: Vec<_> = analysis
        .warming_periods
        .iter()
        .map(|s| (s.start_year, s.end_year))
        .collect();
    let cooling: Vec<_> = analysis
        .cooling_periods
        .iter()
        .map(|s| (s.start_year, s.end_year))
        .collect();
    assert_eq!(warming, vec![(1980, 1981), (1982, 2000)]);
    assert_eq!(cooling, vec![(1981, 1982)]);

    assert!(matches!(
        temperature_trends(&path, format, "Oslo", &config),
        Err(AnalysisError::EmptySeries { .. })
    ));
    assert!(matches!(
        temperature_trends(&path, format, "Lagos", &config),
        Err(AnalysisError::InsufficientRange { .. })
    ));
}

#[test]
fn parquet_input() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(&dir, "paris.parquet");
    let format = SourceFormat::from_path(&path);
    assert_eq!(format, SourceFormat::Parquet);

    let observations =
        city_observations(&path, format, TemperatureUnit::Celsius, "Paris").unwrap();
    assert_eq!(observations.len(), 3);

    let report = temperature_trends(&path, format, "Paris", &AnalysisConfig::default()).unwrap();
    assert!(close(report.annual_means[&1990], 12.0));
    assert!(!report.annual_means.contains_key(&1991));
    assert!(close(report.trend_analysis.overall_slope, -1.5));
    assert_eq!(report.trend_analysis.cooling_periods.len(), 1);
}

#[test]
fn unit_conversion_at_ingestion() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let config = AnalysisConfig {
        unit: TemperatureUnit::Fahrenheit,
        ..AnalysisConfig::default()
    };

    let extremes = temperature_extremes(&path, csv_format(&path), "Kano", &config).unwrap();
    assert!(close(extremes.hottest.temperature, 31.0 * 9.0 / 5.0 + 32.0));
}

#[test]
fn report_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir);
    let report =
        temperature_trends(&path, csv_format(&path), "Kano", &AnalysisConfig::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["city"], "Kano");
    assert!(json["annual_means"]["1980"].is_number());
    assert!(json["trend_analysis"]["warming_periods"].is_array());
}
