use clap::{Parser, Subcommand};
use lib::{
    AnalysisConfig, AnalysisError, Season, SimpleLogger, SourceFormat, TemperatureUnit,
    available_cities, average_temperatures, compare_decades, monthly_temperatures,
    seasonal_average, similar_cities, temperature_extremes, temperature_trends,
};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input dataset (CSV or Parquet with City, Country, dt, AverageTemperature)
    #[arg(short, long)]
    input_file: PathBuf,

    /// Input format; guessed from the file extension when omitted
    #[arg(long)]
    format: Option<SourceFormat>,

    /// Temperature unit for output
    #[arg(long, default_value = "celsius")]
    unit: TemperatureUnit,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List distinct cities
    Cities {
        /// Stop after this many distinct cities
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Long-run average temperature of every city
    Averages,
    /// One reading per month for a city
    Monthly { city: String },
    /// Hottest and coldest month of a city
    Extremes { city: String },
    /// Average temperature of a city over one season
    Seasonal {
        city: String,
        #[arg(long, default_value = "summer")]
        season: Season,
    },
    /// Compare two decades for a city (e.g. 1980 2000)
    Decades {
        city: String,
        decade1: i32,
        decade2: i32,
        /// Differences within this band are reported as stable
        #[arg(long, default_value_t = 0.05)]
        threshold: f64,
    },
    /// Cities whose average temperature is close to the target's
    Similar {
        city: String,
        #[arg(long, default_value_t = 2.0)]
        tolerance: f64,
    },
    /// Annual means, moving averages and warming/cooling periods
    Trends {
        /// Cities to analyze (comma separated)
        #[arg(value_delimiter = ',', required = true)]
        cities: Vec<String>,
        /// Moving average window in years
        #[arg(short, long, default_value_t = 5)]
        window_size: usize,
    },
}

fn main() -> Result<(), AnalysisError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER).map_err(|err| AnalysisError::Data(err.to_string()))?;

    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    let format = args
        .format
        .unwrap_or_else(|| SourceFormat::from_path(&args.input_file));
    let mut config = AnalysisConfig {
        unit: args.unit,
        ..AnalysisConfig::default()
    };
    debug!(
        "Input file: {} | Format: {:?} | Unit: {:?}",
        args.input_file.display(),
        format,
        config.unit
    );

    let path = args.input_file.as_path();
    match args.command {
        Command::Cities { limit } => print_json(&available_cities(path, format, limit)?)?,
        Command::Averages => print_json(&average_temperatures(path, format, &config)?)?,
        Command::Monthly { city } => {
            let monthly = monthly_temperatures(path, format, &city, &config)?;
            print_json(&monthly)?
        }
        Command::Extremes { city } => {
            print_json(&temperature_extremes(path, format, &city, &config)?)?
        }
        Command::Seasonal { city, season } => {
            print_json(&seasonal_average(path, format, &city, season, &config)?)?
        }
        Command::Decades {
            city,
            decade1,
            decade2,
            threshold,
        } => {
            config.stable_threshold = threshold;
            print_json(&compare_decades(
                path, format, &city, decade1, decade2, &config,
            )?)?
        }
        Command::Similar { city, tolerance } => {
            config.similarity_tolerance = tolerance;
            print_json(&similar_cities(path, format, &city, &config)?)?
        }
        Command::Trends {
            cities,
            window_size,
        } => {
            config.window_size = window_size;
            let processing_start = Instant::now();
            // Each city is an independent scan of the file.
            let reports = cities
                .par_iter()
                .map(|city| temperature_trends(path, format, city, &config))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(
                "Trend analysis of {} cities took {:.2?}",
                reports.len(),
                processing_start.elapsed()
            );
            print_json(&reports)?
        }
    }

    debug!("Total runtime: {:.2?}", total_start.elapsed());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnalysisError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}
