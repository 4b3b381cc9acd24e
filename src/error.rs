use arrow_schema::ArrowError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Data Error: {0}")]
    Data(String),
    #[error("No valid temperature observations for {city}")]
    EmptySeries { city: String },
    #[error("Not enough distinct years for {city} to compute a slope")]
    InsufficientRange { city: String },
    #[error("Division by zero: no data points for {0}")]
    DivisionByZero(String),
    #[error("Unknown city: {0}")]
    UnknownCity(String),
    #[error("Invalid decade {0}: must be a multiple of 10")]
    InvalidDecade(i32),
    #[error("Invalid moving average window: {0}")]
    InvalidWindow(usize),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
