use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Data error: {0}")]
    Data(#[from] geoconv_data::DataError),

    #[error("Preprocessing error: {0}")]
    Gpc(#[from] geoconv_gpc::GpcError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{} has no faces; use `preprocess` for point clouds", .0.display())]
    NoFaces(PathBuf),

    #[error("Center {center} out of range for {vertices} vertices")]
    CenterOutOfRange { center: usize, vertices: usize },
}
