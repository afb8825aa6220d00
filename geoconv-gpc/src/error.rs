//! Error types for preprocessing.

use geoconv_data::DataError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpcError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("GPC computation interrupted after {completed} of {total} systems")]
    Interrupted { completed: usize, total: usize },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
