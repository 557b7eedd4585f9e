// Error taxonomy for the inventory core
// Workbook and transport failures fail a whole pass; row-level problems never reach here

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The byte stream is not a readable workbook
    #[error("failed to open workbook: {0}")]
    Workbook(String),

    #[error("workbook has no worksheet")]
    NoWorksheet,

    #[error("file '{name}' not found in folder '{folder_id}'")]
    FileNotFound { folder_id: String, name: String },

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("invalid quantity '{0}': expected a whole number")]
    InvalidQuantity(String),

    #[error("remote drive error: {0}")]
    Transport(String),

    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
