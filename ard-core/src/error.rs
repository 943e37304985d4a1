use thiserror::Error;

use crate::domain::Region;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("tile not found: region={region} h={h} v={v}")]
    TileNotFound { region: Region, h: u16, v: u16 },
}

#[derive(Error, Debug)]
pub enum ArdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Format error: {0}")]
    Format(String),
}

impl From<quick_xml::Error> for ArdError {
    fn from(e: quick_xml::Error) -> Self {
        ArdError::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ArdError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ArdError::Xml(e.to_string())
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ArdError>;
