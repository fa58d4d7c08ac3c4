//! Error type shared by every stage of report generation.

use std::io;

use crate::richtext::ParseError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReportError> = std::result::Result<T, E>;

/// Failures that can occur while loading data, drawing charts or laying out the PDF.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// No usable font family could be located or decoded.
    #[error("failed to load fonts")]
    FontLoad(#[source] genpdf::error::Error),

    /// The layout engine rejected the document.
    #[error("failed to render PDF")]
    Render(#[source] genpdf::error::Error),

    /// The rendered PDF could not be re-read to deflate its streams.
    #[error("failed to compress PDF streams")]
    Compress(#[source] lopdf::Error),

    /// The chart backend reported a drawing failure.
    #[error("failed to draw chart '{chart}': {message}")]
    Chart {
        /// Title of the chart that failed.
        chart: &'static str,
        /// Message reported by the drawing backend.
        message: String,
    },

    /// The dataset violates one of its invariants.
    #[error("invalid report data: {0}")]
    InvalidData(String),

    /// Inline markup in a paragraph could not be parsed.
    #[error("invalid markup in {context}: {source}")]
    Markup {
        /// Which piece of text contained the markup.
        context: String,
        #[source]
        source: ParseError,
    },

    /// The dataset file could not be decoded.
    #[error("failed to decode report data: {0}")]
    Json(#[from] serde_json::Error),

    /// A chart raster could not be encoded or written.
    #[error("failed to encode chart image: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReportError {
    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    pub(crate) fn chart(chart: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Chart {
            chart,
            message: err.to_string(),
        }
    }
}
