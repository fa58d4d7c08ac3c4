//! Renders the Indian American economic impact report as a PDF.
//!
//! The pipeline runs from a [`ReportData`] snapshot through chart rasterisation ([`chart`]) and
//! the content model ([`model`]) to the `genpdf` layout in [`builder`].  [`server`] wraps
//! [`generate_pdf`] in a one-button web page.

pub mod builder;
pub mod chart;
pub mod data;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod model;
pub mod report;
pub mod richtext;
pub mod server;

pub use data::{Contribution, ReportData, Rgb};
pub use error::{ReportError, Result};
pub use report::{generate_pdf, DOWNLOAD_FILE_NAME};
