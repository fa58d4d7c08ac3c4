//! Data structures describing the logical content of the report.
//!
//! The model sits between the dataset and the layout engine: [`crate::report`] fills it with
//! text, tables and chart rasters, and [`crate::builder::PdfBuilder`] turns it into `genpdf`
//! elements.  Keeping the two apart lets tests inspect the document structure without
//! rendering a PDF.

use std::fmt;

use image::{DynamicImage, GenericImageView};

use crate::richtext::{parse_markup, ParseError, Span};

/// Horizontal placement of paragraphs and images.
///
/// Maps directly to [`genpdf::Alignment`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl From<HorizontalAlignment> for genpdf::Alignment {
    fn from(value: HorizontalAlignment) -> Self {
        match value {
            HorizontalAlignment::Left => genpdf::Alignment::Left,
            HorizontalAlignment::Center => genpdf::Alignment::Center,
            HorizontalAlignment::Right => genpdf::Alignment::Right,
        }
    }
}

/// Rich text paragraph carrying inline styling information and alignment metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RichParagraph {
    spans: Vec<Span>,
    alignment: HorizontalAlignment,
}

impl RichParagraph {
    /// Creates a paragraph from the provided spans using left alignment.
    pub fn new(spans: impl Into<Vec<Span>>) -> Self {
        Self {
            spans: spans.into(),
            ..Self::default()
        }
    }

    /// Parses inline markup (see [`crate::richtext`]) into a paragraph.
    pub fn from_markup(markup: &str) -> Result<Self, ParseError> {
        Ok(Self::new(parse_markup(markup)?))
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    /// Concatenated text of all spans without styling.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }

    /// Sets the alignment and returns the updated paragraph.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// Visual role of a table row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowStyle {
    /// Column titles: dark background, light bold text.
    Header,
    #[default]
    Body,
    /// Summary row: light background, bold text.
    Total,
}

/// A single table row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    cells: Vec<String>,
    style: RowStyle,
}

impl TableRow {
    pub fn new<I, S>(cells: I, style: RowStyle) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            style,
        }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn style(&self) -> RowStyle {
        self.style
    }
}

/// A gridded table of single-line text cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataTable {
    column_weights: Vec<usize>,
    rows: Vec<TableRow>,
}

impl DataTable {
    /// Creates an empty table whose columns share the width in the given proportions.
    pub fn new(column_weights: impl Into<Vec<usize>>) -> Self {
        Self {
            column_weights: column_weights.into(),
            rows: Vec::new(),
        }
    }

    pub fn column_weights(&self) -> &[usize] {
        &self.column_weights
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.column_weights.len()
    }

    /// Appends a row and returns the updated table.
    pub fn with_row(mut self, row: TableRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Extends the table with multiple rows.
    pub fn with_rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = TableRow>,
    {
        self.rows.extend(rows);
        self
    }

    /// Returns the index of the first row whose cell count differs from the column count.
    pub fn first_ragged_row(&self) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.cells.len() != self.column_count())
    }
}

/// Representation of image sources supported by the content model.
#[derive(Clone)]
pub enum ImageSource {
    /// Encoded image (PNG, JPEG, ...) loaded from raw bytes.
    Bytes(Vec<u8>),
    /// Already decoded raster, as produced by the chart renderer.
    Raster(DynamicImage),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Raster(image) => {
                let (width, height) = image.dimensions();
                write!(f, "Raster({width}x{height})")
            }
        }
    }
}

/// An image placed in the flow of the document.
///
/// The width is stored in millimetres; the height follows from the aspect ratio.
#[derive(Clone, Debug)]
pub struct ImageBlock {
    source: ImageSource,
    alignment: HorizontalAlignment,
    width_mm: Option<f64>,
}

impl ImageBlock {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            alignment: HorizontalAlignment::Center,
            width_mm: None,
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn alignment(&self) -> HorizontalAlignment {
        self.alignment
    }

    pub fn width_mm(&self) -> Option<f64> {
        self.width_mm
    }

    /// Sets the alignment and returns the updated image block.
    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Constrains the rendered width (in millimetres) and returns the updated block.
    pub fn with_width_mm(mut self, width_mm: impl Into<Option<f64>>) -> Self {
        self.width_mm = width_mm.into();
        self
    }
}

/// Individual content blocks that make up a section.
#[derive(Clone, Debug)]
pub enum Block {
    Paragraph(RichParagraph),
    /// Bulleted list, one paragraph per item.
    Bullets(Vec<RichParagraph>),
    Table(DataTable),
    Image(ImageBlock),
    /// Vertical gap in typographic points.
    Spacer(f64),
    PageBreak,
}

impl Block {
    /// Convenience helper for building a paragraph block.
    pub fn paragraph(spans: impl Into<Vec<Span>>) -> Self {
        Self::Paragraph(RichParagraph::new(spans))
    }
}

/// A headed section of the report.
#[derive(Clone, Debug)]
pub struct Section {
    title: String,
    blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block and returns the updated section.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Extends the section with additional blocks and returns the updated instance.
    pub fn with_blocks<I>(mut self, blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        self.blocks.extend(blocks);
        self
    }
}

/// The complete document: a centred title followed by sections.
#[derive(Clone, Debug)]
pub struct Report {
    title: String,
    sections: Vec<Section>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Looks up a section by its heading.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title == title)
    }

    /// Appends a section and returns the updated report.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}
