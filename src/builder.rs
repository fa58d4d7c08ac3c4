//! Document construction: page setup and conversion of a [`Report`] into PDF bytes.

use genpdf::elements::{FrameCellDecorator, PageBreak, Paragraph, TableLayout, UnorderedList};
use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{self, Color, Style, StyledString};
use genpdf::{self, Alignment, Element, Margins, Mm, PageDecorator, PaperSize, Position, Size};
use log::{debug, info};
use lopdf::Object;

use crate::elements::{self, mm_from_f64, mm_from_points, ShadedCell, VerticalSpace};
use crate::error::{ReportError, Result};
use crate::fonts::{self, FontSet};
use crate::model::{Block, DataTable, ImageSource, Report, RowStyle, Section};
use crate::richtext::paragraph_from_spans;

type ElementFactory = dyn Fn(usize) -> Box<dyn Element>;

/// Builder for `genpdf::Document` instances with page setup applied.
#[derive(Default)]
pub struct DocumentBuilder {
    paper_size: Option<Size>,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl DocumentBuilder {
    /// Creates a new builder instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// US Letter with one-inch side and top margins, a quarter inch at the bottom, and a
    /// page number footer.
    pub fn letter_report() -> Self {
        let inch = mm_from_f64(25.4);
        Self::new()
            .with_paper_size(PaperSize::Letter)
            .with_margins(Margins::trbl(inch, inch, mm_from_f64(6.35), inch))
            .with_footer(mm_from_f64(6.0), |page| {
                Paragraph::new(StyledString::new(
                    format!("Page {page}"),
                    Style::new()
                        .with_font_size(8)
                        .with_color(Color::Rgb(110, 110, 110)),
                ))
                .aligned(Alignment::Right)
            })
    }

    /// Sets the paper size used for newly created documents.
    pub fn with_paper_size(mut self, paper_size: impl Into<Size>) -> Self {
        self.paper_size = Some(paper_size.into());
        self
    }

    /// Sets the margins applied through the page decorator.
    pub fn with_margins(mut self, margins: impl Into<Margins>) -> Self {
        self.margins = Some(margins.into());
        self
    }

    /// Configures a footer callback with a fixed height that is invoked for every page.
    pub fn with_footer<F, E>(mut self, height: impl Into<Mm>, footer: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        self.footer = Some(FooterSpec::new(height, footer));
        self
    }

    /// Builds a `genpdf::Document` using the given fonts.
    pub fn build(self, font_family: FontFamily<FontData>) -> genpdf::Document {
        let mut document = genpdf::Document::new(font_family);

        if let Some(paper_size) = self.paper_size {
            document.set_paper_size(paper_size);
        }

        document.set_page_decorator(ConfiguredPageDecorator::new(self.margins, self.footer));
        document
    }
}

/// Definition of a footer rendered through the page decorator.
pub struct FooterSpec {
    height: Mm,
    factory: Box<ElementFactory>,
}

impl FooterSpec {
    /// Creates a new footer specification.
    pub fn new<F, E>(height: impl Into<Mm>, factory: F) -> Self
    where
        F: Fn(usize) -> E + 'static,
        E: Element + 'static,
    {
        Self {
            height: height.into(),
            factory: Box::new(move |page| Box::new(factory(page)) as Box<dyn Element>),
        }
    }
}

struct ConfiguredPageDecorator {
    page: usize,
    margins: Option<Margins>,
    footer: Option<FooterSpec>,
}

impl ConfiguredPageDecorator {
    fn new(margins: Option<Margins>, footer: Option<FooterSpec>) -> Self {
        Self {
            page: 0,
            margins,
            footer,
        }
    }
}

impl PageDecorator for ConfiguredPageDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: style::Style,
    ) -> Result<genpdf::render::Area<'a>, Error> {
        self.page += 1;

        if let Some(margins) = self.margins {
            area.add_margins(margins);
        }

        if let Some(footer) = &self.footer {
            let available = area.size().height;
            if footer.height > available {
                return Err(Error::new(
                    "Footer height exceeds available space",
                    ErrorKind::InvalidData,
                ));
            }

            let mut footer_area = area.clone();
            footer_area.add_offset(Position::new(0, available - footer.height));
            let mut element = (footer.factory)(self.page);
            let result = element.render(context, footer_area, style)?;
            if result.has_more {
                return Err(Error::new(
                    "Footer element does not fit into the reserved space",
                    ErrorKind::PageSizeExceeded,
                ));
            }

            area.set_height(available - footer.height);
        }

        Ok(area)
    }
}

/// Colours and type sizes used when laying out a [`Report`].
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub title_size: u8,
    pub heading_size: u8,
    pub body_size: u8,
    pub table_header_size: u8,
    pub accent: Color,
    pub table_header_fill: Color,
    pub table_header_text: Color,
    pub table_total_fill: Color,
    /// Space below the title, in points.
    pub title_space_after: f64,
    /// Space below each heading, in points.
    pub heading_space_after: f64,
    /// Space below each bullet item, in points.
    pub bullet_space_after: f64,
}

impl Default for Theme {
    fn default() -> Self {
        let dark_blue = Color::Rgb(0, 0, 139);
        Self {
            title_size: 18,
            heading_size: 14,
            body_size: 10,
            table_header_size: 12,
            accent: dark_blue,
            table_header_fill: dark_blue,
            table_header_text: Color::Rgb(245, 245, 245),
            table_total_fill: Color::Rgb(211, 211, 211),
            title_space_after: 20.0,
            heading_space_after: 12.0,
            bullet_space_after: 6.0,
        }
    }
}

/// Output of a successful render.
#[derive(Clone, Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
}

/// Lays out a [`Report`] and renders it to PDF bytes.
pub struct PdfBuilder {
    report: Report,
    document: DocumentBuilder,
    theme: Theme,
    fonts: Option<FontSet>,
}

impl PdfBuilder {
    /// Creates a builder using the letter page setup and default theme.
    pub fn new(report: Report) -> Self {
        Self {
            report,
            document: DocumentBuilder::letter_report(),
            theme: Theme::default(),
            fonts: None,
        }
    }

    /// Uses already loaded fonts instead of searching the default locations.
    pub fn with_fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = Some(fonts);
        self
    }

    /// Renders the report.
    pub fn render(self) -> Result<RenderedPdf> {
        let fonts = match self.fonts {
            Some(fonts) => fonts,
            None => fonts::default_font_set().map_err(ReportError::FontLoad)?,
        };
        let family = fonts.to_font_family().map_err(ReportError::FontLoad)?;

        let mut document = self.document.build(family);
        document.set_title(self.report.title());
        document.set_font_size(self.theme.body_size);

        let layout = Layout { theme: &self.theme };
        layout.push_title(&mut document, self.report.title());
        for section in self.report.sections() {
            layout.push_section(&mut document, section)?;
        }

        let mut raw = Vec::new();
        document.render(&mut raw).map_err(ReportError::Render)?;
        let bytes = compress_streams(&raw)?;
        debug!("Compressed PDF streams from {} to {} bytes", raw.len(), bytes.len());
        info!(
            "Rendered '{}' ({} sections, {} bytes)",
            self.report.title(),
            self.report.sections().len(),
            bytes.len()
        );
        Ok(RenderedPdf { bytes })
    }
}

/// Deflates every uncompressed stream of a rendered PDF.
///
/// The XMP metadata stream stays plain text so it remains readable without a PDF parser.
pub fn compress_streams(pdf: &[u8]) -> Result<Vec<u8>> {
    let mut document = lopdf::Document::load_mem(pdf).map_err(ReportError::Compress)?;
    for object in document.objects.values_mut() {
        if let Object::Stream(stream) = object {
            if stream.dict.type_name().ok() == Some("Metadata") {
                continue;
            }
            stream.compress().map_err(ReportError::Compress)?;
        }
    }

    let mut bytes = Vec::with_capacity(pdf.len() / 2);
    document.save_to(&mut bytes).map_err(|err| ReportError::Compress(err.into()))?;
    Ok(bytes)
}

fn space_below(points: f64) -> Margins {
    let zero = Mm::default();
    Margins::trbl(zero, zero, mm_from_points(points), zero)
}

struct Layout<'a> {
    theme: &'a Theme,
}

impl Layout<'_> {
    fn push_title(&self, document: &mut genpdf::Document, title: &str) {
        let style = Style::new()
            .bold()
            .with_font_size(self.theme.title_size)
            .with_color(self.theme.accent);
        document.push(Paragraph::new(StyledString::new(title, style)).aligned(Alignment::Center));
        document.push(VerticalSpace::points(self.theme.title_space_after));
    }

    fn push_section(&self, document: &mut genpdf::Document, section: &Section) -> Result<()> {
        debug!("Laying out section '{}'", section.title());
        let style = Style::new()
            .bold()
            .with_font_size(self.theme.heading_size)
            .with_color(self.theme.accent);
        document.push(
            Paragraph::new(StyledString::new(section.title(), style))
                .padded(space_below(self.theme.heading_space_after)),
        );

        for block in section.blocks() {
            self.push_block(document, block)?;
        }
        Ok(())
    }

    fn push_block(&self, document: &mut genpdf::Document, block: &Block) -> Result<()> {
        match block {
            Block::Paragraph(paragraph) => {
                document.push(
                    paragraph_from_spans(paragraph.spans()).aligned(paragraph.alignment().into()),
                );
            }
            Block::Bullets(items) => {
                let mut list = UnorderedList::with_bullet("\u{2022}");
                for item in items {
                    list.push(
                        paragraph_from_spans(item.spans())
                            .aligned(item.alignment().into())
                            .padded(space_below(self.theme.bullet_space_after)),
                    );
                }
                document.push(list);
            }
            Block::Table(table) => document.push(self.table(table)?),
            Block::Image(block) => {
                let raster = match block.source() {
                    ImageSource::Raster(image) => image.clone(),
                    ImageSource::Bytes(bytes) => {
                        elements::decode_image_from_bytes(bytes).map_err(ReportError::Render)?
                    }
                };
                let width = block.width_mm().map(mm_from_f64);
                let image = elements::scaled_image(raster, width, block.alignment().into())
                    .map_err(ReportError::Render)?;
                document.push(image);
            }
            Block::Spacer(points) => document.push(VerticalSpace::points(*points)),
            Block::PageBreak => document.push(PageBreak::new()),
        }
        Ok(())
    }

    fn table(&self, table: &DataTable) -> Result<TableLayout> {
        if let Some(index) = table.first_ragged_row() {
            return Err(ReportError::invalid_data(format!(
                "table row {} has {} cells but the table has {} columns",
                index,
                table.rows()[index].cells().len(),
                table.column_count()
            )));
        }

        let mut layout = TableLayout::new(table.column_weights().to_vec());
        layout.set_cell_decorator(FrameCellDecorator::new(true, true, false));

        for row in table.rows() {
            let (style, fill) = match row.style() {
                RowStyle::Header => (
                    Style::new()
                        .bold()
                        .with_font_size(self.theme.table_header_size)
                        .with_color(self.theme.table_header_text),
                    Some(self.theme.table_header_fill),
                ),
                RowStyle::Body => (Style::new(), None),
                RowStyle::Total => (Style::new().bold(), Some(self.theme.table_total_fill)),
            };

            let mut table_row = layout.row();
            for cell in row.cells() {
                table_row.push_element(
                    ShadedCell::new(StyledString::new(cell.as_str(), style)).with_fill(fill),
                );
            }
            table_row.push().map_err(ReportError::Render)?;
        }

        Ok(layout)
    }
}
