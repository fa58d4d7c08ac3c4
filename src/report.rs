//! Assembly of the economic impact report.
//!
//! [`build_report`] arranges the dataset into headed sections; [`generate_pdf`] runs the whole
//! pipeline from validation to PDF bytes.

use image::DynamicImage;
use log::info;

use crate::builder::{PdfBuilder, RenderedPdf};
use crate::chart::{self, ChartOptions};
use crate::data::ReportData;
use crate::error::{ReportError, Result};
use crate::fonts::{self, FontSet};
use crate::model::{
    Block, DataTable, HorizontalAlignment, ImageBlock, ImageSource, Report, RichParagraph,
    RowStyle, Section, TableRow,
};

/// File name offered to the browser and used by the CLI by default.
pub const DOWNLOAD_FILE_NAME: &str = "Indian_Diaspora_Report_2025.pdf";

pub const SUMMARY_HEADING: &str = "Executive Summary";
pub const TABLE_HEADING: &str = "Key Economic Contributions (2025)";
pub const BAR_CHART_HEADING: &str = "Economic Contribution by Category";
pub const PIE_CHART_HEADING: &str = "Distribution of Economic Impact";
pub const ANALYSIS_HEADING: &str = "Detailed Analysis";
pub const CONCLUSION_HEADING: &str = "Conclusion";
pub const SOURCES_HEADING: &str = "Data Sources";

const TABLE_HEADER: [&str; 3] = ["Category", "Value (USD)", "% of Total Contribution"];
const TABLE_COLUMN_WEIGHTS: [usize; 3] = [5, 3, 3];
const BAR_CHART_WIDTH_MM: f64 = 152.4;
const PIE_CHART_WIDTH_MM: f64 = 127.0;

/// Rasters of both report charts.
#[derive(Clone)]
pub struct ReportCharts {
    pub bar: DynamicImage,
    pub pie: DynamicImage,
}

impl ReportCharts {
    /// Draws both charts for `data`.
    pub fn render(data: &ReportData, fonts: &FontSet, options: &ChartOptions) -> Result<Self> {
        Ok(Self {
            bar: chart::render_bar_chart(data, fonts, options)?,
            pie: chart::render_pie_chart(data, fonts, options)?,
        })
    }
}

/// Escapes text so it is printed literally when parsed as markup.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn markup(context: &str, text: &str) -> Result<RichParagraph> {
    RichParagraph::from_markup(text).map_err(|source| ReportError::Markup {
        context: context.to_owned(),
        source,
    })
}

/// The contributions table: header, one row per category, and the total.
pub fn contributions_table(data: &ReportData) -> DataTable {
    let header = TableRow::new(TABLE_HEADER, RowStyle::Header);
    let rows = data.contributions.iter().map(|c| {
        TableRow::new(
            [
                c.category.clone(),
                c.value_label(),
                format!("{}%", c.share_percent),
            ],
            RowStyle::Body,
        )
    });
    let share_total: u32 = data
        .contributions
        .iter()
        .map(|c| u32::from(c.share_percent))
        .sum();
    let total = TableRow::new(
        [
            data.total_label.clone(),
            data.total_label_value(),
            format!("{share_total}%"),
        ],
        RowStyle::Total,
    );

    DataTable::new(TABLE_COLUMN_WEIGHTS)
        .with_row(header)
        .with_rows(rows)
        .with_row(total)
}

/// One bullet per category with a bold lead-in naming the category and its value.
pub fn analysis_points(data: &ReportData) -> Result<Vec<RichParagraph>> {
    data.contributions
        .iter()
        .map(|c| {
            let text = format!(
                "<b>{} (${} Billion):</b> {}",
                escape_markup(&c.category),
                c.value_billions,
                c.detail
            );
            markup(&format!("details of '{}'", c.category), &text)
        })
        .collect()
}

/// Arranges the dataset and the chart rasters into the report structure.
pub fn build_report(data: &ReportData, charts: ReportCharts) -> Result<Report> {
    let chart_block = |image: DynamicImage, width_mm: f64| {
        Block::Image(
            ImageBlock::new(ImageSource::Raster(image))
                .with_alignment(HorizontalAlignment::Center)
                .with_width_mm(width_mm),
        )
    };

    let report = Report::new(data.title.clone())
        .with_section(
            Section::new(SUMMARY_HEADING)
                .with_block(Block::Paragraph(markup("summary", &data.summary)?))
                .with_block(Block::Spacer(12.0)),
        )
        .with_section(
            Section::new(TABLE_HEADING)
                .with_block(Block::Table(contributions_table(data)))
                .with_block(Block::Spacer(20.0)),
        )
        .with_section(
            Section::new(BAR_CHART_HEADING)
                .with_block(chart_block(charts.bar, BAR_CHART_WIDTH_MM))
                .with_block(Block::Spacer(12.0)),
        )
        .with_section(
            Section::new(PIE_CHART_HEADING)
                .with_block(chart_block(charts.pie, PIE_CHART_WIDTH_MM))
                .with_block(Block::Spacer(12.0)),
        )
        .with_section(
            Section::new(ANALYSIS_HEADING)
                .with_block(Block::Bullets(analysis_points(data)?))
                .with_block(Block::Spacer(12.0)),
        )
        .with_section(
            Section::new(CONCLUSION_HEADING)
                .with_block(Block::Paragraph(markup("conclusion", &data.conclusion)?))
                .with_block(Block::Spacer(12.0)),
        )
        .with_section(
            Section::new(SOURCES_HEADING)
                .with_block(Block::Paragraph(markup("sources", &data.sources)?)),
        );

    Ok(report)
}

/// Validates `data`, draws the charts and renders the finished report with the given fonts.
pub fn generate_pdf_with_fonts(
    data: &ReportData,
    fonts: FontSet,
    options: &ChartOptions,
) -> Result<RenderedPdf> {
    data.validate()?;
    let charts = ReportCharts::render(data, &fonts, options)?;
    let report = build_report(data, charts)?;
    let pdf = PdfBuilder::new(report).with_fonts(fonts).render()?;
    info!("Generated '{}' ({} bytes)", data.title, pdf.bytes.len());
    Ok(pdf)
}

/// Renders the report for `data` using the default fonts and chart options.
pub fn generate_pdf(data: &ReportData) -> Result<RenderedPdf> {
    data.validate()?;
    let fonts = fonts::default_font_set().map_err(ReportError::FontLoad)?;
    generate_pdf_with_fonts(data, fonts, &ChartOptions::default())
}
