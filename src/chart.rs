//! Rasterised charts embedded in the report.
//!
//! Charts are drawn with `plotters` into an in-memory RGB buffer and handed to the layout engine
//! as [`image::DynamicImage`]s.  The raster is sized from the physical dimensions of the chart
//! and the configured DPI so the image lands in the PDF at its intended size without rescaling.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, RgbImage};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};

use crate::data::ReportData;
use crate::error::{ReportError, Result};
use crate::fonts::FontSet;

/// Caption of the bar chart.
pub const BAR_CHART_TITLE: &str = "Economic Contribution by Category (2025, USD Billions)";

/// Caption of the pie chart.
pub const PIE_CHART_TITLE: &str = "Distribution of Economic Impact";

const FONT_NAME: &str = "sans-serif";
const GRID_COLOR: RGBColor = RGBColor(200, 200, 200);
const AXIS_LABEL: &str = "USD Billions";
/// Distance of the outside pie labels from the centre, relative to the radius.
const LABEL_RADIUS: f64 = 1.1;

/// Physical size and resolution of the rendered charts.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartOptions {
    pub dpi: f64,
    /// Bar chart width and height in inches.
    pub bar_size_in: (f64, f64),
    /// Pie chart width and height in inches.
    pub pie_size_in: (f64, f64),
    /// Angle of the first wedge edge, counter-clockwise from the positive x axis.
    pub pie_start_angle_deg: f64,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            dpi: 150.0,
            bar_size_in: (6.0, 4.0),
            pie_size_in: (5.0, 5.0),
            pie_start_angle_deg: 140.0,
        }
    }
}

impl ChartOptions {
    fn pixels(&self, inches: (f64, f64)) -> (u32, u32) {
        let px = |value: f64| (value * self.dpi).round().max(1.0) as u32;
        (px(inches.0), px(inches.1))
    }

    /// Converts a typographic point size to pixels at the configured DPI.
    fn pt(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }

    fn px(&self, points: f64) -> u32 {
        self.pt(points).round() as u32
    }
}

static REGISTERED_FONTS: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Makes the report fonts available to the chart backend.
///
/// The backend keeps a process-wide font table, so each distinct font set is
/// registered once and its bytes live for the rest of the process.
fn register_chart_fonts(fonts: &FontSet) -> Result<()> {
    let mut registered = REGISTERED_FONTS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if registered.as_deref() == Some(fonts.directory()) {
        return Ok(());
    }

    let leak = |bytes: &[u8]| -> &'static [u8] { Box::leak(bytes.to_vec().into_boxed_slice()) };
    let invalid = |_| ReportError::chart("font registration", "invalid TrueType data");
    plotters::style::register_font(FONT_NAME, FontStyle::Normal, leak(fonts.regular()))
        .map_err(invalid)?;
    plotters::style::register_font(FONT_NAME, FontStyle::Bold, leak(fonts.bold()))
        .map_err(invalid)?;

    debug!("Registered {} faces for chart rendering", fonts.family());
    *registered = Some(fonts.directory().to_path_buf());
    Ok(())
}

fn font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::Name(FONT_NAME), size, FontStyle::Normal)
}

fn bold_font(size: f64) -> FontDesc<'static> {
    FontDesc::new(FontFamily::Name(FONT_NAME), size, FontStyle::Bold)
}

/// Top of the value axis: an eighth of headroom above the tallest bar for its label.
fn bar_axis_max(max_value: u64) -> u64 {
    max_value.saturating_add(max_value / 8).saturating_add(1)
}

fn widest_label(labels: &[&str], font: &FontDesc<'_>) -> u32 {
    labels
        .iter()
        .filter_map(|label| font.box_size(label).ok())
        .map(|(width, _)| width)
        .max()
        .unwrap_or(0)
}

/// Regular font at `size`, shrunk until the widest of `labels` fits into `max_width` pixels.
fn fitted_font(labels: &[&str], size: f64, max_width: f64) -> FontDesc<'static> {
    let widest = f64::from(widest_label(labels, &font(size)));
    if widest <= max_width || widest <= 0.0 {
        return font(size);
    }
    font((size * max_width / widest).max(size / 2.0))
}

fn rasterize<F>(title: &'static str, (width, height): (u32, u32), draw: F) -> Result<DynamicImage>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<(), String>,
{
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw(&root).map_err(|err| ReportError::chart(title, err))?;
        root.present().map_err(|err| ReportError::chart(title, err))?;
    }

    let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        ReportError::chart(title, "raster buffer does not match the chart dimensions")
    })?;
    debug!("Rendered '{title}' at {width}x{height} px");
    Ok(DynamicImage::ImageRgb8(image))
}

/// Draws the per-category bar chart.
pub fn render_bar_chart(
    data: &ReportData,
    fonts: &FontSet,
    options: &ChartOptions,
) -> Result<DynamicImage> {
    register_chart_fonts(fonts)?;
    rasterize(BAR_CHART_TITLE, options.pixels(options.bar_size_in), |root| {
        draw_bar_chart(root, data, options).map_err(|err| err.to_string())
    })
}

/// Draws the share-of-total pie chart.
pub fn render_pie_chart(
    data: &ReportData,
    fonts: &FontSet,
    options: &ChartOptions,
) -> Result<DynamicImage> {
    register_chart_fonts(fonts)?;
    rasterize(PIE_CHART_TITLE, options.pixels(options.pie_size_in), |root| {
        draw_pie_chart(root, data, options).map_err(|err| err.to_string())
    })
}

/// Writes a rendered chart to disk as PNG.
pub fn save_png(image: &DynamicImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    image.save_with_format(path, ImageFormat::Png)?;
    debug!("Wrote chart to {}", path.display());
    Ok(())
}

fn draw_bar_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    data: &ReportData,
    options: &ChartOptions,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let labels: Vec<&str> = data
        .contributions
        .iter()
        .map(|c| c.chart_label.as_str())
        .collect();
    let max_value = data
        .contributions
        .iter()
        .map(|c| u64::from(c.value_billions))
        .max()
        .unwrap_or(1);
    let y_max = bar_axis_max(max_value);

    let margin = options.px(8.0);
    let y_label_area = options.px(48.0);
    let plot_width = root
        .dim_in_pixel()
        .0
        .saturating_sub(2 * margin + y_label_area);
    let segment_width = f64::from(plot_width) / labels.len().max(1) as f64;
    let label_font = fitted_font(&labels, options.pt(9.0), segment_width * 0.92);

    let mut chart = ChartBuilder::on(root)
        .caption(BAR_CHART_TITLE, bold_font(options.pt(14.0)))
        .margin(margin)
        .x_label_area_size(options.px(28.0))
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(
            // A segmented range holds one segment per value, both ends included.
            (0..labels.len().saturating_sub(1)).into_segmented(),
            0u64..y_max,
        )?;

    let format_category = |value: &SegmentValue<usize>| match value {
        SegmentValue::CenterOf(index) => labels.get(*index).copied().unwrap_or_default().to_owned(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(TRANSPARENT)
        .bold_line_style(GRID_COLOR.stroke_width(options.px(0.5).max(1)))
        .y_desc(AXIS_LABEL)
        .axis_desc_style(font(options.pt(12.0)))
        .label_style(font(options.pt(9.0)))
        .x_label_style(label_font)
        .x_label_formatter(&format_category)
        .draw()?;

    let colors: Vec<RGBColor> = data
        .contributions
        .iter()
        .map(|c| c.color.to_plotters())
        .collect();

    chart.draw_series(
        Histogram::vertical(&chart)
            .margin(options.px(12.0))
            .style_func(|value, _| {
                let index = match value {
                    SegmentValue::Exact(index) | SegmentValue::CenterOf(index) => *index,
                    SegmentValue::Last => 0,
                };
                colors.get(index).copied().unwrap_or(BLACK).filled()
            })
            .data(
                data.contributions
                    .iter()
                    .enumerate()
                    .map(|(index, c)| (index, u64::from(c.value_billions))),
            ),
    )?;

    let value_style =
        TextStyle::from(bold_font(options.pt(10.0))).pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(data.contributions.iter().enumerate().map(|(index, c)| {
        Text::new(
            c.bar_label(),
            (SegmentValue::CenterOf(index), u64::from(c.value_billions)),
            value_style.clone(),
        )
    }))?;

    Ok(())
}

/// Point on a circle for an angle in degrees, counter-clockwise with the y axis pointing down.
fn polar(center: (i32, i32), radius: f64, angle_deg: f64) -> (i32, i32) {
    let radians = angle_deg * PI / 180.0;
    (
        center.0 + (radius * radians.cos()).round() as i32,
        center.1 - (radius * radians.sin()).round() as i32,
    )
}

/// Outline of a pie wedge: the centre followed by the arc from `start_deg` to `end_deg`.
fn wedge_points(center: (i32, i32), radius: f64, start_deg: f64, end_deg: f64) -> Vec<(i32, i32)> {
    let sweep = end_deg - start_deg;
    let steps = (sweep.abs() / 2.0).ceil().max(1.0) as usize;
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for step in 0..=steps {
        let angle = start_deg + sweep * step as f64 / steps as f64;
        points.push(polar(center, radius, angle));
    }
    points
}

/// Start and end angle of every wedge, counter-clockwise in degrees, in data order.
fn wedge_angles(data: &ReportData, start_deg: f64) -> Vec<(f64, f64)> {
    let total = data.total_billions().max(1) as f64;
    let mut angle = start_deg;
    data.contributions
        .iter()
        .map(|contribution| {
            let sweep = f64::from(contribution.value_billions) / total * 360.0;
            let wedge = (angle, angle + sweep);
            angle += sweep;
            wedge
        })
        .collect()
}

/// Largest radius that keeps outside labels of the given pixel size inside `area`.
fn pie_radius(area: (u32, u32), label: (u32, u32), gap: f64) -> f64 {
    let half_width = f64::from(area.0) / 2.0;
    let half_height = f64::from(area.1) / 2.0;
    let preferred = half_width.min(half_height) * 0.68;
    let horizontal = (half_width - f64::from(label.0) - gap) / LABEL_RADIUS;
    let vertical = (half_height - f64::from(label.1) - gap) / LABEL_RADIUS;
    preferred.min(horizontal).min(vertical).max(1.0)
}

fn draw_pie_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    data: &ReportData,
    options: &ChartOptions,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let padded = root.margin(options.px(8.0), 0, 0, 0);
    let area = padded.titled(PIE_CHART_TITLE, bold_font(options.pt(14.0)))?;

    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let total = data.total_billions().max(1) as f64;

    let edge = WHITE.stroke_width(options.px(1.0).max(1));
    let label_font = font(options.pt(10.0));
    let labels: Vec<&str> = data
        .contributions
        .iter()
        .map(|c| c.chart_label.as_str())
        .collect();
    let label_size = (widest_label(&labels, &label_font), options.px(10.0));
    let radius = pie_radius((width, height), label_size, options.pt(4.0));
    let percent_style =
        TextStyle::from(font(options.pt(10.0))).pos(Pos::new(HPos::Center, VPos::Center));

    let wedges = wedge_angles(data, options.pie_start_angle_deg);
    for (contribution, (start, end)) in data.contributions.iter().zip(wedges) {
        let share = f64::from(contribution.value_billions) / total;
        let outline = wedge_points(center, radius, start, end);

        area.draw(&Polygon::new(
            outline.clone(),
            contribution.color.to_plotters().filled(),
        ))?;
        let mut closed = outline;
        closed.push(center);
        area.draw(&PathElement::new(closed, edge))?;

        let middle = (start + end) / 2.0;
        let horizontal = if (middle * PI / 180.0).cos() >= 0.0 {
            HPos::Left
        } else {
            HPos::Right
        };
        let label_style =
            TextStyle::from(label_font.clone()).pos(Pos::new(horizontal, VPos::Center));
        area.draw(&Text::new(
            contribution.chart_label.clone(),
            polar(center, radius * LABEL_RADIUS, middle),
            label_style,
        ))?;
        area.draw(&Text::new(
            format!("{:.0}%", share * 100.0),
            polar(center, radius * 0.6, middle),
            percent_style.clone(),
        ))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rasters_match_physical_size() {
        let options = ChartOptions::default();
        assert_eq!(options.pixels(options.bar_size_in), (900, 600));
        assert_eq!(options.pixels(options.pie_size_in), (750, 750));
        assert_eq!(options.px(72.0), 150);
    }

    #[test]
    fn polar_follows_counter_clockwise_screen_convention() {
        assert_eq!(polar((100, 100), 10.0, 0.0), (110, 100));
        assert_eq!(polar((100, 100), 10.0, 90.0), (100, 90));
        assert_eq!(polar((100, 100), 10.0, 180.0), (90, 100));
    }

    #[test]
    fn wedge_outline_starts_at_centre_and_spans_arc() {
        let points = wedge_points((0, 0), 100.0, 0.0, 90.0);
        assert_eq!(points.first(), Some(&(0, 0)));
        assert_eq!(points[1], (100, 0));
        assert_eq!(points.last(), Some(&(0, -100)));
        assert!(points.len() >= 45);
    }

    #[test]
    fn wedges_start_at_140_degrees_and_run_counter_clockwise() {
        let data = ReportData::diaspora_2025();
        let wedges = wedge_angles(&data, ChartOptions::default().pie_start_angle_deg);
        assert_eq!(wedges.len(), data.contributions.len());
        assert_eq!(wedges[0].0, 140.0);

        // Workforce (42%) comes first and the wedges are contiguous.
        assert!((wedges[0].1 - wedges[0].0 - 0.42 * 360.0).abs() < 0.5);
        for pair in wedges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            assert!(pair[1].1 > pair[1].0);
        }
        let last = wedges.last().map(|w| w.1).unwrap_or_default();
        assert!((last - 500.0).abs() < 1e-9);
    }

    #[test]
    fn pie_radius_leaves_room_for_outside_labels() {
        let area = (750, 700);
        let label = (160, 21);
        let gap = 8.0;
        let radius = pie_radius(area, label, gap);
        let right_edge = 375.0 + radius * LABEL_RADIUS + f64::from(label.0);
        assert!(right_edge <= 750.0 - gap + 1e-9, "{right_edge}");
        assert!(radius > 100.0);

        // Short labels keep the preferred size.
        assert_eq!(pie_radius(area, (10, 10), gap), 350.0 * 0.68);
    }

    #[test]
    fn value_axis_saturates_for_huge_values() {
        assert_eq!(bar_axis_max(400), 451);
        let huge = u64::from(u32::MAX);
        assert!(bar_axis_max(huge) > huge);
        assert_eq!(bar_axis_max(u64::MAX), u64::MAX);
    }
}
