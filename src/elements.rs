//! Layout elements built on top of `genpdf` primitives.
//!
//! `genpdf` has no notion of cell backgrounds and only strokes hairlines, so [`ShadedCell`]
//! paints one by stacking hairlines across the cell before printing the text on top.  The image
//! helpers convert chart rasters into `genpdf` images scaled to a requested width.

use genpdf::elements::{Image, Paragraph};
use genpdf::error::{Context as _, Error};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Scale, Size};
use image::GenericImageView;

const MM_PER_INCH: f64 = 25.4;

/// Resolution assumed for rasters without an explicit DPI.
pub const DEFAULT_IMAGE_DPI: f64 = 300.0;

/// Padding above and below the text of a [`ShadedCell`].
pub const CELL_PADDING_MM: f64 = 1.5;

/// Distance between the hairlines of a cell fill. Below the 1pt stroke width so lines overlap.
const FILL_STEP_MM: f64 = 0.25;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Converts typographic points to millimetres.
pub(crate) fn mm_from_points(points: f64) -> Mm {
    mm_from_f64(points * MM_PER_INCH / 72.0)
}

/// Physical size of `image` when printed at `dpi`.
pub fn natural_size(image: &image::DynamicImage, dpi: f64) -> Size {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * f64::from(px_width) / dpi;
    let height_mm = MM_PER_INCH * f64::from(px_height) / dpi;
    Size::new(mm_from_f64(width_mm), mm_from_f64(height_mm))
}

/// Loads an encoded image from in-memory bytes.
pub fn decode_image_from_bytes(bytes: impl AsRef<[u8]>) -> Result<image::DynamicImage, Error> {
    image::load_from_memory(bytes.as_ref()).context("Failed to decode image from provided bytes")
}

/// Converts a raster into a `genpdf` image, scaled to `width` while keeping the aspect ratio.
///
/// Without a width the image is printed at its natural size for [`DEFAULT_IMAGE_DPI`].
pub fn scaled_image(
    image: image::DynamicImage,
    width: Option<Mm>,
    alignment: Alignment,
) -> Result<Image, Error> {
    let natural = natural_size(&image, DEFAULT_IMAGE_DPI);
    let mut element = Image::from_dynamic_image(image)?;
    element.set_alignment(alignment);

    if let Some(width) = width {
        let natural_width = mm_to_f64(natural.width);
        if natural_width > f64::EPSILON {
            let scale = mm_to_f64(width) / natural_width;
            element.set_scale(Scale::new(scale, scale));
        }
    }

    Ok(element)
}

/// Vertical offsets of the hairlines that cover a band of `height` millimetres.
fn fill_offsets(height: f64) -> Vec<f64> {
    if height <= 0.0 {
        return Vec::new();
    }
    let steps = (height / FILL_STEP_MM).ceil() as usize;
    (0..=steps)
        .map(|step| (step as f64 * FILL_STEP_MM).min(height))
        .collect()
}

/// A single-line, centred table cell with optional background colour.
pub struct ShadedCell {
    text: StyledString,
    fill: Option<Color>,
}

impl ShadedCell {
    pub fn new(text: impl Into<StyledString>) -> Self {
        Self {
            text: text.into(),
            fill: None,
        }
    }

    /// Paints the cell background with `color`.
    pub fn with_fill(mut self, color: impl Into<Option<Color>>) -> Self {
        self.fill = color.into();
        self
    }
}

impl Element for ShadedCell {
    fn render(
        &mut self,
        context: &genpdf::Context,
        mut area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let padding = mm_from_f64(CELL_PADDING_MM);
        let text_style = style.and(self.text.style);
        let line_height = text_style.line_height(&context.font_cache);
        let height = line_height + padding + padding;

        let mut result = RenderResult::default();
        if height > area.size().height {
            result.has_more = true;
            return Ok(result);
        }

        let width = area.size().width;
        if let Some(fill) = self.fill {
            let stroke = Style::new().with_color(fill);
            for offset in fill_offsets(mm_to_f64(height)) {
                let y = mm_from_f64(offset);
                area.draw_line(vec![Position::new(0, y), Position::new(width, y)], stroke);
            }
        }

        area.add_offset(Position::new(0, padding));
        let mut paragraph = Paragraph::new(self.text.clone()).aligned(Alignment::Center);
        let text_result = paragraph.render(context, area, style)?;
        result.has_more = text_result.has_more;
        result.size = Size::new(width, height.max(text_result.size.height + padding));

        Ok(result)
    }
}

/// Fixed vertical gap between flowing elements.
///
/// A gap that does not fit on the current page is truncated instead of pushing content to the
/// next page.
pub struct VerticalSpace {
    height: Mm,
}

impl VerticalSpace {
    pub fn new(height: Mm) -> Self {
        Self { height }
    }

    /// Creates a gap measured in typographic points.
    pub fn points(points: f64) -> Self {
        Self::new(mm_from_points(points))
    }
}

impl Element for VerticalSpace {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let available = area.size().height;
        let height = if self.height > available {
            available
        } else {
            self.height
        };

        let mut result = RenderResult::default();
        result.size = Size::new(0, height);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    #[test]
    fn natural_size_uses_dpi() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1800, 1200));
        let size = natural_size(&image, 300.0);
        assert!((mm_to_f64(size.width) - 152.4).abs() < 1e-6);
        assert!((mm_to_f64(size.height) - 101.6).abs() < 1e-6);
    }

    #[test]
    fn points_convert_to_millimetres() {
        assert!((mm_to_f64(mm_from_points(72.0)) - 25.4).abs() < 1e-9);
    }

    #[test]
    fn invalid_image_bytes_are_reported() {
        let err = decode_image_from_bytes(b"not an image").unwrap_err();
        assert!(err.to_string().contains("Failed to decode image"));
    }

    #[test]
    fn fill_hairlines_cover_the_whole_cell() {
        let offsets = fill_offsets(7.3);
        assert_eq!(offsets.first(), Some(&0.0));
        assert_eq!(offsets.last(), Some(&7.3));
        for pair in offsets.windows(2) {
            assert!(pair[1] - pair[0] <= FILL_STEP_MM + 1e-9);
        }
        assert!(fill_offsets(0.0).is_empty());
    }

    #[test]
    fn raster_converts_to_pdf_image() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(30, 20));
        assert!(scaled_image(image, Some(mm_from_f64(50.0)), Alignment::Center).is_ok());
    }
}
