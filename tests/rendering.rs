use std::collections::BTreeMap;
use std::path::PathBuf;

use image::GenericImageView;
use impact_report::builder::PdfBuilder;
use impact_report::chart::{self, ChartOptions};
use impact_report::fonts::{self, FontSet};
use impact_report::model::{Block, Report, Section};
use impact_report::richtext::Span;
use impact_report::report::generate_pdf_with_fonts;
use impact_report::{Contribution, ReportData, Rgb};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use sha2::{Digest, Sha256};

/// Largest acceptable size of the built-in report.
const MAX_REPORT_BYTES: usize = 3_000_000;

fn test_fonts() -> FontSet {
    fonts::default_font_set().expect(
        "no report fonts found. Install DejaVu or Liberation Sans, set IMPACT_REPORT_FONTS_DIR, \
         or copy Roboto into assets/fonts.",
    )
}

fn render_report_pdf() -> Vec<u8> {
    generate_pdf_with_fonts(
        &ReportData::diaspora_2025(),
        test_fonts(),
        &ChartOptions::default(),
    )
    .expect("render report pdf")
    .bytes
}

fn load_decompressed(bytes: &[u8]) -> Document {
    let mut document = Document::load_mem(bytes).expect("parse rendered pdf");
    document.decompress();
    document
}

/// Glyph id to character table read from a font's ToUnicode CMap.
fn to_unicode_map(document: &Document, font: &lopdf::Dictionary) -> BTreeMap<u16, char> {
    let mut map = BTreeMap::new();
    let Some(stream) = font
        .get(b"ToUnicode")
        .and_then(Object::as_reference)
        .and_then(|id| document.get_object(id))
        .and_then(Object::as_stream)
        .ok()
    else {
        return map;
    };

    let hex = |token: &str| {
        let token = token.strip_prefix('<')?.strip_suffix('>')?;
        u32::from_str_radix(token, 16).ok()
    };
    for line in String::from_utf8_lossy(&stream.content).lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let [glyph, unicode] = tokens.as_slice() {
            if let (Some(glyph), Some(unicode)) = (hex(glyph), hex(unicode)) {
                if let (Ok(glyph), Some(c)) = (u16::try_from(glyph), char::from_u32(unicode)) {
                    map.insert(glyph, c);
                }
            }
        }
    }
    map
}

fn decode_glyphs(map: &BTreeMap<u16, char>, bytes: &[u8], text: &mut String) {
    for glyph in bytes.chunks(2) {
        let id = u16::from_be_bytes([glyph[0], glyph.get(1).copied().unwrap_or_default()]);
        text.push(map.get(&id).copied().unwrap_or('\u{fffd}'));
    }
}

/// Text shown on a page, with every glyph string decoded through its font's CMap.
fn page_text(document: &Document, page: ObjectId) -> String {
    let fonts: BTreeMap<Vec<u8>, BTreeMap<u16, char>> = document
        .get_page_fonts(page)
        .into_iter()
        .map(|(name, font)| (name, to_unicode_map(document, font)))
        .collect();
    let content = document.get_page_content(page).expect("page content");
    let content = Content::decode(&content).expect("decode page content");

    let mut text = String::new();
    let mut current = None;
    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        match (operation.operator.as_str(), operands.first()) {
            ("Tf", Some(name)) => {
                current = name.as_name().ok().and_then(|name| fonts.get(name));
            }
            ("Tj", Some(Object::String(bytes, _))) => {
                if let Some(map) = current {
                    decode_glyphs(map, bytes, &mut text);
                }
            }
            ("TJ", Some(Object::Array(items))) => {
                let Some(map) = current else { continue };
                for item in items {
                    if let Object::String(bytes, _) = item {
                        decode_glyphs(map, bytes, &mut text);
                    }
                }
            }
            _ => {}
        }
    }
    text
}

/// Every `r g b` operand triple of `operator` on the page, scaled to 0-255.
fn page_colors(document: &Document, page: ObjectId, operator: &str) -> Vec<[u8; 3]> {
    let content = document.get_page_content(page).expect("page content");
    let content = Content::decode(&content).expect("decode page content");
    content
        .operations
        .iter()
        .filter(|operation| operation.operator == operator)
        .filter_map(|operation| {
            let values: Vec<f32> = operation
                .operands
                .iter()
                .filter_map(|operand| operand.as_float().ok())
                .collect();
            match values.as_slice() {
                [r, g, b] => Some([r, g, b].map(|value| (value * 255.0).round() as u8)),
                _ => None,
            }
        })
        .collect()
}

fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if data[index..].starts_with(tag) {
                let mut cursor = index + tag.len();
                while cursor < data.len() {
                    let byte = data[cursor];
                    if byte == terminator {
                        break;
                    }
                    if terminator == b')' {
                        data[cursor] = b'0';
                    } else if !matches!(byte, b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t') {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            } else {
                index += 1;
            }
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while offset + start.len() < data.len() {
            if let Some(start_pos) = data[offset..]
                .windows(start.len())
                .position(|window| window == start)
            {
                let start_index = offset + start_pos + start.len();
                if let Some(end_pos) = data[start_index..]
                    .windows(end.len())
                    .position(|window| window == end)
                {
                    for byte in &mut data[start_index..start_index + end_pos] {
                        if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                            *byte = b'0';
                        }
                    }
                    offset = start_index + end_pos + end.len();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_segment(&mut normalized, b"/CreationDate(", b')');
    scrub_segment(&mut normalized, b"/ModDate(", b')');
    scrub_segment(&mut normalized, b"/ID[", b']');
    scrub_segment(&mut normalized, b"/Producer(", b')');
    scrub_xml(&mut normalized, b"<xmp:CreateDate>", b"</xmp:CreateDate>");
    scrub_xml(&mut normalized, b"<xmp:ModifyDate>", b"</xmp:ModifyDate>");
    scrub_xml(
        &mut normalized,
        b"<xmp:MetadataDate>",
        b"</xmp:MetadataDate>",
    );
    scrub_xml(
        &mut normalized,
        b"<xmpMM:DocumentID>",
        b"</xmpMM:DocumentID>",
    );
    scrub_xml(
        &mut normalized,
        b"<xmpMM:InstanceID>",
        b"</xmpMM:InstanceID>",
    );
    scrub_xml(&mut normalized, b"<xmpMM:VersionID>", b"</xmpMM:VersionID>");
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    let normalized = scrub_pdf(bytes);
    let digest = Sha256::digest(&normalized);
    digest.into()
}

#[test]
fn renders_non_empty_output() {
    let bytes = render_report_pdf();
    assert!(bytes.starts_with(b"%PDF-"), "output should carry a PDF header");
    assert!(bytes.len() > 10_000, "charts should be embedded");
}

#[test]
fn rendering_is_deterministic() {
    let bytes_a = render_report_pdf();
    let bytes_b = render_report_pdf();

    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");

    let hash_a = normalized_hash(&bytes_a);
    let hash_b = normalized_hash(&bytes_b);

    assert_eq!(
        hash_a, hash_b,
        "PDF renders must be deterministic after metadata normalization"
    );
}

#[test]
fn report_spans_several_pages() {
    let bytes = render_report_pdf();
    let document = Document::load_mem(&bytes).expect("parse rendered pdf");
    let pages = document.get_pages();
    assert!(pages.len() >= 2, "expected at least two pages, got {}", pages.len());
}

#[test]
fn report_stays_small_and_compressed() {
    let bytes = render_report_pdf();
    assert!(
        bytes.len() < MAX_REPORT_BYTES,
        "report is {} bytes, limit is {MAX_REPORT_BYTES}",
        bytes.len()
    );

    let document = Document::load_mem(&bytes).expect("parse rendered pdf");
    let images: Vec<_> = document
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream.dict.get(b"Subtype").and_then(Object::as_name_str).ok() == Some("Image")
        })
        .collect();
    assert!(images.len() >= 2, "both charts are embedded");
    for image in images {
        assert!(image.dict.get(b"Filter").is_ok(), "chart raster is not compressed");
    }
}

#[test]
fn metadata_title_matches_report_title() {
    let bytes = render_report_pdf();
    let document = Document::load_mem(&bytes).expect("parse rendered pdf");
    let info = document
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| document.get_dictionary(id))
        .expect("document info dictionary");
    let title = info.get(b"Title").and_then(Object::as_str).expect("title");
    assert_eq!(title, ReportData::diaspora_2025().title.as_bytes());
}

#[test]
fn every_page_carries_its_number_in_the_footer() {
    let bytes = render_report_pdf();
    let document = load_decompressed(&bytes);
    let pages = document.get_pages();
    for (number, page) in &pages {
        let text = page_text(&document, *page);
        assert!(text.contains(&format!("Page {number}")), "page {number}: {text}");
    }

    let first = page_text(&document, pages[&1]);
    assert!(first.contains("Economic Impact"), "{first}");
}

#[test]
fn table_header_and_total_rows_are_shaded() {
    let bytes = render_report_pdf();
    let document = load_decompressed(&bytes);
    let (strokes, fills): (Vec<_>, Vec<_>) = document
        .get_pages()
        .values()
        .map(|page| {
            (
                page_colors(&document, *page, "RG"),
                page_colors(&document, *page, "rg"),
            )
        })
        .fold((Vec::new(), Vec::new()), |(mut strokes, mut fills), (s, f)| {
            strokes.extend(s);
            fills.extend(f);
            (strokes, fills)
        });

    // Background hairlines: dark blue header, light grey total.
    assert!(strokes.contains(&[0, 0, 139]), "{strokes:?}");
    assert!(strokes.contains(&[211, 211, 211]), "{strokes:?}");
    // Header text is white smoke so it reads on the dark fill.
    assert!(fills.contains(&[245, 245, 245]), "{fills:?}");
}

#[test]
fn charts_use_configured_pixel_sizes() {
    let fonts = test_fonts();
    let data = ReportData::diaspora_2025();
    let options = ChartOptions::default();

    let bar = chart::render_bar_chart(&data, &fonts, &options).expect("bar chart");
    assert_eq!(bar.dimensions(), (900, 600));
    let pie = chart::render_pie_chart(&data, &fonts, &options).expect("pie chart");
    assert_eq!(pie.dimensions(), (750, 750));
}

#[test]
fn bar_chart_paints_one_centred_bar_per_category() {
    let data = ReportData::diaspora_2025();
    let bar = chart::render_bar_chart(&data, &test_fonts(), &ChartOptions::default())
        .expect("bar chart")
        .to_rgb8();

    // A row a few pixels above the x axis crosses every bar, even the shortest.
    let row = bar.height() * 86 / 100;
    let mut seen = Vec::new();
    for x in 0..bar.width() {
        let pixel = bar.get_pixel(x, row).0;
        for contribution in &data.contributions {
            let Rgb(r, g, b) = contribution.color;
            if pixel == [r, g, b] && seen.last() != Some(&contribution.chart_label) {
                seen.push(contribution.chart_label.clone());
            }
        }
    }
    let expected: Vec<String> = data
        .contributions
        .iter()
        .map(|c| c.chart_label.clone())
        .collect();
    assert_eq!(seen, expected);

    // The last bar ends in the right part of the plot, not before an empty segment.
    let Rgb(r, g, b) = data.contributions[4].color;
    let last_x = (0..bar.width())
        .rev()
        .find(|x| bar.get_pixel(*x, row).0 == [r, g, b])
        .expect("last bar");
    assert!(last_x > bar.width() * 85 / 100, "last bar ends at {last_x}");
}

#[test]
fn bar_chart_handles_values_near_the_integer_limit() {
    let data = ReportData {
        contributions: vec![Contribution {
            category: "Everything".to_owned(),
            chart_label: "Everything".to_owned(),
            value_billions: 4_000_000_000,
            share_percent: 100,
            color: Rgb(30, 144, 255),
            detail: "All of it.".to_owned(),
        }],
        ..ReportData::diaspora_2025()
    };
    data.validate().expect("single category dataset is valid");

    let options = ChartOptions {
        dpi: 50.0,
        ..ChartOptions::default()
    };
    let bar = chart::render_bar_chart(&data, &test_fonts(), &options).expect("bar chart");
    assert_eq!(bar.dimensions(), (300, 200));
}

#[test]
fn charts_are_written_as_png() {
    let options = ChartOptions {
        dpi: 50.0,
        ..ChartOptions::default()
    };
    let bar = chart::render_bar_chart(&ReportData::diaspora_2025(), &test_fonts(), &options)
        .expect("bar chart");

    let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("bar_chart.png");
    chart::save_png(&bar, &path).expect("save chart");
    let decoded = image::open(&path).expect("decode saved chart");
    assert_eq!(decoded.dimensions(), (300, 200));
}

#[test]
fn custom_reports_render_without_charts() {
    let report = Report::new("Sample").with_section(
        Section::new("Intro").with_block(Block::paragraph(vec![Span::new("Hello, PDF!").bold()])),
    );
    let pdf = PdfBuilder::new(report)
        .with_fonts(test_fonts())
        .render()
        .expect("render sample pdf");
    assert!(pdf.bytes.starts_with(b"%PDF-"));
}
