//! Single-file PDF export of a creation.
//!
//! Layout, top to bottom on an A4 page: centered title, the photo scaled to
//! fit the text width and half the page height, a style line, the optional
//! note, then the poem wrapped to the text width. Every page carries a footer
//! with the creation date. Long poems flow onto further pages.
//!
//! Text uses the standard Helvetica faces with WinAnsi encoding, so no font
//! files are embedded. Line wrapping uses an average glyph width rather than
//! real metrics.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::CoreError;
use crate::style::PoemStyle;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Page geometry (PDF points)
// ---------------------------------------------------------------------------

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const TEXT_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN;
const IMAGE_MAX_HEIGHT: i64 = PAGE_HEIGHT / 2;
const FOOTER_BASELINE: i64 = 32;
const BODY_BOTTOM: i64 = MARGIN + 16;

/// Longest photo edge, in pixels, kept when re-encoding for embedding.
const MAX_EMBED_PIXELS: u32 = 1600;

const TITLE_SIZE: i64 = 20;
const STYLE_SIZE: i64 = 12;
const NOTE_SIZE: i64 = 11;
const BODY_SIZE: i64 = 12;
const FOOTER_SIZE: i64 = 9;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";
const FONT_ITALIC: &str = "F3";
const IMAGE_NAME: &str = "Im1";

/// Content of one export.
#[derive(Debug, Clone)]
pub struct PdfCreation<'a> {
    pub title: &'a str,
    pub style: PoemStyle,
    pub note: Option<&'a str>,
    pub poem: &'a str,
    pub created_at: Timestamp,
    /// Encoded photo bytes (PNG, JPEG or WebP).
    pub image: Option<&'a [u8]>,
}

/// Render `creation` to PDF bytes.
///
/// Fails with `Validation` if the photo bytes cannot be decoded; callers may
/// retry without the photo.
pub fn render_pdf(creation: &PdfCreation<'_>) -> Result<Vec<u8>, CoreError> {
    let image = creation.image.map(prepare_image).transpose()?;
    let footer = format!("Created on {}", creation.created_at.format("%B %-d, %Y"));

    let mut layout = Layout::new(footer);

    layout.centered_line(FONT_BOLD, TITLE_SIZE, creation.title);
    layout.gap(12);

    if let Some(img) = &image {
        let (w, h) = fit_within(img.width, img.height, TEXT_WIDTH, IMAGE_MAX_HEIGHT);
        layout.image(w, h);
        layout.gap(16);
    }

    layout.paragraph(
        FONT_BOLD,
        STYLE_SIZE,
        &format!("Style: {}", creation.style),
    );

    if let Some(note) = creation.note.map(str::trim).filter(|n| !n.is_empty()) {
        layout.gap(4);
        layout.paragraph(FONT_ITALIC, NOTE_SIZE, &format!("Note: {note}"));
    }

    layout.gap(14);
    layout.paragraph(FONT_REGULAR, BODY_SIZE, creation.poem);

    layout.into_document(image.as_ref())
}

// ---------------------------------------------------------------------------
// Image preparation
// ---------------------------------------------------------------------------

struct EmbeddedImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decode, bound the pixel size, and re-encode as baseline RGB JPEG so the
/// stream can be embedded with `DCTDecode`.
fn prepare_image(bytes: &[u8]) -> Result<EmbeddedImage, CoreError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| CoreError::Validation(format!("Photo could not be decoded: {e}")))?;
    let (w, h) = decoded.dimensions();
    let bounded = if w > MAX_EMBED_PIXELS || h > MAX_EMBED_PIXELS {
        decoded.thumbnail(MAX_EMBED_PIXELS, MAX_EMBED_PIXELS)
    } else {
        decoded
    };
    let rgb = DynamicImage::ImageRgb8(bounded.to_rgb8());
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .map_err(|e| CoreError::Internal(format!("Photo re-encoding failed: {e}")))?;

    Ok(EmbeddedImage {
        jpeg,
        width,
        height,
    })
}

/// Scale `(w, h)` to the largest size inside `(max_w, max_h)`, keeping the
/// aspect ratio.
fn fit_within(w: u32, h: u32, max_w: i64, max_h: i64) -> (i64, i64) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    let fw = (w as f64 * scale).floor() as i64;
    let fh = (h as f64 * scale).floor() as i64;
    (fw.max(1), fh.max(1))
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

struct Layout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    cursor_y: i64,
    footer: String,
}

impl Layout {
    fn new(footer: String) -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            cursor_y: PAGE_HEIGHT - MARGIN,
            footer,
        }
    }

    fn gap(&mut self, points: i64) {
        self.cursor_y -= points;
    }

    fn ensure_space(&mut self, height: i64) {
        if self.cursor_y - height < BODY_BOTTOM {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.current);
        self.pages.push(ops);
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn centered_line(&mut self, font: &str, size: i64, text: &str) {
        for line in wrap_text(text, chars_per_line(size)) {
            let step = leading(size);
            self.ensure_space(step);
            self.cursor_y -= step;
            let x = ((PAGE_WIDTH - estimated_width(&line, size)) / 2).max(MARGIN);
            push_text(&mut self.current, font, size, x, self.cursor_y, &line);
        }
    }

    fn paragraph(&mut self, font: &str, size: i64, text: &str) {
        for line in wrap_text(text, chars_per_line(size)) {
            let step = leading(size);
            self.ensure_space(step);
            self.cursor_y -= step;
            if !line.is_empty() {
                push_text(&mut self.current, font, size, MARGIN, self.cursor_y, &line);
            }
        }
    }

    fn image(&mut self, width: i64, height: i64) {
        self.ensure_space(height);
        self.cursor_y -= height;
        let x = (PAGE_WIDTH - width) / 2;
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height),
                    Object::Integer(x),
                    Object::Integer(self.cursor_y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn into_document(mut self, image: Option<&EmbeddedImage>) -> Result<Vec<u8>, CoreError> {
        self.break_page();
        let footer = self.footer;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(font_dict("Helvetica"));
        let bold_id = doc.add_object(font_dict("Helvetica-Bold"));
        let italic_id = doc.add_object(font_dict("Helvetica-Oblique"));

        let mut resources = dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => regular_id,
                FONT_BOLD => bold_id,
                FONT_ITALIC => italic_id,
            },
        };
        if let Some(img) = image {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => img.width as i64,
                    "Height" => img.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                img.jpeg.clone(),
            );
            let image_id = doc.add_object(stream);
            resources.set("XObject", dictionary! { IMAGE_NAME => image_id });
        }
        let resources_id = doc.add_object(resources);

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for mut ops in self.pages {
            let footer_x = ((PAGE_WIDTH - estimated_width(&footer, FOOTER_SIZE)) / 2).max(MARGIN);
            push_text(&mut ops, FONT_REGULAR, FOOTER_SIZE, footer_x, FOOTER_BASELINE, &footer);
            let page_id = add_page(&mut doc, pages_id, ops)?;
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| CoreError::Internal(format!("PDF write failed: {e}")))?;
        Ok(out)
    }
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<ObjectId, CoreError> {
    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| CoreError::Internal(format!("PDF content encoding failed: {e}")))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    }))
}

fn font_dict(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn push_text(ops: &mut Vec<Operation>, font: &str, size: i64, x: i64, y: i64, text: &str) {
    ops.extend([
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
        ),
        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]);
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

fn leading(size: i64) -> i64 {
    size * 4 / 3
}

/// Average Helvetica advance is a little over half the font size.
fn estimated_width(text: &str, size: i64) -> i64 {
    text.chars().count() as i64 * size * 11 / 20
}

fn chars_per_line(size: i64) -> usize {
    (TEXT_WIDTH * 20 / (size * 11)).max(1) as usize
}

/// Wrap `text` at word boundaries so no line exceeds `max_chars`.
///
/// Existing line breaks are kept (blank lines included), and words longer
/// than a full line are split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;
        for word in raw.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > max_chars && line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Encode for the WinAnsi (CP1252) font encoding; unmappable characters
/// become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            '\u{20AC}' => 0x80,
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}
