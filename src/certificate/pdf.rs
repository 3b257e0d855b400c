//! A single page of filled and stroked rectangles plus centred text in the
//! two standard Helvetica faces, serialized with `pdf-writer`.
//!
//! Coordinates are millimetres from the top-left corner, font sizes are
//! points. Text is WinAnsi encoded, so only Latin-1 and a few typographic
//! characters can be drawn.

use super::CertificateError;
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

const MM_TO_PT: f32 = 72.0 / 25.4;

const CATALOG_ID: Ref = Ref::new(1);
const PAGE_TREE_ID: Ref = Ref::new(2);
const PAGE_ID: Ref = Ref::new(3);
const REGULAR_ID: Ref = Ref::new(4);
const BOLD_ID: Ref = Ref::new(5);
const CONTENT_ID: Ref = Ref::new(6);

/// Glyph widths (1/1000 em) for ' '..='~'.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // digits
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Width used for the remaining Latin-1 symbols.
const FALLBACK_WIDTH: u16 = 556;

/// Accented WinAnsi letters share the advance of their base letter.
fn base_letter(b: u8) -> Option<u8> {
    Some(match b {
        0xa0 => b' ',
        0xc0..=0xc5 => b'A',
        0xc7 => b'C',
        0xc8..=0xcb => b'E',
        // Accented i has no dot to narrow it; it is as wide as I in both faces.
        0xcc..=0xcf | 0xec..=0xef => b'I',
        0xd0 => b'D',
        0xd1 => b'N',
        0xd2..=0xd6 | 0xd8 => b'O',
        0xd9..=0xdc => b'U',
        0xdd => b'Y',
        0xde => b'P',
        0xe0..=0xe5 => b'a',
        0xe7 => b'c',
        0xe8..=0xeb => b'e',
        0xf0 | 0xf2..=0xf6 => b'o',
        0xf1 => b'n',
        0xf9..=0xfc => b'u',
        0xfd | 0xff => b'y',
        0xfe => b'p',
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    fn resource(self) -> Name<'static> {
        match self {
            Font::Helvetica => Name(b"F1"),
            Font::HelveticaBold => Name(b"F2"),
        }
    }

    fn base_font(self) -> Name<'static> {
        match self {
            Font::Helvetica => Name(b"Helvetica"),
            Font::HelveticaBold => Name(b"Helvetica-Bold"),
        }
    }

    fn ascii_width(self, b: u8) -> u16 {
        let widths = match self {
            Font::Helvetica => &HELVETICA_WIDTHS,
            Font::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        widths[usize::from(b - 0x20)]
    }

    /// Advance width of one WinAnsi byte in 1/1000 em.
    fn glyph_width(self, b: u8) -> u16 {
        let bold = self == Font::HelveticaBold;
        match b {
            0x20..=0x7e => self.ascii_width(b),
            0x91 | 0x92 => if bold { 278 } else { 222 },
            0x93 | 0x94 => if bold { 500 } else { 333 },
            0x95 => 350,
            0x97 | 0xc6 => 1000,
            0xd7 | 0xf7 => 584,
            0xdf | 0xf8 => 611,
            0xe6 => 889,
            _ => base_letter(b).map_or(FALLBACK_WIDTH, |base| self.ascii_width(base)),
        }
    }

    /// Advance width of WinAnsi-encoded text in points.
    pub fn text_width(self, encoded: &[u8], size: f32) -> f32 {
        let units: u32 = encoded
            .iter()
            .map(|&b| u32::from(self.glyph_width(b)))
            .sum();
        units as f32 * size / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn components(self) -> (f32, f32, f32) {
        (
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0,
        )
    }
}

/// Maps a character to its WinAnsiEncoding byte.
pub fn win_ansi_byte(c: char) -> Option<u8> {
    match c {
        ' '..='~' => Some(c as u8),
        '\u{a0}'..='\u{ff}' => Some(c as u8),
        '€' => Some(0x80),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        _ => None,
    }
}

pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>, CertificateError> {
    text.chars()
        .map(|c| win_ansi_byte(c).ok_or(CertificateError::UnsupportedCharacter(c)))
        .collect()
}

/// One page of drawing operations.
pub struct PdfPage {
    width_mm: f32,
    height_mm: f32,
    content: Content,
}

impl PdfPage {
    pub fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
            content: Content::new(),
        }
    }

    /// A4, landscape.
    pub fn a4_landscape() -> Self {
        Self::new(297.0, 210.0)
    }

    pub fn width_mm(&self) -> f32 {
        self.width_mm
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let bottom = (self.height_mm - y - h) * MM_TO_PT;
        self.content
            .rect(x * MM_TO_PT, bottom, w * MM_TO_PT, h * MM_TO_PT);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        let (r, g, b) = color.components();
        self.content.set_fill_rgb(r, g, b);
        self.rect(x, y, w, h);
        self.content.fill_nonzero();
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width_mm: f32, color: Rgb) {
        let (r, g, b) = color.components();
        self.content
            .set_line_width(line_width_mm * MM_TO_PT)
            .set_stroke_rgb(r, g, b);
        self.rect(x, y, w, h);
        self.content.stroke();
    }

    /// Draws `text` centred on `center_x`, baseline at `baseline_y`.
    pub fn centered_text(
        &mut self,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        font: Font,
        size: f32,
        color: Rgb,
    ) -> Result<(), CertificateError> {
        let encoded = encode_win_ansi(text)?;
        let x = center_x * MM_TO_PT - font.text_width(&encoded, size) / 2.0;
        let y = (self.height_mm - baseline_y) * MM_TO_PT;
        let (r, g, b) = color.components();
        self.content
            .begin_text()
            .set_font(font.resource(), size)
            .set_fill_rgb(r, g, b)
            .next_line(x, y)
            .show(Str(&encoded))
            .end_text();
        Ok(())
    }

    /// Serializes the page as a complete PDF file.
    pub fn finish(self) -> Vec<u8> {
        let mut pdf = Pdf::new();
        pdf.catalog(CATALOG_ID).pages(PAGE_TREE_ID);
        pdf.pages(PAGE_TREE_ID).kids([PAGE_ID]).count(1);

        let mut page = pdf.page(PAGE_ID);
        page.media_box(Rect::new(
            0.0,
            0.0,
            self.width_mm * MM_TO_PT,
            self.height_mm * MM_TO_PT,
        ));
        page.parent(PAGE_TREE_ID);
        page.contents(CONTENT_ID);
        page.resources()
            .fonts()
            .pair(Font::Helvetica.resource(), REGULAR_ID)
            .pair(Font::HelveticaBold.resource(), BOLD_ID);
        page.finish();

        for (id, font) in [(REGULAR_ID, Font::Helvetica), (BOLD_ID, Font::HelveticaBold)] {
            pdf.type1_font(id)
                .base_font(font.base_font())
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        let content = self.content.finish();
        pdf.stream(CONTENT_ID, &content);
        pdf.finish()
    }
}
