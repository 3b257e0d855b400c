//! Completion certificates.
//!
//! A certificate is rendered locally as a one-page PDF and stored on the
//! registration row as a `data:` URI.

mod pdf;

use pdf::{Font, PdfPage, Rgb};

use crate::consts::cli_consts::cpd::CERTIFICATE_ISSUER;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use thiserror::Error;

const DATA_URI_PREFIX: &str = "data:application/pdf;filename=generated.pdf;base64,";

const BACKGROUND: Rgb = Rgb(240, 249, 255);
const ACCENT: Rgb = Rgb(14, 165, 233);
const BLACK: Rgb = Rgb(0, 0, 0);

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Character {0:?} cannot be printed on a certificate")]
    UnsupportedCharacter(char),

    #[error("Certificate is missing the {0}")]
    EmptyField(&'static str),

    #[error("Not a PDF data URI")]
    InvalidDataUri,

    #[error("Certificate data is corrupt: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// What a certificate says.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateDetails {
    pub recipient: String,
    pub title: String,
    pub presenter: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub cpd_points: i64,
    pub certificate_id: String,
}

impl CertificateDetails {
    fn check(&self) -> Result<(), CertificateError> {
        if self.recipient.trim().is_empty() {
            return Err(CertificateError::EmptyField("recipient name"));
        }
        if self.title.trim().is_empty() {
            return Err(CertificateError::EmptyField("webinar title"));
        }
        Ok(())
    }

    /// `Month d, yyyy`
    pub fn formatted_date(&self) -> String {
        self.date.format("%B %-d, %Y").to_string()
    }
}

/// Renders the certificate as PDF bytes.
pub fn render(details: &CertificateDetails) -> Result<Vec<u8>, CertificateError> {
    details.check()?;

    let mut page = PdfPage::a4_landscape();
    let center = page.width_mm() / 2.0;

    page.fill_rect(0.0, 0.0, 297.0, 210.0, BACKGROUND);
    page.stroke_rect(10.0, 10.0, 277.0, 190.0, 5.0, ACCENT);

    let lines: [(String, f32, Font, f32, Rgb); 11] = [
        ("CERTIFICATE OF COMPLETION".to_string(), 40.0, Font::HelveticaBold, 30.0, ACCENT),
        ("This is to certify that".to_string(), 70.0, Font::HelveticaBold, 16.0, BLACK),
        (details.recipient.clone(), 85.0, Font::HelveticaBold, 24.0, BLACK),
        ("has successfully completed the webinar".to_string(), 100.0, Font::Helvetica, 16.0, BLACK),
        (details.title.clone(), 115.0, Font::HelveticaBold, 20.0, BLACK),
        (format!("Presented by: {}", details.presenter), 130.0, Font::Helvetica, 14.0, BLACK),
        (format!("Date: {}", details.formatted_date()), 140.0, Font::Helvetica, 14.0, BLACK),
        (format!("Duration: {} minutes", details.duration_minutes), 150.0, Font::Helvetica, 14.0, BLACK),
        (format!("CPD Points: {}", details.cpd_points), 160.0, Font::Helvetica, 14.0, BLACK),
        (CERTIFICATE_ISSUER.to_string(), 180.0, Font::Helvetica, 12.0, BLACK),
        (format!("Certificate ID: {}", details.certificate_id), 187.0, Font::Helvetica, 12.0, BLACK),
    ];
    for (text, y, font, size, color) in &lines {
        page.centered_text(text, center, *y, *font, *size, *color)?;
    }

    Ok(page.finish())
}

/// Renders the certificate straight to a data URI.
pub fn render_data_uri(details: &CertificateDetails) -> Result<String, CertificateError> {
    render(details).map(|bytes| to_data_uri(&bytes))
}

pub fn to_data_uri(pdf: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(pdf))
}

/// Decodes a stored certificate back to PDF bytes. Accepts any
/// `data:application/pdf` URI with a base64 payload.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, CertificateError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or(CertificateError::InvalidDataUri)?;
    if !header.starts_with("data:application/pdf") || !header.ends_with(";base64") {
        return Err(CertificateError::InvalidDataUri);
    }
    Ok(STANDARD.decode(payload.trim())?)
}
