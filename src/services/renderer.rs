use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::QrCode;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("qr encoding failed: {0}")]
    Encode(#[from] QrError),
}

/// Turns a ticket identifier into a scannable image. Pure function of the id.
pub trait TicketRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn render(&self, ticket_id: Uuid) -> Result<Vec<u8>, RenderError>;
}

/// QR code rendered as SVG. The payload is the hyphenated ticket id, which
/// is what the gate scanner posts back for redemption.
pub struct SvgQrRenderer {
    min_size: u32,
}

impl SvgQrRenderer {
    pub const DEFAULT_MIN_SIZE: u32 = 240;

    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_SIZE)
    }
}

impl TicketRenderer for SvgQrRenderer {
    fn content_type(&self) -> &'static str {
        "image/svg+xml"
    }

    fn render(&self, ticket_id: Uuid) -> Result<Vec<u8>, RenderError> {
        let code = QrCode::new(ticket_id.to_string().as_bytes())?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();

        Ok(image.into_bytes())
    }
}
