//! QR code of the wallet address, stored in the envelope so a client can
//! show a deposit code without any secret in scope.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::WalletError;

/// Minimum edge of the rendered PNG, in pixels.
const QR_SIZE: u32 = 256;

/// Renders `address` as a medium-ECC QR code and returns the PNG as base64.
pub fn render_address_qr(address: &str) -> Result<String, WalletError> {
    let failed = |what: &str| WalletError::InvalidVaultFile {
        reason: format!("failed to {what} QR code"),
    };

    let code = QrCode::with_error_correction_level(address.as_bytes(), EcLevel::M)
        .map_err(|_| failed("create"))?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE, QR_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|_| failed("encode"))?;

    Ok(STANDARD.encode(png))
}
