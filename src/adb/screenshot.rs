//! Screenshot decoding and downscaling.

use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageFormat;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Validate raw `screencap -p` output and downscale it by `scale`.
///
/// Returns `None` when the data is not a decodable PNG, which happens on
/// secure screens (payment pages) where capture is blocked.
pub fn process_screenshot(png_data: &[u8], scale: f64) -> Option<Vec<u8>> {
    if png_data.len() < PNG_MAGIC.len() || &png_data[..PNG_MAGIC.len()] != PNG_MAGIC {
        tracing::error!("Invalid screenshot data ({} bytes)", png_data.len());
        return None;
    }

    if scale >= 1.0 || scale <= 0.0 {
        return Some(png_data.to_vec());
    }

    let img = match image::load_from_memory(png_data) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!("Failed to parse screenshot image: {}", e);
            return None;
        }
    };

    let width = ((img.width() as f64 * scale) as u32).max(1);
    let height = ((img.height() as f64 * scale) as u32).max(1);
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);

    let mut buffer = Cursor::new(Vec::new());
    if let Err(e) = resized.write_to(&mut buffer, ImageFormat::Png) {
        tracing::error!("Failed to encode scaled screenshot: {}", e);
        return None;
    }
    Some(buffer.into_inner())
}
