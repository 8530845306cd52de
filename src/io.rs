//! File I/O seams — image import with pre-decode validation, PNG encoding
//! for exports and history snapshots, and the native file dialogs.

use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

use crate::log_info;

/// Imports above this size are rejected before a decode is even attempted.
pub const MAX_IMPORT_BYTES: u64 = 5 * 1024 * 1024;

const IMPORT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Why an import did not produce a layer.  `Rejected` failures are caught by
/// validation before any decode is attempted and surface as warnings;
/// `Failed` covers I/O and decoder errors and surfaces as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    Rejected(String),
    Failed(String),
}

impl ImportError {
    pub fn message(&self) -> &str {
        match self {
            ImportError::Rejected(m) | ImportError::Failed(m) => m,
        }
    }
}

/// Encode a raster as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
        .map_err(|e| format!("PNG encode failed: {}", e))?;
    Ok(buf)
}

/// Validate and decode an image file for layer placement.
///
/// Rejection happens cheapest-first: unknown extension, then the size cap
/// from file metadata, and only then a decode attempt.  Every failure is a
/// value the caller surfaces as a notice — never a panic.
pub fn load_image_file(path: &Path) -> Result<RgbaImage, ImportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !IMPORT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ImportError::Rejected(format!(
            "'{}' is not a supported image file",
            path.display()
        )));
    }

    let meta = fs::metadata(path)
        .map_err(|e| ImportError::Failed(format!("Cannot read {}: {}", path.display(), e)))?;
    if meta.len() > MAX_IMPORT_BYTES {
        return Err(ImportError::Rejected(format!(
            "Image is too large ({} KB) — the limit is {} MB",
            meta.len() / 1024,
            MAX_IMPORT_BYTES / (1024 * 1024)
        )));
    }

    let bytes = fs::read(path)
        .map_err(|e| ImportError::Failed(format!("Cannot read {}: {}", path.display(), e)))?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| ImportError::Failed(format!("Failed to decode {}: {}", path.display(), e)))?;
    let rgba = decoded.to_rgba8();
    log_info!(
        "Decoded {} ({}x{})",
        path.display(),
        rgba.width(),
        rgba.height()
    );
    Ok(rgba)
}

/// Write the composite as a PNG file.
pub fn export_png(path: &Path, img: &RgbaImage) -> Result<(), String> {
    let bytes = encode_png(img)?;
    fs::write(path, bytes).map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
    log_info!("Exported {}x{} PNG to {}", img.width(), img.height(), path.display());
    Ok(())
}

/// Open-file dialog filtered to the supported import formats.
pub fn pick_import_path() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", IMPORT_EXTENSIONS)
        .pick_file()
}

/// Save-file dialog for the PNG export.
pub fn pick_export_path() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("PNG image", &["png"])
        .set_file_name("sketch.png")
        .save_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sketchfe-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn png_roundtrip_preserves_pixels() {
        let img = RgbaImage::from_pixel(9, 7, Rgba([12, 34, 56, 255]));
        let bytes = encode_png(&img).unwrap();
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back.as_raw(), img.as_raw());
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = load_image_file(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, ImportError::Rejected(_)));
        assert!(err.message().contains("not a supported image"));
    }

    #[test]
    fn rejects_oversized_file_before_decoding() {
        let path = temp_path("big.png");
        // Not a real PNG — must be rejected on size alone, before decode
        fs::write(&path, vec![0u8; (MAX_IMPORT_BYTES + 1) as usize]).unwrap();
        let err = load_image_file(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ImportError::Rejected(_)));
        assert!(err.message().contains("too large"));
    }

    #[test]
    fn loads_a_valid_png() {
        let path = temp_path("ok.png");
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        fs::write(&path, encode_png(&img).unwrap()).unwrap();
        let loaded = load_image_file(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded.dimensions(), (4, 4));
    }

    #[test]
    fn decode_failure_is_an_error_not_a_panic() {
        let path = temp_path("corrupt.png");
        fs::write(&path, b"definitely not a png").unwrap();
        let err = load_image_file(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ImportError::Failed(_)));
        assert!(err.message().contains("Failed to decode"));
    }
}
