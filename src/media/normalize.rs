/// Image normalization before photos enter the catalog
///
/// Every published photo is scaled into a size envelope and re-encoded so
/// the static listing never serves tiny or oversized files.
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Width/height bound in pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub width: u32,
    pub height: u32,
}

impl Envelope {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Resize bounds and encoder quality
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Smaller images are scaled up until both axes reach this
    pub min: Envelope,
    /// Larger images are scaled down until both axes fit in this
    pub max: Envelope,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            min: Envelope::new(600, 400),
            max: Envelope::new(1200, 900),
            quality: 85,
        }
    }
}

/// Final pixel size of a normalized image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{0} has zero width or height")]
    Empty(PathBuf),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Output codec chosen from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    Jpeg,
    Png,
    WebP,
    Other,
}

impl OutputKind {
    fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => OutputKind::Jpeg,
            "png" => OutputKind::Png,
            "webp" => OutputKind::WebP,
            _ => OutputKind::Other,
        }
    }
}

/// Decode `source`, fit it into the envelope and write it to `destination`.
///
/// Returns the final dimensions. The caller decides how to report failures;
/// nothing here retries.
pub fn normalize(
    source: &Path,
    destination: &Path,
    options: &NormalizeOptions,
) -> Result<Dimensions, NormalizeError> {
    let img = image::open(source).map_err(|source_err| NormalizeError::Decode {
        path: source.to_path_buf(),
        source: source_err,
    })?;

    let (orig_width, orig_height) = img.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(NormalizeError::Empty(source.to_path_buf()));
    }

    let img = fit_envelope(img, options);
    let (width, height) = img.dimensions();

    debug!(
        "Normalizing {}: {}x{} -> {}x{}",
        source.display(),
        orig_width,
        orig_height,
        width,
        height
    );

    encode(&img, destination, options.quality)?;

    info!(
        "Saved normalized image {} ({}x{})",
        destination.display(),
        width,
        height
    );
    Ok(Dimensions { width, height })
}

/// Final size for an image of `width` x `height`, or `None` if it already
/// sits inside the envelope.
///
/// Scaling up to the minimum and then down into the maximum is folded into a
/// single factor so no oversized intermediate image is ever built.
fn target_size(width: u32, height: u32, options: &NormalizeOptions) -> Option<(u32, u32)> {
    let (w, h) = (width as f64, height as f64);
    let (min, max) = (options.min, options.max);

    let mut scale = 1.0_f64;
    if width < min.width || height < min.height {
        scale = (min.width as f64 / w).max(min.height as f64 / h);
    }

    // Rounding keeps the binding axis exactly on the envelope
    let scaled = |s: f64| ((w * s).round().max(1.0), (h * s).round().max(1.0));
    let (sw, sh) = scaled(scale);
    if sw > max.width as f64 || sh > max.height as f64 {
        scale *= (max.width as f64 / sw).min(max.height as f64 / sh);
    }

    let (tw, th) = scaled(scale);
    let target = (tw as u32, th as u32);
    (target != (width, height)).then_some(target)
}

fn fit_envelope(img: DynamicImage, options: &NormalizeOptions) -> DynamicImage {
    let (width, height) = img.dimensions();
    match target_size(width, height, options) {
        Some((new_width, new_height)) => {
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
        None => img,
    }
}

/// Encodes into memory; `destination` is only written once encoding succeeded
fn encode(img: &DynamicImage, destination: &Path, quality: u8) -> Result<(), NormalizeError> {
    let encode_err = |source: image::ImageError| NormalizeError::Encode {
        path: destination.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    match OutputKind::for_path(destination) {
        OutputKind::Jpeg => {
            // JPEG has no alpha channel, flatten to RGB
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            rgb.write_with_encoder(encoder).map_err(encode_err)?;
        }
        OutputKind::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        OutputKind::WebP => {
            // The bundled WebP encoder is lossless only; it takes RGB8/RGBA8
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = WebPEncoder::new_lossless(&mut buf);
            rgba.write_with_encoder(encoder).map_err(encode_err)?;
        }
        OutputKind::Other => {
            // Let the image crate pick the format from the extension
            let format = ImageFormat::from_path(destination).map_err(encode_err)?;
            img.write_to(&mut Cursor::new(&mut buf), format)
                .map_err(encode_err)?;
        }
    }

    if let Err(source) = fs::write(destination, &buf) {
        if destination.exists() {
            if let Err(e) = fs::remove_file(destination) {
                warn!("Could not remove partial {}: {}", destination.display(), e);
            }
        }
        return Err(NormalizeError::Write {
            path: destination.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, Rgb, RgbImage, Rgba, RgbaImage};

    fn write_rgb(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([120, 80, 40]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_small_image_is_scaled_up_to_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("small.png");
        let dst = dir.path().join("out.png");
        write_rgb(&src, 300, 100);

        let dims = normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        // ratio = max(600/300, 400/100) = 4 -> 1200x400
        assert_eq!(dims, Dimensions { width: 1200, height: 400 });
        let written = image::open(&dst).unwrap();
        assert!(written.width() >= 600 && written.height() >= 400);
    }

    #[test]
    fn test_large_image_is_scaled_down_to_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("large.png");
        let dst = dir.path().join("out.jpg");
        write_rgb(&src, 2400, 1200);

        let dims = normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        assert!(dims.width <= 1200 && dims.height <= 900);
        assert_eq!(dims.width, 1200);
        assert_eq!(image::open(&dst).unwrap().dimensions(), (dims.width, dims.height));
    }

    #[test]
    fn test_image_within_bounds_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fine.png");
        let dst = dir.path().join("out.webp");
        write_rgb(&src, 800, 600);

        let dims = normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        assert_eq!(dims, Dimensions { width: 800, height: 600 });
        assert_eq!(image::open(&dst).unwrap().dimensions(), (800, 600));
    }

    #[test]
    fn test_jpeg_output_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("alpha.png");
        let dst = dir.path().join("flat.jpg");
        RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 128]))
            .save(&src)
            .unwrap();

        normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        assert_eq!(image::open(&dst).unwrap().color(), ColorType::Rgb8);
    }

    #[test]
    fn test_png_output_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("alpha.png");
        let dst = dir.path().join("kept.png");
        RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 128]))
            .save(&src)
            .unwrap();

        normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        assert_eq!(image::open(&dst).unwrap().color(), ColorType::Rgba8);
    }

    #[test]
    fn test_undecodable_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"not an image").unwrap();

        let err = normalize(&src, &dir.path().join("out.jpg"), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Decode { .. }));
    }

    #[test]
    fn test_target_size_meets_both_axes() {
        let opts = NormalizeOptions::default();
        assert_eq!(target_size(600, 400, &opts), None);
        assert_eq!(target_size(300, 200, &opts), Some((600, 400)));
        assert_eq!(target_size(2400, 1200, &opts), Some((1200, 600)));

        let (w, h) = target_size(7, 3, &opts).unwrap();
        assert!(w >= 600 && h >= 400);
    }

    #[test]
    fn test_extreme_aspect_ratio_goes_straight_to_final_size() {
        let opts = NormalizeOptions::default();
        // Upscaling alone would ask for 600x1200000
        assert_eq!(target_size(1, 2000, &opts), Some((1, 900)));

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("sliver.png");
        let dst = dir.path().join("out.png");
        write_rgb(&src, 1, 2000);

        let dims = normalize(&src, &dst, &opts).unwrap();
        assert_eq!(dims, Dimensions { width: 1, height: 900 });
    }

    #[test]
    fn test_other_extension_is_encoded_by_format() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fine.png");
        let dst = dir.path().join("out.bmp");
        write_rgb(&src, 800, 600);

        normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        assert_eq!(ImageFormat::from_path(&dst).unwrap(), ImageFormat::Bmp);
        let written = image::open(&dst).unwrap();
        assert_eq!(written.dimensions(), (800, 600));
    }

    #[test]
    fn test_webp_output_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("alpha.png");
        let dst = dir.path().join("kept.webp");
        RgbaImage::from_pixel(640, 480, Rgba([10, 20, 30, 128]))
            .save(&src)
            .unwrap();

        normalize(&src, &dst, &NormalizeOptions::default()).unwrap();

        let written = image::open(&dst).unwrap();
        assert_eq!(written.color(), ColorType::Rgba8);
        assert_eq!(written.to_rgba8().get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_failed_encode_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fine.png");
        // ICO can't hold images wider than 256 pixels
        let dst = dir.path().join("out.ico");
        write_rgb(&src, 800, 600);

        let err = normalize(&src, &dst, &NormalizeOptions::default()).unwrap_err();

        assert!(matches!(err, NormalizeError::Encode { .. }));
        assert!(!dst.exists());
    }
}
