//! Image file loading and saving.
//!
//! Every image is held as linear `Rgba32F` in memory. 8 and 16-bit files are
//! treated as sRGB encoded; HDR and OpenEXR files are already linear.

use std::path::Path;

use anyhow::{Context, Result, bail};
use image::{DynamicImage, ImageBuffer, Rgb32FImage, Rgba, Rgba32FImage, RgbaImage};
use tessera_postfx::color::{linear_to_srgb, srgb_to_linear};

/// How the pixel values of a result map onto file values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Linear light, sRGB encoded for integer files.
    Linear,
    /// Already a display signal (HDR10 output); stored as is in a 16-bit PNG.
    Signal,
}

pub fn load(path: &Path) -> Result<Rgba32FImage> {
    let image = image::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_float = matches!(
        image,
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
    );

    let mut pixels = image.into_rgba32f();
    if !is_float {
        for pixel in pixels.pixels_mut() {
            for channel in &mut pixel.0[..3] {
                *channel = srgb_to_linear(*channel);
            }
        }
    }
    Ok(pixels)
}

pub fn save(path: &Path, image: &Rgba32FImage, encoding: Encoding) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let dynamic = match (extension.as_str(), encoding) {
        ("exr", _) => DynamicImage::ImageRgba32F(image.clone()),
        ("hdr", _) => DynamicImage::ImageRgb32F(to_rgb32f(image)),
        ("png", Encoding::Signal) => DynamicImage::ImageRgba16(to_rgba16(image)),
        ("jpg" | "jpeg", Encoding::Signal) => {
            bail!("HDR10 output needs a 16-bit format; write a .png file instead")
        }
        ("jpg" | "jpeg", Encoding::Linear) => DynamicImage::ImageRgb8(
            DynamicImage::ImageRgba8(to_srgb8(image)).to_rgb8(),
        ),
        ("png", Encoding::Linear) => DynamicImage::ImageRgba8(to_srgb8(image)),
        _ => bail!(
            "Unsupported output extension `{extension}` (expected png, jpg, hdr or exr)"
        ),
    };

    dynamic
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Clamps to `[0, 1]`, applies the sRGB curve to color and rounds to 8 bits.
fn to_srgb8(image: &Rgba32FImage) -> RgbaImage {
    let quantize = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        Rgba([
            quantize(linear_to_srgb(r.max(0.0))),
            quantize(linear_to_srgb(g.max(0.0))),
            quantize(linear_to_srgb(b.max(0.0))),
            quantize(a),
        ])
    })
}

fn to_rgba16(image: &Rgba32FImage) -> ImageBuffer<Rgba<u16>, Vec<u16>> {
    let quantize = |value: f32| (value.clamp(0.0, 1.0) * 65535.0).round() as u16;
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        Rgba(image.get_pixel(x, y).0.map(quantize))
    })
}

fn to_rgb32f(image: &Rgba32FImage) -> Rgb32FImage {
    DynamicImage::ImageRgba32F(image.clone()).into_rgb32f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb8_output_clamps_and_encodes() {
        let image = Rgba32FImage::from_pixel(1, 1, Rgba([2.0, 0.5, -1.0, 1.0]));
        let encoded = to_srgb8(&image);
        assert_eq!(encoded.get_pixel(0, 0).0, [255, 188, 0, 255]);
    }

    #[test]
    fn signal_output_is_not_gamma_encoded() {
        let image = Rgba32FImage::from_pixel(1, 1, Rgba([0.5, 0.0, 1.0, 1.0]));
        let encoded = to_rgba16(&image);
        assert_eq!(encoded.get_pixel(0, 0).0, [32768, 0, 65535, 65535]);
    }

    #[test]
    fn png_round_trip_restores_linear_values() {
        let dir = std::env::temp_dir().join(format!("postfx-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir is writable");
        let path = dir.join("mid_gray.png");

        let image = Rgba32FImage::from_pixel(2, 2, Rgba([0.2, 0.2, 0.2, 1.0]));
        save(&path, &image, Encoding::Linear).expect("png is supported");
        let loaded = load(&path).expect("png was just written");
        std::fs::remove_dir_all(&dir).ok();

        let [r, _, _, a] = loaded.get_pixel(1, 1).0;
        assert!((r - 0.2).abs() < 4e-3, "got {r}");
        assert_eq!(a, 1.0);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let image = Rgba32FImage::new(1, 1);
        let error = save(Path::new("out.bmp"), &image, Encoding::Linear)
            .expect_err("bmp is not enabled");
        assert!(error.to_string().contains("bmp"));
    }

    #[test]
    fn hdr10_output_refuses_jpeg() {
        let image = Rgba32FImage::new(1, 1);
        assert!(save(Path::new("out.jpg"), &image, Encoding::Signal).is_err());
    }
}
