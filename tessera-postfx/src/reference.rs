//! CPU rendition of every effect.
//!
//! ## Usage
//!
//! [`render`] evaluates one effect over [`Rgba32FImage`] sources with the same
//! constants the GPU passes upload and a clamp-to-edge bilinear sampler, so
//! results agree with the GPU within filtering precision. [`run_chain`] does the
//! same for a whole [`ChainDesc`].

use glam::{Vec2, Vec3, Vec4};
use image::Rgba32FImage;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    BasicEffect, ChainDesc, DualEffect, Effect, EffectParameters, PostProcessError, color,
    constants::{BLOOM_BLUR_TAPS, GAUSSIAN_5X5_TAPS, PostProcessConstants},
};

/// Largest width or height rendered on the CPU.
pub const MAX_DIMENSION: u32 = 16_384;

fn check_size(width: u32, height: u32) -> Result<(), PostProcessError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PostProcessError::InvalidSize { width, height });
    }
    Ok(())
}

/// Bilinear sample at `uv` with clamp-to-edge addressing.
///
/// `image` must not be empty.
pub fn sample(image: &Rgba32FImage, uv: Vec2) -> Vec4 {
    let (width, height) = image.dimensions();
    let x = uv.x * width as f32 - 0.5;
    let y = uv.y * height as f32 - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let texel = |tx: f32, ty: f32| {
        let cx = (tx as i64).clamp(0, width as i64 - 1) as u32;
        let cy = (ty as i64).clamp(0, height as i64 - 1) as u32;
        Vec4::from_array(image.get_pixel(cx, cy).0)
    };

    let top = texel(x0, y0).lerp(texel(x0 + 1.0, y0), fx);
    let bottom = texel(x0, y0 + 1.0).lerp(texel(x0 + 1.0, y0 + 1.0), fx);
    top.lerp(bottom, fy)
}

fn weighted_taps(
    image: &Rgba32FImage,
    uv: Vec2,
    constants: &PostProcessConstants,
    taps: usize,
) -> Vec4 {
    (0..taps)
        .map(|i| {
            let offset = Vec2::new(constants.sample_offsets[i][0], constants.sample_offsets[i][1]);
            Vec4::from_array(constants.sample_weights[i]) * sample(image, uv + offset)
        })
        .sum()
}

fn averaged_taps(
    image: &Rgba32FImage,
    uv: Vec2,
    constants: &PostProcessConstants,
    taps: usize,
) -> Vec4 {
    let total: Vec4 = (0..taps)
        .map(|i| {
            let offset = Vec2::new(constants.sample_offsets[i][0], constants.sample_offsets[i][1]);
            sample(image, uv + offset)
        })
        .sum();
    total / taps as f32
}

fn shade_basic(
    effect: BasicEffect,
    constants: Option<&PostProcessConstants>,
    source: &Rgba32FImage,
    uv: Vec2,
) -> Vec4 {
    match (effect, constants) {
        (BasicEffect::Monochrome, _) => {
            let color = sample(source, uv);
            Vec3::splat(color::luminance(color.truncate())).extend(color.w)
        }
        (BasicEffect::Sepia, _) => {
            let color = sample(source, uv);
            color::sepia(color.truncate()).extend(color.w)
        }
        (BasicEffect::DownScale2x2, Some(constants)) => averaged_taps(source, uv, constants, 4),
        (BasicEffect::DownScale4x4, Some(constants)) => averaged_taps(source, uv, constants, 16),
        (BasicEffect::GaussianBlur5x5, Some(constants)) => {
            weighted_taps(source, uv, constants, GAUSSIAN_5X5_TAPS)
        }
        (BasicEffect::BloomExtract, Some(constants)) => {
            let threshold = constants.sample_weights[0][0];
            let range = (1.0 - threshold).max(1.0e-4);
            color::saturate((sample(source, uv) - Vec4::splat(threshold)) / range)
        }
        (BasicEffect::BloomBlur, Some(constants)) => {
            weighted_taps(source, uv, constants, BLOOM_BLUR_TAPS)
                .truncate()
                .extend(1.0)
        }
        _ => sample(source, uv),
    }
}

fn shade_dual(
    effect: DualEffect,
    constants: &PostProcessConstants,
    source: &Rgba32FImage,
    source2: &Rgba32FImage,
    uv: Vec2,
) -> Vec4 {
    let first = sample(source, uv);
    let second = sample(source2, uv);
    match effect {
        DualEffect::Merge => {
            Vec4::from_array(constants.sample_weights[0]) * first
                + Vec4::from_array(constants.sample_weights[1]) * second
        }
        DualEffect::BloomCombine => {
            let [bloom_saturation, bloom_intensity, base_saturation, base_intensity] =
                constants.sample_weights[0];
            let bloom = color::adjust_saturation(second, bloom_saturation) * bloom_intensity;
            let base = color::adjust_saturation(first, base_saturation) * base_intensity;
            base * (Vec4::ONE - color::saturate(bloom)) + bloom
        }
    }
}

/// Renders `effect` into an image of `size`.
///
/// `sources` holds one image, or two for dual effects.
pub fn render(
    effect: Effect,
    parameters: &EffectParameters,
    sources: &[&Rgba32FImage],
    size: (u32, u32),
) -> Result<Rgba32FImage, PostProcessError> {
    let (width, height) = size;
    check_size(width, height)?;
    for image in sources {
        let (source_width, source_height) = image.dimensions();
        check_size(source_width, source_height)?;
    }
    let &source = sources.first().ok_or(PostProcessError::MissingSource {
        effect: effect.as_str(),
    })?;

    let pixel = |x: u32, y: u32| {
        Vec2::new(
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        )
    };
    let mut output = Rgba32FImage::new(width, height);

    match effect {
        Effect::Basic(effect) => {
            let constants = effect.constants(&parameters.basic, Some(source.dimensions()))?;
            for (x, y, out) in output.enumerate_pixels_mut() {
                out.0 = shade_basic(effect, constants.as_ref(), source, pixel(x, y)).to_array();
            }
        }
        Effect::Dual(effect) => {
            let &source2 = sources.get(1).ok_or(PostProcessError::MissingSecondSource {
                effect: effect.as_str(),
            })?;
            let constants = effect.constants(&parameters.dual);
            for (x, y, out) in output.enumerate_pixels_mut() {
                out.0 = shade_dual(effect, &constants, source, source2, pixel(x, y)).to_array();
            }
        }
        Effect::ToneMap(effect) => {
            let constants = parameters.tone_map.constants();
            let exposure = constants.linear_exposure[0];
            let nits = constants.paper_white_nits[0];
            for (x, y, out) in output.enumerate_pixels_mut() {
                let hdr = sample(source, pixel(x, y)).truncate() * exposure;
                out.0 = effect.apply(hdr, nits).extend(1.0).to_array();
            }
        }
    }
    Ok(output)
}

/// Rounds every channel the way storing into `format` would.
///
/// sRGB formats are encoded and decoded again so values stay linear.
pub fn quantize(
    image: &mut Rgba32FImage,
    format: wgpu::TextureFormat,
) -> Result<(), PostProcessError> {
    use wgpu::TextureFormat as F;

    fn unorm(value: f32, steps: f32) -> f32 {
        (value.clamp(0.0, 1.0) * steps).round() / steps
    }

    let quantize_pixel: fn(&mut [f32; 4]) = match format {
        F::Rgba32Float => return Ok(()),
        F::Rgba16Float => |pixel| {
            for channel in pixel.iter_mut() {
                *channel = half::f16::from_f32(*channel).to_f32();
            }
        },
        F::Rgba8Unorm | F::Bgra8Unorm => |pixel| {
            for channel in pixel.iter_mut() {
                *channel = unorm(*channel, 255.0);
            }
        },
        F::Rgba8UnormSrgb | F::Bgra8UnormSrgb => |pixel| {
            for channel in &mut pixel[..3] {
                *channel = color::srgb_to_linear(unorm(color::linear_to_srgb(*channel), 255.0));
            }
            pixel[3] = unorm(pixel[3], 255.0);
        },
        F::Rgb10a2Unorm => |pixel| {
            for channel in &mut pixel[..3] {
                *channel = unorm(*channel, 1023.0);
            }
            pixel[3] = unorm(pixel[3], 3.0);
        },
        other => return Err(PostProcessError::UnsupportedFormat(other)),
    };

    for pixel in image.pixels_mut() {
        quantize_pixel(&mut pixel.0);
    }
    Ok(())
}

fn find_input<'a>(
    images: &'a FxHashMap<&str, Rgba32FImage>,
    sources: &[(&str, &'a Rgba32FImage)],
    name: &str,
) -> Option<&'a Rgba32FImage> {
    images.get(name).or_else(|| {
        sources
            .iter()
            .find(|(source, _)| *source == name)
            .map(|(_, image)| *image)
    })
}

/// Runs `chain` over named `sources`, quantizing intermediates like the GPU
/// chain does and the result to `output_format`.
pub fn run_chain(
    chain: &ChainDesc,
    sources: &[(&str, &Rgba32FImage)],
    output_format: wgpu::TextureFormat,
) -> Result<Rgba32FImage, PostProcessError> {
    let sized: Vec<_> = sources
        .iter()
        .map(|(name, image)| (*name, image.dimensions()))
        .collect();
    let sizes = chain.output_sizes(&sized, MAX_DIMENSION)?;

    let mut images: FxHashMap<&str, Rgba32FImage> = FxHashMap::default();
    let last = chain.steps.len() - 1;
    let mut result = None;
    for (index, (step, size)) in chain.steps.iter().zip(sizes).enumerate() {
        debug!(step = %step.name, effect = %step.effect, ?size, "running reference step");
        let missing =
            || PostProcessError::InvalidChain(format!("input of `{}` is missing", step.name));
        let first = find_input(&images, sources, &step.input).ok_or_else(missing)?;
        let second = match &step.input2 {
            Some(name) => Some(find_input(&images, sources, name).ok_or_else(missing)?),
            None => None,
        };
        let inputs: Vec<&Rgba32FImage> = std::iter::once(first).chain(second).collect();

        let mut output = render(step.effect, &step.parameters()?, &inputs, size)?;
        if index == last {
            quantize(&mut output, output_format)?;
            result = Some(output);
        } else {
            quantize(&mut output, crate::chain::INTERMEDIATE_FORMAT)?;
            images.insert(step.name.as_str(), output);
        }
    }
    result.ok_or_else(|| PostProcessError::InvalidChain("chain has no steps".to_owned()))
}
