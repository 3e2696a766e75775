//! Uniform records and sample tables uploaded by the passes.
//!
//! ## Usage
//!
//! Passes compute these when a parameter or the source size changes. The
//! layouts match the WGSL structs in `shaders/post_process.wgsl` and
//! `shaders/tone_map.wgsl`.

use std::f32::consts::PI;

/// Size of the offset and weight tables.
pub const MAX_SAMPLES: usize = 16;

/// Taps used by the 5x5 gaussian (a diamond of block distance <= 2).
pub const GAUSSIAN_5X5_TAPS: usize = 13;

/// Taps used by the separable bloom blur: centre plus 7 on each side.
pub const BLOOM_BLUR_TAPS: usize = 15;

const BLOOM_BLUR_HALF_TAPS: usize = (BLOOM_BLUR_TAPS - 1) / 2;

/// Constant buffer shared by the single and dual source effects.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessConstants {
    /// Texture coordinate offsets in `xy`; `zw` unused.
    pub sample_offsets: [[f32; 4]; MAX_SAMPLES],
    /// Per-sample weights, or packed scalar parameters for simple effects.
    pub sample_weights: [[f32; 4]; MAX_SAMPLES],
}

impl Default for PostProcessConstants {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Normal distribution evaluated at `(x, y)` with deviation `rho`.
pub fn gaussian_distribution(x: f32, y: f32, rho: f32) -> f32 {
    let g = 1.0 / (2.0 * PI * rho * rho).sqrt();
    g * (-(x * x + y * y) / (2.0 * rho * rho)).exp()
}

fn texel_size(width: u32, height: u32) -> (f32, f32) {
    (1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32)
}

impl PostProcessConstants {
    /// Four bilinear taps centred between texels, averaging a 2x2 block.
    pub fn down_scale_2x2(width: u32, height: u32) -> Self {
        let (tu, tv) = texel_size(width, height);
        let mut constants = Self::default();
        let mut index = 0;
        for y in 0..2 {
            for x in 0..2 {
                constants.sample_offsets[index] =
                    [(x as f32 - 0.5) * tu, (y as f32 - 0.5) * tv, 0.0, 0.0];
                index += 1;
            }
        }
        constants
    }

    /// Sixteen taps averaging a 4x4 block around the destination texel.
    pub fn down_scale_4x4(width: u32, height: u32) -> Self {
        let (tu, tv) = texel_size(width, height);
        let mut constants = Self::default();
        let mut index = 0;
        for y in 0..4 {
            for x in 0..4 {
                constants.sample_offsets[index] =
                    [(x as f32 - 1.5) * tu, (y as f32 - 1.5) * tv, 0.0, 0.0];
                index += 1;
            }
        }
        constants
    }

    /// Normalized 5x5 gaussian scaled by `multiplier`.
    pub fn gaussian_blur_5x5(width: u32, height: u32, multiplier: f32) -> Self {
        let (tu, tv) = texel_size(width, height);
        let mut constants = Self::default();
        let mut total_weight = 0.0;
        let mut index = 0;
        for x in -2i32..=2 {
            for y in -2i32..=2 {
                if x.abs() + y.abs() > 2 {
                    continue;
                }
                let weight = gaussian_distribution(x as f32, y as f32, 1.0);
                constants.sample_offsets[index] = [x as f32 * tu, y as f32 * tv, 0.0, 0.0];
                constants.sample_weights[index] = [weight; 4];
                total_weight += weight;
                index += 1;
            }
        }
        debug_assert_eq!(index, GAUSSIAN_5X5_TAPS);

        for weight in &mut constants.sample_weights[..GAUSSIAN_5X5_TAPS] {
            *weight = weight.map(|w| w / total_weight * multiplier);
        }
        constants
    }

    /// Threshold for the bright-pass filter, stored in `weights[0]`.
    pub fn bloom_extract(threshold: f32) -> Self {
        let mut constants = Self::default();
        constants.sample_weights[0] = [threshold; 4];
        constants
    }

    /// One axis of the separable bloom blur.
    ///
    /// `extent` is the source size along the blurred axis. A non-positive
    /// `size` degenerates to a single centre tap weighted by `brightness`.
    pub fn bloom_blur(extent: u32, horizontal: bool, size: f32, brightness: f32) -> Self {
        let texel = 1.0 / extent.max(1) as f32;
        let mut constants = Self::default();

        if size.is_nan() || size <= 0.0 {
            constants.sample_weights[0] = [brightness, brightness, brightness, 1.0];
            return constants;
        }

        let axis = |offset: f32| {
            if horizontal {
                [offset, 0.0, 0.0, 0.0]
            } else {
                [0.0, offset, 0.0, 0.0]
            }
        };

        let weight = brightness * gaussian_distribution(0.0, 0.0, size);
        constants.sample_weights[0] = [weight, weight, weight, 1.0];
        for i in 1..=BLOOM_BLUR_HALF_TAPS {
            let weight = brightness * gaussian_distribution(i as f32, 0.0, size);
            let offset = i as f32 * texel;
            constants.sample_offsets[i] = axis(offset);
            constants.sample_weights[i] = [weight, weight, weight, 1.0];
            constants.sample_offsets[i + BLOOM_BLUR_HALF_TAPS] = axis(-offset);
            constants.sample_weights[i + BLOOM_BLUR_HALF_TAPS] = [weight, weight, weight, 1.0];
        }
        constants
    }

    /// Linear blend weights of the two sources.
    pub fn merge(weight1: f32, weight2: f32) -> Self {
        let mut constants = Self::default();
        constants.sample_weights[0] = [weight1; 4];
        constants.sample_weights[1] = [weight2; 4];
        constants
    }

    /// Packs `(bloom saturation, bloom intensity, base saturation, base intensity)`.
    pub fn bloom_combine(
        bloom_intensity: f32,
        base_intensity: f32,
        bloom_saturation: f32,
        base_saturation: f32,
    ) -> Self {
        let mut constants = Self::default();
        constants.sample_weights[0] = [
            bloom_saturation,
            bloom_intensity,
            base_saturation,
            base_intensity,
        ];
        constants
    }
}

/// Constant buffer for the tone-map effects.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ToneMapConstants {
    pub linear_exposure: [f32; 4],
    pub paper_white_nits: [f32; 4],
}

impl ToneMapConstants {
    /// `exposure` is in stops; the shader multiplies by `2^exposure`.
    pub fn new(exposure: f32, paper_white_nits: f32) -> Self {
        Self {
            linear_exposure: [exposure.exp2(); 4],
            paper_white_nits: [paper_white_nits; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<PostProcessConstants>(), 512);
        assert_eq!(std::mem::size_of::<ToneMapConstants>(), 32);
    }

    #[test]
    fn gaussian_peak_and_symmetry() {
        let peak = gaussian_distribution(0.0, 0.0, 1.0);
        assert!(approx(peak, 1.0 / (2.0 * PI).sqrt()));
        assert!(approx(
            gaussian_distribution(1.0, 2.0, 1.5),
            gaussian_distribution(-2.0, 1.0, 1.5)
        ));
        assert!(gaussian_distribution(3.0, 0.0, 1.0) < gaussian_distribution(1.0, 0.0, 1.0));
    }

    #[test]
    fn down_scale_2x2_straddles_texel_corners() {
        let constants = PostProcessConstants::down_scale_2x2(4, 8);
        let offsets: Vec<[f32; 2]> = constants.sample_offsets[..4]
            .iter()
            .map(|o| [o[0], o[1]])
            .collect();
        assert_eq!(
            offsets,
            vec![
                [-0.125, -0.0625],
                [0.125, -0.0625],
                [-0.125, 0.0625],
                [0.125, 0.0625]
            ]
        );
        assert!(constants.sample_offsets[4..].iter().all(|o| *o == [0.0; 4]));
    }

    #[test]
    fn down_scale_4x4_is_centred() {
        let constants = PostProcessConstants::down_scale_4x4(16, 16);
        let sum = constants
            .sample_offsets
            .iter()
            .fold([0.0f32; 2], |acc, o| [acc[0] + o[0], acc[1] + o[1]]);
        assert!(approx(sum[0], 0.0) && approx(sum[1], 0.0));
        assert!(approx(constants.sample_offsets[0][0], -1.5 / 16.0));
        assert!(approx(constants.sample_offsets[15][1], 1.5 / 16.0));
    }

    #[test]
    fn gaussian_blur_weights_sum_to_multiplier() {
        for multiplier in [1.0, 0.5, 2.0] {
            let constants = PostProcessConstants::gaussian_blur_5x5(32, 32, multiplier);
            let total: f32 = constants.sample_weights[..GAUSSIAN_5X5_TAPS]
                .iter()
                .map(|w| w[0])
                .sum();
            assert!(approx(total, multiplier), "total {total} for {multiplier}");
            assert_eq!(constants.sample_weights[GAUSSIAN_5X5_TAPS], [0.0; 4]);
        }
    }

    #[test]
    fn gaussian_blur_excludes_corners() {
        let constants = PostProcessConstants::gaussian_blur_5x5(10, 10, 1.0);
        for offset in &constants.sample_offsets[..GAUSSIAN_5X5_TAPS] {
            let block = (offset[0] * 10.0).round().abs() + (offset[1] * 10.0).round().abs();
            assert!(block <= 2.0);
        }
    }

    #[test]
    fn bloom_blur_is_mirrored_along_axis() {
        let horizontal = PostProcessConstants::bloom_blur(64, true, 2.0, 1.5);
        for i in 1..=7 {
            let plus = horizontal.sample_offsets[i];
            let minus = horizontal.sample_offsets[i + 7];
            assert!(approx(plus[0], i as f32 / 64.0));
            assert!(approx(minus[0], -plus[0]));
            assert_eq!(plus[1], 0.0);
            assert_eq!(horizontal.sample_weights[i], horizontal.sample_weights[i + 7]);
            assert_eq!(horizontal.sample_weights[i][3], 1.0);
        }
        assert!(approx(
            horizontal.sample_weights[0][0],
            1.5 * gaussian_distribution(0.0, 0.0, 2.0)
        ));

        let vertical = PostProcessConstants::bloom_blur(32, false, 2.0, 1.5);
        assert_eq!(vertical.sample_offsets[3][0], 0.0);
        assert!(approx(vertical.sample_offsets[3][1], 3.0 / 32.0));
    }

    #[test]
    fn bloom_blur_with_zero_size_is_a_scaled_copy() {
        let constants = PostProcessConstants::bloom_blur(64, true, 0.0, 0.75);
        assert_eq!(constants.sample_weights[0], [0.75, 0.75, 0.75, 1.0]);
        assert!(constants.sample_weights[1..].iter().all(|w| *w == [0.0; 4]));
    }

    #[test]
    fn packed_scalar_parameters() {
        assert_eq!(
            PostProcessConstants::bloom_extract(0.3).sample_weights[0],
            [0.3; 4]
        );
        let merge = PostProcessConstants::merge(0.25, 0.75);
        assert_eq!(merge.sample_weights[0], [0.25; 4]);
        assert_eq!(merge.sample_weights[1], [0.75; 4]);
        let combine = PostProcessConstants::bloom_combine(1.25, 1.0, 0.5, 0.8);
        assert_eq!(combine.sample_weights[0], [0.5, 1.25, 0.8, 1.0]);
    }

    #[test]
    fn tone_map_exposure_is_in_stops() {
        let constants = ToneMapConstants::new(1.0, 200.0);
        assert_eq!(constants.linear_exposure[0], 2.0);
        assert_eq!(constants.paper_white_nits[0], 200.0);
        assert_eq!(ToneMapConstants::new(0.0, 80.0).linear_exposure[0], 1.0);
    }
}
