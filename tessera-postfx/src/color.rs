//! CPU versions of the colour math used by the shaders.
//!
//! ## Usage
//!
//! The reference renderer and the tests evaluate effects with these
//! functions; each one mirrors a WGSL helper of the same name.

use glam::{Vec3, Vec4};

/// Rec.709 luminance weights.
pub const GRAYSCALE: Vec3 = Vec3::new(0.2125, 0.7154, 0.0721);

const SEPIA_RED: Vec3 = Vec3::new(0.393, 0.769, 0.189);
const SEPIA_GREEN: Vec3 = Vec3::new(0.349, 0.686, 0.168);
const SEPIA_BLUE: Vec3 = Vec3::new(0.272, 0.534, 0.131);

const REC709_TO_REC2020: [Vec3; 3] = [
    Vec3::new(0.6274040, 0.3292820, 0.0433136),
    Vec3::new(0.0690970, 0.9195400, 0.0113612),
    Vec3::new(0.0163916, 0.0880132, 0.8955950),
];

/// Peak luminance of the ST.2084 curve in nits.
pub const ST2084_MAX_NITS: f32 = 10000.0;

const PQ_M1: f32 = 0.159_301_76;
const PQ_M2: f32 = 78.84375;
const PQ_C1: f32 = 0.8359375;
const PQ_C2: f32 = 18.8515625;
const PQ_C3: f32 = 18.6875;

pub fn luminance(rgb: Vec3) -> f32 {
    rgb.dot(GRAYSCALE)
}

pub fn sepia(rgb: Vec3) -> Vec3 {
    Vec3::new(rgb.dot(SEPIA_RED), rgb.dot(SEPIA_GREEN), rgb.dot(SEPIA_BLUE))
}

/// Blends between the grey level of `color` and `color` itself. The grey is
/// broadcast to all four channels, alpha included.
pub fn adjust_saturation(color: Vec4, saturation: f32) -> Vec4 {
    let grey = Vec4::splat(luminance(color.truncate()));
    grey.lerp(color, saturation)
}

pub fn saturate(color: Vec4) -> Vec4 {
    color.clamp(Vec4::ZERO, Vec4::ONE)
}

pub fn reinhard(rgb: Vec3) -> Vec3 {
    let rgb = rgb.max(Vec3::ZERO);
    rgb / (Vec3::ONE + rgb)
}

/// Narkowicz's fit of the ACES filmic curve.
pub fn aces_filmic(rgb: Vec3) -> Vec3 {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    let x = rgb.max(Vec3::ZERO);
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(Vec3::ZERO, Vec3::ONE)
}

pub fn rec709_to_rec2020(rgb: Vec3) -> Vec3 {
    Vec3::new(
        rgb.dot(REC709_TO_REC2020[0]),
        rgb.dot(REC709_TO_REC2020[1]),
        rgb.dot(REC709_TO_REC2020[2]),
    )
}

/// Encodes linear light normalized to 10000 nits with the PQ curve.
pub fn linear_to_st2084(normalized: Vec3) -> Vec3 {
    let lp = normalized.max(Vec3::ZERO).powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * lp) / (Vec3::ONE + PQ_C3 * lp)).powf(PQ_M2)
}

/// Inverse of [`linear_to_st2084`].
pub fn st2084_to_linear(encoded: Vec3) -> Vec3 {
    let ep = encoded.max(Vec3::ZERO).powf(1.0 / PQ_M2);
    ((ep - PQ_C1).max(Vec3::ZERO) / (PQ_C2 - PQ_C3 * ep)).powf(1.0 / PQ_M1)
}

/// Rotates to Rec.2020 primaries and PQ encodes with `paper_white_nits`
/// mapped to 1.0 in the input.
pub fn hdr10(rgb: Vec3, paper_white_nits: f32) -> Vec3 {
    let rgb = rec709_to_rec2020(rgb);
    linear_to_st2084(rgb * (paper_white_nits / ST2084_MAX_NITS))
}

pub fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

pub fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}
