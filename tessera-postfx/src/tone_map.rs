//! Tone mapping and HDR10 display mapping.
//!
//! ## Usage
//!
//! SDR variants write linear values in `[0, 1]`; target an `*Srgb` format so
//! the hardware applies the sRGB curve. HDR10 variants write ST.2084 encoded
//! Rec.2020 values, typically into `Rgb10a2Unorm`.

use std::{fmt, str::FromStr, sync::Arc};

use glam::Vec3;
use tracing::trace;

use crate::{
    PostProcess, PostProcessError, RenderTargetState, SourceTexture, color,
    constants::ToneMapConstants,
    library::{PassShader, PostProcessLibrary},
    pass::FullscreenPass,
};

/// Curve compressing HDR values into displayable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneMapOperator {
    /// Pass values through unchanged.
    None,
    /// Clamp to `[0, 1]`.
    Saturate,
    Reinhard,
    AcesFilmic,
}

impl ToneMapOperator {
    pub fn apply(self, rgb: Vec3) -> Vec3 {
        match self {
            Self::None => rgb,
            Self::Saturate => rgb.clamp(Vec3::ZERO, Vec3::ONE),
            Self::Reinhard => color::reinhard(rgb),
            Self::AcesFilmic => color::aces_filmic(rgb),
        }
    }
}

/// Encoding applied after the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFunction {
    /// Linear output; the render target format decides the final encoding.
    Linear,
    /// Rec.2020 primaries with the ST.2084 (PQ) curve.
    St2084,
}

impl TransferFunction {
    pub fn apply(self, rgb: Vec3, paper_white_nits: f32) -> Vec3 {
        match self {
            Self::Linear => rgb,
            Self::St2084 => color::hdr10(rgb, paper_white_nits),
        }
    }
}

/// Effects implemented by [`ToneMapPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneMapEffect {
    Saturate,
    Reinhard,
    Filmic,
    /// HDR10 display mapping without compressing the range first.
    Hdr10,
    Hdr10Saturate,
    Hdr10Reinhard,
    Hdr10Filmic,
}

impl ToneMapEffect {
    pub const ALL: [Self; 7] = [
        Self::Saturate,
        Self::Reinhard,
        Self::Filmic,
        Self::Hdr10,
        Self::Hdr10Saturate,
        Self::Hdr10Reinhard,
        Self::Hdr10Filmic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Saturate => "saturate",
            Self::Reinhard => "reinhard",
            Self::Filmic => "filmic",
            Self::Hdr10 => "hdr10",
            Self::Hdr10Saturate => "hdr10_saturate",
            Self::Hdr10Reinhard => "hdr10_reinhard",
            Self::Hdr10Filmic => "hdr10_filmic",
        }
    }

    pub(crate) const fn entry_point(self) -> &'static str {
        match self {
            Self::Saturate => "fs_saturate",
            Self::Reinhard => "fs_reinhard",
            Self::Filmic => "fs_aces_filmic",
            Self::Hdr10 => "fs_hdr10",
            Self::Hdr10Saturate => "fs_hdr10_saturate",
            Self::Hdr10Reinhard => "fs_hdr10_reinhard",
            Self::Hdr10Filmic => "fs_hdr10_aces_filmic",
        }
    }

    pub const fn operator(self) -> ToneMapOperator {
        match self {
            Self::Saturate | Self::Hdr10Saturate => ToneMapOperator::Saturate,
            Self::Reinhard | Self::Hdr10Reinhard => ToneMapOperator::Reinhard,
            Self::Filmic | Self::Hdr10Filmic => ToneMapOperator::AcesFilmic,
            Self::Hdr10 => ToneMapOperator::None,
        }
    }

    pub const fn transfer_function(self) -> TransferFunction {
        match self {
            Self::Saturate | Self::Reinhard | Self::Filmic => TransferFunction::Linear,
            _ => TransferFunction::St2084,
        }
    }

    /// Inverse of [`operator`](Self::operator) and
    /// [`transfer_function`](Self::transfer_function). Linear output without
    /// an operator is not a tone map and yields `None`.
    pub const fn from_parts(operator: ToneMapOperator, transfer: TransferFunction) -> Option<Self> {
        match (operator, transfer) {
            (ToneMapOperator::None, TransferFunction::Linear) => None,
            (ToneMapOperator::Saturate, TransferFunction::Linear) => Some(Self::Saturate),
            (ToneMapOperator::Reinhard, TransferFunction::Linear) => Some(Self::Reinhard),
            (ToneMapOperator::AcesFilmic, TransferFunction::Linear) => Some(Self::Filmic),
            (ToneMapOperator::None, TransferFunction::St2084) => Some(Self::Hdr10),
            (ToneMapOperator::Saturate, TransferFunction::St2084) => Some(Self::Hdr10Saturate),
            (ToneMapOperator::Reinhard, TransferFunction::St2084) => Some(Self::Hdr10Reinhard),
            (ToneMapOperator::AcesFilmic, TransferFunction::St2084) => Some(Self::Hdr10Filmic),
        }
    }

    pub const fn is_hdr10(self) -> bool {
        matches!(self.transfer_function(), TransferFunction::St2084)
    }

    /// Render target format suited to the output encoding.
    pub const fn preferred_format(self) -> wgpu::TextureFormat {
        if self.is_hdr10() {
            wgpu::TextureFormat::Rgb10a2Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        }
    }

    /// Maps one exposed HDR colour the way the shader does.
    pub fn apply(self, rgb: Vec3, paper_white_nits: f32) -> Vec3 {
        let mapped = self.operator().apply(rgb);
        self.transfer_function().apply(mapped, paper_white_nits)
    }
}

impl fmt::Display for ToneMapEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToneMapEffect {
    type Err = PostProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.as_str() == s)
            .ok_or_else(|| PostProcessError::UnknownEffect(s.to_owned()))
    }
}

/// Tuning values for [`ToneMapPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapParameters {
    /// Exposure in stops applied before the operator.
    pub exposure: f32,
    /// Luminance in nits that an input value of 1.0 maps to for HDR10.
    pub paper_white_nits: f32,
}

impl Default for ToneMapParameters {
    fn default() -> Self {
        Self {
            exposure: 0.0,
            paper_white_nits: 200.0,
        }
    }
}

impl ToneMapParameters {
    pub fn constants(&self) -> ToneMapConstants {
        ToneMapConstants::new(self.exposure, self.paper_white_nits)
    }
}

/// Tone-map pass reading one HDR texture.
pub struct ToneMapPostProcess {
    effect: ToneMapEffect,
    pass: FullscreenPass,
    source: Option<SourceTexture>,
    parameters: ToneMapParameters,
    constants_dirty: bool,
}

impl ToneMapPostProcess {
    /// Creates the pass with its own [`PostProcessLibrary`].
    pub fn new(device: &wgpu::Device, target: RenderTargetState, effect: ToneMapEffect) -> Self {
        Self::with_library(&PostProcessLibrary::new(device), target, effect)
    }

    /// Creates the pass, sharing shaders and pipelines through `library`.
    pub fn with_library(
        library: &Arc<PostProcessLibrary>,
        target: RenderTargetState,
        effect: ToneMapEffect,
    ) -> Self {
        let pass = FullscreenPass::new(
            library,
            PassShader::ToneMap(effect),
            target,
            std::mem::size_of::<ToneMapConstants>() as u64,
        );
        Self {
            effect,
            pass,
            source: None,
            parameters: ToneMapParameters::default(),
            constants_dirty: true,
        }
    }

    pub fn effect(&self) -> ToneMapEffect {
        self.effect
    }

    pub fn parameters(&self) -> &ToneMapParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: ToneMapParameters) {
        self.parameters = parameters;
        self.constants_dirty = true;
    }

    pub fn set_hdr_source_texture(&mut self, source: SourceTexture) {
        self.source = Some(source);
        self.pass.invalidate_bindings();
    }

    /// Sets the HDR10 display mapping paper white in nits.
    pub fn set_hdr10_parameter(&mut self, paper_white_nits: f32) {
        self.parameters.paper_white_nits = paper_white_nits;
        self.constants_dirty = true;
    }

    /// Sets the exposure in stops.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.parameters.exposure = exposure;
        self.constants_dirty = true;
    }
}

impl PostProcess for ToneMapPostProcess {
    fn process(
        &mut self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), PostProcessError> {
        let source = self
            .source
            .as_ref()
            .ok_or(PostProcessError::MissingSource {
                effect: self.effect.as_str(),
            })?;

        if self.constants_dirty {
            trace!(effect = self.effect.as_str(), "uploading tone-map constants");
            self.pass.write_uniforms(queue, &self.parameters.constants());
            self.constants_dirty = false;
        }

        self.pass.draw(render_pass, &[source]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_decompose_into_operator_and_transfer() {
        for effect in ToneMapEffect::ALL {
            assert_eq!(
                ToneMapEffect::from_parts(effect.operator(), effect.transfer_function()),
                Some(effect)
            );
            assert_eq!(effect.as_str().parse::<ToneMapEffect>().ok(), Some(effect));
        }
        assert_eq!(
            ToneMapEffect::from_parts(ToneMapOperator::None, TransferFunction::Linear),
            None
        );
    }

    #[test]
    fn preferred_formats_follow_the_encoding() {
        assert_eq!(
            ToneMapEffect::Filmic.preferred_format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(
            ToneMapEffect::Hdr10Reinhard.preferred_format(),
            wgpu::TextureFormat::Rgb10a2Unorm
        );
    }

    #[test]
    fn sdr_operators_land_in_unit_range() {
        let bright = Vec3::new(8.0, 2.0, 0.5);
        for effect in [
            ToneMapEffect::Saturate,
            ToneMapEffect::Reinhard,
            ToneMapEffect::Filmic,
        ] {
            let mapped = effect.apply(bright, 200.0);
            assert!(mapped.min_element() >= 0.0 && mapped.max_element() <= 1.0);
        }
        assert_eq!(ToneMapEffect::Saturate.apply(bright, 200.0).x, 1.0);
    }

    #[test]
    fn hdr10_keeps_highlights_above_paper_white() {
        let paper_white = ToneMapEffect::Hdr10.apply(Vec3::ONE, 200.0);
        let highlight = ToneMapEffect::Hdr10.apply(Vec3::splat(4.0), 200.0);
        let clamped = ToneMapEffect::Hdr10Saturate.apply(Vec3::splat(4.0), 200.0);
        assert!(highlight.x > paper_white.x);
        assert!((clamped.x - paper_white.x).abs() < 1e-5);
    }

    #[test]
    fn default_parameters() {
        let constants = ToneMapParameters::default().constants();
        assert_eq!(constants.linear_exposure, [1.0; 4]);
        assert_eq!(constants.paper_white_nits, [200.0; 4]);
    }
}
