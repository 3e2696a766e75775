//! Single source post-process effects.
//!
//! ## Usage
//!
//! Build a [`BasicPostProcess`] for one effect and target format, point it at
//! a source texture and call [`PostProcess::process`] inside a render pass.

use std::{fmt, str::FromStr, sync::Arc};

use tracing::trace;

use crate::{
    PostProcess, PostProcessError, RenderTargetState, SourceTexture,
    constants::PostProcessConstants,
    library::{PassShader, PostProcessLibrary},
    pass::FullscreenPass,
};

/// Effects implemented by [`BasicPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicEffect {
    Copy,
    Monochrome,
    Sepia,
    DownScale2x2,
    DownScale4x4,
    GaussianBlur5x5,
    BloomExtract,
    BloomBlur,
}

impl BasicEffect {
    pub const ALL: [Self; 8] = [
        Self::Copy,
        Self::Monochrome,
        Self::Sepia,
        Self::DownScale2x2,
        Self::DownScale4x4,
        Self::GaussianBlur5x5,
        Self::BloomExtract,
        Self::BloomBlur,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Monochrome => "monochrome",
            Self::Sepia => "sepia",
            Self::DownScale2x2 => "down_scale_2x2",
            Self::DownScale4x4 => "down_scale_4x4",
            Self::GaussianBlur5x5 => "gaussian_blur_5x5",
            Self::BloomExtract => "bloom_extract",
            Self::BloomBlur => "bloom_blur",
        }
    }

    pub(crate) const fn entry_point(self) -> &'static str {
        match self {
            Self::Copy => "fs_copy",
            Self::Monochrome => "fs_monochrome",
            Self::Sepia => "fs_sepia",
            Self::DownScale2x2 => "fs_down_scale_2x2",
            Self::DownScale4x4 => "fs_down_scale_4x4",
            Self::GaussianBlur5x5 => "fs_gaussian_blur_5x5",
            Self::BloomExtract => "fs_bloom_extract",
            Self::BloomBlur => "fs_bloom_blur",
        }
    }

    /// Whether the shader reads the constant buffer.
    pub const fn uses_constants(self) -> bool {
        !matches!(self, Self::Copy | Self::Monochrome | Self::Sepia)
    }

    /// Whether the constants depend on the source texel size.
    pub const fn needs_source_size(self) -> bool {
        matches!(
            self,
            Self::DownScale2x2 | Self::DownScale4x4 | Self::GaussianBlur5x5 | Self::BloomBlur
        )
    }

    /// Natural size of the render target relative to the source.
    pub const fn output_scale(self) -> f32 {
        match self {
            Self::DownScale2x2 => 0.5,
            Self::DownScale4x4 => 0.25,
            _ => 1.0,
        }
    }

    /// Computes the constant buffer for this effect, or `None` when the
    /// shader does not read one.
    pub fn constants(
        self,
        parameters: &BasicParameters,
        source_size: Option<(u32, u32)>,
    ) -> Result<Option<PostProcessConstants>, PostProcessError> {
        let size = || {
            source_size.ok_or(PostProcessError::MissingSourceSize {
                effect: self.as_str(),
            })
        };

        let constants = match self {
            Self::Copy | Self::Monochrome | Self::Sepia => return Ok(None),
            Self::DownScale2x2 => {
                let (width, height) = size()?;
                PostProcessConstants::down_scale_2x2(width, height)
            }
            Self::DownScale4x4 => {
                let (width, height) = size()?;
                PostProcessConstants::down_scale_4x4(width, height)
            }
            Self::GaussianBlur5x5 => {
                let (width, height) = size()?;
                PostProcessConstants::gaussian_blur_5x5(
                    width,
                    height,
                    parameters.gaussian_multiplier,
                )
            }
            Self::BloomExtract => PostProcessConstants::bloom_extract(parameters.bloom_threshold),
            Self::BloomBlur => {
                let (width, height) = size()?;
                let extent = if parameters.bloom_horizontal {
                    width
                } else {
                    height
                };
                PostProcessConstants::bloom_blur(
                    extent,
                    parameters.bloom_horizontal,
                    parameters.bloom_size,
                    parameters.bloom_brightness,
                )
            }
        };
        Ok(Some(constants))
    }
}

impl fmt::Display for BasicEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasicEffect {
    type Err = PostProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.as_str() == s)
            .ok_or_else(|| PostProcessError::UnknownEffect(s.to_owned()))
    }
}

/// Tuning values for [`BasicPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicParameters {
    /// Scales the normalized 5x5 gaussian.
    pub gaussian_multiplier: f32,
    /// Bright-pass threshold for bloom extraction.
    pub bloom_threshold: f32,
    /// Bloom blur axis; vertical when false.
    pub bloom_horizontal: bool,
    /// Deviation of the bloom blur in texels.
    pub bloom_size: f32,
    /// Multiplier applied to every bloom blur tap.
    pub bloom_brightness: f32,
}

impl Default for BasicParameters {
    fn default() -> Self {
        Self {
            gaussian_multiplier: 1.0,
            bloom_threshold: 0.25,
            bloom_horizontal: true,
            bloom_size: 1.0,
            bloom_brightness: 1.0,
        }
    }
}

/// Post-process pass that reads one texture.
pub struct BasicPostProcess {
    effect: BasicEffect,
    pass: FullscreenPass,
    source: Option<SourceTexture>,
    parameters: BasicParameters,
    constants_dirty: bool,
}

impl BasicPostProcess {
    /// Creates the pass with its own [`PostProcessLibrary`].
    pub fn new(device: &wgpu::Device, target: RenderTargetState, effect: BasicEffect) -> Self {
        Self::with_library(&PostProcessLibrary::new(device), target, effect)
    }

    /// Creates the pass, sharing shaders and pipelines through `library`.
    pub fn with_library(
        library: &Arc<PostProcessLibrary>,
        target: RenderTargetState,
        effect: BasicEffect,
    ) -> Self {
        let pass = FullscreenPass::new(
            library,
            PassShader::Basic(effect),
            target,
            std::mem::size_of::<PostProcessConstants>() as u64,
        );
        Self {
            effect,
            pass,
            source: None,
            parameters: BasicParameters::default(),
            constants_dirty: true,
        }
    }

    pub fn effect(&self) -> BasicEffect {
        self.effect
    }

    pub fn parameters(&self) -> &BasicParameters {
        &self.parameters
    }

    /// Replaces all tuning values at once.
    pub fn set_parameters(&mut self, parameters: BasicParameters) {
        self.parameters = parameters;
        self.constants_dirty = true;
    }

    pub fn set_source_texture(&mut self, source: SourceTexture) {
        self.source = Some(source);
        self.pass.invalidate_bindings();
        // Offsets are expressed in texels of the source.
        self.constants_dirty = true;
    }

    /// Sets the multiplier for [`BasicEffect::GaussianBlur5x5`].
    pub fn set_gaussian_parameter(&mut self, multiplier: f32) {
        self.parameters.gaussian_multiplier = multiplier;
        self.constants_dirty = true;
    }

    /// Sets the threshold for [`BasicEffect::BloomExtract`].
    pub fn set_bloom_extract_parameter(&mut self, threshold: f32) {
        self.parameters.bloom_threshold = threshold;
        self.constants_dirty = true;
    }

    /// Sets axis, deviation and brightness for [`BasicEffect::BloomBlur`].
    pub fn set_bloom_blur_parameters(&mut self, horizontal: bool, size: f32, brightness: f32) {
        self.parameters.bloom_horizontal = horizontal;
        self.parameters.bloom_size = size;
        self.parameters.bloom_brightness = brightness;
        self.constants_dirty = true;
    }
}

impl PostProcess for BasicPostProcess {
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
            if let Some(constants) = self.effect.constants(&self.parameters, source.size())? {
                trace!(effect = self.effect.as_str(), "uploading post-process constants");
                self.pass.write_uniforms(queue, &constants);
            }
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
    fn effect_names_round_trip() {
        for effect in BasicEffect::ALL {
            assert_eq!(effect.as_str().parse::<BasicEffect>().ok(), Some(effect));
            assert!(effect.entry_point().ends_with(effect.as_str()));
        }
        assert!(matches!(
            "blur".parse::<BasicEffect>(),
            Err(PostProcessError::UnknownEffect(name)) if name == "blur"
        ));
    }

    #[test]
    fn colour_effects_need_no_constants() {
        let parameters = BasicParameters::default();
        for effect in [BasicEffect::Copy, BasicEffect::Monochrome, BasicEffect::Sepia] {
            assert!(matches!(effect.constants(&parameters, None), Ok(None)));
        }
    }

    #[test]
    fn sized_effects_require_source_size() {
        let parameters = BasicParameters::default();
        for effect in BasicEffect::ALL.into_iter().filter(|e| e.needs_source_size()) {
            assert!(matches!(
                effect.constants(&parameters, None),
                Err(PostProcessError::MissingSourceSize { effect: name }) if name == effect.as_str()
            ));
            assert!(matches!(effect.constants(&parameters, Some((8, 8))), Ok(Some(_))));
        }
        assert!(matches!(
            BasicEffect::BloomExtract.constants(&parameters, None),
            Ok(Some(_))
        ));
    }

    #[test]
    fn bloom_blur_uses_the_blurred_axis_extent() {
        let mut parameters = BasicParameters {
            bloom_horizontal: false,
            bloom_size: 2.0,
            ..BasicParameters::default()
        };
        let vertical = BasicEffect::BloomBlur
            .constants(&parameters, Some((100, 50)))
            .expect("size is given")
            .expect("bloom blur has constants");
        assert_eq!(vertical.sample_offsets[1], [0.0, 1.0 / 50.0, 0.0, 0.0]);

        parameters.bloom_horizontal = true;
        let horizontal = BasicEffect::BloomBlur
            .constants(&parameters, Some((100, 50)))
            .expect("size is given")
            .expect("bloom blur has constants");
        assert_eq!(horizontal.sample_offsets[1], [1.0 / 100.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn default_parameters_match_documented_values() {
        let defaults = BasicParameters::default();
        assert_eq!(defaults.gaussian_multiplier, 1.0);
        assert_eq!(defaults.bloom_threshold, 0.25);
        assert!(defaults.bloom_horizontal);
        assert_eq!(defaults.bloom_size, 1.0);
        assert_eq!(defaults.bloom_brightness, 1.0);
    }
}
