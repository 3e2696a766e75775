//! Post-process effects that combine two textures.
//!
//! ## Usage
//!
//! For bloom, bind the scene as the first source and the blurred bright pass
//! as the second, then run [`DualEffect::BloomCombine`].

use std::{fmt, str::FromStr, sync::Arc};

use tracing::trace;

use crate::{
    PostProcess, PostProcessError, RenderTargetState, SourceTexture,
    constants::PostProcessConstants,
    library::{PassShader, PostProcessLibrary},
    pass::FullscreenPass,
};

/// Effects implemented by [`DualPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualEffect {
    /// Weighted sum of both sources.
    Merge,
    /// Adds a bloom texture on top of the base scene.
    BloomCombine,
}

impl DualEffect {
    pub const ALL: [Self; 2] = [Self::Merge, Self::BloomCombine];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::BloomCombine => "bloom_combine",
        }
    }

    pub(crate) const fn entry_point(self) -> &'static str {
        match self {
            Self::Merge => "fs_merge",
            Self::BloomCombine => "fs_bloom_combine",
        }
    }

    pub fn constants(self, parameters: &DualParameters) -> PostProcessConstants {
        match self {
            Self::Merge => {
                PostProcessConstants::merge(parameters.merge_weight1, parameters.merge_weight2)
            }
            Self::BloomCombine => PostProcessConstants::bloom_combine(
                parameters.bloom_intensity,
                parameters.base_intensity,
                parameters.bloom_saturation,
                parameters.base_saturation,
            ),
        }
    }
}

impl fmt::Display for DualEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DualEffect {
    type Err = PostProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.as_str() == s)
            .ok_or_else(|| PostProcessError::UnknownEffect(s.to_owned()))
    }
}

/// Tuning values for [`DualPostProcess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualParameters {
    pub merge_weight1: f32,
    pub merge_weight2: f32,
    pub bloom_intensity: f32,
    pub base_intensity: f32,
    pub bloom_saturation: f32,
    pub base_saturation: f32,
}

impl Default for DualParameters {
    fn default() -> Self {
        Self {
            merge_weight1: 0.5,
            merge_weight2: 0.5,
            bloom_intensity: 1.25,
            base_intensity: 1.0,
            bloom_saturation: 1.0,
            base_saturation: 1.0,
        }
    }
}

/// Post-process pass that reads two textures.
pub struct DualPostProcess {
    effect: DualEffect,
    pass: FullscreenPass,
    source: Option<SourceTexture>,
    source2: Option<SourceTexture>,
    parameters: DualParameters,
    constants_dirty: bool,
}

impl DualPostProcess {
    /// Creates the pass with its own [`PostProcessLibrary`].
    pub fn new(device: &wgpu::Device, target: RenderTargetState, effect: DualEffect) -> Self {
        Self::with_library(&PostProcessLibrary::new(device), target, effect)
    }

    /// Creates the pass, sharing shaders and pipelines through `library`.
    pub fn with_library(
        library: &Arc<PostProcessLibrary>,
        target: RenderTargetState,
        effect: DualEffect,
    ) -> Self {
        let pass = FullscreenPass::new(
            library,
            PassShader::Dual(effect),
            target,
            std::mem::size_of::<PostProcessConstants>() as u64,
        );
        Self {
            effect,
            pass,
            source: None,
            source2: None,
            parameters: DualParameters::default(),
            constants_dirty: true,
        }
    }

    pub fn effect(&self) -> DualEffect {
        self.effect
    }

    pub fn parameters(&self) -> &DualParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: DualParameters) {
        self.parameters = parameters;
        self.constants_dirty = true;
    }

    /// First source; the base scene for [`DualEffect::BloomCombine`].
    pub fn set_source_texture(&mut self, source: SourceTexture) {
        self.source = Some(source);
        self.pass.invalidate_bindings();
    }

    /// Second source; the bloom texture for [`DualEffect::BloomCombine`].
    pub fn set_source_texture2(&mut self, source: SourceTexture) {
        self.source2 = Some(source);
        self.pass.invalidate_bindings();
    }

    /// Sets the blend weights for [`DualEffect::Merge`].
    pub fn set_merge_parameters(&mut self, weight1: f32, weight2: f32) {
        self.parameters.merge_weight1 = weight1;
        self.parameters.merge_weight2 = weight2;
        self.constants_dirty = true;
    }

    /// Sets intensities and saturations for [`DualEffect::BloomCombine`].
    pub fn set_bloom_combine_parameters(
        &mut self,
        bloom: f32,
        base: f32,
        bloom_saturation: f32,
        base_saturation: f32,
    ) {
        self.parameters.bloom_intensity = bloom;
        self.parameters.base_intensity = base;
        self.parameters.bloom_saturation = bloom_saturation;
        self.parameters.base_saturation = base_saturation;
        self.constants_dirty = true;
    }
}

impl PostProcess for DualPostProcess {
    fn process(
        &mut self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), PostProcessError> {
        let effect = self.effect.as_str();
        let source = self
            .source
            .as_ref()
            .ok_or(PostProcessError::MissingSource { effect })?;
        let source2 = self
            .source2
            .as_ref()
            .ok_or(PostProcessError::MissingSecondSource { effect })?;

        if self.constants_dirty {
            trace!(effect, "uploading post-process constants");
            self.pass.write_uniforms(queue, &self.effect.constants(&self.parameters));
            self.constants_dirty = false;
        }

        self.pass.draw(render_pass, &[source, source2]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_names_round_trip() {
        for effect in DualEffect::ALL {
            assert_eq!(effect.to_string().parse::<DualEffect>().ok(), Some(effect));
        }
        assert!("copy".parse::<DualEffect>().is_err());
    }

    #[test]
    fn default_parameters_feed_the_constants() {
        let parameters = DualParameters::default();
        let merge = DualEffect::Merge.constants(&parameters);
        assert_eq!(merge.sample_weights[0], [0.5; 4]);
        assert_eq!(merge.sample_weights[1], [0.5; 4]);

        let combine = DualEffect::BloomCombine.constants(&parameters);
        assert_eq!(combine.sample_weights[0], [1.0, 1.25, 1.0, 1.0]);
    }
}
