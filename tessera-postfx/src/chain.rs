//! Named sequences of passes.
//!
//! ## Usage
//!
//! Describe a chain in code or TOML, then run it on the GPU with [`GpuChain`]
//! or on the CPU with [`reference::run_chain`](crate::reference::run_chain).
//!
//! ```toml
//! [[step]]
//! name = "extract"
//! effect = "bloom_extract"
//! scale = 0.5
//! threshold = 0.3
//!
//! [[step]]
//! name = "combine"
//! effect = "bloom_combine"
//! input = "source"
//! input2 = "extract"
//! ```

use std::{collections::BTreeMap, sync::Arc};

use rustc_hash::FxHashMap;
use tracing::{debug, info_span};

use crate::{
    AnyPostProcess, BasicEffect, DualEffect, Effect, EffectParameters, ParamValue, PostProcess,
    PostProcessError, PostProcessLibrary, RenderTargetState, SourceTexture, ToneMapEffect,
};

/// Name of the primary external input.
pub const SOURCE: &str = "source";
/// Name of the optional second external input.
pub const SOURCE2: &str = "source2";

/// Format of every step output except the last.
pub const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// An ordered list of steps; the last step produces the result.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainDesc {
    #[cfg_attr(feature = "serde", serde(rename = "step", default))]
    pub steps: Vec<StepDesc>,
}

/// One pass in a [`ChainDesc`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepDesc {
    pub name: String,
    pub effect: Effect,
    /// External input or earlier step read as the first source.
    #[cfg_attr(feature = "serde", serde(default = "default_input"))]
    pub input: String,
    /// Second source, required by dual effects only.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub input2: Option<String>,
    /// Output size relative to the first input; defaults to the natural
    /// scale of the effect.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub scale: Option<f32>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub params: BTreeMap<String, ParamValue>,
}

#[cfg(feature = "serde")]
fn default_input() -> String {
    SOURCE.to_owned()
}

impl StepDesc {
    pub fn new(name: impl Into<String>, effect: impl Into<Effect>) -> Self {
        Self {
            name: name.into(),
            effect: effect.into(),
            input: SOURCE.to_owned(),
            input2: None,
            scale: None,
            params: BTreeMap::new(),
        }
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn input2(mut self, input2: impl Into<String>) -> Self {
        self.input2 = Some(input2.into());
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn effective_scale(&self) -> f32 {
        self.scale.unwrap_or_else(|| self.effect.output_scale())
    }

    /// Defaults overlaid with this step's parameters.
    pub fn parameters(&self) -> Result<EffectParameters, PostProcessError> {
        let mut parameters = EffectParameters::default();
        for (name, value) in &self.params {
            parameters.set(self.effect, name, *value)?;
        }
        Ok(parameters)
    }
}

/// Tuning for [`ChainDesc::bloom`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomPreset {
    pub threshold: f32,
    /// Resolution of the bright pass and blur relative to the source.
    pub scale: f32,
    pub blur_size: f32,
    pub blur_brightness: f32,
    pub bloom_intensity: f32,
    pub base_intensity: f32,
    pub bloom_saturation: f32,
    pub base_saturation: f32,
}

impl Default for BloomPreset {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            scale: 0.5,
            blur_size: 4.0,
            blur_brightness: 1.0,
            bloom_intensity: 1.25,
            base_intensity: 1.0,
            bloom_saturation: 1.0,
            base_saturation: 1.0,
        }
    }
}

impl ChainDesc {
    pub fn new(steps: Vec<StepDesc>) -> Self {
        Self { steps }
    }

    /// Extract, blur horizontally, blur vertically, combine with the source.
    pub fn bloom(preset: &BloomPreset) -> Self {
        Self::new(vec![
            StepDesc::new("extract", BasicEffect::BloomExtract)
                .scale(preset.scale)
                .param("threshold", preset.threshold),
            StepDesc::new("blur_h", BasicEffect::BloomBlur)
                .input("extract")
                .param("horizontal", true)
                .param("size", preset.blur_size)
                .param("brightness", preset.blur_brightness),
            StepDesc::new("blur_v", BasicEffect::BloomBlur)
                .input("blur_h")
                .param("horizontal", false)
                .param("size", preset.blur_size)
                .param("brightness", preset.blur_brightness),
            StepDesc::new("combine", DualEffect::BloomCombine)
                .input2("blur_v")
                .param("bloom_intensity", preset.bloom_intensity)
                .param("base_intensity", preset.base_intensity)
                .param("bloom_saturation", preset.bloom_saturation)
                .param("base_saturation", preset.base_saturation),
        ])
    }

    /// Appends a tone-map step reading the current result.
    pub fn with_tone_map(mut self, effect: ToneMapEffect, exposure: f32) -> Self {
        let input = self
            .steps
            .last()
            .map_or_else(|| SOURCE.to_owned(), |step| step.name.clone());
        self.steps.push(
            StepDesc::new("tone_map", effect)
                .input(input)
                .param("exposure", exposure),
        );
        self
    }

    /// The step producing the chain result.
    pub fn output(&self) -> Option<&StepDesc> {
        self.steps.last()
    }

    /// Checks names, inputs, scales and parameters against `sources`.
    pub fn validate(&self, sources: &[&str]) -> Result<(), PostProcessError> {
        let invalid = |message: String| Err(PostProcessError::InvalidChain(message));
        if self.steps.is_empty() {
            return invalid("chain has no steps".to_owned());
        }

        let mut known: Vec<&str> = sources.to_vec();
        for step in &self.steps {
            if known.contains(&step.name.as_str()) {
                return invalid(format!("step name `{}` is already in use", step.name));
            }
            if !known.contains(&step.input.as_str()) {
                return invalid(format!(
                    "step `{}` reads unknown input `{}`",
                    step.name, step.input
                ));
            }
            match (&step.input2, step.effect.source_count()) {
                (None, 2) => {
                    return invalid(format!(
                        "step `{}` uses `{}` which needs input2",
                        step.name, step.effect
                    ));
                }
                (Some(input2), 1) => {
                    return invalid(format!(
                        "step `{}` sets input2 `{input2}` but `{}` reads one source",
                        step.name, step.effect
                    ));
                }
                (Some(input2), _) if !known.contains(&input2.as_str()) => {
                    return invalid(format!(
                        "step `{}` reads unknown input2 `{input2}`",
                        step.name
                    ));
                }
                _ => {}
            }
            let scale = step.effective_scale();
            if !(scale.is_finite() && scale > 0.0) {
                return invalid(format!(
                    "step `{}` has non-positive scale {scale}",
                    step.name
                ));
            }
            step.parameters()?;
            known.push(&step.name);
        }
        Ok(())
    }

    /// Validates the chain and returns the output size of every step.
    ///
    /// Fails with [`PostProcessError::InvalidSize`] when a source is empty or
    /// a step would be wider or taller than `max_dimension`.
    pub fn output_sizes(
        &self,
        sources: &[(&str, (u32, u32))],
        max_dimension: u32,
    ) -> Result<Vec<(u32, u32)>, PostProcessError> {
        let names: Vec<&str> = sources.iter().map(|(name, _)| *name).collect();
        self.validate(&names)?;
        for &(_, (width, height)) in sources {
            if width == 0 || height == 0 {
                return Err(PostProcessError::InvalidSize { width, height });
            }
        }

        let mut sizes: FxHashMap<&str, (u32, u32)> = sources.iter().copied().collect();
        let mut result = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let (width, height) = sizes[step.input.as_str()];
            let scale = step.effective_scale();
            let size = (scaled(width, scale), scaled(height, scale));
            if size.0 > max_dimension as u64 || size.1 > max_dimension as u64 {
                return Err(PostProcessError::InvalidSize {
                    width: size.0.min(u32::MAX as u64) as u32,
                    height: size.1.min(u32::MAX as u64) as u32,
                });
            }
            let size = (size.0 as u32, size.1 as u32);
            sizes.insert(step.name.as_str(), size);
            result.push(size);
        }
        Ok(result)
    }
}

fn scaled(extent: u32, scale: f32) -> u64 {
    let value = (extent as f64 * scale as f64).ceil();
    if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        (value as u64).max(1)
    }
}

/// A [`ChainDesc`] with one pass object per step.
pub struct GpuChain {
    library: Arc<PostProcessLibrary>,
    desc: ChainDesc,
    output_format: wgpu::TextureFormat,
    passes: Vec<AnyPostProcess>,
}

impl GpuChain {
    /// Builds the passes. The last step renders `output_format`, the others
    /// [`INTERMEDIATE_FORMAT`].
    pub fn new(
        library: &Arc<PostProcessLibrary>,
        desc: ChainDesc,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, PostProcessError> {
        desc.validate(&[SOURCE, SOURCE2])?;

        let last = desc.steps.len() - 1;
        let passes = desc
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let format = if index == last {
                    output_format
                } else {
                    INTERMEDIATE_FORMAT
                };
                let mut pass =
                    AnyPostProcess::new(library, RenderTargetState::new(format), step.effect);
                pass.set_parameters(&step.parameters()?);
                Ok(pass)
            })
            .collect::<Result<Vec<_>, PostProcessError>>()?;

        Ok(Self {
            library: library.clone(),
            desc,
            output_format,
            passes,
        })
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn desc(&self) -> &ChainDesc {
        &self.desc
    }

    /// Records and submits every step, returning the final texture.
    ///
    /// `sources` maps external input names to sized textures.
    pub fn run(
        &mut self,
        queue: &wgpu::Queue,
        sources: &[(&str, SourceTexture)],
    ) -> Result<wgpu::Texture, PostProcessError> {
        let first_effect = self.desc.steps[0].effect.as_str();
        let sized = sources
            .iter()
            .map(|(name, source)| {
                source
                    .size()
                    .map(|size| (*name, size))
                    .ok_or(PostProcessError::MissingSourceSize {
                        effect: first_effect,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let max_dimension = self.library.device().limits().max_texture_dimension_2d;
        let sizes = self.desc.output_sizes(&sized, max_dimension)?;

        let device = self.library.device();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Post Process Chain Encoder"),
        });
        let mut outputs: FxHashMap<&str, SourceTexture> = sources
            .iter()
            .map(|(name, source)| (*name, source.clone()))
            .collect();
        let mut result = None;

        let last = self.passes.len() - 1;
        for (index, ((step, pass), (width, height))) in self
            .desc
            .steps
            .iter()
            .zip(&mut self.passes)
            .zip(sizes)
            .enumerate()
        {
            let _span =
                info_span!("chain_step", name = %step.name, effect = %step.effect).entered();
            let format = if index == last {
                self.output_format
            } else {
                INTERMEDIATE_FORMAT
            };
            debug!(width, height, ?format, "allocating step target");
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&step.name),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });

            let source = outputs[step.input.as_str()].clone();
            let source2 = step
                .input2
                .as_deref()
                .map(|name| outputs[name].clone());
            pass.set_sources(source, source2);

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            pass.process_to_view(queue, &mut encoder, &view)?;

            outputs.insert(step.name.as_str(), SourceTexture::from_texture(&texture));
            result = Some(texture);
        }

        queue.submit(Some(encoder.finish()));
        result.ok_or_else(|| PostProcessError::InvalidChain("chain has no steps".to_owned()))
    }
}
