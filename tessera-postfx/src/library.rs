//! Shared shader modules, layouts and pipelines.
//!
//! ## Usage
//!
//! Create one [`PostProcessLibrary`] per device and hand it to every pass via
//! `with_library`. Render pipelines are built lazily the first time a
//! (shader, target) pair is requested and reused afterwards.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{BasicEffect, DualEffect, RenderTargetState, ToneMapEffect};

/// Fragment program selected by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PassShader {
    Basic(BasicEffect),
    Dual(DualEffect),
    ToneMap(ToneMapEffect),
}

impl PassShader {
    pub(crate) fn entry_point(self) -> &'static str {
        match self {
            Self::Basic(effect) => effect.entry_point(),
            Self::Dual(effect) => effect.entry_point(),
            Self::ToneMap(effect) => effect.entry_point(),
        }
    }

    pub(crate) fn layout(self) -> SourceLayout {
        match self {
            Self::Dual(_) => SourceLayout::Dual,
            Self::Basic(_) | Self::ToneMap(_) => SourceLayout::Single,
        }
    }
}

/// Number of textures bound next to the sampler and the constant buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SourceLayout {
    Single,
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: PassShader,
    target: RenderTargetState,
}

/// Device-wide cache of everything post-process passes share.
pub struct PostProcessLibrary {
    device: wgpu::Device,
    post_process_shader: wgpu::ShaderModule,
    tone_map_shader: wgpu::ShaderModule,
    single_layout: wgpu::BindGroupLayout,
    dual_layout: wgpu::BindGroupLayout,
    single_pipeline_layout: wgpu::PipelineLayout,
    dual_pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipeline_cache: Option<wgpu::PipelineCache>,
    pipelines: Mutex<FxHashMap<PipelineKey, Arc<wgpu::RenderPipeline>>>,
}

impl PostProcessLibrary {
    pub fn new(device: &wgpu::Device) -> Arc<Self> {
        Self::with_pipeline_cache(device, None)
    }

    /// Like [`new`](Self::new), compiling pipelines through `pipeline_cache`.
    pub fn with_pipeline_cache(
        device: &wgpu::Device,
        pipeline_cache: Option<wgpu::PipelineCache>,
    ) -> Arc<Self> {
        let post_process_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Process Shader"),
            source: wgpu::ShaderSource::Wgsl(
                concat!(
                    include_str!("shaders/fullscreen.wgsl"),
                    include_str!("shaders/post_process.wgsl")
                )
                .into(),
            ),
        });
        let tone_map_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tone Map Shader"),
            source: wgpu::ShaderSource::Wgsl(
                concat!(
                    include_str!("shaders/fullscreen.wgsl"),
                    include_str!("shaders/tone_map.wgsl")
                )
                .into(),
            ),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let common_entries = [
            texture_entry(0),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ];
        let [source, sampler_entry, constants] = common_entries;

        let single_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_process_single_bind_group_layout"),
            entries: &common_entries,
        });
        let dual_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_process_dual_bind_group_layout"),
            entries: &[source, sampler_entry, constants, texture_entry(3)],
        });

        let single_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Process Single Pipeline Layout"),
            bind_group_layouts: &[&single_layout],
            immediate_size: 0,
        });
        let dual_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Process Dual Pipeline Layout"),
            bind_group_layouts: &[&dual_layout],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Process Linear Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Arc::new(Self {
            device: device.clone(),
            post_process_shader,
            tone_map_shader,
            single_layout,
            dual_layout,
            single_pipeline_layout,
            dual_pipeline_layout,
            sampler,
            pipeline_cache,
            pipelines: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn pipeline_cache(&self) -> Option<&wgpu::PipelineCache> {
        self.pipeline_cache.as_ref()
    }

    /// Number of render pipelines compiled so far.
    pub fn cached_pipeline_count(&self) -> usize {
        self.pipelines.lock().len()
    }

    pub(crate) fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub(crate) fn bind_group_layout(&self, layout: SourceLayout) -> &wgpu::BindGroupLayout {
        match layout {
            SourceLayout::Single => &self.single_layout,
            SourceLayout::Dual => &self.dual_layout,
        }
    }

    pub(crate) fn pipeline(
        &self,
        shader: PassShader,
        target: RenderTargetState,
    ) -> Arc<wgpu::RenderPipeline> {
        let key = PipelineKey { shader, target };
        let mut pipelines = self.pipelines.lock();
        pipelines
            .entry(key)
            .or_insert_with(|| {
                debug!(
                    entry_point = shader.entry_point(),
                    format = ?target.format,
                    sample_count = target.sample_count,
                    "creating post-process pipeline"
                );
                Arc::new(self.create_pipeline(shader, target))
            })
            .clone()
    }

    fn create_pipeline(
        &self,
        shader: PassShader,
        target: RenderTargetState,
    ) -> wgpu::RenderPipeline {
        let module = match shader {
            PassShader::ToneMap(_) => &self.tone_map_shader,
            PassShader::Basic(_) | PassShader::Dual(_) => &self.post_process_shader,
        };
        let layout = match shader.layout() {
            SourceLayout::Single => &self.single_pipeline_layout,
            SourceLayout::Dual => &self.dual_pipeline_layout,
        };

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(shader.entry_point()),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: target.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(shader.entry_point()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview_mask: None,
                cache: self.pipeline_cache.as_ref(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_effects_bind_two_textures() {
        for effect in DualEffect::ALL {
            assert_eq!(PassShader::Dual(effect).layout(), SourceLayout::Dual);
        }
        for effect in BasicEffect::ALL {
            assert_eq!(PassShader::Basic(effect).layout(), SourceLayout::Single);
        }
        for effect in ToneMapEffect::ALL {
            assert_eq!(PassShader::ToneMap(effect).layout(), SourceLayout::Single);
        }
    }

    #[test]
    fn pipeline_keys_distinguish_targets() {
        let shader = PassShader::Basic(BasicEffect::Copy);
        let srgb = PipelineKey {
            shader,
            target: wgpu::TextureFormat::Rgba8UnormSrgb.into(),
        };
        let hdr = PipelineKey {
            shader,
            target: wgpu::TextureFormat::Rgba16Float.into(),
        };
        assert_ne!(srgb, hdr);
        assert_eq!(srgb, srgb);
    }
}
