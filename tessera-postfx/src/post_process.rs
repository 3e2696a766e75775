//! The capability shared by every post-process pass.
//!
//! ## Usage
//!
//! Record a pass into an existing render pass with [`PostProcess::process`],
//! or let [`PostProcess::process_to_view`] open one that clears the target.
//! [`AnyPostProcess`] builds the right pass type from a runtime [`Effect`].

use std::sync::Arc;

use crate::{
    BasicPostProcess, DualPostProcess, Effect, EffectParameters, PostProcessError,
    PostProcessLibrary, RenderTargetState, SourceTexture, ToneMapPostProcess,
};

/// A fullscreen pass that reads one or two textures and writes the bound
/// render target.
pub trait PostProcess {
    /// Uploads pending constants and draws into `render_pass`.
    ///
    /// The render pass must target the format the pass was created for.
    fn process(
        &mut self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), PostProcessError>;

    /// Opens a render pass that clears `target` and draws into it.
    fn process_to_view(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) -> Result<(), PostProcessError> {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post Process Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        self.process(queue, &mut render_pass)
    }
}

/// A pass of any type, chosen at runtime.
pub enum AnyPostProcess {
    Basic(BasicPostProcess),
    Dual(DualPostProcess),
    ToneMap(ToneMapPostProcess),
}

impl AnyPostProcess {
    pub fn new(
        library: &Arc<PostProcessLibrary>,
        target: RenderTargetState,
        effect: Effect,
    ) -> Self {
        match effect {
            Effect::Basic(effect) => {
                Self::Basic(BasicPostProcess::with_library(library, target, effect))
            }
            Effect::Dual(effect) => {
                Self::Dual(DualPostProcess::with_library(library, target, effect))
            }
            Effect::ToneMap(effect) => {
                Self::ToneMap(ToneMapPostProcess::with_library(library, target, effect))
            }
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Self::Basic(pass) => Effect::Basic(pass.effect()),
            Self::Dual(pass) => Effect::Dual(pass.effect()),
            Self::ToneMap(pass) => Effect::ToneMap(pass.effect()),
        }
    }

    /// Binds the sources. `source2` is ignored by single source passes.
    pub fn set_sources(&mut self, source: SourceTexture, source2: Option<SourceTexture>) {
        match self {
            Self::Basic(pass) => pass.set_source_texture(source),
            Self::Dual(pass) => {
                pass.set_source_texture(source);
                if let Some(source2) = source2 {
                    pass.set_source_texture2(source2);
                }
            }
            Self::ToneMap(pass) => pass.set_hdr_source_texture(source),
        }
    }

    /// Applies the record matching this pass type.
    pub fn set_parameters(&mut self, parameters: &EffectParameters) {
        match self {
            Self::Basic(pass) => pass.set_parameters(parameters.basic),
            Self::Dual(pass) => pass.set_parameters(parameters.dual),
            Self::ToneMap(pass) => pass.set_parameters(parameters.tone_map),
        }
    }
}

impl PostProcess for AnyPostProcess {
    fn process(
        &mut self,
        queue: &wgpu::Queue,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), PostProcessError> {
        match self {
            Self::Basic(pass) => pass.process(queue, render_pass),
            Self::Dual(pass) => pass.process(queue, render_pass),
            Self::ToneMap(pass) => pass.process(queue, render_pass),
        }
    }
}
