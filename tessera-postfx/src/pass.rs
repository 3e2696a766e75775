//! Fullscreen triangle draw shared by every pass type.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::{
    RenderTargetState, SourceTexture,
    library::{PassShader, PostProcessLibrary, SourceLayout},
};

/// Pipeline, constant buffer and lazily rebuilt bind group for one pass.
pub(crate) struct FullscreenPass {
    library: Arc<PostProcessLibrary>,
    pipeline: Arc<wgpu::RenderPipeline>,
    layout: SourceLayout,
    uniform_buffer: wgpu::Buffer,
    /// Set once a draw referencing `uniform_buffer` has been recorded.
    uniforms_recorded: bool,
    bind_group: Option<wgpu::BindGroup>,
}

impl FullscreenPass {
    pub(crate) fn new(
        library: &Arc<PostProcessLibrary>,
        shader: PassShader,
        target: RenderTargetState,
        uniform_size: u64,
    ) -> Self {
        let pipeline = library.pipeline(shader, target);
        let uniform_buffer = library.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Post Process Constants Buffer"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            library: library.clone(),
            pipeline,
            layout: shader.layout(),
            uniform_buffer,
            uniforms_recorded: false,
            bind_group: None,
        }
    }

    /// Drops the cached bind group after a source texture changed.
    pub(crate) fn invalidate_bindings(&mut self) {
        self.bind_group = None;
    }

    /// Stores new constants for the next draw.
    ///
    /// Queue writes land at the next submit, so once a draw using the current
    /// buffer has been recorded the values go into a fresh buffer instead.
    /// Earlier draws in the same encoder keep reading the old one.
    pub(crate) fn write_uniforms<T: bytemuck::Pod>(&mut self, queue: &wgpu::Queue, value: &T) {
        if !self.uniforms_recorded {
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(value));
            return;
        }

        debug!("allocating post-process constants buffer");
        let device = self.library.device();
        self.uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post Process Constants Buffer"),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        self.uniforms_recorded = false;
        self.bind_group = None;
    }

    /// Binds the sources and draws one triangle covering the viewport.
    ///
    /// `sources` holds one texture for single layouts and two for dual ones.
    pub(crate) fn draw(
        &mut self,
        render_pass: &mut wgpu::RenderPass<'_>,
        sources: &[&SourceTexture],
    ) {
        let bind_group = self.bind_group.get_or_insert_with(|| {
            debug!(sources = sources.len(), "rebuilding post-process bind group");
            let mut entries: SmallVec<[wgpu::BindGroupEntry<'_>; 4]> = SmallVec::new();
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(sources[0].view()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(self.library.sampler()),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: self.uniform_buffer.as_entire_binding(),
            });
            if self.layout == SourceLayout::Dual {
                entries.push(wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(sources[1].view()),
                });
            }

            self.library.device().create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Post Process Bind Group"),
                layout: self.library.bind_group_layout(self.layout),
                entries: &entries,
            })
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &*bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        self.uniforms_recorded = true;
    }
}
