//! GPU post-processing passes for wgpu.
//!
//! Each pass draws one fullscreen triangle that samples an already rendered
//! texture and writes the bound render target. Three pass types cover the
//! usual needs:
//!
//! * [`BasicPostProcess`] reads one texture: copy, monochrome, sepia, down
//!   scaling, gaussian blur and the bloom bright pass and blur.
//! * [`DualPostProcess`] reads two textures: weighted merge and bloom combine.
//! * [`ToneMapPostProcess`] maps HDR input to SDR or to HDR10.
//!
//! # Usage
//!
//! ```no_run
//! use tessera_postfx::{
//!     BasicEffect, BasicPostProcess, PostProcess, PostProcessLibrary, RenderTargetState,
//!     SourceTexture, wgpu,
//! };
//!
//! fn blur(
//!     device: &wgpu::Device,
//!     queue: &wgpu::Queue,
//!     scene: &wgpu::Texture,
//!     target: &wgpu::TextureView,
//! ) -> Result<(), tessera_postfx::PostProcessError> {
//!     let library = PostProcessLibrary::new(device);
//!     let mut pass = BasicPostProcess::with_library(
//!         &library,
//!         RenderTargetState::new(wgpu::TextureFormat::Rgba8UnormSrgb),
//!         BasicEffect::GaussianBlur5x5,
//!     );
//!     pass.set_source_texture(SourceTexture::from_texture(scene));
//!     pass.set_gaussian_parameter(1.5);
//!
//!     let mut encoder = device.create_command_encoder(&Default::default());
//!     pass.process_to_view(queue, &mut encoder, target)?;
//!     queue.submit(Some(encoder.finish()));
//!     Ok(())
//! }
//! ```
//!
//! Passes created through the same [`PostProcessLibrary`] share shader
//! modules, layouts and compiled pipelines. [`ChainDesc`] strings passes
//! together, and [`reference`] renders every effect on the CPU.

#![deny(clippy::unwrap_used)]

pub mod basic;
pub mod chain;
pub mod color;
pub mod constants;
pub mod dual;
pub mod effect;
mod error;
pub mod gpu;
mod library;
mod pass;
pub mod pipeline_cache;
mod post_process;
pub mod reference;
mod source;
mod target;
pub mod tone_map;

#[cfg(test)]
mod test;

pub use wgpu;

pub use crate::{
    basic::{BasicEffect, BasicParameters, BasicPostProcess},
    chain::{BloomPreset, ChainDesc, GpuChain, StepDesc},
    dual::{DualEffect, DualParameters, DualPostProcess},
    effect::{Effect, EffectParameters, ParamValue},
    error::PostProcessError,
    gpu::{GpuContext, GpuContextOptions},
    library::PostProcessLibrary,
    post_process::{AnyPostProcess, PostProcess},
    source::SourceTexture,
    target::RenderTargetState,
    tone_map::{
        ToneMapEffect, ToneMapOperator, ToneMapParameters, ToneMapPostProcess, TransferFunction,
    },
};
