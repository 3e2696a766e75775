//! Headless device, texture upload and readback.
//!
//! ## Usage
//!
//! ```no_run
//! use tessera_postfx::{
//!     BasicEffect, BasicPostProcess, GpuContext, GpuContextOptions, SourceTexture, wgpu,
//! };
//!
//! # fn main() -> Result<(), tessera_postfx::PostProcessError> {
//! let gpu = GpuContext::new_blocking(&GpuContextOptions::default())?;
//! let image = image::Rgba32FImage::new(64, 64);
//! let source = gpu.upload(&image, wgpu::TextureFormat::Rgba16Float)?;
//! let target = gpu.create_target(64, 64, wgpu::TextureFormat::Rgba8UnormSrgb)?;
//!
//! let mut pass =
//!     BasicPostProcess::with_library(gpu.library(), target.format().into(), BasicEffect::Sepia);
//! pass.set_source_texture(SourceTexture::from_texture(&source));
//! gpu.render(&mut pass, &target)?;
//! let sepia = gpu.read_texture(&target)?;
//! assert_eq!(sepia.dimensions(), (64, 64));
//! # Ok(())
//! # }
//! ```

use std::{io, sync::Arc};

use image::Rgba32FImage;
use tracing::{debug, info};

use crate::{PostProcess, PostProcessError, PostProcessLibrary, color, pipeline_cache};

/// Adapter selection for [`GpuContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuContextOptions {
    pub power_preference: wgpu::PowerPreference,
    /// Use a software adapter, as the test suite does.
    pub force_fallback_adapter: bool,
    /// Load and persist compiled pipelines when the adapter supports it.
    pub pipeline_cache: bool,
}

impl Default for GpuContextOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            pipeline_cache: true,
        }
    }
}

/// A device and queue without a surface, plus a shared [`PostProcessLibrary`].
pub struct GpuContext {
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    library: Arc<PostProcessLibrary>,
}

impl GpuContext {
    pub async fn new(options: &GpuContextOptions) -> Result<Self, PostProcessError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await?;
        let adapter_info = adapter.get_info();
        info!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            "selected GPU adapter"
        );

        let required_features = if options.pipeline_cache {
            adapter.features() & wgpu::Features::PIPELINE_CACHE
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("postfx_device"),
                required_features,
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        let cache = options
            .pipeline_cache
            .then(|| pipeline_cache::initialize_cache(&device, &adapter_info))
            .flatten();
        info!(pipeline_cache = cache.is_some(), "GPU device ready");
        let library = PostProcessLibrary::with_pipeline_cache(&device, cache);

        Ok(Self {
            adapter_info,
            device,
            queue,
            library,
        })
    }

    pub fn new_blocking(options: &GpuContextOptions) -> Result<Self, PostProcessError> {
        pollster::block_on(Self::new(options))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn library(&self) -> &Arc<PostProcessLibrary> {
        &self.library
    }

    /// Creates a sampled texture holding `image`.
    ///
    /// Values are linear; `Rgba8UnormSrgb` uploads encode them with the sRGB
    /// curve so sampling returns them unchanged.
    pub fn upload(
        &self,
        image: &Rgba32FImage,
        format: wgpu::TextureFormat,
    ) -> Result<wgpu::Texture, PostProcessError> {
        let (width, height) = image.dimensions();
        self.check_extent(width, height)?;
        let (bytes, bytes_per_pixel) = encode_pixels(image, format)?;

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Post Process Source"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * width),
                rows_per_image: Some(height),
            },
            size,
        );
        debug!(width, height, ?format, "uploaded source texture");
        Ok(texture)
    }

    /// Creates a texture that can be rendered to, sampled and read back.
    pub fn create_target(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<wgpu::Texture, PostProcessError> {
        self.check_extent(width, height)?;
        Ok(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Post Process Target"),
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
        }))
    }

    /// Rejects empty textures and ones the device cannot allocate.
    fn check_extent(&self, width: u32, height: u32) -> Result<(), PostProcessError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(PostProcessError::InvalidSize { width, height });
        }
        Ok(())
    }

    /// Runs `pass` into `target` and submits the work.
    pub fn render(
        &self,
        pass: &mut impl PostProcess,
        target: &wgpu::Texture,
    ) -> Result<(), PostProcessError> {
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Post Process Encoder"),
            });
        pass.process_to_view(&self.queue, &mut encoder, &view)?;
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Copies `texture` back to the CPU as linear floats.
    pub fn read_texture(&self, texture: &wgpu::Texture) -> Result<Rgba32FImage, PostProcessError> {
        let format = texture.format();
        let bytes_per_pixel =
            bytes_per_pixel(format).ok_or(PostProcessError::UnsupportedFormat(format))?;
        let (width, height) = (texture.width(), texture.height());

        let unpadded_bytes_per_row = bytes_per_pixel * width;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Post Process Readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Post Process Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|error| PostProcessError::Readback(error.to_string()))?;
        receiver
            .recv()
            .map_err(|_| PostProcessError::Readback("map callback was dropped".to_owned()))?
            .map_err(|error| PostProcessError::Readback(error.to_string()))?;

        let data = slice.get_mapped_range();
        let mut image = Rgba32FImage::new(width, height);
        for (y, row) in data
            .chunks_exact(padded_bytes_per_row as usize)
            .enumerate()
        {
            let row = &row[..unpadded_bytes_per_row as usize];
            for (x, texel) in row.chunks_exact(bytes_per_pixel as usize).enumerate() {
                image.put_pixel(x as u32, y as u32, image::Rgba(decode_texel(format, texel)));
            }
        }
        drop(data);
        staging.unmap();
        Ok(image)
    }

    /// Persists compiled pipelines for the next run.
    pub fn save_pipeline_cache(&self) -> io::Result<()> {
        match self.library.pipeline_cache() {
            Some(cache) => pipeline_cache::save_cache(cache, &self.adapter_info),
            None => Ok(()),
        }
    }
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> Option<u32> {
    use wgpu::TextureFormat as F;
    match format {
        F::Rgba8Unorm | F::Rgba8UnormSrgb | F::Rgb10a2Unorm => Some(4),
        F::Rgba16Float => Some(8),
        F::Rgba32Float => Some(16),
        _ => None,
    }
}

fn encode_pixels(
    image: &Rgba32FImage,
    format: wgpu::TextureFormat,
) -> Result<(Vec<u8>, u32), PostProcessError> {
    use wgpu::TextureFormat as F;

    let unorm = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    let bytes = match format {
        F::Rgba16Float => image
            .as_raw()
            .iter()
            .flat_map(|&value| half::f16::from_f32(value).to_le_bytes())
            .collect(),
        F::Rgba8Unorm => image.as_raw().iter().map(|&value| unorm(value)).collect(),
        F::Rgba8UnormSrgb => image
            .pixels()
            .flat_map(|pixel| {
                let [r, g, b, a] = pixel.0;
                [
                    unorm(color::linear_to_srgb(r)),
                    unorm(color::linear_to_srgb(g)),
                    unorm(color::linear_to_srgb(b)),
                    unorm(a),
                ]
            })
            .collect(),
        // Sampled through a filtering sampler, which 32-bit floats do not support.
        other => return Err(PostProcessError::UnsupportedFormat(other)),
    };
    let bytes_per_pixel =
        bytes_per_pixel(format).ok_or(PostProcessError::UnsupportedFormat(format))?;
    Ok((bytes, bytes_per_pixel))
}

fn decode_texel(format: wgpu::TextureFormat, texel: &[u8]) -> [f32; 4] {
    use wgpu::TextureFormat as F;

    let unorm = |byte: u8| f32::from(byte) / 255.0;
    match format {
        F::Rgba8Unorm => [unorm(texel[0]), unorm(texel[1]), unorm(texel[2]), unorm(texel[3])],
        F::Rgba8UnormSrgb => [
            color::srgb_to_linear(unorm(texel[0])),
            color::srgb_to_linear(unorm(texel[1])),
            color::srgb_to_linear(unorm(texel[2])),
            unorm(texel[3]),
        ],
        F::Rgb10a2Unorm => {
            let packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
            [
                (packed & 0x3ff) as f32 / 1023.0,
                ((packed >> 10) & 0x3ff) as f32 / 1023.0,
                ((packed >> 20) & 0x3ff) as f32 / 1023.0,
                (packed >> 30) as f32 / 3.0,
            ]
        }
        F::Rgba16Float => {
            let channel =
                |i: usize| half::f16::from_le_bytes([texel[2 * i], texel[2 * i + 1]]).to_f32();
            [channel(0), channel(1), channel(2), channel(3)]
        }
        _ => {
            let channel = |i: usize| {
                let start = 4 * i;
                f32::from_le_bytes([
                    texel[start],
                    texel[start + 1],
                    texel[start + 2],
                    texel[start + 3],
                ])
            };
            [channel(0), channel(1), channel(2), channel(3)]
        }
    }
}
