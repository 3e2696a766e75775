pub mod apply;
pub mod effect;
pub mod effects;

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use image::Rgba32FImage;
use tessera_postfx::{
    ChainDesc, Effect, GpuChain, GpuContext, GpuContextOptions, SourceTexture,
    chain::{SOURCE, SOURCE2},
    reference, wgpu,
};
use tracing::warn;

use crate::{
    config::OutputFormat,
    io::{self, Encoding},
    output,
};

/// Image files feeding the `source` and `source2` chain inputs.
pub struct Inputs {
    pub source: PathBuf,
    pub source2: Option<PathBuf>,
}

/// Renders `chain` over `inputs` and writes the result to `output_path`.
pub fn render_chain(
    chain: ChainDesc,
    format: Option<OutputFormat>,
    inputs: &Inputs,
    output_path: &Path,
    cpu: bool,
) -> Result<()> {
    let started = Instant::now();

    let mut images = vec![(SOURCE, load_input(&inputs.source)?)];
    if let Some(path) = &inputs.source2 {
        images.push((SOURCE2, load_input(path)?));
    }
    let names: Vec<&str> = images.iter().map(|(name, _)| *name).collect();
    chain.validate(&names)?;
    if inputs.source2.is_some() && !reads_input(&chain, SOURCE2) {
        output::warn("--input2 is not read by any step");
    }

    let format = format
        .map(OutputFormat::texture_format)
        .unwrap_or_else(|| default_format(&chain));
    let encoding = output_encoding(&chain);
    chain.steps.iter().for_each(output::chain_step);

    let result = if cpu {
        output::status("Rendering", format!("{} steps on the CPU", chain.steps.len()));
        let sources: Vec<(&str, &Rgba32FImage)> =
            images.iter().map(|(name, image)| (*name, image)).collect();
        reference::run_chain(&chain, &sources, format)?
    } else {
        render_on_gpu(chain, &images, format)?
    };

    io::save(output_path, &result, encoding)?;
    output::finished(output_path, result.dimensions(), started.elapsed());
    Ok(())
}

fn render_on_gpu(
    chain: ChainDesc,
    images: &[(&str, Rgba32FImage)],
    format: wgpu::TextureFormat,
) -> Result<Rgba32FImage> {
    let gpu = GpuContext::new_blocking(&GpuContextOptions::default())
        .context("Failed to initialize the GPU; pass --cpu to render without one")?;
    let info = gpu.adapter_info();
    output::status("Adapter", format!("{} ({:?})", info.name, info.backend));

    let textures = images
        .iter()
        .map(|(name, image)| {
            gpu.upload(image, wgpu::TextureFormat::Rgba16Float)
                .map(|texture| (*name, texture))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let sources: Vec<(&str, SourceTexture)> = textures
        .iter()
        .map(|(name, texture)| (*name, SourceTexture::from_texture(texture)))
        .collect();

    output::status("Rendering", format!("{} steps on the GPU", chain.steps.len()));
    let mut gpu_chain = GpuChain::new(gpu.library(), chain, format)?;
    let texture = gpu_chain.run(gpu.queue(), &sources)?;
    let result = gpu.read_texture(&texture)?;

    if let Err(err) = gpu.save_pipeline_cache() {
        warn!("Failed to save pipeline cache: {err}");
    }
    Ok(result)
}

fn load_input(path: &Path) -> Result<Rgba32FImage> {
    let image = io::load(path)?;
    output::status(
        "Loaded",
        format!("{} ({}x{})", path.display(), image.width(), image.height()),
    );
    Ok(image)
}

/// Tone-mapped chains render their preferred display format; anything else
/// renders 8-bit sRGB.
fn default_format(chain: &ChainDesc) -> wgpu::TextureFormat {
    match chain.output().map(|step| step.effect) {
        Some(Effect::ToneMap(effect)) => effect.preferred_format(),
        _ => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn reads_input(chain: &ChainDesc, name: &str) -> bool {
    chain
        .steps
        .iter()
        .any(|step| step.input == name || step.input2.as_deref() == Some(name))
}

fn output_encoding(chain: &ChainDesc) -> Encoding {
    match chain.output().map(|step| step.effect) {
        Some(Effect::ToneMap(effect)) if effect.is_hdr10() => Encoding::Signal,
        _ => Encoding::Linear,
    }
}
