use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tessera_postfx::{ChainDesc, wgpu};

/// A chain file: an optional output format followed by `[[step]]` tables.
///
/// ```toml
/// format = "rgba16float"
///
/// [[step]]
/// name = "blur"
/// effect = "gaussian_blur_5x5"
/// multiplier = 1.5
/// ```
#[derive(Debug, Deserialize)]
pub struct ChainFile {
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(flatten)]
    pub chain: ChainDesc,
}

/// Result texture formats the CLI can render and read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 8-bit sRGB
    Rgba8unorm,
    /// 16-bit float, linear
    Rgba16float,
    /// 10-bit per channel, used for HDR10 signals
    Rgb10a2unorm,
}

impl OutputFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba8unorm => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Rgba16float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgb10a2unorm => wgpu::TextureFormat::Rgb10a2Unorm,
        }
    }
}

pub fn load_chain(path: &Path) -> Result<ChainFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read chain file {}", path.display()))?;
    parse_chain(&content).with_context(|| format!("Invalid chain file {}", path.display()))
}

fn parse_chain(content: &str) -> Result<ChainFile> {
    Ok(toml::from_str(content)?)
}
