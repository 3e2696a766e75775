use std::path::Path;

use anyhow::Result;
use tessera_postfx::{BloomPreset, ChainDesc, ToneMapEffect};

use super::{Inputs, render_chain};
use crate::{
    config::{self, OutputFormat},
    output,
};

pub struct ApplyOptions<'a> {
    pub inputs: Inputs,
    pub output: &'a Path,
    pub config: Option<&'a Path>,
    pub format: Option<OutputFormat>,
    pub cpu: bool,
}

pub fn execute(options: ApplyOptions<'_>) -> Result<()> {
    let (chain, file_format) = match options.config {
        Some(path) => {
            let file = config::load_chain(path)?;
            output::status("Chain", path.display().to_string());
            (file.chain, file.format)
        }
        None => {
            output::status("Chain", "bloom + filmic tone map");
            (default_chain(), None)
        }
    };

    render_chain(
        chain,
        options.format.or(file_format),
        &options.inputs,
        options.output,
        options.cpu,
    )
}

fn default_chain() -> ChainDesc {
    ChainDesc::bloom(&BloomPreset::default()).with_tone_map(ToneMapEffect::Filmic, 0.0)
}
