use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tessera_postfx::{
    ChainDesc, Effect, ParamValue, StepDesc,
    chain::{SOURCE, SOURCE2},
};

use super::{Inputs, render_chain};
use crate::{config::OutputFormat, output};

pub struct EffectOptions<'a> {
    pub name: &'a str,
    pub inputs: Inputs,
    pub output: &'a Path,
    pub params: &'a [String],
    pub scale: Option<f32>,
    pub format: Option<OutputFormat>,
    pub cpu: bool,
}

pub fn execute(options: EffectOptions<'_>) -> Result<()> {
    let effect: Effect = options.name.parse()?;
    if effect.source_count() == 2 && options.inputs.source2.is_none() {
        bail!("`{effect}` blends two images; pass the second one with --input2");
    }

    let step = single_step(effect, options.params, options.scale)?;
    output::status("Effect", effect.description());
    render_chain(
        ChainDesc::new(vec![step]),
        options.format,
        &options.inputs,
        options.output,
        options.cpu,
    )
}

fn single_step(effect: Effect, params: &[String], scale: Option<f32>) -> Result<StepDesc> {
    let mut step = StepDesc::new(effect.as_str(), effect).input(SOURCE);
    if effect.source_count() == 2 {
        step = step.input2(SOURCE2);
    }
    if let Some(scale) = scale {
        step = step.scale(scale);
    }
    for param in params {
        let (key, value) = parse_param(param)?;
        step = step.param(key, value);
    }
    // Reject unknown names before any image is loaded.
    step.parameters()?;
    Ok(step)
}

fn parse_param(param: &str) -> Result<(&str, ParamValue)> {
    let (key, value) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got `{param}`"))?;
    let value = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for `{}`", key.trim()))?;
    Ok((key.trim(), value))
}
