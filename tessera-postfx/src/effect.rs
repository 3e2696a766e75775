//! Catalogue of every effect across the three pass types.
//!
//! ## Usage
//!
//! Parse user supplied names with [`Effect::from_str`](std::str::FromStr) and
//! set tuning values by name through [`EffectParameters::set`].

use std::{fmt, str::FromStr};

use crate::{
    BasicEffect, BasicParameters, DualEffect, DualParameters, PostProcessError, ToneMapEffect,
    ToneMapParameters,
};

/// Any effect implemented by the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Effect {
    Basic(BasicEffect),
    Dual(DualEffect),
    ToneMap(ToneMapEffect),
}

impl Effect {
    /// Every effect, basic first, then dual, then tone map.
    pub fn all() -> impl Iterator<Item = Self> {
        BasicEffect::ALL
            .into_iter()
            .map(Self::Basic)
            .chain(DualEffect::ALL.into_iter().map(Self::Dual))
            .chain(ToneMapEffect::ALL.into_iter().map(Self::ToneMap))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic(effect) => effect.as_str(),
            Self::Dual(effect) => effect.as_str(),
            Self::ToneMap(effect) => effect.as_str(),
        }
    }

    /// Number of textures the effect samples.
    pub const fn source_count(self) -> usize {
        match self {
            Self::Dual(_) => 2,
            Self::Basic(_) | Self::ToneMap(_) => 1,
        }
    }

    /// Natural output size relative to the first source.
    pub const fn output_scale(self) -> f32 {
        match self {
            Self::Basic(effect) => effect.output_scale(),
            Self::Dual(_) | Self::ToneMap(_) => 1.0,
        }
    }

    /// Names accepted by [`EffectParameters::set`] for this effect.
    pub const fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Basic(BasicEffect::GaussianBlur5x5) => &["multiplier"],
            Self::Basic(BasicEffect::BloomExtract) => &["threshold"],
            Self::Basic(BasicEffect::BloomBlur) => &["horizontal", "size", "brightness"],
            Self::Basic(_) => &[],
            Self::Dual(DualEffect::Merge) => &["weight1", "weight2"],
            Self::Dual(DualEffect::BloomCombine) => &[
                "bloom_intensity",
                "base_intensity",
                "bloom_saturation",
                "base_saturation",
            ],
            Self::ToneMap(effect) if effect.is_hdr10() => &["exposure", "paper_white_nits"],
            Self::ToneMap(_) => &["exposure"],
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Basic(effect) => match effect {
                BasicEffect::Copy => "copies the source unchanged",
                BasicEffect::Monochrome => "converts to Rec.709 luminance",
                BasicEffect::Sepia => "applies a sepia tint",
                BasicEffect::DownScale2x2 => "averages 2x2 texel blocks",
                BasicEffect::DownScale4x4 => "averages 4x4 texel blocks",
                BasicEffect::GaussianBlur5x5 => "13 tap gaussian blur",
                BasicEffect::BloomExtract => "keeps the part of the image above a threshold",
                BasicEffect::BloomBlur => "15 tap separable blur along one axis",
            },
            Self::Dual(effect) => match effect {
                DualEffect::Merge => "weighted sum of two sources",
                DualEffect::BloomCombine => "adds bloom (source 2) onto a scene (source 1)",
            },
            Self::ToneMap(effect) => match effect {
                ToneMapEffect::Saturate => "clamps HDR values to [0, 1]",
                ToneMapEffect::Reinhard => "Reinhard tone map",
                ToneMapEffect::Filmic => "ACES filmic tone map",
                ToneMapEffect::Hdr10 => "HDR10 encoding without tone mapping",
                ToneMapEffect::Hdr10Saturate => "clamp, then HDR10 encoding",
                ToneMapEffect::Hdr10Reinhard => "Reinhard, then HDR10 encoding",
                ToneMapEffect::Hdr10Filmic => "ACES filmic, then HDR10 encoding",
            },
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = PostProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|effect| effect.as_str() == s)
            .ok_or_else(|| PostProcessError::UnknownEffect(s.to_owned()))
    }
}

impl TryFrom<String> for Effect {
    type Error = PostProcessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        effect.as_str().to_owned()
    }
}

impl From<BasicEffect> for Effect {
    fn from(effect: BasicEffect) -> Self {
        Self::Basic(effect)
    }
}

impl From<DualEffect> for Effect {
    fn from(effect: DualEffect) -> Self {
        Self::Dual(effect)
    }
}

impl From<ToneMapEffect> for Effect {
    fn from(effect: ToneMapEffect) -> Self {
        Self::ToneMap(effect)
    }
}

/// A parameter value as written on the command line or in a chain file.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum ParamValue {
    Bool(bool),
    Number(f32),
}

impl FromStr for ParamValue {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true" => Ok(Self::Bool(true)),
            "false" => Ok(Self::Bool(false)),
            _ => s.trim().parse().map(Self::Number),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Tuning values for every pass type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EffectParameters {
    pub basic: BasicParameters,
    pub dual: DualParameters,
    pub tone_map: ToneMapParameters,
}

impl EffectParameters {
    /// Sets the parameter `name` of `effect`.
    ///
    /// Fails when the effect has no such parameter or the value has the wrong
    /// type. Numbers are accepted for `horizontal`, with zero meaning vertical.
    pub fn set(
        &mut self,
        effect: Effect,
        name: &str,
        value: ParamValue,
    ) -> Result<(), PostProcessError> {
        let invalid = |message: String| PostProcessError::InvalidParameter {
            effect: effect.as_str(),
            message,
        };
        if !effect.parameters().iter().any(|known| *known == name) {
            return Err(invalid(format!(
                "unknown parameter `{name}`, expected one of [{}]",
                effect.parameters().join(", ")
            )));
        }

        if name == "horizontal" {
            self.basic.bloom_horizontal = match value {
                ParamValue::Bool(flag) => flag,
                ParamValue::Number(number) => number != 0.0,
            };
            return Ok(());
        }

        let ParamValue::Number(number) = value else {
            return Err(invalid(format!("`{name}` expects a number")));
        };
        let slot = match name {
            "multiplier" => &mut self.basic.gaussian_multiplier,
            "threshold" => &mut self.basic.bloom_threshold,
            "size" => &mut self.basic.bloom_size,
            "brightness" => &mut self.basic.bloom_brightness,
            "weight1" => &mut self.dual.merge_weight1,
            "weight2" => &mut self.dual.merge_weight2,
            "bloom_intensity" => &mut self.dual.bloom_intensity,
            "base_intensity" => &mut self.dual.base_intensity,
            "bloom_saturation" => &mut self.dual.bloom_saturation,
            "base_saturation" => &mut self.dual.base_saturation,
            "exposure" => &mut self.tone_map.exposure,
            "paper_white_nits" => &mut self.tone_map.paper_white_nits,
            _ => return Err(invalid(format!("unknown parameter `{name}`"))),
        };
        *slot = number;
        Ok(())
    }
}
