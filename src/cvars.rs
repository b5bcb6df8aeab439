//! Console variables.
//!
//! Named numeric handles onto [`RenderSettings`], so tone mapping and bloom can be
//! tuned from a text file or a debug console without recompiling. A script is a
//! list of `name value` lines; `#` starts a comment.
//!
//! ```text
//! # brighter, less bloom
//! exposure 1.4
//! bloomScale 0.6
//! blur_iter_large 0
//! fxaa_enabled false
//! ```

use std::path::Path;

use anyhow::{Context as _, bail};

use crate::settings::{Cascade, MAX_BLUR_ITERATIONS, RenderSettings};

/// Environment variable naming a script applied at start-up.
pub const SCRIPT_ENV: &str = "ENJON_CVARS";

pub const NAMES: [&str; 17] = [
    "exposure",
    "gamma",
    "bloomScale",
    "saturation",
    "threshold",
    "blur_weight_small",
    "blur_weight_medium",
    "blur_weight_large",
    "blur_iter_small",
    "blur_iter_medium",
    "blur_iter_large",
    "blur_radius_small",
    "blur_radius_medium",
    "blur_radius_large",
    "fxaa_span_max",
    "fxaa_reduce_mul",
    "fxaa_reduce_min",
];

/// Boolean variables. They read as `0`/`1` and also accept `true`/`false`.
pub const FLAGS: [&str; 1] = ["fxaa_enabled"];

pub fn names() -> impl Iterator<Item = &'static str> {
    NAMES.iter().chain(FLAGS.iter()).copied()
}

enum BloomField {
    Weight,
    Iterations,
    Radius,
}

fn bloom_var(name: &str) -> Option<(BloomField, Cascade)> {
    let rest = name.strip_prefix("blur_")?;
    let (field, cascade) = rest.split_once('_')?;
    let field = match field {
        "weight" => BloomField::Weight,
        "iter" => BloomField::Iterations,
        "radius" => BloomField::Radius,
        _ => return None,
    };
    let cascade = Cascade::ALL.into_iter().find(|c| c.name() == cascade)?;
    Some((field, cascade))
}

pub fn get(settings: &RenderSettings, name: &str) -> anyhow::Result<f32> {
    if let Some((field, cascade)) = bloom_var(name) {
        let c = settings.bloom.cascade(cascade);
        return Ok(match field {
            BloomField::Weight => c.weight,
            BloomField::Iterations => c.iterations as f32,
            BloomField::Radius => c.radius,
        });
    }
    Ok(match name {
        "exposure" => settings.tone_map.exposure,
        "gamma" => settings.tone_map.gamma,
        "bloomScale" => settings.tone_map.bloom_scalar,
        "saturation" => settings.tone_map.saturation,
        "threshold" => settings.tone_map.threshold,
        "fxaa_span_max" => settings.fxaa.span_max,
        "fxaa_reduce_mul" => settings.fxaa.reduce_mul,
        "fxaa_reduce_min" => settings.fxaa.reduce_min,
        "fxaa_enabled" => settings.fxaa.enabled as u32 as f32,
        _ => bail!("unknown cvar '{name}'"),
    })
}

pub fn set(settings: &mut RenderSettings, name: &str, value: f32) -> anyhow::Result<()> {
    if !value.is_finite() {
        bail!("cvar '{name}' needs a finite value, got {value}");
    }
    if let Some((field, cascade)) = bloom_var(name) {
        let c = settings.bloom.cascade_mut(cascade);
        match field {
            BloomField::Weight => c.weight = value,
            BloomField::Iterations => {
                c.iterations = value.round().clamp(0.0, MAX_BLUR_ITERATIONS as f32) as u32
            }
            BloomField::Radius => c.radius = value,
        }
        return Ok(());
    }
    match name {
        "exposure" => settings.tone_map.exposure = value,
        "gamma" => settings.tone_map.gamma = value,
        "bloomScale" => settings.tone_map.bloom_scalar = value,
        "saturation" => settings.tone_map.saturation = value,
        "threshold" => settings.tone_map.threshold = value,
        "fxaa_span_max" => settings.fxaa.span_max = value,
        "fxaa_reduce_mul" => settings.fxaa.reduce_mul = value,
        "fxaa_reduce_min" => settings.fxaa.reduce_min = value,
        "fxaa_enabled" => settings.fxaa.enabled = value != 0.0,
        _ => bail!("unknown cvar '{name}'"),
    }
    Ok(())
}

fn parse_value(raw: &str) -> anyhow::Result<f32> {
    match raw {
        "true" | "on" => Ok(1.0),
        "false" | "off" => Ok(0.0),
        _ => raw
            .parse()
            .with_context(|| format!("'{raw}' is not a number")),
    }
}

/// Apply every `name value` line of `script`. Stops at the first bad line.
///
/// Returns how many variables were set.
pub fn apply_script(settings: &mut RenderSettings, script: &str) -> anyhow::Result<usize> {
    let mut applied = 0;
    for (i, line) in script.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("line {}: expected `name value`, got '{line}'", i + 1);
        };
        let value = parse_value(raw).with_context(|| format!("line {}", i + 1))?;
        set(settings, name, value).with_context(|| format!("line {}", i + 1))?;
        log::debug!("cvar {name} = {value}");
        applied += 1;
    }
    Ok(applied)
}

pub fn apply_file(settings: &mut RenderSettings, path: impl AsRef<Path>) -> anyhow::Result<usize> {
    let path = path.as_ref();
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read cvar script {}", path.display()))?;
    apply_script(settings, &script).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips_through_set_and_get() {
        let mut settings = RenderSettings::default();
        for name in NAMES {
            set(&mut settings, name, 3.0).unwrap();
            assert_eq!(get(&settings, name).unwrap(), 3.0, "{name}");
        }
    }

    #[test]
    fn iterations_round_and_clamp() {
        let mut settings = RenderSettings::default();
        set(&mut settings, "blur_iter_small", 2.6).unwrap();
        assert_eq!(settings.bloom.cascade(Cascade::Small).iterations, 3);
        set(&mut settings, "blur_iter_medium", -4.0).unwrap();
        assert_eq!(settings.bloom.cascade(Cascade::Medium).iterations, 0);
        set(&mut settings, "blur_iter_large", 99.0).unwrap();
        assert_eq!(settings.bloom.cascade(Cascade::Large).iterations, 30);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut settings = RenderSettings::default();
        assert!(set(&mut settings, "blur_iter_huge", 1.0).is_err());
        assert!(get(&settings, "bloom_scale").is_err());
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn scripts_skip_comments_and_report_bad_lines() {
        let mut settings = RenderSettings::default();
        let applied = apply_script(
            &mut settings,
            "# tuned\nexposure 2.5\n\n  saturation 0.5 # less colour\nfxaa_enabled off\n",
        )
        .unwrap();
        assert_eq!(applied, 3);
        assert_eq!(settings.tone_map.exposure, 2.5);
        assert_eq!(settings.tone_map.saturation, 0.5);
        assert!(!settings.fxaa.enabled);

        let err = apply_script(&mut settings, "gamma 2.0\ngamma\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
