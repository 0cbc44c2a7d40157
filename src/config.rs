use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::color::{Rgb, DEFAULT_ACCENT};

pub(crate) const MIN_FPS: u32 = 15;
pub(crate) const MAX_FPS: u32 = 240;
pub(crate) const DEFAULT_FPS: u32 = 60;
pub(crate) const MIN_DENSITY: f32 = 0.1;
pub(crate) const MAX_DENSITY: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "FpsRepr", into = "FpsRepr")]
pub(crate) enum FpsTarget {
    Capped(u32),
    Unlimited,
}

// Wire form: a bare number or the string "unlimited".
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum FpsRepr {
    Number(f64),
    Text(String),
}

impl From<FpsRepr> for FpsTarget {
    fn from(r: FpsRepr) -> Self {
        match r {
            FpsRepr::Number(n) if n.is_finite() => {
                FpsTarget::Capped(n.round().clamp(0.0, u32::MAX as f64) as u32)
            }
            FpsRepr::Number(_) => FpsTarget::Capped(DEFAULT_FPS),
            FpsRepr::Text(s) => FpsTarget::parse_lenient(&s),
        }
    }
}

impl From<FpsTarget> for FpsRepr {
    fn from(f: FpsTarget) -> Self {
        match f {
            FpsTarget::Capped(n) => FpsRepr::Number(n as f64),
            FpsTarget::Unlimited => FpsRepr::Text("unlimited".to_string()),
        }
    }
}

impl FpsTarget {
    pub(crate) fn parse_lenient(s: &str) -> Self {
        let t = s.trim();
        if t.eq_ignore_ascii_case("unlimited") {
            return FpsTarget::Unlimited;
        }
        match t.parse::<f64>() {
            Ok(n) if n.is_finite() => FpsTarget::Capped(n.round().clamp(0.0, u32::MAX as f64) as u32),
            _ => {
                log::warn!("fps target {t:?} not recognised, using {DEFAULT_FPS}");
                FpsTarget::Capped(DEFAULT_FPS)
            }
        }
    }

    pub(crate) fn frame_interval(self) -> Option<f64> {
        match self {
            FpsTarget::Capped(n) => Some(1.0 / n.max(1) as f64),
            FpsTarget::Unlimited => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_target: FpsTarget,
    pub(crate) weather_enabled: bool,
    pub(crate) reflections_enabled: bool,
    pub(crate) speed_lines_enabled: bool,
    pub(crate) particle_density: f32,
    pub(crate) accent: String,
    pub(crate) seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_target: FpsTarget::Capped(DEFAULT_FPS),
            weather_enabled: false,
            reflections_enabled: true,
            speed_lines_enabled: true,
            particle_density: 1.0,
            accent: DEFAULT_ACCENT.to_string(),
            seed: 0,
        }
    }
}

impl Settings {
    pub(crate) fn sanitized(mut self) -> Self {
        if let FpsTarget::Capped(n) = self.fps_target {
            let c = n.clamp(MIN_FPS, MAX_FPS);
            if c != n {
                log::warn!("fps target {n} out of range, clamped to {c}");
                self.fps_target = FpsTarget::Capped(c);
            }
        }

        let d = self.particle_density;
        let c = if d.is_finite() {
            d.clamp(MIN_DENSITY, MAX_DENSITY)
        } else {
            1.0
        };
        if c != d {
            log::warn!("particle density {d} out of range, using {c}");
            self.particle_density = c;
        }

        if Rgb::parse(&self.accent).is_err() {
            log::warn!("accent {:?} not a colour, using {DEFAULT_ACCENT}", self.accent);
            self.accent = DEFAULT_ACCENT.to_string();
        }
        self
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "citydrive")]
#[command(about = "Endless neon city drive, drawn in braille", long_about = None)]
pub(crate) struct Cli {
    /// Settings file (JSON). Defaults to the platform config dir.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Frame cap: a number (15..240) or "unlimited"
    #[arg(long)]
    pub(crate) fps: Option<String>,

    /// Start with rain and lightning
    #[arg(long, default_value_t = false)]
    pub(crate) rain: bool,

    /// Disable wet-road reflections
    #[arg(long, default_value_t = false)]
    pub(crate) no_reflections: bool,

    /// Disable speed lines while boosting
    #[arg(long, default_value_t = false)]
    pub(crate) no_speed_lines: bool,

    /// Particle density multiplier (0.1..2.0)
    #[arg(long)]
    pub(crate) density: Option<f32>,

    /// Accent colour, e.g. "#00e5ff" or "rgb(255,43,214)"
    #[arg(long)]
    pub(crate) accent: Option<String>,

    /// RNG seed (0 = random)
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Write logs here (stderr belongs to the animation)
    #[arg(long)]
    pub(crate) log_file: Option<PathBuf>,

    /// Hide the status line
    #[arg(long, default_value_t = false)]
    pub(crate) no_hud: bool,
}

impl Cli {
    pub(crate) fn apply(&self, mut base: Settings) -> Settings {
        if let Some(f) = &self.fps {
            base.fps_target = FpsTarget::parse_lenient(f);
        }
        if self.rain {
            base.weather_enabled = true;
        }
        if self.no_reflections {
            base.reflections_enabled = false;
        }
        if self.no_speed_lines {
            base.speed_lines_enabled = false;
        }
        if let Some(d) = self.density {
            base.particle_density = d;
        }
        if let Some(a) = &self.accent {
            base.accent = a.clone();
        }
        if let Some(s) = self.seed {
            base.seed = s;
        }
        base
    }
}

pub(crate) fn default_settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "citydrive", "CityDrive")
        .context("could not resolve project directories")?;
    Ok(proj.config_dir().join("settings.json"))
}

const FIELDS: [&str; 7] = [
    "fps_target",
    "weather_enabled",
    "reflections_enabled",
    "speed_lines_enabled",
    "particle_density",
    "accent",
    "seed",
];

// A bad field falls back on its own; the rest of the file still counts.
fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, slot: &mut T) {
    let Some(v) = obj.get(key) else { return };
    match serde_json::from_value::<T>(v.clone()) {
        Ok(parsed) => *slot = parsed,
        Err(e) => log::warn!("setting {key} = {v} ignored ({e}), keeping default"),
    }
}

pub(crate) fn parse_settings(text: &str) -> Settings {
    let mut s = Settings::default();
    let obj = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => obj,
        Ok(other) => {
            log::warn!("settings must be a JSON object, got {other}; using defaults");
            return s;
        }
        Err(e) => {
            log::warn!("settings are not valid JSON ({e}); using defaults");
            return s;
        }
    };
    field(&obj, "fps_target", &mut s.fps_target);
    field(&obj, "weather_enabled", &mut s.weather_enabled);
    field(&obj, "reflections_enabled", &mut s.reflections_enabled);
    field(&obj, "speed_lines_enabled", &mut s.speed_lines_enabled);
    field(&obj, "particle_density", &mut s.particle_density);
    field(&obj, "accent", &mut s.accent);
    field(&obj, "seed", &mut s.seed);
    for key in obj.keys().filter(|k| !FIELDS.contains(&k.as_str())) {
        log::debug!("unknown setting {key:?} ignored");
    }
    s
}

// missing file means defaults
pub(crate) fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(text) => {
            log::debug!("parsing {}", path.display());
            parse_settings(&text)
        }
        Err(_) => Settings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_accepts_number_or_unlimited() {
        let s: Settings = serde_json::from_str(r#"{"fps_target": 30}"#).unwrap();
        assert_eq!(s.fps_target, FpsTarget::Capped(30));
        let s: Settings = serde_json::from_str(r#"{"fps_target": "unlimited"}"#).unwrap();
        assert_eq!(s.fps_target, FpsTarget::Unlimited);
        let s: Settings = serde_json::from_str(r#"{"fps_target": "lots"}"#).unwrap();
        assert_eq!(s.fps_target, FpsTarget::Capped(DEFAULT_FPS));
        assert_eq!(FpsTarget::Unlimited.frame_interval(), None);
    }

    #[test]
    fn unknown_fields_and_missing_fields_are_fine() {
        let s: Settings =
            serde_json::from_str(r#"{"weather_enabled": true, "volume": 11}"#).unwrap();
        assert!(s.weather_enabled);
        assert_eq!(s.particle_density, 1.0);
    }

    #[test]
    fn out_of_range_values_are_clamped_not_rejected() {
        let s = Settings {
            fps_target: FpsTarget::Capped(1000),
            particle_density: -3.0,
            accent: "chartreuse-ish".into(),
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(s.fps_target, FpsTarget::Capped(MAX_FPS));
        assert_eq!(s.particle_density, MIN_DENSITY);
        assert_eq!(s.accent, DEFAULT_ACCENT.to_string());

        let s = Settings {
            fps_target: FpsTarget::Capped(0),
            particle_density: f32::NAN,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(s.fps_target, FpsTarget::Capped(MIN_FPS));
        assert_eq!(s.particle_density, 1.0);
    }

    #[test]
    fn cli_overrides_file() {
        let cli = Cli::parse_from([
            "citydrive",
            "--fps",
            "unlimited",
            "--rain",
            "--density",
            "1.5",
            "--accent",
            "#00e5ff",
        ]);
        let s = cli.apply(Settings::default());
        assert_eq!(s.fps_target, FpsTarget::Unlimited);
        assert!(s.weather_enabled);
        assert_eq!(s.particle_density, 1.5);
        assert_eq!(s.accent, "#00e5ff");
        assert!(s.reflections_enabled);
    }

    #[test]
    fn one_bad_field_keeps_the_rest() {
        let s = parse_settings(r#"{"weather_enabled": true, "particle_density": "high"}"#);
        assert!(s.weather_enabled);
        assert_eq!(s.particle_density, 1.0);

        let s = parse_settings(
            r#"{"weather_enabled": true, "fps_target": -30, "seed": -1, "accent": 7}"#,
        )
        .sanitized();
        assert!(s.weather_enabled);
        assert_eq!(s.fps_target, FpsTarget::Capped(MIN_FPS));
        assert_eq!(s.seed, 0);
        assert_eq!(s.accent, DEFAULT_ACCENT.to_string());
    }

    #[test]
    fn non_object_or_broken_json_gives_defaults() {
        assert_eq!(parse_settings("[1, 2]"), Settings::default());
        assert_eq!(parse_settings("{ not json"), Settings::default());
    }

    #[test]
    fn settings_file_is_read_per_field() {
        let path = std::env::temp_dir().join(format!("citydrive-{}.json", std::process::id()));
        fs::write(&path, r#"{"reflections_enabled": false, "seed": "abc"}"#).unwrap();
        let s = load_settings(&path);
        let _ = fs::remove_file(&path);
        assert!(!s.reflections_enabled);
        assert_eq!(s.seed, 0);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let s = load_settings(Path::new("/definitely/not/here/settings.json"));
        assert_eq!(s, Settings::default());
    }
}
