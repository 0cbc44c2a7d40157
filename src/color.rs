use std::fmt;

use crate::error::SceneError;
use crate::math::clampf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub(crate) const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub(crate) fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = clampf(t, 0.0, 1.0);
        let ch = |a: u8, b: u8| -> u8 {
            (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgb::new(ch(self.r, other.r), ch(self.g, other.g), ch(self.b, other.b))
    }

    pub(crate) fn scale(self, s: f32) -> Rgb {
        let s = clampf(s, 0.0, 4.0);
        let ch = |c: u8| -> u8 { (c as f32 * s).round().clamp(0.0, 255.0) as u8 };
        Rgb::new(ch(self.r), ch(self.g), ch(self.b))
    }

    pub(crate) fn luma(self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }

    pub(crate) fn parse(s: &str) -> Result<Rgb, SceneError> {
        let t = s.trim();
        let bad = || SceneError::InvalidAccent(s.to_string());

        if let Some(hex) = t.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(bad)?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Rgb::new(r * 17, g * 17, b * 17)),
                [r1, r0, g1, g0, b1, b0] => {
                    Ok(Rgb::new(r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0))
                }
                _ => Err(bad()),
            };
        }

        if let Some(body) = t
            .strip_prefix("rgb(")
            .or_else(|| t.strip_prefix("rgba("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let mut parts = body.split(',').map(|p| p.trim().parse::<f32>());
            let mut next = || -> Result<u8, SceneError> {
                match parts.next() {
                    Some(Ok(v)) if v.is_finite() => Ok(v.round().clamp(0.0, 255.0) as u8),
                    _ => Err(bad()),
                }
            };
            let (r, g, b) = (next()?, next()?, next()?);
            return Ok(Rgb::new(r, g, b));
        }

        Err(bad())
    }
}

pub(crate) fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    // h: 0..1
    let h = (h.fract() + 1.0).fract() * 6.0;
    let i = h.floor() as i32;
    let f = h - i as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb {
        r: (clampf(r, 0.0, 1.0) * 255.0) as u8,
        g: (clampf(g, 0.0, 1.0) * 255.0) as u8,
        b: (clampf(b, 0.0, 1.0) * 255.0) as u8,
    }
}

pub(crate) fn rgb_to_hsv(c: Rgb) -> (f32, f32, f32) {
    let r = c.r as f32 / 255.0;
    let g = c.g as f32 / 255.0;
    let b = c.b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let h = if d <= 1e-6 {
        0.0
    } else if max == r {
        ((g - b) / d).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    let s = if max <= 1e-6 { 0.0 } else { d / max };
    (h, s, max)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Palette {
    pub(crate) accent: Rgb,
    pub(crate) accent_glow: Rgb,
    pub(crate) secondary: Rgb,
    pub(crate) window_lit: Rgb,
    pub(crate) sky_top: Rgb,
    pub(crate) sky_bottom: Rgb,
    pub(crate) building_fill: Rgb,
    pub(crate) building_edge: Rgb,
    pub(crate) road: Rgb,
    pub(crate) fog: Rgb,
}

impl Palette {
    pub(crate) fn from_accent(accent: Rgb) -> Self {
        let (h, s, v) = rgb_to_hsv(accent);
        let s = s.max(0.35);
        Self {
            accent,
            accent_glow: hsv_to_rgb(h, s * 0.6, (v * 1.2).min(1.0)),
            secondary: hsv_to_rgb(h + 0.5, s.min(0.8), 0.95),
            window_lit: hsv_to_rgb(0.12 + (h - 0.12) * 0.1, 0.45, 0.95),
            sky_top: hsv_to_rgb(h + 0.08, 0.8, 0.06),
            sky_bottom: hsv_to_rgb(h, 0.75, 0.32),
            building_fill: hsv_to_rgb(h + 0.05, 0.5, 0.07),
            building_edge: hsv_to_rgb(h, s, 0.65),
            road: hsv_to_rgb(h + 0.1, 0.4, 0.05),
            fog: hsv_to_rgb(h, 0.35, 0.45),
        }
    }
}

pub(crate) const DEFAULT_ACCENT: Rgb = Rgb::new(0xff, 0x2b, 0xd6);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub(crate) trait ThemeSource {
    fn accent(&self) -> String;
}

impl ThemeSource for String {
    fn accent(&self) -> String {
        self.clone()
    }
}

pub(crate) struct ColorCache {
    palette: Palette,
    accent: Rgb,
    refreshed_at: Option<f64>,
    interval: f64,
}

impl ColorCache {
    pub(crate) const REFRESH_INTERVAL: f64 = 2.0;

    pub(crate) fn new() -> Self {
        Self {
            palette: Palette::from_accent(DEFAULT_ACCENT),
            accent: DEFAULT_ACCENT,
            refreshed_at: None,
            interval: Self::REFRESH_INTERVAL,
        }
    }

    pub(crate) fn palette(&self) -> &Palette {
        &self.palette
    }

    pub(crate) fn is_stale(&self, now: f64) -> bool {
        match self.refreshed_at {
            None => true,
            Some(t) => now - t >= self.interval,
        }
    }

    // Re-reads the accent if stale. Returns whether a read happened. A bad
    // accent keeps the previous palette and still counts as a read.
    pub(crate) fn refresh(
        &mut self,
        now: f64,
        theme: &dyn ThemeSource,
    ) -> Result<bool, SceneError> {
        if !self.is_stale(now) {
            return Ok(false);
        }
        self.refreshed_at = Some(now);
        let accent = Rgb::parse(&theme.accent())?;
        if accent != self.accent {
            self.accent = accent;
            self.palette = Palette::from_accent(accent);
        }
        Ok(true)
    }
}
