use rand::Rng;

use crate::math::{approach, clampf, ScreenPoint};

const FLASH_DURATION: f64 = 0.35;
const MIN_STRIKE_GAP: f64 = 6.0;
const MAX_STRIKE_GAP: f64 = 22.0;
const FOG_CLEAR: f32 = 0.18;
const FOG_RAIN: f32 = 0.5;
const MAX_BOLT_SEGMENTS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Lightning {
    Idle { next_strike_at: f64 },
    Flashing { started: f64, until: f64 },
}

// Bolt geometry in normalised surface coordinates (0..1 on both axes).
// The first `main_len` segments are the trunk; the rest are branches.
pub(crate) struct Bolt {
    pub(crate) segments: Vec<(ScreenPoint, ScreenPoint)>,
    pub(crate) main_len: usize,
}

impl Bolt {
    fn new() -> Self {
        Self {
            segments: Vec::with_capacity(MAX_BOLT_SEGMENTS),
            main_len: 0,
        }
    }

    fn push(&mut self, a: ScreenPoint, b: ScreenPoint) -> bool {
        if self.segments.len() >= MAX_BOLT_SEGMENTS {
            return false;
        }
        self.segments.push((a, b));
        true
    }

    fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R, ground: f32) {
        self.segments.clear();
        let mut p = ScreenPoint::new(rng.gen_range(0.15..0.85), 0.0);
        let mut trunk = [ScreenPoint::default(); 24];
        let mut n = 0;
        trunk[n] = p;
        n += 1;
        while p.y < ground && n < trunk.len() {
            let next = ScreenPoint::new(
                clampf(p.x + rng.gen_range(-0.035..0.035), 0.0, 1.0),
                (p.y + rng.gen_range(0.025..0.06)).min(ground),
            );
            self.push(p, next);
            p = next;
            trunk[n] = p;
            n += 1;
        }
        self.main_len = self.segments.len();

        let branches = rng.gen_range(2..=4);
        for _ in 0..branches {
            if n < 3 {
                break;
            }
            let mut b = trunk[rng.gen_range(1..n - 1)];
            let dir = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            for _ in 0..rng.gen_range(3..=6) {
                let next = ScreenPoint::new(
                    clampf(b.x + dir * rng.gen_range(0.008..0.03), 0.0, 1.0),
                    b.y + rng.gen_range(0.01..0.035),
                );
                if !self.push(b, next) {
                    return;
                }
                b = next;
            }
        }
    }
}

pub(crate) struct WeatherState {
    rain_enabled: bool,
    fog_density: f32,
    lightning: Lightning,
    bolt: Bolt,
}

impl WeatherState {
    pub(crate) fn new<R: Rng + ?Sized>(rain_enabled: bool, now: f64, rng: &mut R) -> Self {
        Self {
            rain_enabled,
            fog_density: if rain_enabled { FOG_RAIN } else { FOG_CLEAR },
            lightning: Lightning::Idle {
                next_strike_at: now + rng.gen_range(MIN_STRIKE_GAP..MAX_STRIKE_GAP),
            },
            bolt: Bolt::new(),
        }
    }

    pub(crate) fn rain_enabled(&self) -> bool {
        self.rain_enabled
    }

    pub(crate) fn set_rain(&mut self, enabled: bool) {
        self.rain_enabled = enabled;
    }

    pub(crate) fn fog_density(&self) -> f32 {
        self.fog_density
    }

    pub(crate) fn lightning(&self) -> Lightning {
        self.lightning
    }

    pub(crate) fn bolt(&self) -> &Bolt {
        &self.bolt
    }

    pub(crate) fn advance<R: Rng + ?Sized>(&mut self, now: f64, dt: f32, rng: &mut R) {
        let fog_target = if self.rain_enabled { FOG_RAIN } else { FOG_CLEAR };
        self.fog_density = approach(self.fog_density, fog_target, 0.5, dt);

        match self.lightning {
            Lightning::Idle { next_strike_at } => {
                if self.rain_enabled && now >= next_strike_at {
                    let ground = rng.gen_range(0.32..0.45);
                    self.bolt.generate(rng, ground);
                    self.lightning = Lightning::Flashing {
                        started: now,
                        until: now + FLASH_DURATION,
                    };
                    log::debug!("lightning strike, {} segments", self.bolt.segments.len());
                }
            }
            Lightning::Flashing { until, .. } => {
                if now >= until {
                    self.lightning = Lightning::Idle {
                        next_strike_at: now + rng.gen_range(MIN_STRIKE_GAP..MAX_STRIKE_GAP),
                    };
                }
            }
        }
    }

    // (screen flash alpha, bolt alpha); both zero when idle.
    pub(crate) fn flash(&self, now: f64) -> (f32, f32) {
        match self.lightning {
            Lightning::Flashing { started, until } => {
                let life = ((until - now) / (until - started).max(1e-6)) as f32;
                let life = clampf(life, 0.0, 1.0);
                // a second flicker a third of the way in
                let flicker = if life < 0.7 && life > 0.55 { 0.4 } else { 1.0 };
                (0.5 * life * life * flicker, life.sqrt())
            }
            Lightning::Idle { .. } => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn run_until_strike(w: &mut WeatherState, rng: &mut SmallRng, now: &mut f64) {
        for _ in 0..(60 * 60) {
            *now += 1.0 / 60.0;
            w.advance(*now, 1.0 / 60.0, rng);
            if matches!(w.lightning(), Lightning::Flashing { .. }) {
                return;
            }
        }
        panic!("no strike within a minute");
    }

    #[test]
    fn strike_then_back_to_idle() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut w = WeatherState::new(true, 0.0, &mut rng);
        let mut now = 0.0;
        run_until_strike(&mut w, &mut rng, &mut now);

        let bolt = w.bolt();
        assert!(bolt.main_len >= 3);
        assert!(bolt.segments.len() > bolt.main_len, "expected branches");
        assert!(bolt.segments.len() <= MAX_BOLT_SEGMENTS);
        let (flash, alpha) = w.flash(now);
        assert!(flash > 0.0 && alpha > 0.0);

        let strike_at = now;
        while now < strike_at + FLASH_DURATION + 0.02 {
            now += 1.0 / 60.0;
            w.advance(now, 1.0 / 60.0, &mut rng);
        }
        match w.lightning() {
            Lightning::Idle { next_strike_at } => {
                assert!(next_strike_at >= now + MIN_STRIKE_GAP - 0.02);
            }
            other => panic!("still flashing: {other:?}"),
        }
        assert_eq!(w.flash(now), (0.0, 0.0));
    }

    #[test]
    fn no_lightning_without_rain() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut w = WeatherState::new(false, 0.0, &mut rng);
        let mut now = 0.0;
        for _ in 0..(60 * 120) {
            now += 1.0 / 60.0;
            w.advance(now, 1.0 / 60.0, &mut rng);
            assert!(matches!(w.lightning(), Lightning::Idle { .. }));
        }
        assert!((w.fog_density() - FOG_CLEAR).abs() < 1e-3);
    }

    #[test]
    fn fog_thickens_when_rain_starts() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut w = WeatherState::new(false, 0.0, &mut rng);
        w.set_rain(true);
        let mut now = 0.0;
        for _ in 0..600 {
            now += 1.0 / 60.0;
            w.advance(now, 1.0 / 60.0, &mut rng);
        }
        assert!(w.fog_density() > FOG_CLEAR + 0.2);
    }
}
