use rand::Rng;

use crate::math::{approach, clampf};

pub(crate) const MAX_TURN_OFFSET: f32 = 120.0;
pub(crate) const MAX_ROLL: f32 = 0.10;
const OFFSET_RATE: f32 = 1.4;
const ROLL_RATE: f32 = 3.0;
const MIN_GAP: f64 = 7.0;
const MAX_GAP: f64 = 15.0;
const RETURN_LEAD: f64 = 1.8;

pub(crate) struct Turning {
    next_turn_at: f64,
    return_at: f64,
    target: f32,
    offset: f32,
    roll: f32,
}

impl Turning {
    pub(crate) fn new<R: Rng + ?Sized>(now: f64, rng: &mut R) -> Self {
        let next_turn_at = now + rng.gen_range(MIN_GAP * 0.5..MIN_GAP);
        Self {
            next_turn_at,
            return_at: next_turn_at,
            target: 0.0,
            offset: 0.0,
            roll: 0.0,
        }
    }

    pub(crate) fn offset(&self) -> f32 {
        self.offset
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> f32 {
        self.target
    }

    pub(crate) fn roll(&self) -> f32 {
        self.roll
    }

    #[cfg(test)]
    pub(crate) fn next_turn_at(&self) -> f64 {
        self.next_turn_at
    }

    pub(crate) fn advance<R: Rng + ?Sized>(&mut self, now: f64, dt: f32, rng: &mut R) {
        if now >= self.next_turn_at {
            let dir = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            self.target = dir * rng.gen_range(0.55..1.0) * MAX_TURN_OFFSET;
            self.next_turn_at = now + rng.gen_range(MIN_GAP..MAX_GAP);
            self.return_at = self.next_turn_at - RETURN_LEAD;
            log::debug!("turn to {:.1}, next at {:.2}", self.target, self.next_turn_at);
        } else if now >= self.return_at {
            self.target = 0.0;
        }

        self.offset = clampf(
            approach(self.offset, self.target, OFFSET_RATE, dt),
            -MAX_TURN_OFFSET,
            MAX_TURN_OFFSET,
        );
        let roll_target = -(self.offset / MAX_TURN_OFFSET) * MAX_ROLL;
        self.roll = approach(self.roll, roll_target, ROLL_RATE, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn offset_stays_bounded_for_any_step() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut t = Turning::new(0.0, &mut rng);
        let mut now = 0.0f64;
        for i in 0..20_000 {
            // mix of tiny, normal and absurd steps
            let dt = match i % 7 {
                0 => 2.5,
                1 => 0.0001,
                _ => 1.0 / 60.0,
            };
            now += dt as f64;
            t.advance(now, dt, &mut rng);
            assert!(t.offset().abs() <= MAX_TURN_OFFSET);
            assert!(t.roll().abs() <= MAX_ROLL + 1e-6);
        }
    }

    #[test]
    fn turns_then_returns_before_next() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut t = Turning::new(0.0, &mut rng);
        let first = t.next_turn_at();
        let dt = 1.0 / 60.0;
        let mut now = 0.0;
        while now < first {
            now += dt as f64;
            t.advance(now, dt, &mut rng);
        }
        assert!(t.target().abs() >= 0.55 * MAX_TURN_OFFSET);
        let next = t.next_turn_at();
        while now < next - RETURN_LEAD + 0.05 {
            now += dt as f64;
            t.advance(now, dt, &mut rng);
        }
        assert_eq!(t.target(), 0.0);
    }

    #[test]
    fn roll_banks_against_the_turn() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut t = Turning::new(0.0, &mut rng);
        let dt = 1.0 / 60.0;
        let mut now = 0.0;
        while now < t.return_at - 0.1 || t.target() == 0.0 {
            now += dt as f64;
            t.advance(now, dt, &mut rng);
        }
        assert!(t.offset() * t.roll() < 0.0);
    }
}
