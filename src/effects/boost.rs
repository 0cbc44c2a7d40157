use crate::math::{clampf, smoothstep};

pub(crate) const BOOST_DURATION: f64 = 2.5;
pub(crate) const BOOST_COOLDOWN: f64 = 4.0;
pub(crate) const BOOST_SPEED_FACTOR: f32 = 2.2;
const RAMP: f64 = 0.35;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BoostState {
    Idle,
    Active { started: f64, until: f64 },
    Cooldown { until: f64 },
}

pub(crate) struct Boost {
    state: BoostState,
}

impl Boost {
    pub(crate) fn new() -> Self {
        Self {
            state: BoostState::Idle,
        }
    }

    pub(crate) fn state(&self) -> BoostState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, BoostState::Active { .. })
    }

    pub(crate) fn trigger(&mut self, now: f64) -> bool {
        match self.state {
            BoostState::Idle => {
                self.state = BoostState::Active {
                    started: now,
                    until: now + BOOST_DURATION,
                };
                log::debug!("boost active until {:.2}", now + BOOST_DURATION);
                true
            }
            BoostState::Active { .. } | BoostState::Cooldown { .. } => false,
        }
    }

    pub(crate) fn advance(&mut self, now: f64) {
        if let BoostState::Active { until, .. } = self.state {
            if now >= until {
                self.state = BoostState::Cooldown {
                    until: now + BOOST_COOLDOWN,
                };
            }
        }
        if let BoostState::Cooldown { until } = self.state {
            if now >= until {
                self.state = BoostState::Idle;
            }
        }
    }

    pub(crate) fn speed_factor(&self) -> f32 {
        if self.is_active() {
            BOOST_SPEED_FACTOR
        } else {
            1.0
        }
    }

    pub(crate) fn intensity(&self, now: f64) -> f32 {
        match self.state {
            BoostState::Active { started, until } => {
                let rise = smoothstep(0.0, RAMP as f32, (now - started) as f32);
                let fall = smoothstep(0.0, RAMP as f32, (until - now) as f32);
                clampf(rise.min(fall), 0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut b = Boost::new();
        assert!(b.trigger(1.0));
        assert!(b.is_active());
        assert_eq!(b.speed_factor(), BOOST_SPEED_FACTOR);

        b.advance(1.0 + BOOST_DURATION - 0.01);
        assert!(b.is_active());

        b.advance(1.0 + BOOST_DURATION);
        let cool_until = 1.0 + BOOST_DURATION + BOOST_COOLDOWN;
        assert_eq!(b.state(), BoostState::Cooldown { until: cool_until });
        assert_eq!(b.speed_factor(), 1.0);

        b.advance(cool_until - 0.01);
        assert!(matches!(b.state(), BoostState::Cooldown { .. }));
        b.advance(cool_until);
        assert_eq!(b.state(), BoostState::Idle);
    }

    #[test]
    fn retrigger_is_a_noop_while_active_or_cooling() {
        let mut b = Boost::new();
        assert!(b.trigger(0.0));
        let before = b.state();
        assert!(!b.trigger(0.5));
        assert_eq!(b.state(), before);

        b.advance(BOOST_DURATION + 0.1);
        let cooling = b.state();
        assert!(!b.trigger(BOOST_DURATION + 0.2));
        assert_eq!(b.state(), cooling);
    }

    #[test]
    fn intensity_eases_in_and_out() {
        let mut b = Boost::new();
        assert_eq!(b.intensity(0.0), 0.0);
        b.trigger(0.0);
        assert_eq!(b.intensity(0.0), 0.0);
        assert_eq!(b.intensity(1.0), 1.0);
        assert!(b.intensity(BOOST_DURATION - 0.1) < 1.0);
    }
}
