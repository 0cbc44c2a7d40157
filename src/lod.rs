use crate::math::{clampf, hash01, lerp};

pub(crate) const NEAR_RANGE: f32 = 650.0;
pub(crate) const FAR_RANGE: f32 = 1700.0;
pub(crate) const DECORATION_RANGE: f32 = 1400.0;

const MID_FLOOR: f32 = 0.25;
const MIN_BIAS: f32 = 0.4;
// Window skip decisions are re-rolled once per this many seconds.
const COHERENCE_PERIOD: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LodLevel {
    Near,
    Mid,
    Far,
}

pub(crate) struct LodManager {
    bias: f32,
}

impl LodManager {
    pub(crate) fn new() -> Self {
        Self { bias: 1.0 }
    }

    pub(crate) fn bias(&self) -> f32 {
        self.bias
    }

    pub(crate) fn level(distance: f32) -> LodLevel {
        if distance < NEAR_RANGE {
            LodLevel::Near
        } else if distance < FAR_RANGE {
            LodLevel::Mid
        } else {
            LodLevel::Far
        }
    }

    pub(crate) fn detail_ratio(&self, distance: f32) -> f32 {
        let base = match Self::level(distance) {
            LodLevel::Near => 1.0,
            LodLevel::Mid => {
                let t = (distance - NEAR_RANGE) / (FAR_RANGE - NEAR_RANGE);
                lerp(1.0, MID_FLOOR, t)
            }
            LodLevel::Far => 0.0,
        };
        clampf(base * self.bias, 0.0, 1.0)
    }

    pub(crate) fn decorations_visible(&self, distance: f32) -> bool {
        distance < DECORATION_RANGE * self.bias.max(0.75)
    }

    // Temporally coherent per-cell decision: the same cell keeps its verdict for
    // a whole coherence period instead of flickering every frame.
    pub(crate) fn draws_cell(ratio: f32, entity: u32, cell: u32, time: f32) -> bool {
        if ratio >= 1.0 {
            return true;
        }
        if ratio <= 0.0 {
            return false;
        }
        let epoch = (time.max(0.0) / COHERENCE_PERIOD) as u32;
        hash01(entity, cell, epoch) < ratio
    }

    pub(crate) fn particle_budget(&self, count: usize) -> usize {
        ((count as f32) * self.bias).ceil() as usize
    }

    pub(crate) fn adapt(&mut self, frame_secs: f32, budget_secs: f32) {
        if !frame_secs.is_finite() || budget_secs <= 0.0 {
            return;
        }
        if frame_secs > budget_secs * 1.1 {
            let next = (self.bias - 0.05).max(MIN_BIAS);
            if next < self.bias {
                log::debug!("frame {:.1}ms over budget, lod bias {:.2}", frame_secs * 1000.0, next);
            }
            self.bias = next;
        } else if frame_secs < budget_secs * 0.6 {
            self.bias = (self.bias + 0.01).min(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_monotonic() {
        let mut lod = LodManager::new();
        for bias_step in 0..3 {
            let mut prev = f32::INFINITY;
            for i in 0..400 {
                let d = i as f32 * 7.5;
                let r = lod.detail_ratio(d);
                assert!((0.0..=1.0).contains(&r));
                assert!(r <= prev, "ratio rose at {d}");
                prev = r;
            }
            if bias_step < 2 {
                lod.adapt(1.0, 0.016);
            }
        }
    }

    #[test]
    fn breakpoints() {
        let lod = LodManager::new();
        assert_eq!(lod.detail_ratio(10.0), 1.0);
        assert!(lod.detail_ratio(1000.0) < 1.0 && lod.detail_ratio(1000.0) > 0.0);
        assert_eq!(lod.detail_ratio(FAR_RANGE), 0.0);
        assert!(lod.decorations_visible(800.0));
        assert!(!lod.decorations_visible(DECORATION_RANGE + 1.0));
    }

    #[test]
    fn cell_decisions_are_stable_within_a_period() {
        for cell in 0..64 {
            let a = LodManager::draws_cell(0.5, 3, cell, 10.05);
            let b = LodManager::draws_cell(0.5, 3, cell, 11.9);
            assert_eq!(a, b);
        }
        let drawn = (0..1000)
            .filter(|&c| LodManager::draws_cell(0.3, 9, c, 0.0))
            .count();
        assert!((200..400).contains(&drawn), "drawn {drawn}");
    }

    #[test]
    fn bias_has_a_floor_and_recovers() {
        let mut lod = LodManager::new();
        for _ in 0..100 {
            lod.adapt(0.1, 0.016);
        }
        assert!((lod.bias() - MIN_BIAS).abs() < 1e-6);
        for _ in 0..100 {
            lod.adapt(0.001, 0.016);
        }
        assert_eq!(lod.bias(), 1.0);
        assert_eq!(lod.particle_budget(200), 200);
    }
}
