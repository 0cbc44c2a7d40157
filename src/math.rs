// A point in world space. `z` is depth along the travel axis (larger is farther).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct WorldPoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct ScreenPoint {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl WorldPoint {
    pub(crate) fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
    pub(crate) fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl ScreenPoint {
    pub(crate) fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub(crate) fn lerp(self, o: ScreenPoint, t: f32) -> ScreenPoint {
        ScreenPoint::new(lerp(self.x, o.x, t), lerp(self.y, o.y, t))
    }
    pub(crate) fn dist(self, o: ScreenPoint) -> f32 {
        let dx = self.x - o.x;
        let dy = self.y - o.y;
        (dx * dx + dy * dy).sqrt()
    }
    pub(crate) fn rotate_about(self, pivot: ScreenPoint, angle: f32) -> ScreenPoint {
        if angle == 0.0 {
            return self;
        }
        let (s, c) = angle.sin_cos();
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        ScreenPoint::new(pivot.x + dx * c - dy * s, pivot.y + dx * s + dy * c)
    }
}

pub(crate) fn clampf(v: f32, a: f32, b: f32) -> f32 {
    v.max(a).min(b)
}

pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = clampf((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// Exponential approach of `current` toward `target` with rate `k` per second.
// The step factor is capped at 1 so large `dt` never overshoots.
pub(crate) fn approach(current: f32, target: f32, k: f32, dt: f32) -> f32 {
    current + (target - current) * clampf(k * dt, 0.0, 1.0)
}

pub(crate) fn hash01(a: u32, b: u32, c: u32) -> f32 {
    let mut h = (a as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((b as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9))
        .wrapping_add((c as u64).wrapping_mul(0x94D0_49BB_1331_11EB));
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    (h >> 40) as f32 / (1u64 << 24) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_in_range() {
        for i in 0..500 {
            let v = hash01(i, i * 7, 3);
            assert!((0.0..1.0).contains(&v));
            assert_eq!(v, hash01(i, i * 7, 3));
        }
        assert_ne!(hash01(1, 2, 3), hash01(1, 2, 4));
    }

    #[test]
    fn approach_never_overshoots() {
        let v = approach(0.0, 10.0, 50.0, 1.0);
        assert_eq!(v, 10.0);
        let v = approach(0.0, 10.0, 2.0, 0.1);
        assert!(v > 0.0 && v < 10.0);
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = ScreenPoint::new(1.0, 0.0).rotate_about(ScreenPoint::default(), std::f32::consts::FRAC_PI_2);
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 1.0).abs() < 1e-5);
    }
}
