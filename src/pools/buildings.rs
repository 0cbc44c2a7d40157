use rand::Rng;

use super::{Pool, FAR_Z, NEAR_Z, ROAD_HALF_WIDTH};
use crate::camera::Camera;
use crate::error::SceneError;
use crate::math::WorldPoint;

const SIDEWALK: f32 = 30.0;
const MAX_SETBACK: f32 = 120.0;
const RESPAWN_SPREAD: f32 = 200.0;
pub(crate) const MAX_WINDOW_COLS: usize = 8;
pub(crate) const MAX_WINDOW_ROWS: usize = 24;
const WINDOW_TOGGLE_RATE: f32 = 0.004;

const NEON_WORDS: [&str; 10] = [
    "OPEN", "HOTEL", "BAR", "24H", "NOODLE", "ARCADE", "CLUB", "RAMEN", "TAXI", "NEON",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BuildingKind {
    Residential,
    Commercial,
    Tower,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RooftopKind {
    Antenna,
    WaterTower,
    Vent,
    Helipad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BillboardPattern {
    Stripes,
    Checker,
    Pulse,
    Scanline,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct WindowCell {
    pub(crate) lit: bool,
    pub(crate) flicker_phase: f32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NeonSign {
    pub(crate) text: &'static str,
    pub(crate) hue: f32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Billboard {
    pub(crate) pattern: BillboardPattern,
    pub(crate) phase: f32,
    pub(crate) hue: f32,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Searchlight {
    pub(crate) angle: f32,
    pub(crate) angular_speed: f32,
}

#[derive(Clone, Debug)]
pub(crate) struct Building {
    pub(crate) id: u32,
    // -1 left of the road, +1 right.
    pub(crate) side: f32,
    pub(crate) x: f32,
    pub(crate) width: f32,
    pub(crate) depth: f32,
    pub(crate) height: f32,
    // Depth of the front face.
    pub(crate) z: f32,
    pub(crate) kind: BuildingKind,
    pub(crate) cols: usize,
    pub(crate) rows: usize,
    pub(crate) windows: Vec<WindowCell>,
    pub(crate) sign: Option<NeonSign>,
    pub(crate) rooftop: Option<RooftopKind>,
    pub(crate) billboard: Option<Billboard>,
    pub(crate) searchlight: Option<Searchlight>,
}

impl Building {
    fn new<R: Rng + ?Sized>(id: u32, side: f32, z: f32, rng: &mut R) -> Self {
        let mut b = Self {
            id,
            side,
            x: 0.0,
            width: 0.0,
            depth: 0.0,
            height: 0.0,
            z,
            kind: BuildingKind::Residential,
            cols: 0,
            rows: 0,
            windows: Vec::with_capacity(MAX_WINDOW_COLS * MAX_WINDOW_ROWS),
            sign: None,
            rooftop: None,
            billboard: None,
            searchlight: None,
        };
        b.reset(rng, z);
        b
    }

    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R, z: f32) {
        self.z = z;
        let roll: f32 = rng.gen();
        self.kind = if roll < 0.45 {
            BuildingKind::Residential
        } else if roll < 0.8 {
            BuildingKind::Commercial
        } else {
            BuildingKind::Tower
        };

        let (w, h, lit_p) = match self.kind {
            BuildingKind::Residential => (rng.gen_range(70.0..130.0), rng.gen_range(90.0..220.0), 0.45),
            BuildingKind::Commercial => (rng.gen_range(100.0..180.0), rng.gen_range(160.0..380.0), 0.6),
            BuildingKind::Tower => (rng.gen_range(80.0..140.0), rng.gen_range(380.0..700.0), 0.5),
        };
        self.width = w;
        self.height = h;
        self.depth = rng.gen_range(60.0..140.0);
        let inner = ROAD_HALF_WIDTH + SIDEWALK + rng.gen_range(0.0..MAX_SETBACK);
        self.x = self.side * (inner + w * 0.5);

        self.cols = ((w / 18.0) as usize).clamp(2, MAX_WINDOW_COLS);
        self.rows = ((h / 22.0) as usize).clamp(2, MAX_WINDOW_ROWS);
        self.windows.clear();
        for _ in 0..self.cols * self.rows {
            self.windows.push(WindowCell {
                lit: rng.gen_bool(lit_p),
                flicker_phase: rng.gen_range(0.0..std::f32::consts::TAU),
            });
        }

        let sign_p = if self.kind == BuildingKind::Commercial { 0.6 } else { 0.15 };
        self.sign = rng.gen_bool(sign_p).then(|| NeonSign {
            text: NEON_WORDS[rng.gen_range(0..NEON_WORDS.len())],
            hue: rng.gen(),
        });

        self.rooftop = if rng.gen_bool(0.55) {
            Some(match (self.kind, rng.gen_range(0..4)) {
                (BuildingKind::Tower, 0 | 1) => RooftopKind::Antenna,
                (BuildingKind::Tower, _) => RooftopKind::Helipad,
                (_, 0) => RooftopKind::Antenna,
                (_, 1) => RooftopKind::WaterTower,
                _ => RooftopKind::Vent,
            })
        } else {
            None
        };

        self.billboard = (self.kind != BuildingKind::Residential && rng.gen_bool(0.3)).then(|| {
            Billboard {
                pattern: match rng.gen_range(0..4) {
                    0 => BillboardPattern::Stripes,
                    1 => BillboardPattern::Checker,
                    2 => BillboardPattern::Pulse,
                    _ => BillboardPattern::Scanline,
                },
                phase: rng.gen_range(0.0..std::f32::consts::TAU),
                hue: rng.gen(),
            }
        });

        self.searchlight = (self.kind == BuildingKind::Tower && rng.gen_bool(0.5)).then(|| {
            Searchlight {
                angle: rng.gen_range(-0.6..0.6),
                angular_speed: rng.gen_range(0.3..0.9) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 },
            }
        });
    }

    pub(crate) fn depth_key(&self) -> f32 {
        self.z + self.depth
    }

    pub(crate) fn inner_x(&self) -> f32 {
        self.x - self.side * self.width * 0.5
    }

    pub(crate) fn outer_x(&self) -> f32 {
        self.x + self.side * self.width * 0.5
    }

    pub(crate) fn window(&self, col: usize, row: usize) -> Option<&WindowCell> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.windows.get(row * self.cols + col)
    }

    pub(crate) fn vent_point(&self) -> Option<WorldPoint> {
        (self.rooftop == Some(RooftopKind::Vent))
            .then(|| WorldPoint::new(self.x, self.height + 6.0, self.z + self.depth * 0.5))
    }

    fn is_finite(&self) -> bool {
        [self.x, self.z, self.width, self.depth, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

pub(crate) struct BuildingPool {
    buildings: Vec<Building>,
}

impl BuildingPool {
    pub(crate) fn new<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let per_side = count.div_ceil(2).max(1);
        let span = FAR_Z - NEAR_Z;
        let buildings = (0..count)
            .map(|i| {
                let side = if i % 2 == 0 { -1.0 } else { 1.0 };
                let slot = (i / 2) as f32;
                let z = NEAR_Z + span * (slot + rng.gen_range(0.1..0.9)) / per_side as f32;
                Building::new(i as u32, side, z, rng)
            })
            .collect();
        Self { buildings }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Building> {
        self.buildings.iter()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&Building> {
        self.buildings.get(slot)
    }

    pub(crate) fn update<R: Rng + ?Sized>(&mut self, dt: f32, global_speed: f32, rng: &mut R) {
        for b in &mut self.buildings {
            b.z -= global_speed * dt;
            if b.z <= NEAR_Z {
                let z = FAR_Z + rng.gen_range(0.0..RESPAWN_SPREAD);
                b.reset(rng, z);
            }
            if let Some(light) = &mut b.searchlight {
                light.angle = (light.angle + light.angular_speed * dt).rem_euclid(std::f32::consts::TAU);
            }
            if let Some(board) = &mut b.billboard {
                board.phase += dt * 2.0;
            }
            let toggles = b.windows.len() as f32 * WINDOW_TOGGLE_RATE * dt;
            if rng.gen::<f32>() < toggles {
                let i = rng.gen_range(0..b.windows.len());
                b.windows[i].lit = !b.windows[i].lit;
            }
        }
    }

    pub(crate) fn for_each_visible<'a>(
        &'a self,
        camera: &'a Camera,
    ) -> impl Iterator<Item = &'a Building> + 'a {
        let cam_x = camera.lateral_offset();
        self.buildings.iter().filter(move |b| {
            b.z + b.depth > NEAR_Z
                && b.z <= FAR_Z + RESPAWN_SPREAD
                && (b.x - cam_x).abs() - b.width < b.z.max(NEAR_Z) * 3.0 + 400.0
        })
    }

    pub(crate) fn vents(&self) -> impl Iterator<Item = WorldPoint> + '_ {
        self.buildings.iter().filter_map(Building::vent_point)
    }

    pub(crate) fn sanitize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SceneError> {
        let mut first = None;
        for (slot, b) in self.buildings.iter_mut().enumerate() {
            if !b.is_finite() {
                b.reset(rng, FAR_Z);
                first.get_or_insert(slot);
            }
        }
        match first {
            Some(slot) => Err(SceneError::NonFinite {
                pool: Self::NAME,
                slot,
            }),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn slot_mut(&mut self, i: usize) -> &mut Building {
        &mut self.buildings[i]
    }
}

impl Pool for BuildingPool {
    const NAME: &'static str = "building";
    fn capacity(&self) -> usize {
        self.buildings.len()
    }
    fn live(&self) -> usize {
        self.buildings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn construction_respects_invariants() {
        let mut rng = SmallRng::seed_from_u64(42);
        let pool = BuildingPool::new(26, &mut rng);
        assert_eq!(pool.capacity(), 26);
        for b in pool.iter() {
            assert!(b.z > NEAR_Z && b.z < FAR_Z);
            assert_eq!(b.windows.len(), b.cols * b.rows);
            assert!(b.inner_x().abs() >= ROAD_HALF_WIDTH);
            assert!(b.outer_x().abs() > b.inner_x().abs());
            assert_eq!(b.x.signum(), b.side);
        }
    }

    #[test]
    fn recycles_in_place_without_growing() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut pool = BuildingPool::new(26, &mut rng);
        let caps: Vec<usize> = pool.iter().map(|b| b.windows.capacity()).collect();
        for _ in 0..3000 {
            let before: Vec<f32> = pool.iter().map(|b| b.z).collect();
            pool.update(1.0 / 60.0, 260.0, &mut rng);
            assert_eq!(pool.live(), 26);
            for (b, z0) in pool.iter().zip(before) {
                assert!(b.z > 0.0);
                if b.z > z0 {
                    assert!(b.z >= FAR_Z, "recycled below far bound: {}", b.z);
                }
            }
        }
        let after: Vec<usize> = pool.iter().map(|b| b.windows.capacity()).collect();
        assert_eq!(caps, after);
    }

    #[test]
    fn hitting_the_near_threshold_recycles_same_step() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut pool = BuildingPool::new(4, &mut rng);
        pool.slot_mut(0).z = NEAR_Z + 1.0;
        pool.update(0.1, 10.0, &mut rng);
        assert!(pool.iter().next().unwrap().z >= FAR_Z);
    }

    #[test]
    fn sanitize_resets_non_finite() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut pool = BuildingPool::new(6, &mut rng);
        pool.slot_mut(3).x = f32::NAN;
        match pool.sanitize(&mut rng) {
            Err(SceneError::NonFinite { slot, .. }) => assert_eq!(slot, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(pool.sanitize(&mut rng).is_ok());
        assert_eq!(pool.live(), 6);
    }

    #[test]
    fn visible_set_excludes_things_behind_the_camera() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut pool = BuildingPool::new(8, &mut rng);
        pool.slot_mut(0).z = -500.0;
        pool.slot_mut(0).depth = 60.0;
        let cam = Camera::new();
        assert!(pool.for_each_visible(&cam).all(|b| b.id != 0));
        assert_eq!(pool.for_each_visible(&cam).count(), 7);
    }
}
