use rand::Rng;

use super::{lane_x, Pool, FAR_Z, LANES, NEAR_Z};
use crate::camera::Camera;
use crate::color::{hsv_to_rgb, Rgb};
use crate::error::SceneError;
use crate::math::WorldPoint;

const RESPAWN_SPREAD: f32 = 400.0;
const BOB_AMPLITUDE: f32 = 10.0;
const BOB_RATE: f32 = 1.7;
const MIN_CLOSING: f32 = 0.25;

const CAR_COLORS: [Rgb; 6] = [
    Rgb::new(220, 220, 230),
    Rgb::new(40, 40, 48),
    Rgb::new(180, 30, 40),
    Rgb::new(30, 90, 180),
    Rgb::new(230, 190, 40),
    Rgb::new(90, 100, 110),
];

#[derive(Clone, Copy, Debug)]
pub(crate) struct GroundVehicle {
    pub(crate) lane: u8,
    pub(crate) z: f32,
    // Own forward speed; the camera closes in at global speed minus this.
    pub(crate) speed: f32,
    pub(crate) color: Rgb,
    pub(crate) emergency: bool,
    pub(crate) strobe_phase: f32,
}

impl GroundVehicle {
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R, z: f32) {
        self.z = z;
        self.lane = rng.gen_range(0..LANES);
        self.speed = if self.emergency {
            rng.gen_range(14.0..28.0)
        } else {
            rng.gen_range(0.0..10.0)
        };
        self.color = if self.emergency {
            Rgb::new(235, 235, 240)
        } else {
            CAR_COLORS[rng.gen_range(0..CAR_COLORS.len())]
        };
        self.strobe_phase = rng.gen_range(0.0..1.0);
    }

    pub(crate) fn x(&self) -> f32 {
        lane_x(self.lane)
    }

    pub(crate) fn strobe_red(&self, time: f32) -> bool {
        ((time * 6.0 + self.strobe_phase) as i64) % 2 == 0
    }
}

pub(crate) struct TrafficPool {
    vehicles: Vec<GroundVehicle>,
}

impl TrafficPool {
    pub(crate) fn new<R: Rng + ?Sized>(count: usize, emergency: usize, rng: &mut R) -> Self {
        let vehicles = (0..count)
            .map(|i| {
                let mut v = GroundVehicle {
                    lane: 0,
                    z: 0.0,
                    speed: 0.0,
                    color: Rgb::BLACK,
                    emergency: i < emergency,
                    strobe_phase: 0.0,
                };
                let z = rng.gen_range(NEAR_Z * 8.0..FAR_Z);
                v.reset(rng, z);
                v
            })
            .collect();
        Self { vehicles }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &GroundVehicle> {
        self.vehicles.iter()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&GroundVehicle> {
        self.vehicles.get(slot)
    }

    pub(crate) fn update<R: Rng + ?Sized>(&mut self, dt: f32, global_speed: f32, rng: &mut R) {
        for v in &mut self.vehicles {
            let closing = (global_speed - v.speed).max(global_speed * MIN_CLOSING);
            v.z -= closing * dt;
            if v.z <= NEAR_Z {
                let z = FAR_Z + rng.gen_range(0.0..RESPAWN_SPREAD);
                v.reset(rng, z);
            }
        }
    }

    pub(crate) fn for_each_visible<'a>(
        &'a self,
        camera: &'a Camera,
    ) -> impl Iterator<Item = (usize, &'a GroundVehicle)> + 'a {
        let cam_x = camera.lateral_offset();
        self.vehicles
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.z > NEAR_Z && v.z <= FAR_Z && (v.x() - cam_x).abs() < v.z * 3.0 + 200.0)
    }

    pub(crate) fn sanitize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SceneError> {
        let mut first = None;
        for (slot, v) in self.vehicles.iter_mut().enumerate() {
            if !(v.z.is_finite() && v.speed.is_finite()) {
                v.reset(rng, FAR_Z);
                first.get_or_insert(slot);
            }
        }
        first.map_or(Ok(()), |slot| {
            Err(SceneError::NonFinite {
                pool: Self::NAME,
                slot,
            })
        })
    }

    #[cfg(test)]
    pub(crate) fn slot_mut(&mut self, i: usize) -> &mut GroundVehicle {
        &mut self.vehicles[i]
    }
}

impl Pool for TrafficPool {
    const NAME: &'static str = "traffic";
    fn capacity(&self) -> usize {
        self.vehicles.len()
    }
    fn live(&self) -> usize {
        self.vehicles.len()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct FlyingVehicle {
    pub(crate) x: f32,
    pub(crate) altitude: f32,
    pub(crate) bob_phase: f32,
    pub(crate) z: f32,
    pub(crate) speed: f32,
    pub(crate) color: Rgb,
}

impl FlyingVehicle {
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R, z: f32) {
        self.z = z;
        self.x = rng.gen_range(-420.0..420.0);
        self.altitude = rng.gen_range(140.0..320.0);
        self.bob_phase = rng.gen_range(0.0..std::f32::consts::TAU);
        self.speed = rng.gen_range(-12.0..12.0);
        self.color = hsv_to_rgb(rng.gen(), 0.6, 0.9);
    }

    pub(crate) fn y(&self) -> f32 {
        self.altitude + self.bob_phase.sin() * BOB_AMPLITUDE
    }

    pub(crate) fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y(), self.z)
    }
}

pub(crate) struct FlyingPool {
    vehicles: Vec<FlyingVehicle>,
}

impl FlyingPool {
    pub(crate) fn new<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let vehicles = (0..count)
            .map(|_| {
                let mut v = FlyingVehicle {
                    x: 0.0,
                    altitude: 0.0,
                    bob_phase: 0.0,
                    z: 0.0,
                    speed: 0.0,
                    color: Rgb::BLACK,
                };
                let z = rng.gen_range(NEAR_Z * 8.0..FAR_Z);
                v.reset(rng, z);
                v
            })
            .collect();
        Self { vehicles }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &FlyingVehicle> {
        self.vehicles.iter()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&FlyingVehicle> {
        self.vehicles.get(slot)
    }

    pub(crate) fn update<R: Rng + ?Sized>(&mut self, dt: f32, global_speed: f32, rng: &mut R) {
        for v in &mut self.vehicles {
            let closing = (global_speed - v.speed).max(global_speed * MIN_CLOSING);
            v.z -= closing * dt;
            v.bob_phase = (v.bob_phase + BOB_RATE * dt).rem_euclid(std::f32::consts::TAU);
            if v.z <= NEAR_Z {
                let z = FAR_Z + rng.gen_range(0.0..RESPAWN_SPREAD);
                v.reset(rng, z);
            }
        }
    }

    pub(crate) fn for_each_visible<'a>(
        &'a self,
        camera: &'a Camera,
    ) -> impl Iterator<Item = (usize, &'a FlyingVehicle)> + 'a {
        let cam_x = camera.lateral_offset();
        self.vehicles
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.z > NEAR_Z && v.z <= FAR_Z && (v.x - cam_x).abs() < v.z * 3.0 + 200.0)
    }

    pub(crate) fn sanitize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SceneError> {
        let mut first = None;
        for (slot, v) in self.vehicles.iter_mut().enumerate() {
            if !v.position().is_finite() {
                v.reset(rng, FAR_Z);
                first.get_or_insert(slot);
            }
        }
        first.map_or(Ok(()), |slot| {
            Err(SceneError::NonFinite {
                pool: Self::NAME,
                slot,
            })
        })
    }
}

impl Pool for FlyingPool {
    const NAME: &'static str = "flying";
    fn capacity(&self) -> usize {
        self.vehicles.len()
    }
    fn live(&self) -> usize {
        self.vehicles.len()
    }
}
