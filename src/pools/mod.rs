// Fixed-capacity entity pools. Slots are reset in place, never reallocated.

pub(crate) mod buildings;
pub(crate) mod particles;
pub(crate) mod vehicles;

pub(crate) use buildings::{Building, BuildingKind, BuildingPool, RooftopKind};
pub(crate) use particles::{CloudLayer, ParticleBounds, RainField, StarField, SteamPool};
pub(crate) use vehicles::{FlyingPool, TrafficPool};

// Entities at or below this depth are recycled.
pub(crate) const NEAR_Z: f32 = 10.0;
// Recycled entities reappear at or beyond this depth.
pub(crate) const FAR_Z: f32 = 3000.0;
pub(crate) const ROAD_HALF_WIDTH: f32 = 160.0;
pub(crate) const LANES: u8 = 4;
pub(crate) const LANE_WIDTH: f32 = 70.0;

pub(crate) trait Pool {
    const NAME: &'static str;
    fn capacity(&self) -> usize;
    fn live(&self) -> usize;
}

pub(crate) fn lane_x(lane: u8) -> f32 {
    (lane as f32 - (LANES as f32 - 1.0) * 0.5) * LANE_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_fit_on_the_road() {
        for lane in 0..LANES {
            assert!(lane_x(lane).abs() + LANE_WIDTH * 0.5 <= ROAD_HALF_WIDTH);
        }
        assert_eq!(lane_x(0), -lane_x(LANES - 1));
    }
}
