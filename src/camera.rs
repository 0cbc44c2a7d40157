use crate::math::{approach, clampf};
use crate::projector::{Projector, Viewport};

const PARALLAX_X: f32 = 40.0;
const PARALLAX_Y: f32 = 0.03;
const PARALLAX_RATE: f32 = 4.0;
const ZOOM_RATE: f32 = 6.0;
pub(crate) const MIN_ZOOM: f32 = 0.8;
pub(crate) const MAX_ZOOM: f32 = 1.6;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Camera {
    parallax_x: f32,
    parallax_y: f32,
    target_x: f32,
    target_y: f32,
    zoom: f32,
    zoom_target: f32,
    turn_offset: f32,
    roll: f32,
}

impl Camera {
    pub(crate) fn new() -> Self {
        Self {
            parallax_x: 0.0,
            parallax_y: 0.0,
            target_x: 0.0,
            target_y: 0.0,
            zoom: 1.0,
            zoom_target: 1.0,
            turn_offset: 0.0,
            roll: 0.0,
        }
    }

    pub(crate) fn set_parallax_target(&mut self, nx: f32, ny: f32) {
        if nx.is_finite() && ny.is_finite() {
            self.target_x = clampf(nx, -1.0, 1.0);
            self.target_y = clampf(ny, -1.0, 1.0);
        }
    }

    pub(crate) fn zoom(&self) -> f32 {
        self.zoom
    }

    pub(crate) fn zoom_target(&self) -> f32 {
        self.zoom_target
    }

    pub(crate) fn set_zoom_target(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom_target = clampf(zoom, MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub(crate) fn roll(&self) -> f32 {
        self.roll
    }

    pub(crate) fn turn_offset(&self) -> f32 {
        self.turn_offset
    }

    pub(crate) fn parallax(&self) -> (f32, f32) {
        (self.parallax_x, self.parallax_y)
    }

    pub(crate) fn lateral_offset(&self) -> f32 {
        self.turn_offset + self.parallax_x * PARALLAX_X
    }

    pub(crate) fn update(&mut self, dt: f32, turn_offset: f32, roll: f32) {
        self.parallax_x = approach(self.parallax_x, self.target_x, PARALLAX_RATE, dt);
        self.parallax_y = approach(self.parallax_y, self.target_y, PARALLAX_RATE, dt);
        self.zoom = approach(self.zoom, self.zoom_target, ZOOM_RATE, dt);
        self.turn_offset = turn_offset;
        self.roll = roll;
    }

    pub(crate) fn apply(&self, projector: &mut Projector, vp: &Viewport) {
        projector.zoom = self.zoom;
        projector.vertical_parallax = self.parallax_y * vp.height * PARALLAX_Y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallax_converges_and_clamps() {
        let mut c = Camera::new();
        c.set_parallax_target(5.0, -0.5);
        for _ in 0..600 {
            c.update(1.0 / 60.0, 0.0, 0.0);
        }
        let (x, y) = c.parallax();
        assert!((x - 1.0).abs() < 1e-3);
        assert!((y + 0.5).abs() < 1e-3);
        assert!((c.lateral_offset() - PARALLAX_X).abs() < 0.1);
    }

    #[test]
    fn zoom_is_bounded() {
        let mut c = Camera::new();
        c.set_zoom_target(10.0);
        assert_eq!(c.zoom_target(), MAX_ZOOM);
        c.set_zoom_target(f32::NAN);
        assert_eq!(c.zoom_target(), MAX_ZOOM);
        c.set_zoom_target(0.1);
        assert_eq!(c.zoom_target(), MIN_ZOOM);
    }

    #[test]
    fn applies_to_projector() {
        let vp = Viewport::new(800.0, 600.0, 1.0).unwrap();
        let mut p = Projector::for_viewport(&vp);
        let mut c = Camera::new();
        c.set_parallax_target(0.0, 1.0);
        c.set_zoom_target(1.5);
        for _ in 0..600 {
            c.update(1.0 / 60.0, 0.0, 0.0);
        }
        c.apply(&mut p, &vp);
        assert!((p.zoom - 1.5).abs() < 1e-3);
        assert!((p.vertical_parallax - 18.0).abs() < 0.1);
    }
}
