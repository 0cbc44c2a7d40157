use crate::math::{ScreenPoint, WorldPoint};

// Surface size in device pixels. Zero-sized viewports are never constructed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) dpr: f32,
}

impl Viewport {
    pub(crate) fn new(width: f32, height: f32, dpr: f32) -> Option<Self> {
        let ok = |v: f32| v.is_finite() && v >= 1.0;
        if !ok(width) || !ok(height) {
            return None;
        }
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        Some(Self { width, height, dpr })
    }
}

pub(crate) const CAMERA_HEIGHT: f32 = 55.0;
pub(crate) const Z_MIN: f32 = 1.0;
const FOCAL_PER_HEIGHT: f32 = 0.9;
const HORIZON_FRACTION: f32 = 0.42;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Projector {
    pub(crate) center_x: f32,
    pub(crate) center_y: f32,
    pub(crate) focal: f32,
    pub(crate) camera_height: f32,
    pub(crate) z_min: f32,
    pub(crate) zoom: f32,
    pub(crate) vertical_parallax: f32,
}

impl Projector {
    pub(crate) fn for_viewport(vp: &Viewport) -> Self {
        Self {
            center_x: vp.width * 0.5,
            center_y: vp.height * HORIZON_FRACTION,
            focal: vp.height * FOCAL_PER_HEIGHT,
            camera_height: CAMERA_HEIGHT,
            z_min: Z_MIN,
            zoom: 1.0,
            vertical_parallax: 0.0,
        }
    }

    pub(crate) fn scale_at(&self, z: f32) -> f32 {
        self.focal * self.zoom / z.max(self.z_min)
    }

    pub(crate) fn project(&self, p: WorldPoint, camera_x: f32) -> ScreenPoint {
        let scale = self.scale_at(p.z);
        ScreenPoint::new(
            self.center_x + (p.x - camera_x) * scale,
            self.center_y - (p.y - self.camera_height) * scale - self.vertical_parallax,
        )
    }

    pub(crate) fn horizon_y(&self) -> f32 {
        self.center_y - self.vertical_parallax
    }

    pub(crate) fn pivot(&self) -> ScreenPoint {
        ScreenPoint::new(self.center_x, self.horizon_y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hd() -> Projector {
        Projector::for_viewport(&Viewport::new(1920.0, 1080.0, 1.0).unwrap())
    }

    #[test]
    fn centred_point_projects_to_screen_centre() {
        let p = hd();
        for z in [0.001f32, 0.5, 1.0, 10.0, 250.0, 4000.0, 1e6] {
            let s = p.project(WorldPoint::new(0.0, 30.0, z), 0.0);
            assert_eq!(s.x, p.center_x);
        }
    }

    #[test]
    fn near_plane_is_clamped() {
        let p = hd();
        let a = p.project(WorldPoint::new(10.0, 0.0, 0.0), 0.0);
        let b = p.project(WorldPoint::new(10.0, 0.0, -50.0), 0.0);
        assert!(a.x.is_finite() && a.y.is_finite());
        assert_eq!(a, b);
    }

    #[test]
    fn farther_points_converge_on_horizon() {
        let p = hd();
        let near = p.project(WorldPoint::new(100.0, 0.0, 50.0), 0.0);
        let far = p.project(WorldPoint::new(100.0, 0.0, 5000.0), 0.0);
        assert!((far.x - p.center_x).abs() < (near.x - p.center_x).abs());
        assert!((far.y - p.horizon_y()).abs() < (near.y - p.horizon_y()).abs());
    }

    #[test]
    fn camera_offset_shifts_opposite() {
        let p = hd();
        let s = p.project(WorldPoint::new(0.0, 0.0, 100.0), 40.0);
        assert!(s.x < p.center_x);
    }

    #[test]
    fn degenerate_viewport_is_rejected() {
        assert!(Viewport::new(0.0, 0.0, 1.0).is_none());
        assert!(Viewport::new(800.0, f32::NAN, 1.0).is_none());
        assert_eq!(Viewport::new(10.0, 10.0, 0.0).unwrap().dpr, 1.0);
    }
}
