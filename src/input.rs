use crate::math::ScreenPoint;
use crate::surface::Listener;

const DOUBLE_TAP_WINDOW: f64 = 0.3;
const DOUBLE_TAP_SLOP: f32 = 40.0;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum InputEvent {
    PointerMove { x: f32, y: f32 },
    PointerDown { x: f32, y: f32 },
    KeyPress,
    TouchStart { touches: Vec<ScreenPoint>, time: f64 },
    TouchMove { touches: Vec<ScreenPoint> },
    TouchEnd { remaining: usize },
    // Device tilt in degrees: `beta` front/back, `gamma` left/right.
    Orientation { beta: f32, gamma: f32 },
    Resize { width: f32, height: f32, dpr: f32 },
}

impl InputEvent {
    pub(crate) fn listener(&self) -> Listener {
        match self {
            InputEvent::PointerMove { .. } | InputEvent::PointerDown { .. } => Listener::Pointer,
            InputEvent::KeyPress => Listener::Keyboard,
            InputEvent::TouchStart { .. }
            | InputEvent::TouchMove { .. }
            | InputEvent::TouchEnd { .. } => Listener::Touch,
            InputEvent::Orientation { .. } => Listener::Orientation,
            InputEvent::Resize { .. } => Listener::Resize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Gesture {
    Drag(ScreenPoint),
    Zoom(f32),
    DoubleTap,
}

#[derive(Default)]
pub(crate) struct TouchGestures {
    last_tap: Option<(f64, ScreenPoint)>,
    pinch_start: Option<(f32, f32)>,
}

impl TouchGestures {
    pub(crate) fn on_start(
        &mut self,
        touches: &[ScreenPoint],
        time: f64,
        current_zoom: f32,
    ) -> Option<Gesture> {
        match touches {
            [] => None,
            [p] => {
                if let Some((t, q)) = self.last_tap.take() {
                    if time - t <= DOUBLE_TAP_WINDOW && p.dist(q) <= DOUBLE_TAP_SLOP {
                        return Some(Gesture::DoubleTap);
                    }
                }
                self.last_tap = Some((time, *p));
                None
            }
            [a, b, ..] => {
                self.last_tap = None;
                let d = a.dist(*b);
                if d > 1.0 {
                    self.pinch_start = Some((d, current_zoom));
                }
                None
            }
        }
    }

    pub(crate) fn on_move(&mut self, touches: &[ScreenPoint]) -> Option<Gesture> {
        match touches {
            [] => None,
            [p] => Some(Gesture::Drag(*p)),
            [a, b, ..] => {
                let (d0, z0) = self.pinch_start?;
                Some(Gesture::Zoom(z0 * a.dist(*b) / d0))
            }
        }
    }

    pub(crate) fn on_end(&mut self, remaining: usize) {
        if remaining < 2 {
            self.pinch_start = None;
        }
    }
}

pub(crate) fn tilt_to_parallax(beta: f32, gamma: f32) -> Option<(f32, f32)> {
    if !(beta.is_finite() && gamma.is_finite()) {
        return None;
    }
    // hold the device at ~45 degrees as neutral
    Some((gamma / 30.0, (beta - 45.0) / 30.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f32, y: f32) -> ScreenPoint {
        ScreenPoint::new(x, y)
    }

    #[test]
    fn double_tap_needs_two_quick_close_taps() {
        let mut g = TouchGestures::default();
        assert_eq!(g.on_start(&[pt(100.0, 100.0)], 1.0, 1.0), None);
        assert_eq!(
            g.on_start(&[pt(110.0, 105.0)], 1.2, 1.0),
            Some(Gesture::DoubleTap)
        );
        // a third tap starts over
        assert_eq!(g.on_start(&[pt(110.0, 105.0)], 1.3, 1.0), None);

        let mut g = TouchGestures::default();
        g.on_start(&[pt(0.0, 0.0)], 0.0, 1.0);
        assert_eq!(g.on_start(&[pt(0.0, 0.0)], 0.5, 1.0), None);
    }

    #[test]
    fn pinch_scales_from_starting_zoom() {
        let mut g = TouchGestures::default();
        g.on_start(&[pt(0.0, 0.0), pt(100.0, 0.0)], 0.0, 1.2);
        match g.on_move(&[pt(0.0, 0.0), pt(150.0, 0.0)]) {
            Some(Gesture::Zoom(z)) => assert!((z - 1.8).abs() < 1e-4),
            other => panic!("expected zoom, got {other:?}"),
        }
        g.on_end(1);
        assert_eq!(g.on_move(&[pt(0.0, 0.0), pt(150.0, 0.0)]), None);
    }

    #[test]
    fn single_finger_drags() {
        let mut g = TouchGestures::default();
        assert_eq!(
            g.on_move(&[pt(3.0, 4.0)]),
            Some(Gesture::Drag(pt(3.0, 4.0)))
        );
    }

    #[test]
    fn events_map_to_listeners() {
        assert_eq!(InputEvent::KeyPress.listener(), Listener::Keyboard);
        assert_eq!(
            InputEvent::TouchEnd { remaining: 0 }.listener(),
            Listener::Touch
        );
        assert!(tilt_to_parallax(f32::NAN, 0.0).is_none());
        assert_eq!(tilt_to_parallax(45.0, 0.0), Some((0.0, 0.0)));
    }
}
