use crate::color::Rgb;
use crate::math::ScreenPoint;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Paint {
    pub(crate) color: Rgb,
    pub(crate) alpha: f32,
    pub(crate) glow: f32,
}

impl Paint {
    pub(crate) fn solid(color: Rgb) -> Self {
        Self {
            color,
            alpha: 1.0,
            glow: 0.0,
        }
    }
    pub(crate) fn alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }
    pub(crate) fn glow(self, glow: f32) -> Self {
        Self { glow, ..self }
    }
}

pub(crate) trait Surface {
    fn clear(&mut self, color: Rgb);
    fn line(&mut self, a: ScreenPoint, b: ScreenPoint, paint: Paint);
    fn fill_polygon(&mut self, pts: &[ScreenPoint], paint: Paint);
    fn circle(&mut self, center: ScreenPoint, radius: f32, paint: Paint);
    fn text(&mut self, at: ScreenPoint, s: &str, paint: Paint);
    fn present(&mut self) -> std::io::Result<()>;
}

pub(crate) trait Clock {
    fn now(&self) -> f64;
    fn request_tick(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Listener {
    Pointer,
    Keyboard,
    Touch,
    Resize,
    Orientation,
}

impl Listener {
    pub(crate) const ALL: [Listener; 5] = [
        Listener::Pointer,
        Listener::Keyboard,
        Listener::Touch,
        Listener::Resize,
        Listener::Orientation,
    ];
}

pub(crate) trait Listeners {
    fn attach(&mut self, listener: Listener) -> bool;
    fn detach(&mut self, listener: Listener);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum DrawCall {
        Clear,
        Line,
        Polygon(usize),
        Circle,
        Text(String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) calls: Vec<DrawCall>,
        pub(crate) presents: usize,
    }

    impl RecordingSurface {
        pub(crate) fn draws(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| !matches!(c, DrawCall::Clear))
                .count()
        }
    }

    impl Surface for RecordingSurface {
        fn clear(&mut self, _color: Rgb) {
            self.calls.push(DrawCall::Clear);
        }
        fn line(&mut self, a: ScreenPoint, b: ScreenPoint, _paint: Paint) {
            assert!(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite());
            self.calls.push(DrawCall::Line);
        }
        fn fill_polygon(&mut self, pts: &[ScreenPoint], _paint: Paint) {
            self.calls.push(DrawCall::Polygon(pts.len()));
        }
        fn circle(&mut self, _center: ScreenPoint, _radius: f32, _paint: Paint) {
            self.calls.push(DrawCall::Circle);
        }
        fn text(&mut self, _at: ScreenPoint, s: &str, _paint: Paint) {
            self.calls.push(DrawCall::Text(s.to_string()));
        }
        fn present(&mut self) -> std::io::Result<()> {
            self.presents += 1;
            Ok(())
        }
    }

    pub(crate) struct ManualClock {
        pub(crate) t: f64,
        pub(crate) requests: u32,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self { t: 0.0, requests: 0 }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            self.t
        }
        fn request_tick(&mut self) {
            self.requests += 1;
        }
    }

    pub(crate) struct FakeListeners {
        pub(crate) supported: HashSet<Listener>,
        pub(crate) attached: HashSet<Listener>,
    }

    impl FakeListeners {
        pub(crate) fn all() -> Self {
            Self {
                supported: Listener::ALL.into_iter().collect(),
                attached: HashSet::new(),
            }
        }
        pub(crate) fn without(mut self, l: Listener) -> Self {
            self.supported.remove(&l);
            self
        }
    }

    impl Listeners for FakeListeners {
        fn attach(&mut self, listener: Listener) -> bool {
            if self.supported.contains(&listener) {
                self.attached.insert(listener);
                true
            } else {
                false
            }
        }
        fn detach(&mut self, listener: Listener) {
            self.attached.remove(&listener);
        }
    }
}
