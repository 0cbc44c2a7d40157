use std::f32::consts::TAU;

use crate::color::{hsv_to_rgb, Palette, Rgb};
use crate::effects::{BoostState, Lightning};
use crate::error::SceneError;
use crate::lod::{LodLevel, LodManager};
use crate::math::{hash01, lerp, smoothstep, ScreenPoint, WorldPoint};
use crate::pools::buildings::BillboardPattern;
use crate::pools::{lane_x, Building, Pool, RooftopKind, FAR_Z, LANES, LANE_WIDTH, NEAR_Z, ROAD_HALF_WIDTH};
use crate::projector::{Projector, Viewport};
use crate::scene::Scene;
use crate::surface::{Paint, Surface};

const DASH_PERIOD: f32 = 120.0;
const DASH_LENGTH: f32 = 50.0;
const GRID_PERIOD: f32 = 240.0;
const SKY_BANDS: usize = 10;
const SPEED_LINES: u32 = 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pass {
    Reflections,
    Rain,
    Fog,
    Boost,
    Lightning,
    Hud,
}

struct View<'a> {
    proj: &'a Projector,
    vp: Viewport,
    pal: &'a Palette,
    cam_x: f32,
    roll: f32,
    pivot: ScreenPoint,
    time: f32,
}

impl View<'_> {
    fn p(&self, x: f32, y: f32, z: f32) -> ScreenPoint {
        self.proj
            .project(WorldPoint::new(x, y, z), self.cam_x)
            .rotate_about(self.pivot, self.roll)
    }

    fn wp(&self, w: WorldPoint) -> ScreenPoint {
        self.p(w.x, w.y, w.z)
    }

    fn s(&self, x: f32, y: f32) -> ScreenPoint {
        ScreenPoint::new(x, y).rotate_about(self.pivot, self.roll)
    }

    fn band(&self, y0: f32, y1: f32) -> [ScreenPoint; 4] {
        let w = self.vp.width;
        [
            self.s(-w, y0),
            self.s(w * 2.0, y0),
            self.s(w * 2.0, y1),
            self.s(-w, y1),
        ]
    }

    fn fade(&self, z: f32) -> f32 {
        1.0 - smoothstep(FAR_Z * 0.3, FAR_Z, z) * 0.85
    }

    fn full_screen(&self) -> [ScreenPoint; 4] {
        let (w, h) = (self.vp.width, self.vp.height);
        [
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(w, 0.0),
            ScreenPoint::new(w, h),
            ScreenPoint::new(0.0, h),
        ]
    }
}

fn ensure_finite(points: &[ScreenPoint], pool: &'static str) -> Result<(), SceneError> {
    match points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
        Some(slot) => Err(SceneError::NonFinite { pool, slot }),
        None => Ok(()),
    }
}

pub(crate) struct Renderer {
    building_order: Vec<(f32, usize)>,
    traffic_order: Vec<(f32, usize)>,
    flying_order: Vec<(f32, usize)>,
}

impl Renderer {
    pub(crate) fn new(scene: &Scene) -> Self {
        Self {
            building_order: Vec::with_capacity(scene.buildings.capacity()),
            traffic_order: Vec::with_capacity(scene.traffic.capacity()),
            flying_order: Vec::with_capacity(scene.flying.capacity()),
        }
    }

    // Draws one frame back to front. Returns the optional passes that were
    // skipped and why; the core passes always run.
    pub(crate) fn render(
        &mut self,
        surface: &mut dyn Surface,
        scene: &Scene,
        now: f64,
    ) -> Vec<(Pass, SceneError)> {
        let mut skipped = Vec::new();
        let Some(vp) = scene.viewport else {
            return skipped;
        };
        let view = View {
            proj: &scene.projector,
            vp,
            pal: scene.colors.palette(),
            cam_x: scene.camera.lateral_offset(),
            roll: scene.camera.roll(),
            pivot: scene.projector.pivot(),
            time: scene.time as f32,
        };

        self.sky(surface, &view, scene);
        self.road(surface, &view, scene);
        if scene.settings.reflections_enabled {
            if let Err(e) = self.reflections(surface, &view, scene) {
                skipped.push((Pass::Reflections, e));
            }
        }
        self.buildings(surface, &view, scene);
        self.steam(surface, &view, scene);
        self.traffic(surface, &view, scene);
        self.flying(surface, &view, scene);

        if scene.weather.rain_enabled() {
            if let Err(e) = self.rain(surface, &view, scene) {
                skipped.push((Pass::Rain, e));
            }
        }
        if let Err(e) = self.fog(surface, &view, scene) {
            skipped.push((Pass::Fog, e));
        }
        if scene.boost.is_active() {
            if let Err(e) = self.boost(surface, &view, scene, now) {
                skipped.push((Pass::Boost, e));
            }
        }
        if let Err(e) = self.lightning(surface, &view, scene, now) {
            skipped.push((Pass::Lightning, e));
        }
        if scene.show_hud {
            if let Err(e) = self.hud(surface, &view, scene) {
                skipped.push((Pass::Hud, e));
            }
        }
        skipped
    }

    /* -----------------------------
       Background
    ------------------------------ */

    fn sky(&self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        s.clear(v.pal.sky_top);
        let hy = v.proj.horizon_y();
        let top = -v.vp.height;
        for i in 0..SKY_BANDS {
            let t0 = i as f32 / SKY_BANDS as f32;
            let t1 = (i + 1) as f32 / SKY_BANDS as f32;
            let c = v.pal.sky_top.lerp(v.pal.sky_bottom, t1 * t1);
            s.fill_polygon(&v.band(lerp(top, hy, t0), lerp(top, hy, t1)), Paint::solid(c));
        }

        let budget = scene.lod.particle_budget(scene.stars.live());
        for star in scene.stars.active().iter().take(budget) {
            let tw = 0.6 + 0.4 * star.twinkle.sin();
            let p = v.s(star.x, star.y);
            s.circle(p, 0.6, Paint::solid(Rgb::WHITE).alpha(star.brightness * tw));
        }

        for c in scene.clouds.active() {
            let paint = Paint::solid(v.pal.fog.lerp(v.pal.accent, 0.2))
                .alpha(c.alpha)
                .glow(c.radius * 0.5);
            s.circle(v.s(c.x, c.y), c.radius, paint);
            s.circle(v.s(c.x + c.radius * 0.9, c.y + c.radius * 0.2), c.radius * 0.7, paint);
            s.circle(v.s(c.x - c.radius * 0.9, c.y + c.radius * 0.25), c.radius * 0.6, paint);
        }

        // horizon glow
        let glow = Paint::solid(v.pal.accent_glow).alpha(0.7).glow(6.0);
        s.line(v.s(-v.vp.width, hy), v.s(v.vp.width * 2.0, hy), glow);
    }

    fn road(&self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        let hy = v.proj.horizon_y();
        s.fill_polygon(&v.band(hy, v.vp.height * 3.0), Paint::solid(v.pal.road));

        let far = FAR_Z;
        let surface = [
            v.p(-ROAD_HALF_WIDTH, 0.0, NEAR_Z),
            v.p(ROAD_HALF_WIDTH, 0.0, NEAR_Z),
            v.p(ROAD_HALF_WIDTH, 0.0, far),
            v.p(-ROAD_HALF_WIDTH, 0.0, far),
        ];
        s.fill_polygon(&surface, Paint::solid(v.pal.road.scale(1.8)));

        // neon side grid
        let grid = Paint::solid(v.pal.accent).alpha(0.25);
        for k in 1..=5 {
            let x = ROAD_HALF_WIDTH + k as f32 * 120.0;
            for side in [-1.0f32, 1.0] {
                s.line(v.p(side * x, 0.0, NEAR_Z), v.p(side * x, 0.0, far), grid);
            }
        }
        let scroll = scene.road_scroll.rem_euclid(GRID_PERIOD);
        let mut z = GRID_PERIOD - scroll;
        while z < far {
            let a = grid.alpha(0.25 * v.fade(z));
            for side in [-1.0f32, 1.0] {
                s.line(
                    v.p(side * ROAD_HALF_WIDTH, 0.0, z),
                    v.p(side * (ROAD_HALF_WIDTH + 600.0), 0.0, z),
                    a,
                );
            }
            z += GRID_PERIOD;
        }

        let edge = Paint::solid(v.pal.accent_glow).alpha(0.9).glow(2.0);
        for side in [-1.0f32, 1.0] {
            s.line(
                v.p(side * ROAD_HALF_WIDTH, 0.0, NEAR_Z),
                v.p(side * ROAD_HALF_WIDTH, 0.0, far),
                edge,
            );
        }

        let dash_scroll = scene.road_scroll.rem_euclid(DASH_PERIOD);
        for lane in 1..LANES {
            let x = lane_x(lane) - LANE_WIDTH * 0.5;
            let mut z = -dash_scroll;
            while z < far * 0.6 {
                let z1 = z + DASH_LENGTH;
                if z1 > NEAR_Z {
                    let paint = Paint::solid(Rgb::WHITE).alpha(0.7 * v.fade(z));
                    s.line(v.p(x, 0.0, z.max(NEAR_Z)), v.p(x, 0.0, z1), paint);
                }
                z += DASH_PERIOD;
            }
        }
    }

    fn reflections(&self, s: &mut dyn Surface, v: &View, scene: &Scene) -> Result<(), SceneError> {
        let wet = if scene.weather.rain_enabled() { 1.0 } else { 0.5 };
        for (_, car) in scene.traffic.for_each_visible(&scene.camera) {
            if car.z > 1200.0 {
                continue;
            }
            let a = v.p(car.x(), 0.0, car.z);
            let b = v.p(car.x(), 0.0, (car.z - 80.0).max(NEAR_Z));
            ensure_finite(&[a, b], "reflection")?;
            let c = if car.emergency && !car.strobe_red(v.time) {
                Rgb::new(60, 120, 255)
            } else {
                Rgb::new(255, 40, 50)
            };
            s.line(a, b, Paint::solid(c).alpha(0.3 * wet * v.fade(car.z)).glow(2.0));
        }
        for b in scene.buildings.for_each_visible(&scene.camera) {
            let Some(sign) = b.sign else { continue };
            if !scene.lod.decorations_visible(b.z) || b.z < NEAR_Z {
                continue;
            }
            let x = b.inner_x() - b.side * 20.0;
            let p0 = v.p(x, 0.0, b.z);
            let p1 = v.p(x, 0.0, (b.z - 60.0).max(NEAR_Z));
            ensure_finite(&[p0, p1], "reflection")?;
            let c = hsv_to_rgb(sign.hue, 0.8, 1.0);
            s.line(p0, p1, Paint::solid(c).alpha(0.18 * wet * v.fade(b.z)).glow(3.0));
        }
        Ok(())
    }

    /* -----------------------------
       Buildings (painter's order)
    ------------------------------ */

    fn buildings(&mut self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        self.building_order.clear();
        self.building_order.extend(
            scene
                .buildings
                .for_each_visible(&scene.camera)
                .map(|b| (b.depth_key(), b.id as usize)),
        );
        self.building_order.sort_by(|a, b| b.0.total_cmp(&a.0));
        for &(_, i) in &self.building_order {
            if let Some(b) = scene.buildings.get(i) {
                draw_building(s, v, b, &scene.lod);
            }
        }
    }

    fn steam(&self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        let base = Paint::solid(v.pal.fog.lerp(Rgb::WHITE, 0.3));
        for puff in scene.steam.alive() {
            let life = puff.life();
            let scale = v.proj.scale_at(puff.pos.z);
            let r = (6.0 + life * 18.0) * scale;
            s.circle(v.wp(puff.pos), r, base.alpha(0.25 * (1.0 - life)).glow(r * 0.5));
        }
    }

    /* -----------------------------
       Vehicles
    ------------------------------ */

    fn traffic(&mut self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        self.traffic_order.clear();
        self.traffic_order.extend(
            scene
                .traffic
                .for_each_visible(&scene.camera)
                .map(|(i, c)| (c.z, i)),
        );
        self.traffic_order.sort_by(|a, b| b.0.total_cmp(&a.0));

        for &(_, i) in &self.traffic_order {
            let Some(car) = scene.traffic.get(i) else {
                continue;
            };
            let x = car.x();
            let z = car.z;
            let fade = v.fade(z);
            let scale = v.proj.scale_at(z);
            let body = Paint::solid(car.color.scale(0.35 + 0.65 * fade));
            s.fill_polygon(
                &[v.p(x - 18.0, 2.0, z), v.p(x + 18.0, 2.0, z), v.p(x + 18.0, 16.0, z), v.p(x - 18.0, 16.0, z)],
                body,
            );
            s.fill_polygon(
                &[v.p(x - 13.0, 16.0, z + 8.0), v.p(x + 13.0, 16.0, z + 8.0), v.p(x + 13.0, 26.0, z + 8.0), v.p(x - 13.0, 26.0, z + 8.0)],
                Paint::solid(car.color.scale(0.25 + 0.5 * fade)),
            );
            let tail = Paint::solid(Rgb::new(255, 40, 50)).alpha(fade).glow((scale * 6.0).min(8.0));
            let r = (scale * 3.0).max(0.7);
            s.circle(v.p(x - 13.0, 9.0, z), r, tail);
            s.circle(v.p(x + 13.0, 9.0, z), r, tail);

            if car.emergency {
                let red = car.strobe_red(v.time);
                let (lx, c) = if red {
                    (x - 6.0, Rgb::new(255, 30, 40))
                } else {
                    (x + 6.0, Rgb::new(40, 110, 255))
                };
                let strobe = Paint::solid(c).glow((scale * 14.0).min(16.0));
                s.circle(v.p(lx, 28.0, z + 8.0), (scale * 4.0).max(0.8), strobe);
            }
        }
    }

    fn flying(&mut self, s: &mut dyn Surface, v: &View, scene: &Scene) {
        self.flying_order.clear();
        self.flying_order.extend(
            scene
                .flying
                .for_each_visible(&scene.camera)
                .map(|(i, f)| (f.z, i)),
        );
        self.flying_order.sort_by(|a, b| b.0.total_cmp(&a.0));

        for &(_, i) in &self.flying_order {
            let Some(f) = scene.flying.get(i) else {
                continue;
            };
            let (x, y, z) = (f.x, f.y(), f.z);
            let fade = v.fade(z);
            let scale = v.proj.scale_at(z);
            let hull = [
                v.p(x - 16.0, y, z),
                v.p(x - 8.0, y + 5.0, z),
                v.p(x + 8.0, y + 5.0, z),
                v.p(x + 16.0, y, z),
                v.p(x + 8.0, y - 4.0, z),
                v.p(x - 8.0, y - 4.0, z),
            ];
            s.fill_polygon(&hull, Paint::solid(f.color.scale(0.3 + 0.7 * fade)));
            s.circle(
                v.p(x, y - 6.0, z),
                (scale * 5.0).max(0.8),
                Paint::solid(v.pal.accent).alpha(0.5 * fade).glow((scale * 10.0).min(12.0)),
            );
            if (v.time * 2.0 + z * 0.01).fract() < 0.15 {
                s.circle(
                    v.p(x + 16.0, y, z),
                    (scale * 2.0).max(0.6),
                    Paint::solid(Rgb::WHITE).glow(3.0),
                );
            }
        }
    }

    /* -----------------------------
       Overlays
    ------------------------------ */

    fn rain(&self, s: &mut dyn Surface, v: &View, scene: &Scene) -> Result<(), SceneError> {
        if scene.rain.live() > scene.rain.capacity() {
            return Err(SceneError::PoolOverflow {
                pool: "rain",
                live: scene.rain.live(),
                capacity: scene.rain.capacity(),
            });
        }
        let paint = Paint::solid(v.pal.accent_glow.lerp(Rgb::WHITE, 0.5)).alpha(0.35);
        let slant = scene.rain_wind * 0.015;
        let budget = scene.lod.particle_budget(scene.rain.live());
        for d in scene.rain.active().iter().take(budget) {
            let a = ScreenPoint::new(d.x, d.y);
            let b = ScreenPoint::new(d.x - slant, d.y - d.length);
            ensure_finite(&[a, b], "rain")?;
            s.line(a, b, paint);
        }
        Ok(())
    }

    fn fog(&self, s: &mut dyn Surface, v: &View, scene: &Scene) -> Result<(), SceneError> {
        let density = scene.weather.fog_density();
        if !density.is_finite() {
            return Err(SceneError::NonFinite { pool: "fog", slot: 0 });
        }
        let hy = v.proj.horizon_y();
        let bh = v.vp.height * 0.04;
        let paint = Paint::solid(v.pal.fog).alpha(density * 0.08);
        for i in 0..5 {
            let k = (i + 1) as f32;
            s.fill_polygon(&v.band(hy - k * bh, hy + k * bh * 0.6), paint);
        }
        Ok(())
    }

    fn boost(&self, s: &mut dyn Surface, v: &View, scene: &Scene, now: f64) -> Result<(), SceneError> {
        let k = scene.boost.intensity(now);
        if !k.is_finite() {
            return Err(SceneError::NonFinite { pool: "boost", slot: 0 });
        }
        if k <= 0.0 {
            return Ok(());
        }
        let (w, h) = (v.vp.width, v.vp.height);
        let t = w.min(h) * 0.12;
        let dark = Paint::solid(Rgb::BLACK).alpha(0.45 * k).glow(t * 0.5);
        let sp = ScreenPoint::new;
        s.fill_polygon(&[sp(0.0, 0.0), sp(w, 0.0), sp(w, t), sp(0.0, t)], dark);
        s.fill_polygon(&[sp(0.0, h - t), sp(w, h - t), sp(w, h), sp(0.0, h)], dark);
        s.fill_polygon(&[sp(0.0, 0.0), sp(t, 0.0), sp(t, h), sp(0.0, h)], dark);
        s.fill_polygon(&[sp(w - t, 0.0), sp(w, 0.0), sp(w, h), sp(w - t, h)], dark);

        if scene.settings.speed_lines_enabled {
            let max_r = (w * w + h * h).sqrt() * 0.5;
            let paint = Paint::solid(Rgb::WHITE).alpha(0.5 * k);
            for i in 0..SPEED_LINES {
                let angle = hash01(i, 0, 0) * TAU;
                let r0 = (hash01(i, 1, 0) + v.time * 1.8).fract() * max_r;
                if r0 < max_r * 0.2 {
                    continue;
                }
                let (dy, dx) = angle.sin_cos();
                let len = max_r * 0.18 * k;
                let a = ScreenPoint::new(v.pivot.x + dx * r0, v.pivot.y + dy * r0);
                let b = ScreenPoint::new(v.pivot.x + dx * (r0 + len), v.pivot.y + dy * (r0 + len));
                s.line(a, b, paint);
            }
        }
        Ok(())
    }

    fn lightning(&self, s: &mut dyn Surface, v: &View, scene: &Scene, now: f64) -> Result<(), SceneError> {
        if let Lightning::Idle { .. } = scene.weather.lightning() {
            return Ok(());
        }
        let (flash, bolt_alpha) = scene.weather.flash(now);
        if bolt_alpha <= 0.0 {
            return Ok(());
        }
        let bolt = scene.weather.bolt();
        let (w, h) = (v.vp.width, v.vp.height);
        let color = v.pal.accent_glow.lerp(Rgb::WHITE, 0.7);
        for (i, (a, b)) in bolt.segments.iter().enumerate() {
            let a = ScreenPoint::new(a.x * w, a.y * h);
            let b = ScreenPoint::new(b.x * w, b.y * h);
            ensure_finite(&[a, b], "bolt")?;
            let paint = if i < bolt.main_len {
                Paint::solid(color).alpha(bolt_alpha).glow(4.0)
            } else {
                Paint::solid(color).alpha(bolt_alpha * 0.6).glow(2.0)
            };
            s.line(a, b, paint);
        }
        if flash > 0.0 {
            s.fill_polygon(&v.full_screen(), Paint::solid(Rgb::WHITE).alpha(flash));
        }
        Ok(())
    }

    fn hud(&self, s: &mut dyn Surface, v: &View, scene: &Scene) -> Result<(), SceneError> {
        let boost = match scene.boost.state() {
            BoostState::Idle => "ready",
            BoostState::Active { .. } => "BOOST",
            BoostState::Cooldown { .. } => "cooling",
        };
        let line = format!(
            "citydrive  {:>4.0} u/s  {boost}  {:>3.0} fps  lod {:.2}  zoom {:.2}  {}",
            scene.global_speed,
            scene.fps_estimate,
            scene.lod.bias(),
            scene.camera.zoom(),
            if scene.weather.rain_enabled() { "rain" } else { "clear" },
        );
        let paint = Paint::solid(Rgb::new(210, 210, 210));
        s.text(ScreenPoint::new(0.0, 0.0), &line, paint);
        s.text(
            ScreenPoint::new(0.0, v.vp.height - 4.0),
            "space/click boost  w weather  r reflections  s speed lines  +/- density  h hud  q quit",
            Paint::solid(Rgb::new(150, 150, 150)),
        );
        Ok(())
    }
}

fn draw_building(s: &mut dyn Surface, v: &View, b: &Building, lod: &LodManager) {
    let z0 = b.z.max(NEAR_Z);
    let z1 = b.z + b.depth;
    if z1 <= z0 {
        return;
    }
    let (xi, xo, h) = (b.inner_x(), b.outer_x(), b.height);
    let fade = v.fade(z0);
    let fill = v.pal.building_fill.lerp(v.pal.sky_bottom, (1.0 - fade) * 0.6);

    let side = [v.p(xi, 0.0, z0), v.p(xi, 0.0, z1), v.p(xi, h, z1), v.p(xi, h, z0)];
    s.fill_polygon(&side, Paint::solid(fill.scale(0.75)));
    let front = [v.p(xi, 0.0, z0), v.p(xo, 0.0, z0), v.p(xo, h, z0), v.p(xi, h, z0)];
    s.fill_polygon(&front, Paint::solid(fill));

    let edge = Paint::solid(v.pal.building_edge).alpha(0.85 * fade);
    s.line(front[3], front[2], edge);
    if LodManager::level(b.z) != LodLevel::Far {
        s.line(front[0], front[3], edge);
        s.line(side[3], side[2], edge.alpha(0.6 * fade));
        s.line(side[1], side[2], edge.alpha(0.5 * fade));
    }

    if b.z < NEAR_Z {
        return;
    }
    let ratio = lod.detail_ratio(b.z);
    if ratio > 0.0 {
        draw_windows(s, v, b, ratio, fade);
    }
    if lod.decorations_visible(b.z) {
        draw_rooftop(s, v, b, fade);
        draw_billboard(s, v, b, fade);
        draw_sign(s, v, b, fade);
        draw_searchlight(s, v, b);
    }
}

fn draw_windows(s: &mut dyn Surface, v: &View, b: &Building, ratio: f32, fade: f32) {
    let (xi, xo, z) = (b.inner_x(), b.outer_x(), b.z);
    let floor0 = 8.0;
    let floor_h = (b.height - 18.0) / b.rows as f32;
    let tint = match b.kind {
        crate::pools::BuildingKind::Commercial => v.pal.window_lit.lerp(v.pal.secondary, 0.3),
        _ => v.pal.window_lit,
    };
    for row in 0..b.rows {
        let y0 = floor0 + row as f32 * floor_h + floor_h * 0.2;
        let y1 = y0 + floor_h * 0.55;
        for col in 0..b.cols {
            let Some(cell) = b.window(col, row) else { continue };
            if !cell.lit {
                continue;
            }
            let idx = (row * b.cols + col) as u32;
            if !LodManager::draws_cell(ratio, b.id, idx, v.time) {
                continue;
            }
            let u0 = 0.1 + 0.8 * (col as f32 + 0.2) / b.cols as f32;
            let u1 = 0.1 + 0.8 * (col as f32 + 0.8) / b.cols as f32;
            let (x0, x1) = (lerp(xi, xo, u0), lerp(xi, xo, u1));
            let bright = 0.75 + 0.25 * (v.time * 3.0 + cell.flicker_phase).sin();
            let quad = [v.p(x0, y0, z), v.p(x1, y0, z), v.p(x1, y1, z), v.p(x0, y1, z)];
            s.fill_polygon(&quad, Paint::solid(tint.scale(bright)).alpha(fade));
        }
    }
}

fn draw_rooftop(s: &mut dyn Surface, v: &View, b: &Building, fade: f32) {
    let Some(kind) = b.rooftop else { return };
    let (cx, h) = (b.x, b.height);
    let zc = b.z + b.depth * 0.5;
    let scale = v.proj.scale_at(zc);
    let edge = Paint::solid(v.pal.building_edge).alpha(0.8 * fade);
    match kind {
        RooftopKind::Antenna => {
            let top = v.p(cx, h + 40.0, zc);
            s.line(v.p(cx, h, zc), top, edge);
            if (v.time * 1.5 + b.id as f32 * 0.37).fract() < 0.5 {
                s.circle(top, (scale * 2.5).max(0.6), Paint::solid(Rgb::new(255, 40, 40)).glow(4.0));
            }
        }
        RooftopKind::WaterTower => {
            let z = b.z + b.depth * 0.3;
            let tank = [v.p(cx - 10.0, h + 10.0, z), v.p(cx + 10.0, h + 10.0, z), v.p(cx + 10.0, h + 24.0, z), v.p(cx - 10.0, h + 24.0, z)];
            s.fill_polygon(&tank, Paint::solid(v.pal.building_fill.scale(1.6)));
            s.line(v.p(cx - 8.0, h, z), tank[0], edge);
            s.line(v.p(cx + 8.0, h, z), tank[1], edge);
        }
        RooftopKind::Vent => {
            let vent = [v.p(cx - 8.0, h, zc), v.p(cx + 8.0, h, zc), v.p(cx + 8.0, h + 6.0, zc), v.p(cx - 8.0, h + 6.0, zc)];
            s.fill_polygon(&vent, Paint::solid(v.pal.building_fill.scale(1.4)));
        }
        RooftopKind::Helipad => {
            s.circle(
                v.p(cx, h, zc),
                (scale * 18.0).max(1.0),
                Paint::solid(v.pal.accent).alpha(0.35 * fade).glow(3.0),
            );
        }
    }
}

fn draw_billboard(s: &mut dyn Surface, v: &View, b: &Building, fade: f32) {
    let Some(board) = b.billboard else { return };
    let (xi, xo, z) = (b.inner_x(), b.outer_x(), b.z);
    let (y0, y1) = (b.height * 0.55, b.height * 0.75);
    let base = hsv_to_rgb(board.hue, 0.7, 0.9);
    let alt = hsv_to_rgb(board.hue + 0.5, 0.7, 0.9);
    let quad = |u0: f32, u1: f32, v0: f32, v1: f32| {
        let (x0, x1) = (lerp(xi, xo, 0.15 + 0.7 * u0), lerp(xi, xo, 0.15 + 0.7 * u1));
        let (ya, yb) = (lerp(y0, y1, v0), lerp(y0, y1, v1));
        [v.p(x0, ya, z), v.p(x1, ya, z), v.p(x1, yb, z), v.p(x0, yb, z)]
    };
    let shift = (board.phase / TAU * 4.0) as i64;
    match board.pattern {
        BillboardPattern::Stripes => {
            for i in 0..6 {
                let c = if (i + shift).rem_euclid(2) == 0 { base } else { alt };
                let u = i as f32 / 6.0;
                s.fill_polygon(&quad(u, u + 1.0 / 6.0, 0.0, 1.0), Paint::solid(c).alpha(0.8 * fade));
            }
        }
        BillboardPattern::Checker => {
            for gy in 0..3i64 {
                for gx in 0..4i64 {
                    let c = if (gx + gy + shift).rem_euclid(2) == 0 { base } else { alt };
                    let (u, w) = (gx as f32 / 4.0, gy as f32 / 3.0);
                    s.fill_polygon(&quad(u, u + 0.25, w, w + 1.0 / 3.0), Paint::solid(c).alpha(0.8 * fade));
                }
            }
        }
        BillboardPattern::Pulse => {
            let a = 0.4 + 0.4 * board.phase.sin();
            s.fill_polygon(&quad(0.0, 1.0, 0.0, 1.0), Paint::solid(base).alpha(a * fade).glow(3.0));
        }
        BillboardPattern::Scanline => {
            s.fill_polygon(&quad(0.0, 1.0, 0.0, 1.0), Paint::solid(base.scale(0.35)).alpha(0.8 * fade));
            let t = (board.phase * 0.2).fract();
            s.fill_polygon(&quad(0.0, 1.0, t, (t + 0.12).min(1.0)), Paint::solid(alt).alpha(fade).glow(2.0));
        }
    }
}

fn draw_sign(s: &mut dyn Surface, v: &View, b: &Building, fade: f32) {
    let Some(sign) = b.sign else { return };
    let (xi, xo, z) = (b.inner_x(), b.outer_x(), b.z);
    let c = hsv_to_rgb(sign.hue, 0.8, 1.0);
    let (y0, y1) = (b.height * 0.82, b.height * 0.92);
    let (x0, x1) = (lerp(xi, xo, 0.2), lerp(xi, xo, 0.8));
    let corners = [v.p(x0, y0, z), v.p(x1, y0, z), v.p(x1, y1, z), v.p(x0, y1, z)];
    let paint = Paint::solid(c).alpha(fade).glow(3.0);
    for i in 0..4 {
        s.line(corners[i], corners[(i + 1) % 4], paint);
    }
    let width_px = corners[0].dist(corners[1]);
    // surface cells are ~2px wide per glyph in the coarsest host
    if width_px > sign.text.len() as f32 * 2.5 {
        let mid = corners[0].lerp(corners[2], 0.5);
        let at = ScreenPoint::new(mid.x - sign.text.len() as f32, mid.y);
        s.text(at, sign.text, paint);
    }
}

fn draw_searchlight(s: &mut dyn Surface, v: &View, b: &Building) {
    let Some(light) = b.searchlight else { return };
    let (x, h) = (b.x, b.height);
    let zc = b.z + b.depth * 0.5;
    let sweep = light.angle.sin() * 0.6;
    let (sx, cy) = sweep.sin_cos();
    let len = 900.0;
    let half = 60.0;
    let (tx, ty) = (x + sx * len, h + cy * len);
    let beam = [
        v.p(x, h, zc),
        v.p(tx + cy * half, ty - sx * half, zc),
        v.p(tx - cy * half, ty + sx * half, zc),
    ];
    s.fill_polygon(&beam, Paint::solid(v.pal.accent_glow).alpha(0.1).glow(4.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::scene::PoolSizes;
    use crate::surface::testing::{DrawCall, RecordingSurface};

    fn scene() -> Scene {
        let settings = Settings {
            seed: 77,
            ..Settings::default()
        };
        Scene::new(settings, PoolSizes::default(), Viewport::new(1920.0, 1080.0, 1.0), 0.0)
    }

    #[test]
    fn renders_something_and_skips_nothing() {
        let scene = scene();
        let mut r = Renderer::new(&scene);
        let mut surface = RecordingSurface::default();
        let skipped = r.render(&mut surface, &scene, 0.0);
        assert!(skipped.is_empty());
        assert_eq!(surface.calls.first(), Some(&DrawCall::Clear));
        assert!(surface.draws() > 100);
    }

    #[test]
    fn buildings_are_ordered_back_to_front() {
        let scene = scene();
        let mut r = Renderer::new(&scene);
        let mut surface = RecordingSurface::default();
        r.render(&mut surface, &scene, 0.0);
        let keys: Vec<f32> = r.building_order.iter().map(|(k, _)| *k).collect();
        assert!(!keys.is_empty());
        assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn nothing_drawn_without_viewport() {
        let mut scene = scene();
        scene.viewport = None;
        let mut r = Renderer::new(&scene);
        let mut surface = RecordingSurface::default();
        assert!(r.render(&mut surface, &scene, 0.0).is_empty());
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn hud_text_when_enabled() {
        let mut scene = scene();
        scene.show_hud = true;
        let mut r = Renderer::new(&scene);
        let mut surface = RecordingSurface::default();
        r.render(&mut surface, &scene, 0.0);
        assert!(surface
            .calls
            .iter()
            .any(|c| matches!(c, DrawCall::Text(t) if t.starts_with("citydrive"))));
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let pts = [ScreenPoint::new(0.0, 0.0), ScreenPoint::new(f32::NAN, 1.0)];
        match ensure_finite(&pts, "x") {
            Err(SceneError::NonFinite { slot, .. }) => assert_eq!(slot, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
