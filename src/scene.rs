use rand::{rngs::SmallRng, SeedableRng};

use crate::camera::Camera;
use crate::color::ColorCache;
use crate::config::Settings;
use crate::effects::boost::BOOST_SPEED_FACTOR;
use crate::effects::{Boost, Turning, WeatherState};
use crate::error::SceneError;
use crate::input::{tilt_to_parallax, Gesture, InputEvent, TouchGestures};
use crate::lod::{LodManager, DECORATION_RANGE};
use crate::math::approach;
use crate::pools::{
    BuildingPool, CloudLayer, FlyingPool, ParticleBounds, Pool, RainField, StarField, SteamPool,
    TrafficPool,
};
use crate::projector::{Projector, Viewport};
use crate::render::Renderer;
use crate::surface::{Clock, Listener, Listeners, Surface};

pub(crate) const BASE_SPEED: f32 = 260.0;
// Longest step the simulation takes; a stalled host does not teleport entities.
const MAX_DT: f64 = 0.1;
const PULSE_AMPLITUDE: f32 = 0.04;
const PULSE_RATE: f32 = 0.9;
const RAIN_WIND: f32 = 40.0;

#[derive(Clone, Copy, Debug)]
pub(crate) struct PoolSizes {
    pub(crate) buildings: usize,
    pub(crate) traffic: usize,
    pub(crate) emergency: usize,
    pub(crate) flying: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            buildings: 26,
            traffic: 12,
            emergency: 3,
            flying: 6,
        }
    }
}

fn bounds_for(vp: Option<Viewport>, proj: &Projector) -> ParticleBounds {
    match vp {
        Some(vp) => ParticleBounds {
            width: vp.width,
            height: vp.height,
            horizon: proj.horizon_y(),
        },
        None => ParticleBounds {
            width: 1.0,
            height: 1.0,
            horizon: 1.0,
        },
    }
}

pub(crate) struct Scene {
    pub(crate) settings: Settings,
    pub(crate) rng: SmallRng,
    pub(crate) time: f64,
    pub(crate) viewport: Option<Viewport>,
    pub(crate) projector: Projector,
    pub(crate) camera: Camera,
    pub(crate) colors: ColorCache,
    pub(crate) lod: LodManager,
    pub(crate) boost: Boost,
    pub(crate) turning: Turning,
    pub(crate) weather: WeatherState,
    pub(crate) buildings: BuildingPool,
    pub(crate) traffic: TrafficPool,
    pub(crate) flying: FlyingPool,
    pub(crate) stars: StarField,
    pub(crate) rain: RainField,
    pub(crate) clouds: CloudLayer,
    pub(crate) steam: SteamPool,
    pub(crate) global_speed: f32,
    pub(crate) road_scroll: f32,
    pub(crate) rain_wind: f32,
    pub(crate) fps_estimate: f32,
    pub(crate) show_hud: bool,
}

impl Scene {
    pub(crate) fn new(settings: Settings, sizes: PoolSizes, viewport: Option<Viewport>, now: f64) -> Self {
        let settings = settings.sanitized();
        let mut rng = if settings.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(settings.seed)
        };
        let projector = viewport
            .as_ref()
            .map(Projector::for_viewport)
            .unwrap_or_else(|| Projector::for_viewport(&Viewport { width: 1.0, height: 1.0, dpr: 1.0 }));
        let bounds = bounds_for(viewport, &projector);
        let density = settings.particle_density;

        let buildings = BuildingPool::new(sizes.buildings, &mut rng);
        let traffic = TrafficPool::new(sizes.traffic, sizes.emergency, &mut rng);
        let flying = FlyingPool::new(sizes.flying, &mut rng);
        let stars = StarField::new(density, bounds, &mut rng);
        let rain = RainField::new(density, bounds, &mut rng);
        let clouds = CloudLayer::new(density, bounds, &mut rng);
        let turning = Turning::new(now, &mut rng);
        let weather = WeatherState::new(settings.weather_enabled, now, &mut rng);

        log::info!(
            "scene: {} buildings, {} vehicles ({} emergency), {} flyers, seed {}",
            sizes.buildings,
            sizes.traffic,
            sizes.emergency,
            sizes.flying,
            settings.seed
        );

        Self {
            rng,
            time: 0.0,
            viewport,
            projector,
            camera: Camera::new(),
            colors: ColorCache::new(),
            lod: LodManager::new(),
            boost: Boost::new(),
            turning,
            weather,
            buildings,
            traffic,
            flying,
            stars,
            rain,
            clouds,
            steam: SteamPool::new(density),
            global_speed: BASE_SPEED,
            road_scroll: 0.0,
            rain_wind: -RAIN_WIND,
            fps_estimate: 0.0,
            show_hud: false,
            settings,
        }
    }

    pub(crate) fn step(&mut self, now: f64, dt: f32) {
        self.time += dt as f64;
        let t = self.time as f32;

        if let Err(e) = self.colors.refresh(now, &self.settings.accent) {
            log::warn!("palette refresh kept previous colours: {e}");
        }

        self.boost.advance(now);
        self.turning.advance(now, dt, &mut self.rng);
        self.weather.advance(now, dt, &mut self.rng);

        let pulse = 1.0 + PULSE_AMPLITUDE * (PULSE_RATE * t).sin();
        self.global_speed = BASE_SPEED * pulse * self.boost.speed_factor();

        let before_x = self.camera.lateral_offset();
        self.camera.update(dt, self.turning.offset(), self.turning.roll());
        if let Some(vp) = self.viewport {
            self.camera.apply(&mut self.projector, &vp);
        }
        // world units at the far plane to surface pixels
        let shift_px = (self.camera.lateral_offset() - before_x) * self.projector.focal * 0.002;

        let speed = self.global_speed;
        self.road_scroll = (self.road_scroll + speed * dt).rem_euclid(240.0);
        self.buildings.update(dt, speed, &mut self.rng);
        self.traffic.update(dt, speed, &mut self.rng);
        self.flying.update(dt, speed, &mut self.rng);

        self.stars.update(dt, shift_px, &mut self.rng);
        self.clouds.update(dt, shift_px, &mut self.rng);
        if self.weather.rain_enabled() {
            self.rain_wind = -RAIN_WIND - self.camera.turn_offset() * 0.8;
            // fall speed ramps with the visuals, not the hard speed switch
            let fall = 1.0 + (BOOST_SPEED_FACTOR - 1.0) * self.boost.intensity(now);
            self.rain.update(dt, self.rain_wind, fall, &mut self.rng);
        }
        self.steam.update(dt, speed);
        self.steam
            .emit_from(self.buildings.vents(), DECORATION_RANGE, dt, &mut self.rng);
    }

    pub(crate) fn check_pools(&mut self) -> Result<(), SceneError> {
        let buildings = self.buildings.sanitize(&mut self.rng);
        let traffic = self.traffic.sanitize(&mut self.rng);
        let flying = self.flying.sanitize(&mut self.rng);
        buildings.and(traffic).and(flying)?;
        check_capacity(&self.stars)?;
        check_capacity(&self.rain)?;
        check_capacity(&self.clouds)?;
        check_capacity(&self.steam)?;
        Ok(())
    }

    pub(crate) fn set_viewport(&mut self, vp: Option<Viewport>) {
        self.viewport = vp;
        if let Some(vp) = vp {
            self.projector = Projector::for_viewport(&vp);
            self.camera.apply(&mut self.projector, &vp);
        }
        let bounds = bounds_for(vp, &self.projector);
        self.stars.set_bounds(bounds);
        self.rain.set_bounds(bounds);
        self.clouds.set_bounds(bounds);
    }

    pub(crate) fn apply_settings(&mut self, settings: Settings) {
        let settings = settings.sanitized();
        if settings.seed != self.settings.seed {
            log::debug!("seed changes only apply at start");
        }
        let d = settings.particle_density;
        self.stars.set_density(d);
        self.rain.set_density(d);
        self.clouds.set_density(d);
        self.steam.set_density(d);
        self.weather.set_rain(settings.weather_enabled);
        self.settings = settings;
    }
}

fn check_capacity<P: Pool>(pool: &P) -> Result<(), SceneError> {
    if pool.live() > pool.capacity() {
        return Err(SceneError::PoolOverflow {
            pool: P::NAME,
            live: pool.live(),
            capacity: pool.capacity(),
        });
    }
    Ok(())
}

pub(crate) struct Driver<S: Surface, C: Clock, L: Listeners> {
    scene: Scene,
    renderer: Renderer,
    surface: Option<S>,
    clock: C,
    listeners: L,
    attached: Vec<Listener>,
    gestures: TouchGestures,
    running: bool,
    last_tick: Option<f64>,
    pending: f64,
    frames: u64,
}

impl<S: Surface, C: Clock, L: Listeners> Driver<S, C, L> {
    pub(crate) fn new(
        settings: Settings,
        sizes: PoolSizes,
        surface: Option<S>,
        viewport: Option<Viewport>,
        clock: C,
        listeners: L,
    ) -> Self {
        if surface.is_none() {
            log::warn!("no drawing surface, running headless");
        }
        let scene = Scene::new(settings, sizes, viewport, clock.now());
        let renderer = Renderer::new(&scene);
        Self {
            scene,
            renderer,
            surface,
            clock,
            listeners,
            attached: Vec::with_capacity(Listener::ALL.len()),
            gestures: TouchGestures::default(),
            running: false,
            last_tick: None,
            pending: 0.0,
            frames: 0,
        }
    }

    pub(crate) fn start(&mut self) {
        if self.running {
            return;
        }
        for l in Listener::ALL {
            if self.listeners.attach(l) {
                self.attached.push(l);
            } else {
                log::debug!("{l:?} input unsupported here, skipping");
            }
        }
        self.running = true;
        self.last_tick = Some(self.clock.now());
        self.pending = 0.0;
        self.clock.request_tick();
    }

    pub(crate) fn stop(&mut self) {
        if !self.running && self.attached.is_empty() {
            return;
        }
        self.running = false;
        for l in self.attached.drain(..) {
            self.listeners.detach(l);
        }
        log::info!("stopped after {} frames", self.frames);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    // One host tick. Never fails: problems are logged and the frame goes on
    // or is skipped.
    pub(crate) fn tick(&mut self) {
        if !self.running {
            return;
        }
        let now = self.clock.now();
        let elapsed = self.last_tick.map_or(0.0, |t| (now - t).max(0.0));
        self.last_tick = Some(now);
        self.pending += elapsed;

        let interval = self.scene.settings.fps_target.frame_interval();
        if let Some(interval) = interval {
            if self.pending + 1e-6 < interval {
                self.clock.request_tick();
                return;
            }
        }
        let dt = self.pending.min(MAX_DT) as f32;
        self.pending = 0.0;

        self.scene.step(now, dt);
        if let Err(e) = self.scene.check_pools() {
            log::error!("pool invariant broken: {e}");
            debug_assert!(false, "pool invariant broken: {e}");
        }
        if dt > 0.0 {
            self.scene.fps_estimate = approach(self.scene.fps_estimate, 1.0 / dt, 2.0, dt);
        }

        if let (Some(surface), Some(_)) = (self.surface.as_mut(), self.scene.viewport) {
            for (pass, e) in self.renderer.render(surface, &self.scene, now) {
                log::warn!("{pass:?} pass skipped: {e}");
            }
            if let Err(e) = surface.present() {
                log::warn!("{}", SceneError::from(e));
            }
        }
        self.frames += 1;

        let work = (self.clock.now() - now) as f32;
        let budget = interval.unwrap_or(1.0 / 60.0) as f32;
        self.scene.lod.adapt(work, budget);

        if self.running {
            self.clock.request_tick();
        }
    }

    pub(crate) fn trigger_boost(&mut self) -> bool {
        let started = self.scene.boost.trigger(self.clock.now());
        if started {
            log::debug!("boost");
        }
        started
    }

    // Entities keep their world positions; only the projection changes.
    pub(crate) fn resize(&mut self, width: f32, height: f32, dpr: f32) {
        let vp = Viewport::new(width, height, dpr);
        match vp {
            Some(vp) => log::debug!("viewport {}x{} at {}x", vp.width, vp.height, vp.dpr),
            None => log::info!("viewport {width}x{height} is degenerate, drawing paused"),
        }
        self.scene.set_viewport(vp);
    }

    pub(crate) fn set_settings(&mut self, settings: Settings) {
        self.scene.apply_settings(settings);
    }

    pub(crate) fn set_hud(&mut self, on: bool) {
        self.scene.show_hud = on;
    }

    pub(crate) fn scene(&self) -> &Scene {
        &self.scene
    }

    pub(crate) fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    pub(crate) fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    #[cfg(test)]
    pub(crate) fn listeners(&self) -> &L {
        &self.listeners
    }

    #[cfg(test)]
    pub(crate) fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub(crate) fn handle_input(&mut self, ev: &InputEvent) {
        if !self.running || !self.attached.contains(&ev.listener()) {
            return;
        }
        match ev {
            InputEvent::PointerMove { x, y } => {
                if let Some(vp) = self.scene.viewport {
                    self.scene
                        .camera
                        .set_parallax_target(x / vp.width * 2.0 - 1.0, y / vp.height * 2.0 - 1.0);
                }
            }
            InputEvent::PointerDown { .. } | InputEvent::KeyPress => {
                self.trigger_boost();
            }
            InputEvent::TouchStart { touches, time } => {
                let zoom = self.scene.camera.zoom_target();
                if let Some(Gesture::DoubleTap) = self.gestures.on_start(touches, *time, zoom) {
                    self.trigger_boost();
                }
            }
            InputEvent::TouchMove { touches } => match self.gestures.on_move(touches) {
                Some(Gesture::Drag(p)) => {
                    if let Some(vp) = self.scene.viewport {
                        self.scene
                            .camera
                            .set_parallax_target(p.x / vp.width * 2.0 - 1.0, p.y / vp.height * 2.0 - 1.0);
                    }
                }
                Some(Gesture::Zoom(z)) => self.scene.camera.set_zoom_target(z),
                _ => {}
            },
            InputEvent::TouchEnd { remaining } => self.gestures.on_end(*remaining),
            InputEvent::Orientation { beta, gamma } => {
                if let Some((nx, ny)) = tilt_to_parallax(*beta, *gamma) {
                    self.scene.camera.set_parallax_target(nx, ny);
                }
            }
            InputEvent::Resize { width, height, dpr } => self.resize(*width, *height, *dpr),
        }
    }
}
