use rand::Rng;

use super::{Pool, NEAR_Z};
use crate::config::MAX_DENSITY;
use crate::math::WorldPoint;

const STAR_BASE: usize = 140;
const RAIN_BASE: usize = 260;
const CLOUD_BASE: usize = 7;
const STEAM_BASE: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ParticleBounds {
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) horizon: f32,
}

fn sized(base: usize, density: f32) -> usize {
    ((base as f32) * density.clamp(0.0, MAX_DENSITY)).round() as usize
}

/* -----------------------------
   Stars
------------------------------ */

#[derive(Clone, Copy, Debug)]
pub(crate) struct Star {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) brightness: f32,
    pub(crate) twinkle: f32,
}

pub(crate) struct StarField {
    stars: Vec<Star>,
    active: usize,
    bounds: ParticleBounds,
}

impl StarField {
    pub(crate) fn new<R: Rng + ?Sized>(density: f32, bounds: ParticleBounds, rng: &mut R) -> Self {
        let cap = sized(STAR_BASE, MAX_DENSITY);
        let stars = (0..cap)
            .map(|_| Star {
                x: rng.gen_range(0.0..bounds.width.max(1.0)),
                y: rng.gen_range(0.0..bounds.horizon.max(1.0)),
                brightness: rng.gen_range(0.25..1.0),
                twinkle: rng.gen_range(0.0..std::f32::consts::TAU),
            })
            .collect();
        Self {
            stars,
            active: sized(STAR_BASE, density),
            bounds,
        }
    }

    pub(crate) fn set_density(&mut self, density: f32) {
        self.active = sized(STAR_BASE, density).min(self.stars.len());
    }

    pub(crate) fn set_bounds(&mut self, bounds: ParticleBounds) {
        self.bounds = bounds;
    }

    pub(crate) fn active(&self) -> &[Star] {
        &self.stars[..self.active]
    }

    // `shift_x` is the camera's lateral movement this frame in surface pixels.
    pub(crate) fn update<R: Rng + ?Sized>(&mut self, dt: f32, shift_x: f32, rng: &mut R) {
        let b = self.bounds;
        for s in &mut self.stars[..self.active] {
            s.twinkle = (s.twinkle + dt * (1.5 + s.brightness)).rem_euclid(std::f32::consts::TAU);
            // farther (dimmer) stars move less
            s.x -= shift_x * 0.05 * s.brightness;
            if s.x < 0.0 || s.x > b.width || s.y > b.horizon {
                s.x = if s.x < 0.0 { b.width } else { 0.0 };
                s.y = rng.gen_range(0.0..b.horizon.max(1.0));
                s.brightness = rng.gen_range(0.25..1.0);
            }
        }
    }
}

impl Pool for StarField {
    const NAME: &'static str = "star";
    fn capacity(&self) -> usize {
        self.stars.len()
    }
    fn live(&self) -> usize {
        self.active
    }
}

/* -----------------------------
   Rain
------------------------------ */

#[derive(Clone, Copy, Debug)]
pub(crate) struct RainDrop {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) speed: f32,
    pub(crate) length: f32,
}

pub(crate) struct RainField {
    drops: Vec<RainDrop>,
    active: usize,
    bounds: ParticleBounds,
}

impl RainField {
    pub(crate) fn new<R: Rng + ?Sized>(density: f32, bounds: ParticleBounds, rng: &mut R) -> Self {
        let cap = sized(RAIN_BASE, MAX_DENSITY);
        let mut drops = Vec::with_capacity(cap);
        for _ in 0..cap {
            let mut d = RainDrop {
                x: 0.0,
                y: 0.0,
                speed: 0.0,
                length: 0.0,
            };
            respawn_drop(&mut d, bounds, rng);
            d.y = rng.gen_range(0.0..bounds.height.max(1.0));
            drops.push(d);
        }
        Self {
            drops,
            active: sized(RAIN_BASE, density),
            bounds,
        }
    }

    pub(crate) fn set_density(&mut self, density: f32) {
        self.active = sized(RAIN_BASE, density).min(self.drops.len());
    }

    pub(crate) fn set_bounds(&mut self, bounds: ParticleBounds) {
        self.bounds = bounds;
    }

    pub(crate) fn active(&self) -> &[RainDrop] {
        &self.drops[..self.active]
    }

    #[cfg(test)]
    pub(crate) fn drop_mut(&mut self, i: usize) -> Option<&mut RainDrop> {
        self.drops[..self.active].get_mut(i)
    }

    // `wind` in pixels per second; `speed_factor` scales fall speed (boost).
    pub(crate) fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        wind: f32,
        speed_factor: f32,
        rng: &mut R,
    ) {
        let b = self.bounds;
        for d in &mut self.drops[..self.active] {
            d.y += d.speed * speed_factor * dt;
            d.x += wind * dt;
            if d.y > b.height || d.x < -d.length || d.x > b.width + d.length {
                respawn_drop(d, b, rng);
            }
        }
    }
}

fn respawn_drop<R: Rng + ?Sized>(d: &mut RainDrop, b: ParticleBounds, rng: &mut R) {
    let h = b.height.max(1.0);
    d.x = rng.gen_range(0.0..b.width.max(1.0));
    d.y = rng.gen_range(-h * 0.2..0.0);
    d.speed = h * rng.gen_range(0.9..1.6);
    d.length = h * rng.gen_range(0.015..0.04);
}

impl Pool for RainField {
    const NAME: &'static str = "rain";
    fn capacity(&self) -> usize {
        self.drops.len()
    }
    fn live(&self) -> usize {
        self.active
    }
}

/* -----------------------------
   Clouds
------------------------------ */

#[derive(Clone, Copy, Debug)]
pub(crate) struct Cloud {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) radius: f32,
    pub(crate) drift: f32,
    pub(crate) alpha: f32,
}

pub(crate) struct CloudLayer {
    clouds: Vec<Cloud>,
    active: usize,
    bounds: ParticleBounds,
}

impl CloudLayer {
    pub(crate) fn new<R: Rng + ?Sized>(density: f32, bounds: ParticleBounds, rng: &mut R) -> Self {
        let cap = sized(CLOUD_BASE, MAX_DENSITY);
        let clouds = (0..cap)
            .map(|_| {
                let mut c = Cloud {
                    x: 0.0,
                    y: 0.0,
                    radius: 0.0,
                    drift: 0.0,
                    alpha: 0.0,
                };
                respawn_cloud(&mut c, bounds, rng);
                c.x = rng.gen_range(0.0..bounds.width.max(1.0));
                c
            })
            .collect();
        Self {
            clouds,
            active: sized(CLOUD_BASE, density).max(1),
            bounds,
        }
    }

    pub(crate) fn set_density(&mut self, density: f32) {
        self.active = sized(CLOUD_BASE, density).clamp(1, self.clouds.len());
    }

    pub(crate) fn set_bounds(&mut self, bounds: ParticleBounds) {
        self.bounds = bounds;
    }

    pub(crate) fn active(&self) -> &[Cloud] {
        &self.clouds[..self.active]
    }

    pub(crate) fn update<R: Rng + ?Sized>(&mut self, dt: f32, shift_x: f32, rng: &mut R) {
        let b = self.bounds;
        for c in &mut self.clouds[..self.active] {
            c.x += c.drift * dt - shift_x * 0.2;
            if c.x - c.radius * 2.0 > b.width {
                respawn_cloud(c, b, rng);
                c.x = -c.radius * 2.0;
            } else if c.x + c.radius * 2.0 < 0.0 {
                respawn_cloud(c, b, rng);
                c.x = b.width + c.radius * 2.0;
            }
        }
    }
}

fn respawn_cloud<R: Rng + ?Sized>(c: &mut Cloud, b: ParticleBounds, rng: &mut R) {
    let h = b.horizon.max(1.0);
    c.y = rng.gen_range(h * 0.1..h * 0.75);
    c.radius = b.height.max(1.0) * rng.gen_range(0.03..0.07);
    c.drift = b.width.max(1.0) * rng.gen_range(0.004..0.015);
    c.alpha = rng.gen_range(0.08..0.2);
}

impl Pool for CloudLayer {
    const NAME: &'static str = "cloud";
    fn capacity(&self) -> usize {
        self.clouds.len()
    }
    fn live(&self) -> usize {
        self.active
    }
}

/* -----------------------------
   Steam (world space, expiring)
------------------------------ */

#[derive(Clone, Copy, Debug)]
pub(crate) struct SteamPuff {
    pub(crate) pos: WorldPoint,
    pub(crate) age: f32,
    pub(crate) max_age: f32,
    pub(crate) drift: f32,
    pub(crate) alive: bool,
}

impl SteamPuff {
    pub(crate) fn life(&self) -> f32 {
        (self.age / self.max_age.max(1e-3)).clamp(0.0, 1.0)
    }
}

pub(crate) struct SteamPool {
    puffs: Vec<SteamPuff>,
    limit: usize,
}

impl SteamPool {
    const RISE: f32 = 22.0;
    const EMIT_RATE: f32 = 2.5;

    pub(crate) fn new(density: f32) -> Self {
        let cap = sized(STEAM_BASE, MAX_DENSITY);
        let puffs = vec![
            SteamPuff {
                pos: WorldPoint::default(),
                age: 0.0,
                max_age: 1.0,
                drift: 0.0,
                alive: false,
            };
            cap
        ];
        Self {
            puffs,
            limit: sized(STEAM_BASE, density),
        }
    }

    pub(crate) fn set_density(&mut self, density: f32) {
        self.limit = sized(STEAM_BASE, density).min(self.puffs.len());
    }

    pub(crate) fn alive(&self) -> impl Iterator<Item = &SteamPuff> {
        self.puffs.iter().filter(|p| p.alive)
    }

    pub(crate) fn emit<R: Rng + ?Sized>(&mut self, origin: WorldPoint, rng: &mut R) -> bool {
        if self.live() >= self.limit {
            return false;
        }
        match self.puffs.iter_mut().find(|p| !p.alive) {
            Some(p) => {
                p.pos = WorldPoint::new(
                    origin.x + rng.gen_range(-6.0..6.0),
                    origin.y,
                    origin.z + rng.gen_range(-6.0..6.0),
                );
                p.age = 0.0;
                p.max_age = rng.gen_range(1.2..2.6);
                p.drift = rng.gen_range(-8.0..8.0);
                p.alive = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn emit_from<R, I>(&mut self, vents: I, max_z: f32, dt: f32, rng: &mut R)
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = WorldPoint>,
    {
        for v in vents {
            if v.z > NEAR_Z && v.z < max_z && rng.gen::<f32>() < Self::EMIT_RATE * dt {
                self.emit(v, rng);
            }
        }
    }

    pub(crate) fn update(&mut self, dt: f32, global_speed: f32) {
        for p in self.puffs.iter_mut().filter(|p| p.alive) {
            p.age += dt;
            p.pos.z -= global_speed * dt;
            p.pos.y += Self::RISE * dt;
            p.pos.x += p.drift * dt;
            if p.age >= p.max_age || p.pos.z <= NEAR_Z {
                p.alive = false;
            }
        }
    }
}

impl Pool for SteamPool {
    const NAME: &'static str = "steam";
    fn capacity(&self) -> usize {
        self.puffs.len()
    }
    fn live(&self) -> usize {
        self.puffs.iter().filter(|p| p.alive).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn bounds() -> ParticleBounds {
        ParticleBounds {
            width: 1920.0,
            height: 1080.0,
            horizon: 450.0,
        }
    }

    #[test]
    fn screen_pools_keep_their_counts_and_bounds() {
        let mut rng = SmallRng::seed_from_u64(10);
        let mut stars = StarField::new(1.0, bounds(), &mut rng);
        let mut rain = RainField::new(1.0, bounds(), &mut rng);
        let mut clouds = CloudLayer::new(1.0, bounds(), &mut rng);
        let counts = (stars.live(), rain.live(), clouds.live());
        for i in 0..2000 {
            let shift = if i % 200 < 100 { 30.0 } else { -30.0 };
            stars.update(1.0 / 60.0, shift, &mut rng);
            rain.update(1.0 / 60.0, -40.0, 1.0, &mut rng);
            clouds.update(1.0 / 60.0, shift, &mut rng);
        }
        assert_eq!(counts, (stars.live(), rain.live(), clouds.live()));
        for s in stars.active() {
            assert!(s.x >= 0.0 && s.x <= 1920.0 && s.y <= 450.0);
        }
        for d in rain.active() {
            assert!(d.y <= 1080.0);
        }
    }

    #[test]
    fn density_changes_active_count_not_capacity() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut rain = RainField::new(1.0, bounds(), &mut rng);
        let cap = rain.capacity();
        rain.set_density(0.5);
        assert_eq!(rain.live(), RAIN_BASE / 2);
        rain.set_density(50.0);
        assert_eq!(rain.live(), cap);
        assert_eq!(rain.capacity(), cap);
    }

    #[test]
    fn steam_slots_are_freed_on_expiry() {
        let mut rng = SmallRng::seed_from_u64(12);
        let mut steam = SteamPool::new(1.0);
        let cap = steam.capacity();
        for _ in 0..200 {
            steam.emit(WorldPoint::new(0.0, 100.0, 800.0), &mut rng);
        }
        assert_eq!(steam.live(), STEAM_BASE);
        for _ in 0..200 {
            steam.update(1.0 / 60.0, 0.0);
        }
        assert_eq!(steam.live(), 0);
        assert_eq!(steam.capacity(), cap);
        assert!(steam.emit(WorldPoint::new(0.0, 100.0, 800.0), &mut rng));
    }

    #[test]
    fn steam_expires_at_the_near_plane() {
        let mut rng = SmallRng::seed_from_u64(13);
        let mut steam = SteamPool::new(1.0);
        steam.emit(WorldPoint::new(0.0, 100.0, 30.0), &mut rng);
        steam.update(0.2, 260.0);
        assert_eq!(steam.live(), 0);
    }
}
