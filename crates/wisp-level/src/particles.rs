//! Pooled particle system for fire and smoke effects.
//!
//! Particles live in chunk-allocated slots reused through a free list,
//! so steady-state spawning never allocates. Spawn jitter comes from a
//! seeded ChaCha8 RNG to keep particle behaviour deterministic for a
//! given level seed.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Slots allocated per pool growth step.
const CHUNK_SIZE: usize = 1024;

/// Particle variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParticleKind {
    /// Burning particle; deposits heat and ignites objects it touches.
    #[default]
    Fire,
}

/// One pooled particle. Positions and velocities are in tile units.
#[derive(Clone, Copy, Debug, Default)]
pub struct Particle {
    /// Live flag; dead particles sit on the free list.
    pub alive: bool,
    /// Seconds since spawn.
    pub age: f32,
    /// Seconds until expiry.
    pub lifetime: f32,
    /// Position.
    pub x: f32,
    /// Position.
    pub y: f32,
    /// Velocity.
    pub vx: f32,
    /// Velocity.
    pub vy: f32,
    /// Acceleration.
    pub ax: f32,
    /// Acceleration.
    pub ay: f32,
    /// Variant.
    pub kind: ParticleKind,
}

/// Chunk-pooled particle storage with deterministic spawn jitter.
#[derive(Debug)]
pub struct ParticleSystem {
    slots: Vec<Particle>,
    free: Vec<usize>,
    active: Vec<usize>,
    rng: ChaCha8Rng,
}

impl ParticleSystem {
    /// An empty pool whose spawn jitter derives from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            active: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn grow(&mut self) {
        let start = self.slots.len();
        self.slots
            .resize(start + CHUNK_SIZE, Particle::default());
        for slot in (start..start + CHUNK_SIZE).rev() {
            self.free.push(slot);
        }
    }

    fn allocate(&mut self) -> usize {
        if self.free.is_empty() {
            self.grow();
        }
        let slot = self.free.pop().expect("free list refilled by grow");
        let particle = &mut self.slots[slot];
        *particle = Particle {
            alive: true,
            ..Particle::default()
        };
        slot
    }

    /// Spawn one particle, initialized by `init`.
    pub fn spawn(&mut self, init: impl FnOnce(&mut Particle)) {
        let slot = self.allocate();
        init(&mut self.slots[slot]);
        self.active.push(slot);
    }

    /// Spawn `n` particles through a generator that may draw jitter from
    /// the pool RNG. Particles left with a non-positive lifetime are
    /// discarded immediately.
    pub fn spawn_generator(
        &mut self,
        n: usize,
        mut generator: impl FnMut(&mut Particle, &mut ChaCha8Rng),
    ) {
        for _ in 0..n {
            let slot = self.allocate();
            // Split borrows: the slot and the RNG are disjoint fields.
            let Self { slots, rng, .. } = self;
            generator(&mut slots[slot], rng);
            if self.slots[slot].lifetime > 0.0 {
                self.active.push(slot);
            } else {
                self.slots[slot].alive = false;
                self.free.push(slot);
            }
        }
    }

    /// Age and integrate every live particle, retiring the expired.
    pub fn update(&mut self, dt: f32) {
        let mut still_active = Vec::with_capacity(self.active.len());
        for &slot in &self.active {
            let particle = &mut self.slots[slot];
            particle.age += dt;
            if particle.age >= particle.lifetime {
                particle.alive = false;
                self.free.push(slot);
                continue;
            }
            particle.vx += particle.ax * dt;
            particle.vy += particle.ay * dt;
            particle.x += particle.vx * dt;
            particle.y += particle.vy * dt;
            still_active.push(slot);
        }
        self.active = still_active;
    }

    /// Number of live particles.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Iterate over the live particles.
    pub fn active(&self) -> impl Iterator<Item = &Particle> {
        self.active.iter().map(|&slot| &self.slots[slot])
    }

    /// Uniform jitter in `[-spread, spread]`.
    pub fn jitter(rng: &mut ChaCha8Rng, spread: f32) -> f32 {
        rng.random_range(-spread..=spread)
    }

    /// Retire every particle and return the pool to empty.
    pub fn clear(&mut self) {
        self.active.clear();
        self.free.clear();
        for (slot, particle) in self.slots.iter_mut().enumerate() {
            particle.alive = false;
            self.free.push(slot);
        }
    }
}
