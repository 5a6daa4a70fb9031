//! The coarse tile grid and the fixed-time-slice tick loop.

use wisp_core::{
    Cell, Coord, LevelError, ObjectId, SimulationConfig, AIRTEMPCOEFF_PER_PRESSURE,
    DEFAULT_LEVEL_HEIGHT, DEFAULT_LEVEL_WIDTH, EXPLOSION_BLOCK_LIFETIME,
    EXPLOSION_TRIGGER_TIMEOUT, FIRE_PARTICLE_TEMPERATURE_RISE, SUBDIVISION_COUNT, TickCounter,
};
use wisp_physics::Automaton;

use crate::arena::ObjectArena;
use crate::movement::Movement;
use crate::object::{
    FrameState, GameObject, MoveDirection, ObjectKind, FAN_FLOW_COEFFICIENT,
    HORIZ_FAN_EFFECT_STAMP, VERT_FAN_EFFECT_STAMP,
};
use crate::particles::{ParticleKind, ParticleSystem};

/// One coarse tile.
///
/// `here` owns the tile's occupant link; `reserved_by` marks the source
/// tile of a movement in flight, so no other object may target it. Both
/// refer into the level's object arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelCell {
    /// The occupant, if any.
    pub here: Option<ObjectId>,
    /// The object whose movement originates here, if any.
    pub reserved_by: Option<ObjectId>,
}

/// Events emitted by the level for the embedder to drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelEvent {
    /// The player was destroyed.
    PlayerDied {
        /// Tile column.
        x: i32,
        /// Tile row.
        y: i32,
    },
    /// A large explosion was triggered.
    Explosion {
        /// Core region left column.
        x: i32,
        /// Core region top row.
        y: i32,
        /// Core region width in tiles.
        width: i32,
        /// Core region height in tiles.
        height: i32,
    },
}

/// Per-tick counters, reset at the start of every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Objects that received a full update.
    pub objects_updated: usize,
    /// Movements that completed this tick.
    pub movements_completed: usize,
    /// Stamp moves applied to the automaton.
    pub stamps_moved: usize,
    /// Large explosions triggered.
    pub explosions_triggered: usize,
}

/// Construction parameters for a [`Level`].
#[derive(Clone, Debug)]
pub struct LevelConfig {
    /// Coarse grid width, in tiles.
    pub width: i32,
    /// Coarse grid height, in tiles.
    pub height: i32,
    /// Seconds of simulated time per tick.
    pub time_slice: f64,
    /// Automaton friction configuration.
    pub sim: SimulationConfig,
    /// Automaton worker count; `None` auto-detects.
    pub physics_workers: Option<usize>,
    /// Uniform initial air pressure.
    pub initial_pressure: f64,
    /// Uniform initial temperature.
    pub initial_temperature: f64,
    /// Seed for particle spawn jitter.
    pub particle_seed: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_LEVEL_WIDTH,
            height: DEFAULT_LEVEL_HEIGHT,
            time_slice: 0.01,
            sim: SimulationConfig::default(),
            physics_workers: None,
            initial_pressure: 1.0,
            initial_temperature: 1.0,
            particle_seed: 0,
        }
    }
}

/// The coarse tile world: object grid, automaton, particles and clock.
pub struct Level {
    width: i32,
    height: i32,
    time_slice: f64,
    time: f64,
    ticks: TickCounter,
    cells: Vec<LevelCell>,
    objects: ObjectArena,
    physics: Automaton,
    particles: ParticleSystem,
    player: Option<ObjectId>,
    events: Vec<LevelEvent>,
    metrics: TickMetrics,
}

impl Level {
    /// Build a level with an automaton of
    /// `width * SUBDIVISION_COUNT × height * SUBDIVISION_COUNT` cells.
    ///
    /// # Errors
    ///
    /// Propagates automaton construction failures (empty grid, invalid
    /// configuration, thread spawn).
    pub fn new(config: LevelConfig) -> Result<Self, LevelError> {
        let physics = Automaton::new(
            config.width * SUBDIVISION_COUNT,
            config.height * SUBDIVISION_COUNT,
            config.sim,
            config.physics_workers,
            config.initial_pressure,
            config.initial_temperature,
        )?;
        Ok(Self {
            width: config.width,
            height: config.height,
            time_slice: config.time_slice,
            time: 0.0,
            ticks: 0,
            cells: vec![LevelCell::default(); (config.width * config.height) as usize],
            objects: ObjectArena::new(),
            physics,
            particles: ParticleSystem::new(config.particle_seed),
            player: None,
            events: Vec::new(),
            metrics: TickMetrics::default(),
        })
    }

    // ── accessors ──────────────────────────────────────────────

    /// Level width in tiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Level height in tiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Seconds of simulated time per tick.
    pub fn time_slice(&self) -> f64 {
        self.time_slice
    }

    /// Simulated time elapsed.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ticks elapsed.
    pub fn ticks(&self) -> TickCounter {
        self.ticks
    }

    /// The player's object id, while alive.
    pub fn player(&self) -> Option<ObjectId> {
        self.player
    }

    /// Counters of the most recent tick.
    pub fn metrics(&self) -> TickMetrics {
        self.metrics
    }

    /// The automaton.
    pub fn physics(&self) -> &Automaton {
        &self.physics
    }

    /// The automaton, mutably. The server uses this to resume the frame
    /// after applying queued operations.
    pub fn physics_mut(&mut self) -> &mut Automaton {
        &mut self.physics
    }

    /// The particle pool.
    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    /// Whether the tile coordinate lies inside the level.
    pub fn tile_in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (x + y * self.width) as usize
    }

    /// Borrow a tile.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate is out of bounds.
    pub fn get_cell(&self, x: i32, y: i32) -> &LevelCell {
        &self.cells[self.index(x, y)]
    }

    /// Borrow an object.
    ///
    /// # Panics
    ///
    /// Panics when the id is dead.
    pub fn object(&self, id: ObjectId) -> &GameObject {
        self.objects.get(id)
    }

    /// Mutably borrow an object.
    ///
    /// # Panics
    ///
    /// Panics when the id is dead.
    pub fn object_mut(&mut self, id: ObjectId) -> &mut GameObject {
        self.objects.get_mut(id)
    }

    /// Whether the id refers to a live object.
    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains(id)
    }

    /// Iterate over all live objects.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects.iter()
    }

    /// Drain the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<LevelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Map a continuous tile position to the top-left fine-grid
    /// coordinate of a stamp at that position.
    pub fn phys_coords(x: f64, y: f64) -> Coord {
        Coord::new(
            (x * SUBDIVISION_COUNT as f64).round() as i32,
            (y * SUBDIVISION_COUNT as f64).round() as i32,
        )
    }

    /// Queue a movement command for the player. Returns `false` when no
    /// player is alive.
    pub fn set_player_action(&mut self, direction: MoveDirection) -> bool {
        match self.player {
            Some(id) => {
                self.objects.get_mut(id).acting = direction;
                true
            }
            None => false,
        }
    }

    /// Fire the player's flamethrower toward `direction` for one tick.
    /// Returns `false` when there is no player or the weapon is empty.
    pub fn fire_player_weapon(&mut self, direction: Coord) -> bool {
        use crate::weapon::Weapon;

        let Some(id) = self.player else {
            return false;
        };
        let ObjectKind::Player { mut flamethrower } = self.objects.get(id).kind else {
            return false;
        };
        if flamethrower.empty() {
            return false;
        }
        let user = self.objects.get(id).cell;
        flamethrower.fire(self, user, direction);
        if let ObjectKind::Player {
            flamethrower: stored,
        } = &mut self.objects.get_mut(id).kind
        {
            *stored = flamethrower;
        }
        true
    }

    /// Spray fire particles from a tile toward `direction`.
    pub fn spawn_fire(&mut self, from: Coord, direction: Coord, count: usize) {
        let norm = direction.norm();
        let (dx, dy) = if norm > 0.0 {
            (direction.x as f64 / norm, direction.y as f64 / norm)
        } else {
            (0.0, -1.0)
        };
        self.particles.spawn_generator(count, |particle, rng| {
            particle.kind = ParticleKind::Fire;
            particle.lifetime = 0.6 + ParticleSystem::jitter(rng, 0.2);
            particle.x = from.x as f32 + ParticleSystem::jitter(rng, 0.2);
            particle.y = from.y as f32 + ParticleSystem::jitter(rng, 0.2);
            particle.vx = (dx * 4.0) as f32 + ParticleSystem::jitter(rng, 0.5);
            particle.vy = (dy * 4.0) as f32 + ParticleSystem::jitter(rng, 0.5);
            // Hot gas rises.
            particle.ay = -1.0;
        });
    }

    // ── placement ──────────────────────────────────────────────

    /// Place an object at a tile, evicting whatever occupies it.
    ///
    /// A movement reserving the tile is aborted first (its object snaps
    /// to its target and the stamp is moved accordingly). Destroying an
    /// evicted player emits [`LevelEvent::PlayerDied`].
    ///
    /// # Errors
    ///
    /// [`LevelError::OutOfBounds`] for an invalid tile; automaton errors
    /// propagate.
    pub fn place_object(
        &mut self,
        object: GameObject,
        x: i32,
        y: i32,
        initial_temperature: f64,
    ) -> Result<ObjectId, LevelError> {
        if !self.tile_in_bounds(x, y) {
            return Err(LevelError::OutOfBounds { x, y });
        }
        let idx = self.index(x, y);

        if let Some(reserver) = self.cells[idx].reserved_by {
            let old_phy = self.objects.get(reserver).phy;
            self.abort_movement(reserver);
            let (snapped_x, snapped_y, info) = {
                let o = self.objects.get(reserver);
                (o.x, o.y, o.info)
            };
            let new_phy = Self::phys_coords(snapped_x, snapped_y);
            if new_phy != old_phy && info.stamp.non_empty() {
                self.physics
                    .move_stamp(old_phy, new_phy, &info.stamp, None)?;
            }
            self.objects.get_mut(reserver).phy = new_phy;
        }

        if let Some(existing) = self.cells[idx].here {
            self.destroy_object(existing);
        }

        self.insert_object(object, x, y, initial_temperature)
    }

    /// Place the player. Refuses a second player (returns `None`).
    ///
    /// # Errors
    ///
    /// Same as [`place_object`](Self::place_object).
    pub fn place_player(
        &mut self,
        player: GameObject,
        x: i32,
        y: i32,
    ) -> Result<Option<ObjectId>, LevelError> {
        if self.player.is_some() {
            return Ok(None);
        }
        let id = self.place_object(player, x, y, 1.0)?;
        self.player = Some(id);
        Ok(Some(id))
    }

    fn insert_object(
        &mut self,
        mut object: GameObject,
        x: i32,
        y: i32,
        initial_temperature: f64,
    ) -> Result<ObjectId, LevelError> {
        object.cell = Coord::new(x, y);
        object.x = x as f64;
        object.y = y as f64;
        object.phy = Self::phys_coords(object.x, object.y);
        object.ticks = self.ticks;
        let info = object.info;
        let phy = object.phy;
        let id = self.objects.insert(object);
        let idx = self.index(x, y);
        self.cells[idx].here = Some(id);
        if info.stamp.non_empty() {
            self.physics.place_object(
                phy,
                &info.stamp,
                id,
                info.temp_coefficient,
                initial_temperature,
            )?;
        }
        Ok(id)
    }

    /// Destroy an object: abort its movement, free its tile and stamp,
    /// and drop it from the arena. Emits [`LevelEvent::PlayerDied`] for
    /// the player.
    pub fn destroy_object(&mut self, id: ObjectId) {
        self.abort_movement(id);
        let (cell, phy, info) = {
            let o = self.objects.get(id);
            (o.cell, o.phy, o.info)
        };
        let idx = self.index(cell.x, cell.y);
        if self.cells[idx].here == Some(id) {
            self.cells[idx].here = None;
        }
        if info.stamp.non_empty() {
            if let Err(e) = self.physics.clear_cells(phy, &info.stamp) {
                log::warn!("failed to clear stamp of destroyed object {id}: {e}");
            }
        }
        if self.player == Some(id) {
            self.player = None;
            self.events.push(LevelEvent::PlayerDied {
                x: cell.x,
                y: cell.y,
            });
        }
        self.objects.remove(id);
    }

    /// Remove every object and particle, returning the level to an empty
    /// grid. Used by loaders to roll back a failed load.
    pub fn clear(&mut self) {
        let ids: Vec<ObjectId> = self.objects.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.destroy_object(id);
        }
        self.cells.fill(LevelCell::default());
        self.particles.clear();
        self.player = None;
    }

    // ── movement plumbing ──────────────────────────────────────

    fn release_reservations(&mut self, movement: &Movement, id: ObjectId) {
        let from = movement.from();
        let from_idx = self.index(from.x, from.y);
        if self.cells[from_idx].reserved_by == Some(id) {
            self.cells[from_idx].reserved_by = None;
        }
        if let Movement::Roll {
            via, via_released, ..
        } = movement
        {
            if !via_released {
                let via_idx = self.index(via.x, via.y);
                if self.cells[via_idx].reserved_by == Some(id) {
                    self.cells[via_idx].reserved_by = None;
                }
            }
        }
    }

    /// Abort a movement in progress: snap the object to its target tile
    /// and release every reservation. Returns whether a movement existed.
    fn abort_movement(&mut self, id: ObjectId) -> bool {
        let Some(movement) = self.objects.get_mut(id).movement.take() else {
            return false;
        };
        {
            let object = self.objects.get_mut(id);
            let (x, y) = movement.end_position();
            object.x = x;
            object.y = y;
        }
        self.release_reservations(&movement, id);
        true
    }

    /// Start a straight movement of `id` by `offset`.
    ///
    /// # Errors
    ///
    /// [`LevelError::ZeroMove`] / [`LevelError::DiagonalMove`] for an
    /// invalid offset, [`LevelError::OutOfBounds`] for a target outside
    /// the level.
    fn begin_straight(&mut self, id: ObjectId, offset: Coord) -> Result<(), LevelError> {
        if offset.x.abs() + offset.y.abs() == 0 {
            return Err(LevelError::ZeroMove);
        }
        if offset.x.abs() + offset.y.abs() > 1 {
            return Err(LevelError::DiagonalMove);
        }
        let from = self.objects.get(id).cell;
        let to = from + offset;
        if !self.tile_in_bounds(to.x, to.y) {
            return Err(LevelError::OutOfBounds { x: to.x, y: to.y });
        }
        let from_idx = self.index(from.x, from.y);
        let to_idx = self.index(to.x, to.y);
        debug_assert_eq!(self.cells[from_idx].here, Some(id));
        debug_assert!(self.cells[from_idx].reserved_by.is_none());
        debug_assert!(self.cells[to_idx].here.is_none());
        debug_assert!(self.cells[to_idx].reserved_by.is_none());

        {
            let object = self.objects.get_mut(id);
            object.movement = Some(Movement::straight(from, to, offset, object.x, object.y));
            object.cell = to;
        }
        self.cells[from_idx].here = None;
        self.cells[from_idx].reserved_by = Some(id);
        self.cells[to_idx].here = Some(id);
        Ok(())
    }

    /// Start a roll of `id` sideways by `offset_x` and down one tile.
    fn begin_roll(&mut self, id: ObjectId, offset_x: i32) -> Result<(), LevelError> {
        let from = self.objects.get(id).cell;
        let via = from + Coord::new(offset_x, 0);
        let to = from + Coord::new(offset_x, 1);
        if !self.tile_in_bounds(to.x, to.y) {
            return Err(LevelError::OutOfBounds { x: to.x, y: to.y });
        }
        let from_idx = self.index(from.x, from.y);
        let via_idx = self.index(via.x, via.y);
        let to_idx = self.index(to.x, to.y);
        debug_assert_eq!(self.cells[from_idx].here, Some(id));
        debug_assert!(self.cells[via_idx].here.is_none());
        debug_assert!(self.cells[via_idx].reserved_by.is_none());
        debug_assert!(self.cells[to_idx].here.is_none());
        debug_assert!(self.cells[to_idx].reserved_by.is_none());

        {
            let object = self.objects.get_mut(id);
            object.movement = Some(Movement::roll(from, via, to, object.x, object.y));
            object.cell = to;
        }
        self.cells[from_idx].here = None;
        self.cells[from_idx].reserved_by = Some(id);
        self.cells[via_idx].reserved_by = Some(id);
        self.cells[to_idx].here = Some(id);
        Ok(())
    }

    /// Attempt a movement command; a blocked or occupied target is a
    /// quiet refusal. A player walking into an edible object consumes it.
    fn try_move(&mut self, id: ObjectId, direction: MoveDirection) -> Result<bool, LevelError> {
        let offset = direction.offset();
        if offset == Coord::new(0, 0) {
            return Ok(false);
        }
        let from = self.objects.get(id).cell;
        let to = from + offset;
        if !self.tile_in_bounds(to.x, to.y) {
            return Ok(false);
        }
        let to_idx = self.index(to.x, to.y);
        if self.cells[to_idx].reserved_by.is_some() {
            return Ok(false);
        }
        if let Some(occupant) = self.cells[to_idx].here {
            let edible = self.objects.get(occupant).info.is_edible;
            let is_player = self.player == Some(id);
            if edible && is_player {
                self.destroy_object(occupant);
            } else {
                return Ok(false);
            }
        }
        self.begin_straight(id, offset)?;
        Ok(true)
    }

    /// Advance the object's movement. Returns `true` while still moving.
    fn advance_movement(&mut self, id: ObjectId) -> Result<bool, LevelError> {
        let dt = self.time_slice;
        let (finished, velocity, via) = {
            let object = self.objects.get_mut(id);
            // Split borrows: position and movement are disjoint fields.
            let GameObject { movement, x, y, .. } = object;
            let movement = movement.as_mut().expect("caller checked movement");
            // Sampled before advancing: the stamp move below is weighted
            // by the direction the matter was displaced in.
            let velocity = movement.velocity_vector();
            let finished = movement.advance(dt, x, y);
            let via = match movement {
                Movement::Roll {
                    via,
                    via_released,
                    time,
                    ..
                } if *time >= 1.0 && !*via_released => {
                    *via_released = true;
                    Some(*via)
                }
                _ => None,
            };
            (finished, velocity, via)
        };

        // Rolls release the crossed-over tile at the midpoint.
        if let Some(via) = via {
            let via_idx = self.index(via.x, via.y);
            if self.cells[via_idx].reserved_by == Some(id) {
                self.cells[via_idx].reserved_by = None;
            }
        }

        if finished {
            self.finish_movement(id)?;
            if !self.objects.contains(id) {
                return Ok(false);
            }
        }

        // Track the stamp to the interpolated position.
        let (old_phy, new_phy, info) = {
            let o = self.objects.get(id);
            (o.phy, Self::phys_coords(o.x, o.y), o.info)
        };
        if new_phy != old_phy {
            if info.stamp.non_empty() {
                self.physics
                    .move_stamp(old_phy, new_phy, &info.stamp, Some(velocity))?;
                self.metrics.stamps_moved += 1;
            }
            self.objects.get_mut(id).phy = new_phy;
        }

        Ok(!finished)
    }

    /// Complete a movement: snap, release reservations and run the
    /// impact/headache chain for landings.
    fn finish_movement(&mut self, id: ObjectId) -> Result<(), LevelError> {
        let movement = self
            .objects
            .get_mut(id)
            .movement
            .take()
            .expect("finish_movement requires a movement");
        {
            let object = self.objects.get_mut(id);
            let (x, y) = movement.end_position();
            object.x = x;
            object.y = y;
        }
        self.release_reservations(&movement, id);
        self.metrics.movements_completed += 1;

        if movement.lands_downward() {
            self.impact_chain(id);
        }
        Ok(())
    }

    /// After a landing, notify the mover (`impact`) and, unless it
    /// vetoes, the object it landed on (`headache`).
    fn impact_chain(&mut self, id: ObjectId) {
        let cell = self.objects.get(id).cell;
        let below = Coord::new(cell.x, cell.y + 1);
        if !self.tile_in_bounds(below.x, below.y) {
            return;
        }
        let Some(on_id) = self.cells[self.index(below.x, below.y)].here else {
            return;
        };
        let proceed = self.impact(id, on_id);
        if proceed && self.objects.contains(on_id) {
            self.headache(on_id, id);
        }
    }

    // ── object hooks ───────────────────────────────────────────

    /// The object landed on `_on`. Returns whether `headache` handlers
    /// should run.
    fn impact(&mut self, id: ObjectId, _on: ObjectId) -> bool {
        let kind = self.objects.get(id).kind;
        match kind {
            ObjectKind::Bomb { .. } => {
                self.explode_object(id);
                true
            }
            _ => true,
        }
    }

    /// Another object (`_from`) landed on this one.
    fn headache(&mut self, id: ObjectId, _from: ObjectId) {
        let kind = self.objects.get(id).kind;
        if let ObjectKind::Bomb { .. } = kind {
            self.explode_object(id);
        }
    }

    /// The object is inside an explosion area. Destructible objects are
    /// destroyed.
    fn explosion_touch(&mut self, id: ObjectId) {
        if self.objects.get(id).info.is_destructible {
            self.destroy_object(id);
        }
    }

    /// The object is hit by igniting particles. Bombs light their fuse.
    fn ignition_touch(&mut self, id: ObjectId) {
        let kind = self.objects.get(id).kind;
        if let ObjectKind::Bomb { ignited_at: None } = kind {
            self.objects.get_mut(id).kind = ObjectKind::Bomb {
                ignited_at: Some(self.ticks),
            };
        }
    }

    /// Detonate an object at its tile.
    fn explode_object(&mut self, id: ObjectId) {
        let cell = self.objects.get(id).cell;
        self.add_large_explosion(cell.x, cell.y, 1, 1);
    }

    /// Blast the core region plus a one-tile fringe: destructible
    /// occupants are destroyed and the affected tiles filled with
    /// explosion blocks.
    pub fn add_large_explosion(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.events.push(LevelEvent::Explosion {
            x,
            y,
            width,
            height,
        });
        self.metrics.explosions_triggered += 1;
        for cy in (y - 1)..(y + height + 1) {
            for cx in (x - 1)..(x + width + 1) {
                if self.tile_in_bounds(cx, cy) {
                    self.explode_tile(cx, cy);
                }
            }
        }
    }

    fn explode_tile(&mut self, x: i32, y: i32) {
        let idx = self.index(x, y);
        if let Some(occupant) = self.cells[idx].here {
            let destructible = self.objects.get(occupant).info.is_destructible;
            if !destructible {
                return;
            }
            self.explosion_touch(occupant);
        }
        if self.cells[idx].here.is_none() {
            let block = GameObject::explosion(self.ticks + EXPLOSION_BLOCK_LIFETIME);
            if let Err(e) = self.insert_object(block, x, y, 1.0) {
                log::warn!("failed to place explosion block at ({x}, {y}): {e}");
            }
        }
    }

    // ── gravity ────────────────────────────────────────────────

    /// Whether `(x, y)` and the tile below are both free and unreserved,
    /// forming a channel a rolling object can fall through.
    fn fall_channel(&self, x: i32, y: i32) -> bool {
        let aside = &self.cells[self.index(x, y)];
        if aside.here.is_some() || aside.reserved_by.is_some() {
            return false;
        }
        let below = &self.cells[self.index(x, y + 1)];
        below.here.is_none() && below.reserved_by.is_none()
    }

    fn handle_gravity(&mut self, id: ObjectId) -> Result<(), LevelError> {
        let cell = self.objects.get(id).cell;
        let (x, y) = (cell.x, cell.y);
        if y == self.height - 1 {
            return Ok(());
        }
        debug_assert!(self.objects.get(id).movement.is_none());

        let below = &self.cells[self.index(x, y + 1)];
        if below.here.is_none() && below.reserved_by.is_none() {
            self.begin_straight(id, Coord::new(0, 1))?;
        } else if let Some(below_id) = below.here {
            let below_rollable = self.objects.get(below_id).info.is_rollable;
            let self_rollable = self.objects.get(id).info.is_rollable;
            if below_rollable && self_rollable {
                let left = x > 0 && self.fall_channel(x - 1, y);
                let right = !left && x < self.width - 1 && self.fall_channel(x + 1, y);
                if left {
                    self.begin_roll(id, -1)?;
                } else if right {
                    self.begin_roll(id, 1)?;
                }
            }
        }
        Ok(())
    }

    // ── frame state ────────────────────────────────────────────

    fn average_temperature(&self, phy: Coord, offsets: &[Coord]) -> f32 {
        let mut sum = 0.0;
        let mut count = 0u32;
        for &offset in offsets {
            let x = phy.x + offset.x;
            let y = phy.y + offset.y;
            let Some(cell) = self.physics.safe_cell_at(x, y) else {
                continue;
            };
            let meta = self.physics.meta_at(x, y);
            let tc = if meta.blocked {
                meta.temp_coefficient
            } else {
                AIRTEMPCOEFF_PER_PRESSURE * cell.air_pressure
            };
            if tc > 1e-17 {
                sum += cell.heat_energy / tc;
                count += 1;
            }
        }
        if count > 0 {
            (sum / count as f64) as f32
        } else {
            f32::NAN
        }
    }

    fn latch_frame_state(&mut self, id: ObjectId) {
        let (phy, info) = {
            let o = self.objects.get(id);
            (o.phy, o.info)
        };
        if !info.stamp.non_empty() {
            return;
        }
        let own = self.average_temperature(phy, info.stamp.map_coords());
        let surr = self.average_temperature(phy, info.stamp.border());
        let state = &mut self.objects.get_mut(id).frame_state;
        state.own_temperature = own;
        state.surr_temperature = surr;
    }

    // ── kind update hooks ──────────────────────────────────────

    fn dispatch_update(&mut self, id: ObjectId) -> Result<(), LevelError> {
        let kind = self.objects.get(id).kind;
        match kind {
            ObjectKind::Explosion { die_at } => {
                if self.ticks >= die_at {
                    self.destroy_object(id);
                }
            }
            ObjectKind::Bomb {
                ignited_at: Some(lit),
            } => {
                if self.ticks >= lit + EXPLOSION_TRIGGER_TIMEOUT {
                    self.explode_object(id);
                }
            }
            ObjectKind::HorizFan { intensity } => {
                let phy = self.objects.get(id).phy;
                self.physics.apply_flow_stamp(
                    phy,
                    &HORIZ_FAN_EFFECT_STAMP,
                    (intensity, 0.0),
                    FAN_FLOW_COEFFICIENT,
                )?;
            }
            ObjectKind::VertFan { intensity } => {
                let phy = self.objects.get(id).phy;
                self.physics.apply_flow_stamp(
                    phy,
                    &VERT_FAN_EFFECT_STAMP,
                    (0.0, intensity),
                    FAN_FLOW_COEFFICIENT,
                )?;
            }
            _ => {}
        }
        Ok(())
    }

    // ── tick ───────────────────────────────────────────────────

    fn step_object(&mut self, id: ObjectId) -> Result<(), LevelError> {
        self.latch_frame_state(id);

        let (explode, ignite) = {
            let state: &mut FrameState = &mut self.objects.get_mut(id).frame_state;
            let flags = (state.explode, state.ignite);
            state.reset();
            flags
        };
        if explode {
            self.explosion_touch(id);
            if !self.objects.contains(id) {
                return Ok(());
            }
        }
        if ignite {
            self.ignition_touch(id);
            if !self.objects.contains(id) {
                return Ok(());
            }
        }

        self.dispatch_update(id)?;
        if !self.objects.contains(id) {
            return Ok(());
        }

        let mut moving = false;
        if self.objects.get(id).movement.is_some() {
            moving = self.advance_movement(id)?;
            if !self.objects.contains(id) {
                return Ok(());
            }
        }

        self.objects.get_mut(id).ticks = self.ticks + 1;
        self.metrics.objects_updated += 1;
        if moving {
            return Ok(());
        }

        if self.objects.get(id).info.is_gravity_affected {
            self.handle_gravity(id)?;
        }

        if self.objects.get(id).movement.is_none() {
            let acting =
                std::mem::replace(&mut self.objects.get_mut(id).acting, MoveDirection::None);
            if acting != MoveDirection::None {
                self.try_move(id, acting)?;
            }
        }
        Ok(())
    }

    fn update_particles(&mut self) {
        self.particles.update(self.time_slice as f32);

        let mut sites: Vec<(f32, f32)> = Vec::with_capacity(self.particles.active_len());
        for particle in self.particles.active() {
            if particle.kind == ParticleKind::Fire {
                sites.push((particle.x, particle.y));
            }
        }

        for (px, py) in sites {
            let phy = Self::phys_coords(px as f64, py as f64);
            if let Some(cell) = self.physics.safe_cell_at(phy.x, phy.y) {
                let meta = self.physics.meta_at(phy.x, phy.y);
                let tc = if meta.blocked {
                    meta.temp_coefficient
                } else {
                    AIRTEMPCOEFF_PER_PRESSURE * cell.air_pressure
                };
                let heated = Cell {
                    heat_energy: cell.heat_energy + FIRE_PARTICLE_TEMPERATURE_RISE * tc,
                    ..*cell
                };
                if let Err(e) = self.physics.set_cell(phy.x, phy.y, heated) {
                    log::warn!("fire particle could not heat ({}, {}): {e}", phy.x, phy.y);
                }
            }

            let tile_x = px.round() as i32;
            let tile_y = py.round() as i32;
            if self.tile_in_bounds(tile_x, tile_y) {
                if let Some(occupant) = self.cells[self.index(tile_x, tile_y)].here {
                    self.objects.get_mut(occupant).frame_state.ignite = true;
                }
            }
        }
    }

    /// Advance one tick without restarting the automaton: wait for the
    /// frame in flight, run every object, advance time and particles.
    /// The caller resumes the automaton when its mutations are done
    /// (the server applies queued operations first).
    ///
    /// # Errors
    ///
    /// Movement precondition violations and automaton faults abort the
    /// tick.
    pub fn step(&mut self) -> Result<(), LevelError> {
        self.physics.wait_for();
        self.metrics = TickMetrics::default();

        let tick = self.ticks;
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(id) = self.cells[self.index(x, y)].here else {
                    continue;
                };
                // An object that moved into a later tile this tick has
                // already had its full update.
                if self.objects.get(id).ticks > tick {
                    continue;
                }
                self.step_object(id)?;
            }
        }

        self.ticks += 1;
        self.time += self.time_slice;
        self.update_particles();
        Ok(())
    }

    /// Advance one tick and immediately resume the automaton. The
    /// standalone (serverless) drive path.
    ///
    /// # Errors
    ///
    /// Same as [`step`](Self::step).
    pub fn update(&mut self) -> Result<(), LevelError> {
        self.step()?;
        self.physics.resume();
        Ok(())
    }
}
