//! The cellular automaton engine: buffers, worker coordination and stamp
//! operations.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use smallvec::SmallVec;

use wisp_core::{
    Cell, CellInfo, CellMetadata, Coord, ObjectId, PhysicsError, SimulationConfig,
    AIRTEMPCOEFF_PER_PRESSURE, SUBDIVISION_COUNT,
};

use crate::grid::{CellGrid, MetaGrid};
use crate::kernels::clamp;
use crate::worker::{worker_main, BoundaryRow, SliceDone, SliceTask};

/// Hard cap on the worker count; beyond this, synchronization costs
/// outweigh the per-slice work.
const MAX_WORKERS: usize = 64;

/// Summed scalar content of the grid, for conservation checks and
/// diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridTotals {
    /// Total air pressure.
    pub air_pressure: f64,
    /// Total heat energy.
    pub heat_energy: f64,
    /// Total fog.
    pub fog: f64,
}

struct WorkerHandle {
    task_tx: Option<Sender<SliceTask>>,
    join: Option<JoinHandle<()>>,
}

/// The multi-threaded cellular automaton.
///
/// See the [crate docs](crate) for the settled/running state machine.
/// All mutation APIs require the settled state and return
/// [`PhysicsError::EngineRunning`] otherwise; read accessors work in both
/// states and always observe the last completed frame.
pub struct Automaton {
    width: i32,
    height: i32,
    sim: SimulationConfig,
    /// Last completed frame. Uniquely held while settled; shared with
    /// the workers as their read-only input while running.
    front: Arc<CellGrid>,
    /// The buffer the next frame will be written into. `None` while the
    /// rows are lent out to the workers.
    spare: Option<CellGrid>,
    meta: Arc<MetaGrid>,
    resumed: bool,
    slices: Vec<(usize, usize)>,
    workers: Vec<WorkerHandle>,
    done_rx: Receiver<SliceDone>,
    /// Boundary rows of the frame in flight, for reassembly.
    pending_boundaries: Vec<BoundaryRow>,
}

impl Automaton {
    /// Create a settled automaton with uniform initial pressure and
    /// temperature and spawn its worker threads.
    ///
    /// `worker_count` of `None` auto-detects from the available
    /// parallelism; the effective count is capped at 64 and at one worker
    /// per grid row.
    ///
    /// # Errors
    ///
    /// - [`PhysicsError::EmptyGrid`] when either dimension is zero.
    /// - [`PhysicsError::InvalidConfig`] when the friction configuration
    ///   fails validation.
    /// - [`PhysicsError::ThreadSpawnFailed`] when a worker thread cannot
    ///   be started.
    pub fn new(
        width: i32,
        height: i32,
        sim: SimulationConfig,
        worker_count: Option<usize>,
        initial_pressure: f64,
        initial_temperature: f64,
    ) -> Result<Self, PhysicsError> {
        if width <= 0 || height <= 0 {
            return Err(PhysicsError::EmptyGrid);
        }
        sim.validate()
            .map_err(|reason| PhysicsError::InvalidConfig { reason })?;

        let (w, h) = (width as usize, height as usize);
        let hardware = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let count = worker_count
            .unwrap_or(hardware)
            .clamp(1, MAX_WORKERS)
            .min(h);

        // The first n-1 slices take height / n rows each; the last takes
        // the remainder.
        let slice_size = h / count;
        let mut slices = Vec::with_capacity(count);
        let mut y0 = 0;
        for _ in 0..count - 1 {
            slices.push((y0, y0 + slice_size - 1));
            y0 += slice_size;
        }
        slices.push((y0, h - 1));

        let fill = Cell::with_air(initial_pressure, initial_temperature);
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let (task_tx, task_rx) = crossbeam_channel::bounded::<SliceTask>(1);
            let tx = done_tx.clone();
            let join = thread::Builder::new()
                .name(format!("wisp-physics-{i}"))
                .spawn(move || worker_main(i, task_rx, tx))
                .map_err(|e| PhysicsError::ThreadSpawnFailed {
                    reason: e.to_string(),
                })?;
            workers.push(WorkerHandle {
                task_tx: Some(task_tx),
                join: Some(join),
            });
        }

        Ok(Self {
            width,
            height,
            sim,
            front: Arc::new(CellGrid::new(w, h, fill)),
            spare: Some(CellGrid::new(w, h, fill)),
            meta: Arc::new(MetaGrid::new(w, h)),
            resumed: false,
            slices,
            workers,
            done_rx,
            pending_boundaries: Vec::new(),
        })
    }

    /// Grid width in fine cells.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in fine cells.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of worker threads (and row slices).
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether the automaton is settled (not computing a frame).
    pub fn is_settled(&self) -> bool {
        !self.resumed
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Borrow the cell at `(x, y)` of the last completed frame.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate is out of bounds; use
    /// [`safe_cell_at`](Self::safe_cell_at) for fallible access.
    pub fn cell_at(&self, x: i32, y: i32) -> &Cell {
        self.front.cell(x as usize, y as usize)
    }

    /// Borrow the cell at `(x, y)`, or `None` when out of bounds.
    pub fn safe_cell_at(&self, x: i32, y: i32) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(self.cell_at(x, y))
        } else {
            None
        }
    }

    /// Borrow the metadata at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate is out of bounds.
    pub fn meta_at(&self, x: i32, y: i32) -> &CellMetadata {
        self.meta.at(x as usize, y as usize)
    }

    /// Sum pressure, heat and fog over the whole grid.
    pub fn totals(&self) -> GridTotals {
        let mut totals = GridTotals::default();
        for y in 0..self.height as usize {
            for cell in self.front.row(y) {
                totals.air_pressure += cell.air_pressure;
                totals.heat_energy += cell.heat_energy;
                totals.fog += cell.fog;
            }
        }
        totals
    }

    fn ensure_settled(&self) -> Result<(), PhysicsError> {
        if self.resumed {
            Err(PhysicsError::EngineRunning)
        } else {
            Ok(())
        }
    }

    /// Overwrite one cell in both buffers. Settled-state seeding hook for
    /// embedders and tests.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn set_cell(&mut self, x: i32, y: i32, cell: Cell) -> Result<(), PhysicsError> {
        self.ensure_settled()?;
        if !self.in_bounds(x, y) {
            return Ok(());
        }
        let (ux, uy) = (x as usize, y as usize);
        let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");
        *front.cell_mut(ux, uy) = cell;
        if let Some(spare) = self.spare.as_mut() {
            *spare.cell_mut(ux, uy) = cell;
        }
        Ok(())
    }

    /// Start computing the next frame on the worker threads and return
    /// immediately. After this call, only read accessors may be used
    /// until [`wait_for`](Self::wait_for).
    ///
    /// # Panics
    ///
    /// Calling `resume` while the automaton is already running is a
    /// sequencing fault and panics.
    pub fn resume(&mut self) {
        assert!(!self.resumed, "resume() called on a running automaton");

        let spare = self
            .spare
            .take()
            .expect("spare buffer present while settled");
        let mut rows_iter = spare.into_rows().into_iter();

        let worker_count = self.workers.len();
        let mut boundaries: Vec<BoundaryRow> = Vec::with_capacity(worker_count.saturating_sub(1));
        let mut prev_boundary: Option<BoundaryRow> = None;
        let mut prev_forward_rx: Option<Receiver<()>> = None;

        for (i, &(y0, y1)) in self.slices.iter().enumerate() {
            let last = i == worker_count - 1;
            let own_rows = if last { y1 - y0 + 1 } else { y1 - y0 };
            let mut rows = Vec::with_capacity(own_rows);
            for _ in 0..own_rows {
                rows.push(rows_iter.next().expect("enough rows for every slice"));
            }
            let bottom = if last {
                None
            } else {
                let row = rows_iter.next().expect("boundary row for every pair");
                let shared: BoundaryRow = Arc::new(Mutex::new(row));
                boundaries.push(Arc::clone(&shared));
                Some(shared)
            };
            let (forward_tx, forward_rx) = if last {
                (None, None)
            } else {
                let (tx, rx) = crossbeam_channel::bounded(1);
                (Some(tx), Some(rx))
            };

            let task = SliceTask {
                input: Arc::clone(&self.front),
                meta: Arc::clone(&self.meta),
                sim: self.sim,
                y0,
                y1,
                rows,
                top_boundary: prev_boundary.take(),
                bottom_boundary: bottom.clone(),
                forward_up: prev_forward_rx.take(),
                forward_down: forward_tx,
            };
            prev_boundary = bottom;
            prev_forward_rx = forward_rx;

            self.workers[i]
                .task_tx
                .as_ref()
                .expect("worker channel open")
                .send(task)
                .expect("worker thread alive");
        }

        self.pending_boundaries = boundaries;
        self.resumed = true;
    }

    /// Block until the frame in flight completes, then swap buffers.
    /// Returns immediately when already settled.
    pub fn wait_for(&mut self) {
        if !self.resumed {
            return;
        }

        let worker_count = self.workers.len();
        let mut finished: Vec<Option<Vec<Vec<Cell>>>> = (0..worker_count).map(|_| None).collect();
        for _ in 0..worker_count {
            let done = self.done_rx.recv().expect("worker thread alive");
            finished[done.index] = Some(done.rows);
        }

        let boundaries = std::mem::take(&mut self.pending_boundaries);
        let mut boundary_iter = boundaries.into_iter();
        let mut rows = Vec::with_capacity(self.height as usize);
        for (i, slice_rows) in finished.into_iter().enumerate() {
            rows.extend(slice_rows.expect("each worker reports exactly once"));
            if i < worker_count - 1 {
                let shared = boundary_iter.next().expect("one boundary per pair");
                let row = match Arc::try_unwrap(shared) {
                    Ok(mutex) => mutex.into_inner().expect("boundary row mutex poisoned"),
                    // A worker still holding its clone would be a protocol
                    // violation; fall back to copying rather than tearing.
                    Err(shared) => shared.lock().expect("boundary row mutex poisoned").clone(),
                };
                rows.push(row);
            }
        }

        let assembled = CellGrid::from_rows(self.width as usize, self.height as usize, rows);
        let previous_input = std::mem::replace(&mut self.front, Arc::new(assembled));
        self.spare = Some(match Arc::try_unwrap(previous_input) {
            Ok(grid) => grid,
            Err(_) => CellGrid::new(self.width as usize, self.height as usize, Cell::default()),
        });
        self.resumed = false;
    }

    /// Place a batch of stamp cells at `at`, redistributing the displaced
    /// air, heat and fog to the stamp's free border cells. Offsets must
    /// lie within the stamp box (they come from a [`wisp_core::Stamp`]).
    ///
    /// Border weights follow the movement direction when a velocity with
    /// positive norm is given (`max(dir · v̂, 0)`, keeping the maximum per
    /// border cell); otherwise every border cell weighs 1. A zero total
    /// weight falls back to uniform unit weights. When no free border
    /// exists the pooled matter is logged and discarded. Out-of-bounds
    /// stamp cells are skipped individually.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn place_stamp(
        &mut self,
        at: Coord,
        cells: &[CellInfo],
        velocity: Option<Coord>,
    ) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        const OFFS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        let index_side = (SUBDIVISION_COUNT + 2) as usize;

        // Dedup table over the stamp box augmented by one:
        // -1 unseen, -2 unusable (out of bounds / blocked / stamp cell),
        // >= 0 slot in the border lists.
        let mut border_index = vec![-1isize; index_side * index_side];
        let mut border_cells: SmallVec<[Option<(usize, usize)>; 32]> = SmallVec::new();
        let mut border_weights: SmallVec<[f64; 32]> = SmallVec::new();
        let mut border_count = 0usize;
        let mut weight_total = 0.0f64;

        let mut air_to_distribute = 0.0;
        let mut heat_to_distribute = 0.0;
        let mut fog_to_distribute = 0.0;

        let (vel_norm, vel_x, vel_y) = match velocity {
            Some(v) if v.norm() > 0.0 => {
                let n = v.norm();
                (n, v.x as f64 / n, v.y as f64 / n)
            }
            _ => (0.0, 0.0, 0.0),
        };

        let (width, height) = (self.width, self.height);
        let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height;
        let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");
        let meta = Arc::get_mut(&mut self.meta).expect("metadata uniquely held while settled");

        for info in cells {
            let x = info.offset.x + at.x;
            let y = info.offset.y + at.y;
            if !in_bounds(x, y) {
                continue;
            }
            let (ux, uy) = (x as usize, y as usize);

            if !meta.at(ux, uy).blocked {
                let cell = front.cell(ux, uy);
                air_to_distribute += cell.air_pressure;
                heat_to_distribute += cell.heat_energy;
                fog_to_distribute += cell.fog;
            }
            *front.cell_mut(ux, uy) = info.cell;
            *meta.at_mut(ux, uy) = info.meta;

            for (dx, dy) in OFFS {
                let key =
                    ((info.offset.y + dy + 1) * index_side as i32 + info.offset.x + dx + 1) as usize;
                let existing = border_index[key];
                if existing != -1 {
                    if existing >= 0 && vel_norm > 0.0 {
                        // Keep the maximum weight over every edge that
                        // reaches this border cell.
                        let weight = (dx as f64 * vel_x + dy as f64 * vel_y).max(0.0);
                        let slot = existing as usize;
                        if border_weights[slot] < weight {
                            weight_total += weight - border_weights[slot];
                            border_weights[slot] = weight;
                        }
                    }
                    continue;
                }

                let nx = x + dx;
                let ny = y + dy;
                if !in_bounds(nx, ny) {
                    border_index[key] = -2;
                    continue;
                }
                if meta.at(nx as usize, ny as usize).blocked {
                    border_index[key] = -2;
                    continue;
                }

                let weight = if vel_norm > 0.0 {
                    (dx as f64 * vel_x + dy as f64 * vel_y).max(0.0)
                } else {
                    1.0
                };
                border_index[key] = border_cells.len() as isize;
                border_cells.push(Some((nx as usize, ny as usize)));
                border_weights.push(weight);
                border_count += 1;
                weight_total += weight;
            }

            // The stamp cell itself can no longer serve as a border
            // target, even if an earlier stamp cell recorded it.
            let center_key =
                ((info.offset.y + 1) * index_side as i32 + info.offset.x + 1) as usize;
            if border_index[center_key] >= 0 {
                let slot = border_index[center_key] as usize;
                border_cells[slot] = None;
                border_count -= 1;
                weight_total -= border_weights[slot];
            }
            border_index[center_key] = -2;
        }

        if air_to_distribute == 0.0 && fog_to_distribute == 0.0 {
            return Ok(());
        }
        if border_count == 0 {
            log::warn!(
                "stamp at {at} has no free border cells; discarding {air_to_distribute} air, \
                 {heat_to_distribute} heat, {fog_to_distribute} fog"
            );
            return Ok(());
        }

        let weight_to_use = if weight_total > 0.0 {
            weight_total
        } else {
            border_count as f64
        };
        let air_per_unit = air_to_distribute / weight_to_use;
        let heat_per_unit = heat_to_distribute / weight_to_use;
        let fog_per_unit = fog_to_distribute / weight_to_use;

        for (slot, target) in border_cells.iter().enumerate() {
            let Some((bx, by)) = *target else { continue };
            let weight = if weight_total > 0.0 {
                border_weights[slot]
            } else {
                1.0
            };
            let cell = front.cell_mut(bx, by);
            cell.air_pressure += air_per_unit * weight;
            cell.heat_energy += heat_per_unit * weight;
            cell.fog += fog_per_unit * weight;
        }

        Ok(())
    }

    /// Move a stamp: extract the cells under it, zero them, clear their
    /// metadata, and re-place them at the new position. The vacated mass
    /// feeds the new placement's border redistribution, weighted by
    /// `velocity`.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn move_stamp(
        &mut self,
        old: Coord,
        new: Coord,
        stamp: &wisp_core::Stamp,
        velocity: Option<Coord>,
    ) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        let mut cells: Vec<CellInfo> = Vec::with_capacity(stamp.map_coords().len());
        {
            let (width, height) = (self.width, self.height);
            let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height;
            let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");
            let meta = Arc::get_mut(&mut self.meta).expect("metadata uniquely held while settled");
            let spare = self.spare.as_mut();

            for &offset in stamp.map_coords() {
                let x = old.x + offset.x;
                let y = old.y + offset.y;
                if !in_bounds(x, y) {
                    continue;
                }
                let (ux, uy) = (x as usize, y as usize);
                cells.push(CellInfo {
                    offset,
                    cell: *front.cell(ux, uy),
                    meta: *meta.at(ux, uy),
                });
                *front.cell_mut(ux, uy) = Cell::default();
                *meta.at_mut(ux, uy) = CellMetadata::default();
            }
            if let Some(spare) = spare {
                for &offset in stamp.map_coords() {
                    let x = old.x + offset.x;
                    let y = old.y + offset.y;
                    if in_bounds(x, y) {
                        *spare.cell_mut(x as usize, y as usize) = Cell::default();
                    }
                }
            }
        }

        self.place_stamp(new, &cells, velocity)
    }

    /// Zero the cells under a stamp in both buffers and clear their
    /// metadata. The matter they held is discarded.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn clear_cells(&mut self, at: Coord, stamp: &wisp_core::Stamp) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        let (width, height) = (self.width, self.height);
        let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height;
        let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");
        let meta = Arc::get_mut(&mut self.meta).expect("metadata uniquely held while settled");
        let spare = self.spare.as_mut();

        for &offset in stamp.map_coords() {
            let x = at.x + offset.x;
            let y = at.y + offset.y;
            if !in_bounds(x, y) {
                continue;
            }
            let (ux, uy) = (x as usize, y as usize);
            *front.cell_mut(ux, uy) = Cell::default();
            *meta.at_mut(ux, uy) = CellMetadata::default();
        }
        // Zero the spare too so a cleared region stays inert even if no
        // frame runs between the clear and the next mutation.
        if let Some(spare) = spare {
            for &offset in stamp.map_coords() {
                let x = at.x + offset.x;
                let y = at.y + offset.y;
                if in_bounds(x, y) {
                    *spare.cell_mut(x as usize, y as usize) = Cell::default();
                }
            }
        }

        Ok(())
    }

    /// Stamp a solid object's footprint: blocked metadata, object heat at
    /// the given temperature and an initial flow radiating outward from
    /// the stamp centre.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn place_object(
        &mut self,
        at: Coord,
        stamp: &wisp_core::Stamp,
        object: ObjectId,
        temp_coefficient: f64,
        initial_temperature: f64,
    ) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        let heat_energy = initial_temperature * temp_coefficient;
        let half = SUBDIVISION_COUNT as f64 / 2.0;
        let cells: Vec<CellInfo> = stamp
            .map_coords()
            .iter()
            .map(|&offset| CellInfo {
                offset,
                cell: Cell {
                    air_pressure: 0.0,
                    heat_energy,
                    fog: 0.0,
                    flow: [offset.x as f64 - half, offset.y as f64 - half],
                },
                meta: CellMetadata {
                    blocked: true,
                    temp_coefficient,
                    object: Some(object),
                },
            })
            .collect();

        self.place_stamp(at, &cells, None)
    }

    /// Set the heat energy under a stamp to the given temperature,
    /// honouring each cell's heat capacity (object coefficient when
    /// blocked, pressure-derived for air).
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn apply_temperature_stamp(
        &mut self,
        at: Coord,
        stamp: &wisp_core::Stamp,
        temperature: f64,
    ) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        let (width, height) = (self.width, self.height);
        let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height;
        let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");
        let meta = Arc::get_mut(&mut self.meta).expect("metadata uniquely held while settled");

        for &offset in stamp.map_coords() {
            let x = at.x + offset.x;
            let y = at.y + offset.y;
            if !in_bounds(x, y) {
                continue;
            }
            let (ux, uy) = (x as usize, y as usize);
            let m = meta.at(ux, uy);
            let cell = front.cell_mut(ux, uy);
            let tc = if m.blocked {
                m.temp_coefficient
            } else {
                AIRTEMPCOEFF_PER_PRESSURE * cell.air_pressure
            };
            cell.heat_energy = temperature * tc;
        }
        Ok(())
    }

    /// Overwrite the flow components under a stamp with
    /// `flow * coefficient`. Used by fans to force directional flow.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::EngineRunning`] while a frame is in flight.
    pub fn apply_flow_stamp(
        &mut self,
        at: Coord,
        stamp: &wisp_core::Stamp,
        flow: (f64, f64),
        coefficient: f64,
    ) -> Result<(), PhysicsError> {
        self.ensure_settled()?;

        let (width, height) = (self.width, self.height);
        let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < width && y < height;
        let front = Arc::get_mut(&mut self.front).expect("grid uniquely held while settled");

        for &offset in stamp.map_coords() {
            let x = at.x + offset.x;
            let y = at.y + offset.y;
            if !in_bounds(x, y) {
                continue;
            }
            let cell = front.cell_mut(x as usize, y as usize);
            cell.flow = [flow.0 * coefficient, flow.1 * coefficient];
        }
        Ok(())
    }

    /// Render the last completed frame into an RGBA pixel buffer:
    /// pressure in red on the left half, fog in the blue/green channels
    /// on the right half, blocked cells in a fixed colour, and optional
    /// per-worker banding in green.
    pub fn to_rgba(&self, min: f64, max: f64, thread_regions: bool) -> Vec<u32> {
        let (w, h) = (self.width as usize, self.height as usize);
        let half = w / 2;
        let worker_count = self.workers.len();
        let mut pixels = Vec::with_capacity(w * h);

        for y in 0..h {
            let band = self
                .slices
                .iter()
                .position(|&(y0, y1)| y >= y0 && y <= y1)
                .unwrap_or(0);
            for x in 0..w {
                let meta = self.meta.at(x, y);
                if meta.blocked {
                    pixels.push(0x0000_00FF);
                    continue;
                }
                let cell = self.front.cell(x, y);
                let scale = |v: f64| (clamp((v - min) / (max - min), 0.0, 1.0) * 255.0) as u32;
                let press_color = scale(cell.air_pressure);
                let fog_color = scale(cell.fog);
                let b = if x >= half { fog_color } else { press_color };
                let r = b;
                let pixel = if thread_regions {
                    let g = (band as f64 / worker_count as f64 * 255.0) as u32;
                    r | (g << 8) | (r << 16)
                } else {
                    r | (b << 8) | (b << 16)
                };
                pixels.push(pixel);
            }
        }
        pixels
    }
}

impl Drop for Automaton {
    fn drop(&mut self) {
        // Drain a frame in flight so every worker is parked on its task
        // channel, then close the channels and join.
        if self.resumed {
            for _ in 0..self.workers.len() {
                let _ = self.done_rx.recv();
            }
        }
        for worker in &mut self.workers {
            worker.task_tx = None;
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.join.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_core::{CellStamp, Stamp};

    fn small(width: i32, height: i32, workers: usize) -> Automaton {
        Automaton::new(
            width,
            height,
            SimulationConfig::default(),
            Some(workers),
            1.0,
            1.0,
        )
        .expect("valid grid")
    }

    fn full_stamp() -> Stamp {
        Stamp::new(CellStamp::full())
    }

    // ── construction ───────────────────────────────────────────

    #[test]
    fn zero_dimension_is_rejected() {
        let result = Automaton::new(0, 10, SimulationConfig::default(), Some(1), 1.0, 1.0);
        assert_eq!(result.err(), Some(PhysicsError::EmptyGrid));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let sim = SimulationConfig {
            flow_damping: 2.0,
            ..SimulationConfig::default()
        };
        let result = Automaton::new(10, 10, sim, Some(1), 1.0, 1.0);
        assert!(matches!(result, Err(PhysicsError::InvalidConfig { .. })));
    }

    #[test]
    fn worker_count_is_capped_by_height() {
        let automaton = small(10, 3, 8);
        assert_eq!(automaton.worker_count(), 3);
    }

    #[test]
    fn initial_state_is_uniform_air() {
        let automaton = small(4, 4, 1);
        let totals = automaton.totals();
        assert!((totals.air_pressure - 16.0).abs() < 1e-12);
        assert!((totals.heat_energy - 16.0).abs() < 1e-12);
        assert_eq!(totals.fog, 0.0);
        assert!(automaton.is_settled());
    }

    // ── state machine ──────────────────────────────────────────

    #[test]
    fn wait_for_on_settled_returns_immediately() {
        let mut automaton = small(4, 4, 1);
        automaton.wait_for();
        automaton.wait_for();
        assert!(automaton.is_settled());
    }

    #[test]
    fn resume_then_wait_for_settles() {
        let mut automaton = small(8, 8, 2);
        automaton.resume();
        assert!(!automaton.is_settled());
        automaton.wait_for();
        assert!(automaton.is_settled());
    }

    #[test]
    #[should_panic(expected = "resume() called on a running automaton")]
    fn double_resume_panics() {
        let mut automaton = small(4, 4, 1);
        automaton.resume();
        automaton.resume();
    }

    #[test]
    fn stamp_api_rejected_while_running() {
        let mut automaton = small(16, 16, 2);
        automaton.resume();
        let err = automaton.clear_cells(Coord::new(0, 0), &full_stamp());
        assert_eq!(err, Err(PhysicsError::EngineRunning));
        automaton.wait_for();
        assert!(automaton
            .clear_cells(Coord::new(0, 0), &full_stamp())
            .is_ok());
    }

    #[test]
    fn reads_work_while_running() {
        let mut automaton = small(8, 8, 2);
        automaton.resume();
        // The front buffer holds the previous frame and stays readable.
        assert!((automaton.cell_at(3, 3).air_pressure - 1.0).abs() < 1e-12);
        assert!(automaton.safe_cell_at(100, 0).is_none());
        automaton.wait_for();
    }

    // ── stamp operations ───────────────────────────────────────

    #[test]
    fn place_then_clear_restores_blocked_and_zeroes_stamp() {
        let mut automaton = small(20, 20, 1);
        let stamp = full_stamp();
        let at = Coord::new(5, 5);
        automaton
            .place_object(at, &stamp, ObjectId(1), 1.0, 1.0)
            .unwrap();
        for &offset in stamp.map_coords() {
            assert!(automaton.meta_at(at.x + offset.x, at.y + offset.y).blocked);
        }
        automaton.clear_cells(at, &stamp).unwrap();
        for &offset in stamp.map_coords() {
            let meta = automaton.meta_at(at.x + offset.x, at.y + offset.y);
            assert!(!meta.blocked);
            let cell = automaton.cell_at(at.x + offset.x, at.y + offset.y);
            assert_eq!(cell.air_pressure, 0.0);
            assert_eq!(cell.heat_energy, 0.0);
            assert_eq!(cell.fog, 0.0);
        }
    }

    #[test]
    fn placement_redistributes_displaced_mass() {
        let mut automaton = small(20, 20, 1);
        let before = automaton.totals();
        automaton
            .place_object(Coord::new(7, 7), &full_stamp(), ObjectId(1), 1.0, 0.0)
            .unwrap();
        let after = automaton.totals();
        // 25 cells of air moved to the border; nothing lost.
        assert!((after.air_pressure - before.air_pressure).abs() < 1e-9);
        // Border cells got the displaced pressure on top of their own.
        assert!(automaton.cell_at(6, 7).air_pressure > 1.0);
    }

    #[test]
    fn velocity_weights_redistribution_toward_movement() {
        let mut automaton = small(30, 30, 1);
        let at = Coord::new(10, 10);
        let cells: Vec<CellInfo> = full_stamp()
            .map_coords()
            .iter()
            .map(|&offset| CellInfo {
                offset,
                meta: CellMetadata {
                    blocked: true,
                    temp_coefficient: 1.0,
                    object: None,
                },
                ..CellInfo::default()
            })
            .collect();
        automaton
            .place_stamp(at, &cells, Some(Coord::new(1, 0)))
            .unwrap();
        // Rightward velocity: the right border receives everything, the
        // left border nothing.
        let right = automaton.cell_at(at.x + SUBDIVISION_COUNT, at.y + 2);
        let left = automaton.cell_at(at.x - 1, at.y + 2);
        assert!(right.air_pressure > 1.0);
        assert!((left.air_pressure - 1.0).abs() < 1e-12);
    }

    #[test]
    fn move_stamp_roundtrip_restores_metadata_and_mass() {
        let mut automaton = small(30, 30, 1);
        let stamp = full_stamp();
        let a = Coord::new(5, 5);
        let b = Coord::new(15, 15);
        automaton
            .place_object(a, &stamp, ObjectId(3), 2.0, 1.0)
            .unwrap();
        let before = automaton.totals();

        automaton.move_stamp(a, b, &stamp, None).unwrap();
        automaton.move_stamp(b, a, &stamp, None).unwrap();

        for &offset in stamp.map_coords() {
            let meta = automaton.meta_at(a.x + offset.x, a.y + offset.y);
            assert!(meta.blocked);
            assert_eq!(meta.object, Some(ObjectId(3)));
            assert_eq!(meta.temp_coefficient, 2.0);
            assert!(!automaton.meta_at(b.x + offset.x, b.y + offset.y).blocked);
        }
        let after = automaton.totals();
        assert!((after.air_pressure - before.air_pressure).abs() < 1e-9);
        assert!((after.heat_energy - before.heat_energy).abs() < 1e-9);
        assert!((after.fog - before.fog).abs() < 1e-9);
    }

    #[test]
    fn out_of_bounds_stamp_cells_are_skipped() {
        let mut automaton = small(10, 10, 1);
        // Top-left corner: part of the stamp hangs outside.
        automaton
            .place_object(Coord::new(-2, -2), &full_stamp(), ObjectId(1), 1.0, 1.0)
            .unwrap();
        assert!(automaton.meta_at(0, 0).blocked);
        assert!(automaton.meta_at(2, 2).blocked);
        assert!(!automaton.meta_at(3, 3).blocked);
    }

    #[test]
    fn no_border_discards_mass() {
        // A stamp covering the whole 5x5 grid has no free border.
        let mut automaton = small(5, 5, 1);
        automaton
            .place_object(Coord::new(0, 0), &full_stamp(), ObjectId(1), 1.0, 0.0)
            .unwrap();
        let totals = automaton.totals();
        assert_eq!(totals.air_pressure, 0.0, "displaced air must be dropped");
    }

    #[test]
    fn temperature_stamp_sets_heat_by_capacity() {
        let mut automaton = small(20, 20, 1);
        let stamp = full_stamp();
        let at = Coord::new(5, 5);
        automaton
            .place_object(at, &stamp, ObjectId(1), 2.0, 1.0)
            .unwrap();
        automaton.apply_temperature_stamp(at, &stamp, 3.0).unwrap();
        // Blocked cell: heat = T * object coefficient.
        assert!((automaton.cell_at(at.x, at.y).heat_energy - 6.0).abs() < 1e-12);
    }

    #[test]
    fn flow_stamp_overwrites_flow() {
        let mut automaton = small(20, 20, 1);
        let stamp = full_stamp();
        automaton
            .apply_flow_stamp(Coord::new(5, 5), &stamp, (3.0, -1.0), 0.2)
            .unwrap();
        let cell = automaton.cell_at(6, 6);
        assert!((cell.flow[0] - 0.6).abs() < 1e-12);
        assert!((cell.flow[1] + 0.2).abs() < 1e-12);
    }

    #[test]
    fn rgba_buffer_has_one_pixel_per_cell() {
        let mut automaton = small(8, 8, 2);
        automaton
            .place_object(Coord::new(0, 0), &full_stamp(), ObjectId(1), 1.0, 1.0)
            .unwrap();
        let pixels = automaton.to_rgba(0.0, 2.0, false);
        assert_eq!(pixels.len(), 64);
        // Blocked corner uses the fixed obstacle colour.
        assert_eq!(pixels[0], 0x0000_00FF);
        let banded = automaton.to_rgba(0.0, 2.0, true);
        assert_eq!(banded.len(), 64);
    }
}
