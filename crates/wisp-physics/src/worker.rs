//! Worker threads: one horizontal row slice per worker, per frame.
//!
//! Workers are persistent OS threads parked on their task channel. Each
//! frame the automaton sends a [`SliceTask`] carrying the shared input
//! grid, the slice's owned output rows and the shared boundary rows; the
//! worker replies on the common done channel with its owned rows. Closing
//! the task channel is the termination signal.
//!
//! # Synchronization contract
//!
//! - The bottom row of each slice is shared with the slice below behind a
//!   mutex, because the lower slice's top-row updates accumulate into it.
//! - A worker activates its bottom row first and then fires the forward
//!   hand-off, so the slice below's top-row read happens-after the
//!   activation copy.
//! - Boundary mutexes are always locked in increasing row order, which
//!   rules out lock cycles between adjacent workers.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use wisp_core::{Cell, SimulationConfig};

use crate::grid::{CellGrid, MetaGrid};
use crate::kernels::{activate_cell, activate_row, fog_flow, pressure_flow, temperature_flow};

/// A shared output boundary row.
pub(crate) type BoundaryRow = Arc<Mutex<Vec<Cell>>>;

/// Everything a worker needs to compute one frame of its slice.
pub(crate) struct SliceTask {
    /// The previous frame, shared read-only with every worker.
    pub input: Arc<CellGrid>,
    /// Obstruction metadata, read-only during the frame.
    pub meta: Arc<MetaGrid>,
    /// Friction configuration.
    pub sim: SimulationConfig,
    /// First row of the slice.
    pub y0: usize,
    /// Last row of the slice (inclusive).
    pub y1: usize,
    /// Owned output rows: `y0..y1`, plus `y1` when there is no slice
    /// below.
    pub rows: Vec<Vec<Cell>>,
    /// Output row `y0 - 1`, shared with the slice above.
    pub top_boundary: Option<BoundaryRow>,
    /// Output row `y1`, shared with the slice below.
    pub bottom_boundary: Option<BoundaryRow>,
    /// Fires once the slice above has activated its bottom row.
    pub forward_up: Option<Receiver<()>>,
    /// Fired after this slice activates its bottom row.
    pub forward_down: Option<Sender<()>>,
}

/// A worker's completed frame: its owned output rows, unchanged in count.
pub(crate) struct SliceDone {
    /// Which worker finished.
    pub index: usize,
    /// The owned rows sent back for reassembly.
    pub rows: Vec<Vec<Cell>>,
}

/// Worker thread entry point. Runs until the task channel closes.
pub(crate) fn worker_main(index: usize, task_rx: Receiver<SliceTask>, done_tx: Sender<SliceDone>) {
    while let Ok(task) = task_rx.recv() {
        let rows = run_slice(task);
        // The automaton outlives its workers except during teardown,
        // where a dropped receiver just ends the loop.
        if done_tx.send(SliceDone { index, rows }).is_err() {
            break;
        }
    }
}

/// Compute one frame of the slice. Consumes the task so every shared
/// handle is dropped before the rows are reported back.
fn run_slice(task: SliceTask) -> Vec<Vec<Cell>> {
    let SliceTask {
        input,
        meta,
        sim,
        y0,
        y1,
        mut rows,
        top_boundary,
        bottom_boundary,
        forward_up,
        forward_down,
    } = task;

    // Bottom row first: activation is a pure scalar copy with no
    // neighbour access, so the slice below may read the row as soon as
    // the hand-off fires.
    match &bottom_boundary {
        Some(shared) => {
            let mut row = shared.lock().expect("boundary row mutex poisoned");
            activate_row(row.as_mut_slice(), input.row(y1));
        }
        None => {
            let row = rows.last_mut().expect("slice owns its bottom row");
            activate_row(row.as_mut_slice(), input.row(y1));
        }
    }
    if let Some(tx) = &forward_down {
        let _ = tx.send(());
    }
    if let Some(rx) = &forward_up {
        let _ = rx.recv();
    }

    if y0 == y1 {
        // Single-row slice: the activation above covered the whole slice;
        // one edge pass under both boundary locks, taken in increasing
        // row order.
        let mut top_guard = top_boundary
            .as_ref()
            .map(|m| m.lock().expect("boundary row mutex poisoned"));
        let top_slice = top_guard.as_mut().map(|g| g.as_mut_slice());
        match &bottom_boundary {
            Some(shared) => {
                let mut row = shared.lock().expect("boundary row mutex poisoned");
                process_row(
                    &sim,
                    &meta,
                    &input,
                    y0,
                    row.as_mut_slice(),
                    top_slice,
                    false,
                );
            }
            None => {
                let row = rows.last_mut().expect("slice owns its bottom row");
                process_row(
                    &sim,
                    &meta,
                    &input,
                    y0,
                    row.as_mut_slice(),
                    top_slice,
                    false,
                );
            }
        }
    } else {
        // Top row, under the upstream boundary lock when one exists.
        match &top_boundary {
            Some(shared) => {
                let mut up = shared.lock().expect("boundary row mutex poisoned");
                process_row(
                    &sim,
                    &meta,
                    &input,
                    y0,
                    rows[0].as_mut_slice(),
                    Some(up.as_mut_slice()),
                    true,
                );
            }
            None => {
                process_row(&sim, &meta, &input, y0, rows[0].as_mut_slice(), None, true);
            }
        }

        // Interior rows, lock-free.
        for y in (y0 + 1)..y1 {
            let idx = y - y0;
            let (before, after) = rows.split_at_mut(idx);
            process_row(
                &sim,
                &meta,
                &input,
                y,
                after[0].as_mut_slice(),
                Some(before[idx - 1].as_mut_slice()),
                true,
            );
        }

        // Bottom row again, this time running the edge updates. It was
        // already activated above, hence `activate = false`.
        match &bottom_boundary {
            Some(shared) => {
                let mut row = shared.lock().expect("boundary row mutex poisoned");
                let up_idx = y1 - 1 - y0;
                process_row(
                    &sim,
                    &meta,
                    &input,
                    y1,
                    row.as_mut_slice(),
                    Some(rows[up_idx].as_mut_slice()),
                    false,
                );
            }
            None => {
                let idx = y1 - y0;
                let (before, after) = rows.split_at_mut(idx);
                process_row(
                    &sim,
                    &meta,
                    &input,
                    y1,
                    after[0].as_mut_slice(),
                    Some(before[idx - 1].as_mut_slice()),
                    false,
                );
            }
        }
    }

    drop(input);
    drop(meta);
    drop(top_boundary);
    drop(bottom_boundary);
    rows
}

/// Run the per-cell update over one output row.
///
/// `out_up` is the output row directly above, `None` only for the very
/// first grid row. When `activate` is set, the row is first refreshed
/// from the input buffer.
fn process_row(
    sim: &SimulationConfig,
    meta: &MetaGrid,
    input: &CellGrid,
    y: usize,
    out_row: &mut [Cell],
    mut out_up: Option<&mut [Cell]>,
    activate: bool,
) {
    let width = input.width();

    if activate {
        for x in 0..width {
            activate_cell(&mut out_row[x], input.cell(x, y));
        }
    }

    for x in 0..width {
        let m_self = meta.at(x, y);

        // Left neighbour, axis 0.
        if x > 0 {
            let m_left = meta.at(x - 1, y);
            let b_self = input.cell(x, y);
            let b_left = input.cell(x - 1, y);
            let (left_part, right_part) = out_row.split_at_mut(x);
            let f_self = &mut right_part[0];
            let f_left = &mut left_part[x - 1];
            if !m_self.blocked && !m_left.blocked {
                pressure_flow(sim, b_self, b_left, f_self, f_left, 0);
                fog_flow(sim, b_self, b_left, f_self, f_left);
            }
            temperature_flow(sim, m_self, b_self, f_self, m_left, b_left, f_left);
        }

        // Upper neighbour, axis 1.
        if let Some(up_row) = out_up.as_deref_mut() {
            let m_up = meta.at(x, y - 1);
            let b_self = input.cell(x, y);
            let b_up = input.cell(x, y - 1);
            let f_self = &mut out_row[x];
            let f_up = &mut up_row[x];
            if !m_self.blocked && !m_up.blocked {
                pressure_flow(sim, b_self, b_up, f_self, f_up, 1);
                fog_flow(sim, b_self, b_up, f_self, f_up);
            }
            temperature_flow(sim, m_self, b_self, f_self, m_up, b_up, f_up);
        }
    }
}
