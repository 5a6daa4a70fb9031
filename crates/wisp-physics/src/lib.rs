//! Multi-threaded cellular automaton for the Wisp grid-physics engine.
//!
//! [`Automaton`] advances air pressure, directional flow, heat energy and
//! fog density on a fine grid using a damped-moving-average diffusion
//! scheme with blocking obstacles. The grid is double-buffered and
//! partitioned into horizontal row slices, one per worker thread; adjacent
//! slices synchronize through a one-way activation hand-off and a shared
//! boundary-row lock.
//!
//! The engine is always in exactly one of two states:
//!
//! - **settled** — the worker set is parked, the last frame's output is
//!   readable and every stamp/mutation API is available;
//! - **running** — the workers own the output buffer and compute the next
//!   frame; only read accessors may be used.
//!
//! [`Automaton::resume`] moves settled → running without blocking;
//! [`Automaton::wait_for`] blocks until running → settled and swaps the
//! buffers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod automaton;
pub mod grid;
mod kernels;
mod worker;

pub use automaton::{Automaton, GridTotals};
pub use grid::{CellGrid, MetaGrid};
