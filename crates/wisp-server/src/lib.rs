//! Real-time game server loop for the Wisp grid-physics engine.
//!
//! [`Server`] runs a [`Level`]'s tick loop on its own thread against a
//! steady clock, one tick per `time_slice` seconds of wall time. External
//! threads inject work through a double-buffered operation queue and take
//! tear-free snapshots through the interframe read lock.
//!
//! # Frame protocol
//!
//! ```text
//! game thread                    other threads
//!     |                              |
//!     | sleep until tnext            |--enqueue_op(op)-----.
//!     | lock interframe (write)      |   [queue mutex]     |
//!     |   swap op queue/buffer  <----'                     |
//!     |   level.step()               |                     |
//!     |   apply buffered ops         |                     |
//!     |   physics.resume()           |                     |
//!     | unlock interframe            |--sync_safe_point()--'
//!     | tnext += time_slice          |   [read guard, renderer
//!     |                              |    snapshots the level]
//! ```
//!
//! While the automaton computes the next frame in the background, readers
//! holding the interframe lock see the previous frame's output buffer,
//! which stays immutable until the next `wait_for`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wisp_core::LevelError;
use wisp_level::{Level, LevelConfig};

/// An operation applied to the level between two ticks, on the game
/// thread.
pub type LevelOp = Box<dyn FnOnce(&mut Level) + Send + 'static>;

/// The sleep is cut this short so the frame is more likely to start on
/// time; the clock itself is not advanced by it.
const RETURN_EARLY: Duration = Duration::from_micros(100);

struct Shared {
    /// The interframe lock: held for writing across each tick's mutation
    /// phase, for reading by snapshotters.
    level: RwLock<Level>,
    /// Submission side of the operation queue.
    op_queue: Mutex<Vec<LevelOp>>,
    terminated: AtomicBool,
}

/// Errors from server construction.
#[derive(Debug)]
pub enum ServerError {
    /// The level could not be built.
    Level(LevelError),
    /// The game thread could not be spawned.
    ThreadSpawnFailed {
        /// Description from the OS.
        reason: String,
    },
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Level(e) => write!(f, "level: {e}"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn game thread: {reason}")
            }
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Level(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LevelError> for ServerError {
    fn from(e: LevelError) -> Self {
        Self::Level(e)
    }
}

/// Owns a level and drives it in real time on a dedicated game thread.
pub struct Server {
    shared: Arc<Shared>,
    game_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Build a level from `config` and start its game thread.
    ///
    /// # Errors
    ///
    /// Level construction and thread spawn failures.
    pub fn new(config: LevelConfig) -> Result<Self, ServerError> {
        Self::with_level(Level::new(config)?)
    }

    /// Start a game thread driving an existing level.
    ///
    /// # Errors
    ///
    /// [`ServerError::ThreadSpawnFailed`].
    pub fn with_level(level: Level) -> Result<Self, ServerError> {
        let time_slice = level.time_slice();
        let shared = Arc::new(Shared {
            level: RwLock::new(level),
            op_queue: Mutex::new(Vec::new()),
            terminated: AtomicBool::new(false),
        });

        let thread_shared = Arc::clone(&shared);
        let game_thread = thread::Builder::new()
            .name("wisp-game".into())
            .spawn(move || game_thread(thread_shared, time_slice))
            .map_err(|e| ServerError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            shared,
            game_thread: Some(game_thread),
        })
    }

    /// Queue an operation for the next tick. Operations run on the game
    /// thread after the tick's object updates, while the automaton is
    /// settled.
    pub fn enqueue_op(&self, op: LevelOp) {
        self.shared
            .op_queue
            .lock()
            .expect("op queue mutex poisoned")
            .push(op);
    }

    /// Take the interframe read lock. While the guard is held no tick
    /// mutation runs, so the level and the automaton's readable buffer
    /// form a consistent snapshot.
    pub fn sync_safe_point(&self) -> RwLockReadGuard<'_, Level> {
        self.shared
            .level
            .read()
            .expect("interframe lock poisoned")
    }

    /// Whether the game thread has stopped (shutdown or tick fault).
    pub fn terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Acquire)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shared.terminated.store(true, Ordering::Release);
        if let Some(handle) = self.game_thread.take() {
            let _ = handle.join();
        }
    }
}

fn game_thread(shared: Arc<Shared>, time_slice: f64) {
    let frame_duration = Duration::from_secs_f64(time_slice);
    // Always in the future when the loop is on time; an overrunning
    // frame leaves it in the past and the loop catches up without
    // sleeping.
    let mut tnext = Instant::now();
    let mut op_buffer: Vec<LevelOp> = Vec::new();

    while !shared.terminated.load(Ordering::Acquire) {
        let now = Instant::now();
        if tnext > now {
            if let Some(to_sleep) = (tnext - now).checked_sub(RETURN_EARLY) {
                thread::sleep(to_sleep);
            }
            continue;
        }

        if let Err(e) = game_frame(&shared, &mut op_buffer) {
            log::error!("tick aborted, stopping the game thread: {e}");
            shared.terminated.store(true, Ordering::Release);
            return;
        }
        tnext += frame_duration;
    }
}

fn game_frame(shared: &Shared, op_buffer: &mut Vec<LevelOp>) -> Result<(), LevelError> {
    let mut level = shared.level.write().expect("interframe lock poisoned");

    {
        let mut queue = shared.op_queue.lock().expect("op queue mutex poisoned");
        std::mem::swap(&mut *queue, op_buffer);
    }

    // Step waits for the automaton, runs the objects, and leaves the
    // automaton settled so the buffered operations may mutate the grid.
    level.step()?;
    for op in op_buffer.drain(..) {
        op(&mut level);
    }

    // Physics computes the next frame concurrently with whatever the
    // embedder does next.
    level.physics_mut().resume();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_core::Coord;
    use wisp_level::{GameObject, MoveDirection};

    fn config() -> LevelConfig {
        LevelConfig {
            width: 10,
            height: 10,
            time_slice: 0.002,
            physics_workers: Some(2),
            ..LevelConfig::default()
        }
    }

    fn wait_for_ticks(server: &Server, at_least: u64) {
        for _ in 0..2500 {
            {
                let level = server.sync_safe_point();
                if level.ticks() >= at_least {
                    return;
                }
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("server failed to reach {at_least} ticks");
    }

    #[test]
    fn ticks_advance_in_real_time() {
        let server = Server::new(config()).unwrap();
        wait_for_ticks(&server, 10);
        let level = server.sync_safe_point();
        assert!(level.time() > 0.0);
        assert!(!server.terminated());
    }

    #[test]
    fn ops_run_on_the_game_thread() {
        let server = Server::new(config()).unwrap();
        server.enqueue_op(Box::new(|level: &mut Level| {
            level
                .place_object(GameObject::wall(), 4, 4, 1.0)
                .expect("placement in settled state");
        }));

        wait_for_ticks(&server, 3);
        let level = server.sync_safe_point();
        assert!(level.get_cell(4, 4).here.is_some());
    }

    #[test]
    fn player_commands_via_ops() {
        let server = Server::new(config()).unwrap();
        server.enqueue_op(Box::new(|level: &mut Level| {
            level
                .place_player(GameObject::player(), 5, 5)
                .expect("placement")
                .expect("first player");
            level.set_player_action(MoveDirection::Left);
        }));

        // 0.002s ticks, straight movement takes 1s of simulated time:
        // wait for enough ticks to complete it.
        wait_for_ticks(&server, 520);
        let level = server.sync_safe_point();
        let player = level.player().expect("player alive");
        assert_eq!(level.object(player).cell, Coord::new(4, 5));
    }

    #[test]
    fn snapshots_are_consistent_under_load() {
        let server = Server::new(config()).unwrap();
        server.enqueue_op(Box::new(|level: &mut Level| {
            level
                .place_object(GameObject::rock(), 5, 2, 1.0)
                .expect("placement");
        }));

        for _ in 0..50 {
            let level = server.sync_safe_point();
            // here/reserved_by never both set on one tile.
            for y in 0..level.height() {
                for x in 0..level.width() {
                    let cell = level.get_cell(x, y);
                    assert!(cell.here.is_none() || cell.reserved_by.is_none());
                }
            }
            drop(level);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn drop_joins_the_game_thread() {
        let server = Server::new(config()).unwrap();
        wait_for_ticks(&server, 2);
        drop(server);
    }
}
