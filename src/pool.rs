//! Pausable worker pool.
//!
//! A fixed set of threads runs a [`Job`] step by step while the pool is
//! running. `pause` is the only cancellation primitive: it clears the run
//! flag and blocks until every worker has finished its current step and gone
//! idle. A worker can also stop the whole pool by itself, when its job has
//! nothing left to do; the driver notices through `wait_pause`.
//!
//! Each worker has its own [`WorkerStats`]. They are only meant to be read
//! while the pool is paused.

use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Most win types any shape has.
pub const MAX_WIN_TYPES: usize = 3;

/// Running count, sum, min and max of a length.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthStats {
    pub num: u64,
    pub sum: u64,
    pub sum_sq: u64,
    pub min: u32,
    pub max: u32,
}

impl DepthStats {
    pub fn add(&mut self, value: u32) {
        if self.num == 0 || value < self.min {
            self.min = value;
        }
        self.max = self.max.max(value);
        self.num += 1;
        self.sum += value as u64;
        self.sum_sq += value as u64 * value as u64;
    }

    pub fn avg(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.sum as f64 / self.num as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.num == 0 {
            return 0.0;
        }
        let avg = self.avg();
        (self.sum_sq as f64 / self.num as f64 - avg * avg).max(0.0).sqrt()
    }
}

impl AddAssign<&DepthStats> for DepthStats {
    fn add_assign(&mut self, other: &DepthStats) {
        if other.num == 0 {
            return;
        }
        if self.num == 0 || other.min < self.min {
            self.min = other.min;
        }
        self.max = self.max.max(other.max);
        self.num += other.num;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }
}

impl fmt::Display for DepthStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "num {}, avg {:.2}, std dev {:.2}, min {}, max {}",
            self.num,
            self.avg(),
            self.std_dev(),
            self.min,
            self.max
        )
    }
}

/// Phases of a simulation that can be timed.
pub const PHASES: [&str; 3] = ["descend", "rollout", "backup"];

/// Counters one worker keeps about its simulations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerStats {
    pub runs: u64,
    /// Moves per simulated game, tree and rollout together
    pub game_len: DepthStats,
    /// Depth reached inside the tree
    pub tree_len: DepthStats,
    /// Game lengths per winner (P1, P2) and win type
    pub win_types: [[DepthStats; MAX_WIN_TYPES]; 2],
    pub draws: u64,
    /// Time spent in each of [`PHASES`], when profiling
    pub times: [Duration; 3],
}

impl WorkerStats {
    pub fn reset(&mut self) {
        *self = WorkerStats::default();
    }
}

impl AddAssign<&WorkerStats> for WorkerStats {
    fn add_assign(&mut self, other: &WorkerStats) {
        self.runs += other.runs;
        self.game_len += &other.game_len;
        self.tree_len += &other.tree_len;
        for (mine, theirs) in self.win_types.iter_mut().zip(&other.win_types) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }
        self.draws += other.draws;
        for (a, b) in self.times.iter_mut().zip(&other.times) {
            *a += *b;
        }
    }
}

/// Work a pool thread repeats while the pool runs.
pub trait Job: Send + 'static {
    /// Do one unit of work. Returning false stops the whole pool.
    fn step(&mut self, stats: &mut WorkerStats) -> bool;
}

#[derive(Debug, Default)]
struct State {
    run: bool,
    quit: bool,
    active: usize,
}

#[derive(Debug, Default)]
struct Control {
    state: Mutex<State>,
    cond: Condvar,
    /// Mirror of `State::run` that workers poll between steps
    running: AtomicBool,
}

impl Control {
    fn set_run(&self, state: &mut State, run: bool) {
        state.run = run;
        self.running.store(run, Ordering::Release);
        self.cond.notify_all();
    }
}

struct Worker {
    handle: Option<JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

pub struct WorkerPool<J: Job> {
    control: Arc<Control>,
    workers: Vec<Worker>,
    _job: std::marker::PhantomData<fn() -> J>,
}

fn worker_loop<J: Job>(control: Arc<Control>, stats: Arc<Mutex<WorkerStats>>, mut job: J) {
    let mut state = control.state.lock();
    loop {
        while !state.run && !state.quit {
            control.cond.wait(&mut state);
        }
        if state.quit {
            break;
        }
        state.active += 1;
        drop(state);

        while control.running.load(Ordering::Acquire) {
            let more = job.step(&mut stats.lock());
            if !more {
                let mut state = control.state.lock();
                control.set_run(&mut state, false);
            }
        }

        state = control.state.lock();
        state.active -= 1;
        control.cond.notify_all();
    }
}

impl<J: Job> WorkerPool<J> {
    /// Create a paused pool with no threads.
    pub fn new() -> Self {
        WorkerPool {
            control: Arc::new(Control::default()),
            workers: Vec::new(),
            _job: std::marker::PhantomData,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Grow or shrink the pool to `n` threads, building new jobs with
    /// `make(worker_index)`. Pauses the pool.
    pub fn set_num_threads(&mut self, n: usize, mut make: impl FnMut(usize) -> J) {
        self.pause();
        if n < self.workers.len() {
            // stop everyone and start over with the threads we keep
            self.shutdown();
        }
        while self.workers.len() < n {
            let i = self.workers.len();
            let control = Arc::clone(&self.control);
            let stats = Arc::new(Mutex::new(WorkerStats::default()));
            let thread_stats = Arc::clone(&stats);
            let job = make(i);
            let spawned = std::thread::Builder::new()
                .name(format!("search-{i}"))
                .spawn(move || worker_loop(control, thread_stats, job));
            match spawned {
                Ok(handle) => self.workers.push(Worker {
                    handle: Some(handle),
                    stats,
                }),
                Err(e) => {
                    log::error!("Could not start worker thread {i}: {e}");
                    break;
                }
            }
        }
    }

    fn shutdown(&mut self) {
        {
            let mut state = self.control.state.lock();
            state.quit = true;
            self.control.set_run(&mut state, false);
        }
        for w in &mut self.workers {
            if let Some(handle) = w.handle.take() {
                if handle.join().is_err() {
                    log::error!("A worker thread panicked");
                }
            }
        }
        self.workers.clear();
        self.control.state.lock().quit = false;
    }

    /// Let the workers run.
    pub fn resume(&self) {
        let mut state = self.control.state.lock();
        self.control.set_run(&mut state, true);
    }

    /// Stop the workers and wait until all of them are idle.
    pub fn pause(&self) {
        let mut state = self.control.state.lock();
        self.control.set_run(&mut state, false);
        while state.active > 0 {
            self.control.cond.wait(&mut state);
        }
    }

    /// Wait until a worker stops the pool or `timeout` runs out, then pause.
    /// Returns true if the workers stopped by themselves.
    pub fn wait_pause(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut stopped = true;
        {
            let mut state = self.control.state.lock();
            while state.run {
                match deadline {
                    Some(d) => {
                        if self.control.cond.wait_until(&mut state, d).timed_out() {
                            stopped = !state.run;
                            break;
                        }
                    }
                    None => self.control.cond.wait(&mut state),
                }
            }
        }
        self.pause();
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::Acquire)
    }

    /// Sum of all workers' statistics. Call while paused.
    pub fn stats(&self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for w in &self.workers {
            total += &*w.stats.lock();
        }
        total
    }

    pub fn reset_stats(&self) {
        for w in &self.workers {
            w.stats.lock().reset();
        }
    }
}

impl<J: Job> Default for WorkerPool<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: Job> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct Counter {
        total: Arc<AtomicU64>,
        limit: u64,
    }

    impl Job for Counter {
        fn step(&mut self, stats: &mut WorkerStats) -> bool {
            let n = self.total.fetch_add(1, Ordering::Relaxed);
            if n >= self.limit {
                self.total.fetch_sub(1, Ordering::Relaxed);
                return false;
            }
            stats.runs += 1;
            stats.game_len.add((n % 7) as u32);
            true
        }
    }

    fn pool(threads: usize, total: &Arc<AtomicU64>, limit: u64) -> WorkerPool<Counter> {
        let mut pool = WorkerPool::new();
        pool.set_num_threads(threads, |_| Counter {
            total: Arc::clone(total),
            limit,
        });
        pool
    }

    #[test]
    fn test_workers_stop_themselves() {
        let total = Arc::new(AtomicU64::new(0));
        let pool = pool(3, &total, 1000);
        assert_eq!(pool.num_threads(), 3);
        pool.resume();
        assert!(pool.wait_pause(Some(Duration::from_secs(30))));
        assert!(!pool.is_running());
        assert_eq!(total.load(Ordering::Relaxed), 1000);
        let stats = pool.stats();
        assert_eq!(stats.runs, 1000);
        assert_eq!(stats.game_len.num, 1000);
        pool.reset_stats();
        assert_eq!(pool.stats().runs, 0);
    }

    #[test]
    fn test_pause_and_resume() {
        let total = Arc::new(AtomicU64::new(0));
        let mut pool = pool(2, &total, u64::MAX);
        pool.resume();
        assert!(!pool.wait_pause(Some(Duration::from_millis(20))));
        let after_pause = total.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(total.load(Ordering::Relaxed), after_pause);

        pool.resume();
        std::thread::sleep(Duration::from_millis(10));
        pool.pause();
        assert!(total.load(Ordering::Relaxed) >= after_pause);

        pool.set_num_threads(1, |_| Counter {
            total: Arc::clone(&total),
            limit: u64::MAX,
        });
        assert_eq!(pool.num_threads(), 1);
    }

    #[test]
    fn test_depth_stats() {
        let mut a = DepthStats::default();
        for v in [3, 5, 7] {
            a.add(v);
        }
        assert_eq!((a.min, a.max, a.num), (3, 7, 3));
        assert_eq!(a.avg(), 5.0);
        let mut b = DepthStats::default();
        b.add(1);
        b += &a;
        assert_eq!((b.min, b.max, b.num), (1, 7, 4));
        assert!(a.to_string().starts_with("num 3, avg 5.00"));
    }
}
