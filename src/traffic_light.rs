//! A traffic light that toggles between red and green on its own thread.
//!
//! Every phase change is pushed into a [`MessageQueue`] per interested
//! caller, so any number of threads can block in
//! [`TrafficLight::wait_for_green`] and all of them are released by the same
//! green transition.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::message_queue::MessageQueue;

static NEXT_LIGHT_ID: AtomicU64 = AtomicU64::new(1);

const RED: u8 = 0;
const GREEN: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Red,
    Green,
}

impl Phase {
    pub fn toggled(self) -> Phase {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    fn from_u8(value: u8) -> Phase {
        if value == GREEN {
            Phase::Green
        } else {
            Phase::Red
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Phase::Red => RED,
            Phase::Green => GREEN,
        }
    }
}

impl Default for Phase {
    fn default() -> Phase {
        Phase::Red
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Red => write!(f, "red"),
            Phase::Green => write!(f, "green"),
        }
    }
}

/// Timing of the cycling loop.
///
/// Each phase lasts a duration drawn uniformly from
/// `[min_cycle, max_cycle)`. The loop wakes every `poll_interval` to check
/// the clock and its cancel flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleConfig {
    min_cycle: Duration,
    max_cycle: Duration,
    poll_interval: Duration,
}

impl CycleConfig {
    pub fn new(min_cycle: Duration, max_cycle: Duration, poll_interval: Duration) -> Result<CycleConfig> {
        if min_cycle >= max_cycle {
            return Err(Error::InvalidConfig(format!(
                "min cycle {:?} must be shorter than max cycle {:?}",
                min_cycle, max_cycle
            )));
        }
        if poll_interval == Duration::from_secs(0) {
            return Err(Error::InvalidConfig("poll interval must be non-zero".to_string()));
        }
        Ok(CycleConfig {
            min_cycle,
            max_cycle,
            poll_interval,
        })
    }

    pub fn min_cycle(&self) -> Duration {
        self.min_cycle
    }

    pub fn max_cycle(&self) -> Duration {
        self.max_cycle
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for CycleConfig {
    fn default() -> CycleConfig {
        CycleConfig {
            min_cycle: Duration::from_secs(4),
            max_cycle: Duration::from_secs(6),
            poll_interval: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Changed(Phase),
    Halted,
}

struct Shared {
    id: u64,
    config: CycleConfig,
    // written only by the cycling thread
    phase: AtomicU8,
    subscribers: Mutex<Subscribers>,
    next_subscriber: AtomicU64,
}

#[derive(Default)]
struct Subscribers {
    queues: HashMap<u64, MessageQueue<Signal>>,
    // set by `stop`, cleared by `simulate`
    halted: bool,
}

impl Shared {
    fn broadcast(&self, signal: Signal) {
        for queue in lock(&self.subscribers).queues.values() {
            queue.send(signal);
        }
    }

    fn halt(&self) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.halted = true;
        for queue in subscribers.queues.values() {
            queue.send(Signal::Halted);
        }
    }

    fn resume(&self) {
        lock(&self.subscribers).halted = false;
    }
}

struct Cycler {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

pub struct TrafficLight {
    shared: Arc<Shared>,
    cycler: Mutex<Option<Cycler>>,
}

impl TrafficLight {
    pub fn new() -> TrafficLight {
        TrafficLight::with_config(CycleConfig::default())
    }

    pub fn with_config(config: CycleConfig) -> TrafficLight {
        TrafficLight {
            shared: Arc::new(Shared {
                id: NEXT_LIGHT_ID.fetch_add(1, Ordering::Relaxed),
                config,
                phase: AtomicU8::new(Phase::Red.as_u8()),
                subscribers: Mutex::new(Subscribers::default()),
                next_subscriber: AtomicU64::new(0),
            }),
            cycler: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> CycleConfig {
        self.shared.config
    }

    pub fn current_phase(&self) -> Phase {
        Phase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        lock(&self.cycler).is_some()
    }

    /// Starts the cycling thread. Only one may run per light; call `stop`
    /// before starting it again.
    pub fn simulate(&self) -> Result<()> {
        let mut cycler = lock(&self.cycler);
        if cycler.is_some() {
            return Err(Error::AlreadyRunning(self.shared.id));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let shared = self.shared.clone();
        let flag = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("traffic-light-{}", self.shared.id))
            .spawn(move || cycle_through_phases(&shared, &flag))?;

        *cycler = Some(Cycler { handle, cancel });
        self.shared.resume();
        info!(light = self.shared.id, phase = %self.current_phase(), "traffic light started cycling");
        Ok(())
    }

    /// Cancels and joins the cycling thread, then releases every waiter
    /// with [`Error::Halted`]. Callers that start waiting afterwards get
    /// the same error until the light is simulated again.
    pub fn stop(&self) {
        let mut cycler = lock(&self.cycler);
        if let Some(Cycler { handle, cancel }) = cycler.take() {
            cancel.store(true, Ordering::Release);
            if handle.join().is_err() {
                error!(light = self.shared.id, "cycling thread panicked");
            }
            info!(light = self.shared.id, phase = %self.current_phase(), "traffic light stopped");
        }
        self.shared.halt();
    }

    /// Registers a fresh queue that receives every subsequent phase change.
    ///
    /// Changes pile up in the queue until the next `recv` drains them, so a
    /// receiver that is kept around but never read grows by one entry per
    /// phase change. Drop it once it is no longer needed.
    ///
    /// On a stopped light the queue starts out holding the halt signal.
    pub fn subscribe(&self) -> PhaseReceiver {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let queue = MessageQueue::new();
        let mut subscribers = lock(&self.shared.subscribers);
        if subscribers.halted {
            queue.send(Signal::Halted);
        }
        subscribers.queues.insert(id, queue.clone());
        drop(subscribers);
        PhaseReceiver {
            id,
            queue,
            shared: self.shared.clone(),
        }
    }

    /// Blocks until the light turns green.
    ///
    /// A caller arriving while the light is already green waits for the next
    /// green transition.
    pub fn wait_for_green(&self) -> Result<()> {
        let receiver = self.subscribe();
        loop {
            if receiver.recv()? == Phase::Green {
                debug!(light = self.shared.id, "released on green");
                return Ok(());
            }
            thread::sleep(self.shared.config.poll_interval);
        }
    }

    pub fn wait_for_green_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let receiver = self.subscribe();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if receiver.recv_timeout(remaining)? == Phase::Green {
                debug!(light = self.shared.id, "released on green");
                return Ok(());
            }
            thread::sleep(self.shared.config.poll_interval);
        }
    }
}

impl Default for TrafficLight {
    fn default() -> TrafficLight {
        TrafficLight::new()
    }
}

impl Drop for TrafficLight {
    fn drop(&mut self) {
        if self.is_running() {
            info!(light = self.shared.id, "traffic light is waiting for its cycling thread to be joined");
        }
        self.stop();
    }
}

/// Phase changes of one light, delivered through a private mailbox.
///
/// Only the newest unread change is kept. Dropping the receiver
/// unsubscribes it.
pub struct PhaseReceiver {
    id: u64,
    queue: MessageQueue<Signal>,
    shared: Arc<Shared>,
}

impl PhaseReceiver {
    pub fn recv(&self) -> Result<Phase> {
        match self.queue.receive() {
            Signal::Changed(phase) => Ok(phase),
            Signal::Halted => Err(Error::Halted),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Phase> {
        match self.queue.receive_timeout(timeout) {
            Some(Signal::Changed(phase)) => Ok(phase),
            Some(Signal::Halted) => Err(Error::Halted),
            None => Err(Error::Timeout),
        }
    }
}

impl Drop for PhaseReceiver {
    fn drop(&mut self) {
        lock(&self.shared.subscribers).queues.remove(&self.id);
    }
}

fn cycle_through_phases(shared: &Shared, cancel: &AtomicBool) {
    let config = shared.config;
    let mut rng = StdRng::from_entropy();
    let cycles = Uniform::new(config.min_cycle, config.max_cycle);

    let mut cycle = cycles.sample(&mut rng);
    let mut start = Instant::now();
    while !cancel.load(Ordering::Acquire) {
        thread::sleep(config.poll_interval);
        if start.elapsed() < cycle {
            continue;
        }

        start = Instant::now();
        cycle = cycles.sample(&mut rng);
        let phase = Phase::from_u8(shared.phase.fetch_xor(1, Ordering::AcqRel)).toggled();
        debug!(light = shared.id, %phase, next_cycle = ?cycle, "phase changed");
        shared.broadcast(Signal::Changed(phase));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
