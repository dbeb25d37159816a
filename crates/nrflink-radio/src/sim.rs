//! Host-side simulated air medium.
//!
//! Any number of [`SimRadio`]s attach to one [`SimAir`]. A transmission is
//! copied into the RX FIFO of every *other* attached radio tuned to the same
//! channel, optionally subject to a seeded random loss rate. Radios keep a log
//! of everything they transmitted so tests can count attempts.
//!
//! Radios are half duplex. Switching to transmit flushes the radio's own RX
//! FIFO, so frames that arrived before a radio last transmitted are never
//! received afterwards. The FIFO holds at most [`RX_FIFO_DEPTH`] frames; a
//! delivery to a full FIFO is dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::error::{RadioError, Result};
use crate::traits::{validate_channel, RadioDriver};

const DEFAULT_SIM_CHANNEL: u8 = 7;

/// Frames a simulated radio buffers before it starts dropping deliveries.
pub const RX_FIFO_DEPTH: usize = 32;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared medium connecting simulated radios.
#[derive(Clone)]
pub struct SimAir {
    inner: Arc<AirInner>,
}

struct AirInner {
    radios: Mutex<Vec<Weak<RadioSlot>>>,
    loss: Mutex<Option<LossModel>>,
    next_id: AtomicU64,
}

struct LossModel {
    rate: f64,
    rng: StdRng,
}

struct RadioSlot {
    id: u64,
    channel: AtomicU8,
    detached: AtomicBool,
    clock_started: AtomicBool,
    addressing: Mutex<Option<(u32, u8)>>,
    inbox: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
    tx_log: Mutex<Vec<Vec<u8>>>,
}

impl SimAir {
    /// Create a lossless medium.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AirInner {
                radios: Mutex::new(Vec::new()),
                loss: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a medium that drops each delivery with probability `rate`.
    ///
    /// The loss pattern is reproducible for a given `seed`.
    pub fn with_loss(rate: f64, seed: u64) -> Self {
        let air = Self::new();
        *lock(&air.inner.loss) = Some(LossModel {
            rate: rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        });
        air
    }

    /// Attach a new radio to this medium, tuned to the default channel.
    pub fn attach(&self) -> SimRadio {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(RadioSlot {
            id,
            channel: AtomicU8::new(DEFAULT_SIM_CHANNEL),
            detached: AtomicBool::new(false),
            clock_started: AtomicBool::new(false),
            addressing: Mutex::new(None),
            inbox: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            tx_log: Mutex::new(Vec::new()),
        });

        let mut radios = lock(&self.inner.radios);
        radios.retain(|weak| weak.strong_count() > 0);
        radios.push(Arc::downgrade(&slot));
        debug!(radio = id, "radio attached to simulated air");

        SimRadio {
            slot,
            air: self.clone(),
        }
    }

    /// Number of radios currently attached.
    pub fn radio_count(&self) -> usize {
        lock(&self.inner.radios)
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn broadcast(&self, from: u64, channel: u8, bytes: &[u8]) {
        let peers: Vec<Arc<RadioSlot>> = lock(&self.inner.radios)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| slot.id != from)
            .collect();

        for peer in peers {
            if peer.detached.load(Ordering::Acquire)
                || peer.channel.load(Ordering::Acquire) != channel
            {
                continue;
            }
            if self.lose_delivery() {
                trace!(from, to = peer.id, len = bytes.len(), "delivery lost");
                continue;
            }
            peer.deliver(bytes);
        }
    }

    fn lose_delivery(&self) -> bool {
        match lock(&self.inner.loss).as_mut() {
            Some(model) if model.rate > 0.0 => model.rng.gen_bool(model.rate),
            _ => false,
        }
    }
}

impl RadioSlot {
    fn deliver(&self, bytes: &[u8]) {
        let mut inbox = lock(&self.inbox);
        if inbox.len() >= RX_FIFO_DEPTH {
            trace!(radio = self.id, len = bytes.len(), "rx fifo full; delivery dropped");
            return;
        }
        inbox.push_back(bytes.to_vec());
        drop(inbox);
        self.ready.notify_all();
    }
}

impl Default for SimAir {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimAir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimAir")
            .field("radios", &self.radio_count())
            .finish()
    }
}

/// A radio attached to a [`SimAir`].
pub struct SimRadio {
    slot: Arc<RadioSlot>,
    air: SimAir,
}

impl SimRadio {
    /// Queue bytes as if they had arrived over the air.
    pub fn inject(&self, bytes: &[u8]) {
        self.slot.deliver(bytes);
    }

    /// Copy of every frame this radio transmitted, oldest first.
    pub fn tx_log(&self) -> Vec<Vec<u8>> {
        lock(&self.slot.tx_log).clone()
    }

    /// Forget previously transmitted frames.
    pub fn clear_tx_log(&self) {
        lock(&self.slot.tx_log).clear();
    }

    /// Number of inbound frames waiting to be received.
    pub fn pending(&self) -> usize {
        lock(&self.slot.inbox).len()
    }

    /// Current RF channel.
    pub fn channel(&self) -> u8 {
        self.slot.channel.load(Ordering::Acquire)
    }

    /// Address and prefix from the last successful `configure`.
    pub fn addressing(&self) -> Option<(u32, u8)> {
        *lock(&self.slot.addressing)
    }

    /// Whether `start_clock` has been called.
    pub fn clock_started(&self) -> bool {
        self.slot.clock_started.load(Ordering::Acquire)
    }

    /// Take this radio off the air. Subsequent tx/rx fail with `Shutdown`.
    pub fn detach(&self) {
        self.slot.detached.store(true, Ordering::Release);
        self.slot.ready.notify_all();
        debug!(radio = self.slot.id, "radio detached from simulated air");
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.slot.detached.load(Ordering::Acquire) {
            return Err(RadioError::Shutdown);
        }
        Ok(())
    }
}

impl RadioDriver for SimRadio {
    fn start_clock(&self) {
        self.slot.clock_started.store(true, Ordering::Release);
    }

    fn configure(&self, address: u32, prefix: u8, channel: u8) -> Result<()> {
        validate_channel(channel)?;
        *lock(&self.slot.addressing) = Some((address, prefix));
        self.slot.channel.store(channel, Ordering::Release);
        Ok(())
    }

    fn set_channel(&self, channel: u8) -> Result<()> {
        validate_channel(channel)?;
        self.slot.channel.store(channel, Ordering::Release);
        Ok(())
    }

    fn transmit(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_attached()?;
        let flushed = {
            let mut inbox = lock(&self.slot.inbox);
            let flushed = inbox.len();
            inbox.clear();
            flushed
        };
        if flushed > 0 {
            trace!(radio = self.slot.id, flushed, "rx fifo flushed on transmit");
        }
        lock(&self.slot.tx_log).push(bytes.to_vec());
        self.air.broadcast(self.slot.id, self.channel(), bytes);
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_attached()?;
        let inbox = lock(&self.slot.inbox);
        let (mut inbox, _) = self
            .slot
            .ready
            .wait_timeout_while(inbox, timeout, |queue| {
                queue.is_empty() && !self.slot.detached.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);

        match inbox.pop_front() {
            Some(bytes) => Ok(bytes),
            None => {
                drop(inbox);
                self.ensure_attached()?;
                Err(RadioError::Timeout(timeout))
            }
        }
    }
}

impl std::fmt::Debug for SimRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimRadio")
            .field("id", &self.slot.id)
            .field("channel", &self.channel())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn transmit_reaches_other_radios_only() {
        let air = SimAir::new();
        let a = air.attach();
        let b = air.attach();
        let c = air.attach();

        a.transmit(b"hello").unwrap();

        assert_eq!(a.pending(), 0);
        assert_eq!(b.receive(Duration::from_millis(10)).unwrap(), b"hello");
        assert_eq!(c.receive(Duration::from_millis(10)).unwrap(), b"hello");
        assert_eq!(a.tx_log(), vec![b"hello".to_vec()]);
    }

    #[test]
    fn channels_are_isolated() {
        let air = SimAir::new();
        let a = air.attach();
        let b = air.attach();
        b.set_channel(42).unwrap();

        a.transmit(b"ch7").unwrap();
        assert!(matches!(
            b.receive(Duration::from_millis(5)),
            Err(RadioError::Timeout(_))
        ));

        a.set_channel(42).unwrap();
        a.transmit(b"ch42").unwrap();
        assert_eq!(b.receive(Duration::from_millis(5)).unwrap(), b"ch42");
    }

    #[test]
    fn receive_times_out_when_idle() {
        let air = SimAir::new();
        let a = air.attach();

        let start = Instant::now();
        let err = a.receive(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn receive_wakes_on_delivery() {
        let air = SimAir::new();
        let a = air.attach();
        let b = air.attach();

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            a.transmit(b"late").unwrap();
        });

        let bytes = b.receive(Duration::from_secs(2)).unwrap();
        assert_eq!(bytes, b"late");
        sender.join().unwrap();
    }

    #[test]
    fn configure_validates_channel_and_records_addressing() {
        let air = SimAir::new();
        let a = air.attach();

        assert!(matches!(
            a.configure(0xE7E7E7E7, 0xE7, 126),
            Err(RadioError::InvalidChannel(126))
        ));
        a.start_clock();
        a.configure(0xE7E7E7E7, 0xE7, 3).unwrap();

        assert!(a.clock_started());
        assert_eq!(a.addressing(), Some((0xE7E7E7E7, 0xE7)));
        assert_eq!(a.channel(), 3);
    }

    #[test]
    fn total_loss_drops_everything() {
        let air = SimAir::with_loss(1.0, 7);
        let a = air.attach();
        let b = air.attach();

        for _ in 0..10 {
            a.transmit(b"gone").unwrap();
        }
        assert_eq!(b.pending(), 0);
        assert_eq!(a.tx_log().len(), 10);
    }

    #[test]
    fn transmitting_flushes_frames_received_earlier() {
        let air = SimAir::new();
        let a = air.attach();
        let b = air.attach();

        a.transmit(b"stale").unwrap();
        assert_eq!(b.pending(), 1);

        b.transmit(b"request").unwrap();
        assert_eq!(b.pending(), 0);

        a.transmit(b"reply").unwrap();
        assert_eq!(b.receive(Duration::from_millis(10)).unwrap(), b"reply");
        assert!(b.receive(Duration::from_millis(5)).unwrap_err().is_timeout());
    }

    #[test]
    fn idle_radio_fifo_is_bounded() {
        let air = SimAir::new();
        let a = air.attach();
        let b = air.attach();

        for i in 0..RX_FIFO_DEPTH + 10 {
            a.transmit(&[i as u8]).unwrap();
        }
        assert_eq!(b.pending(), RX_FIFO_DEPTH);
        assert_eq!(b.receive(Duration::from_millis(5)).unwrap(), vec![0u8]);
    }

    #[test]
    fn detached_radio_reports_shutdown() {
        let air = SimAir::new();
        let a = air.attach();
        a.detach();

        assert!(matches!(a.transmit(b"x"), Err(RadioError::Shutdown)));
        assert!(matches!(
            a.receive(Duration::from_millis(1)),
            Err(RadioError::Shutdown)
        ));
    }

    #[test]
    fn dropped_radios_leave_the_air() {
        let air = SimAir::new();
        let a = air.attach();
        {
            let _b = air.attach();
            assert_eq!(air.radio_count(), 2);
        }
        assert_eq!(air.radio_count(), 1);
        a.transmit(b"alone").unwrap();
    }
}
