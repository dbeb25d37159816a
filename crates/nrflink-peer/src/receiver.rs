//! Receiving endpoint: pairing responder, data sink, liveness tracker.
//!
//! All mutable shared state (paired-device registry and callback table)
//! sits behind one lock. The lock is released before any radio I/O and
//! before any application callback runs, so callbacks may call back into
//! the receiver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use nrflink_frame::{decode_frame, DeviceId, Frame, FrameType};
use nrflink_radio::{validate_channel, RadioDriver, RadioError};
use tracing::{debug, error, info, trace, warn};

use crate::config::ReceiverConfig;
use crate::device::Device;
use crate::error::{LinkError, Result};
use crate::lock;
use crate::pairing::{ack_payload, PairingRequest};
use crate::registry::DeviceRegistry;
use crate::worker::PeriodicWorker;

/// Application handler for accepted frames of one type.
///
/// Handlers receive their own copy of the frame.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// What [`Receiver::process_frame`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A pairing request for this receiver was accepted and acknowledged.
    Paired(DeviceId),
    /// A heartbeat refreshed a paired device.
    Refreshed(DeviceId),
    /// Data from a paired device was acknowledged and handed to the application.
    Delivered(DeviceId),
    /// The frame was not for us, from an unpaired sender, or malformed.
    Ignored,
}

/// Device that accepts pairings from any number of transmitters.
pub struct Receiver<D: RadioDriver + 'static> {
    shared: Arc<Shared<D>>,
    cleanup: Mutex<Option<PeriodicWorker>>,
}

struct Shared<D> {
    driver: D,
    config: ReceiverConfig,
    id: DeviceId,
    device: Mutex<Device>,
    state: Mutex<ReceiverState>,
    paired_signal: Condvar,
    listening: AtomicBool,
    listen_epoch: AtomicU64,
}

#[derive(Default)]
struct ReceiverState {
    registry: DeviceRegistry,
    callbacks: HashMap<FrameType, FrameCallback>,
    pairings: u64,
    last_paired: Option<DeviceId>,
}

impl<D: RadioDriver + 'static> Receiver<D> {
    /// Create a receiver with default timing.
    pub fn new(id: DeviceId, driver: D) -> Self {
        Self::with_config(id, driver, ReceiverConfig::default())
    }

    /// Create a receiver with explicit timing.
    pub fn with_config(id: DeviceId, driver: D, config: ReceiverConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                config,
                id,
                device: Mutex::new(Device::receiver(id)),
                state: Mutex::new(ReceiverState::default()),
                paired_signal: Condvar::new(),
                listening: AtomicBool::new(false),
                listen_epoch: AtomicU64::new(0),
            }),
            cleanup: Mutex::new(None),
        }
    }

    /// Start the radio clock and apply this device's addressing.
    pub fn initialise(&self) -> Result<()> {
        let (address, prefix, channel) = {
            let device = lock(&self.shared.device);
            (device.address, device.prefix, device.channel)
        };
        self.shared.driver.start_clock();
        self.shared.driver.configure(address, prefix, channel)?;
        info!(device = %self.shared.id, channel, "receiver initialised");
        Ok(())
    }

    /// Retune to `channel` (0-125).
    pub fn set_channel(&self, channel: u8) -> Result<()> {
        validate_channel(channel)?;
        self.shared.driver.set_channel(channel)?;
        lock(&self.shared.device).channel = channel;
        Ok(())
    }

    /// Install the handler for `frame_type`, replacing any previous one.
    pub fn register_callback<F>(&self, frame_type: FrameType, callback: F)
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        lock(&self.shared.state)
            .callbacks
            .insert(frame_type, Arc::new(callback));
    }

    /// Remove the handler for `frame_type`. Returns whether one was installed.
    pub fn unregister_callback(&self, frame_type: FrameType) -> bool {
        lock(&self.shared.state)
            .callbacks
            .remove(&frame_type)
            .is_some()
    }

    /// Run one frame through the protocol state machine.
    pub fn process_frame(&self, frame: &Frame) -> Disposition {
        self.shared.process_frame(frame)
    }

    /// Acknowledge sequence `seq` from `to`. The ACK carries our identity.
    pub fn send_ack(&self, to: DeviceId, seq: u32) -> Result<()> {
        self.shared.send_ack(to, seq)
    }

    /// Receive and decode one frame. `Ok(None)` on timeout or a bad frame.
    pub fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        self.shared.receive_frame(timeout)
    }

    /// Start the background receive loop. Idempotent.
    ///
    /// The loop polls the radio every `rx_poll` and feeds decoded frames to
    /// [`process_frame`](Self::process_frame).
    pub fn listen(&self) -> Result<()> {
        if self.shared.listening.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let epoch = self.shared.listen_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("nrflink-listen".to_string())
            .spawn(move || shared.listen_loop(epoch));
        if let Err(err) = spawned {
            self.shared.listening.store(false, Ordering::Release);
            return Err(err.into());
        }
        info!(device = %self.shared.id, "listening");
        Ok(())
    }

    /// Ask the receive loop to stop.
    ///
    /// Returns immediately; the loop exits within one poll interval.
    pub fn stop_listening(&self) {
        if self.shared.listening.swap(false, Ordering::AcqRel) {
            info!(device = %self.shared.id, "stopped listening");
        }
    }

    /// Whether the background receive loop is running.
    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Acquire)
    }

    /// Block until a transmitter pairs with this receiver or the pairing
    /// timeout expires. Returns the newly paired identity.
    ///
    /// Listening is enabled for the duration of the call and restored to its
    /// previous state afterwards.
    pub fn start_pairing(&self) -> Result<DeviceId> {
        let shared = &self.shared;
        let was_listening = self.is_listening();
        let baseline = lock(&shared.state).pairings;

        if !was_listening {
            self.listen()?;
        }
        info!(device = %shared.id, "waiting for pairing");

        let timeout = shared.config.pairing_timeout;
        let state = lock(&shared.state);
        let (state, _) = shared
            .paired_signal
            .wait_timeout_while(state, timeout, |state| state.pairings == baseline)
            .unwrap_or_else(PoisonError::into_inner);
        let paired = (state.pairings != baseline)
            .then_some(state.last_paired)
            .flatten();
        drop(state);

        if !was_listening {
            self.stop_listening();
        }

        paired.ok_or(LinkError::Timeout(timeout))
    }

    /// Block until data arrives from a paired transmitter and return its
    /// payload.
    ///
    /// Fails with `NotPaired` up front when nothing is paired, and with
    /// `Timeout` after `receive_timeout`. Frames received meanwhile are
    /// processed normally.
    pub fn receive_data(&self) -> Result<Bytes> {
        let shared = &self.shared;
        if lock(&shared.state).registry.is_empty() {
            return Err(LinkError::NotPaired);
        }

        let timeout = shared.config.receive_timeout;
        let deadline = Instant::now() + timeout;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            let Some(frame) = shared.receive_frame(remaining.min(shared.config.rx_poll))? else {
                continue;
            };
            if let Disposition::Delivered(_) = shared.process_frame(&frame) {
                return Ok(frame.payload);
            }
        }
        Err(LinkError::Timeout(timeout))
    }

    /// Evict devices silent for longer than `device_timeout`.
    pub fn cleanup_dead_devices(&self) -> Vec<Device> {
        self.shared.cleanup_dead_devices()
    }

    /// Run [`cleanup_dead_devices`](Self::cleanup_dead_devices) every
    /// `cleanup_interval` on a background thread. Idempotent.
    pub fn start_cleanup_task(&self) -> Result<()> {
        let mut slot = lock(&self.cleanup);
        if slot.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let worker = PeriodicWorker::spawn(
            "cleanup",
            self.shared.config.cleanup_interval,
            true,
            move || {
                shared.cleanup_dead_devices();
            },
        )?;
        *slot = Some(worker);
        Ok(())
    }

    /// Alias for [`start_cleanup_task`](Self::start_cleanup_task).
    pub fn start_heartbeat_task(&self) -> Result<()> {
        self.start_cleanup_task()
    }

    /// Stop the cleanup task and wait for its thread to exit.
    pub fn stop_cleanup_task(&self) {
        let worker = lock(&self.cleanup).take();
        if let Some(worker) = worker {
            worker.stop();
        }
    }

    /// This receiver's identity; pairing requests must name it.
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    /// Copy of this receiver's own device entry.
    pub fn device(&self) -> Device {
        lock(&self.shared.device).clone()
    }

    /// Whether `id` is currently paired.
    pub fn is_paired(&self, id: DeviceId) -> bool {
        lock(&self.shared.state).registry.is_paired(id)
    }

    /// Copies of every paired device.
    pub fn paired_devices(&self) -> Vec<Device> {
        lock(&self.shared.state).registry.snapshot()
    }

    /// Identities of every known device.
    pub fn paired_ids(&self) -> Vec<DeviceId> {
        lock(&self.shared.state).registry.list_identities()
    }

    /// Lowest paired identity, if any.
    pub fn first_paired_id(&self) -> Option<DeviceId> {
        lock(&self.shared.state).registry.first_identity()
    }

    /// Whether any paired device has been heard from recently.
    pub fn is_paired_device_connected(&self) -> bool {
        let timeout = self.shared.config.device_timeout;
        lock(&self.shared.state)
            .registry
            .any_alive(Instant::now(), timeout)
    }

    /// Timing this receiver was built with.
    pub fn config(&self) -> &ReceiverConfig {
        &self.shared.config
    }

    /// The underlying radio driver.
    pub fn driver(&self) -> &D {
        &self.shared.driver
    }
}

impl<D: RadioDriver + 'static> Drop for Receiver<D> {
    fn drop(&mut self) {
        self.shared.listening.store(false, Ordering::Release);
    }
}

impl<D: RadioDriver> Shared<D> {
    fn process_frame(&self, frame: &Frame) -> Disposition {
        match frame.frame_type {
            FrameType::Pairing => self.on_pairing(frame),
            FrameType::Heartbeat => self.on_heartbeat(frame),
            FrameType::Data => self.on_data(frame),
            FrameType::Ack => {
                trace!(sender = %frame.sender, seq = frame.sequence, "ignoring ack");
                Disposition::Ignored
            }
            FrameType::Unknown(tag) => {
                debug!(sender = %frame.sender, tag, "ignoring frame of unknown type");
                Disposition::Ignored
            }
        }
    }

    fn on_pairing(&self, frame: &Frame) -> Disposition {
        let Some(request) = PairingRequest::decode(&frame.payload) else {
            trace!(sender = %frame.sender, len = frame.payload.len(), "short pairing payload");
            return Disposition::Ignored;
        };
        if request.target != self.id {
            trace!(sender = %frame.sender, target = %request.target, "pairing for another receiver");
            return Disposition::Ignored;
        }

        let (created, callback) = {
            let mut state = lock(&self.state);
            let created = state
                .registry
                .upsert_on_pairing(frame.sender, request.key);
            state.pairings += 1;
            state.last_paired = Some(frame.sender);
            (created, state.callbacks.get(&FrameType::Pairing).cloned())
        };
        self.paired_signal.notify_all();
        info!(device = %self.id, sender = %frame.sender, created, "paired");

        if let Err(err) = self.send_ack(frame.sender, frame.sequence) {
            warn!(sender = %frame.sender, seq = frame.sequence, error = %err, "pairing ack failed");
        }
        if let Some(callback) = callback {
            callback(frame.detached());
        }
        Disposition::Paired(frame.sender)
    }

    fn on_heartbeat(&self, frame: &Frame) -> Disposition {
        let (refreshed, callback) = {
            let mut state = lock(&self.state);
            let refreshed = state.registry.touch(frame.sender);
            (refreshed, state.callbacks.get(&FrameType::Heartbeat).cloned())
        };
        if !refreshed {
            trace!(sender = %frame.sender, "heartbeat from unpaired device");
            return Disposition::Ignored;
        }

        debug!(sender = %frame.sender, seq = frame.sequence, "heartbeat");
        if let Some(callback) = callback {
            callback(frame.detached());
        }
        Disposition::Refreshed(frame.sender)
    }

    fn on_data(&self, frame: &Frame) -> Disposition {
        if frame.payload.is_empty() {
            trace!(sender = %frame.sender, "empty data frame");
            return Disposition::Ignored;
        }
        let (accepted, callback) = {
            let mut state = lock(&self.state);
            let accepted = state.registry.touch(frame.sender);
            (accepted, state.callbacks.get(&FrameType::Data).cloned())
        };
        if !accepted {
            trace!(sender = %frame.sender, "data from unpaired device");
            return Disposition::Ignored;
        }

        match self.send_ack(frame.sender, frame.sequence) {
            Ok(()) => debug!(sender = %frame.sender, seq = frame.sequence, "data acknowledged"),
            Err(err) => {
                warn!(sender = %frame.sender, seq = frame.sequence, error = %err, "data ack failed")
            }
        }
        if let Some(callback) = callback {
            callback(frame.detached());
        }
        Disposition::Delivered(frame.sender)
    }

    fn send_ack(&self, to: DeviceId, seq: u32) -> Result<()> {
        let ack = Frame::new(self.id, FrameType::Ack, seq, ack_payload(self.id).to_vec());
        self.driver.transmit(&ack.encode())?;
        trace!(to = %to, seq, "ack sent");
        Ok(())
    }

    fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        match self.driver.receive(timeout) {
            Ok(bytes) => Ok(decode_frame(&bytes)),
            Err(RadioError::Timeout(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn listen_loop(&self, epoch: u64) {
        let _guard = ListenGuard { shared: self, epoch };
        let current = || {
            self.listening.load(Ordering::Acquire)
                && self.listen_epoch.load(Ordering::Acquire) == epoch
        };

        while current() {
            match self.receive_frame(self.config.rx_poll) {
                Ok(Some(frame)) => {
                    self.process_frame(&frame);
                }
                Ok(None) => {}
                Err(LinkError::Radio(RadioError::Shutdown)) => {
                    warn!(device = %self.id, "radio shut down; listen loop exiting");
                    if self.listen_epoch.load(Ordering::Acquire) == epoch {
                        self.listening.store(false, Ordering::Release);
                    }
                    break;
                }
                Err(err) => {
                    warn!(device = %self.id, error = %err, "receive failed");
                    thread::sleep(self.config.rx_poll);
                }
            }
        }
        debug!(device = %self.id, epoch, "listen loop exited");
    }

    fn cleanup_dead_devices(&self) -> Vec<Device> {
        let evicted = lock(&self.state)
            .registry
            .evict_stale(Instant::now(), self.config.device_timeout);
        if !evicted.is_empty() {
            info!(device = %self.id, evicted = evicted.len(), "evicted silent devices");
        }
        evicted
    }
}

/// Clears the listening flag when a listen thread unwinds, so a panicking
/// callback leaves the receiver stopped rather than falsely listening.
struct ListenGuard<'a, D> {
    shared: &'a Shared<D>,
    epoch: u64,
}

impl<D> Drop for ListenGuard<'_, D> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        if self.shared.listen_epoch.load(Ordering::Acquire) == self.epoch {
            self.shared.listening.store(false, Ordering::Release);
        }
        error!(device = %self.shared.id, epoch = self.epoch, "listen loop panicked; listening stopped");
    }
}
