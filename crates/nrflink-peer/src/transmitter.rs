//! Transmitting endpoint: pairing initiator, data sender, heartbeat source.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nrflink_frame::{decode_frame, DeviceId, Frame, FrameType, MAX_PAYLOAD_SIZE};
use nrflink_radio::{validate_channel, RadioDriver, RadioError};
use tracing::{debug, info, trace, warn};

use crate::config::TransmitterConfig;
use crate::device::Device;
use crate::error::{LinkError, Result};
use crate::lock;
use crate::pairing::{ack_sender, generate_pairing_key, PairingRequest};
use crate::worker::PeriodicWorker;

/// Upper bound on stale inbound frames discarded before a handshake.
const MAX_DISCARDED_FRAMES: usize = 64;

/// Device that pairs with one receiver and sends data to it.
///
/// All methods take `&self`; the sequence counter is atomic so the
/// heartbeat task and application calls can send concurrently.
pub struct Transmitter<D: RadioDriver + 'static> {
    shared: Arc<Shared<D>>,
    heartbeat: Mutex<Option<PeriodicWorker>>,
}

struct Shared<D> {
    driver: D,
    config: TransmitterConfig,
    id: DeviceId,
    device: Mutex<Device>,
    sequence: AtomicU32,
    receiver: Mutex<Option<DeviceId>>,
}

impl<D: RadioDriver + 'static> Transmitter<D> {
    /// Create a transmitter with default timing.
    pub fn new(id: DeviceId, driver: D) -> Self {
        Self::with_config(id, driver, TransmitterConfig::default())
    }

    /// Create a transmitter with explicit timing.
    pub fn with_config(id: DeviceId, driver: D, config: TransmitterConfig) -> Self {
        let mut device = Device::transmitter(id);
        device.pairing_key = generate_pairing_key();
        Self {
            shared: Arc::new(Shared {
                driver,
                config,
                id,
                device: Mutex::new(device),
                sequence: AtomicU32::new(0),
                receiver: Mutex::new(None),
            }),
            heartbeat: Mutex::new(None),
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
        info!(device = %self.shared.id, channel, "transmitter initialised");
        Ok(())
    }

    /// Retune to `channel` (0-125).
    pub fn set_channel(&self, channel: u8) -> Result<()> {
        validate_channel(channel)?;
        self.shared.driver.set_channel(channel)?;
        lock(&self.shared.device).channel = channel;
        Ok(())
    }

    /// Encode and transmit one frame; returns the sequence number used.
    ///
    /// Only PAIRING frames may be sent before pairing completes.
    pub fn send_frame(&self, frame_type: FrameType, payload: &[u8]) -> Result<u32> {
        self.shared.send_frame(frame_type, payload)
    }

    /// Receive and decode one frame. `Ok(None)` on timeout or a bad frame.
    pub fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        self.shared.receive_frame(timeout)
    }

    /// Pair with `receiver`, blocking until its ACK arrives or the pairing
    /// timeout expires.
    ///
    /// Frames already waiting in the radio are discarded before the request
    /// goes out; only an ACK sent by `receiver` for this request counts.
    pub fn start_pairing(&self, receiver: DeviceId) -> Result<()> {
        let shared = &self.shared;
        let request = PairingRequest {
            key: lock(&shared.device).pairing_key,
            target: receiver,
        };
        *lock(&shared.receiver) = Some(receiver);

        shared.discard_pending()?;
        let seq = shared.send_frame(FrameType::Pairing, &request.encode())?;
        info!(device = %shared.id, receiver = %receiver, seq, "pairing request sent");

        let timeout = shared.config.pairing_timeout;
        let deadline = Instant::now() + timeout;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            let Some(frame) = shared.receive_frame(remaining.min(shared.config.rx_poll))? else {
                continue;
            };
            if is_ack_from(&frame, receiver, seq) {
                lock(&shared.device).paired = true;
                info!(device = %shared.id, receiver = %receiver, "paired");
                return Ok(());
            }
            trace!(sender = %frame.sender, kind = %frame.frame_type, seq = frame.sequence, "ignoring frame while pairing");
        }

        warn!(device = %shared.id, receiver = %receiver, "pairing timed out");
        Err(LinkError::Timeout(timeout))
    }

    /// Send an empty HEARTBEAT frame.
    pub fn send_heartbeat(&self) -> Result<u32> {
        self.shared.send_heartbeat()
    }

    /// Send a DATA frame without waiting for an acknowledgement.
    pub fn send_data(&self, payload: &[u8]) -> Result<u32> {
        self.shared.ensure_paired()?;
        self.shared.send_frame(FrameType::Data, payload)
    }

    /// Send a DATA frame and wait for the matching ACK, retransmitting up to
    /// `max_retries` times in total.
    ///
    /// Every attempt reuses one sequence number. Between attempts the
    /// transmitter backs off `backoff_base + backoff_step * attempt`. Only an
    /// ACK from the paired receiver is accepted.
    pub fn send_data_reliable(&self, payload: &[u8], max_retries: u32) -> Result<u32> {
        let shared = &self.shared;
        shared.ensure_paired()?;
        check_payload(payload)?;
        let receiver = (*lock(&shared.receiver)).ok_or(LinkError::NotPaired)?;

        let seq = shared.sequence.fetch_add(1, Ordering::Relaxed);
        let encoded = Frame::new(shared.id, FrameType::Data, seq, payload.to_vec()).encode();
        let started = Instant::now();

        for attempt in 0..max_retries {
            shared.discard_pending()?;
            shared.driver.transmit(&encoded)?;
            trace!(device = %shared.id, seq, attempt, "reliable data sent");

            if shared.wait_for_ack(receiver, seq)? {
                debug!(device = %shared.id, seq, attempts = attempt + 1, "data acknowledged");
                return Ok(seq);
            }

            if attempt + 1 < max_retries {
                let backoff = shared.config.backoff(attempt);
                debug!(device = %shared.id, seq, attempt, backoff_ms = backoff.as_millis() as u64, "no ack; retrying");
                thread::sleep(backoff);
            }
        }

        warn!(device = %shared.id, seq, max_retries, "reliable send gave up");
        Err(LinkError::Timeout(started.elapsed()))
    }

    /// Send heartbeats every `heartbeat_interval` on a background thread.
    ///
    /// Calling this while the task is running has no effect.
    pub fn start_heartbeat_task(&self) -> Result<()> {
        let mut slot = lock(&self.heartbeat);
        if slot.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let worker = PeriodicWorker::spawn(
            "heartbeat",
            self.shared.config.heartbeat_interval,
            false,
            move || match shared.send_heartbeat() {
                Ok(seq) => debug!(device = %shared.id, seq, "heartbeat sent"),
                Err(LinkError::NotPaired) => trace!(device = %shared.id, "heartbeat skipped; not paired"),
                Err(err) => warn!(device = %shared.id, error = %err, "heartbeat failed"),
            },
        )?;
        *slot = Some(worker);
        Ok(())
    }

    /// Stop the heartbeat task and wait for its thread to exit.
    pub fn stop_heartbeat_task(&self) {
        let worker = lock(&self.heartbeat).take();
        if let Some(worker) = worker {
            worker.stop();
        }
    }

    /// This transmitter's identity, carried as the sender of every frame.
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    /// Whether the pairing handshake has completed.
    pub fn is_paired(&self) -> bool {
        lock(&self.shared.device).paired
    }

    /// Receiver targeted by the last pairing attempt.
    pub fn receiver(&self) -> Option<DeviceId> {
        *lock(&self.shared.receiver)
    }

    /// Copy of this transmitter's own device entry.
    pub fn device(&self) -> Device {
        lock(&self.shared.device).clone()
    }

    /// Sequence number the next frame will carry.
    pub fn next_sequence(&self) -> u32 {
        self.shared.sequence.load(Ordering::Relaxed)
    }

    /// Timing this transmitter was built with.
    pub fn config(&self) -> &TransmitterConfig {
        &self.shared.config
    }

    /// The underlying radio driver.
    pub fn driver(&self) -> &D {
        &self.shared.driver
    }
}

impl<D: RadioDriver> Shared<D> {
    fn ensure_paired(&self) -> Result<()> {
        if lock(&self.device).paired {
            Ok(())
        } else {
            Err(LinkError::NotPaired)
        }
    }

    fn send_frame(&self, frame_type: FrameType, payload: &[u8]) -> Result<u32> {
        if frame_type != FrameType::Pairing {
            self.ensure_paired()?;
        }
        check_payload(payload)?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::new(self.id, frame_type, seq, payload.to_vec());
        self.driver.transmit(&frame.encode())?;
        trace!(device = %self.id, kind = %frame_type, seq, len = payload.len(), "frame sent");
        Ok(seq)
    }

    fn send_heartbeat(&self) -> Result<u32> {
        self.ensure_paired()?;
        self.send_frame(FrameType::Heartbeat, &[])
    }

    fn receive_frame(&self, timeout: Duration) -> Result<Option<Frame>> {
        match self.driver.receive(timeout) {
            Ok(bytes) => Ok(decode_frame(&bytes)),
            Err(RadioError::Timeout(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop whatever the radio already holds so an ACK left over from an
    /// earlier exchange cannot satisfy the next one.
    fn discard_pending(&self) -> Result<()> {
        let mut discarded = 0;
        while discarded < MAX_DISCARDED_FRAMES {
            match self.driver.receive(Duration::ZERO) {
                Ok(_) => discarded += 1,
                Err(RadioError::Timeout(_)) => break,
                Err(err) => return Err(err.into()),
            }
        }
        if discarded > 0 {
            debug!(device = %self.id, discarded, "discarded stale inbound frames");
        }
        Ok(())
    }

    /// Poll for an ACK from `receiver` carrying `seq` within one ack window.
    fn wait_for_ack(&self, receiver: DeviceId, seq: u32) -> Result<bool> {
        let deadline = Instant::now() + self.config.ack_window;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if remaining.is_zero() {
                break;
            }
            if let Some(frame) = self.receive_frame(remaining.min(self.config.ack_poll))? {
                if is_ack_from(&frame, receiver, seq) {
                    return Ok(true);
                }
                trace!(device = %self.id, kind = %frame.frame_type, seq = frame.sequence, expected = seq, "ignoring frame while awaiting ack");
            }
        }
        Ok(false)
    }
}

fn is_ack_from(frame: &Frame, receiver: DeviceId, seq: u32) -> bool {
    frame.frame_type == FrameType::Ack
        && frame.sequence == seq
        && frame.sender == receiver
        && ack_sender(&frame.payload) == Some(receiver)
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(LinkError::InvalidPayload {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}
