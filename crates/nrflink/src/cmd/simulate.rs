use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver as FrameQueue};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nrflink_frame::{DeviceId, Frame, FrameType};
use nrflink_peer::{LinkError, Receiver, ReceiverConfig, Transmitter, TransmitterConfig};
use nrflink_radio::{SimAir, SimRadio};
use tracing::{info, warn};

use crate::cmd::SimulateArgs;
use crate::exit::{link_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_frame, print_summary, OutputFormat, SimulationSummary};

const PAIRING_ATTEMPTS: u32 = 3;
const SIM_PAIRING_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let air = if args.loss > 0.0 {
        SimAir::with_loss(args.loss, args.seed)
    } else {
        SimAir::new()
    };

    let receiver = Receiver::with_config(
        DeviceId(args.receiver),
        air.attach(),
        ReceiverConfig {
            pairing_timeout: SIM_PAIRING_TIMEOUT,
            ..ReceiverConfig::default()
        },
    );
    receiver
        .initialise()
        .map_err(|err| link_error("receiver initialise failed", err))?;
    receiver
        .set_channel(args.channel)
        .map_err(|err| link_error("receiver channel", err))?;

    let (delivered_tx, delivered_rx) = mpsc::channel::<Frame>();
    receiver.register_callback(FrameType::Data, move |frame| {
        let _ = delivered_tx.send(frame);
    });
    receiver
        .listen()
        .map_err(|err| link_error("listen failed", err))?;

    let mut summary = SimulationSummary {
        transmitters: args.transmitters as usize,
        ..SimulationSummary::default()
    };

    let mut senders = Vec::new();
    for id in 1..=args.transmitters {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let tx = Transmitter::with_config(
            DeviceId(id),
            air.attach(),
            TransmitterConfig {
                pairing_timeout: SIM_PAIRING_TIMEOUT,
                ..TransmitterConfig::default()
            },
        );
        tx.initialise()
            .map_err(|err| link_error("transmitter initialise failed", err))?;
        tx.set_channel(args.channel)
            .map_err(|err| link_error("transmitter channel", err))?;

        if pair(&tx, receiver.id())? {
            senders.push(tx);
        }
    }
    summary.paired = senders.len();

    if senders.is_empty() {
        receiver.stop_listening();
        print_summary(&summary, format);
        return Err(CliError::new(TIMEOUT, "no transmitter paired"));
    }

    'rounds: for round in 0..args.messages {
        for tx in &senders {
            if !running.load(Ordering::SeqCst) {
                break 'rounds;
            }
            let payload = format!("tx{}-msg{}", tx.id().0, round);
            summary.sent += 1;
            match tx.send_data_reliable(payload.as_bytes(), args.retries) {
                Ok(_) => summary.acknowledged += 1,
                Err(LinkError::Timeout(after)) => {
                    warn!(transmitter = %tx.id(), round, ?after, "message not acknowledged");
                }
                Err(err) => return Err(link_error("send failed", err)),
            }
            summary.delivered += drain(&delivered_rx, format);
        }
    }

    // Give the listen loop one poll to hand over anything still in flight.
    thread::sleep(receiver.config().rx_poll * 2);
    receiver.stop_listening();
    summary.delivered += drain(&delivered_rx, format);
    summary.evicted = receiver.cleanup_dead_devices().len();

    info!(
        paired = summary.paired,
        acknowledged = summary.acknowledged,
        delivered = summary.delivered,
        "simulation finished"
    );
    print_summary(&summary, format);

    if summary.acknowledged == summary.sent && summary.paired == summary.transmitters {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

fn pair(tx: &Transmitter<SimRadio>, receiver: DeviceId) -> CliResult<bool> {
    for attempt in 1..=PAIRING_ATTEMPTS {
        match tx.start_pairing(receiver) {
            Ok(()) => return Ok(true),
            Err(LinkError::Timeout(_)) => {
                warn!(transmitter = %tx.id(), attempt, "pairing attempt timed out");
            }
            Err(err) => return Err(link_error("pairing failed", err)),
        }
    }
    Ok(false)
}

fn drain(queue: &FrameQueue<Frame>, format: OutputFormat) -> usize {
    let mut count = 0;
    for frame in queue.try_iter() {
        print_frame(&frame, format);
        count += 1;
    }
    count
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
