//! One receiver and one transmitter sharing a simulated air medium.
//!
//! Run with:
//!   cargo run --example pair-and-send

use std::thread;
use std::time::Duration;

use nrflink::frame::{DeviceId, FrameType};
use nrflink::peer::{Receiver, Transmitter};
use nrflink::radio::SimAir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let air = SimAir::new();

    let receiver = Receiver::new(DeviceId(0xBEEF), air.attach());
    receiver.initialise()?;
    receiver.register_callback(FrameType::Data, |frame| {
        eprintln!(
            "Received {} bytes from {} (seq {})",
            frame.payload.len(),
            frame.sender,
            frame.sequence
        );
    });
    receiver.listen()?;
    receiver.start_cleanup_task()?;

    let transmitter = Transmitter::new(DeviceId(0xCAFE), air.attach());
    transmitter.initialise()?;
    transmitter.start_pairing(receiver.id())?;
    transmitter.start_heartbeat_task()?;
    eprintln!("Paired {} with {}", transmitter.id(), receiver.id());

    for reading in ["t=21.5", "t=21.7", "t=21.6"] {
        transmitter.send_data_reliable(reading.as_bytes(), 5)?;
        thread::sleep(Duration::from_millis(100));
    }

    eprintln!("Paired devices: {:?}", receiver.paired_ids());
    receiver.stop_listening();
    Ok(())
}
