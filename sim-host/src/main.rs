//! HiveMesh host simulator.
//!
//! Compresses a few minutes of node life into one run against a simulated
//! radio and RTC: high-intensity discovery at boot, settling into low
//! discovery once clustered, a timed diagnostic burst, and an out-of-band
//! stop when the stack grabs the receiver for a connection attempt.
//! Status is printed as NDJSON, exactly like the device terminal.

use std::io::{self, Write};

use anyhow::Result;

use hivemesh::defaults;
use hivemesh::job::{ScanJobDescriptor, ScanPurpose};
use hivemesh::radio::{RadioError, ScanRadio};
use hivemesh::scheduler::ScanScheduler;
use hivemesh::status;
use hivemesh::table::JobTable;
use hivemesh::tick::TickAccumulator;
use hivemesh::units::scan_units_to_msec;

/// One 100 ms timer period in RTC ticks (32768 Hz, rounded up).
const TIMER_PERIOD_TICKS: u32 = 3277;

/// Fed by the simulated timer exactly like the interrupt handler would
/// feed it on hardware.
static TICKS: TickAccumulator = TickAccumulator::new();

/// Radio stand-in that logs what the hardware would be doing.
struct SimRadio;

impl ScanRadio for SimRadio {
    fn start(&mut self, window: u16, interval: u16) -> Result<(), RadioError> {
        log::info!(
            "[radio] rx on for {} ms of every {} ms",
            scan_units_to_msec(window as u32),
            scan_units_to_msec(interval as u32)
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RadioError> {
        log::info!("[radio] rx off");
        Ok(())
    }
}

/// Run the simulated clock for `seconds`, draining the accumulator into
/// the scheduler after every timer period like the main loop does.
fn advance(scheduler: &mut ScanScheduler<SimRadio>, seconds: u32) -> Result<()> {
    for _ in 0..seconds * 10 {
        TICKS.add_ticks(TIMER_PERIOD_TICKS);
        scheduler.tick(TICKS.take_elapsed_ds())?;
    }
    Ok(())
}

/// Print the scan_status line plus one scan_job line per admitted job.
fn print_status(scheduler: &ScanScheduler<SimRadio>) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(line) = status::message_line(&status::status_message(scheduler)) {
        out.write_all(&line)?;
    }
    for (idx, descriptor) in scheduler.jobs().enumerate() {
        let msg = status::job_message(idx as u8, &descriptor);
        if let Some(line) = status::message_line(&msg) {
            out.write_all(&line)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("HiveMesh sim v{} starting", status::VERSION);

    let mut scheduler = ScanScheduler::new(SimRadio, JobTable::new());

    // Boot: no cluster yet, hunt hard for neighbours
    let high = scheduler.add_job(defaults::high_discovery_job())?;
    advance(&mut scheduler, 2)?;
    print_status(&scheduler)?;

    // Clustering done: drop to background discovery
    log::info!("Clustering done, switching to low discovery");
    scheduler.remove_job(high)?;
    let low = scheduler.add_job(defaults::low_discovery_job())?;
    advance(&mut scheduler, 2)?;
    print_status(&scheduler)?;

    // A module requests a three-second diagnostic burst
    log::info!("Diagnostics module requests a scan burst");
    scheduler.add_job(ScanJobDescriptor::timed(ScanPurpose::Custom, 112, 160, 30))?;
    advance(&mut scheduler, 1)?;
    print_status(&scheduler)?;

    // The stack takes the receiver for an outgoing connection and tells
    // us afterwards; the winner must come back on its own
    log::info!("Stack took the receiver for a connection attempt");
    scheduler.scanning_has_stopped()?;
    print_status(&scheduler)?;

    // The burst runs out and the node falls back to low discovery
    advance(&mut scheduler, 2)?;
    print_status(&scheduler)?;

    // Shutting down: withdraw the last job, receiver goes quiet
    scheduler.remove_job(low)?;
    advance(&mut scheduler, 1)?;
    print_status(&scheduler)?;

    log::info!("Simulation complete");
    Ok(())
}
