use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};
use traffic_light::{CountdownLatch, CycleConfig, TrafficLight};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Options {
    /// vehicles queued at the light
    #[clap(short, long)]
    #[clap(default_value_t = 5)]
    vehicles: usize,

    /// shortest phase, in milliseconds
    #[clap(long)]
    #[clap(default_value_t = 4000)]
    min_cycle_ms: u64,

    /// longest phase (exclusive), in milliseconds
    #[clap(long)]
    #[clap(default_value_t = 6000)]
    max_cycle_ms: u64,

    /// cycling loop poll interval, in milliseconds
    #[clap(long)]
    #[clap(default_value_t = 1)]
    poll_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let options = Options::parse();
    let config = CycleConfig::new(
        Duration::from_millis(options.min_cycle_ms),
        Duration::from_millis(options.max_cycle_ms),
        Duration::from_millis(options.poll_ms),
    )?;

    let light = Arc::new(TrafficLight::with_config(config));
    light.simulate()?;
    info!(light = light.id(), vehicles = options.vehicles, "intersection open");

    let start = Instant::now();
    let crossed = CountdownLatch::new(options.vehicles);
    for vehicle in 0..options.vehicles {
        let light = light.clone();
        let crossed = crossed.clone();
        thread::spawn(move || {
            match light.wait_for_green() {
                Ok(()) => info!("vehicle #{} crossed on {} after {:?}", vehicle, light.current_phase(), start.elapsed()),
                Err(err) => error!(cause = ?err, "vehicle #{} gave up", vehicle),
            }
            crossed.countdown();
        });
    }

    crossed.wait();
    light.stop();
    info!("all {} vehicles crossed in {:?}", options.vehicles, start.elapsed());

    Ok(())
}
