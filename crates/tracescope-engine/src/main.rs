//! Simulation driver binary for the Tracescope trace store.
//!
//! Runs a damped oscillator through the store tick by tick, the way a live
//! simulation feeds its telemetry viewer: every tick opens a timestep,
//! records position and velocity, and closes it, which recomputes the
//! derived kinematics and advances every registered plot series.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tracescope-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the trace store with a logging callback
//! 4. Install the derived kinematics function
//! 5. Register the plotted series
//! 6. Run the tick loop
//! 7. Log the final window

mod error;
mod observer;
mod simulation;

use std::path::Path;
use std::time::Duration;

use tracescope_core::config::LoggingConfig;
use tracescope_core::{LineData, SeriesCache, TraceConfig, TraceStore};
use tracing::{debug, info, trace};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer::LoggingCallback;
use crate::simulation::Oscillator;

/// Config file looked up relative to the working directory.
const CONFIG_FILE: &str = "tracescope-config.yaml";

/// Series registered with the store before the first tick.
const PLOTTED_SERIES: [(&str, usize); 5] = [
    ("pos", 0),
    ("pos", 1),
    ("speed", 0),
    ("total_energy", 0),
    ("accel", 0),
];

/// Outcome of a driver run.
#[derive(Debug)]
struct RunSummary {
    ticks: u64,
    retained: usize,
    first_time: f64,
    last_time: f64,
}

/// Application entry point for the simulation driver.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or any store
/// operation fails during the run.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is configured from it, so this comes first.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("tracescope-engine starting");
    if from_file {
        info!(path = CONFIG_FILE, "Configuration loaded");
    } else {
        info!(path = CONFIG_FILE, "Config file not found, using defaults");
    }
    info!(
        max_size = config.window.max_size,
        policy = ?config.fields.policy,
        ticks = config.simulation.ticks,
        dt = config.simulation.dt,
        tick_interval_ms = config.simulation.tick_interval_ms,
        "Run parameters"
    );

    // 3-7. Run the simulation.
    let summary = run(&config).await?;

    info!(
        ticks = summary.ticks,
        retained = summary.retained,
        first_time = summary.first_time,
        last_time = summary.last_time,
        "tracescope-engine shutdown complete"
    );

    Ok(())
}

/// Drive the oscillator through a fresh store for the configured ticks.
async fn run(config: &TraceConfig) -> Result<RunSummary, EngineError> {
    let sim = &config.simulation;
    let max_size = config.window.max_size;

    // 3. Create the store.
    let mut store: TraceStore =
        TraceStore::from_config(config, LoggingCallback::new(sim.report_every));

    // 4. Install derived kinematics.
    store.set_derived_fn(simulation::kinematics(sim.stiffness))?;

    // 5. Register plotted series.
    for (name, index) in PLOTTED_SERIES {
        let _ = store.get_line_data(name, index);
    }
    info!(series = store.line_data_count(), "Plot series registered");

    // 6. Tick loop.
    let mut oscillator = Oscillator::new(sim);
    let interval = Duration::from_millis(sim.tick_interval_ms);
    let mut ticks: u64 = 0;

    while ticks < sim.ticks {
        if store.will_evict_first_data(max_size) {
            trace!(
                oldest = store.get_first_time(),
                "Window full, oldest timestep will be evicted"
            );
        }

        store.begin_timestep(oscillator.time(), max_size)?;
        let position = oscillator.sample_position();
        store.record("pos", position)?;
        store.record("vel", oscillator.velocity())?;
        store.end_timestep()?;

        oscillator.step()?;
        ticks = ticks.saturating_add(1);

        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    // 7. Log the final window.
    info!(
        time = oscillator.time(),
        pos = ?oscillator.position().as_slice(),
        vel = ?oscillator.velocity().as_slice(),
        "Oscillator final state"
    );
    log_window(&store)?;

    Ok(RunSummary {
        ticks,
        retained: store.len(),
        first_time: store.get_first_time(),
        last_time: store.get_last_time(),
    })
}

/// Log per-series summaries and dump the speed series at debug level.
fn log_window(store: &TraceStore) -> Result<(), EngineError> {
    info!(names = ?store.get_data_names(), "Recorded fields");

    for (name, index) in PLOTTED_SERIES {
        if let Some(line) = store.line_data(name, index) {
            let (min, max) = line.value_range().unwrap_or_default();
            info!(
                field = name,
                index,
                points = line.len(),
                min,
                max,
                "Series"
            );
        }
    }

    if let Some(speed) = store.line_data("speed", 0) {
        debug!(series = %series_json(speed)?, "Final speed series");
    }
    Ok(())
}

fn series_json(line: &LineData) -> Result<String, EngineError> {
    Ok(serde_json::to_string(line)?)
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load the configuration from `tracescope-config.yaml`.
///
/// Looks for the file relative to the current working directory and falls
/// back to defaults when it is absent. The flag reports whether the file
/// was read.
fn load_config() -> Result<(TraceConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok((TraceConfig::from_file(config_path)?, true))
    } else {
        Ok((TraceConfig::default(), false))
    }
}
