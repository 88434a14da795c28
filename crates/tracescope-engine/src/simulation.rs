//! Damped-oscillator simulation feeding the trace store.
//!
//! A unit mass on a 2-D spring with linear damping, integrated with
//! semi-implicit Euler. Positions are reported with uniform sensor noise
//! so the plotted series look like live telemetry. The derived function
//! returned by [`kinematics`] turns each recorded tick into speed,
//! energies and a finite-difference acceleration.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracescope_core::config::SimulationConfig;
use tracescope_core::{History, NumericVector, Record};
use tracescope_types::VectorError;

/// Mass of the simulated body.
pub const MASS: f64 = 1.0;

/// Initial position of the body.
const START_POSITION: [f64; 2] = [1.0, 0.0];

/// Initial velocity of the body.
const START_VELOCITY: [f64; 2] = [0.0, 1.0];

/// State of the damped oscillator.
pub struct Oscillator {
    pos: NumericVector,
    vel: NumericVector,
    time: f64,
    dt: f64,
    stiffness: f64,
    damping: f64,
    noise: f64,
    rng: StdRng,
}

impl Oscillator {
    /// Create an oscillator at its start state from the simulation config.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            pos: NumericVector::from(START_POSITION),
            vel: NumericVector::from(START_VELOCITY),
            time: 0.0,
            dt: config.dt,
            stiffness: config.stiffness,
            damping: config.damping,
            noise: config.noise.abs(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Current simulation time.
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// True position.
    pub const fn position(&self) -> &NumericVector {
        &self.pos
    }

    /// True velocity.
    pub const fn velocity(&self) -> &NumericVector {
        &self.vel
    }

    /// Position as a noisy sensor would report it.
    pub fn sample_position(&mut self) -> NumericVector {
        if self.noise <= 0.0 {
            return self.pos.clone();
        }
        let noise = self.noise;
        let rng = &mut self.rng;
        self.pos
            .iter()
            .map(|value| value + rng.random_range(-noise..=noise))
            .collect()
    }

    /// Advance the state by one `dt`.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::LengthMismatch`] if position and velocity
    /// ever disagree in dimension.
    pub fn step(&mut self) -> Result<(), VectorError> {
        let spring = &self.pos * -self.stiffness;
        let drag = &self.vel * self.damping;
        let accel = &spring.sub(&drag)? / MASS;

        self.vel = self.vel.add(&(&accel * self.dt))?;
        self.pos = self.pos.add(&(&self.vel * self.dt))?;
        self.time += self.dt;
        Ok(())
    }
}

/// Build the derived function for an oscillator of the given stiffness.
///
/// Produces, per tick: `speed`, `kinetic_energy`, `potential_energy`,
/// `total_energy` (all scalars) and `accel`, the backward difference of
/// `vel` against the previous retained tick (zeros on the first one).
pub fn kinematics(
    stiffness: f64,
) -> impl Fn(&Record, &mut Record, &History<'_>) -> Result<(), VectorError> + 'static {
    move |raw, out, history| {
        let (Some(pos), Some(vel)) = (raw.get("pos"), raw.get("vel")) else {
            return Ok(());
        };

        let kinetic = 0.5 * MASS * vel.dot(vel)?;
        let potential = 0.5 * stiffness * pos.dot(pos)?;
        out.insert("speed", vel.norm());
        out.insert("kinetic_energy", kinetic);
        out.insert("potential_energy", potential);
        out.insert("total_energy", kinetic + potential);

        let accel = match backward_difference(raw, history.previous(), "vel")? {
            Some(accel) => accel,
            None => NumericVector::zeros(vel.len()),
        };
        out.insert("accel", accel);
        Ok(())
    }
}

/// `(current[name] - previous[name]) / (t - t_prev)`, if both exist and
/// time moved forward.
fn backward_difference(
    current: &Record,
    previous: Option<&Record>,
    name: &str,
) -> Result<Option<NumericVector>, VectorError> {
    let Some(previous) = previous else {
        return Ok(None);
    };
    let (Some(now), Some(before)) = (current.get(name), previous.get(name)) else {
        return Ok(None);
    };
    let (Some(t), Some(t_prev)) = (current.time(), previous.time()) else {
        return Ok(None);
    };
    if t <= t_prev {
        return Ok(None);
    }
    Ok(Some(now.sub(before)?.div(t - t_prev)?))
}
