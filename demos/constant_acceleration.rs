//! Constant-acceleration tracking demo.
//!
//! Simulates a body accelerating at 0.4 m/s^2, measures its position with
//! Gaussian noise (sigma 10 m) and filters the measurements.
//!
//! Usage:
//!     cargo run --release --example constant_acceleration [steps]
//!
//! Prints one row per step, then a JSON summary on the last line.

use std::env;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;

use kalman_rs::{FilterConfig, KalmanFilter, LinearModel};

const ACCEL: f64 = 0.4;
const DELTA_T: f64 = 0.1;
const SIGMA_X: f64 = 1.5;
const SIGMA_Z: f64 = 10.0;

#[derive(Debug, Serialize)]
struct Summary {
    steps: usize,
    failed_corrections: usize,
    failed_predictions: usize,
    position_rms: f64,
    measurement_rms: f64,
    velocity_rms: f64,
}

fn build_filter() -> Result<KalmanFilter<LinearModel>, kalman_rs::Error> {
    let model = LinearModel::new(
        DMatrix::from_row_slice(2, 2, &[1.0, DELTA_T, 0.0, 1.0]),
        DMatrix::from_row_slice(2, 1, &[DELTA_T * DELTA_T / 2.0, DELTA_T]),
        DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
    )?;

    let s2 = SIGMA_X * SIGMA_X;
    let q = DMatrix::from_row_slice(2, 2, &[
        s2 * DELTA_T.powi(4) / 4.0, s2 * DELTA_T.powi(3) / 2.0,
        s2 * DELTA_T.powi(3) / 2.0, s2 * DELTA_T.powi(2),
    ]);

    let mut config = FilterConfig::new(2, 1);
    config.initial_covariance = Some(q.clone());
    config.process_noise = Some(q);
    config.measurement_noise = Some(DMatrix::from_element(1, 1, SIGMA_Z * SIGMA_Z));

    KalmanFilter::from_config(config, model)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let steps: usize = match args.get(1) {
        Some(arg) => arg.parse()?,
        None => 5000,
    };

    let mut kf = build_filter()?;
    let mut rng = StdRng::seed_from_u64(0);
    let u = DVector::from_vec(vec![ACCEL]);

    let mut summary = Summary {
        steps,
        failed_corrections: 0,
        failed_predictions: 0,
        position_rms: 0.0,
        measurement_rms: 0.0,
        velocity_rms: 0.0,
    };

    println!("i pos vel realpos realvel P11 P12 P21 P22 z zp");
    for i in 0..steps {
        // Virtual measurement
        let t = i as f64 * DELTA_T;
        let pos = ACCEL / 2.0 * t * t;
        let vel = ACCEL * t;
        let noise: f64 = rng.sample(StandardNormal);
        let z = DVector::from_vec(vec![pos + noise * SIGMA_Z]);

        if let Err(e) = kf.correct(&z) {
            eprintln!("Error in correct at step {}: {}", i, e);
            summary.failed_corrections += 1;
        }

        let x = kf.state();
        let p = kf.covariance();
        println!(
            "{} {} {} {} {} {} {} {} {} {} {}",
            i,
            x[0],
            x[1],
            pos,
            vel,
            p[(0, 0)],
            p[(0, 1)],
            p[(1, 0)],
            p[(1, 1)],
            z[0],
            kf.predicted_measurement()[0]
        );

        summary.position_rms += (x[0] - pos).powi(2);
        summary.measurement_rms += (z[0] - pos).powi(2);
        summary.velocity_rms += (x[1] - vel).powi(2);

        if let Err(e) = kf.predict(&u) {
            eprintln!("Error in predict at step {}: {}", i, e);
            summary.failed_predictions += 1;
        }
    }

    if steps > 0 {
        let n = steps as f64;
        summary.position_rms = (summary.position_rms / n).sqrt();
        summary.measurement_rms = (summary.measurement_rms / n).sqrt();
        summary.velocity_rms = (summary.velocity_rms / n).sqrt();
    }

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
