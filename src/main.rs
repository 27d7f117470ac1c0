// src/main.rs
// Runs one acceptance cycle against the simulated bench and prints the results as JSON.
use std::env;
use std::fs;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use dcct_acceptance::bench::SimulatedBench;
use dcct_acceptance::waveform::{render_evaluation_png, EvaluationSummary, PlotStyle};
use dcct_acceptance::{AcceptanceConfig, CurrentTest, FaultTest, FaultTestReport};

#[derive(Serialize)]
struct CycleReport {
    fault: FaultTestReport,
    current: EvaluationSummary,
    passed: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => AcceptanceConfig::load(&path)?,
        None => {
            info!("no config given, using bench defaults");
            AcceptanceConfig::default()
        }
    };

    let bench = SimulatedBench::healthy(config.sample_rate_hz, 7);

    let mut fault_test = FaultTest::new(
        bench.rail,
        bench.fault_pin,
        bench.generator,
        config.fault.clone(),
    );
    let fault = fault_test.run().context("fault output test aborted")?;

    info!("beginning current test");
    let mut current_test = CurrentTest::new(bench.scope, config.thresholds());
    let evaluation = current_test.run().context("current test aborted")?;

    if let Some(path) = &config.plot_path {
        let png = render_evaluation_png(
            &evaluation,
            &config.labels(),
            config.phase_reference,
            config.phase_target,
            PlotStyle::default(),
        )?;
        fs::write(path, png).with_context(|| format!("writing plot {}", path.display()))?;
        info!("waveform plot saved to {}", path.display());
    }

    let passed = fault.passed && evaluation.verdict.passed;
    if !passed {
        warn!("unit failed acceptance");
    }
    let report = CycleReport {
        fault,
        current: evaluation.summary(),
        passed,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
