use std::env;

use gridflow::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut grid = match env::args().nth(1) {
        Some(path) => load_profile_file(path)?,
        None => load_profile(include_str!("../cases/ieee14.th"))?,
    };
    if let Some(method) = env::args().nth(2) {
        grid.config_mut().method = match method.as_str() {
            "rect" | "rectangular" => Method::Rectangular,
            _ => Method::Polar,
        };
    }

    let report = grid.run_pf()?;
    println!(
        "converged: {}, iterations: {}, max mismatch: {:.3e}",
        report.converged, report.iterations, report.max_mismatch
    );
    grid.print_res_bus();
    grid.print_res_branch();
    println!("{}", grid.loss_summary());
    Ok(())
}
