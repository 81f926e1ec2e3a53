use approx::assert_abs_diff_eq;
use gridflow::prelude::*;

const IEEE14: &str = include_str!("../cases/ieee14.th");

const VM: [f64; 14] = [
    1.060, 1.045, 1.010, 1.018, 1.020, 1.070, 1.062, 1.090, 1.056, 1.051, 1.057, 1.055, 1.050,
    1.036,
];
const VA: [f64; 14] = [
    0.0, -4.983, -12.725, -10.313, -8.774, -14.221, -13.360, -13.360, -14.939, -15.097, -14.791,
    -15.076, -15.156, -16.034,
];

fn solve(method: Method) -> PowerGrid {
    let mut grid = load_profile(IEEE14).unwrap();
    grid.config_mut().method = method;
    let report = grid.run_pf().unwrap();
    assert!(report.converged, "{method:?} did not converge: {report:?}");
    assert!(report.iterations < 10);
    grid
}

fn check_voltages(grid: &PowerGrid) {
    for (i, (vm, va)) in VM.iter().zip(VA.iter()).enumerate() {
        let v = grid.voltage(&format!("B{}", i + 1)).unwrap();
        assert_abs_diff_eq!(v.norm(), *vm, epsilon = 2e-3);
        assert_abs_diff_eq!(v.arg().to_degrees(), *va, epsilon = 0.05);
    }
}

#[test]
fn polar_matches_published_solution() {
    let grid = solve(Method::Polar);
    check_voltages(&grid);
}

#[test]
fn rectangular_matches_published_solution() {
    let grid = solve(Method::Rectangular);
    check_voltages(&grid);
}

#[test]
fn both_methods_agree() {
    let polar = solve(Method::Polar);
    let rect = solve(Method::Rectangular);
    for i in 1..=14 {
        let name = format!("B{i}");
        let (a, b) = (polar.voltage(&name).unwrap(), rect.voltage(&name).unwrap());
        assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-5);
    }
    assert_abs_diff_eq!(
        (polar.total_loss() - rect.total_loss()).norm(),
        0.0,
        epsilon = 1e-5
    );
}

#[test]
fn slack_and_losses() {
    let grid = solve(Method::Polar);
    let slack = grid.generation("B1").unwrap();
    assert_abs_diff_eq!(slack.re, 2.3239, epsilon = 2e-3);
    assert_abs_diff_eq!(slack.im, -0.1655, epsilon = 5e-3);
    assert_abs_diff_eq!(grid.total_loss().re, 0.1339, epsilon = 1e-3);
    // |I|²/conj(y) puts the series reactive loss on the negative imaginary axis
    assert!(grid.total_loss().im < 0.0);

    // generation covers demand plus losses
    let demand = 2.590;
    assert_abs_diff_eq!(slack.re + 0.40, demand + grid.total_loss().re, epsilon = 1e-4);
}

#[test]
fn pv_reactive_output_is_recovered() {
    let grid = solve(Method::Polar);
    for (idx, q) in [(2, 0.4356), (3, 0.2508), (6, 0.1273), (8, 0.1762)] {
        let bus = format!("B{idx}");
        let sg = grid.generation(&bus).unwrap();
        assert_abs_diff_eq!(sg.im, q, epsilon = 5e-3);
        let vm = grid.voltage(&bus).unwrap().norm();
        assert_abs_diff_eq!(vm, VM[idx - 1], epsilon = 1e-9);
    }
}

#[test]
fn rerun_is_a_fixed_point() {
    let mut grid = solve(Method::Rectangular);
    let before = grid.voltage("B14").unwrap();
    let again = grid.run_pf().unwrap();
    assert!(again.converged);
    assert_eq!(again.iterations, 0);
    assert_abs_diff_eq!((grid.voltage("B14").unwrap() - before).norm(), 0.0, epsilon = 1e-9);
}

#[test]
fn config_from_json() {
    let cfg =
        PowerFlowConfig::from_json(r#"{"max_it": 1, "tol": 1e-12, "method": "Rectangular"}"#)
            .unwrap();
    let mut grid = load_profile(IEEE14).unwrap();
    *grid.config_mut() = cfg;
    let report = grid.run_pf().unwrap();
    assert!(!report.converged);
    assert_eq!(report.iterations, 1);
}

#[test]
fn reports_render() {
    let mut grid = solve(Method::Polar);
    let buses = grid.bus_table();
    assert_eq!(buses.lines().count(), 14 + 2);
    let branches = grid.branch_table();
    assert_eq!(branches.lines().count(), 20 + 2);
    assert!(branches.contains("T4-7"));
}
