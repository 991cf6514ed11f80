use crate::{
    prelude::{Config, DetectionTriple, Solver},
    record::{DetectionRecord, OutputRecord, SolveRequest},
    tests::{init_logger, Scenario},
};

fn request(triple: &DetectionTriple) -> SolveRequest {
    SolveRequest {
        detection1: DetectionRecord::from(&triple.detections[0]),
        detection2: DetectionRecord::from(&triple.detections[1]),
        detection3: DetectionRecord::from(&triple.detections[2]),
        initial_guess: None,
    }
}

#[test]
fn json_request_to_json_output() {
    init_logger();

    let solver = Solver::new(&Config::default()).unwrap();
    let scenario = Scenario::new(52.0, 13.0);

    let content = serde_json::to_string_pretty(&request(&scenario.detections())).unwrap();

    let parsed: SolveRequest = serde_json::from_str(&content).unwrap();
    let triple = DetectionTriple::from(&parsed);

    let output = OutputRecord::from(&solver.resolve(&triple));

    let OutputRecord::Solution(solution) = &output else {
        panic!("unexpected output: {:?}", output);
    };

    let target = scenario.target_position();
    assert_eq!(solution.timestamp, 1_700_000_000_000);
    assert!((solution.latitude - target.latitude_deg).abs() < 1.0E-5);
    assert!((solution.longitude - target.longitude_deg).abs() < 1.0E-5);
    assert!((solution.altitude - target.altitude_m).abs() < 1.0);
    assert!((solution.velocity_east - scenario.velocity.east).abs() < 1.0);
    assert!((solution.velocity_north - scenario.velocity.north).abs() < 1.0);
    assert!((solution.velocity_up - scenario.velocity.up).abs() < 1.0);

    let value = serde_json::to_value(&output).unwrap();
    for field in [
        "timestamp",
        "latitude",
        "longitude",
        "altitude",
        "velocity_east",
        "velocity_north",
        "velocity_up",
        "convergence_metric",
        "residuals",
    ] {
        assert!(value.get(field).is_some(), "missing \"{}\"", field);
    }
}

#[test]
fn json_failure_output() {
    init_logger();

    let solver = Solver::new(&Config::default()).unwrap();
    let triple = Scenario::new(52.0, 13.0)
        .with_illuminator(1, 16_000.0, 1500.0)
        .detections();

    let mut request = request(&triple);
    request.detection2.freq_mhz = -1.0;

    let output = OutputRecord::from(&solver.resolve(&DetectionTriple::from(&request)));
    let value = serde_json::to_value(&output).unwrap();

    // detection errors are reported before geometry errors
    assert_eq!(value["kind"], "DetectionValidationError");
    assert!(value.get("latitude").is_none());
}
