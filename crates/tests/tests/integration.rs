//! End-to-end tests: expressions described as JSON graphs, evaluated over
//! several cycles through a session.

use cadence_foundation::Value;
use cadence_runtime::{Error, ErrorTier, PointMesh, SessionConfig};
use cadence_tests::{TestHarness, mesh};
use serde_json::{Value as Json, json};

/// `t = cycle * 10`
fn ten_per_cycle() -> Json {
    json!({
        "nodes": {
            "c": {"type": "cycle"},
            "ten": {"type": "int", "params": {"value": 10}},
            "t": {
                "type": "binary_op",
                "params": {"op_string": "*"},
                "inputs": {"lhs": "c", "rhs": "ten"}
            }
        },
        "output": "t"
    })
}

/// Single history node over `t` with extra integer/double arguments.
fn over_t(node_type: &str, args: &[(&str, Json)]) -> Json {
    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "expr".into(),
        json!({"type": "identifier", "params": {"name": "t"}}),
    );
    let mut inputs = serde_json::Map::new();
    inputs.insert("expr_name".into(), json!("expr"));
    for (port, value) in args {
        let literal = if value.is_f64() { "double" } else { "literal" };
        nodes.insert(
            format!("arg_{port}"),
            json!({"type": literal, "params": {"value": value}}),
        );
        inputs.insert((*port).to_string(), json!(format!("arg_{port}")));
    }
    nodes.insert("out".into(), json!({"type": node_type, "inputs": inputs}));
    json!({"nodes": nodes, "output": "out"})
}

fn binary(op: &str, lhs: Json, rhs: Json) -> Json {
    let kind = |v: &Json| if v.is_f64() { "double" } else { "int" };
    json!({
        "nodes": {
            "a": {"type": kind(&lhs), "params": {"value": lhs}},
            "b": {"type": kind(&rhs), "params": {"value": rhs}},
            "op": {
                "type": "binary_op",
                "params": {"op_string": op},
                "inputs": {"lhs": "a", "rhs": "b"}
            }
        },
        "output": "op"
    })
}

#[test]
fn arithmetic_promotes_and_modulo_is_integer_only() {
    let mut harness = TestHarness::new()
        .expression("sum", binary("+", json!(1), json!(1.0)))
        .expression("rem", binary("%", json!(1), json!(2)));
    let results = harness.tick(&mesh(1, 1.0));
    assert_eq!(results.get("sum"), Some(&Value::Double(2.0)));
    assert_eq!(results.get("rem"), Some(&Value::Int(1)));

    let mut bad = TestHarness::new().expression("bad", binary("%", json!(1.0), json!(2)));
    let err = bad.try_tick(&mesh(1, 1.0)).expect_err("double modulo");
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.tier(), ErrorTier::Validation);
    assert_eq!(bad.history_len("bad"), 0);
}

#[test]
fn relative_index_zero_is_newest_and_clamps_to_oldest() {
    let mut harness = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression("newest", over_t("history", &[("relative_index", json!(0))]))
        .expression("oldest", over_t("history", &[("relative_index", json!(99))]));
    harness.tick(&mesh(1, 1.0));
    // A one-entry history is both newest and oldest.
    assert_eq!(harness.latest("oldest"), Some(&Value::Int(10)));

    harness.tick(&mesh(2, 2.0));
    harness.tick(&mesh(3, 3.0));
    assert_eq!(harness.latest("newest"), Some(&Value::Int(30)));
    assert_eq!(harness.latest("oldest"), Some(&Value::Int(10)));
}

#[test]
fn absolute_index_before_history_exists_fails() {
    let mut harness = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression("second", over_t("history", &[("absolute_index", json!(1))]));
    let err = harness.try_tick(&mesh(1, 1.0)).expect_err("only one entry");
    assert!(matches!(err, Error::IndexOutOfRange { index: 1, len: 1, .. }));
    assert_eq!(err.tier(), ErrorTier::Evaluation);
    // `t` was evaluated before the failure and stays recorded.
    assert_eq!(harness.history_len("t"), 1);

    harness.tick(&mesh(2, 2.0));
    assert_eq!(harness.latest("second"), Some(&Value::Int(20)));
}

#[test]
fn absolute_range_has_inclusive_length() {
    let mut harness = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression(
            "window",
            over_t(
                "history_range",
                &[("first_absolute_index", json!(1)), ("last_absolute_index", json!(3))],
            ),
        )
        .expression(
            "missing",
            over_t(
                "history_range",
                &[("first_absolute_index", json!(100)), ("last_absolute_index", json!(200))],
            ),
        )
        .expression(
            "late",
            over_t(
                "history_range",
                &[("first_absolute_time", json!(100.0)), ("last_absolute_time", json!(200.0))],
            ),
        );
    for cycle in 1..=5 {
        harness.tick(&mesh(cycle, cycle as f64));
    }
    let window = harness.latest("window").and_then(Value::as_array).expect("array");
    assert_eq!(window.len(), 3);
    assert_eq!(window.values(), &[20.0, 30.0, 40.0]);
    assert_eq!(harness.latest("missing"), Some(&Value::Null));
    assert_eq!(harness.latest("late"), Some(&Value::Null));
}

#[test]
fn range_addressing_families_are_exclusive() {
    let mut harness = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression(
            "mixed",
            over_t(
                "history_range",
                &[
                    ("first_absolute_index", json!(0)),
                    ("last_relative_index", json!(1)),
                ],
            ),
        );
    let err = harness.try_tick(&mesh(1, 1.0)).expect_err("ambiguous");
    assert_eq!(err.tier(), ErrorTier::Validation);
}

#[test]
fn gradient_over_linear_history() {
    let mut harness = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression("g", over_t("history_gradient", &[]))
        .expression(
            "g_time",
            over_t(
                "history_gradient",
                &[("window_length", json!(2.0)), ("window_length_unit", json!("time"))],
            ),
        );
    harness.tick(&mesh(1, 1.0));
    assert_eq!(harness.latest_double("g"), Some(f64::NEG_INFINITY));

    harness.tick(&mesh(2, 2.0));
    harness.tick(&mesh(3, 3.0));
    assert_eq!(harness.latest_double("g"), Some(10.0));
    assert_eq!(harness.latest_double("g_time"), Some(10.0));
}

fn energy_mesh() -> PointMesh {
    PointMesh::new(
        1,
        Some(0.1),
        vec![[0.5, 0.0, 0.0], [1.5, 0.0, 0.0], [2.5, 0.0, 0.0], [3.5, 0.0, 0.0]],
    )
    .with_scalar("energy", vec![1.0, 3.0, 5.0, 7.0])
}

fn quantile_of_energy(q: f64) -> Json {
    json!({
        "nodes": {
            "name": {"type": "string", "params": {"value": "energy"}},
            "field": {"type": "field", "inputs": {"field_name": "name"}},
            "bins": {"type": "int", "params": {"value": 4}},
            "lo": {"type": "double", "params": {"value": 0.0}},
            "hi": {"type": "double", "params": {"value": 8.0}},
            "hist": {
                "type": "histogram",
                "inputs": {"arg1": "field", "num_bins": "bins", "min_val": "lo", "max_val": "hi"}
            },
            "cdf": {"type": "cdf", "inputs": {"hist": "hist"}},
            "q": {"type": "double", "params": {"value": q}},
            "out": {"type": "quantile", "inputs": {"cdf": "cdf", "q": "q"}}
        },
        "output": "out"
    })
}

#[test]
fn uniform_histogram_median() {
    let mut harness = TestHarness::new().expression("median", quantile_of_energy(0.5));
    let results = harness.tick(&energy_mesh());
    assert_eq!(results.get("median"), Some(&Value::Double(4.0)));
}

#[test]
fn quantiles_are_monotonic() {
    let qs: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
    let mut harness = TestHarness::new();
    for (i, q) in qs.iter().enumerate() {
        harness = harness.expression(&format!("q{i}"), quantile_of_energy(*q));
    }
    let results = harness.tick(&energy_mesh());
    let values: Vec<f64> = (0..qs.len())
        .map(|i| {
            results
                .get(format!("q{i}").as_str())
                .and_then(Value::as_double)
                .expect("quantile")
        })
        .collect();
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]), "{values:?}");
    assert_eq!(values.first(), Some(&0.0));
    assert_eq!(values.last(), Some(&8.0));
}

/// `bin_by_value(b, bin_by_index(b, i).center) == bin_by_index(b, i).value`
/// over a 4-bin x binning.
fn bin_round_trip(i: i64) -> Json {
    json!({
        "nodes": {
            "axis_name": {"type": "string", "params": {"value": "x"}},
            "lo": {"type": "double", "params": {"value": 0.0}},
            "hi": {"type": "double", "params": {"value": 4.0}},
            "n": {"type": "int", "params": {"value": 4}},
            "axis": {
                "type": "axis",
                "inputs": {"name": "axis_name", "min_val": "lo", "max_val": "hi", "num_bins": "n"}
            },
            "var": {"type": "string", "params": {"value": "energy"}},
            "op": {"type": "string", "params": {"value": "sum"}},
            "binning": {
                "type": "binning",
                "inputs": {"reduction_var": "var", "reduction_op": "op", "bin_axes": "axis"}
            },
            "i": {"type": "int", "params": {"value": i}},
            "bin": {"type": "bin_by_index", "inputs": {"binning": "binning", "index": "i"}},
            "center": {"type": "dot", "params": {"name": "center"}, "inputs": {"obj": "bin"}},
            "found": {"type": "bin_by_value", "inputs": {"binning": "binning", "value": "center"}},
            "stored": {"type": "dot", "params": {"name": "value"}, "inputs": {"obj": "bin"}},
            "out": {
                "type": "binary_op",
                "params": {"op_string": "=="},
                "inputs": {"lhs": "found", "rhs": "stored"}
            }
        },
        "output": "out"
    })
}

#[test]
fn bin_lookup_round_trips_through_centers() {
    let mut harness = TestHarness::new();
    for i in 0..4 {
        harness = harness.expression(&format!("rt{i}"), bin_round_trip(i));
    }
    let results = harness.tick(&energy_mesh());
    for i in 0..4 {
        assert_eq!(results.get(format!("rt{i}").as_str()), Some(&Value::Bool(true)));
    }
}

#[test]
fn point_search_reports_miss_value() {
    let spec = json!({
        "nodes": {
            "axis_name": {"type": "string", "params": {"value": "x"}},
            "n": {"type": "int", "params": {"value": 4}},
            "axis": {"type": "axis", "inputs": {"name": "axis_name", "num_bins": "n"}},
            "var": {"type": "string", "params": {"value": "energy"}},
            "op": {"type": "string", "params": {"value": "max"}},
            "binning": {
                "type": "binning",
                "inputs": {"reduction_var": "var", "reduction_op": "op", "bin_axes": "axis"}
            },
            "threshold": {"type": "double", "params": {"value": 100.0}},
            "point": {"type": "double", "params": {"value": 1.0}},
            "miss": {"type": "double", "params": {"value": -1.0}},
            "search": {
                "type": "point_and_axis",
                "inputs": {
                    "binning": "binning",
                    "threshold": "threshold",
                    "point": "point",
                    "miss_value": "miss"
                }
            },
            "out": {"type": "dot", "params": {"name": "center"}, "inputs": {"obj": "search"}}
        },
        "output": "out"
    });
    let mut harness = TestHarness::new().expression("search", spec);
    let results = harness.tick(&energy_mesh());
    assert_eq!(results.get("search"), Some(&Value::Double(-1.0)));
}

#[test]
fn cache_survives_save_and_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("history.json");

    let mut first = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression("g", over_t("history_gradient", &[]));
    first.run_cycles(3);
    first.session().save_cache(&path).expect("save");

    let mut second = TestHarness::new()
        .expression("t", ten_per_cycle())
        .expression("g", over_t("history_gradient", &[]));
    second.session_mut().load_cache(&path).expect("load");
    assert_eq!(second.history_len("t"), 3);
    second.tick(&mesh(4, 4.0));
    assert_eq!(second.latest("t"), Some(&Value::Int(40)));
    assert_eq!(second.latest_double("g"), Some(10.0));
}

#[test]
fn persist_selection_limits_saved_identifiers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("selected.json");

    let config = SessionConfig::default().with_persist(["t"]);
    let mut harness = TestHarness::with_config(config)
        .expression("t", ten_per_cycle())
        .expression("g", over_t("history_gradient", &[]));
    harness.run_cycles(2);
    harness.session().save_cache(&path).expect("save");

    let mut restored = TestHarness::new();
    restored.session_mut().load_cache(&path).expect("load");
    assert_eq!(restored.history_len("t"), 2);
    assert_eq!(restored.history_len("g"), 0);
    let last = restored.session().last_values();
    assert_eq!(last.get("t").map(|l| l.cycle), Some(2));
}
