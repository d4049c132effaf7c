use std::thread;

use calcforge_core::{CalculatorEngine, EngineConfig, EvaluationResult, ResultValue};
use calcforge_types::{CalculatorField, FieldType, FieldValueMap};
use chrono::{TimeZone, Utc};

#[test]
fn shared_engine_across_threads() {
    let engine = CalculatorEngine::with_config(EngineConfig {
        formula_cache_capacity: 8,
        ..EngineConfig::default()
    });
    let as_of = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
    let fields = vec![
        CalculatorField::new("x", FieldType::Number, "X"),
        CalculatorField::new("y", FieldType::Number, "Y"),
    ];

    let results: Vec<Vec<EvaluationResult>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let engine = &engine;
                let fields = &fields;
                scope.spawn(move || {
                    (0..200u32)
                        .map(|i| {
                            let values: FieldValueMap = [
                                ("x".to_string(), f64::from(i).into()),
                                ("y".to_string(), f64::from(worker + 1).into()),
                            ]
                            .into_iter()
                            .collect();
                            let formula = format!("x * y + {}", i % 16);
                            engine.evaluate_calculator(&formula, fields, &values, as_of)
                        })
                        .collect()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (worker, worker_results) in results.iter().enumerate() {
        for (i, result) in worker_results.iter().enumerate() {
            let expected = (i * (worker + 1) + i % 16) as f64;
            assert_eq!(result.value(), Some(&ResultValue::Number(expected)));
        }
    }
    assert!(engine.cached_formulas() <= 8);
}

#[test]
fn default_engine_is_shared() {
    let a = calcforge_core::default_engine() as *const CalculatorEngine;
    let b = thread::spawn(|| calcforge_core::default_engine() as *const CalculatorEngine as usize)
        .join()
        .unwrap();
    assert_eq!(a as usize, b);
}
