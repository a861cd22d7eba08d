//! Benchmarks for configuration loading.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tierflow::config::parse_config;

fn pipeline_document(tasks: usize) -> String {
    let staging: Vec<serde_json::Value> = (0..tasks)
        .map(|i| {
            serde_json::json!({
                "name": format!("extract_{i}"),
                "type": "batch",
                "output": ["table", "view"],
                "target": format!("raw_{i}"),
                "format": "csv",
                "location": format!("raw_{i}.csv"),
                "schema": {
                    "type": "struct",
                    "fields": [
                        {"name": "id", "type": "long", "nullable": false, "metadata": {}},
                        {"name": "fruit", "type": "string", "nullable": true, "metadata": {}},
                        {"name": "price", "type": "double", "nullable": true, "metadata": {}}
                    ]
                }
            })
        })
        .collect();
    let serving: Vec<serde_json::Value> = (0..tasks)
        .map(|i| {
            serde_json::json!({
                "name": format!("serve_{i}"),
                "type": "batch",
                "output": ["table"],
                "target": format!("top_{i}"),
                "sql": [format!("SELECT * FROM raw_{i}"), "ORDER BY price DESC", "LIMIT 10"]
            })
        })
        .collect();
    serde_json::json!({"name": "bench", "staging": staging, "serving": serving}).to_string()
}

fn config_benchmark(c: &mut Criterion) {
    let small = pipeline_document(2);
    let large = pipeline_document(200);

    c.bench_function("parse_config_small", |b| {
        b.iter(|| parse_config(black_box(&small)))
    });
    c.bench_function("parse_config_large", |b| {
        b.iter(|| parse_config(black_box(&large)))
    });
}

criterion_group!(benches, config_benchmark);
criterion_main!(benches);
