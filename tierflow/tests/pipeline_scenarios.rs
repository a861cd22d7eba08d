//! End-to-end runs against the DataFusion engine on a temporary directory.

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tierflow::config::{parse_config, EngineConfig, RunOptions};
use tierflow::context::RunContext;
use tierflow::core::{Stage, TaskStatus};
use tierflow::engine::{DataFusionEngine, ExecutionEngine, SinkTarget};
use tierflow::events::CollectingEventSink;
use tierflow::inspect::{DatasetInspector, DEFAULT_LIMIT};
use tierflow::pipeline::{clean, Orchestrator, RunFilter};
use tierflow::streaming::TerminationPolicy;

const APP: &str = "prices_app";

const PRICES_PIPELINE: &str = r#"{
    "name": "prices_app",
    "staging": [
        {
            "name": "extract_prices",
            "type": "batch",
            "output": ["table", "view"],
            "target": "extract_prices",
            "format": "csv",
            "location": "prices.csv",
            "schema": {
                "type": "struct",
                "fields": [
                    {"name": "fruit", "type": "string", "nullable": true, "metadata": {}},
                    {"name": "price", "type": "double", "nullable": true, "metadata": {}}
                ]
            }
        }
    ],
    "standard": [
        {
            "name": "expensive",
            "type": "batch",
            "output": ["table", "file", "view"],
            "target": "expensive",
            "sql": ["SELECT fruit, price", "FROM extract_prices", "WHERE price >= 10"]
        }
    ],
    "serving": [
        {
            "name": "top_prices",
            "type": "batch",
            "output": ["table"],
            "target": "top_prices",
            "sql": "SELECT * FROM extract_prices ORDER BY price DESC LIMIT 10"
        }
    ]
}"#;

const EVENTS_PIPELINE: &str = r#"{
    "name": "prices_app",
    "staging": [
        {
            "name": "events",
            "type": "streaming",
            "output": ["table", "view"],
            "target": "events",
            "format": "json",
            "location": "events",
            "schema": {
                "type": "struct",
                "fields": [
                    {"name": "fruit", "type": "string"},
                    {"name": "price", "type": "double"}
                ]
            }
        }
    ],
    "serving": [
        {
            "name": "fruit_counts",
            "type": "streaming",
            "output": ["table"],
            "target": "fruit_counts",
            "sql": "SELECT fruit, count(*) AS n FROM events GROUP BY fruit"
        }
    ]
}"#;

struct Harness {
    _dir: tempfile::TempDir,
    landing: std::path::PathBuf,
    ctx: RunContext,
    engine: Arc<DataFusionEngine>,
}

impl Harness {
    fn new(document: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        std::fs::create_dir_all(&landing).unwrap();
        let config = parse_config(document).unwrap();
        let options = RunOptions::new(&landing).with_working_dir(dir.path().join("work"));
        let ctx = RunContext::new(config, &options).unwrap();
        let engine = Arc::new(DataFusionEngine::for_working_dir(
            ctx.working_dir(),
            EngineConfig::default().with_trigger_interval(Duration::from_millis(20)),
        ));
        Self {
            _dir: dir,
            landing,
            ctx,
            engine,
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.engine.clone())
    }

    async fn rows(&self, target: &SinkTarget) -> usize {
        self.engine.read_target(target, 10_000).await.unwrap().num_rows()
    }
}

fn write_prices(landing: &Path, count: u32) {
    let mut csv = String::from("fruit,price\n");
    for i in 0..count {
        csv.push_str(&format!("fruit_{i},{i}\n"));
    }
    std::fs::write(landing.join("prices.csv"), csv).unwrap();
}

fn drop_file(dir: &Path, name: &str, contents: &str) {
    let hidden = dir.join(format!(".{name}"));
    std::fs::write(&hidden, contents).unwrap();
    std::fs::rename(&hidden, dir.join(name)).unwrap();
}

#[tokio::test]
async fn test_serving_stays_bounded_while_staging_grows() {
    let harness = Harness::new(PRICES_PIPELINE);
    write_prices(&harness.landing, 15);
    let orchestrator = harness.orchestrator();

    for run in 1..=3 {
        let report = orchestrator.run(&harness.ctx, &RunFilter::all()).await.unwrap();
        assert_eq!(report.task_count(), 3);
        assert!(report.tasks.iter().all(|t| t.status == TaskStatus::Completed));

        assert_eq!(harness.rows(&SinkTarget::table(APP, "extract_prices")).await, 15 * run);
        assert_eq!(harness.rows(&SinkTarget::table(APP, "top_prices")).await, 10);
    }
}

#[tokio::test]
async fn test_standard_appends_and_writes_files() {
    let harness = Harness::new(PRICES_PIPELINE);
    write_prices(&harness.landing, 12);
    let orchestrator = harness.orchestrator();

    for _ in 0..2 {
        orchestrator.run(&harness.ctx, &RunFilter::all()).await.unwrap();
    }

    let file = SinkTarget::file(harness.ctx.paths().file_location(Stage::Standard, "expensive"));
    assert_eq!(harness.rows(&SinkTarget::table(APP, "expensive")).await, 4);
    assert_eq!(harness.rows(&file).await, 4);
    assert!(harness.ctx.paths().standard.join("expensive").is_dir());
}

#[tokio::test]
async fn test_inspector_caps_records() {
    let harness = Harness::new(PRICES_PIPELINE);
    write_prices(&harness.landing, 30);
    let report = harness.orchestrator().run(&harness.ctx, &RunFilter::all()).await.unwrap();
    let inspector = DatasetInspector::new(harness.engine.as_ref(), &harness.ctx).with_registry(&report.registry);

    let staged = inspector.inspect("staging", "extract_prices", DEFAULT_LIMIT).await.unwrap();
    assert_eq!(staged.len(), DEFAULT_LIMIT);

    let top = inspector.inspect("serving", "top_prices", DEFAULT_LIMIT).await.unwrap();
    assert_eq!(top.len(), 10);
    assert_eq!(top[0]["fruit"], "fruit_29");

    let few = inspector.inspect("standard", "expensive", 3).await.unwrap();
    assert_eq!(few.len(), 3);

    let err = inspector.inspect("serving", "nope", DEFAULT_LIMIT).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_filters_select_exact_names() {
    let harness = Harness::new(PRICES_PIPELINE);
    write_prices(&harness.landing, 5);
    let orchestrator = harness.orchestrator();

    let report = orchestrator
        .run(&harness.ctx, &RunFilter::all().with_stage("serving"))
        .await
        .unwrap();
    assert_eq!(report.task_count(), 1);
    assert_eq!(harness.rows(&SinkTarget::table(APP, "top_prices")).await, 5);
    assert!(harness
        .engine
        .read_target(&SinkTarget::table(APP, "extract_prices"), 10)
        .await
        .is_err());

    let report = orchestrator
        .run(&harness.ctx, &RunFilter::all().with_task("TOP_PRICES"))
        .await
        .unwrap();
    assert_eq!(report.task_count(), 0);

    let report = orchestrator
        .run(&harness.ctx, &RunFilter::all().with_stage("bronze"))
        .await
        .unwrap();
    assert_eq!(report.task_count(), 0);
}

#[tokio::test]
async fn test_missing_source_aborts_run() {
    let harness = Harness::new(PRICES_PIPELINE);
    let events = Arc::new(CollectingEventSink::new());

    let err = harness
        .orchestrator()
        .with_event_sink(events.clone())
        .run(&harness.ctx, &RunFilter::all())
        .await
        .unwrap_err();

    assert!(!err.is_config());
    assert_eq!(events.events_of_type("task.failed").len(), 1);
    assert_eq!(events.events_of_type("stage.started").len(), 1);
}

#[tokio::test]
async fn test_streaming_restart_resumes_from_checkpoint() {
    let harness = Harness::new(EVENTS_PIPELINE);
    let events_dir = harness.landing.join("events");
    std::fs::create_dir_all(&events_dir).unwrap();
    drop_file(
        &events_dir,
        "a.json",
        r#"[{"fruit": "apple", "price": 1.0}, {"fruit": "pear", "price": 2.0}, {"fruit": "apple", "price": 1.5}]"#,
    );
    let orchestrator = harness
        .orchestrator()
        .with_termination(TerminationPolicy::bounded(Duration::from_millis(400)));

    let report = orchestrator.run(&harness.ctx, &RunFilter::all()).await.unwrap();
    assert!(report.tasks.iter().all(|t| t.status == TaskStatus::Streaming));
    assert_eq!(report.active.len(), 2);
    report.active.stop_all().await.unwrap();
    assert_eq!(harness.rows(&SinkTarget::table(APP, "events")).await, 3);
    assert!(harness.ctx.paths().staging.join("events_chkpt").is_dir());

    drop_file(
        &events_dir,
        "b.json",
        "{\"fruit\": \"fig\", \"price\": 4.0}\n{\"fruit\": \"apple\", \"price\": 1.0}\n",
    );
    let report = orchestrator.run(&harness.ctx, &RunFilter::all()).await.unwrap();
    report.active.stop_all().await.unwrap();
    assert_eq!(harness.rows(&SinkTarget::table(APP, "events")).await, 5);

    let counts = harness
        .engine
        .read_target(&SinkTarget::table(APP, "fruit_counts"), 100)
        .await
        .unwrap()
        .to_json_rows()
        .unwrap();
    let total: i64 = counts.iter().filter_map(|row| row["n"].as_i64()).sum();
    assert_eq!(counts.len(), 3);
    assert_eq!(total, 5);
}

#[tokio::test]
async fn test_clean_removes_everything() {
    let harness = Harness::new(PRICES_PIPELINE);
    write_prices(&harness.landing, 3);
    harness.orchestrator().run(&harness.ctx, &RunFilter::all()).await.unwrap();
    assert!(harness.ctx.paths().app_data.exists());

    clean(harness.engine.as_ref(), &harness.ctx).await.unwrap();

    assert!(!harness.ctx.paths().app_data.exists());
    assert!(!harness.engine.warehouse().namespace_dir(APP).exists());
    assert!(harness.landing.join("prices.csv").exists());
}
