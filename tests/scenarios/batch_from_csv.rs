use chrono::{Duration, TimeZone, Utc};
use pwin_engine::application::batch::BatchRunner;
use pwin_engine::application::pipeline::EstimationPipeline;
use pwin_engine::application::rolling::window_manager::WarmupPolicy;
use pwin_engine::application::trend_matrix::TrendMatrix;
use pwin_engine::config::DomainConfig;
use pwin_engine::domain::errors::EstimationError;
use pwin_engine::domain::series::observation::ObservationStore;
use pwin_engine::infrastructure::csv_loader::read_series;
use pwin_engine::infrastructure::export::write_matrix_csv;
use pwin_engine::infrastructure::observability::EngineMetrics;
use std::sync::Arc;

fn csv_text(n: usize, price: impl Fn(usize) -> f64) -> String {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let mut text = String::from("date,close\n");
    for i in 0..n {
        let date = start + Duration::days(i as i64);
        text.push_str(&format!("{},{}\n", date.format("%Y-%m-%d"), price(i)));
    }
    text
}

fn store() -> ObservationStore {
    let zigzag = |i: usize| 100.0 + ((i * 7) % 10) as f64 + i as f64 * 0.03;
    let inputs = [
        ("AAPL", csv_text(600, zigzag)),
        ("MSFT", csv_text(600, |i| zigzag(i + 3) * 2.0)),
        ("DELISTED", csv_text(600, |i| if i == 400 { 0.0 } else { zigzag(i) })),
        ("NEWCO", csv_text(20, zigzag)),
    ];
    inputs
        .iter()
        .map(|(entity, text)| read_series(text.as_bytes(), entity).unwrap())
        .collect()
}

#[test]
fn test_batch_continues_past_failures() {
    let metrics = EngineMetrics::new().unwrap();
    let runner = BatchRunner::new(Arc::new(
        EstimationPipeline::new(&DomainConfig::equity_rolling()).unwrap(),
    ))
    .with_metrics(metrics.clone())
    .with_threads(3);

    let as_of = Utc.with_ymd_and_hms(2021, 8, 22, 0, 0, 0).unwrap();
    let outcomes = runner.snapshots(&store(), as_of, &WarmupPolicy::rolling(1));

    let by_entity = |name: &str| outcomes.iter().find(|o| o.entity == name).unwrap();
    assert!(by_entity("AAPL").is_ok());
    assert!(by_entity("MSFT").is_ok());
    assert!(matches!(
        by_entity("DELISTED").result,
        Err(EstimationError::MalformedObservation { .. })
    ));
    assert!(matches!(
        by_entity("NEWCO").result,
        Err(EstimationError::InsufficientHistory { .. })
    ));

    let rendered = metrics.render();
    assert!(rendered.contains("pwin_snapshots_built_total 2"));
    assert!(rendered.contains("kind=\"insufficient_history\"} 1"));
}

#[test]
fn test_matrix_export_end_to_end() {
    let config = DomainConfig::equity_rolling();
    let runner = BatchRunner::new(Arc::new(EstimationPipeline::new(&config).unwrap()));
    let as_of = Utc.with_ymd_and_hms(2021, 8, 22, 0, 0, 0).unwrap();

    let matrix = TrendMatrix::build(&runner, &store(), as_of, &config.horizons, config.threshold.as_ref()).unwrap();
    let mut out = Vec::new();
    write_matrix_csv(&matrix, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "entity,p_up_daily,n_daily,p_up_weekly,n_weekly,p_up_monthly,n_monthly,threshold"
    );
    assert_eq!(lines.len(), 5);
    let aapl = lines.iter().find(|l| l.starts_with("AAPL,")).unwrap();
    assert_eq!(aapl.split(',').filter(|f| f.is_empty()).count(), 0);
    let delisted = lines.iter().find(|l| l.starts_with("DELISTED,")).unwrap();
    // cells fail, the threshold only looks at the clean trailing window
    assert!(delisted.starts_with("DELISTED,,,,,,,"));
    assert_eq!(delisted.split(',').count(), 8);
}
