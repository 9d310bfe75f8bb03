//! Unit tests for the metrics registry

use dipwatch::metrics::Metrics;

#[test]
fn test_instances_are_independent() {
    let a = Metrics::new().unwrap();
    let b = Metrics::new().unwrap();
    a.processor_jobs_total.inc();
    assert_eq!(a.processor_jobs_total.get(), 1);
    assert_eq!(b.processor_jobs_total.get(), 0);
}

#[test]
fn test_export_contains_metrics() {
    let metrics = Metrics::new().unwrap();
    metrics.ingestor_messages_total.inc();
    metrics.processor_signals_total.with_label_values(&["dip"]).inc();
    metrics.processor_job_duration_seconds.observe(0.002);

    let body = metrics.export().unwrap();
    assert!(body.contains("ingestor_messages_total 1"));
    assert!(body.contains(r#"processor_signals_total{classification="dip"} 1"#));
    assert!(body.contains("processor_job_duration_seconds_bucket"));
    assert_eq!(metrics.signals("dip"), 1);
    assert_eq!(metrics.signals("stable"), 0);
}
