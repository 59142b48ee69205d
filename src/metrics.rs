use std::sync::LazyLock;

use prometheus::*;

use crate::retriever::FusionMode;

static METRIC_RETRIEVE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("asset_retrieve_count", "count of retrieve calls", &["fusion"])
        .expect("failed to register asset_retrieve_count")
});

static METRIC_RETRIEVE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "asset_retrieve_duration",
        "duration of the per-call retrieval in seconds",
        &["fusion"]
    )
    .expect("failed to register asset_retrieve_duration")
});

static METRIC_RETRIEVE_CANDIDATES: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "asset_retrieve_candidates",
        "number of candidates above threshold per retrieve call",
        &["fusion"],
        exponential_buckets(1., 4., 8).unwrap_or_default()
    )
    .expect("failed to register asset_retrieve_candidates")
});

/// 记录一次检索
pub fn observe_retrieve(fusion: FusionMode, duration: f32, candidates: usize) {
    let labels = [fusion.as_str()];
    METRIC_RETRIEVE_COUNT.with_label_values(&labels).inc();
    METRIC_RETRIEVE_DURATION.with_label_values(&labels).observe(duration as f64);
    METRIC_RETRIEVE_CANDIDATES.with_label_values(&labels).observe(candidates as f64);
}
