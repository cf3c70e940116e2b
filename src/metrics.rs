use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

pub struct Metrics {
    pub entity_reads_total: AtomicU64,
    pub entity_writes_total: AtomicU64,
    pub entity_deletes_total: AtomicU64,
    pub entity_conflicts_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            entity_reads_total: AtomicU64::new(0),
            entity_writes_total: AtomicU64::new(0),
            entity_deletes_total: AtomicU64::new(0),
            entity_conflicts_total: AtomicU64::new(0),
        }
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}

pub(crate) fn record_read(count: u64) {
    metrics().entity_reads_total.fetch_add(count, Ordering::Relaxed);
}

pub(crate) fn record_write() {
    metrics().entity_writes_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_delete(count: u64) {
    metrics()
        .entity_deletes_total
        .fetch_add(count, Ordering::Relaxed);
}

pub(crate) fn record_conflict() {
    metrics()
        .entity_conflicts_total
        .fetch_add(1, Ordering::Relaxed);
}

pub fn render_prometheus() -> String {
    let m = metrics();
    let mut s = String::new();
    let _ = writeln!(
        s,
        "# TYPE entity_reads_total counter\nentity_reads_total {}",
        m.entity_reads_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE entity_writes_total counter\nentity_writes_total {}",
        m.entity_writes_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE entity_deletes_total counter\nentity_deletes_total {}",
        m.entity_deletes_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE entity_conflicts_total counter\nentity_conflicts_total {}",
        m.entity_conflicts_total.load(Ordering::Relaxed)
    );
    s
}
