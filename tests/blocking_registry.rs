//! Integration tests for gathering through a BlockingRegistry.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use metric_cache::{
    BlockingRegistry, CacheError, CachedCollector, Gatherer, Labels, RawCollector, SharedFamily,
    TransactionalGatherer,
};
use prometheus::proto::{Gauge, Metric, MetricFamily, MetricType};
use prometheus::{IntGauge, Registry, TextEncoder};

fn family(name: &str) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(name.to_string());
    family.set_help(format!("{} help", name));
    family
}

struct Managed(Vec<&'static str>);

impl Gatherer for Managed {
    fn gather(&self) -> metric_cache::Result<Vec<MetricFamily>> {
        Ok(self.0.iter().map(|n| family(n)).collect())
    }
}

struct Unavailable;

impl Gatherer for Unavailable {
    fn gather(&self) -> metric_cache::Result<Vec<MetricFamily>> {
        Err(CacheError::Gather("registry unavailable".to_string()))
    }
}

struct Raw(Vec<&'static str>);

impl RawCollector for Raw {
    fn collect_into(&self, out: &mut Vec<SharedFamily>) {
        out.extend(self.0.iter().map(|n| Arc::new(family(n))));
    }
}

/// Raw collector that overwrites its shared buffer on every collect.
#[derive(Default)]
struct Overwriting {
    generation: AtomicU64,
}

impl RawCollector for Overwriting {
    fn collect_into(&self, out: &mut Vec<SharedFamily>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut gauge = Gauge::default();
        gauge.set_value(generation as f64);
        let mut metric = Metric::default();
        metric.set_gauge(gauge);
        let mut family = family("shared_buffer");
        family.set_field_type(MetricType::GAUGE);
        family.mut_metric().push(metric);
        out.push(Arc::new(family));
    }

    fn name(&self) -> &str {
        "overwriting"
    }
}

fn names<'a>(families: impl IntoIterator<Item = &'a MetricFamily>) -> Vec<String> {
    families
        .into_iter()
        .map(|f| f.get_name().to_string())
        .collect()
}

/// Managed [b, d] plus raw [a] and [c] gather as [a, b, c, d]
#[test]
fn test_merge_managed_and_raw() {
    let mut registry = BlockingRegistry::new(Managed(vec!["b", "d"]));
    registry.register_raw(Arc::new(Raw(vec!["a"])));
    registry.register_raw(Arc::new(Raw(vec!["c"])));

    let gathered = registry.gather().expect("gather should succeed");
    assert_eq!(names(&gathered), vec!["a", "b", "c", "d"]);
    assert!(gathered.error().is_none());
}

/// A failing base gatherer still returns raw families alongside the error
#[test]
fn test_partial_gather_on_base_failure() {
    let mut registry = BlockingRegistry::new(Unavailable);
    registry.register_raw(Arc::new(Raw(vec!["x"])));

    let gathered = registry.gather().expect("raw data should still be returned");
    assert_eq!(names(&gathered), vec!["x"]);
    assert!(matches!(gathered.error(), Some(CacheError::Gather(_))));
}

/// Output is sorted for every registration order of raw collectors
#[test]
fn test_sort_is_permutation_invariant() {
    let sources: [&[&'static str]; 3] = [&["a", "m"], &["c", "z"], &["b", "n", "o"]];
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut previous: Option<Vec<String>> = None;
    for order in orders {
        let mut registry = BlockingRegistry::new(Managed(vec!["d", "k", "y"]));
        for index in order {
            registry.register_raw(Arc::new(Raw(sources[index].to_vec())));
        }

        let gathered = registry.gather().unwrap();
        let got = names(&gathered);
        assert!(
            got.windows(2).all(|w| w[0] < w[1]),
            "not strictly ascending: {:?}",
            got
        );
        if let Some(ref expected) = previous {
            assert_eq!(&got, expected);
        }
        previous = Some(got);
    }
}

/// Two concurrent gathers never hold unreleased results at the same time
#[test]
fn test_concurrent_gathers_are_serialized() {
    let producer = Arc::new(Overwriting::default());
    let mut registry = BlockingRegistry::new(Managed(vec![]));
    registry.register_raw(producer.clone());

    let holders = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..10 {
                    let gathered = registry.gather().unwrap();
                    assert_eq!(holders.fetch_add(1, Ordering::SeqCst), 0);

                    let seen = gathered
                        .iter()
                        .find(|f| f.get_name() == "shared_buffer")
                        .map(|f| f.get_metric()[0].get_gauge().get_value())
                        .expect("shared buffer family");
                    thread::sleep(Duration::from_millis(1));

                    // Nobody collected again while this result was held.
                    assert_eq!(producer.generation.load(Ordering::SeqCst) as f64, seen);

                    holders.fetch_sub(1, Ordering::SeqCst);
                    gathered.release();
                }
            });
        }
    });

    assert_eq!(producer.generation.load(Ordering::SeqCst), 40);
}

/// with_gathered releases the lock once the closure returns
#[test]
fn test_with_gathered_releases() {
    let mut registry = BlockingRegistry::new(Managed(vec!["a"]));
    registry.register_raw(Arc::new(Raw(vec!["b"])));

    let count = registry.with_gathered(|g| g.len()).unwrap();
    assert_eq!(count, 2);

    let again = registry.with_gathered(|g| names(g)).unwrap();
    assert_eq!(again, vec!["a", "b"]);
}

/// Cached collector output merges with a real prometheus registry and encodes as text
#[test]
fn test_prometheus_registry_with_cached_collector() {
    let prom = Registry::new();
    let workers = IntGauge::new("workers", "Active workers").unwrap();
    prom.register(Box::new(workers.clone())).unwrap();
    workers.set(3);

    let cached = Arc::new(CachedCollector::new("queues"));
    cached
        .update(|session| {
            let desc = session.resolve("queue_depth", "Queue depth", &["queue"], &Labels::new());
            session.record_value(desc.clone(), MetricType::GAUGE, 7.0, &["ingest"])?;
            session.record_value(desc, MetricType::GAUGE, 2.0, &["export"])
        })
        .unwrap();

    let mut registry = BlockingRegistry::new(prom);
    registry.register_raw(cached);

    let gathered = registry.gather().unwrap();
    assert_eq!(names(&gathered), vec!["queue_depth", "workers"]);

    let mut buffer = Vec::new();
    gathered.encode(&TextEncoder::new(), &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert!(text.contains("# TYPE queue_depth gauge"));
    assert!(text.contains("queue_depth{queue=\"ingest\"} 7"));
    assert!(text.contains("workers 3"));
}
