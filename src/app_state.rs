use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;

use crate::cache::LinkCache;
use crate::config::Config;
use crate::fetcher::HttpFetcher;
use crate::metrics::ServiceMetrics;

/// Throughput is summarized (and the cookie jar recycled) every this
/// many processed items.
const OBJECTS_PER_LOG: usize = 1000;

/// Everything the handlers need, threaded explicitly instead of living
/// in globals. Cloning is cheap: every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn LinkCache>,
    pub fetcher: Arc<HttpFetcher>,
    pub providers: Arc<HashMap<String, String>>,
    pub metrics: Arc<ServiceMetrics>,
    pub multi_tags: Arc<HashSet<String>>,
    throughput: Arc<Mutex<Throughput>>,
}

struct Throughput {
    processed: usize,
    window_start: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        cache: Arc<dyn LinkCache>,
        fetcher: HttpFetcher,
        providers: HashMap<String, String>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let multi_tags = Arc::new(config.multi_tag_set());
        Self {
            config: Arc::new(config),
            cache,
            fetcher: Arc::new(fetcher),
            providers: Arc::new(providers),
            metrics,
            multi_tags,
            throughput: Arc::new(Mutex::new(Throughput {
                processed: 0,
                window_start: Instant::now(),
            })),
        }
    }

    /// Account one processed batch item. At every window boundary the
    /// throughput is logged and the shared cookie jar is replaced, so
    /// no jar outlives [`OBJECTS_PER_LOG`] items.
    pub fn log_processed(&self) {
        let mut window = self.throughput.lock().unwrap();
        window.processed += 1;
        if window.processed >= OBJECTS_PER_LOG {
            let elapsed = window.window_start.elapsed();
            let throughput = OBJECTS_PER_LOG as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            info!(
                took = ?elapsed,
                throughput,
                "processed {} objects",
                OBJECTS_PER_LOG
            );
            window.processed = 0;
            window.window_start = Instant::now();
            self.fetcher.reset_cookies();
        }
    }
}
