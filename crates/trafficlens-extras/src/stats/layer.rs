//! StatsLayer middleware.

use super::aggregator::StatsAggregator;
use super::config::StatsConfig;
use super::holder::StatsHolder;
use super::sample::RequestSample;
use std::sync::Arc;
use std::time::Instant;
use trafficlens_core::middleware::{BoxFuture, BoxedNext, HandlerResult, MiddlewareLayer};
use trafficlens_core::Request;

/// Records a [`RequestSample`] for every completed, non-excluded request.
///
/// The response passes through untouched. A handler error propagates
/// without being recorded.
///
/// ```
/// use std::sync::Arc;
/// use trafficlens_extras::stats::{StatsConfig, StatsHolder, StatsLayer};
///
/// let holder = Arc::new(StatsHolder::new());
/// let layer = StatsLayer::with_holder(StatsConfig::new(), holder.clone());
/// assert!(!holder.is_populated());
/// # let _ = layer;
/// ```
#[derive(Clone)]
pub struct StatsLayer {
    aggregator: Arc<StatsAggregator>,
}

impl StatsLayer {
    /// Default configuration with a private holder.
    pub fn new() -> Self {
        Self::with_config(StatsConfig::new())
    }

    /// Custom configuration with a private holder.
    pub fn with_config(config: StatsConfig) -> Self {
        Self::with_holder(config, Arc::new(StatsHolder::new()))
    }

    /// Custom configuration publishing into a shared holder.
    pub fn with_holder(config: StatsConfig, holder: Arc<StatsHolder>) -> Self {
        Self::from_aggregator(Arc::new(StatsAggregator::new(config, holder)))
    }

    /// Wrap an existing aggregator.
    pub fn from_aggregator(aggregator: Arc<StatsAggregator>) -> Self {
        Self { aggregator }
    }

    /// The aggregator behind this layer.
    pub fn aggregator(&self) -> &Arc<StatsAggregator> {
        &self.aggregator
    }

    /// The holder the aggregator publishes into.
    pub fn holder(&self) -> &Arc<StatsHolder> {
        self.aggregator.holder()
    }
}

impl Default for StatsLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareLayer for StatsLayer {
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<HandlerResult> {
        let aggregator = self.aggregator.clone();

        Box::pin(async move {
            if aggregator.config().is_excluded(req.path()) {
                return next(req).await;
            }

            let url = req.full_url();
            let method = req.method().to_string();

            let start = Instant::now();
            let response = next(req).await?;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            aggregator.record(RequestSample::from_response(url, method, elapsed_ms, &response));
            Ok(response)
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
