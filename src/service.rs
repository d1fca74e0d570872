//! The query-serving boundary.
//!
//! [`SemanticLayer`] ties the registry, an engine and a result cache
//! together: a request is looked up in the cache, compiled and executed on a
//! miss, and the response is stored under the tags `metric:<name>` and
//! `table:<table>`. Concurrent identical misses share one execution.
//!
//! Failures leave the boundary as `{error, message, request}` payloads via
//! [`SemanticLayer::query_payload`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{cache_key, CacheConfig, CacheStats, QueryCache};
use crate::config::Settings;
use crate::engine::{self, TabularEngine};
use crate::error::{SemanticLayerError, SemanticResult};
use crate::model::MetricRegistry;
use crate::optimizer::{self, OptimizationReport};
use crate::planner::{QueryCompiler, QueryRequest};

/// Response handed back to the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub metric: String,
    pub display_name: String,
    pub description: String,
    pub dimensions: Vec<String>,
    pub data: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub sql: String,
    /// When the result was computed (RFC 3339).
    pub timestamp: String,
    /// True when served from the cache.
    pub cached: bool,
    /// Filters or formula components that were not applied.
    pub warnings: Vec<String>,
}

type InFlight = Arc<OnceLock<SemanticResult<QueryResponse>>>;

pub struct SemanticLayer {
    registry: MetricRegistry,
    engine: Arc<dyn TabularEngine>,
    cache: Arc<QueryCache<QueryResponse>>,
    settings: Settings,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl SemanticLayer {
    pub fn new(
        registry: MetricRegistry,
        engine: Arc<dyn TabularEngine>,
        cache: Arc<QueryCache<QueryResponse>>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            engine,
            cache,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Load a model document, connect to its data store and build a cache,
    /// all from `settings`. `settings.engine.db_path` overrides the
    /// document's database path and `settings.model.temporal_path`, when
    /// set, is merged into the model.
    pub fn open(model_path: &Path, settings: Settings) -> SemanticResult<Self> {
        let mut registry = MetricRegistry::load(model_path)?;
        if let Some(temporal) = &settings.model.temporal_path {
            registry = registry.with_temporal_file(Path::new(temporal))?;
        }
        let engine = engine::connect(registry.connection(), settings.engine.db_path.as_deref())?;
        let cache = Arc::new(QueryCache::new(CacheConfig::from(&settings.cache)));
        tracing::info!(
            model = registry.name(),
            metrics = registry.metric_names().len(),
            dimensions = registry.dimension_names().len(),
            "semantic layer ready"
        );
        Ok(Self::new(registry, engine, cache, settings))
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Serve a request, from the cache when possible.
    pub fn query(&self, request: &QueryRequest) -> SemanticResult<QueryResponse> {
        request.validate()?;
        let text = cache_text(&request.metric);
        let params = match serde_json::to_value(request) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "request not cacheable");
                return self.execute(request, None);
            }
        };

        if let Some(mut hit) = self.cache.get(&text, Some(&params)) {
            tracing::debug!(metric = %request.metric, "cache hit");
            hit.cached = true;
            return Ok(hit);
        }

        let (key, _) = cache_key(&text, Some(&params));
        let cell = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let result = cell
            .get_or_init(|| self.execute(request, Some(&params)))
            .clone();

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            in_flight.remove(&key);
        }
        result
    }

    /// Like [`query`](Self::query), but failures become an
    /// `{error, message, request}` payload instead of an `Err`.
    pub fn query_payload(&self, request: &QueryRequest) -> Value {
        let outcome = self.query(request).and_then(|response| {
            serde_json::to_value(response).map_err(|e| SemanticLayerError::Query(e.to_string()))
        });
        match outcome {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(metric = %request.metric, error = %e, "query failed");
                let echo = serde_json::to_value(request).unwrap_or(Value::Null);
                serde_json::to_value(e.to_payload(echo)).unwrap_or(Value::Null)
            }
        }
    }

    /// Accept a raw JSON request, as received from a tool call.
    pub fn query_json(&self, request: &Value) -> Value {
        match QueryRequest::deserialize(request) {
            Ok(parsed) => self.query_payload(&parsed),
            Err(e) => {
                let err = SemanticLayerError::Validation(format!("malformed request: {e}"));
                serde_json::to_value(err.to_payload(request.clone())).unwrap_or(Value::Null)
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached results for a metric. Returns the number removed.
    pub fn invalidate_metric(&self, metric: &str) -> usize {
        self.cache.invalidate_by_tag(&format!("metric:{metric}"))
    }

    /// Drop cached results that read `table`.
    pub fn invalidate_table(&self, table: &str) -> usize {
        self.cache.invalidate_by_tag(&format!("table:{table}"))
    }

    /// Complexity, cache and index advice for a query text.
    pub fn advise(&self, query_text: &str) -> OptimizationReport {
        optimizer::optimize(query_text)
    }

    fn execute(&self, request: &QueryRequest, params: Option<&Value>) -> SemanticResult<QueryResponse> {
        let compiler =
            QueryCompiler::new(&self.registry, self.engine.as_ref()).with_settings(&self.settings.query);
        let compiled = compiler.compile(request)?;
        let metric = self.registry.get_metric(&request.metric)?;

        let response = QueryResponse {
            metric: metric.name.clone(),
            display_name: metric.display_name.clone(),
            description: metric.description.clone(),
            dimensions: request.dimensions.clone(),
            data: compiled.result.to_records(),
            row_count: compiled.result.len(),
            sql: compiled.sql,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            cached: false,
            warnings: compiled.warnings,
        };

        if let Some(params) = params {
            let mut tags = vec![format!("metric:{}", metric.name)];
            tags.extend(compiled.tables.iter().map(|t| format!("table:{t}")));
            self.cache
                .set(&cache_text(&metric.name), Some(params), response.clone(), None, &tags);
        }
        Ok(response)
    }
}

fn cache_text(metric: &str) -> String {
    format!("metric:{metric}")
}
