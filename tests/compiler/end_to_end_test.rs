//! Requests served end to end against an embedded database.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use semlayer::model::Aggregation;
    use semlayer::{
        ConnectionDescriptor, DimensionDefinition, MetricDefinition, MetricRegistry, Model,
        QueryCache, QueryRequest, SemanticLayer, SemanticLayerError, Settings, SqliteEngine,
    };
    use serde_json::json;
    use tempfile::TempDir;

    fn saas_model() -> Model {
        Model::new("saas", ConnectionDescriptor::sqlite(":memory:"))
            .with_metric(
                MetricDefinition::simple("total_mrr", "subscriptions", Aggregation::Sum, "amount")
                    .with_display_name("Total MRR")
                    .with_filter("status = 'active'"),
            )
            .with_metric(MetricDefinition::simple(
                "subscription_count",
                "subscriptions",
                Aggregation::Count,
                "id",
            ))
            .with_dimension(DimensionDefinition::categorical("plan", "subscriptions", "plan"))
            .with_dimension(DimensionDefinition::categorical("region", "customers", "region"))
    }

    fn layer(seed: &str) -> SemanticLayer {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE subscriptions (id INTEGER, customer_id INTEGER, plan TEXT, status TEXT, amount REAL);
                 CREATE TABLE customers (customer_id INTEGER, region TEXT);",
            )
            .unwrap();
        engine.execute_batch(seed).unwrap();
        SemanticLayer::new(
            MetricRegistry::new(saas_model()),
            Arc::new(engine),
            Arc::new(QueryCache::default()),
            Settings::default(),
        )
    }

    const SEED: &str = "INSERT INTO subscriptions VALUES
           (1, 10, 'pro', 'active', 30), (2, 11, 'pro', 'active', 30),
           (3, 12, 'team', 'active', 20), (4, 13, 'free', 'active', 0),
           (5, 10, 'team', 'cancelled', 20);
         INSERT INTO customers VALUES (10, 'emea'), (11, 'amer'), (12, 'amer'), (13, 'apac');";

    #[test]
    fn test_empty_table_without_dimensions() {
        let layer = layer("");
        let response = layer.query(&QueryRequest::new("total_mrr")).unwrap();
        assert_eq!(response.row_count, 0);
        assert!(response.data.is_empty());
        assert!(!response.cached);
    }

    #[test]
    fn test_one_row_per_category() {
        let layer = layer(SEED);
        let response = layer
            .query(&QueryRequest::new("total_mrr").with_dimension("plan").with_order_by("-total_mrr"))
            .unwrap();

        assert_eq!(response.row_count, 3);
        assert_eq!(response.display_name, "Total MRR");
        assert_eq!(response.dimensions, vec!["plan"]);
        assert_eq!(response.data[0]["plan"], json!("pro"));
        assert_eq!(response.data[0]["total_mrr"], json!(60.0));
        assert_eq!(response.data[2]["total_mrr"], json!(0.0));
        assert!(response.sql.contains("GROUP BY"));
    }

    #[test]
    fn test_joined_dimension_with_filter_and_limit() {
        let layer = layer(SEED);
        let response = layer
            .query(
                &QueryRequest::new("subscription_count")
                    .with_dimension("region")
                    .with_filter("status != 'cancelled'")
                    .with_order_by("-subscription_count")
                    .with_limit(1),
            )
            .unwrap();

        assert_eq!(response.row_count, 1);
        assert_eq!(response.data[0]["region"], json!("amer"));
        assert_eq!(response.data[0]["subscription_count"], json!(2));
        assert!(response.sql.contains("JOIN"));
        assert!(response.sql.contains("LIMIT 1"));
    }

    #[test]
    fn test_unparseable_filter_becomes_warning() {
        let layer = layer(SEED);
        let response = layer
            .query(&QueryRequest::new("subscription_count").with_filter("plan LIKE 'p%'"))
            .unwrap();
        assert_eq!(response.data[0]["subscription_count"], json!(5));
        assert_eq!(response.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_names() {
        let layer = layer(SEED);
        match layer.query(&QueryRequest::new("arr")) {
            Err(SemanticLayerError::MetricNotFound { available, .. }) => {
                assert_eq!(available, vec!["total_mrr", "subscription_count"]);
            }
            other => panic!("expected MetricNotFound, got {other:?}"),
        }
        assert!(matches!(
            layer.query(&QueryRequest::new("total_mrr").with_dimension("country")),
            Err(SemanticLayerError::DimensionNotFound { .. })
        ));
    }

    #[test]
    fn test_cache_hit_and_table_invalidation() {
        let layer = layer(SEED);
        let request = QueryRequest::new("total_mrr").with_dimension("plan");
        assert!(!layer.query(&request).unwrap().cached);
        assert!(layer.query(&request).unwrap().cached);

        assert_eq!(layer.invalidate_table("subscriptions"), 1);
        assert!(!layer.query(&request).unwrap().cached);

        let stats = layer.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_open_from_model_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("warehouse.db");
        let db = SqliteEngine::open(db_path.to_str().unwrap()).unwrap();
        db.execute_batch(
            "CREATE TABLE orders (id INTEGER, channel TEXT, total REAL);
             INSERT INTO orders VALUES (1, 'web', 10), (2, 'web', 15), (3, 'store', 5);",
        )
        .unwrap();
        drop(db);

        let model_path = dir.path().join("model.toml");
        fs::write(
            &model_path,
            r#"
name = "shop"

[connection]
type = "sqlite"
path = "${SEMLAYER_E2E_UNSET_DB:nowhere/missing.db}"

[[metrics]]
name = "revenue"

[metrics.calculation]
table = "orders"
aggregation = "sum"
column = "total"

[[dimensions]]
name = "channel"
table = "orders"
column = "channel"
"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.engine.db_path = Some(db_path.to_str().unwrap().to_string());
        let layer = SemanticLayer::open(&model_path, settings).unwrap();

        let payload = layer.query_json(&json!({
            "metric": "revenue",
            "dimensions": ["channel"],
            "orderBy": "channel"
        }));
        assert_eq!(payload["rowCount"], 2);
        assert_eq!(payload["data"][0]["channel"], "store");
        assert_eq!(payload["data"][1]["revenue"], 25.0);
    }

    #[test]
    fn test_open_merges_temporal_document_from_settings() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("warehouse.db");
        let db = SqliteEngine::open(db_path.to_str().unwrap()).unwrap();
        db.execute_batch(
            "CREATE TABLE orders (id INTEGER, placed_at TEXT, total REAL);
             INSERT INTO orders VALUES
               (1, '2024-01-05', 10), (2, '2024-01-20', 15), (3, '2024-02-02', 5);",
        )
        .unwrap();
        drop(db);

        let model_path = dir.path().join("model.toml");
        fs::write(
            &model_path,
            r#"
name = "shop"

[connection]
type = "sqlite"
path = "unused.db"

[[metrics]]
name = "revenue"

[metrics.calculation]
table = "orders"
aggregation = "sum"
column = "total"
"#,
        )
        .unwrap();
        let temporal_path = dir.path().join("temporal.toml");
        fs::write(
            &temporal_path,
            r#"
[[temporal_dimensions]]
name = "order_month"
table = "orders"
sql = "strftime('%Y-%m', {TABLE}.placed_at)"
"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.engine.db_path = Some(db_path.to_str().unwrap().to_string());
        settings.model.temporal_path = Some(temporal_path.to_str().unwrap().to_string());
        let layer = SemanticLayer::open(&model_path, settings).unwrap();
        assert!(layer.registry().get_dimension("order_month").is_some());

        let payload = layer.query_json(&json!({
            "metric": "revenue",
            "dimensions": ["order_month"],
            "orderBy": "order_month"
        }));
        assert_eq!(payload["rowCount"], 2);
        assert_eq!(payload["data"][0]["order_month"], "2024-01");
        assert_eq!(payload["data"][0]["revenue"], 25.0);
        assert_eq!(payload["data"][1]["order_month"], "2024-02");
    }

    #[test]
    fn test_open_fails_on_missing_temporal_document() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(
            &model_path,
            r#"{"name": "x", "connection": {"type": "sqlite", "path": ":memory:"},
                "metrics": [{"name": "n", "calculation": {"table": "t", "aggregation": "count"}}]}"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.model.temporal_path = Some(dir.path().join("absent.toml").to_str().unwrap().to_string());
        assert!(SemanticLayer::open(&model_path, settings).is_err());
    }

    #[test]
    fn test_open_reports_missing_database_directory() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(
            &model_path,
            r#"{"name": "x", "connection": {"type": "sqlite", "path": "/definitely/not/here/x.db"},
                "metrics": [{"name": "n", "calculation": {"table": "t", "aggregation": "count"}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            SemanticLayer::open(&model_path, Settings::default()),
            Err(SemanticLayerError::Connection(_))
        ));
    }
}
