//! Advice for the SQL the compiler actually produces.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use semlayer::model::Aggregation;
    use semlayer::optimizer::{analyze, optimize, suggest_cache_strategy, ComplexityLevel};
    use semlayer::{
        ConnectionDescriptor, DimensionDefinition, MetricDefinition, MetricRegistry, Model,
        QueryCache, QueryRequest, SemanticLayer, Settings, SqliteEngine,
    };

    fn layer() -> SemanticLayer {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE orders (id INTEGER, customer_id INTEGER, status TEXT, total REAL);
                 CREATE TABLE customers (customer_id INTEGER, country TEXT);
                 INSERT INTO orders VALUES (1, 1, 'paid', 10), (2, 2, 'paid', 20);
                 INSERT INTO customers VALUES (1, 'NZ'), (2, 'AU');",
            )
            .unwrap();
        let model = Model::new("shop", ConnectionDescriptor::sqlite(":memory:"))
            .with_metric(
                MetricDefinition::simple("revenue", "orders", Aggregation::Sum, "total")
                    .with_filter("status = 'paid'"),
            )
            .with_dimension(DimensionDefinition::categorical("country", "customers", "country"));
        SemanticLayer::new(
            MetricRegistry::new(model),
            Arc::new(engine),
            Arc::new(QueryCache::default()),
            Settings::default(),
        )
    }

    #[test]
    fn test_advice_for_compiled_join() {
        let layer = layer();
        let response = layer
            .query(&QueryRequest::new("revenue").with_dimension("country").with_limit(10))
            .unwrap();
        let report = layer.advise(&response.sql);

        // one join, GROUP BY, LIMIT
        assert_eq!(report.complexity.score, 10);
        assert_eq!(report.complexity.level, ComplexityLevel::Low);
        assert!(report.cache.should_cache);
        assert_eq!(report.cache.ttl_seconds, 900);

        let columns: Vec<(&str, &str)> = report
            .indexes
            .iter()
            .map(|s| (s.table.as_str(), s.column.as_str()))
            .collect();
        assert!(columns.contains(&("orders", "status")));
        assert!(columns.contains(&("orders", "customer_id")));
        assert!(columns.contains(&("customers", "customer_id")));
    }

    #[test]
    fn test_pure_aggregate_caches_for_an_hour() {
        let layer = layer();
        let response = layer.query(&QueryRequest::new("revenue")).unwrap();
        let strategy = suggest_cache_strategy(&response.sql);
        assert!(strategy.should_cache);
        assert_eq!(strategy.ttl_seconds, 3600);
    }

    #[test]
    fn test_recommendations() {
        let report = optimize(
            "SELECT * FROM events e WHERE e.id IN (SELECT id FROM flagged) AND created_at > NOW()",
        );
        assert!(!report.cache.should_cache);
        assert_eq!(report.cache.ttl_seconds, 0);
        let text = report.recommendations.join("\n");
        assert!(text.contains("SELECT *"));
        assert!(text.contains("subqueries"));
        assert!(text.contains("Do not cache"));
    }

    #[test]
    fn test_score_is_bounded() {
        let mut sql = String::from("SELECT a FROM t0");
        for i in 1..20 {
            sql.push_str(&format!(" JOIN t{i} ON t{i}.k = t0.k"));
        }
        let report = analyze(&sql);
        assert_eq!(report.score, 100);
        assert_eq!(report.level, ComplexityLevel::VeryHigh);
        assert_eq!(analyze("SELECT a FROM t LIMIT 1").score, 0);
    }
}
