//! Derived metrics computed from their component results.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use semlayer::model::Aggregation;
    use semlayer::{
        ConnectionDescriptor, DimensionDefinition, MetricDefinition, MetricRegistry, Model,
        QueryCache, QueryCompiler, QueryRequest, SafeExpressionError, SemanticLayer,
        SemanticLayerError, Settings, SqliteEngine,
    };
    use serde_json::json;

    fn fixture() -> (MetricRegistry, SqliteEngine) {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE accounts (id INTEGER, segment TEXT, status TEXT, revenue REAL);
                 INSERT INTO accounts VALUES
                   (1, 'smb', 'paying', 100), (2, 'smb', 'paying', 300),
                   (3, 'enterprise', 'paying', 5000), (4, 'trial', 'trialing', 0);",
            )
            .unwrap();
        let model = Model::new("accounts", ConnectionDescriptor::sqlite(":memory:"))
            .with_metric(MetricDefinition::simple(
                "total_revenue",
                "accounts",
                Aggregation::Sum,
                "revenue",
            ))
            .with_metric(
                MetricDefinition::simple("total_customers", "accounts", Aggregation::Count, "id")
                    .with_filter("status = 'paying'"),
            )
            .with_metric(
                MetricDefinition::derived("arpu", "total_revenue / total_customers")
                    .with_display_name("ARPU"),
            )
            .with_metric(MetricDefinition::derived(
                "safe_arpu",
                "total_revenue / total_customers if total_customers > 0 else 0",
            ))
            .with_metric(MetricDefinition::derived("escape", "__import__('os')"))
            .with_dimension(DimensionDefinition::categorical("segment", "accounts", "segment"));
        (MetricRegistry::new(model), engine)
    }

    #[test]
    fn test_missing_group_component_fails_the_query() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("arpu").with_dimension("segment"))
            .unwrap_err();
        assert_eq!(
            err,
            SemanticLayerError::SafeExpression(SafeExpressionError::DivisionByZero)
        );
    }

    #[test]
    fn test_guarded_formula_covers_missing_group() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(
                &QueryRequest::new("safe_arpu")
                    .with_dimension("segment")
                    .with_order_by("segment"),
            )
            .unwrap();
        assert_eq!(
            out.result.columns,
            vec!["segment", "total_revenue", "total_customers", "safe_arpu"]
        );
        assert_eq!(out.result.len(), 3);
        assert_eq!(out.result.value(0, "segment"), Some(&json!("enterprise")));
        assert_eq!(out.result.value(0, "safe_arpu"), Some(&json!(5000.0)));
        assert_eq!(out.result.value(1, "safe_arpu"), Some(&json!(200.0)));
        assert_eq!(out.result.value(2, "segment"), Some(&json!("trial")));
        assert_eq!(out.result.value(2, "total_customers"), Some(&json!(0.0)));
        assert_eq!(out.result.value(2, "safe_arpu"), Some(&json!(0.0)));
    }

    #[test]
    fn test_ungrouped_formula() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("arpu"))
            .unwrap();
        assert_eq!(out.result.len(), 1);
        assert_eq!(out.result.value(0, "arpu"), Some(&json!(1800.0)));
    }

    #[test]
    fn test_rejected_formula_surfaces_as_safe_expression_error() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("escape"))
            .unwrap_err();
        assert!(matches!(err, SemanticLayerError::SafeExpression(_)));
        assert_eq!(err.kind(), "SafeExpressionError");
    }

    #[test]
    fn test_served_response_and_payload() {
        let (registry, engine) = fixture();
        let layer = SemanticLayer::new(
            registry,
            Arc::new(engine),
            Arc::new(QueryCache::default()),
            Settings::default(),
        );

        let response = layer.query(&QueryRequest::new("arpu")).unwrap();
        assert_eq!(response.display_name, "ARPU");
        assert!(response.sql.contains("-- total_revenue"));
        assert!(response.sql.contains("-- total_customers"));

        let payload = layer.query_payload(&QueryRequest::new("arpu").with_dimension("segment"));
        assert_eq!(payload["error"], "SafeExpressionError");
        assert_eq!(payload["message"], "division by zero");
        assert_eq!(payload["request"]["metric"], "arpu");
    }

    #[test]
    fn test_component_invalidation_reaches_derived_results() {
        let (registry, engine) = fixture();
        let layer = SemanticLayer::new(
            registry,
            Arc::new(engine),
            Arc::new(QueryCache::default()),
            Settings::default(),
        );
        layer.query(&QueryRequest::new("arpu")).unwrap();
        assert_eq!(layer.invalidate_table("accounts"), 1);
    }
}
