//! Temporal dimensions grouped on the embedded engine.

#[cfg(test)]
mod tests {
    use semlayer::model::Aggregation;
    use semlayer::{
        ConnectionDescriptor, Dialect, DimensionDefinition, MetricDefinition, MetricRegistry,
        Model, QueryCompiler, QueryRequest, SemanticLayerError, SqliteEngine,
    };
    use serde_json::json;

    const QUARTER: &str = "strftime('%Y', {TABLE}.signed_at) || '-Q' || \
                           ((CAST(strftime('%m', {TABLE}.signed_at) AS INTEGER) + 2) / 3)";

    fn fixture() -> (MetricRegistry, SqliteEngine) {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute_batch(
                "CREATE TABLE contracts (id INTEGER, signed_at TEXT, value REAL);
                 INSERT INTO contracts VALUES
                   (1, '2024-03-15', 100), (2, '2024-03-02', 50),
                   (3, '2024-11-20', 70), (4, '2025-01-09', 10);",
            )
            .unwrap();
        let model = Model::new("sales", ConnectionDescriptor::sqlite(":memory:"))
            .with_metric(MetricDefinition::simple(
                "contract_value",
                "contracts",
                Aggregation::Sum,
                "value",
            ))
            .with_dimension(DimensionDefinition::temporal(
                "signed_month",
                "contracts",
                "strftime('%Y-%m', {TABLE}.signed_at)",
            ))
            .with_dimension(DimensionDefinition::temporal("signed_quarter", "contracts", QUARTER))
            .with_dimension(DimensionDefinition::temporal(
                "signed_year",
                "contracts",
                "DATE_FORMAT({TABLE}.signed_at, '%Y')",
            ))
            .with_dimension(DimensionDefinition::temporal(
                "signed_week",
                "contracts",
                "date_trunc('week', {TABLE}.signed_at)",
            ))
            .with_dimension(DimensionDefinition::temporal(
                "closed_month",
                "contracts",
                "strftime('%Y-%m', {TABLE}.closed_at)",
            ));
        (MetricRegistry::new(model), engine)
    }

    #[test]
    fn test_month_label() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(
                &QueryRequest::new("contract_value")
                    .with_dimension("signed_month")
                    .with_order_by("signed_month"),
            )
            .unwrap();
        assert_eq!(out.result.len(), 3);
        assert_eq!(out.result.value(0, "signed_month"), Some(&json!("2024-03")));
        assert_eq!(out.result.value(0, "contract_value"), Some(&json!(150.0)));
    }

    #[test]
    fn test_quarter_label() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(
                &QueryRequest::new("contract_value")
                    .with_dimension("signed_quarter")
                    .with_order_by("signed_quarter"),
            )
            .unwrap();
        let labels: Vec<&serde_json::Value> = (0..out.result.len())
            .filter_map(|row| out.result.value(row, "signed_quarter"))
            .collect();
        assert_eq!(labels, vec![&json!("2024-Q1"), &json!("2024-Q4"), &json!("2025-Q1")]);
    }

    #[test]
    fn test_column_first_format_is_rewritten_for_sqlite() {
        let (registry, engine) = fixture();
        let out = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("contract_value").with_dimension("signed_year"))
            .unwrap();
        assert!(out.sql.contains("STRFTIME('%Y'"));
        assert!(!out.sql.contains("DATE_FORMAT"));
        assert_eq!(out.result.len(), 2);
    }

    #[test]
    fn test_same_plan_renders_per_dialect() {
        let (registry, engine) = fixture();
        let plan = QueryCompiler::new(&registry, &engine)
            .plan(&QueryRequest::new("contract_value").with_dimension("signed_month"))
            .unwrap();
        assert!(plan.to_sql(Dialect::Sqlite).contains("STRFTIME"));
        assert!(!plan.to_sql(Dialect::Postgres).contains("STRFTIME"));
    }

    #[test]
    fn test_unsupported_template_is_refused() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("contract_value").with_dimension("signed_week"))
            .unwrap_err();
        assert!(matches!(err, SemanticLayerError::Query(_)));
    }

    #[test]
    fn test_template_column_must_exist() {
        let (registry, engine) = fixture();
        let err = QueryCompiler::new(&registry, &engine)
            .compile(&QueryRequest::new("contract_value").with_dimension("closed_month"))
            .unwrap_err();
        match err {
            SemanticLayerError::Query(message) => assert!(message.contains("closed_at")),
            other => panic!("expected Query error, got {other:?}"),
        }
    }
}
