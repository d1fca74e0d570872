//! Model documents loaded from disk.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use semlayer::model::loader::{load_model, LoadError};
    use semlayer::model::{Aggregation, DimensionKind, MetricKind};
    use semlayer::{ConnectionKind, MetricRegistry, SemanticLayerError};
    use tempfile::TempDir;

    const SAAS_TOML: &str = r#"
name = "saas"
description = "Subscription analytics"

[connection]
type = "sqlite"
path = "${SEMLAYER_LOADER_TEST_DB:/tmp/fallback.db}"

[[metrics]]
name = "total_mrr"
display_name = "Total MRR"
description = "Monthly recurring revenue from active subscriptions"
type = "simple"

[metrics.calculation]
table = "subscriptions"
aggregation = "sum"
column = "amount"
filters = ["status = 'active'"]

[[metrics]]
name = "subscription_count"

[metrics.calculation]
table = "subscriptions"
aggregation = "count"

[[metrics]]
name = "mrr_per_subscription"
type = "derived"

[metrics.calculation]
formula = "total_mrr / subscription_count"

[[dimensions]]
name = "plan"
table = "subscriptions"
column = "plan"

[[dimensions]]
name = "region"
table = "customers"
column = "region"
join_key = "customer_id"

[[temporal_dimensions]]
name = "signup_month"
table = "subscriptions"
sql = "strftime('%Y-%m', {TABLE}.started_at)"

[[canonical_datasets]]
name = "active_subscriptions"
table = "subscriptions"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml_document() {
        let dir = TempDir::new().unwrap();
        let model = load_model(&write(&dir, "model.toml", SAAS_TOML)).unwrap();

        assert_eq!(model.name, "saas");
        assert_eq!(model.connection.kind, ConnectionKind::Sqlite);
        assert_eq!(model.metrics.len(), 3);
        assert_eq!(model.canonical_datasets[0].name, "active_subscriptions");

        let mrr = &model.metrics[0];
        assert_eq!(mrr.display_name, "Total MRR");
        match &mrr.kind {
            MetricKind::Simple(calc) => {
                assert_eq!(calc.aggregation, Aggregation::Sum);
                assert_eq!(calc.column.as_deref(), Some("amount"));
                assert_eq!(calc.filters, vec!["status = 'active'"]);
            }
            other => panic!("expected simple metric, got {other:?}"),
        }

        let count = &model.metrics[1];
        assert_eq!(count.display_name, "subscription_count");
        assert!(matches!(&count.kind, MetricKind::Simple(calc) if calc.column.is_none()));
        assert!(model.metrics[2].is_derived());

        let names: Vec<&str> = model.dimensions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["plan", "region", "signup_month"]);
        assert_eq!(model.dimensions[1].join_key.as_deref(), Some("customer_id"));
        assert!(model.dimensions[2].is_temporal());
    }

    #[test]
    fn test_env_placeholder_default_and_override() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.toml", SAAS_TOML);

        std::env::remove_var("SEMLAYER_LOADER_TEST_DB");
        let model = load_model(&path).unwrap();
        assert_eq!(model.connection.path.as_deref(), Some("/tmp/fallback.db"));
    }

    #[test]
    fn test_env_placeholder_set() {
        let dir = TempDir::new().unwrap();
        let doc = SAAS_TOML.replace("SEMLAYER_LOADER_TEST_DB", "SEMLAYER_LOADER_TEST_DB_SET");
        let path = write(&dir, "model.toml", &doc);

        std::env::set_var("SEMLAYER_LOADER_TEST_DB_SET", "/data/warehouse.db");
        let model = load_model(&path).unwrap();
        assert_eq!(model.connection.path.as_deref(), Some("/data/warehouse.db"));
    }

    #[test]
    fn test_load_json_document() {
        let dir = TempDir::new().unwrap();
        let doc = r#"{
            "name": "billing",
            "connection": {"type": "local", "path": "billing.db"},
            "metrics": [
                {"name": "revenue", "calculation": {"table": "invoices", "aggregation": "SUM", "column": "amount"}},
                {"name": "arpc", "calculation": {"formula": "revenue / 2"}}
            ],
            "dimensions": [
                {"name": "month", "type": "temporal", "table": "invoices", "sql": "strftime('%Y-%m', {TABLE}.issued_at)"}
            ]
        }"#;
        let registry = MetricRegistry::load(&write(&dir, "billing.json", doc)).unwrap();

        assert_eq!(registry.name(), "billing");
        assert_eq!(registry.metric_names(), vec!["revenue", "arpc"]);
        assert!(registry.get_metric("arpc").unwrap().is_derived());
        assert!(matches!(
            registry.get_dimension("month").map(|d| &d.kind),
            Some(DimensionKind::Temporal { .. })
        ));
    }

    #[test]
    fn test_temporal_file_merge_keeps_first_definition() {
        let dir = TempDir::new().unwrap();
        let model_path = write(&dir, "model.toml", SAAS_TOML);
        let temporal_path = write(
            &dir,
            "temporal.toml",
            r#"
[[temporal_dimensions]]
name = "signup_month"
table = "subscriptions"
sql = "strftime('%m', {TABLE}.started_at)"

[[temporal_dimensions]]
name = "signup_quarter"
table = "subscriptions"
sql = "strftime('%Y', {TABLE}.started_at) || '-Q' || ((CAST(strftime('%m', {TABLE}.started_at) AS INTEGER) + 2) / 3)"
"#,
        );

        let registry = MetricRegistry::load(&model_path)
            .unwrap()
            .with_temporal_file(&temporal_path)
            .unwrap();

        assert_eq!(
            registry.dimension_names(),
            vec!["plan", "region", "signup_month", "signup_quarter"]
        );
        match &registry.get_dimension("signup_month").unwrap().kind {
            DimensionKind::Temporal { sql } => assert!(sql.contains("%Y-%m")),
            other => panic!("expected temporal, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_section() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "model.toml",
            "name = \"x\"\n[connection]\ntype = \"sqlite\"\npath = \"x.db\"\n",
        );
        match load_model(&path) {
            Err(LoadError::MissingSection { section }) => assert_eq!(section, "metrics"),
            other => panic!("expected missing section, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_documents() {
        let dir = TempDir::new().unwrap();
        let base = "name = \"x\"\n[connection]\ntype = \"sqlite\"\npath = \"x.db\"\n";

        let bad_aggregation = format!(
            "{base}[[metrics]]\nname = \"m\"\n[metrics.calculation]\ntable = \"t\"\naggregation = \"median\"\ncolumn = \"c\"\n"
        );
        assert!(matches!(
            load_model(&write(&dir, "agg.toml", &bad_aggregation)),
            Err(LoadError::InvalidValue { .. })
        ));

        let missing_column = format!(
            "{base}[[metrics]]\nname = \"m\"\n[metrics.calculation]\ntable = \"t\"\naggregation = \"sum\"\n"
        );
        assert!(matches!(
            load_model(&write(&dir, "col.toml", &missing_column)),
            Err(LoadError::MissingField { .. })
        ));

        let duplicate = format!(
            "{base}[[metrics]]\nname = \"m\"\n[metrics.calculation]\nformula = \"1\"\n\
             [[metrics]]\nname = \"m\"\n[metrics.calculation]\nformula = \"2\"\n"
        );
        assert!(matches!(
            load_model(&write(&dir, "dup.toml", &duplicate)),
            Err(LoadError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_file_errors_surface_as_configuration_errors() {
        let dir = TempDir::new().unwrap();
        let err = MetricRegistry::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SemanticLayerError::Configuration(_)));

        let err = MetricRegistry::load(&write(&dir, "model.yaml", "name: x")).unwrap_err();
        assert!(matches!(err, SemanticLayerError::Configuration(_)));
    }
}
