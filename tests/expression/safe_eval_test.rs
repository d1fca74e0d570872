//! Formula evaluation through the public API.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use semlayer::expression::{referenced_names, MAX_AST_DEPTH};
    use semlayer::{evaluate, SafeExpression, SafeExpressionError};

    fn ns(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_business_formulas() {
        let values = ns(&[
            ("total_revenue", 1200.0),
            ("total_customers", 8.0),
            ("churned", 2.0),
            ("starting", 40.0),
        ]);
        assert_eq!(evaluate("total_revenue / total_customers", &values).unwrap(), 150.0);
        assert_eq!(evaluate("churned / starting * 100", &values).unwrap(), 5.0);
        assert_eq!(evaluate("round(total_revenue / 7, 2)", &values).unwrap(), 171.43);
        assert_eq!(evaluate("max(churned, starting) - min(churned, 1)", &values).unwrap(), 39.0);
        assert_eq!(evaluate("total_revenue // 7", &values).unwrap(), 171.0);
        assert_eq!(evaluate("total_revenue % 7", &values).unwrap(), 3.0);
    }

    #[test]
    fn test_guarded_division() {
        let expr = SafeExpression::parse("a / b if b != 0 else 0").unwrap();
        assert_eq!(expr.eval(&ns(&[("a", 9.0), ("b", 0.0)])).unwrap(), 0.0);
        assert_eq!(expr.eval(&ns(&[("a", 9.0), ("b", 3.0)])).unwrap(), 3.0);
    }

    #[test]
    fn test_unguarded_division_by_zero() {
        assert_eq!(
            evaluate("a / b", &ns(&[("a", 1.0), ("b", 0.0)])),
            Err(SafeExpressionError::DivisionByZero)
        );
        assert_eq!(
            evaluate("a % b", &ns(&[("a", 1.0), ("b", 0.0)])),
            Err(SafeExpressionError::DivisionByZero)
        );
    }

    #[test]
    fn test_escape_attempts_fail_closed() {
        let attempts = [
            "__import__('os').system('ls')",
            "open('/etc/passwd').read()",
            "eval('1')",
            "exec('x = 1')",
            "getattr(a, 'b')",
            "a.__class__.__bases__",
            "().__class__",
            "globals()",
            "[c for c in ().__class__.__subclasses__()]",
            "lambda: 1",
            "a[0]",
            "x := 1",
            "a and b",
            "'text'",
        ];
        let values = ns(&[("a", 1.0), ("b", 2.0)]);
        for src in attempts {
            assert!(evaluate(src, &values).is_err(), "accepted: {src}");
        }
    }

    #[test]
    fn test_non_whitelisted_call_is_named() {
        match SafeExpression::parse("system(1)") {
            Err(SafeExpressionError::Disallowed(msg)) => assert!(msg.contains("system")),
            other => panic!("expected Disallowed, got {other:?}"),
        }
    }

    #[test]
    fn test_size_limits() {
        let deep = format!("{}a{}", "(".repeat(MAX_AST_DEPTH * 2), ")".repeat(MAX_AST_DEPTH * 2));
        assert!(matches!(
            SafeExpression::parse(&deep),
            Err(SafeExpressionError::DepthExceeded(_))
        ));

        let wide = vec!["a"; 1000].join(" + ");
        assert!(matches!(
            SafeExpression::parse(&wide),
            Err(SafeExpressionError::TooManyNodes(_))
        ));
    }

    #[test]
    fn test_unknown_name_is_reported() {
        assert_eq!(
            evaluate("revenue - costs", &ns(&[("revenue", 1.0)])),
            Err(SafeExpressionError::UnknownName("costs".into()))
        );
    }

    #[test]
    fn test_referenced_names_are_ordered_and_unique() {
        assert_eq!(
            referenced_names("(revenue - refunds) / revenue if revenue > 0 else 0").unwrap(),
            vec!["revenue", "refunds"]
        );
        assert!(referenced_names("a.b").is_err());
    }
}
