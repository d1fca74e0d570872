//! Result cache behaviour through the public API.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use semlayer::cache::{cache_key, fingerprint, CacheConfig, ManualClock, QueryCache};
    use semlayer::config::CacheSettings;
    use serde_json::{json, Value};

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    fn manual(config: CacheConfig) -> (QueryCache<Value>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (QueryCache::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn test_key_ignores_whitespace_case_and_param_order() {
        let a = cache_key(
            "SELECT  plan,\n SUM(amount) FROM subs",
            Some(&json!({"limit": 10, "metric": "mrr"})),
        );
        let b = cache_key(
            "select plan, sum(amount) from subs",
            Some(&json!({"metric": "mrr", "limit": 10})),
        );
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_ne!(a.0, cache_key("select plan, sum(amount) from subs", None).0);
        assert_eq!(
            fingerprint("SELECT 1", Some(&json!({"b": 1, "a": 2}))),
            r#"select 1{"a":2,"b":1}"#
        );
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let (cache, _) = manual(CacheConfig::default().with_max_size(2));
        cache.set("q1", None, json!(1), None, &[]);
        cache.set("q2", None, json!(2), None, &[]);
        assert_eq!(cache.get("q1", None), Some(json!(1)));
        cache.set("q3", None, json!(3), None, &[]);

        assert!(cache.contains("q1", None));
        assert!(!cache.contains("q2", None));
        assert!(cache.contains("q3", None));
        assert_eq!(cache.metrics().evictions, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entries_expire() {
        let (cache, clock) = manual(CacheConfig::default().with_ttl(Duration::from_secs(60)));
        cache.set("q", None, json!("v"), None, &[]);
        cache.set("short", None, json!("s"), Some(Duration::from_secs(5)), &[]);

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("short", None), None);
        assert_eq!(cache.get("q", None), Some(json!("v")));

        clock.advance(Duration::from_secs(55));
        assert_eq!(cache.get("q", None), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate() {
        let (cache, _) = manual(CacheConfig::default());
        assert_eq!(cache.metrics().hit_rate(), 0.0);
        cache.set("q", None, json!(1), None, &[]);
        cache.get("q", None);
        cache.get("q", None);
        cache.get("other", None);

        let metrics = cache.metrics();
        assert_eq!((metrics.hits, metrics.misses, metrics.total_queries), (2, 1, 3));
        assert!((metrics.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(cache.stats().hit_rate_percent, 66.67);

        cache.reset_metrics();
        assert_eq!(cache.metrics().total_queries, 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_tag_invalidation() {
        let (cache, _) = manual(CacheConfig::default());
        cache.set("metric:mrr", Some(&json!({"d": []})), json!(1), None, &tags(&["metric:mrr", "table:subs"]));
        cache.set("metric:mrr", Some(&json!({"d": ["plan"]})), json!(2), None, &tags(&["metric:mrr", "table:subs"]));
        cache.set("metric:users", None, json!(3), None, &tags(&["metric:users", "table:accounts"]));

        assert_eq!(cache.tagged("table:subs"), 2);
        assert_eq!(cache.invalidate_by_tag("table:subs"), 2);
        assert_eq!(cache.invalidate_by_tag("metric:mrr"), 0);
        assert_eq!(cache.invalidate_by_tag("unknown"), 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("metric:users", None));
    }

    #[test]
    fn test_pattern_invalidation() {
        let (cache, _) = manual(CacheConfig::default());
        cache.set("metric:total_mrr", Some(&json!({"metric": "total_mrr"})), json!(1), None, &[]);
        cache.set("metric:total_arr", None, json!(2), None, &[]);
        cache.set("metric:users", None, json!(3), None, &[]);

        assert_eq!(cache.invalidate_pattern("metric:total_*"), 2);
        assert_eq!(cache.invalidate_pattern("[unclosed"), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_explicit_delete_and_clear() {
        let (cache, _) = manual(CacheConfig::default());
        let params = json!({"metric": "mrr"});
        cache.set("q", Some(&params), json!(1), None, &[]);
        cache.set("r", None, json!(2), None, &[]);
        assert!(cache.invalidate("q", Some(&params)));
        assert!(!cache.delete("q", Some(&params)));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache() {
        let cache: QueryCache<Value> = QueryCache::new(CacheConfig::default().disabled());
        assert!(!cache.set("q", None, json!(1), None, &[]));
        assert_eq!(cache.get("q", None), None);
        assert_eq!(cache.metrics().total_queries, 0);
    }

    #[test]
    fn test_config_from_settings_and_stats() {
        let settings = CacheSettings {
            max_size: 5,
            default_ttl_seconds: 120,
            ..CacheSettings::default()
        };
        let cache: QueryCache<Value> = QueryCache::new(CacheConfig::from(&settings));
        let stats = serde_json::to_value(cache.stats()).unwrap();
        assert_eq!(stats["maxSize"], 5);
        assert_eq!(stats["ttlSeconds"], 120);
        assert_eq!(stats["backendKind"], "memory");
        assert_eq!(stats["size"], 0);
    }

    #[test]
    fn test_concurrent_writers() {
        let cache: Arc<QueryCache<Value>> = Arc::new(QueryCache::new(CacheConfig::default().with_max_size(50)));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let text = format!("q{t}-{i}");
                        cache.set(&text, None, json!(i), None, &[format!("thread:{t}")]);
                        cache.get(&text, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 50);
        assert_eq!(cache.metrics().evictions, 350);
        assert_eq!(cache.metrics().total_queries, 400);
    }
}
