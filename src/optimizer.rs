//! Query complexity scoring and cache/index advice.
//!
//! Everything here works on query text with pattern matching; nothing is
//! parsed or executed. Scores are a weighted sum of the constructs found:
//!
//! | construct              | points      |
//! |------------------------|-------------|
//! | `JOIN`                 | 10 each     |
//! | subquery               | 15 each     |
//! | `GROUP BY`             | 5           |
//! | window function        | 15 each     |
//! | `UNION`                | 10 each     |
//! | `DISTINCT`             | 5           |
//! | CTE                    | 10          |
//! | `LIMIT`                | -5          |
//! | tables beyond two      | 5 each      |
//! | more than 3 `AND`/`OR` | 10          |
//!
//! The sum is clamped to `[0, 100]`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static JOIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bJOIN\b").unwrap());
static SUBQUERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\(\s*SELECT\b").unwrap());
static GROUP_BY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bGROUP\s+BY\b").unwrap());
static WINDOW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bOVER\s*\(").unwrap());
static UNION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bUNION\b").unwrap());
static DISTINCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDISTINCT\b").unwrap());
static CTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWITH\s+(?:RECURSIVE\s+)?\w+\s+AS\s*\(").unwrap());
static LIMIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").unwrap());
static CONNECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:AND|OR)\b").unwrap());
static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+((?:["`]?\w+["`]?\.)?["`]?\w+["`]?)"#).unwrap());
static WHERE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").unwrap());
static SELECT_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bSELECT\s+\*").unwrap());
static AGGREGATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:SUM|COUNT|AVG|MIN|MAX)\s*\(").unwrap());

static VOLATILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bNOW\s*\(|\bCURRENT_TIMESTAMP\b|\bCURRENT_DATE\b|\bRANDOM\s*\(|\bRAND\s*\(|\b(?:GEN_RANDOM_)?UUID\w*\s*\(|\breal-?time\b",
    )
    .unwrap()
});

static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bWHERE\b(.*?)(?:\bGROUP\s+BY\b|\bORDER\s+BY\b|\bHAVING\b|\bLIMIT\b|$)").unwrap()
});
static ON_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)\bON\b(.*?)(?:\bWHERE\b|\bGROUP\s+BY\b|\bORDER\s+BY\b|\bLIMIT\b|\b(?:INNER|LEFT|RIGHT|FULL|CROSS)\b|\bJOIN\b|$)",
    )
    .unwrap()
});
static ORDER_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bORDER\s+BY\b(.*?)(?:\bLIMIT\b|$)").unwrap());

static QUALIFIED_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["`]?(\w+)["`]?\s*\.\s*["`]?(\w+)["`]?\s*="#).unwrap());
static BARE_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|[^.\w"`])["`]?([A-Za-z_]\w*)["`]?\s*=[^=]"#).unwrap());
static QUALIFIED_ON_RHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"=\s*["`]?(\w+)["`]?\s*\.\s*["`]?(\w+)["`]?"#).unwrap());
static ORDER_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(?:["`]?(\w+)["`]?\s*\.\s*)?["`]?(\w+)["`]?(?:\s+(?:ASC|DESC))?\s*$"#).unwrap()
});

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=20 => ComplexityLevel::Low,
            21..=45 => ComplexityLevel::Medium,
            46..=70 => ComplexityLevel::High,
            _ => ComplexityLevel::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    pub score: u32,
    pub level: ComplexityLevel,
    pub factors: Vec<String>,
    pub estimated_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStrategy {
    pub should_cache: bool,
    pub ttl_seconds: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSuggestion {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub index_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub complexity: ComplexityReport,
    pub cache: CacheStrategy,
    pub indexes: Vec<IndexSuggestion>,
    pub recommendations: Vec<String>,
}

// =============================================================================
// Complexity
// =============================================================================

/// `10 * 2^(score / 10)` milliseconds, rounded to two decimals.
pub fn estimated_time_ms(score: u32) -> f64 {
    let ms = 10.0 * 2f64.powf(f64::from(score) / 10.0);
    (ms * 100.0).round() / 100.0
}

fn tables(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in TABLE.captures_iter(query) {
        let name = caps[1].replace(['"', '`'], "").to_lowercase();
        if name != "select" && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

pub fn analyze(query: &str) -> ComplexityReport {
    let mut score: i64 = 0;
    let mut factors = Vec::new();
    let mut add = |points: i64, factor: String| {
        score += points;
        factors.push(factor);
    };

    let counted: [(&Regex, i64, &str); 4] = [
        (&*JOIN, 10, "join"),
        (&*SUBQUERY, 15, "subquery"),
        (&*WINDOW, 15, "window function"),
        (&*UNION, 10, "union"),
    ];
    for (pattern, weight, label) in counted {
        let n = pattern.find_iter(query).count() as i64;
        if n > 0 {
            add(n * weight, format!("{n} {label}(s) (+{})", n * weight));
        }
    }

    let flagged: [(&Regex, i64, &str); 3] = [
        (&*GROUP_BY, 5, "GROUP BY"),
        (&*DISTINCT, 5, "DISTINCT"),
        (&*CTE, 10, "common table expression"),
    ];
    for (pattern, weight, label) in flagged {
        if pattern.is_match(query) {
            add(weight, format!("{label} (+{weight})"));
        }
    }

    let table_count = tables(query).len() as i64;
    if table_count > 2 {
        let extra = (table_count - 2) * 5;
        add(extra, format!("{table_count} tables (+{extra})"));
    }

    let connectives = CONNECTIVE.find_iter(query).count();
    if connectives > 3 {
        add(10, format!("{connectives} AND/OR conditions (+10)"));
    }

    if LIMIT.is_match(query) {
        add(-5, "LIMIT (-5)".to_string());
    }

    let score = score.clamp(0, 100) as u32;
    ComplexityReport {
        score,
        level: ComplexityLevel::from_score(score),
        factors,
        estimated_time_ms: estimated_time_ms(score),
    }
}

// =============================================================================
// Cache advice
// =============================================================================

pub fn suggest_cache_strategy(query: &str) -> CacheStrategy {
    if let Some(m) = VOLATILE.find(query) {
        return CacheStrategy {
            should_cache: false,
            ttl_seconds: 0,
            reason: format!("query depends on volatile value '{}'", m.as_str().trim()),
        };
    }

    let (mut ttl, mut reason) = if AGGREGATE.is_match(query) && !JOIN.is_match(query) {
        (3600, "pure aggregation over one table".to_string())
    } else if SELECT_STAR.is_match(query) && !WHERE.is_match(query) {
        (600, "unfiltered full scan".to_string())
    } else {
        let report = analyze(query);
        let ttl = match report.score {
            0..=20 => 1800,
            21..=45 => 1200,
            _ => 600,
        };
        (ttl, format!("complexity score {}", report.score))
    };

    if LIMIT.is_match(query) {
        ttl = (ttl / 2).max(300);
        reason.push_str(", limited result");
    }

    CacheStrategy {
        should_cache: true,
        ttl_seconds: ttl,
        reason,
    }
}

// =============================================================================
// Index advice
// =============================================================================

fn clause<'q>(pattern: &Regex, query: &'q str) -> Vec<&'q str> {
    pattern
        .captures_iter(query)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "AND" | "OR" | "NOT" | "WHERE" | "ON" | "IS" | "NULL" | "TRUE" | "FALSE"
    )
}

struct Suggestions {
    default_table: Option<String>,
    out: Vec<IndexSuggestion>,
    bare: Vec<(String, &'static str)>,
}

impl Suggestions {
    fn qualified(&mut self, table: &str, column: &str, reason: &'static str) {
        let (table, column) = (table.to_lowercase(), column.to_lowercase());
        if !self.out.iter().any(|s| s.table == table && s.column == column) {
            self.out.push(IndexSuggestion {
                table,
                column,
                index_type: "btree".into(),
                reason: reason.into(),
            });
        }
    }

    fn bare(&mut self, column: &str, reason: &'static str) {
        if !is_keyword(column) {
            self.bare.push((column.to_lowercase(), reason));
        }
    }

    /// Unqualified columns go to the FROM table unless a qualified match
    /// already covers them.
    fn finish(mut self) -> Vec<IndexSuggestion> {
        let bare = std::mem::take(&mut self.bare);
        if let Some(table) = self.default_table.clone() {
            for (column, reason) in bare {
                if !self.out.iter().any(|s| s.column == column) {
                    self.qualified(&table, &column, reason);
                }
            }
        }
        self.out
    }
}

pub fn suggest_indexes(query: &str) -> Vec<IndexSuggestion> {
    let mut suggestions = Suggestions {
        default_table: tables(query)
            .into_iter()
            .next()
            .map(|t| t.rsplit('.').next().unwrap_or_default().to_string()),
        out: Vec::new(),
        bare: Vec::new(),
    };

    for text in clause(&WHERE_CLAUSE, query) {
        for caps in QUALIFIED_EQ.captures_iter(text) {
            suggestions.qualified(&caps[1], &caps[2], "equality filter");
        }
        for caps in BARE_EQ.captures_iter(text) {
            suggestions.bare(&caps[1], "equality filter");
        }
    }

    for text in clause(&ON_CLAUSE, query) {
        for caps in QUALIFIED_EQ.captures_iter(text) {
            suggestions.qualified(&caps[1], &caps[2], "join key");
        }
        for caps in QUALIFIED_ON_RHS.captures_iter(text) {
            suggestions.qualified(&caps[1], &caps[2], "join key");
        }
    }

    for text in clause(&ORDER_CLAUSE, query) {
        for item in text.split(',') {
            let Some(caps) = ORDER_ITEM.captures(item) else {
                continue;
            };
            match caps.get(1) {
                Some(table) => suggestions.qualified(table.as_str(), &caps[2], "sort key"),
                None => suggestions.bare(&caps[2], "sort key"),
            }
        }
    }

    suggestions.finish()
}

// =============================================================================
// Combined report
// =============================================================================

pub fn optimize(query: &str) -> OptimizationReport {
    let complexity = analyze(query);
    let cache = suggest_cache_strategy(query);
    let indexes = suggest_indexes(query);

    let mut recommendations = Vec::new();
    if matches!(complexity.level, ComplexityLevel::High | ComplexityLevel::VeryHigh) {
        recommendations
            .push("Consider pre-aggregating or materializing this query; it scores as expensive".to_string());
    }
    if SELECT_STAR.is_match(query) {
        recommendations.push("Select only the columns you need instead of SELECT *".to_string());
    }
    if SUBQUERY.is_match(query) {
        recommendations.push("Rewrite subqueries as joins or CTEs where possible".to_string());
    }
    if !indexes.is_empty() {
        let columns: Vec<String> = indexes.iter().map(|i| format!("{}.{}", i.table, i.column)).collect();
        recommendations.push(format!("Add indexes on {}", columns.join(", ")));
    }
    if cache.should_cache {
        recommendations.push(format!("Cache results for {} seconds", cache.ttl_seconds));
    } else {
        recommendations.push(format!("Do not cache: {}", cache.reason));
    }

    tracing::debug!(score = complexity.score, indexes = indexes.len(), "analyzed query");
    OptimizationReport {
        complexity,
        cache,
        indexes,
        recommendations,
    }
}
