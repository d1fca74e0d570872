//! # semlayer
//!
//! A semantic layer: business-facing metric and dimension names compiled to
//! aggregate SQL, with a result cache and a query advisor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Model document (metrics, dimensions, conn)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [model::loader]
//! ┌─────────────────────────────────────────────────────────┐
//! │                   MetricRegistry                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]  filter, temporal, expression
//! ┌─────────────────────────────────────────────────────────┐
//! │     CompiledQueryPlan  →  SQL (per dialect)  →  engine   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [service]
//! ┌─────────────────────────────────────────────────────────┐
//! │       QueryCache  ·  QueryResponse  ·  optimizer         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Derived metric formulas and filter predicates are configuration text.
//! They only ever pass through [`expression`] and [`filter`], two closed
//! grammars that reject anything they do not recognize.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod filter;
pub mod model;
pub mod optimizer;
pub mod planner;
pub mod service;
pub mod sql;
pub mod temporal;

pub use cache::{CacheConfig, CacheStats, QueryCache};
pub use config::{ConnectionDescriptor, ConnectionKind, Settings};
pub use engine::{ResultSet, SqliteEngine, TabularEngine};
pub use error::{SemanticLayerError, SemanticResult};
pub use expression::{evaluate, SafeExpression, SafeExpressionError};
pub use model::{DimensionDefinition, MetricDefinition, MetricRegistry, Model};
pub use planner::{CompiledQuery, CompiledQueryPlan, QueryCompiler, QueryRequest};
pub use service::{QueryResponse, SemanticLayer};
pub use sql::Dialect;
