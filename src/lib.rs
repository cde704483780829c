//! # Sales Insight
//!
//! A library for turning raw sales exports (CSV-like files with inconsistent
//! headers, encodings and number formats) into a typed dataset, and for
//! answering filtered queries over it with KPIs, rankings, distributions and
//! plain-language insights.
//!
//! ## Core Concepts
//!
//! - **Ingestion**: bytes are decoded with the first encoding that fits, split
//!   into rows, and their headers matched against a synonym table
//! - **Canonical Dataset**: immutable typed records, built once per file and
//!   shared read-only by every query
//! - **Filter**: an inclusive date range plus optional customer and category
//!   sets, producing a borrowed view
//! - **Aggregates**: totals, averages, top-N rankings, daily and weekday series
//! - **Insights**: deterministic rules over the aggregates, never over raw rows
//!
//! ## Example
//!
//! ```rust,no_run
//! use sales_insight::*;
//!
//! # fn main() -> sales_insight::Result<()> {
//! let dataset = load("ventas.csv")?;
//! if let Some(spec) = FilterSpec::covering(&dataset) {
//!     let output = query(&dataset, &spec, 10)?;
//!     println!("Total: {}", format_amount(output.aggregates.kpis.total_amount));
//!     for insight in &output.insights {
//!         println!("- {}", insight.text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod insights;
pub mod normalizer;
pub mod schema;
pub mod utils;

pub use aggregation::{
    AggregateResult, Aggregator, CategoryShare, CustomerProfile, DailyTotal, DayOfWeek,
    HeatmapCell, Kpis, Period, RankedEntity, RankingMetric, ValueBand, WeekdayTotal,
};
pub use cache::DatasetCache;
pub use config::{CategoryRule, PipelineConfig};
pub use encoding::{resolve, resolve_named, ResolvedText, TextEncoding};
pub use error::{FieldError, Result, SalesInsightError};
pub use filter::{FilterSpec, FilteredView};
pub use ingestion::{RawRow, RawTable, RecordIngestor};
pub use insights::{
    analyze_trend, Insight, InsightCategory, InsightGenerator, TrendDirection, TrendSummary,
};
pub use normalizer::{derive_category, ColumnMapping, SchemaNormalizer};
pub use schema::*;
pub use utils::*;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a presentation layer needs to render one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryOutput {
    pub aggregates: AggregateResult,
    pub insights: Vec<Insight>,
}

impl QueryOutput {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads and queries sales data under one validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct SalesPipeline {
    config: PipelineConfig,
}

impl SalesPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<CanonicalDataset> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes, &path.display().to_string())
    }

    /// Decodes, parses and normalizes an in-memory export. `source_name`
    /// only appears in logs and errors.
    pub fn load_bytes(&self, bytes: &[u8], source_name: &str) -> Result<CanonicalDataset> {
        let resolved = encoding::resolve_named(bytes, source_name)?;
        info!(
            "Loading {} ({} bytes, {})",
            source_name,
            bytes.len(),
            resolved.encoding.label()
        );

        let table = RecordIngestor::from_config(&self.config).parse(&resolved.text);
        debug!(
            "Parsed {} data rows under {} headers",
            table.rows.len(),
            table.headers.len()
        );

        let dataset = SchemaNormalizer::new(&self.config)
            .normalize(&table)?
            .with_encoding(resolved.encoding.label());

        if let Some((first, last)) = dataset.date_range() {
            info!(
                "Loaded {} records from {} to {}",
                dataset.len(),
                first,
                last
            );
        } else {
            info!("Loaded an empty dataset from {}", source_name);
        }

        Ok(dataset)
    }

    /// Filters, aggregates and derives insights. Does not modify `dataset`.
    pub fn query(
        &self,
        dataset: &CanonicalDataset,
        spec: &FilterSpec,
        top_n: usize,
    ) -> Result<QueryOutput> {
        spec.validate()?;
        if top_n == 0 {
            return Err(SalesInsightError::InvalidQuery(
                "top_n must be at least 1".to_string(),
            ));
        }

        let view = filter::apply(dataset, spec);
        debug!(
            "Query {}..{} selected {} of {} records",
            spec.date_from,
            spec.date_to,
            view.len(),
            dataset.len()
        );

        let aggregates = Aggregator::new(top_n).compute(&view);
        let insights = InsightGenerator::from_config(&self.config).generate(&aggregates);

        Ok(QueryOutput {
            aggregates,
            insights,
        })
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<CanonicalDataset> {
    SalesPipeline::default().load(path)
}

pub fn load_with_config(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<CanonicalDataset> {
    SalesPipeline::new(config.clone())?.load(path)
}

/// Queries with the default [`PipelineConfig`]. A dataset loaded with a
/// custom config (e.g. a different `trend_tolerance`) should be queried
/// through [`SalesPipeline::query`] on the same pipeline instead.
pub fn query(dataset: &CanonicalDataset, spec: &FilterSpec, top_n: usize) -> Result<QueryOutput> {
    SalesPipeline::default().query(dataset, spec, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    const EXPORT: &str = "Fecha,Cliente,Producto,Cantidad,Monto\n\
                          2025-01-01,acme,Hielo 5lb,2,100\n\
                          2025-01-02,beta,Agua 1L,1,50\n";

    #[test]
    fn test_load_bytes_records_encoding_and_mapping() {
        let pipeline = SalesPipeline::default();
        let dataset = pipeline.load_bytes(EXPORT.as_bytes(), "test").unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.stats().encoding, "utf-8");
        assert_eq!(
            dataset.stats().column_mapping.get("Monto"),
            Some(&CanonicalField::Amount)
        );
        assert_eq!(dataset.records()[0].customer, "ACME");
    }

    #[test]
    fn test_query_two_records() {
        let pipeline = SalesPipeline::default();
        let dataset = pipeline.load_bytes(EXPORT.as_bytes(), "test").unwrap();
        let spec = FilterSpec::new(date(1), date(2)).unwrap();

        let output = pipeline.query(&dataset, &spec, 5).unwrap();
        let kpis = &output.aggregates.kpis;
        assert!((kpis.total_amount - 150.0).abs() < 1e-9);
        assert_eq!(kpis.transaction_count, 2);
        assert!((kpis.average_ticket - 75.0).abs() < 1e-9);
        assert_eq!(kpis.unique_customers, 2);
        assert_eq!(kpis.unique_products, 2);
        assert!(!output.insights.is_empty());
    }

    #[test]
    fn test_query_rejects_zero_top_n() {
        let dataset = CanonicalDataset::default();
        let spec = FilterSpec::new(date(1), date(2)).unwrap();
        let err = query(&dataset, &spec, 0).unwrap_err();
        assert!(matches!(err, SalesInsightError::InvalidQuery(_)));
    }

    #[test]
    fn test_query_rejects_inverted_spec() {
        let dataset = CanonicalDataset::default();
        let spec = FilterSpec {
            date_from: date(5),
            date_to: date(1),
            customers: Default::default(),
            categories: Default::default(),
        };
        let err = query(&dataset, &spec, 3).unwrap_err();
        assert!(matches!(err, SalesInsightError::InvalidFilter(_)));
    }

    #[test]
    fn test_free_query_uses_default_trend_tolerance() {
        let csv = "date,customer,product,quantity,amount\n\
                   2025-01-01,C1,P1,1,100\n\
                   2025-01-04,C1,P1,1,103\n";
        let strict = SalesPipeline::new(PipelineConfig {
            trend_tolerance: 0.01,
            ..PipelineConfig::default()
        })
        .unwrap();
        let dataset = strict.load_bytes(csv.as_bytes(), "test").unwrap();
        let spec = FilterSpec::new(date(1), date(4)).unwrap();

        let trend_text = |output: &QueryOutput| {
            output
                .insights
                .iter()
                .find(|i| i.category == InsightCategory::Trend)
                .map(|i| i.text.clone())
                .unwrap()
        };

        let default_output = query(&dataset, &spec, 3).unwrap();
        assert!(trend_text(&default_output).contains("flat"));

        let strict_output = strict.query(&dataset, &spec, 3).unwrap();
        assert!(trend_text(&strict_output).contains("up 3.0%"));
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let config = PipelineConfig {
            trend_tolerance: -0.1,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            SalesPipeline::new(config),
            Err(SalesInsightError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_output_serializes_to_json() {
        let pipeline = SalesPipeline::default();
        let dataset = pipeline.load_bytes(EXPORT.as_bytes(), "test").unwrap();
        let spec = FilterSpec::covering(&dataset).unwrap();
        let json = pipeline.query(&dataset, &spec, 3).unwrap().to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["aggregates"]["kpis"]["transaction_count"], 2);
        assert_eq!(value["insights"][0]["category"], "best-day");
    }
}
