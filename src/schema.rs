use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Category assigned when a row carries no category and no keyword rule matches.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The typed columns every downstream stage depends on.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    #[schemars(description = "Calendar date of the sale (no time component)")]
    Date,

    #[schemars(description = "Customer identifier or name")]
    Customer,

    #[schemars(description = "Product identifier or name")]
    Product,

    #[schemars(description = "Product category. Optional: defaults to 'Uncategorized'")]
    Category,

    #[schemars(description = "Units sold, whole number >= 0")]
    Quantity,

    #[schemars(description = "Monetary amount of the line, >= 0, in a single currency")]
    Amount,

    #[schemars(
        description = "Export line type. Optional: lines whose type contains 'total' are subtotal rows"
    )]
    RecordType,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::Date,
        CanonicalField::Customer,
        CanonicalField::Product,
        CanonicalField::Category,
        CanonicalField::Quantity,
        CanonicalField::Amount,
        CanonicalField::RecordType,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::Customer => "customer",
            CanonicalField::Product => "product",
            CanonicalField::Category => "category",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Amount => "amount",
            CanonicalField::RecordType => "type",
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, CanonicalField::Category | CanonicalField::RecordType)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub customer: String,
    pub product: String,
    pub category: String,
    pub quantity: u64,
    pub amount: f64,
}

/// Diagnostics gathered while building a [`CanonicalDataset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IngestionStats {
    /// Name of the text encoding the input was decoded with.
    pub encoding: String,
    /// Raw header → canonical field, for every header that was recognised.
    pub column_mapping: BTreeMap<String, CanonicalField>,
    /// Data rows seen by the normalizer (blank lines excluded).
    pub total_rows: usize,
    pub accepted_rows: usize,
    pub rejected_rows: usize,
    /// Export subtotal lines that were skipped without counting as rejections.
    pub summary_rows: usize,
    /// Lines the delimited reader could not parse at all.
    pub malformed_lines: usize,
}

/// Immutable, ordered collection of normalized sales records.
///
/// Built once per ingestion. Every filter or aggregate borrows from it, so a
/// single instance can be shared read-only between concurrent queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalDataset {
    records: Vec<SalesRecord>,
    stats: IngestionStats,
}

impl CanonicalDataset {
    pub(crate) fn new(records: Vec<SalesRecord>, stats: IngestionStats) -> Self {
        Self { records, stats }
    }

    /// Wraps already-typed records, e.g. from another system or a test fixture.
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        let stats = IngestionStats {
            total_rows: records.len(),
            accepted_rows: records.len(),
            ..IngestionStats::default()
        };
        Self { records, stats }
    }

    pub(crate) fn with_encoding(mut self, encoding: &str) -> Self {
        self.stats.encoding = encoding.to_string();
        self
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rejected_count(&self) -> usize {
        self.stats.rejected_rows
    }

    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }

    /// Returns `None` for an empty dataset.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// The option lists a presentation layer needs to offer filters.
    pub fn summary(&self) -> DatasetSummary {
        let customers: BTreeSet<&str> = self.records.iter().map(|r| r.customer.as_str()).collect();
        let categories: BTreeSet<&str> =
            self.records.iter().map(|r| r.category.as_str()).collect();
        let range = self.date_range();

        DatasetSummary {
            first_date: range.map(|(min, _)| min),
            last_date: range.map(|(_, max)| max),
            record_count: self.records.len(),
            rejected_rows: self.stats.rejected_rows,
            customers: customers.into_iter().map(str::to_string).collect(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSummary {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub record_count: usize,
    pub rejected_rows: usize,
    /// Distinct customers, sorted ascending.
    pub customers: Vec<String>,
    /// Distinct categories, sorted ascending.
    pub categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(day: u32, customer: &str, category: &str) -> SalesRecord {
        SalesRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            customer: customer.to_string(),
            product: "P1".to_string(),
            category: category.to_string(),
            quantity: 1,
            amount: 10.0,
        }
    }

    #[test]
    fn test_summary_lists_sorted_distinct_values() {
        let dataset = CanonicalDataset::from_records(vec![
            record(5, "ZETA", "Ice"),
            record(2, "ALPHA", "Water"),
            record(9, "ZETA", "Water"),
        ]);

        let summary = dataset.summary();
        assert_eq!(summary.customers, vec!["ALPHA", "ZETA"]);
        assert_eq!(summary.categories, vec!["Ice", "Water"]);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(summary.last_date, NaiveDate::from_ymd_opt(2025, 1, 9));
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_empty_dataset_has_no_range() {
        let dataset = CanonicalDataset::default();
        assert!(dataset.is_empty());
        assert_eq!(dataset.date_range(), None);
        assert_eq!(dataset.summary().first_date, None);
    }

    #[test]
    fn test_field_requirements() {
        let required: Vec<_> = CanonicalField::ALL
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name())
            .collect();
        assert_eq!(
            required,
            vec!["date", "customer", "product", "quantity", "amount"]
        );
    }

    #[test]
    fn test_canonical_field_serializes_snake_case() {
        let json = serde_json::to_string(&CanonicalField::RecordType).unwrap();
        assert_eq!(json, "\"record_type\"");
    }
}
