use crate::error::{Result, SalesInsightError};
use crate::schema::{CanonicalDataset, SalesRecord};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Query-time selection over a dataset. Empty sets mean "no restriction".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FilterSpec {
    #[schemars(description = "First day included (inclusive)")]
    pub date_from: NaiveDate,

    #[schemars(description = "Last day included (inclusive)")]
    pub date_to: NaiveDate,

    #[serde(default)]
    #[schemars(description = "Allowed customers; empty means all")]
    pub customers: BTreeSet<String>,

    #[serde(default)]
    #[schemars(description = "Allowed categories; empty means all")]
    pub categories: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Result<Self> {
        let spec = Self {
            date_from,
            date_to,
            customers: BTreeSet::new(),
            categories: BTreeSet::new(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Full date range of the dataset, no customer or category restriction.
    /// `None` when the dataset is empty.
    pub fn covering(dataset: &CanonicalDataset) -> Option<Self> {
        let (date_from, date_to) = dataset.date_range()?;
        Some(Self {
            date_from,
            date_to,
            customers: BTreeSet::new(),
            categories: BTreeSet::new(),
        })
    }

    pub fn with_customers<I, S>(mut self, customers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customers = customers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.date_from > self.date_to {
            return Err(SalesInsightError::InvalidFilter(format!(
                "date_from {} is after date_to {}",
                self.date_from, self.date_to
            )));
        }
        Ok(())
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        record.date >= self.date_from
            && record.date <= self.date_to
            && (self.customers.is_empty() || self.customers.contains(&record.customer))
            && (self.categories.is_empty() || self.categories.contains(&record.category))
    }

    /// Number of days in the inclusive range.
    pub fn span_days(&self) -> i64 {
        (self.date_to - self.date_from).num_days() + 1
    }
}

/// Borrowed subsequence of a [`CanonicalDataset`], in dataset order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    records: Vec<&'a SalesRecord>,
    spec: FilterSpec,
}

impl<'a> FilteredView<'a> {
    pub fn records(&self) -> &[&'a SalesRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a SalesRecord> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The spec this view was produced with.
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Re-applies a spec to this view's records. The result borrows the same
    /// underlying dataset.
    pub fn refine(&self, spec: &FilterSpec) -> FilteredView<'a> {
        FilteredView {
            records: self.iter().filter(|r| spec.matches(r)).collect(),
            spec: spec.clone(),
        }
    }
}

/// Selects the records matching `spec` without touching the dataset.
pub fn apply<'a>(dataset: &'a CanonicalDataset, spec: &FilterSpec) -> FilteredView<'a> {
    FilteredView {
        records: dataset
            .records()
            .iter()
            .filter(|r| spec.matches(r))
            .collect(),
        spec: spec.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn record(m: u32, d: u32, customer: &str, category: &str, amount: f64) -> SalesRecord {
        SalesRecord {
            date: date(m, d),
            customer: customer.to_string(),
            product: "P".to_string(),
            category: category.to_string(),
            quantity: 1,
            amount,
        }
    }

    fn dataset() -> CanonicalDataset {
        CanonicalDataset::from_records(vec![
            record(1, 1, "C1", "Ice", 10.0),
            record(1, 5, "C2", "Water", 20.0),
            record(1, 10, "C1", "Water", 30.0),
            record(2, 1, "C3", "Ice", 40.0),
        ])
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let data = dataset();
        let spec = FilterSpec::new(date(1, 5), date(1, 10)).unwrap();
        let view = apply(&data, &spec);
        let amounts: Vec<f64> = view.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![20.0, 30.0]);
    }

    #[test]
    fn test_customer_and_category_sets() {
        let data = dataset();
        let spec = FilterSpec::covering(&data)
            .unwrap()
            .with_customers(["C1"])
            .with_categories(["Water"]);
        let view = apply(&data, &spec);
        assert_eq!(view.len(), 1);
        assert!((view.records()[0].amount - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_covering_spec_keeps_everything() {
        let data = dataset();
        let spec = FilterSpec::covering(&data).unwrap();
        assert_eq!(spec.date_from, date(1, 1));
        assert_eq!(spec.date_to, date(2, 1));
        assert_eq!(apply(&data, &spec).len(), data.len());
        assert!(FilterSpec::covering(&CanonicalDataset::default()).is_none());
    }

    #[test]
    fn test_empty_result_is_valid() {
        let data = dataset();
        let spec = FilterSpec::new(date(6, 1), date(6, 30)).unwrap();
        let view = apply(&data, &spec);
        assert!(view.is_empty());
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let data = dataset();
        let spec = FilterSpec::new(date(1, 1), date(1, 31))
            .unwrap()
            .with_categories(["Water", "Ice"]);
        let once = apply(&data, &spec);
        let twice = once.refine(&spec);
        assert_eq!(once.records(), twice.records());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = FilterSpec::new(date(2, 1), date(1, 1)).unwrap_err();
        assert!(matches!(err, SalesInsightError::InvalidFilter(_)));
    }

    #[test]
    fn test_span_days() {
        assert_eq!(FilterSpec::new(date(1, 1), date(1, 1)).unwrap().span_days(), 1);
        assert_eq!(FilterSpec::new(date(1, 1), date(1, 31)).unwrap().span_days(), 31);
    }
}
