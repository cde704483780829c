use crate::filter::FilteredView;
use crate::schema::SalesRecord;
use chrono::{Datelike, NaiveDate, Weekday};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn name(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    Revenue,
    Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Kpis {
    pub total_amount: f64,
    pub transaction_count: usize,
    /// `total_amount / transaction_count`, 0 for an empty view.
    pub average_ticket: f64,
    pub unique_customers: usize,
    pub unique_products: usize,
    pub days_with_sales: usize,
    pub total_quantity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Period {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub amount: f64,
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeekdayTotal {
    pub weekday: DayOfWeek,
    pub amount: f64,
    pub transactions: usize,
}

/// A product or customer with its totals inside the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedEntity {
    pub name: String,
    pub revenue: f64,
    pub quantity: u64,
    pub transactions: usize,
}

impl RankedEntity {
    pub fn average_price(&self) -> f64 {
        if self.transactions == 0 {
            0.0
        } else {
            self.revenue / self.transactions as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    pub transactions: usize,
    pub quantity: u64,
    pub unique_customers: usize,
    /// Fraction of the view's total amount, 0 when the total is 0.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerProfile {
    pub customer: String,
    pub total_amount: f64,
    pub average_ticket: f64,
    pub transactions: usize,
    pub quantity: u64,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValueBand {
    pub label: String,
    /// Exclusive lower bound (the first band also holds customers at exactly 0).
    pub lower: f64,
    /// Inclusive upper bound, `None` for the open-ended band.
    pub upper: Option<f64>,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeatmapCell {
    pub weekday: DayOfWeek,
    pub day_of_month: u32,
    pub amount: f64,
}

/// Everything the presentation layer renders for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregateResult {
    pub period: Period,
    pub kpis: Kpis,
    /// Ascending by date, only days with sales.
    pub daily_totals: Vec<DailyTotal>,
    /// Monday first, only weekdays with sales.
    pub weekday_totals: Vec<WeekdayTotal>,
    pub top_products_by_revenue: Vec<RankedEntity>,
    pub top_products_by_quantity: Vec<RankedEntity>,
    pub top_customers_by_revenue: Vec<RankedEntity>,
    pub top_customers_by_quantity: Vec<RankedEntity>,
    /// Descending by amount.
    pub category_distribution: Vec<CategoryShare>,
    /// Descending by total amount.
    pub customer_profiles: Vec<CustomerProfile>,
    pub customer_value_bands: Vec<ValueBand>,
    pub weekday_heatmap: Vec<HeatmapCell>,
}

impl AggregateResult {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AggregateResult)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

const VALUE_BANDS: [(&str, f64, Option<f64>); 5] = [
    ("0-100", 0.0, Some(100.0)),
    ("100-500", 100.0, Some(500.0)),
    ("500-1K", 500.0, Some(1_000.0)),
    ("1K-2K", 1_000.0, Some(2_000.0)),
    ("2K+", 2_000.0, None),
];

#[derive(Default)]
struct EntityTotals {
    revenue: f64,
    quantity: u64,
    transactions: usize,
}

impl EntityTotals {
    fn add(&mut self, record: &SalesRecord) {
        self.revenue += record.amount;
        self.quantity = self.quantity.saturating_add(record.quantity);
        self.transactions += 1;
    }
}

pub struct Aggregator {
    top_n: usize,
}

impl Aggregator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn compute(&self, view: &FilteredView<'_>) -> AggregateResult {
        let spec = view.spec();

        AggregateResult {
            period: Period {
                date_from: spec.date_from,
                date_to: spec.date_to,
            },
            kpis: compute_kpis(view),
            daily_totals: daily_totals(view),
            weekday_totals: weekday_totals(view),
            top_products_by_revenue: rank_entities(
                view,
                |r| &r.product,
                RankingMetric::Revenue,
                self.top_n,
            ),
            top_products_by_quantity: rank_entities(
                view,
                |r| &r.product,
                RankingMetric::Quantity,
                self.top_n,
            ),
            top_customers_by_revenue: rank_entities(
                view,
                |r| &r.customer,
                RankingMetric::Revenue,
                self.top_n,
            ),
            top_customers_by_quantity: rank_entities(
                view,
                |r| &r.customer,
                RankingMetric::Quantity,
                self.top_n,
            ),
            category_distribution: category_distribution(view),
            customer_profiles: customer_profiles(view),
            customer_value_bands: customer_value_bands(view),
            weekday_heatmap: weekday_heatmap(view),
        }
    }
}

pub fn compute(view: &FilteredView<'_>, top_n: usize) -> AggregateResult {
    Aggregator::new(top_n).compute(view)
}

pub fn compute_kpis(view: &FilteredView<'_>) -> Kpis {
    let total_amount: f64 = view.iter().map(|r| r.amount).sum();
    let transaction_count = view.len();
    let average_ticket = if transaction_count == 0 {
        0.0
    } else {
        total_amount / transaction_count as f64
    };

    let customers: BTreeSet<&str> = view.iter().map(|r| r.customer.as_str()).collect();
    let products: BTreeSet<&str> = view.iter().map(|r| r.product.as_str()).collect();
    let days: BTreeSet<NaiveDate> = view.iter().map(|r| r.date).collect();

    Kpis {
        total_amount,
        transaction_count,
        average_ticket,
        unique_customers: customers.len(),
        unique_products: products.len(),
        days_with_sales: days.len(),
        total_quantity: view
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.quantity)),
    }
}

pub fn daily_totals(view: &FilteredView<'_>) -> Vec<DailyTotal> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in view.iter() {
        let entry = days.entry(record.date).or_default();
        entry.0 += record.amount;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(date, (amount, transactions))| DailyTotal {
            date,
            amount,
            transactions,
        })
        .collect()
}

/// Buckets by calendar day-of-week, so every Monday in the range lands in
/// the same bucket.
pub fn weekday_totals(view: &FilteredView<'_>) -> Vec<WeekdayTotal> {
    let mut weekdays: BTreeMap<DayOfWeek, (f64, usize)> = BTreeMap::new();
    for record in view.iter() {
        let entry = weekdays.entry(record.date.weekday().into()).or_default();
        entry.0 += record.amount;
        entry.1 += 1;
    }

    weekdays
        .into_iter()
        .map(|(weekday, (amount, transactions))| WeekdayTotal {
            weekday,
            amount,
            transactions,
        })
        .collect()
}

/// Groups by `key`, sorts descending by `metric` with ties broken by name
/// ascending, and keeps at most `top_n` entities.
pub fn rank_entities<F>(
    view: &FilteredView<'_>,
    key: F,
    metric: RankingMetric,
    top_n: usize,
) -> Vec<RankedEntity>
where
    F: for<'r> Fn(&'r SalesRecord) -> &'r String,
{
    let mut totals: BTreeMap<&str, EntityTotals> = BTreeMap::new();
    for record in view.iter() {
        totals.entry(key(record).as_str()).or_default().add(record);
    }

    let mut ranked: Vec<RankedEntity> = totals
        .into_iter()
        .map(|(name, t)| RankedEntity {
            name: name.to_string(),
            revenue: t.revenue,
            quantity: t.quantity,
            transactions: t.transactions,
        })
        .collect();

    ranked.sort_by(|a, b| {
        let by_metric = match metric {
            RankingMetric::Revenue => b.revenue.total_cmp(&a.revenue),
            RankingMetric::Quantity => b.quantity.cmp(&a.quantity),
        };
        by_metric.then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(top_n);
    ranked
}

pub fn category_distribution(view: &FilteredView<'_>) -> Vec<CategoryShare> {
    let mut categories: BTreeMap<&str, (EntityTotals, BTreeSet<&str>)> = BTreeMap::new();
    for record in view.iter() {
        let (totals, customers) = categories.entry(record.category.as_str()).or_default();
        totals.add(record);
        customers.insert(record.customer.as_str());
    }

    let grand_total: f64 = view.iter().map(|r| r.amount).sum();
    let mut shares: Vec<CategoryShare> = categories
        .into_iter()
        .map(|(category, (totals, customers))| CategoryShare {
            category: category.to_string(),
            amount: totals.revenue,
            transactions: totals.transactions,
            quantity: totals.quantity,
            unique_customers: customers.len(),
            share: if grand_total > 0.0 {
                totals.revenue / grand_total
            } else {
                0.0
            },
        })
        .collect();

    shares.sort_by(|a, b| descending_then_name(a.amount, b.amount, &a.category, &b.category));
    shares
}

pub fn customer_profiles(view: &FilteredView<'_>) -> Vec<CustomerProfile> {
    let mut customers: BTreeMap<&str, (EntityTotals, NaiveDate, NaiveDate)> = BTreeMap::new();
    for record in view.iter() {
        let (totals, first, last) = customers
            .entry(record.customer.as_str())
            .or_insert_with(|| (EntityTotals::default(), record.date, record.date));
        totals.add(record);
        *first = (*first).min(record.date);
        *last = (*last).max(record.date);
    }

    let mut profiles: Vec<CustomerProfile> = customers
        .into_iter()
        .map(|(customer, (totals, first, last))| CustomerProfile {
            customer: customer.to_string(),
            total_amount: totals.revenue,
            average_ticket: totals.revenue / totals.transactions as f64,
            transactions: totals.transactions,
            quantity: totals.quantity,
            first_purchase: first,
            last_purchase: last,
        })
        .collect();

    profiles.sort_by(|a, b| {
        descending_then_name(a.total_amount, b.total_amount, &a.customer, &b.customer)
    });
    profiles
}

pub fn customer_value_bands(view: &FilteredView<'_>) -> Vec<ValueBand> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in view.iter() {
        *totals.entry(record.customer.as_str()).or_default() += record.amount;
    }

    VALUE_BANDS
        .iter()
        .enumerate()
        .map(|(idx, (label, lower, upper))| {
            let customers = totals
                .values()
                .filter(|&&total| {
                    let above = total > *lower || (idx == 0 && total >= *lower);
                    above && upper.map_or(true, |upper| total <= upper)
                })
                .count();
            ValueBand {
                label: label.to_string(),
                lower: *lower,
                upper: *upper,
                customers,
            }
        })
        .collect()
}

/// Amount per (weekday, day of month) pair that has sales.
pub fn weekday_heatmap(view: &FilteredView<'_>) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(DayOfWeek, u32), f64> = BTreeMap::new();
    for record in view.iter() {
        *cells
            .entry((record.date.weekday().into(), record.date.day()))
            .or_default() += record.amount;
    }

    cells
        .into_iter()
        .map(|((weekday, day_of_month), amount)| HeatmapCell {
            weekday,
            day_of_month,
            amount,
        })
        .collect()
}

fn descending_then_name(a: f64, b: f64, a_name: &str, b_name: &str) -> Ordering {
    b.total_cmp(&a).then_with(|| a_name.cmp(b_name))
}
