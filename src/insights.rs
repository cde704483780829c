//! Rule-based insights over an [`AggregateResult`].
//!
//! Each rule is an independent pure function. A rule whose supporting
//! aggregates are empty produces nothing; it never emits a placeholder.

use crate::aggregation::{AggregateResult, DailyTotal, DayOfWeek, WeekdayTotal};
use crate::config::PipelineConfig;
use crate::utils::{format_amount, relative_change};
use chrono::{Datelike, Days, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum InsightCategory {
    BestDay,
    TopProduct,
    TopCustomer,
    Trend,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Insight {
    pub category: InsightCategory,
    pub text: String,
    /// 1-based position among insights of the same category.
    pub rank: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    /// First day of the second half.
    pub split_date: NaiveDate,
    pub first_half_total: f64,
    pub second_half_total: f64,
    /// Relative change, `None` when the first half had no sales.
    pub change: Option<f64>,
}

/// Splits the period at its midpoint and compares the two halves. The first
/// half gets the extra day of an odd-length period. `None` with fewer than
/// two distinct days of sales.
pub fn analyze_trend(result: &AggregateResult, tolerance: f64) -> Option<TrendSummary> {
    if result.daily_totals.len() < 2 {
        return None;
    }

    let span = (result.period.date_to - result.period.date_from).num_days() + 1;
    let first_half_days = ((span + 1) / 2) as u64;
    let split_date = result
        .period
        .date_from
        .checked_add_days(Days::new(first_half_days))?;

    let (first, second): (Vec<&DailyTotal>, Vec<&DailyTotal>) = result
        .daily_totals
        .iter()
        .partition(|d| d.date < split_date);
    let first_half_total: f64 = first.iter().map(|d| d.amount).sum();
    let second_half_total: f64 = second.iter().map(|d| d.amount).sum();

    let change = relative_change(first_half_total, second_half_total);
    let direction = match change {
        Some(c) if c.abs() <= tolerance => TrendDirection::Flat,
        Some(c) if c > 0.0 => TrendDirection::Up,
        Some(_) => TrendDirection::Down,
        None if second_half_total > 0.0 => TrendDirection::Up,
        None => TrendDirection::Flat,
    };

    Some(TrendSummary {
        direction,
        split_date,
        first_half_total,
        second_half_total,
        change,
    })
}

pub struct InsightGenerator {
    trend_tolerance: f64,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self {
            trend_tolerance: 0.05,
        }
    }
}

impl InsightGenerator {
    pub fn new(trend_tolerance: f64) -> Self {
        Self { trend_tolerance }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.trend_tolerance)
    }

    /// Insights in fixed category order: best day, top product, top
    /// customer, trend, recommendations.
    pub fn generate(&self, result: &AggregateResult) -> Vec<Insight> {
        let trend = analyze_trend(result, self.trend_tolerance);

        let mut insights = Vec::new();
        insights.extend(best_day_insights(result));
        insights.extend(top_product_insights(result));
        insights.extend(top_customer_insights(result));
        insights.extend(trend_insights(trend.as_ref()));
        insights.extend(recommendation_insights(result, trend.as_ref()));

        debug!("Generated {} insights", insights.len());
        insights
    }
}

pub fn generate(result: &AggregateResult) -> Vec<Insight> {
    InsightGenerator::default().generate(result)
}

fn ranked(category: InsightCategory, texts: Vec<String>) -> Vec<Insight> {
    texts
        .into_iter()
        .zip(1u32..)
        .map(|(text, rank)| Insight {
            category,
            text,
            rank,
        })
        .collect()
}

/// Highest total wins; on ties the earliest entry is kept.
fn strongest<T>(items: &[T], amount: impl Fn(&T) -> f64) -> Option<&T> {
    items
        .iter()
        .reduce(|best, item| if amount(item) > amount(best) { item } else { best })
}

fn weakest<T>(items: &[T], amount: impl Fn(&T) -> f64) -> Option<&T> {
    items
        .iter()
        .reduce(|worst, item| if amount(item) < amount(worst) { item } else { worst })
}

pub fn best_day_insights(result: &AggregateResult) -> Vec<Insight> {
    let Some(best) = strongest(&result.daily_totals, |d| d.amount) else {
        return Vec::new();
    };

    let mut texts = vec![format!(
        "Best sales day: {} ({}) with {} across {} transactions.",
        best.date.format("%Y-%m-%d"),
        DayOfWeek::from(best.date.weekday()).name(),
        format_amount(best.amount),
        best.transactions
    )];

    if let Some(weekday) = strongest(&result.weekday_totals, |w| w.amount) {
        texts.push(format!(
            "Strongest weekday: {} with {} in total sales.",
            weekday.weekday.name(),
            format_amount(weekday.amount)
        ));
    }

    ranked(InsightCategory::BestDay, texts)
}

pub fn top_product_insights(result: &AggregateResult) -> Vec<Insight> {
    result
        .top_products_by_revenue
        .first()
        .map(|product| {
            ranked(
                InsightCategory::TopProduct,
                vec![format!(
                    "Top product by revenue: {} with {} ({} units sold).",
                    product.name,
                    format_amount(product.revenue),
                    product.quantity
                )],
            )
        })
        .unwrap_or_default()
}

pub fn top_customer_insights(result: &AggregateResult) -> Vec<Insight> {
    result
        .top_customers_by_revenue
        .first()
        .map(|customer| {
            ranked(
                InsightCategory::TopCustomer,
                vec![format!(
                    "Top customer by revenue: {} with {} over {} transactions.",
                    customer.name,
                    format_amount(customer.revenue),
                    customer.transactions
                )],
            )
        })
        .unwrap_or_default()
}

pub fn trend_insights(trend: Option<&TrendSummary>) -> Vec<Insight> {
    let Some(trend) = trend else {
        return Vec::new();
    };

    let totals = format!(
        "{} vs {}",
        format_amount(trend.second_half_total),
        format_amount(trend.first_half_total)
    );
    let text = match (trend.direction, trend.change) {
        (TrendDirection::Up, Some(change)) => format!(
            "Sales are up {:.1}% in the second half of the period ({}).",
            change * 100.0,
            totals
        ),
        (TrendDirection::Up, None) => format!(
            "Sales picked up in the second half of the period ({}).",
            totals
        ),
        (TrendDirection::Down, change) => format!(
            "Sales are down {:.1}% in the second half of the period ({}).",
            change.unwrap_or(-1.0).abs() * 100.0,
            totals
        ),
        (TrendDirection::Flat, _) => format!(
            "Sales are flat between the two halves of the period ({}).",
            totals
        ),
    };

    ranked(InsightCategory::Trend, vec![text])
}

pub fn recommendation_insights(
    result: &AggregateResult,
    trend: Option<&TrendSummary>,
) -> Vec<Insight> {
    let mut texts = Vec::new();

    if let Some(category) = result.category_distribution.first() {
        texts.push(format!(
            "Focus on the {} category: it brings {:.1}% of revenue.",
            category.category,
            category.share * 100.0
        ));
    }

    if result.weekday_totals.len() >= 2 {
        if let Some(weekday) = weakest(&result.weekday_totals, |w: &WeekdayTotal| w.amount) {
            texts.push(format!(
                "Run promotions on {}, the weakest weekday with {} in sales.",
                weekday.weekday.name(),
                format_amount(weekday.amount)
            ));
        }
    }

    if let Some(customer) = result.top_customers_by_revenue.first() {
        texts.push(format!(
            "Reward {} with a loyalty offer to protect the top account.",
            customer.name
        ));
    }

    if let Some(trend) = trend.filter(|t| t.direction == TrendDirection::Down) {
        texts.push(format!(
            "Sales fell {:.1}% in the second half of the period; review prices and stock of the best sellers.",
            trend.change.unwrap_or(-1.0).abs() * 100.0
        ));
    }

    ranked(InsightCategory::Recommendation, texts)
}
