use crate::config::{CategoryRule, PipelineConfig};
use crate::error::{FieldError, Result, SalesInsightError};
use crate::ingestion::{RawRow, RawTable};
use crate::schema::{CanonicalDataset, CanonicalField, IngestionStats, SalesRecord, UNCATEGORIZED};
use crate::utils::{fold_key, parse_amount, parse_flexible_date, parse_quantity};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Built-in header synonyms, already in [`fold_key`] form.
const SYNONYMS: &[(&str, CanonicalField)] = &[
    ("date", CanonicalField::Date),
    ("fecha", CanonicalField::Date),
    ("fecha venta", CanonicalField::Date),
    ("fecha de venta", CanonicalField::Date),
    ("sale date", CanonicalField::Date),
    ("dia", CanonicalField::Date),
    ("customer", CanonicalField::Customer),
    ("customer name", CanonicalField::Customer),
    ("cliente", CanonicalField::Customer),
    ("nombre cliente", CanonicalField::Customer),
    ("client", CanonicalField::Customer),
    ("name", CanonicalField::Customer),
    ("nombre", CanonicalField::Customer),
    ("product", CanonicalField::Product),
    ("product name", CanonicalField::Product),
    ("producto", CanonicalField::Product),
    ("item", CanonicalField::Product),
    ("articulo", CanonicalField::Product),
    ("category", CanonicalField::Category),
    ("categoria", CanonicalField::Category),
    ("quantity", CanonicalField::Quantity),
    ("cantidad", CanonicalField::Quantity),
    ("qty", CanonicalField::Quantity),
    ("cant", CanonicalField::Quantity),
    ("unidades", CanonicalField::Quantity),
    ("units", CanonicalField::Quantity),
    ("amount", CanonicalField::Amount),
    ("monto", CanonicalField::Amount),
    ("venta", CanonicalField::Amount),
    ("ventas", CanonicalField::Amount),
    ("importe", CanonicalField::Amount),
    ("sales", CanonicalField::Amount),
    ("type", CanonicalField::RecordType),
    ("tipo", CanonicalField::RecordType),
];

enum RowOutcome {
    Accepted(SalesRecord),
    Summary,
    Rejected(FieldError),
}

/// Canonical field → raw header, resolved once per ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    columns: BTreeMap<CanonicalField, String>,
}

impl ColumnMapping {
    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    fn value<'r>(&self, row: &'r RawRow, field: CanonicalField) -> &'r str {
        self.columns
            .get(&field)
            .map(|header| row.get(header).trim())
            .unwrap_or("")
    }
}

pub struct SchemaNormalizer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Matches raw headers against the synonym table. The first header that
    /// maps to a field claims it.
    pub fn resolve_columns(&self, headers: &[String]) -> Result<ColumnMapping> {
        let extra: BTreeMap<String, CanonicalField> = self
            .config
            .extra_synonyms
            .iter()
            .map(|(name, field)| (fold_key(name), *field))
            .collect();

        let mut columns = BTreeMap::new();
        for header in headers {
            let key = fold_key(header);
            let field = extra.get(&key).copied().or_else(|| {
                SYNONYMS
                    .iter()
                    .find(|(synonym, _)| *synonym == key)
                    .map(|(_, field)| *field)
            });

            if let Some(field) = field {
                columns.entry(field).or_insert_with(|| header.clone());
            }
        }

        let missing: Vec<String> = CanonicalField::ALL
            .iter()
            .filter(|f| f.is_required() && !columns.contains_key(f))
            .map(|f| f.name().to_string())
            .collect();

        if !missing.is_empty() {
            return Err(SalesInsightError::SchemaMismatch { missing });
        }

        Ok(ColumnMapping { columns })
    }

    pub fn normalize(&self, table: &RawTable) -> Result<CanonicalDataset> {
        let mapping = self.resolve_columns(&table.headers)?;

        let mut stats = IngestionStats {
            column_mapping: mapping
                .columns
                .iter()
                .map(|(field, header)| (header.clone(), *field))
                .collect(),
            total_rows: table.rows.len(),
            malformed_lines: table.malformed_lines,
            ..IngestionStats::default()
        };

        let mut records = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            match self.coerce_row(row, &mapping) {
                RowOutcome::Accepted(record) => records.push(record),
                RowOutcome::Summary => {
                    debug!("Line {}: skipping subtotal row", row.line);
                    stats.summary_rows += 1;
                }
                RowOutcome::Rejected(reason) => {
                    debug!("Line {}: rejected, {}", row.line, reason);
                    stats.rejected_rows += 1;
                }
            }
        }
        stats.accepted_rows = records.len();

        info!(
            "Normalized {} rows: {} accepted, {} rejected, {} subtotal rows skipped",
            stats.total_rows, stats.accepted_rows, stats.rejected_rows, stats.summary_rows
        );
        if records.is_empty() && stats.rejected_rows > 0 {
            warn!(
                "Every data row was rejected ({}); check the date and amount formats",
                stats.rejected_rows
            );
        }

        Ok(CanonicalDataset::new(records, stats))
    }

    fn coerce_row(&self, row: &RawRow, mapping: &ColumnMapping) -> RowOutcome {
        if self.config.skip_summary_rows
            && fold_key(mapping.value(row, CanonicalField::RecordType)).contains("total")
        {
            return RowOutcome::Summary;
        }

        match self.build_record(row, mapping) {
            Ok(record) => RowOutcome::Accepted(record),
            Err(reason) => RowOutcome::Rejected(reason),
        }
    }

    fn build_record(
        &self,
        row: &RawRow,
        mapping: &ColumnMapping,
    ) -> std::result::Result<SalesRecord, FieldError> {
        let date = parse_flexible_date(mapping.value(row, CanonicalField::Date))?;

        let customer = mapping.value(row, CanonicalField::Customer);
        if customer.is_empty() {
            return Err(FieldError::Missing("customer"));
        }
        let customer = if self.config.uppercase_customers {
            customer.to_uppercase()
        } else {
            customer.to_string()
        };

        let product = mapping.value(row, CanonicalField::Product);
        if product.is_empty() {
            return Err(FieldError::Missing("product"));
        }

        let quantity = parse_quantity(mapping.value(row, CanonicalField::Quantity))?;
        let amount = parse_amount(mapping.value(row, CanonicalField::Amount))?;

        let category = match mapping.value(row, CanonicalField::Category) {
            "" => derive_category(&self.config.category_rules, product),
            category => category.to_string(),
        };

        Ok(SalesRecord {
            date,
            customer,
            product: product.to_string(),
            category,
            quantity,
            amount,
        })
    }
}

/// First rule with a keyword contained in the product name, else the
/// [`UNCATEGORIZED`] sentinel.
pub fn derive_category(rules: &[CategoryRule], product: &str) -> String {
    let product_key = fold_key(product);
    rules
        .iter()
        .find(|rule| {
            rule.keywords.iter().any(|keyword| {
                let keyword = fold_key(keyword);
                !keyword.is_empty() && product_key.contains(&keyword)
            })
        })
        .map(|rule| rule.category.clone())
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}
