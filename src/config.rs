use crate::error::{Result, SalesInsightError};
use crate::schema::CanonicalField;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Assigns a category to products whose name contains any of the keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRule {
    #[schemars(
        description = "Keywords matched against the lowercased, accent-folded product name (e.g. 'hielo', 'bolsa')"
    )]
    pub keywords: Vec<String>,

    #[schemars(description = "Category assigned when any keyword matches")]
    pub category: String,
}

impl CategoryRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category: category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    #[schemars(description = "Field delimiter of the input file. Defaults to ','")]
    pub delimiter: char,

    #[schemars(
        description = "Additional header names recognised for canonical fields, on top of the built-in synonym table"
    )]
    pub extra_synonyms: BTreeMap<String, CanonicalField>,

    #[schemars(description = "Upper-case customer names so spelling variants merge. Defaults to true")]
    pub uppercase_customers: bool,

    #[schemars(
        description = "Skip export subtotal rows (type column containing 'total'). Defaults to true"
    )]
    pub skip_summary_rows: bool,

    #[schemars(
        description = "Ordered keyword rules used to derive a category when the file has none. First match wins"
    )]
    pub category_rules: Vec<CategoryRule>,

    #[schemars(
        description = "Relative change between the two halves of the period below which the trend is reported as flat. Range 0.0-1.0, default 0.05"
    )]
    pub trend_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            extra_synonyms: BTreeMap::new(),
            uppercase_customers: true,
            skip_summary_rows: true,
            category_rules: Vec::new(),
            trend_tolerance: 0.05,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(SalesInsightError::InvalidConfig(format!(
                "delimiter {:?} must be a single ASCII character other than a quote or line break",
                self.delimiter
            )));
        }

        if !(0.0..=1.0).contains(&self.trend_tolerance) {
            return Err(SalesInsightError::InvalidConfig(format!(
                "trend_tolerance {} must be between 0.0 and 1.0",
                self.trend_tolerance
            )));
        }

        for (idx, rule) in self.category_rules.iter().enumerate() {
            if rule.category.trim().is_empty() {
                return Err(SalesInsightError::InvalidConfig(format!(
                    "category rule #{} has an empty category name",
                    idx
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(PipelineConfig);
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.delimiter, ',');
        assert!(config.uppercase_customers);
        assert!((config.trend_tolerance - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{
            "delimiter": ";",
            "extra_synonyms": { "importe total": "amount" },
            "category_rules": [ { "keywords": ["hielo"], "category": "Hielo" } ]
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.delimiter, ';');
        assert_eq!(
            config.extra_synonyms.get("importe total"),
            Some(&CanonicalField::Amount)
        );
        assert_eq!(config.category_rules[0].category, "Hielo");
        assert!(config.skip_summary_rows);
    }

    #[test]
    fn test_rejects_bad_delimiter() {
        let config = PipelineConfig {
            delimiter: '"',
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SalesInsightError::InvalidConfig(_))
        ));

        let config = PipelineConfig {
            delimiter: '¦',
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_tolerance() {
        let err = PipelineConfig::from_json_str(r#"{ "trend_tolerance": 1.5 }"#).unwrap_err();
        assert!(err.to_string().contains("trend_tolerance"));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = PipelineConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("delimiter"));
        assert!(schema_json.contains("category_rules"));
    }
}
