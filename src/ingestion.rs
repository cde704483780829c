use crate::config::PipelineConfig;
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::collections::BTreeMap;

/// One data line of the input, keyed by raw header name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line number in the source text (header is line 1).
    pub line: u64,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> &str {
        self.fields.get(header).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Header names in file order, duplicates removed (first wins).
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Lines the reader could not parse; they are skipped.
    pub malformed_lines: usize,
}

pub struct RecordIngestor {
    delimiter: u8,
}

impl Default for RecordIngestor {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl RecordIngestor {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.delimiter_byte())
    }

    /// Splits `text` into rows keyed by the header row.
    ///
    /// Short rows are padded with empty strings, surplus fields are dropped,
    /// blank rows are skipped and unparseable lines are counted, never fatal.
    pub fn parse(&self, text: &str) -> RawTable {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(text.as_bytes());

        let raw_headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                warn!("Could not read header row: {}", e);
                return RawTable {
                    malformed_lines: 1,
                    ..RawTable::default()
                };
            }
        };

        // Column positions that survive de-duplication.
        let mut headers = Vec::new();
        let mut positions = Vec::new();
        for (idx, name) in raw_headers.iter().enumerate() {
            let name = name.trim().to_string();
            if name.is_empty() || headers.contains(&name) {
                continue;
            }
            headers.push(name);
            positions.push(idx);
        }

        let mut rows = Vec::new();
        let mut malformed_lines = 0;

        for result in reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed line: {}", e);
                    malformed_lines += 1;
                    continue;
                }
            };

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.len() != raw_headers.len() {
                debug!(
                    "Line {} has {} fields, header has {}",
                    line,
                    record.len(),
                    raw_headers.len()
                );
            }

            let fields = headers
                .iter()
                .zip(&positions)
                .map(|(name, &pos)| (name.clone(), record.get(pos).unwrap_or("").to_string()))
                .collect();

            rows.push(RawRow { line, fields });
        }

        RawTable {
            headers,
            rows,
            malformed_lines,
        }
    }
}
