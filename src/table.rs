//! Minimal delimited-text table reader
//!
//! Reads a header row followed by data rows. Fields may be quoted with `"`,
//! with `""` as an escaped quote; quoted fields may span lines. Blank lines
//! are skipped and `\r\n` line endings are accepted.

use anyhow::Context;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or reading a table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("table has no header row")]
    Empty,

    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}', row {row}: cannot parse '{value}'")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
}

/// Parsed table: header plus rows of string fields
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse comma-separated text
    pub fn parse(input: &str) -> Result<Self, TableError> {
        Self::parse_delimited(input, ',')
    }

    /// Parse text separated by `delimiter`
    pub fn parse_delimited(input: &str, delimiter: char) -> Result<Self, TableError> {
        let mut records = split_records(input, delimiter)?.into_iter();
        let (_, header) = records.next().ok_or(TableError::Empty)?;

        let mut rows = Vec::new();
        for (line, record) in records {
            if record.len() != header.len() {
                return Err(TableError::RaggedRow {
                    line,
                    expected: header.len(),
                    found: record.len(),
                });
            }
            rows.push(record);
        }

        Ok(Self { header, rows })
    }

    /// Read and parse a comma-separated file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn headers(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` in the header
    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Raw fields of column `name`
    pub fn column(&self, name: &str) -> Result<Vec<&str>, TableError> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    /// Column `name` parsed as `T`
    pub fn parse_column<T: FromStr>(&self, name: &str) -> Result<Vec<T>, TableError> {
        self.map_column(name, |value| value.trim().parse::<T>().ok())
    }

    /// Boolean column accepting `True`/`False`, `true`/`false` and `1`/`0`
    pub fn bool_column(&self, name: &str) -> Result<Vec<bool>, TableError> {
        self.map_column(name, |value| match value.trim() {
            "True" | "true" | "TRUE" | "1" => Some(true),
            "False" | "false" | "FALSE" | "0" => Some(false),
            _ => None,
        })
    }

    fn map_column<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Vec<T>, TableError> {
        let index = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                parse(&fields[index]).ok_or_else(|| TableError::InvalidValue {
                    column: name.to_string(),
                    row,
                    value: fields[index].clone(),
                })
            })
            .collect()
    }
}

/// Split input into records of fields, tagged with their 1-based start line
fn split_records(input: &str, delimiter: char) -> Result<Vec<(usize, Vec<String>)>, TableError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_line = 1;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
                quote_line = line;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty() && !quoted) {
                    records.push((record_line, std::mem::take(&mut record)));
                }
                record.clear();
                quoted = false;
                line += 1;
                record_line = line;
            }
            c if c == delimiter => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() || quoted {
        record.push(field);
        records.push((record_line, record));
    }

    Ok(records)
}
