//! Decoded tabular data
//!
//! The loader receives a file's content as a [`DecodedTable`]: ordered,
//! typed columns plus ordered rows of text cells. Cells stay text all
//! the way to Postgres — fractional numbers are declared
//! `numeric(19,7)` and parsed server-side, so no float round-trip can
//! smudge them. An empty cell is a SQL NULL.

use crate::db::{sanitize_identifier, validate_identifier, DbError, SOURCE_FILE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Storage type for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    /// Fixed-precision decimal; never floating point.
    Decimal,
    Boolean,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "bigint",
            ColumnType::Decimal => "numeric(19,7)",
            ColumnType::Boolean => "boolean",
        }
    }
}

/// One column: sanitized SQL-safe name plus inferred storage type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// A fully decoded file, ready for bulk load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTable {
    pub columns: Vec<ColumnDef>,
    /// Row cells in column order; an empty cell is NULL.
    pub rows: Vec<Vec<String>>,
}

impl DecodedTable {
    /// Build a table from raw CSV headers and rows.
    ///
    /// Headers are sanitized into SQL-safe column names and validated;
    /// column types are inferred from the cell values. Fails when a
    /// header sanitizes to the reserved provenance column or when two
    /// headers collapse to the same name.
    pub fn new(headers: &[String], rows: Vec<Vec<String>>) -> Result<Self, DbError> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(headers.len());

        for (idx, header) in headers.iter().enumerate() {
            let name = sanitize_identifier(header);
            validate_identifier(&name)?;
            if name == SOURCE_FILE_COLUMN {
                return Err(DbError::ProvenanceCollision(header.clone()));
            }
            if !seen.insert(name.clone()) {
                return Err(DbError::UnsafeIdentifier(format!(
                    "{header} (duplicate column name after sanitizing)"
                )));
            }

            let ty = infer_column_type(rows.iter().filter_map(|row| row.get(idx)));
            columns.push(ColumnDef { name, ty });
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Infer the narrowest storage type that fits every non-empty cell.
/// Columns with no non-empty cells stay text.
fn infer_column_type<'a>(cells: impl Iterator<Item = &'a String>) -> ColumnType {
    let mut any = false;
    let mut all_integer = true;
    let mut all_numeric = true;
    let mut all_boolean = true;

    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        any = true;

        if all_integer && cell.parse::<i64>().is_err() {
            all_integer = false;
        }
        if all_numeric && !is_plain_decimal(cell) {
            all_numeric = false;
        }
        if all_boolean && !matches!(cell.to_ascii_lowercase().as_str(), "true" | "false") {
            all_boolean = false;
        }
        if !all_integer && !all_numeric && !all_boolean {
            return ColumnType::Text;
        }
    }

    if !any {
        ColumnType::Text
    } else if all_boolean {
        ColumnType::Boolean
    } else if all_integer {
        ColumnType::Integer
    } else if all_numeric {
        ColumnType::Decimal
    } else {
        ColumnType::Text
    }
}

/// Plain decimal notation only; scientific notation stays text so that
/// what lands in `numeric(19,7)` is exactly what the file said.
fn is_plain_decimal(cell: &str) -> bool {
    let rest = cell.strip_prefix(['+', '-']).unwrap_or(cell);
    if rest.is_empty() {
        return false;
    }
    let mut dots = 0;
    for c in rest.chars() {
        match c {
            '0'..='9' => {},
            '.' => dots += 1,
            _ => return false,
        }
    }
    dots <= 1 && rest.chars().any(|c| c.is_ascii_digit())
}
