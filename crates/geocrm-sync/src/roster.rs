//! Source roster ingestion.
//!
//! The roster is a spreadsheet with a customer column and an equipment
//! column. Merged cells arrive as blanks, which [`fill_down`] repairs.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};

use geocrm_core::{collapse_whitespace, normalize_name, AppConfig, SourceEntry};

use crate::error::RosterError;

const NAME_HEADERS: [&str; 3] = ["cliente", "nome", "name"];
const EQUIPMENT_HEADERS: [&str; 2] = ["equipamento", "equipment"];

/// Only the top of the sheet is searched for a header row.
const HEADER_SEARCH_ROWS: usize = 10;

/// Anything that yields the roster for one pass.
pub trait RosterSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RosterError`] if the roster cannot be read.
    fn load(&self) -> Result<Vec<SourceEntry>, RosterError>;
}

/// Spreadsheet roster on disk, re-read on every pass.
#[derive(Debug, Clone)]
pub struct XlsxRoster {
    pub path: PathBuf,
    pub sheet: Option<String>,
}

impl XlsxRoster {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, sheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            sheet,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.roster_path.clone(), config.roster_sheet.clone())
    }
}

impl RosterSource for XlsxRoster {
    fn load(&self) -> Result<Vec<SourceEntry>, RosterError> {
        read_roster(&self.path, self.sheet.as_deref())
    }
}

/// Applies the merged-cell convention to raw `(name, equipment)` rows.
///
/// Each column fills down on its own: a blank cell takes the value of the
/// cell above it. Rows still nameless afterwards are dropped.
#[must_use]
pub fn fill_down(rows: Vec<(String, String)>) -> Vec<SourceEntry> {
    let mut entries = Vec::with_capacity(rows.len());
    let mut last_name = String::new();
    let mut last_equipment = String::new();

    for (name, equipment) in rows {
        let name = collapse_whitespace(&name);
        if !name.is_empty() {
            last_name = name;
        }
        let equipment = equipment.trim();
        if !equipment.is_empty() {
            last_equipment = equipment.to_string();
        }

        if !last_name.is_empty() {
            entries.push(SourceEntry::new(last_name.clone(), last_equipment.clone()));
        }
    }

    entries
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
    }
}

fn header_matches(cell: &str, headers: &[&str]) -> bool {
    let cell = normalize_name(cell);
    headers.iter().any(|h| cell.contains(h))
}

/// Locates the header row and its name/equipment columns. Falls back to
/// columns 0 and 1 with no header row.
fn locate_columns(grid: &[Vec<String>]) -> (Option<usize>, usize, usize) {
    for (row_idx, row) in grid.iter().take(HEADER_SEARCH_ROWS).enumerate() {
        let name_col = row.iter().position(|c| header_matches(c, &NAME_HEADERS));
        let equipment_col = row
            .iter()
            .position(|c| header_matches(c, &EQUIPMENT_HEADERS));
        if let (Some(name_col), Some(equipment_col)) = (name_col, equipment_col) {
            if name_col != equipment_col {
                return (Some(row_idx), name_col, equipment_col);
            }
        }
    }
    (None, 0, 1)
}

/// Turns a grid of cell strings into raw `(name, equipment)` rows, skipping
/// the header and fully blank rows.
fn grid_rows(grid: &[Vec<String>]) -> Vec<(String, String)> {
    let (header_row, name_col, equipment_col) = locate_columns(grid);
    let start = header_row.map_or(0, |idx| idx + 1);
    let cell = |row: &Vec<String>, col: usize| row.get(col).cloned().unwrap_or_default();

    grid.iter()
        .skip(start)
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .map(|row| (cell(row, name_col), cell(row, equipment_col)))
        .collect()
}

/// Reads and fills down the roster worksheet `sheet`, or the first sheet.
///
/// # Errors
///
/// Returns [`RosterError::Open`] if the workbook cannot be opened,
/// [`RosterError::NoSheets`] if it has no worksheets, or
/// [`RosterError::Sheet`] if the worksheet cannot be read.
pub fn read_roster(path: &Path, sheet: Option<&str>) -> Result<Vec<SourceEntry>, RosterError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| RosterError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| RosterError::NoSheets {
                path: path.to_path_buf(),
            })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| RosterError::Sheet {
            sheet: sheet_name.clone(),
            source,
        })?;

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    let entries = fill_down(grid_rows(&grid));

    tracing::info!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = grid.len(),
        entries = entries.len(),
        "roster loaded"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(n, e)| ((*n).to_string(), (*e).to_string()))
            .collect()
    }

    fn grid(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|row| row.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    #[test]
    fn blank_cells_fill_down_per_column() {
        let entries = fill_down(rows(&[
            ("Padaria Pão Quente", "Forno x2"),
            ("", ""),
            ("", "Batedeira"),
            ("Mercado Central", ""),
            ("Oficina do Zé", "Compressor"),
        ]));
        assert_eq!(
            entries,
            vec![
                SourceEntry::new("Padaria Pão Quente", "Forno x2"),
                SourceEntry::new("Padaria Pão Quente", "Forno x2"),
                SourceEntry::new("Padaria Pão Quente", "Batedeira"),
                SourceEntry::new("Mercado Central", "Batedeira"),
                SourceEntry::new("Oficina do Zé", "Compressor"),
            ]
        );
    }

    #[test]
    fn leading_nameless_rows_are_dropped() {
        let entries = fill_down(rows(&[("", "Forno"), ("  ", ""), ("Oficina", "Compressor")]));
        assert_eq!(entries, vec![SourceEntry::new("Oficina", "Compressor")]);
    }

    #[test]
    fn header_row_selects_columns() {
        let g = grid(&[
            &["Relatório de vendas", "", ""],
            &["Data", "Equipamentos", "Cliente"],
            &["2024-01-02", "Forno", "Padaria"],
            &["", "", ""],
            &["2024-01-03", "Mesa", "Oficina"],
        ]);
        assert_eq!(
            grid_rows(&g),
            rows(&[("Padaria", "Forno"), ("Oficina", "Mesa")])
        );
    }

    #[test]
    fn missing_header_falls_back_to_first_columns() {
        let g = grid(&[&["Padaria", "Forno"], &["Oficina"]]);
        assert_eq!(grid_rows(&g), rows(&[("Padaria", "Forno"), ("Oficina", "")]));
    }

    #[test]
    fn numeric_cells_render_without_fraction() {
        assert_eq!(cell_to_string(&Data::Float(57000.0)), "57000");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(3)), "3");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn missing_workbook_is_open_error() {
        let err = read_roster(Path::new("/nonexistent/roster.xlsx"), None).unwrap_err();
        assert!(matches!(err, RosterError::Open { .. }), "got: {err:?}");
    }
}
