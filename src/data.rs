//! Table boundary: named columns in, typed [`Observation`] rows out.
//!
//! Source tables arrive from an external loader as column-named strings,
//! either built in memory or read from CSV. [`ColumnSpec`] resolves the
//! focal, sort, denominator, and stratification columns once, parses every
//! cell, and hands the calculator rows that need no further lookups.

use std::io;
use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{ChartError, Result};
use crate::table::{Observation, SortKey};

/// Date formats tried, in order, when typing a sort column.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

/// Column-named table of raw string cells, stored row-major.
///
/// # Examples
///
/// ```
/// use shewhart::RawTable;
///
/// let csv = "month,claims\n2024-01-01,410\n2024-02-01,388\n";
/// let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();
/// assert_eq!(table.columns(), &["month".to_string(), "claims".to_string()]);
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from column names and rows.
    ///
    /// Short rows are padded with empty cells; extra cells are dropped.
    pub fn new<C, S>(columns: C, rows: Vec<Vec<String>>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns
            .into_iter()
            .map(|c| Into::<String>::into(c).trim().to_string())
            .collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Read a headed CSV stream.
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        debug!(columns = columns.len(), rows = rows.len(), "read csv table");
        Ok(Self::new(columns, rows))
    }

    /// Read a headed CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(io::BufReader::new(file))
    }

    /// Column names, in source order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ChartError::MissingColumn(name.to_string()))
    }

    fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }
}

/// Which columns of a [`RawTable`] feed a chart.
///
/// # Examples
///
/// ```
/// use shewhart::{p_chart, ColumnSpec, RawTable};
///
/// let csv = "\
/// service_month,submitter,reject_count,total_count
/// 2024-01-01,acme,12,400
/// 2024-02-01,acme,9,380
/// 2024-01-01,zenith,30,900
/// 2024-02-01,zenith,41,950
/// ";
/// let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();
/// let rows = ColumnSpec::new("reject_count", "service_month")
///     .denominator("total_count")
///     .stratify_by(["submitter"])
///     .extract(&table)
///     .unwrap();
///
/// let result = p_chart(&rows).unwrap();
/// assert_eq!(result.groups().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    focal: String,
    sort: String,
    denominator: Option<String>,
    strata: Vec<String>,
    stratified: bool,
}

impl ColumnSpec {
    /// Name the focal (value or numerator) column and the sort column.
    pub fn new(focal: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            focal: focal.into(),
            sort: sort.into(),
            denominator: None,
            strata: Vec::new(),
            stratified: false,
        }
    }

    /// Name the denominator column (required for P, P′, U, U′ charts).
    pub fn denominator(mut self, column: impl Into<String>) -> Self {
        self.denominator = Some(column.into());
        self
    }

    /// Compute independent limits for each combination of these columns.
    ///
    /// Passing an empty list makes [`ColumnSpec::extract`] fail with
    /// [`ChartError::EmptyStrata`].
    pub fn stratify_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strata = columns.into_iter().map(Into::into).collect();
        self.stratified = true;
        self
    }

    /// Resolve the named columns and parse every row.
    ///
    /// Blank denominator cells become `None`; the chart functions reject them
    /// with [`ChartError::MissingDenominator`].
    ///
    /// # Errors
    ///
    /// - [`ChartError::EmptyStrata`] if stratification was requested with no columns.
    /// - [`ChartError::MissingColumn`] if any named column is absent.
    /// - [`ChartError::InvalidValue`] if a focal or denominator cell is not a
    ///   number, or a sort cell is empty.
    pub fn extract(&self, table: &RawTable) -> Result<Vec<Observation>> {
        if self.stratified && self.strata.is_empty() {
            return Err(ChartError::EmptyStrata);
        }

        let focal = table.column_index(&self.focal)?;
        let sort = table.column_index(&self.sort)?;
        let denominator = self
            .denominator
            .as_deref()
            .map(|name| table.column_index(name))
            .transpose()?;
        let strata = self
            .strata
            .iter()
            .map(|name| table.column_index(name))
            .collect::<Result<Vec<usize>>>()?;

        let values = parse_numbers(table, focal, &self.focal)?;
        let denominators = match (denominator, &self.denominator) {
            (Some(index), Some(name)) => Some(parse_optional_numbers(table, index, name)?),
            _ => None,
        };
        let sort_cells: Vec<&str> = table.column(sort).collect();
        let sort_keys = parse_sort_keys(&sort_cells, &self.sort)?;

        let observations = values
            .into_iter()
            .zip(sort_keys)
            .enumerate()
            .map(|(row, (value, sort_key))| Observation {
                value,
                denominator: denominators.as_ref().and_then(|d| d[row]),
                sort_key,
                strata: strata
                    .iter()
                    .map(|&index| table.rows[row][index].clone())
                    .collect(),
            })
            .collect::<Vec<_>>();

        debug!(
            rows = observations.len(),
            focal = %self.focal,
            sort = %self.sort,
            strata = self.strata.len(),
            "extracted observations"
        );
        Ok(observations)
    }
}

fn parse_numbers(table: &RawTable, index: usize, name: &str) -> Result<Vec<f64>> {
    table
        .column(index)
        .enumerate()
        .map(|(row, cell)| {
            cell.parse::<f64>().map_err(|_| ChartError::InvalidValue {
                column: name.to_string(),
                row,
                value: cell.to_string(),
            })
        })
        .collect()
}

/// Like [`parse_numbers`], but blank cells become `None`.
fn parse_optional_numbers(table: &RawTable, index: usize, name: &str) -> Result<Vec<Option<f64>>> {
    table
        .column(index)
        .enumerate()
        .map(|(row, cell)| {
            if cell.is_empty() {
                return Ok(None);
            }
            cell.parse::<f64>().map(Some).map_err(|_| ChartError::InvalidValue {
                column: name.to_string(),
                row,
                value: cell.to_string(),
            })
        })
        .collect()
}

/// Type a sort column as numbers, dates, or text, whichever fits every cell.
fn parse_sort_keys(cells: &[&str], name: &str) -> Result<Vec<SortKey>> {
    if let Some(row) = cells.iter().position(|cell| cell.is_empty()) {
        return Err(ChartError::InvalidValue {
            column: name.to_string(),
            row,
            value: String::new(),
        });
    }

    let numbers: Option<Vec<f64>> = cells.iter().map(|cell| cell.parse::<f64>().ok()).collect();
    if let Some(numbers) = numbers {
        return Ok(numbers.into_iter().map(SortKey::Number).collect());
    }

    for format in DATE_FORMATS {
        let dates: Option<Vec<NaiveDate>> = cells
            .iter()
            .map(|cell| NaiveDate::parse_from_str(cell, format).ok())
            .collect();
        if let Some(dates) = dates {
            return Ok(dates.into_iter().map(SortKey::Date).collect());
        }
    }

    Ok(cells.iter().map(|cell| SortKey::Text(cell.to_string())).collect())
}
