/// Column holding the country identifier.
pub const COUNTRY_COLUMN: &str = "country_name";
/// Column holding the observation year.
pub const YEAR_COLUMN: &str = "year";

// ---------------------------------------------------------------------------
// CellValue – a single cell in an indicator column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell, mirroring what a dataframe would infer per value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Numeric value of the cell, `None` for text and missing cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Column schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every present cell is a finite float (an all-missing column counts too).
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            name: name.into(),
            kind,
        }
    }
}

/// Infer column kinds from the parsed cells of text-based sources (CSV, JSON).
pub fn infer_columns(names: Vec<String>, records: &[Record]) -> Vec<Column> {
    names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let has_text = records
                .iter()
                .any(|r| matches!(r.cells.get(idx), Some(CellValue::Text(_))));
            let kind = if has_text {
                ColumnKind::Text
            } else {
                ColumnKind::Numeric
            };
            Column { name, kind }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Record – one row of the source table
// ---------------------------------------------------------------------------

/// One (country, year) observation. `cells` is aligned with
/// [`IndicatorTable::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub country_name: String,
    pub year: i32,
    pub cells: Vec<CellValue>,
}

// ---------------------------------------------------------------------------
// IndicatorTable – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed table. `columns` excludes `country_name` and `year`,
/// which are lifted into every [`Record`].
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
}

impl IndicatorTable {
    pub fn new(columns: Vec<Column>, records: Vec<Record>) -> Self {
        IndicatorTable { columns, records }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Derive the usable indicators: numeric columns in header order.
    pub fn indicators(&self) -> IndicatorCatalog {
        let entries = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, col)| col.kind == ColumnKind::Numeric)
            .filter(|(_, col)| col.name != YEAR_COLUMN && col.name != COUNTRY_COLUMN)
            .map(|(idx, col)| (col.name.clone(), idx))
            .collect();
        IndicatorCatalog { entries }
    }
}

// ---------------------------------------------------------------------------
// IndicatorCatalog
// ---------------------------------------------------------------------------

/// Ordered indicator names together with their column position in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorCatalog {
    entries: Vec<(String, usize)>,
}

impl IndicatorCatalog {
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, column index)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(name, idx)| (name.as_str(), *idx))
    }

    /// Value of the `i`-th indicator for `record`, `None` when missing.
    pub fn value(&self, record: &Record, i: usize) -> Option<f64> {
        let (_, col) = self.entries.get(i)?;
        record.cells.get(*col).and_then(CellValue::as_f64)
    }
}
