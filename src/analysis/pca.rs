use std::collections::{BTreeMap, HashMap};

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Serialize;

use crate::data::filter::{CountryAllowList, year_slice};
use crate::data::model::{IndicatorCatalog, IndicatorTable, Record};
use crate::error::DashboardError;

/// A column is constant when its std is at most `ZERO_STD * max(1, |mean|)`.
const ZERO_STD: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Feature matrix: countries × indicators for one year
// ---------------------------------------------------------------------------

/// Countries × indicators for the reference year, with missing cells already
/// replaced by their column mean. Row `i` belongs to `countries()[i]`.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    countries: Vec<String>,
    values: DMatrix<f64>,
    imputed: Vec<(usize, usize)>,
}

impl FeatureMatrix {
    /// Select allow-listed rows for `year` (table order) and impute gaps.
    ///
    /// A country appearing more than once keeps its first position and the
    /// values of its last row.
    pub fn build(
        table: &IndicatorTable,
        catalog: &IndicatorCatalog,
        allow_list: &CountryAllowList,
        year: i32,
    ) -> Self {
        let mut rows: Vec<&Record> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        for record in year_slice(table, allow_list, year) {
            match position.get(record.country_name.as_str()) {
                Some(&pos) => {
                    log::warn!(
                        "duplicate {year} row for {}; using the later row",
                        record.country_name
                    );
                    rows[pos] = record;
                }
                None => {
                    position.insert(record.country_name.as_str(), rows.len());
                    rows.push(record);
                }
            }
        }

        let n_cols = catalog.len();
        let observed: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|r| (0..n_cols).map(|j| catalog.value(r, j)).collect())
            .collect();

        // A column with no observation in the slice imputes 0.0. Each term is
        // divided before summing so the mean of huge values stays finite.
        let means: Vec<f64> = (0..n_cols)
            .map(|j| {
                let count = observed.iter().filter(|row| row[j].is_some()).count();
                if count == 0 {
                    return 0.0;
                }
                observed
                    .iter()
                    .filter_map(|row| row[j])
                    .map(|v| v / count as f64)
                    .sum()
            })
            .collect();

        let imputed = observed
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_none())
                    .map(move |(j, _)| (i, j))
            })
            .collect();

        let values = DMatrix::from_fn(rows.len(), n_cols, |i, j| observed[i][j].unwrap_or(means[j]));

        FeatureMatrix {
            countries: rows.iter().map(|r| r.country_name.clone()).collect(),
            values,
            imputed,
        }
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// `(row, column)` cells that were filled with the column mean.
    pub fn imputed_cells(&self) -> &[(usize, usize)] {
        &self.imputed
    }
}

// ---------------------------------------------------------------------------
// Standardization
// ---------------------------------------------------------------------------

/// Column-wise z-scores using the population standard deviation.
#[derive(Debug, Clone)]
pub struct Standardized {
    values: DMatrix<f64>,
    constant: Vec<usize>,
}

impl Standardized {
    /// Constant columns map to all zeros instead of dividing by zero.
    ///
    /// Each column is divided by its largest magnitude before the moments are
    /// taken, so values near `f64::MAX` neither overflow the sums nor the
    /// centred differences.
    pub fn fit(matrix: &DMatrix<f64>) -> Self {
        let n = matrix.nrows();
        let mut values = DMatrix::<f64>::zeros(n, matrix.ncols());
        let mut constant = Vec::new();

        for (j, column) in matrix.column_iter().enumerate() {
            let scale = column.amax();
            if n == 0 || scale == 0.0 {
                constant.push(j);
                continue;
            }
            let scaled: Vec<f64> = column.iter().map(|v| v / scale).collect();
            let mean = scaled.iter().sum::<f64>() / n as f64;
            let variance = scaled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let std = variance.sqrt();

            if std * scale <= ZERO_STD * (mean.abs() * scale).max(1.0) {
                constant.push(j);
                continue;
            }
            for (i, v) in scaled.iter().enumerate() {
                values[(i, j)] = (v - mean) / std;
            }
        }

        Standardized { values, constant }
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Indices of the columns that standardized to all zeros.
    pub fn constant_columns(&self) -> &[usize] {
        &self.constant
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// One country's position on the first two principal components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub x: f64,
    pub y: f64,
}

/// `country_name → {x, y}`, the wire shape of `pca_data`.
pub type ProjectionMap = BTreeMap<String, ProjectionPoint>;

#[derive(Debug, Clone)]
pub struct Projection {
    pub points: ProjectionMap,
    /// Share of total variance carried by each axis.
    pub explained_variance_ratio: [f64; 2],
}

/// Standardize the reference-year profile of every allow-listed country and
/// project it onto the two directions of largest variance.
pub fn project_2d(
    table: &IndicatorTable,
    catalog: &IndicatorCatalog,
    allow_list: &CountryAllowList,
    year: i32,
) -> Result<Projection, DashboardError> {
    let features = FeatureMatrix::build(table, catalog, allow_list, year);
    if features.nrows() < 2 || features.ncols() < 2 {
        return Err(DashboardError::InsufficientData {
            countries: features.nrows(),
            indicators: features.ncols(),
        });
    }

    let standardized = Standardized::fit(features.values());
    log::debug!(
        "{} imputed cells, {} constant columns",
        features.imputed_cells().len(),
        standardized.constant_columns().len()
    );
    let z = standardized.values();
    let covariance = (z.transpose() * z) / (features.nrows() - 1) as f64;

    let eigen = SymmetricEigen::new(covariance);
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let axes: Vec<DVector<f64>> = order[..2]
        .iter()
        .map(|&k| orient(eigen.eigenvectors.column(k).into_owned()))
        .collect();
    let scores = z * DMatrix::from_columns(&axes);

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let ratio = |k: usize| {
        if total > 0.0 {
            eigen.eigenvalues[order[k]].max(0.0) / total
        } else {
            0.0
        }
    };
    let explained_variance_ratio = [ratio(0), ratio(1)];
    log::debug!(
        "projected {} countries over {} indicators, explained variance {:.3} / {:.3}",
        features.nrows(),
        features.ncols(),
        explained_variance_ratio[0],
        explained_variance_ratio[1]
    );

    let points = features
        .countries()
        .iter()
        .enumerate()
        .map(|(i, country)| {
            let point = ProjectionPoint {
                x: scores[(i, 0)],
                y: scores[(i, 1)],
            };
            (country.clone(), point)
        })
        .collect();

    Ok(Projection {
        points,
        explained_variance_ratio,
    })
}

/// Flip an eigenvector so its largest-magnitude loading is positive.
fn orient(mut axis: DVector<f64>) -> DVector<f64> {
    let pivot = axis.iamax();
    if axis[pivot] < 0.0 {
        axis.neg_mut();
    }
    axis
}
