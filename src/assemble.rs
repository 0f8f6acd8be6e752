use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::pca::{ProjectionMap, project_2d};
use crate::data::filter::{CountryAllowList, allowed_indices};
use crate::data::model::{IndicatorCatalog, IndicatorTable, Record};
use crate::error::DashboardError;

/// `indicator → value`, only observed values.
pub type IndicatorValues = BTreeMap<String, f64>;

/// `country → year → indicator → value`.
pub type TimeSeries = BTreeMap<String, BTreeMap<i32, IndicatorValues>>;

/// Everything the dashboard page needs in one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    /// Indicator names in column order.
    pub indicators: Vec<String>,
    /// Reference-year values, used for map colouring.
    pub current_data: BTreeMap<String, IndicatorValues>,
    /// Every year per country, used for the line charts.
    pub time_series: TimeSeries,
    /// Reference-year projection, used for the scatter plot.
    pub pca_data: ProjectionMap,
}

/// Non-missing indicator values of one record.
pub fn observed_values(record: &Record, catalog: &IndicatorCatalog) -> IndicatorValues {
    catalog
        .iter()
        .enumerate()
        .filter_map(|(i, (name, _))| catalog.value(record, i).map(|v| (name.to_string(), v)))
        .collect()
}

/// Build the per-country time series for allow-listed countries.
///
/// Every allow-listed country gets an entry, empty when the table has no row
/// for it. Rows repeating a (country, year) pair are merged in table order,
/// later values overwriting earlier ones.
pub fn time_series(
    table: &IndicatorTable,
    catalog: &IndicatorCatalog,
    allow_list: &CountryAllowList,
) -> TimeSeries {
    let mut series: TimeSeries = allow_list
        .iter()
        .map(|country| (country.to_string(), BTreeMap::new()))
        .collect();

    for idx in allowed_indices(table, allow_list) {
        let record = &table.records[idx];
        let years = series.entry(record.country_name.clone()).or_default();
        years
            .entry(record.year)
            .or_default()
            .extend(observed_values(record, catalog));
    }
    series
}

/// Slice one year out of a time series. Countries without a row for `year`
/// are left out.
pub fn current_data(series: &TimeSeries, year: i32) -> BTreeMap<String, IndicatorValues> {
    series
        .iter()
        .filter_map(|(country, years)| years.get(&year).map(|v| (country.clone(), v.clone())))
        .collect()
}

/// Assemble the full dashboard payload from a loaded table.
pub fn assemble(
    table: &IndicatorTable,
    allow_list: &CountryAllowList,
    reference_year: i32,
) -> Result<DashboardPayload, DashboardError> {
    let catalog = table.indicators();
    let pca_data = project_2d(table, &catalog, allow_list, reference_year)?.points;
    let time_series = time_series(table, &catalog, allow_list);
    let current_data = current_data(&time_series, reference_year);

    Ok(DashboardPayload {
        indicators: catalog.names(),
        current_data,
        time_series,
        pca_data,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::model::{CellValue, Column, ColumnKind};

    fn row(country: &str, year: i32, cells: Vec<CellValue>) -> Record {
        Record {
            country_name: country.into(),
            year,
            cells,
        }
    }

    fn table() -> IndicatorTable {
        use CellValue::{Missing, Number, Text};
        IndicatorTable::new(
            vec![
                Column::new("rainfall", ColumnKind::Numeric),
                Column::new("code", ColumnKind::Text),
                Column::new("yield", ColumnKind::Numeric),
            ],
            vec![
                row("Chile", 2019, vec![Number(300.0), Text("CHL".into()), Number(2.0)]),
                row("Chile", 2020, vec![Number(356.0), Text("CHL".into()), Missing]),
                row("Peru", 2020, vec![Number(1738.0), Text("PER".into()), Number(4.5)]),
                row("Kenya", 2020, vec![Number(630.0), Text("KEN".into()), Number(1.5)]),
                row("Atlantis", 2020, vec![Number(1.0), Text("ATL".into()), Number(1.0)]),
                row("Kenya", 2018, vec![Missing, Text("KEN".into()), Missing]),
            ],
        )
    }

    fn allow() -> CountryAllowList {
        CountryAllowList::new(["Chile", "Peru", "Kenya", "Cuba"])
    }

    #[test]
    fn observed_values_skip_missing() {
        let t = table();
        let values = observed_values(&t.records[1], &t.indicators());
        assert_eq!(values, BTreeMap::from([("rainfall".to_string(), 356.0)]));
    }

    #[test]
    fn time_series_covers_every_allowed_country() {
        let t = table();
        let series = time_series(&t, &t.indicators(), &allow());
        assert_eq!(
            series.keys().collect::<Vec<_>>(),
            vec!["Chile", "Cuba", "Kenya", "Peru"]
        );
        assert!(series["Cuba"].is_empty());
        assert_eq!(series["Chile"].keys().copied().collect::<Vec<_>>(), vec![2019, 2020]);
        // a row with nothing observed still records the year
        assert!(series["Kenya"][&2018].is_empty());
        assert!(!series.contains_key("Atlantis"));
    }

    #[test]
    fn duplicate_year_rows_merge_later_wins() {
        use CellValue::{Missing, Number};
        let t = IndicatorTable::new(
            vec![
                Column::new("a", ColumnKind::Numeric),
                Column::new("b", ColumnKind::Numeric),
            ],
            vec![
                row("Chile", 2020, vec![Number(1.0), Number(2.0)]),
                row("Chile", 2020, vec![Number(5.0), Missing]),
            ],
        );
        let series = time_series(&t, &t.indicators(), &allow());
        let merged = &series["Chile"][&2020];
        assert_eq!(merged["a"], 5.0);
        assert_eq!(merged["b"], 2.0);
    }

    #[test]
    fn current_data_omits_countries_without_reference_row() {
        let t = table();
        let series = time_series(&t, &t.indicators(), &allow());
        let current = current_data(&series, 2020);
        assert_eq!(current.keys().collect::<Vec<_>>(), vec!["Chile", "Kenya", "Peru"]);
        assert!(!current["Chile"].contains_key("yield"));
    }

    #[test]
    fn payload_serializes_to_dashboard_shape() {
        let payload = assemble(&table(), &allow(), 2020).unwrap();
        assert_eq!(payload.indicators, vec!["rainfall", "yield"]);
        assert_eq!(payload.pca_data.len(), 3);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value["time_series"]["Chile"]["2019"],
            json!({"rainfall": 300.0, "yield": 2.0})
        );
        assert_eq!(value["current_data"]["Peru"]["yield"], json!(4.5));
        assert!(value["pca_data"]["Kenya"]["x"].is_f64());
        assert!(value["pca_data"]["Kenya"]["y"].is_f64());
        assert!(value["pca_data"].get("Atlantis").is_none());
    }

    #[test]
    fn assemble_propagates_insufficient_data() {
        let only_chile = CountryAllowList::new(["Chile"]);
        assert!(matches!(
            assemble(&table(), &only_chile, 2020),
            Err(DashboardError::InsufficientData { countries: 1, .. })
        ));
    }
}
