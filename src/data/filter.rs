use std::collections::BTreeSet;

use super::model::{IndicatorTable, Record};

// ---------------------------------------------------------------------------
// Country allow-list
// ---------------------------------------------------------------------------

/// The countries the dashboard reports on. Keeps the configured order for
/// iteration and a set for membership checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryAllowList {
    ordered: Vec<String>,
    members: BTreeSet<String>,
}

impl CountryAllowList {
    /// Build from a sequence of names; repeated names keep their first position.
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut members = BTreeSet::new();
        for country in countries {
            let country = country.into();
            if members.insert(country.clone()) {
                ordered.push(country);
            }
        }
        CountryAllowList { ordered, members }
    }

    pub fn contains(&self, country: &str) -> bool {
        self.members.contains(country)
    }

    /// Countries in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ordered.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Row selection
// ---------------------------------------------------------------------------

/// Return indices of records whose country is on the allow-list, in table order.
pub fn allowed_indices(table: &IndicatorTable, allow_list: &CountryAllowList) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| allow_list.contains(&r.country_name))
        .map(|(i, _)| i)
        .collect()
}

/// Allow-listed records for a single year, in table order.
pub fn year_slice<'a>(
    table: &'a IndicatorTable,
    allow_list: &CountryAllowList,
    year: i32,
) -> Vec<&'a Record> {
    allowed_indices(table, allow_list)
        .into_iter()
        .map(|i| &table.records[i])
        .filter(|r| r.year == year)
        .collect()
}
