/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → IndicatorTable
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ IndicatorTable │  Vec<Record>, typed columns → IndicatorCatalog
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  allow-list / reference-year slices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
