use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use agri_atlas::config::COUNTRIES;

const FILE_STEM: &str = "cleaned_filtered_agriRuralDevelopment";
const YEARS: std::ops::RangeInclusive<i64> = 2000..=2022;
const MISSING_RATE: f64 = 0.05;

/// Rows for countries outside the allow-list, so filtering has work to do.
const EXTRA_COUNTRIES: &[&str] = &["Canada", "Norway"];

const INDICATORS: &[&str] = &[
    "rainfall_mm",
    "cereal_yield_kg_per_ha",
    "agricultural_land_pct",
    "rural_population_pct",
    "fertilizer_kg_per_ha",
    "rural_electricity_access_pct",
];

/// Deterministic PRNG (splitmix64).
struct SampleRng(u64);

impl SampleRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

/// Latent profile shared by every year of one country.
struct Profile {
    development: f64,
    wetness: f64,
}

impl Profile {
    fn income_group(&self) -> &'static str {
        match self.development {
            d if d > 0.66 => "High income",
            d if d > 0.33 => "Middle income",
            _ => "Low income",
        }
    }

    fn indicators(&self, t: f64, rng: &mut SampleRng) -> [f64; 6] {
        let dev = self.development;
        let rainfall = (200.0 + 1600.0 * self.wetness + rng.gauss(0.0, 60.0)).max(0.0);
        [
            rainfall,
            1000.0 + 5000.0 * dev + 0.5 * rainfall + 30.0 * t + rng.gauss(0.0, 150.0),
            (20.0 + 35.0 * (1.0 - dev) + rng.gauss(0.0, 2.0)).clamp(0.0, 100.0),
            (80.0 - 60.0 * dev - 0.4 * t + rng.gauss(0.0, 1.5)).clamp(0.0, 100.0),
            (20.0 + 250.0 * dev + rng.gauss(0.0, 10.0)).max(0.0),
            (30.0 + 70.0 * dev + 1.5 * t + rng.gauss(0.0, 3.0)).clamp(0.0, 100.0),
        ]
    }
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("static/data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SampleRng(42);

    let mut countries: Vec<String> = Vec::new();
    let mut years: Vec<i64> = Vec::new();
    let mut groups: Vec<&'static str> = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); INDICATORS.len()];

    for &country in COUNTRIES.iter().chain(EXTRA_COUNTRIES) {
        let profile = Profile {
            development: rng.uniform(),
            wetness: rng.uniform(),
        };
        for year in YEARS {
            let t = (year - YEARS.start()) as f64;
            let values = profile.indicators(t, &mut rng);
            for (column, value) in columns.iter_mut().zip(values) {
                let missing = rng.uniform() < MISSING_RATE;
                column.push((!missing).then_some(value));
            }
            countries.push(country.to_string());
            years.push(year);
            groups.push(profile.income_group());
        }
    }

    // CSV
    let csv_path = out_dir.join(format!("{FILE_STEM}.csv"));
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    let mut header = vec!["country_name", "year", "income_group"];
    header.extend_from_slice(INDICATORS);
    writer.write_record(&header)?;
    for row in 0..countries.len() {
        let mut record = vec![countries[row].clone(), years[row].to_string(), groups[row].to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| c[row].map(|v| format!("{v:.3}")).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    // Parquet
    let mut fields = vec![
        Field::new("country_name", DataType::Utf8, false),
        Field::new("year", DataType::Int64, false),
        Field::new("income_group", DataType::Utf8, false),
    ];
    fields.extend(
        INDICATORS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(countries.clone())),
        Arc::new(Int64Array::from(years.clone())),
        Arc::new(StringArray::from(groups.clone())),
    ];
    arrays.extend(
        columns
            .iter()
            .map(|c| Arc::new(Float64Array::from(c.clone())) as ArrayRef),
    );
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let parquet_path = out_dir.join(format!("{FILE_STEM}.parquet"));
    let file = std::fs::File::create(&parquet_path)
        .with_context(|| format!("creating {}", parquet_path.display()))?;
    let mut parquet_writer = ArrowWriter::try_new(file, schema, None)?;
    parquet_writer.write(&batch)?;
    parquet_writer.close()?;

    println!(
        "Wrote {} rows ({} countries, {} indicators) to {} and {}",
        countries.len(),
        COUNTRIES.len() + EXTRA_COUNTRIES.len(),
        INDICATORS.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
