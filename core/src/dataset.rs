//! Reference dataset loading and synthetic generation.
//!
//! The reference store is populated once at startup from a tabular file
//! with columns `Food,Calories,Protein,Carbs,Fat` (per 100 g). When no
//! file exists, a deterministic synthetic dataset is generated first.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::db::Store;
use crate::models::NewFoodRecord;

pub const DEFAULT_DATASET_SIZE: usize = 5000;

const GENERATOR_SEED: u64 = 42;

/// Summary of a dataset load.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub rows_read: usize,
    pub foods_loaded: usize,
    pub duplicates_skipped: usize,
    pub rows_skipped: usize,
}

/// Load a reference CSV into the store.
///
/// The header row is required; header names match case-insensitively.
/// Rows with an empty food name or unparseable numbers are skipped, and
/// duplicate names are dropped first-occurrence-wins.
pub fn load_reference_csv<R: Read>(store: &dyn Store, reader: R) -> Result<DatasetSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_food = col("Food").context("Missing 'Food' column")?;
    let idx_calories = col("Calories").context("Missing 'Calories' column")?;
    let idx_protein = col("Protein").context("Missing 'Protein' column")?;
    let idx_carbs = col("Carbs").context("Missing 'Carbs' column")?;
    let idx_fat = col("Fat").context("Missing 'Fat' column")?;

    let mut summary = DatasetSummary {
        rows_read: 0,
        foods_loaded: 0,
        duplicates_skipped: 0,
        rows_skipped: 0,
    };

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;
        summary.rows_read += 1;

        let name = record.get(idx_food).unwrap_or("").trim();
        let parse = |idx: usize| -> Option<f64> {
            record.get(idx).and_then(|v| v.trim().parse::<f64>().ok())
        };

        let (Some(calories), Some(protein), Some(carbs), Some(fat)) = (
            parse(idx_calories),
            parse(idx_protein),
            parse(idx_carbs),
            parse(idx_fat),
        ) else {
            summary.rows_skipped += 1;
            continue;
        };
        if name.is_empty() {
            summary.rows_skipped += 1;
            continue;
        }

        let inserted = store.insert_food(&NewFoodRecord {
            name: name.to_string(),
            calories_per_100g: calories,
            protein_per_100g: protein,
            carbs_per_100g: carbs,
            fat_per_100g: fat,
        })?;
        if inserted {
            summary.foods_loaded += 1;
        } else {
            summary.duplicates_skipped += 1;
        }
    }

    Ok(summary)
}

const BASE_FOODS: &[(&str, (f64, f64, f64, f64))] = &[
    ("chicken breast", (165.0, 31.0, 0.0, 3.6)),
    ("beef steak", (250.0, 26.0, 0.0, 17.0)),
    ("salmon", (208.0, 20.4, 0.0, 13.4)),
    ("rice (cooked)", (130.0, 2.4, 28.0, 0.3)),
    ("pasta", (131.0, 5.0, 25.0, 1.1)),
    ("apple", (52.0, 0.3, 14.0, 0.2)),
    ("banana", (89.0, 1.1, 23.0, 0.3)),
    ("milk", (61.0, 3.2, 4.8, 3.3)),
    ("cheese", (403.0, 24.9, 1.3, 33.1)),
    ("avocado", (160.0, 2.0, 9.0, 15.0)),
];

const METHODS: &[&str] = &[
    "raw",
    "boiled",
    "grilled",
    "fried",
    "baked",
    "steamed",
    "roasted",
    "pan-fried",
    "smoked",
];

const SUFFIXES: &[&str] = &[
    "",
    " - restaurant style",
    " (home cooked)",
    " - small serving",
    " - large serving",
    "with sauce",
];

/// Write a synthetic reference dataset of `total` rows.
///
/// Variations of a small base-food table with jittered macros; the RNG is
/// seeded, so repeated runs produce identical files. Names repeat across
/// rows — the loader's first-occurrence-wins dedup thins them out.
pub fn generate_reference_csv<W: Write>(writer: W, total: usize) -> Result<usize> {
    let mut rng = StdRng::seed_from_u64(GENERATOR_SEED);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Food", "Calories", "Protein", "Carbs", "Fat"])?;

    // Each base food plus four method/template variations of it.
    let mut candidates: Vec<(String, (f64, f64, f64, f64))> = Vec::new();
    for &(name, macros) in BASE_FOODS {
        candidates.push((name.to_string(), macros));
        for _ in 0..4 {
            let method = METHODS[rng.random_range(0..METHODS.len())];
            let variant = match rng.random_range(0..4) {
                0 => name.to_string(),
                1 => format!("{method} {name}"),
                2 => format!("{name} ({method})"),
                _ => format!("{method} {name} with herbs"),
            };
            let jittered = (
                round1(macros.0 * rng.random_range(0.86..=1.22)).max(0.1),
                round1(macros.1 * rng.random_range(0.88..=1.06)),
                round1(macros.2 * rng.random_range(0.88..=1.1)),
                round1(macros.3 * rng.random_range(0.8..=1.4)),
            );
            candidates.push((variant, jittered));
        }
    }

    let mut written = 0;
    for idx in 0..total {
        let (base_name, macros) = &candidates[idx % candidates.len()];
        let suffix = if idx % 5 == 0 {
            SUFFIXES[rng.random_range(0..SUFFIXES.len())]
        } else {
            ""
        };
        let name = format!("{base_name}{suffix}");
        let calories = round1(macros.0 * rng.random_range(0.9..=1.12)).max(0.1);
        let protein = round1(macros.1 * rng.random_range(0.9..=1.05));
        let carbs = round1(macros.2 * rng.random_range(0.9..=1.08));
        let fat = round1(macros.3 * rng.random_range(0.85..=1.25));
        wtr.write_record([
            name,
            format!("{calories:.1}"),
            format!("{protein:.1}"),
            format!("{carbs:.1}"),
            format!("{fat:.1}"),
        ])?;
        written += 1;
    }

    wtr.flush()?;
    Ok(written)
}

/// Populate an empty store: generate the dataset file if missing, then
/// bulk-load it. Returns None when the store already holds reference data.
pub fn ensure_reference_data(store: &dyn Store, csv_path: &Path) -> Result<Option<DatasetSummary>> {
    if store.food_count()? > 0 {
        return Ok(None);
    }

    if !csv_path.exists() {
        let file = File::create(csv_path)
            .with_context(|| format!("Failed to create dataset file: {}", csv_path.display()))?;
        generate_reference_csv(file, DEFAULT_DATASET_SIZE)?;
    }

    let file = File::open(csv_path)
        .with_context(|| format!("Failed to open dataset file: {}", csv_path.display()))?;
    load_reference_csv(store, file).map(Some)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
