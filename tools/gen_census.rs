//! Synthetic Census Generator
//!
//! Writes a labelled census-shaped CSV for exercising the training job and the
//! scoring server without the real dataset.

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gen-census")]
#[command(about = "Generate a synthetic labelled census CSV")]
struct Args {
    /// Output CSV path
    #[arg(short, long, default_value = "data/census.csv")]
    output: PathBuf,

    /// Number of rows
    #[arg(short = 'n', long, default_value_t = 2000)]
    rows: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Probability that any categorical cell is left empty
    #[arg(long, default_value_t = 0.02)]
    missing_rate: f64,
}

/// One CSV row; column names match the census schema plus `label`
#[derive(Debug, Serialize)]
struct Row {
    age: u32,
    workclass: Option<&'static str>,
    education: Option<&'static str>,
    marital_status: Option<&'static str>,
    occupation: Option<&'static str>,
    relationship: Option<&'static str>,
    race: Option<&'static str>,
    sex: Option<&'static str>,
    capital_gain: u32,
    capital_loss: u32,
    hours_per_week: u32,
    native_country: Option<&'static str>,
    label: u8,
}

const WORKCLASS: &[&str] = &[
    "Private",
    "Self-emp-not-inc",
    "Self-emp-inc",
    "Federal-gov",
    "Local-gov",
    "State-gov",
];
const EDUCATION: &[&str] = &[
    "HS-grad",
    "Some-college",
    "Bachelors",
    "Masters",
    "Doctorate",
    "11th",
    "Assoc-voc",
];
const MARITAL: &[&str] = &["Married-civ-spouse", "Never-married", "Divorced", "Separated", "Widowed"];
const OCCUPATION: &[&str] = &[
    "Exec-managerial",
    "Prof-specialty",
    "Craft-repair",
    "Adm-clerical",
    "Sales",
    "Other-service",
    "Machine-op-inspct",
];
const RACE: &[&str] = &["White", "Black", "Asian-Pac-Islander", "Amer-Indian-Eskimo", "Other"];
const COUNTRY: &[&str] = &["United-States", "Mexico", "Philippines", "Germany", "Canada", "India"];

struct CensusGenerator {
    rng: StdRng,
    missing_rate: f64,
}

impl CensusGenerator {
    fn new(seed: u64, missing_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            missing_rate,
        }
    }

    fn choice(&mut self, choices: &[&'static str]) -> Option<&'static str> {
        if self.rng.gen_bool(self.missing_rate) {
            return None;
        }
        Some(choices[self.rng.gen_range(0..choices.len())])
    }

    /// Draw a row, then label it from a noisy linear score so the classes
    /// are separable but not perfectly.
    fn generate(&mut self) -> Row {
        let age: u32 = self.rng.gen_range(17..80);
        let education = self.choice(EDUCATION);
        let marital_status = self.choice(MARITAL);
        let occupation = self.choice(OCCUPATION);
        let sex = self.choice(&["Male", "Female"]);
        let relationship = match (marital_status, sex) {
            (Some("Married-civ-spouse"), Some("Female")) => Some("Wife"),
            (Some("Married-civ-spouse"), _) => Some("Husband"),
            (Some(_), _) => self.choice(&["Not-in-family", "Own-child", "Unmarried"]),
            (None, _) => None,
        };
        let hours_per_week: u32 = self.rng.gen_range(10..70);
        let capital_gain: u32 = if self.rng.gen_bool(0.08) {
            self.rng.gen_range(1000..20000)
        } else {
            0
        };
        let capital_loss: u32 = if self.rng.gen_bool(0.05) {
            self.rng.gen_range(200..2500)
        } else {
            0
        };

        let mut score = -4.0
            + 0.04 * (age.min(60) as f64 - 17.0)
            + 0.03 * (hours_per_week as f64 - 40.0)
            + if capital_gain > 5000 { 3.0 } else { 0.0 };
        score += match education {
            Some("Bachelors") => 1.0,
            Some("Masters") | Some("Doctorate") => 1.6,
            _ => 0.0,
        };
        score += match occupation {
            Some("Exec-managerial") | Some("Prof-specialty") => 0.9,
            _ => 0.0,
        };
        if marital_status == Some("Married-civ-spouse") {
            score += 1.5;
        }
        score += self.rng.gen_range(-1.0..1.0);

        Row {
            age,
            workclass: self.choice(WORKCLASS),
            education,
            marital_status,
            occupation,
            relationship,
            race: self.choice(RACE),
            sex,
            capital_gain,
            capital_loss,
            hours_per_week,
            native_country: self.choice(COUNTRY),
            label: u8::from(score > 0.0),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gen_census=info".parse()?),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.missing_rate),
        "missing rate must be within [0, 1]"
    );

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to open {}", args.output.display()))?;
    let mut generator = CensusGenerator::new(args.seed, args.missing_rate);

    let mut positives = 0usize;
    for _ in 0..args.rows {
        let row = generator.generate();
        positives += row.label as usize;
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(
        path = %args.output.display(),
        rows = args.rows,
        positives = positives,
        "Synthetic census written"
    );

    Ok(())
}
