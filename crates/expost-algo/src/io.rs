//! Result-table persistence.
//!
//! Tables are first written to a stage subdirectory named after the producing
//! engine and then copied to the requested path, so partially written files
//! never shadow a previous good output. The format follows the output
//! extension: `.csv` or `.parquet`.

use std::{
    ffi::OsStr,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use polars::prelude::{CsvWriter, DataFrame, ParquetWriter, SerWriter};

#[derive(Debug, Clone, Copy)]
pub enum OutputStage {
    CostLedger,
    UnitCosts,
    FlowTrace,
    Indicators,
}

impl OutputStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStage::CostLedger => "cost-ledger",
            OutputStage::UnitCosts => "unit-costs",
            OutputStage::FlowTrace => "flow-trace",
            OutputStage::Indicators => "indicators",
        }
    }
}

pub fn staged_output_path(output: &Path, stage: &str) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output.file_name().unwrap_or_else(|| OsStr::new("output"));
    parent.join(stage).join(file_name)
}

pub fn persist_dataframe(df: &mut DataFrame, output: &Path, stage: OutputStage) -> Result<()> {
    let staged = staged_output_path(output, stage.as_str());
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }

    let mut file = File::create(&staged)
        .with_context(|| format!("creating output file '{}'", staged.display()))?;
    match staged
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("parquet") => ParquetWriter::new(&mut file)
            .finish(df)
            .map(|_| ())
            .context("writing Parquet output")?,
        Some("csv") => CsvWriter::new(&mut file)
            .finish(df)
            .context("writing CSV output")?,
        _ => {
            return Err(anyhow!(
                "unsupported output extension for {}; use .csv or .parquet",
                staged.display()
            ))
        }
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    fs::copy(&staged, output)
        .with_context(|| format!("copying {} to {}", staged.display(), output.display()))?;
    Ok(())
}
