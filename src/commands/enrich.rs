use crate::api::Enricher;
use crate::cli::EnrichArgs;
use crate::core::preset::load_preset;
use crate::core::table::{read_csv, write_csv};
use chrono::Local;
use console::style;
use spinners::{Spinner, Spinners};
use std::path::{Path, PathBuf};

/// Enrich a CSV file with a preset and write the result next to it.
pub async fn run(args: &EnrichArgs) -> Result<(), String> {
    let mut config = load_preset(&args.preset)?;
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if let Some(rows) = args.preview_rows {
        config.preview_row_count = rows;
    }
    if let Some(format) = args.format {
        config.output_format = format.into();
    }

    let table = read_csv(&args.input)?;
    let integrations = super::integrations_path(args.integrations.as_deref())?;
    let enricher = Enricher::from_integrations_file(&integrations)
        .map_err(|e| e.to_string())?
        .concurrency(args.concurrency);

    let mut sp = Spinner::new(
        Spinners::Dots9,
        format!("Enriching rows with '{}'...", config.integration_name),
    );
    let result = match enricher.run(&config, &table.headers, &table.rows).await {
        Ok(result) => {
            sp.stop_with_message("✔ Enrichment finished.".into());
            result
        }
        Err(e) => {
            sp.stop_with_message("✖ Enrichment failed.".into());
            return Err(e.to_string());
        }
    };

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    let headers = result.new_headers.clone().unwrap_or_default();
    let rows = result.new_rows.clone().unwrap_or_default();
    write_csv(&out, &headers, &rows)?;

    println!(
        "{} rows processed, {} rows written to {}",
        style(result.processed_row_count).yellow(),
        style(rows.len()).yellow(),
        style(out.display()).cyan()
    );

    if !result.errors.is_empty() {
        println!(
            "{}",
            style(format!("{} row(s) failed:", result.errors.len()))
                .red()
                .bold()
        );
        for error in &result.errors {
            println!("  row {}: {}", style(error.row_index).yellow(), error.error);
        }
    }

    Ok(())
}

/// `<dir>/<stem>_enriched_<YYYYmmdd_HHMMSS>.csv`
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    input.with_file_name(format!("{}_enriched_{}.csv", stem, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_input() {
        let out = default_output_path(Path::new("/data/products.csv"));
        assert_eq!(out.parent(), Some(Path::new("/data")));
        let name = out.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("products_enriched_"));
        assert!(name.ends_with(".csv"));
        // products_enriched_ + 15-char timestamp + .csv
        assert_eq!(name.len(), "products_enriched_".len() + 15 + 4);
    }
}
