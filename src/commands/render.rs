use crate::api::{output_context, plan_row};
use crate::core::model::RowContext;
use crate::core::preset::load_preset;
use crate::core::table::read_csv;
use crate::core::template::placeholders;
use console::style;
use std::path::Path;

/// Print the prompts one row would be sent, without contacting a provider.
pub fn run(preset: &Path, input: &Path, row: usize) -> Result<(), String> {
    let config = load_preset(preset)?;
    let table = read_csv(input)?;

    let cells = table.rows.get(row).ok_or_else(|| {
        format!(
            "Row {} does not exist ({} has {} data rows)",
            row,
            input.display(),
            table.rows.len()
        )
    })?;
    let ctx = RowContext::new(row, &table.headers, cells, &config.context_columns);

    for call in plan_row(&ctx, &config) {
        let title = match &call.output {
            Some(name) => format!("Output '{}'", name),
            None => format!("Combined prompt ({} outputs)", config.outputs.len()),
        };
        println!("{}", style(title).bold().underlined());
        println!("{}\n", call.prompt);
    }

    let unresolved: Vec<String> = config
        .outputs
        .iter()
        .flat_map(|output| {
            let seen = output_context(output, &ctx);
            placeholders(&output.prompt)
                .into_iter()
                .filter(move |name| {
                    !seen.headers.contains(name) && !seen.context_data.contains_key(name)
                })
                .collect::<Vec<_>>()
        })
        .fold(Vec::new(), |mut names, name| {
            if !names.contains(&name) {
                names.push(name);
            }
            names
        });
    if !unresolved.is_empty() {
        println!(
            "{} {}",
            style("Left as-is (no matching column):").yellow(),
            unresolved.join(", ")
        );
    }

    Ok(())
}
