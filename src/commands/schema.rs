use crate::core::preset::load_preset;
use crate::core::schema::{combined_schema, output_schema};
use console::style;
use serde_json::Value;
use std::path::Path;

/// Print the response schemas a preset sends along with its prompts.
pub fn run(preset: &Path) -> Result<(), String> {
    let config = load_preset(preset)?;

    if config.combine_outputs {
        println!("{}", style("Combined schema").bold().underlined());
        return print_schema(&combined_schema(&config.outputs));
    }

    for output in &config.outputs {
        println!("{}", style(format!("Output '{}'", output.name)).bold().underlined());
        match output_schema(output) {
            Some(schema) => print_schema(&schema)?,
            None => println!(
                "{}",
                style(format!("(plain {} reply, no schema)", output.output_type.as_str())).dim()
            ),
        }
    }
    Ok(())
}

fn print_schema(schema: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(schema).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}
