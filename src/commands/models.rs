use crate::api::registry_from_integrations;
use crate::core::config::load_integrations;
use console::style;
use std::path::Path;

/// List configured integrations, their readiness and their models.
pub fn run(integrations: Option<&Path>, only: Option<&str>) -> Result<(), String> {
    let path = super::integrations_path(integrations)?;
    let configs = load_integrations(&path)?;
    let registry = registry_from_integrations(&configs).map_err(|e| e.to_string())?;

    if registry.is_empty() {
        println!("No integrations defined in {}", style(path.display()).cyan());
        return Ok(());
    }
    if let Some(name) = only {
        if registry.get(name).is_none() {
            return Err(format!("No integration named '{}'", name));
        }
    }

    for name in registry.names().filter(|n| only.map_or(true, |o| o == *n)) {
        let Some(provider) = registry.get(name) else {
            continue;
        };
        let kind = configs
            .get(name)
            .map(|c| c.provider_kind())
            .unwrap_or_default();
        let status = if provider.is_configured() {
            style("ready").green()
        } else {
            style("missing API key").red()
        };
        println!("{} ({}) - {}", style(name).bold(), style(kind).cyan(), status);

        let models = provider.model_list();
        if models.is_empty() {
            println!("  {}", style("(no model list, pass any model name)").dim());
        }
        for model in models {
            println!("  - {}", model);
        }
    }
    Ok(())
}
