//! CLI Plugins Command
//!
//! Lists registered generation plugins and their request schemas.

use anyhow::Result;

use genforge_plugins::PluginRegistry;

use crate::terminal_output::{note_warn, render_table, Column};

pub fn run(registry: &PluginRegistry, as_json: bool) -> Result<()> {
    let descriptors = registry.descriptors();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    if descriptors.is_empty() {
        note_warn("No plugins registered; configure provider API keys in config.yaml");
        return Ok(());
    }

    let columns = [
        Column::new("ID"),
        Column::new("Name"),
        Column::new("Description").max_width(60),
        Column::new("Required"),
    ];
    let rows: Vec<Vec<String>> = descriptors
        .iter()
        .map(|d| {
            let required = d.request_schema["required"]
                .as_array()
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(|f| f.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            vec![d.id.clone(), d.name.clone(), d.description.clone(), required]
        })
        .collect();

    println!("\nRegistered plugins\n");
    print!("{}", render_table(&columns, &rows));
    Ok(())
}
