//! form-preview - inspect how a form schema lays out and reacts to values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use form_engine::{EngineConfig, FormController};
use form_schema::{build_field_row_helper_map, group_fields_into_rows, FieldType, FormSchema};

#[derive(Parser, Debug)]
#[command(name = "form-preview", about = "Preview the layout and visibility of a form schema")]
struct Args {
    /// Schema file (.json, .yaml or .yml)
    schema: PathBuf,

    /// Initial values file
    #[arg(long)]
    values: Option<PathBuf>,

    /// Engine configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level; defaults to `general.log_level` of the configuration
    #[arg(long, env = "FORM_PREVIEW_LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let level = log_level(args.log_level.as_deref(), &config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("form_engine={0},form_schema={0},info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    debug!(?config, %level, "Loaded configuration");

    let schema: FormSchema = read_document(&args.schema)?;
    let values: Value = match &args.values {
        Some(path) => read_document(path)?,
        None => Value::Object(Default::default()),
    };

    let form = FormController::mount(schema, values, config).context("invalid form schema")?;
    info!(form_id = %form.schema().id, "Schema is valid");

    print_form(&form);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    EngineConfig::from_yaml(&text).with_context(|| format!("parsing {}", path.display()))
}

/// The command-line level wins over the configured one.
fn log_level(cli: Option<&str>, config: &EngineConfig) -> String {
    cli.map(str::to_string)
        .unwrap_or_else(|| config.general.log_level.clone())
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

fn print_form(form: &FormController) {
    let schema = form.schema();
    if schema.title.is_empty() {
        println!("Form {}", schema.id);
    } else {
        println!("Form {} ({})", schema.id, schema.title);
    }

    for tab_id in schema.tab_ids() {
        println!();
        println!("Tab {}", tab_id);

        let rows = group_fields_into_rows(
            schema
                .fields_in_tab(tab_id)
                .filter(|f| f.field_type != FieldType::Hidden),
        );
        let helper_map = build_field_row_helper_map(&rows);

        for (index, row) in rows.iter().enumerate() {
            let cells: Vec<String> = row
                .fields
                .iter()
                .map(|f| {
                    let mut cell = f.name.clone();
                    if f.required {
                        cell.push('*');
                    }
                    if !form.is_visible(&f.name) {
                        cell.push_str(" (hidden)");
                    }
                    cell
                })
                .collect();
            let helper = row
                .fields
                .first()
                .and_then(|f| helper_map.get(f.name.as_str()).copied())
                .unwrap_or(false);

            println!(
                "  {:>2}. [{} units] {}{}",
                index + 1,
                row.units(),
                cells.join(" | "),
                if helper { "  +helper" } else { "" }
            );
        }
    }

    let conditional: Vec<_> = schema.fields().filter(|f| f.visible_when.is_some()).collect();
    if !conditional.is_empty() {
        println!();
        println!("Visibility");
        for field in conditional {
            let watched = field
                .visible_when
                .as_ref()
                .map(|c| c.field.as_str())
                .unwrap_or_default();
            println!(
                "  {} -> {} (watches {})",
                field.name,
                if form.is_visible(&field.name) { "visible" } else { "hidden" },
                watched
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_falls_back_to_config() {
        let config = EngineConfig::from_yaml("general:\n  log_level: debug\n").unwrap();
        assert_eq!(log_level(None, &config), "debug");
        assert_eq!(log_level(Some("trace"), &config), "trace");
        assert_eq!(log_level(None, &EngineConfig::default()), "info");
    }

    #[test]
    fn test_missing_config_path_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.general.log_level, "info");
    }
}
