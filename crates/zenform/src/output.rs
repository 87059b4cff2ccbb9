//! Output formatting: table, JSON, YAML.
//!
//! Table uses `tabled`; structured formats serialize the original data
//! via serde so scripts see every field.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Change reports ───────────────────────────────────────────────────

/// What happened (or would happen) to one manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub kind: String,
    pub name: String,
    pub id: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Fields")]
    fields: String,
    #[tabled(rename = "ID")]
    id: String,
}

fn paint_action(action: &str, color: bool) -> String {
    if !color {
        return action.to_owned();
    }
    match action {
        "create" | "created" | "imported" => action.green().to_string(),
        "update" | "updated" => action.yellow().to_string(),
        "replace" | "missing" | "deleted" | "failed" => action.red().to_string(),
        _ => action.dimmed().to_string(),
    }
}

pub fn render_changes(format: OutputFormat, records: &[ChangeRecord], color: bool) -> String {
    render_list(format, records, |r| ChangeRow {
        kind: r.kind.clone(),
        name: r.name.clone(),
        action: paint_action(&r.action, color),
        fields: r.fields.join(", "),
        id: r.id.clone().unwrap_or_else(|| "-".into()),
    })
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serializable items; `to_row` builds the table view.
pub fn render_list<T, R>(format: OutputFormat, data: &[T], to_row: impl Fn(&T) -> R) -> String
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => render_json(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render one record. The table view lists its top-level fields.
pub fn render_single<T: Serialize>(format: OutputFormat, data: &T) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<FieldRow> = match serde_json::to_value(data) {
                Ok(Value::Object(map)) => map
                    .into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(field, value)| FieldRow {
                        field,
                        value: match value {
                            Value::String(s) => s,
                            other => other.to_string(),
                        },
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => render_json(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("error: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record() -> ChangeRecord {
        ChangeRecord {
            kind: "stack".into(),
            name: "prod".into(),
            id: None,
            action: "update".into(),
            fields: vec!["components".into(), "labels".into()],
        }
    }

    #[test]
    fn json_keeps_every_field() {
        let out = render_changes(OutputFormat::Json, &[record()], false);
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["action"], "update");
        assert_eq!(parsed[0]["fields"][1], "labels");
        assert!(parsed[0]["id"].is_null());
    }

    #[test]
    fn table_without_color_has_plain_actions() {
        let out = render_changes(OutputFormat::Table, &[record()], false);
        assert!(out.contains("components, labels"));
        assert!(out.contains("update"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn single_record_table_skips_nulls() {
        let out = render_single(
            OutputFormat::Table,
            &serde_json::json!({ "name": "prod", "description": null }),
        );
        assert!(out.contains("prod"));
        assert!(!out.contains("description"));
    }
}
