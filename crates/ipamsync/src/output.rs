//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one key per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use ipamsync_core::{Changeset, Entity, FieldDiff, SyncRecord};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single item; table format uses the pre-formatted `detail_fn`.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
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

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Serialize(e.to_string()))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Serialize(e.to_string()))
}

// ── Row types ────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct EntityRow {
    #[tabled(rename = "ID")]
    pub id: u64,
    #[tabled(rename = "Type")]
    pub entity_type: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "CIDR / Address")]
    pub network: String,
    #[tabled(rename = "Parent")]
    pub parent: String,
}

impl From<&Entity> for EntityRow {
    fn from(e: &Entity) -> Self {
        let network = e
            .property(e.entity_type.prefix_property())
            .or_else(|| e.property("address"))
            .or_else(|| e.property("start"))
            .unwrap_or("-")
            .to_owned();
        Self {
            id: e.id.0,
            entity_type: e.entity_type.to_string(),
            name: e.name().to_owned(),
            network,
            parent: e.parent_id.map_or_else(|| "-".into(), |p| p.to_string()),
        }
    }
}

/// One line of a rendered changeset.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
pub struct ChangeRow {
    #[tabled(rename = "Action")]
    pub action: &'static str,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Details")]
    pub details: String,
}

impl ChangeRow {
    fn from_record(action: &'static str, record: &SyncRecord, details: String) -> Self {
        Self {
            action,
            kind: record.key.kind.to_string(),
            key: record.key.value.clone(),
            status: record.status.to_string(),
            details,
        }
    }
}

fn describe_diff(diff: &FieldDiff) -> String {
    diff.0
        .iter()
        .map(|(field, change)| {
            format!(
                "{field}: {} -> {}",
                change.from.as_deref().unwrap_or("∅"),
                change.to.as_deref().unwrap_or("∅")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Flatten a changeset into rows: creates in apply order, then updates,
/// then orphans. Unchanged keys are omitted.
pub fn changeset_rows(changeset: &Changeset) -> Vec<ChangeRow> {
    let mut rows: Vec<ChangeRow> = changeset
        .creates_in_order()
        .into_iter()
        .map(|r| ChangeRow::from_record("create", r, r.description.clone()))
        .collect();

    rows.extend(
        changeset
            .update
            .values()
            .map(|u| ChangeRow::from_record("update", &u.record, describe_diff(&u.diff))),
    );

    rows.extend(
        changeset
            .orphans
            .values()
            .map(|r| ChangeRow::from_record("orphan", r, r.description.clone())),
    );
    rows
}

// ── Summary line ─────────────────────────────────────────────────────

/// `label: n` pairs, highlighted when non-zero and color is on.
pub fn summary_line(pairs: &[(&str, usize)], color: bool) -> String {
    pairs
        .iter()
        .map(|(label, n)| {
            let value = n.to_string();
            if color && *n > 0 {
                format!("{label}: {}", value.bold())
            } else if color {
                format!("{label}: {}", value.dimmed())
            } else {
                format!("{label}: {value}")
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}
