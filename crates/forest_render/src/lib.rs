use std::collections::BTreeMap;
use std::fmt::Write as _;

use forest_core::classify::Category;
use forest_core::core_api::{HealOutcome, SaveKind, Session, Summary};
use forest_core::patch::{BatchReport, BuildingHealthEntry};
use forest_core::substitute::SubstitutionReport;
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 18;
const TYPE_COL_WIDTH: usize = 40;
const REPORT_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// Adds the per-type table and the blob listing.
    pub verbose: bool,
}

pub fn render_json_summary(session: &Session, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(summary_json(session)),
    }
}

pub fn render_json_buildings(entries: &[BuildingHealthEntry], limit: Option<usize>) -> JsonValue {
    JsonValue::Array(
        entries
            .iter()
            .enumerate()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(index, entry)| building_to_json(index, entry))
            .collect(),
    )
}

pub fn render_json_batch(operation: &str, report: &BatchReport, hp: Option<f32>) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "operation".to_string(),
        JsonValue::String(operation.to_string()),
    );
    out.insert(
        "hp".to_string(),
        hp.map_or(JsonValue::Null, |v| JsonValue::from(f64::from(v))),
    );
    out.insert("modified".to_string(), JsonValue::from(report.modified));
    out.insert("skipped".to_string(), JsonValue::from(report.skipped));
    out.insert("unchanged".to_string(), JsonValue::from(report.unchanged));
    JsonValue::Object(out)
}

pub fn render_json_heal(outcome: &HealOutcome) -> JsonValue {
    render_json_batch("heal-all", &outcome.report, Some(outcome.target_hp))
}

pub fn render_json_substitution(report: &SubstitutionReport) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "substituted".to_string(),
        JsonValue::from(report.substituted),
    );
    out.insert(
        "kept_unmatched".to_string(),
        JsonValue::from(report.kept_unmatched),
    );
    out.insert(
        "substituted_by_type".to_string(),
        counts_to_json(&report.substituted_by_type),
    );
    out.insert(
        "unused_source_by_type".to_string(),
        counts_to_json(&report.unused_source_by_type),
    );
    JsonValue::Object(out)
}

pub fn render_summary_text(session: &Session, options: TextRenderOptions) -> String {
    let summary = session.summary();
    let mut out = String::new();

    writeln!(&mut out, "{}", kind_title(summary.kind)).expect("writing to String cannot fail");
    writeln!(&mut out, "{}", "=".repeat(REPORT_WIDTH)).expect("writing to String cannot fail");
    labelled(&mut out, "File size", &format_bytes(summary.raw_size));
    labelled(&mut out, "Decoded size", &format_bytes(summary.inner_size));
    labelled(&mut out, "Version", &summary.header.version);
    labelled(
        &mut out,
        "Registered types",
        &summary.header.registered_types.len().to_string(),
    );
    labelled(
        &mut out,
        "Registered props",
        &summary.header.registered_properties.len().to_string(),
    );
    labelled(&mut out, "Object region at", &summary.payload_offset.to_string());
    labelled(&mut out, "Prefix", &format_bytes(summary.prefix_size));
    writeln!(&mut out).expect("writing to String cannot fail");

    labelled(&mut out, "Blobs", &summary.blob_count.to_string());
    labelled(&mut out, "  player", &summary.player_blobs.to_string());
    labelled(&mut out, "  world", &summary.world_blobs.to_string());
    labelled(&mut out, "  unknown", &summary.unknown_blobs.to_string());
    if summary.parse_error_blobs > 0 {
        labelled(
            &mut out,
            "  unparsed",
            &summary.parse_error_blobs.to_string(),
        );
    }
    labelled(&mut out, "Buildings", &session.buildings().len().to_string());
    if !session.unlocated_buildings().is_empty() {
        labelled(
            &mut out,
            "  no hp field",
            &session.unlocated_buildings().len().to_string(),
        );
    }

    if options.verbose {
        let layout = session.layout();
        let layout_status = match layout.validate() {
            Ok(()) => format!("{} regions, contiguous", layout.regions.len()),
            Err(e) => format!("invalid: {e}"),
        };
        labelled(&mut out, "Layout", &layout_status);
        writeln!(&mut out).expect("writing to String cannot fail");
        write_type_table(&mut out, &summary);
        writeln!(&mut out).expect("writing to String cannot fail");
        write_blob_listing(&mut out, session);
    }

    out
}

pub fn render_buildings_text(entries: &[BuildingHealthEntry], limit: Option<usize>) -> String {
    let mut out = String::new();
    writeln!(
        &mut out,
        "{:>5}  {:>10}  {:>10}  {:>10}  GUID",
        "#", "BLOB", "FIELD", "HP"
    )
    .expect("writing to String cannot fail");

    let shown = limit.unwrap_or(usize::MAX);
    for (index, entry) in entries.iter().enumerate().take(shown) {
        writeln!(
            &mut out,
            "{:>5}  {:>10}  {:>10}  {:>10.1}  {}",
            index,
            entry.blob_offset,
            entry.hp_field_offset,
            entry.hp_value,
            entry.guid.as_deref().unwrap_or("-"),
        )
        .expect("writing to String cannot fail");
    }
    if entries.len() > shown {
        writeln!(&mut out, "... {} more", entries.len() - shown)
            .expect("writing to String cannot fail");
    }
    out
}

pub fn render_batch_text(operation: &str, report: &BatchReport, hp: Option<f32>) -> String {
    let mut out = String::new();
    let heading = match hp {
        Some(hp) => format!("{operation}: hp {hp}"),
        None => operation.to_string(),
    };
    writeln!(&mut out, "{heading}").expect("writing to String cannot fail");
    labelled(&mut out, "  modified", &report.modified.to_string());
    labelled(&mut out, "  skipped", &report.skipped.to_string());
    labelled(&mut out, "  unchanged", &report.unchanged.to_string());
    out
}

pub fn render_substitution_text(report: &SubstitutionReport) -> String {
    let mut out = String::new();
    labelled(&mut out, "Substituted", &report.substituted.to_string());
    for (short_type, count) in &report.substituted_by_type {
        writeln!(&mut out, "    {short_type:<TYPE_COL_WIDTH$} {count:>6}")
            .expect("writing to String cannot fail");
    }
    labelled(&mut out, "Kept (no match)", &report.kept_unmatched.to_string());
    if !report.unused_source_by_type.is_empty() {
        writeln!(&mut out, "Unused source blobs:").expect("writing to String cannot fail");
        for (short_type, count) in &report.unused_source_by_type {
            writeln!(&mut out, "    {short_type:<TYPE_COL_WIDTH$} {count:>6}")
                .expect("writing to String cannot fail");
        }
    }
    out
}

fn summary_json(session: &Session) -> JsonMap<String, JsonValue> {
    let summary = session.summary();
    let mut out = JsonMap::new();

    out.insert(
        "kind".to_string(),
        JsonValue::String(summary.kind.as_str().to_string()),
    );
    out.insert("raw_size".to_string(), JsonValue::from(summary.raw_size));
    out.insert(
        "inner_size".to_string(),
        JsonValue::from(summary.inner_size),
    );
    out.insert("header".to_string(), header_to_json(&summary));
    out.insert(
        "payload_offset".to_string(),
        JsonValue::from(summary.payload_offset),
    );
    out.insert(
        "prefix_size".to_string(),
        JsonValue::from(summary.prefix_size),
    );
    out.insert(
        "blob_count".to_string(),
        JsonValue::from(summary.blob_count),
    );

    let mut categories = JsonMap::new();
    categories.insert(
        Category::Player.as_str().to_string(),
        JsonValue::from(summary.player_blobs),
    );
    categories.insert(
        Category::World.as_str().to_string(),
        JsonValue::from(summary.world_blobs),
    );
    categories.insert(
        Category::Unknown.as_str().to_string(),
        JsonValue::from(summary.unknown_blobs),
    );
    categories.insert(
        "parse_error".to_string(),
        JsonValue::from(summary.parse_error_blobs),
    );
    out.insert("categories".to_string(), JsonValue::Object(categories));
    out.insert(
        "type_counts".to_string(),
        counts_to_json(&summary.type_counts),
    );
    out.insert(
        "buildings".to_string(),
        JsonValue::from(session.buildings().len()),
    );
    out.insert(
        "unlocated_buildings".to_string(),
        JsonValue::from(session.unlocated_buildings().len()),
    );

    out
}

fn header_to_json(summary: &Summary) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "version".to_string(),
        JsonValue::String(summary.header.version.clone()),
    );
    m.insert(
        "registered_types".to_string(),
        strings_to_json(&summary.header.registered_types),
    );
    m.insert(
        "registered_properties".to_string(),
        strings_to_json(&summary.header.registered_properties),
    );
    JsonValue::Object(m)
}

fn building_to_json(index: usize, entry: &BuildingHealthEntry) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("index".to_string(), JsonValue::from(index));
    m.insert("blob_offset".to_string(), JsonValue::from(entry.blob_offset));
    m.insert(
        "hp_field_offset".to_string(),
        JsonValue::from(entry.hp_field_offset),
    );
    m.insert(
        "hp".to_string(),
        JsonValue::from(f64::from(entry.hp_value)),
    );
    m.insert(
        "guid".to_string(),
        entry
            .guid
            .as_ref()
            .map_or(JsonValue::Null, |g| JsonValue::String(g.clone())),
    );
    JsonValue::Object(m)
}

fn strings_to_json(values: &[String]) -> JsonValue {
    JsonValue::Array(values.iter().cloned().map(JsonValue::String).collect())
}

fn counts_to_json(counts: &BTreeMap<String, usize>) -> JsonValue {
    JsonValue::Object(
        counts
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(*v)))
            .collect(),
    )
}

fn write_type_table(out: &mut String, summary: &Summary) {
    let mut rows: Vec<(&String, &usize)> = summary.type_counts.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    writeln!(out, "{:<TYPE_COL_WIDTH$} {:>6}", "TYPE", "COUNT")
        .expect("writing to String cannot fail");
    for (short_type, count) in rows {
        writeln!(out, "{short_type:<TYPE_COL_WIDTH$} {count:>6}")
            .expect("writing to String cannot fail");
    }
}

fn write_blob_listing(out: &mut String, session: &Session) {
    let table = session.classification();
    writeln!(
        out,
        "{:>5}  {:>10}  {:>8}  {:<7}  TYPE",
        "#", "OFFSET", "SIZE", "CLASS"
    )
    .expect("writing to String cannot fail");
    for (index, blob) in session.blobs().iter().enumerate() {
        writeln!(
            out,
            "{:>5}  {:>10}  {:>8}  {:<7}  {}",
            index,
            blob.start_offset,
            blob.len(),
            table.classify(blob.primary_type()).as_str(),
            blob.primary_type(),
        )
        .expect("writing to String cannot fail");
    }
}

fn labelled(out: &mut String, label: &str, value: &str) {
    writeln!(out, "{:<LABEL_WIDTH$}{}", format!("{label}:"), value)
        .expect("writing to String cannot fail");
}

fn kind_title(kind: SaveKind) -> &'static str {
    match kind {
        SaveKind::Resume => "THE FOREST RESUME SAVE",
        SaveKind::Client => "THE FOREST CLIENT SAVE",
    }
}

fn format_bytes(n: usize) -> String {
    format!("{} bytes", format_number_with_commas(n))
}

fn format_number_with_commas(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
