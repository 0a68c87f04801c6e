use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::CleanupDashboardArgs;
use crate::util::write_json_pretty;

// Panels whose original Y values differ by at most this many grid units are
// considered part of the same horizontal band.
const BAND_TOLERANCE: i64 = 2;

const LEGACY_EXPORT_KEYS: [&str; 3] = ["__inputs", "__elements", "__requires"];

pub fn run(args: CleanupDashboardArgs) -> Result<()> {
    cleanup(&args.input, &args.output)
}

pub fn cleanup(input: &Path, output: &Path) -> Result<()> {
    info!(path = %input.display(), "loading dashboard");

    let raw = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let mut dashboard: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in {}", input.display()))?;

    if !dashboard.is_object() {
        bail!("dashboard root is not a JSON object: {}", input.display());
    }

    let panels = take_panels(&mut dashboard);
    info!(total = panels.len(), "found panels");

    let rebuilt = rebuild_panels(panels);

    if let Some(object) = dashboard.as_object_mut() {
        object.insert("panels".to_string(), Value::Array(rebuilt));
    }
    apply_metadata_defaults(&mut dashboard);

    write_json_pretty(output, &dashboard)
        .with_context(|| format!("failed to save cleaned dashboard to {}", output.display()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        "dashboard cleanup complete"
    );

    Ok(())
}

fn take_panels(dashboard: &mut Value) -> Vec<Value> {
    match dashboard.get_mut("panels") {
        Some(value) => match value.take() {
            Value::Array(panels) => panels,
            _ => Vec::new(),
        },
        None => Vec::new(),
    }
}

fn rebuild_panels(panels: Vec<Value>) -> Vec<Value> {
    let (row_panels, data_panels): (Vec<Value>, Vec<Value>) = panels
        .into_iter()
        .partition(|panel| panel.get("type").and_then(Value::as_str) == Some("row"));

    info!(
        data = data_panels.len(),
        rows = row_panels.len(),
        "partitioned panels"
    );

    rebuild_layout(row_panels, data_panels)
}

struct PlacedPanel {
    original_y: i64,
    panel: Value,
}

fn rebuild_layout(row_panels: Vec<Value>, data_panels: Vec<Value>) -> Vec<Value> {
    let repacked = repack_data_panels(data_panels);
    let mut slots: Vec<Option<PlacedPanel>> = repacked.into_iter().map(Some).collect();

    let mut final_panels = Vec::with_capacity(row_panels.len() + slots.len());
    let mut cursor = 0_i64;

    for mut row in row_panels {
        set_row_grid_pos(&mut row, cursor);
        let row_y = cursor;
        final_panels.push(row);
        cursor += 1;

        // A row claims the not-yet-claimed data panels that originally sat at
        // or below its position; each panel is claimed at most once.
        for slot in slots.iter_mut() {
            let claims = slot
                .as_ref()
                .is_some_and(|placed| placed.original_y >= row_y);
            if !claims {
                continue;
            }
            if let Some(mut placed) = slot.take() {
                set_grid_pos_y(&mut placed.panel, cursor);
                cursor += panel_height(&placed.panel);
                final_panels.push(placed.panel);
            }
        }
    }

    // Data panels no row claimed keep stacking at the cursor.
    for mut placed in slots.into_iter().flatten() {
        set_grid_pos_y(&mut placed.panel, cursor);
        cursor += panel_height(&placed.panel);
        final_panels.push(placed.panel);
    }

    final_panels
}

fn repack_data_panels(data_panels: Vec<Value>) -> Vec<PlacedPanel> {
    let mut placed: Vec<PlacedPanel> = data_panels
        .into_iter()
        .map(|panel| PlacedPanel {
            original_y: grid_pos_value(&panel, "y"),
            panel,
        })
        .collect();

    // Stable sort; original relative order is the tie-break for equal Y.
    placed.sort_by_key(|entry| entry.original_y);

    let mut groups: Vec<Vec<PlacedPanel>> = Vec::new();
    let mut current: Vec<PlacedPanel> = Vec::new();
    let mut band_max_y = 0_i64;

    for entry in placed {
        if current.is_empty() || (entry.original_y - band_max_y).abs() <= BAND_TOLERANCE {
            band_max_y = band_max_y.max(entry.original_y);
            current.push(entry);
        } else {
            groups.push(std::mem::take(&mut current));
            band_max_y = entry.original_y;
            current.push(entry);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut repacked = Vec::new();
    let mut cursor = 0_i64;

    for mut group in groups {
        group.sort_by_key(|entry| grid_pos_value(&entry.panel, "x"));
        let band_height = group
            .iter()
            .map(|entry| panel_height(&entry.panel))
            .max()
            .unwrap_or(1);

        for mut entry in group {
            set_grid_pos_y(&mut entry.panel, cursor);
            repacked.push(entry);
        }
        cursor += band_height;
    }

    repacked
}

fn grid_pos_value(panel: &Value, key: &str) -> i64 {
    panel
        .get("gridPos")
        .and_then(|pos| pos.get(key))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn panel_height(panel: &Value) -> i64 {
    panel
        .get("gridPos")
        .and_then(|pos| pos.get("h"))
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

fn set_grid_pos_y(panel: &mut Value, y: i64) {
    let Some(object) = panel.as_object_mut() else {
        return;
    };

    let pos = object.entry("gridPos").or_insert_with(|| json!({}));
    if let Some(pos) = pos.as_object_mut() {
        pos.insert("y".to_string(), Value::from(y));
    }
}

fn set_row_grid_pos(row: &mut Value, y: i64) {
    if let Some(object) = row.as_object_mut() {
        object.insert(
            "gridPos".to_string(),
            json!({ "h": 1, "w": 24, "x": 0, "y": y }),
        );
    }
}

fn apply_metadata_defaults(dashboard: &mut Value) {
    let Some(object) = dashboard.as_object_mut() else {
        return;
    };

    for key in LEGACY_EXPORT_KEYS {
        if object.remove(key).is_some() {
            info!(key = key, "removed export artifact");
        }
    }

    if !object.contains_key("id") {
        object.insert("id".to_string(), Value::Null);
    }

    for (key, default) in required_field_defaults() {
        object.entry(key).or_insert(default);
    }
}

fn required_field_defaults() -> Vec<(String, Value)> {
    vec![
        ("annotations".to_string(), json!({ "list": [] })),
        ("editable".to_string(), json!(true)),
        ("fiscalYearStartMonth".to_string(), json!(0)),
        ("graphTooltip".to_string(), json!(2)),
        ("links".to_string(), json!([])),
        ("liveNow".to_string(), json!(false)),
        ("panels".to_string(), json!([])),
        ("refresh".to_string(), json!("5s")),
        ("schemaVersion".to_string(), json!(38)),
        ("style".to_string(), json!("dark")),
        ("tags".to_string(), json!([])),
        ("templating".to_string(), json!({ "list": [] })),
        ("time".to_string(), json!({ "from": "now-1h", "to": "now" })),
        ("timepicker".to_string(), json!({})),
        ("timezone".to_string(), json!("")),
        ("title".to_string(), json!("TGI Service Dashboard")),
        ("uid".to_string(), json!("tgi-dashboard")),
        ("version".to_string(), json!(1)),
        ("weekStart".to_string(), json!("")),
    ]
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::{Value, json};

    use super::{apply_metadata_defaults, cleanup, rebuild_panels, repack_data_panels};

    fn data_panel(id: u64, x: i64, y: i64, w: i64, h: i64) -> Value {
        json!({
            "id": id,
            "type": "timeseries",
            "title": format!("panel-{id}"),
            "datasource": { "type": "prometheus", "uid": "prom" },
            "gridPos": { "x": x, "y": y, "w": w, "h": h }
        })
    }

    fn row_panel(id: u64, y: i64) -> Value {
        json!({
            "id": id,
            "type": "row",
            "title": format!("row-{id}"),
            "gridPos": { "x": 0, "y": y, "w": 24, "h": 1 }
        })
    }

    fn grid_positions(panels: &[Value]) -> Vec<Value> {
        panels.iter().map(|panel| panel["gridPos"].clone()).collect()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("qna_eval_dashboard_{}_{name}.json", std::process::id()))
    }

    #[test]
    fn repack_groups_panels_within_tolerance_into_one_band() {
        let repacked = repack_data_panels(vec![
            data_panel(1, 0, 0, 12, 8),
            data_panel(2, 12, 1, 12, 8),
            data_panel(3, 0, 10, 24, 6),
        ]);

        // Panels 1 and 2 share a band at y=0; panel 3 starts a new band
        // immediately below the tallest panel of the first.
        assert_eq!(repacked[0].panel["gridPos"]["y"], 0);
        assert_eq!(repacked[1].panel["gridPos"]["y"], 0);
        assert_eq!(repacked[2].panel["gridPos"]["y"], 8);
    }

    #[test]
    fn repack_orders_band_members_left_to_right() {
        let repacked = repack_data_panels(vec![
            data_panel(1, 12, 0, 12, 8),
            data_panel(2, 0, 0, 12, 8),
        ]);

        assert_eq!(repacked[0].panel["id"], 2);
        assert_eq!(repacked[1].panel["id"], 1);
    }

    #[test]
    fn rebuild_preserves_panel_count_and_opaque_fields() {
        let panels = vec![
            row_panel(10, 0),
            data_panel(1, 0, 1, 12, 8),
            data_panel(2, 12, 1, 12, 8),
            data_panel(3, 0, 20, 24, 6),
        ];
        let originals: Vec<Value> = panels.clone();

        let rebuilt = rebuild_panels(panels);
        assert_eq!(rebuilt.len(), originals.len());

        for original in &originals {
            let rebuilt_panel = rebuilt
                .iter()
                .find(|panel| panel["id"] == original["id"])
                .expect("panel should survive rebuild");
            assert_eq!(rebuilt_panel["type"], original["type"]);
            assert_eq!(rebuilt_panel["title"], original["title"]);
            assert_eq!(rebuilt_panel["datasource"], original["datasource"]);
        }
    }

    #[test]
    fn rebuild_is_idempotent_for_single_row_layout() {
        let panels = vec![
            row_panel(10, 0),
            data_panel(1, 0, 1, 12, 8),
            data_panel(2, 12, 1, 12, 8),
        ];

        let first = rebuild_panels(panels);
        let second = rebuild_panels(first.clone());

        assert_eq!(grid_positions(&first), grid_positions(&second));
    }

    #[test]
    fn rebuild_claims_each_panel_exactly_once_across_rows() {
        let panels = vec![
            row_panel(10, 0),
            row_panel(11, 9),
            data_panel(1, 0, 1, 12, 8),
            data_panel(2, 0, 10, 12, 8),
        ];

        let rebuilt = rebuild_panels(panels);
        assert_eq!(rebuilt.len(), 4);

        let ids: Vec<&Value> = rebuilt.iter().map(|panel| &panel["id"]).collect();
        let unique: std::collections::HashSet<String> =
            ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(unique.len(), 4, "no panel may be duplicated: {ids:?}");
    }

    #[test]
    fn rebuild_without_rows_keeps_every_panel() {
        let rebuilt = rebuild_panels(vec![
            data_panel(1, 0, 0, 12, 8),
            data_panel(2, 0, 30, 12, 4),
        ]);

        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt[0]["gridPos"]["y"], 0);
        assert_eq!(rebuilt[1]["gridPos"]["y"], 8);
    }

    #[test]
    fn rebuild_of_empty_panel_list_is_empty() {
        assert!(rebuild_panels(Vec::new()).is_empty());
    }

    #[test]
    fn metadata_defaults_do_not_overwrite_existing_values() {
        let mut dashboard = json!({
            "refresh": "30s",
            "title": "Custom Title",
            "__inputs": [{ "name": "DS" }]
        });

        apply_metadata_defaults(&mut dashboard);

        assert_eq!(dashboard["refresh"], "30s");
        assert_eq!(dashboard["title"], "Custom Title");
        assert!(dashboard.get("__inputs").is_none());
        assert_eq!(dashboard["uid"], "tgi-dashboard");
        assert_eq!(dashboard["schemaVersion"], 38);
        assert_eq!(dashboard["id"], Value::Null);
    }

    #[test]
    fn cleanup_round_trips_a_dashboard_file() {
        let input = temp_path("input");
        let output = temp_path("output");

        let dashboard = json!({
            "title": "TGI",
            "panels": [
                row_panel(10, 0),
                data_panel(1, 0, 1, 12, 8),
                data_panel(2, 12, 3, 12, 8),
            ]
        });
        std::fs::write(&input, serde_json::to_string(&dashboard).expect("serialize"))
            .expect("write input");

        cleanup(&input, &output).expect("cleanup should succeed");

        let raw = std::fs::read_to_string(&output).expect("output should exist");
        let cleaned: Value = serde_json::from_str(&raw).expect("output should parse");

        assert_eq!(cleaned["title"], "TGI");
        assert_eq!(cleaned["uid"], "tgi-dashboard");
        assert_eq!(cleaned["panels"].as_array().map(Vec::len), Some(3));
        assert_eq!(cleaned["panels"][0]["gridPos"], json!({ "h": 1, "w": 24, "x": 0, "y": 0 }));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn cleanup_rejects_invalid_json_without_writing_output() {
        let input = temp_path("broken_input");
        let output = temp_path("broken_output");

        std::fs::write(&input, "{ not json").expect("write input");

        let result = cleanup(&input, &output);
        assert!(result.is_err());
        assert!(!output.exists(), "no partial output may be written");

        let _ = std::fs::remove_file(&input);
    }

    #[test]
    fn cleanup_of_empty_dashboard_populates_defaults() {
        let input = temp_path("empty_input");
        let output = temp_path("empty_output");

        std::fs::write(&input, "{}").expect("write input");

        cleanup(&input, &output).expect("cleanup should succeed");

        let raw = std::fs::read_to_string(&output).expect("output should exist");
        let cleaned: Value = serde_json::from_str(&raw).expect("output should parse");

        assert_eq!(cleaned["panels"], json!([]));
        assert_eq!(cleaned["refresh"], "5s");
        assert_eq!(cleaned["time"], json!({ "from": "now-1h", "to": "now" }));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }
}
