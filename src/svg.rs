use svg::Document;
use svg::node::element::{Group, Rectangle, Style, Text, Title};

use crate::color;
use crate::scene::{self, HeatmapScene};

const LEGEND_WIDTH: f64 = 240.0;
const LEGEND_STEPS: usize = 48;

const SCENE_CSS: &str = "\
rect.cell { stroke: #ffffff; stroke-width: 1; transition: fill 250ms ease; }\n\
text.row-label, text.col-label { font-family: sans-serif; font-size: 12px; fill: #333333; }\n\
text.legend-label { font-family: sans-serif; font-size: 11px; fill: #555555; }";

/// Escapes text for XML content and attribute values.
fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn tooltip(man: &str, woman: &str, value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{} + {}: {:.1}%", man, woman, v * 100.0),
        None => format!("{} + {}: no data", man, woman),
    }
}

fn cell_rect(scene: &HeatmapScene, cell: &scene::Cell) -> Rectangle {
    let size = scene.layout.cell;
    let x = scene::MARGIN_LEFT + cell.woman_index as f64 * size;
    let y = scene::MARGIN_TOP + cell.man_index as f64 * size;
    let tip = tooltip(
        &scene.men[cell.man_index],
        &scene.women[cell.woman_index],
        cell.value,
    );
    Rectangle::new()
        .set("class", "cell")
        .set("x", x)
        .set("y", y)
        .set("width", size)
        .set("height", size)
        .set("fill", cell.fill.clone())
        .set("data-key", esc(&cell.key))
        .set(
            "onmouseover",
            "this.setAttribute('stroke', '#1a1a1a'); this.setAttribute('stroke-width', 3)",
        )
        .set(
            "onmouseout",
            "this.setAttribute('stroke', '#ffffff'); this.setAttribute('stroke-width', 1)",
        )
        .add(Title::new(esc(&tip)))
}

fn row_labels(scene: &HeatmapScene) -> Group {
    let size = scene.layout.cell;
    let mut group = Group::new().set("class", "rows");
    for (mi, man) in scene.men.iter().enumerate() {
        let shown = scene::truncate_label(man, scene.layout.label_budget);
        let label = Text::new(esc(&shown))
            .set("class", "row-label")
            .set("x", scene::MARGIN_LEFT - 8.0)
            .set("y", scene::MARGIN_TOP + mi as f64 * size + size / 2.0 + 4.0)
            .set("text-anchor", "end")
            .add(Title::new(esc(man)));
        group = group.add(label);
    }
    group
}

fn col_labels(scene: &HeatmapScene) -> Group {
    let size = scene.layout.cell;
    let mut group = Group::new().set("class", "cols");
    for (wi, woman) in scene.women.iter().enumerate() {
        let shown = scene::truncate_label(woman, scene.layout.label_budget);
        let x = scene::MARGIN_LEFT + wi as f64 * size + size / 2.0;
        let y = scene::MARGIN_TOP - 10.0;
        let mut label = Text::new(esc(&shown))
            .set("class", "col-label")
            .set("x", x)
            .set("y", y);
        if scene.layout.rotate_cols {
            label = label
                .set("text-anchor", "start")
                .set("transform", format!("rotate(-45 {} {})", x, y));
        } else {
            label = label.set("text-anchor", "middle");
        }
        group = group.add(label.add(Title::new(esc(woman))));
    }
    group
}

fn legend(scene: &HeatmapScene) -> Group {
    let y0 = scene::MARGIN_TOP + scene.layout.rows as f64 * scene.layout.cell + scene::LEGEND_GAP;
    let step = LEGEND_WIDTH / LEGEND_STEPS as f64;
    let mut group = Group::new().set("class", "legend");
    for i in 0..LEGEND_STEPS {
        let t = (i as f64 + 0.5) / LEGEND_STEPS as f64;
        group = group.add(
            Rectangle::new()
                .set("x", scene::MARGIN_LEFT + i as f64 * step)
                // A hair of overlap so the strip reads as one bar.
                .set("width", step + 0.5)
                .set("y", y0)
                .set("height", scene::LEGEND_HEIGHT)
                .set("fill", color::heat_hex(t)),
        );
    }
    let label_y = y0 + scene::LEGEND_HEIGHT + 12.0;
    group = group.add(
        Text::new("0%")
            .set("class", "legend-label")
            .set("x", scene::MARGIN_LEFT)
            .set("y", label_y)
            .set("text-anchor", "start"),
    );
    group.add(
        Text::new("100%")
            .set("class", "legend-label")
            .set("x", scene::MARGIN_LEFT + LEGEND_WIDTH)
            .set("y", label_y)
            .set("text-anchor", "end"),
    )
}

/// Renders a heatmap scene into a standalone SVG document string.
pub fn render_scene(scene: &HeatmapScene) -> String {
    let width = scene
        .layout
        .width
        .max(scene::MARGIN_LEFT + LEGEND_WIDTH + scene::RIGHT_PAD);
    let height = scene.layout.height;
    let mut document = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0.0, 0.0, width, height))
        .add(Style::new(SCENE_CSS));

    let mut cells = Group::new().set("class", "cells");
    for cell in &scene.cells {
        cells = cells.add(cell_rect(scene, cell));
    }
    document = document
        .add(cells)
        .add(row_labels(scene))
        .add(col_labels(scene))
        .add(legend(scene));
    document.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Grid, WeekDataset};
    use serde_json::json;

    fn demo_scene(
        men: &[&str],
        women: &[&str],
        matrix: serde_json::Value,
        width: f64,
    ) -> HeatmapScene {
        let ds: WeekDataset = serde_json::from_value(json!({
            "men": men, "women": women, "probabilities": matrix,
        }))
        .unwrap();
        HeatmapScene::build(&Grid::build(&ds), width)
    }

    #[test]
    fn test_render_scene_draws_every_cell() {
        let s = demo_scene(
            &["Adam", "Carl"],
            &["Bella", "Dana"],
            json!([[0.0, 0.2], [1.0, 0.5]]),
            960.0,
        );
        let out = render_scene(&s);
        assert!(out.contains("<svg"));
        assert_eq!(out.matches("class=\"cell\"").count(), 4);
        assert!(out.contains("#ff0000"));
        assert!(out.contains("#008000"));
        assert!(out.contains("data-key=\"adam+bella\""));
        assert!(out.contains("Adam + Bella: 0.0%"));
        assert!(out.contains("Carl + Dana: 50.0%"));
    }

    #[test]
    fn test_legend_is_annotated() {
        let s = demo_scene(&["A"], &["B"], json!([[0.5]]), 960.0);
        let out = render_scene(&s);
        assert!(out.contains(">0%</text>"));
        assert!(out.contains(">100%</text>"));
    }

    #[test]
    fn test_narrow_cells_rotate_column_labels() {
        let men: Vec<String> = (0..12).map(|i| format!("M{}", i)).collect();
        let women: Vec<String> = (0..12).map(|i| format!("W{}", i)).collect();
        let men_ref: Vec<&str> = men.iter().map(String::as_str).collect();
        let women_ref: Vec<&str> = women.iter().map(String::as_str).collect();

        let narrow = demo_scene(&men_ref, &women_ref, json!([]), 400.0);
        assert!(narrow.layout.rotate_cols);
        assert!(render_scene(&narrow).contains("rotate(-45"));

        let wide = demo_scene(&men_ref, &women_ref, json!([]), 2000.0);
        assert!(!wide.layout.rotate_cols);
        assert!(!render_scene(&wide).contains("rotate(-45"));
    }

    #[test]
    fn test_long_labels_truncate_but_keep_full_tooltip() {
        let s = demo_scene(&["Maximiliano"], &["B"], json!([[0.5]]), 100.0);
        assert_eq!(s.layout.label_budget, 4);
        let out = render_scene(&s);
        assert!(out.contains("Maxi…"));
        assert!(out.contains("<title>Maximiliano</title>"));
    }

    #[test]
    fn test_neutral_cells_after_relayout() {
        let mut s = demo_scene(&["A"], &["B"], json!([[0.5]]), 960.0);
        s.relayout(500.0);
        let out = render_scene(&s);
        assert!(out.contains(crate::color::NEUTRAL_HEX));
        assert!(out.contains("A + B: no data"));
    }

    #[test]
    fn test_names_are_xml_escaped() {
        let s = demo_scene(&["A&B <jr>"], &["CD"], json!([[0.5]]), 960.0);
        let out = render_scene(&s);
        assert!(out.contains("A&amp;B &lt;jr&gt;"));
        assert!(!out.contains("<jr>"));
    }
}
