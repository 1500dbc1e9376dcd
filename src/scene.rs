use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::SetMinMax;
use crate::color;
use crate::dataset::Grid;
use crate::pairs::pair_key;

/// Smallest cell edge we will draw, in pixels.
pub const CELL_MIN: f64 = 28.0;
/// Largest cell edge we will draw, in pixels.
pub const CELL_MAX: f64 = 64.0;
/// Column labels rotate once cells get narrower than this.
pub const ROTATE_BELOW: f64 = 46.0;
/// Width from which cells are sized when the caller gives none.
pub const DEFAULT_VIEWPORT: f64 = 960.0;

pub const MARGIN_LEFT: f64 = 110.0;
pub const MARGIN_TOP: f64 = 96.0;
pub const RIGHT_PAD: f64 = 24.0;
pub const LEGEND_GAP: f64 = 18.0;
pub const LEGEND_HEIGHT: f64 = 12.0;
pub const LEGEND_LABEL_H: f64 = 16.0;
pub const BOTTOM_PAD: f64 = 8.0;

/// Resolved geometry for one scene: uniform square cells sized from the
/// available width and clamped to `[CELL_MIN, CELL_MAX]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub rows: usize,
    pub cols: usize,
    pub cell: f64,
    pub rotate_cols: bool,
    pub label_budget: usize,
    pub width: f64,
    pub height: f64,
}

/// Computes the layout for a `rows x cols` grid fitted into `avail_width`
/// pixels of viewport.
pub fn layout(rows: usize, cols: usize, avail_width: f64) -> Layout {
    let avail = if avail_width.is_finite() && avail_width > 0.0 {
        avail_width
    } else {
        DEFAULT_VIEWPORT
    };
    let cell = if cols == 0 {
        CELL_MIN
    } else {
        ((avail - MARGIN_LEFT - RIGHT_PAD) / cols as f64).clamp(CELL_MIN, CELL_MAX)
    };
    let mut label_budget = (cell / 6.0) as usize;
    label_budget.setmax(3);
    Layout {
        rows,
        cols,
        cell,
        rotate_cols: cell < ROTATE_BELOW,
        label_budget,
        width: MARGIN_LEFT + cols as f64 * cell + RIGHT_PAD,
        height: MARGIN_TOP
            + rows as f64 * cell
            + LEGEND_GAP
            + LEGEND_HEIGHT
            + LEGEND_LABEL_H
            + BOTTOM_PAD,
    }
}

/// Shortens a label to the layout's character budget, marking the cut with
/// an ellipsis. The full text stays available through the cell tooltip.
pub fn truncate_label(name: &str, budget: usize) -> String {
    if name.chars().count() <= budget {
        return name.to_string();
    }
    let mut out: String = name.chars().take(budget).collect();
    out.push('…');
    out
}

/// One heatmap cell. Geometry is derived from the indices and the layout;
/// the cell itself only knows its identity and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub man_index: usize,
    pub woman_index: usize,
    pub key: String,
    pub value: Option<f64>,
    pub fill: String,
}

/// The full heatmap scene: rosters, geometry, and one cell per matchup in
/// row-major order.
#[derive(Debug, Clone)]
pub struct HeatmapScene {
    pub men: Vec<String>,
    pub women: Vec<String>,
    pub layout: Layout,
    pub cells: Vec<Cell>,
}

/// Keys that changed between two scene value maps, joined by pair identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenePatch {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl ScenePatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// How a grid was folded into the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneUpdate {
    /// The scene was (re)built from scratch: first data, or the roster changed.
    Rebuilt,
    /// The roster matched, so cells were patched in place.
    Patched(ScenePatch),
}

/// Joins two value maps by pair key and reports additions, value changes
/// and removals, each in sorted key order.
pub fn diff_values(
    old: &FxHashMap<String, Option<f64>>,
    new: &FxHashMap<String, Option<f64>>,
) -> ScenePatch {
    let mut patch = ScenePatch::default();
    for key in old.keys().sorted() {
        if !new.contains_key(key) {
            patch.removed.push(key.clone());
        }
    }
    for key in new.keys().sorted() {
        match old.get(key) {
            None => patch.added.push(key.clone()),
            Some(before) if before != &new[key] => patch.updated.push(key.clone()),
            Some(_) => {}
        }
    }
    patch
}

impl HeatmapScene {
    /// Builds a fresh scene for `grid`, sized for `avail_width`.
    pub fn build(grid: &Grid, avail_width: f64) -> HeatmapScene {
        let layout = layout(grid.rows(), grid.cols(), avail_width);
        let cells = scene_cells(grid);
        HeatmapScene {
            men: grid.men.clone(),
            women: grid.women.clone(),
            layout,
            cells,
        }
    }

    /// Whether `grid` covers the same participants, in the same order, as
    /// this scene. Anything else forces a rebuild instead of a patch.
    pub fn same_roster(&self, grid: &Grid) -> bool {
        self.men == grid.men && self.women == grid.women
    }

    fn value_map(&self) -> FxHashMap<String, Option<f64>> {
        self.cells
            .iter()
            .map(|c| (c.key.clone(), c.value))
            .collect()
    }

    /// Applies a same-roster grid to the existing cells and reports what
    /// changed.
    pub fn patch(&mut self, grid: &Grid) -> ScenePatch {
        let before = self.value_map();
        for cell in &mut self.cells {
            let v = grid.value(cell.man_index, cell.woman_index);
            cell.value = Some(v);
            cell.fill = color::fill_hex(cell.value);
        }
        diff_values(&before, &self.value_map())
    }

    /// Recomputes the geometry for a new width. Cell values reset to the
    /// neutral state until the next dataset is applied.
    pub fn relayout(&mut self, avail_width: f64) {
        self.layout = layout(self.men.len(), self.women.len(), avail_width);
        for cell in &mut self.cells {
            cell.value = None;
            cell.fill = color::fill_hex(None);
        }
    }
}

fn scene_cells(grid: &Grid) -> Vec<Cell> {
    let mut cells = Vec::with_capacity(grid.cell_count());
    for (mi, man) in grid.men.iter().enumerate() {
        for (wi, woman) in grid.women.iter().enumerate() {
            let value = Some(grid.value(mi, wi));
            cells.push(Cell {
                man_index: mi,
                woman_index: wi,
                key: pair_key(man, woman),
                value,
                fill: color::fill_hex(value),
            });
        }
    }
    cells
}

/// Reconciles a grid into the shared scene slot: rebuild when there is no
/// scene yet or the roster moved, patch otherwise.
pub fn apply(scene: &mut Option<HeatmapScene>, grid: &Grid, avail_width: f64) -> SceneUpdate {
    match scene {
        Some(s) if s.same_roster(grid) => SceneUpdate::Patched(s.patch(grid)),
        _ => {
            *scene = Some(HeatmapScene::build(grid, avail_width));
            SceneUpdate::Rebuilt
        }
    }
}
