//! Shared board state behind the web handlers: which weeks exist, which
//! week is on screen, the live heatmap scene, and the debounced viewport
//! relayout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

use crate::ceremony;
use crate::dataset::Grid;
use crate::history::History;
use crate::scene::{self, DEFAULT_VIEWPORT, HeatmapScene, SceneUpdate};
use crate::source::{Source, WeekBundle};
use crate::svg;

/// How long a burst of viewport changes may keep postponing the relayout.
pub const RELAYOUT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Everything one week selection produced, ready for the page handlers.
#[derive(Debug, Clone)]
pub struct WeekView {
    pub bundle: WeekBundle,
    pub grid: Grid,
    pub svg: String,
    pub ceremony_html: String,
    pub update: SceneUpdate,
}

#[derive(Default)]
struct BoardState {
    weeks: Vec<u64>,
    selected: Option<u64>,
    history: History,
    scene: Option<HeatmapScene>,
    width: f64,
}

struct RelayoutState {
    deadline: Option<Instant>,
    width: f64,
    worker: bool,
    rebuilds: u64,
}

/// The matchup board. One instance is shared by all request handlers.
pub struct Board {
    source: Source,
    state: Mutex<BoardState>,
    relayout: Mutex<RelayoutState>,
    /// Selection tickets. A selection only commits to the shared scene if
    /// no newer selection started while it was fetching.
    epoch: AtomicU64,
    boot: OnceCell<Vec<u64>>,
}

impl Board {
    pub fn new(source: Source) -> Board {
        Board {
            source,
            state: Mutex::new(BoardState {
                width: DEFAULT_VIEWPORT,
                ..BoardState::default()
            }),
            relayout: Mutex::new(RelayoutState {
                deadline: None,
                width: DEFAULT_VIEWPORT,
                worker: false,
                rebuilds: 0,
            }),
            epoch: AtomicU64::new(0),
            boot: OnceCell::new(),
        }
    }

    /// Discovers the season once: prefetches every week and seeds the pair
    /// history so first-time pairs can be flagged from any entry point.
    /// Subsequent calls return the cached week list.
    pub async fn boot(&self) -> Result<&[u64]> {
        let weeks = self
            .boot
            .get_or_try_init(|| async {
                let bundles = self.source.prefetch().await?;
                let mut state = self.state.lock().await;
                for b in &bundles {
                    state.history.record(b.week as usize, &b.ceremony.pairs);
                }
                state.weeks = bundles.iter().map(|b| b.week).collect();
                Ok::<_, anyhow::Error>(state.weeks.clone())
            })
            .await?;
        Ok(weeks)
    }

    pub async fn weeks(&self) -> Result<Vec<u64>> {
        Ok(self.boot().await?.to_vec())
    }

    pub async fn last_week(&self) -> Result<Option<u64>> {
        Ok(self.boot().await?.last().copied())
    }

    pub async fn selected_week(&self) -> Option<u64> {
        self.state.lock().await.selected
    }

    /// Fetches a week and renders it. Always answers with that week's
    /// content; the shared scene only moves when this is still the newest
    /// selection by the time the fetch lands.
    pub async fn select_week(&self, week: u64) -> Result<Option<WeekView>> {
        self.boot().await?;
        let ticket = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.render_week(week, ticket).await
    }

    async fn render_week(&self, week: u64, ticket: u64) -> Result<Option<WeekView>> {
        let Some(bundle) = self.source.week_bundle(week).await? else {
            return Ok(None);
        };
        let grid = Grid::build(&bundle.dataset);

        let mut state = self.state.lock().await;
        state.history.record(week as usize, &bundle.ceremony.pairs);
        let prior = state.history.prior(week as usize);
        let ceremony_html = ceremony::render_table(&bundle.ceremony, &prior, &grid.key_values())?;

        let (update, svg) = if self.epoch.load(Ordering::SeqCst) == ticket {
            state.selected = Some(week);
            let width = state.width;
            let update = scene::apply(&mut state.scene, &grid, width);
            let svg = match &state.scene {
                Some(s) => svg::render_scene(s),
                None => String::new(),
            };
            (update, svg)
        } else {
            // A newer selection overtook this one. Render privately and
            // leave the shared scene alone.
            let scene = HeatmapScene::build(&grid, state.width);
            (SceneUpdate::Rebuilt, svg::render_scene(&scene))
        };

        Ok(Some(WeekView {
            bundle,
            grid,
            svg,
            ceremony_html,
            update,
        }))
    }

    /// Notes a new viewport width. The relayout itself runs once the burst
    /// has been quiet for [`RELAYOUT_DEBOUNCE`].
    pub async fn request_relayout(self: &Arc<Self>, width: f64) {
        let mut r = self.relayout.lock().await;
        r.width = width;
        r.deadline = Some(Instant::now() + RELAYOUT_DEBOUNCE);
        if !r.worker {
            r.worker = true;
            let board = Arc::clone(self);
            tokio::spawn(async move { board.relayout_worker().await });
        }
    }

    async fn relayout_worker(self: Arc<Self>) {
        loop {
            let deadline = {
                let mut r = self.relayout.lock().await;
                match r.deadline {
                    Some(d) => d,
                    None => {
                        r.worker = false;
                        return;
                    }
                }
            };
            tokio::time::sleep_until(deadline).await;

            let due_width = {
                let mut r = self.relayout.lock().await;
                match r.deadline {
                    // Another request pushed the deadline while we slept;
                    // go back to waiting.
                    Some(d) if d > Instant::now() => None,
                    Some(_) => {
                        r.deadline = None;
                        Some(r.width)
                    }
                    None => None,
                }
            };
            if let Some(width) = due_width {
                let mut state = self.state.lock().await;
                state.width = width;
                if let Some(scene) = &mut state.scene {
                    scene.relayout(width);
                }
                drop(state);
                self.relayout.lock().await.rebuilds += 1;
            }
        }
    }

    /// How many debounced relayouts have actually run.
    pub async fn relayout_rebuilds(&self) -> u64 {
        self.relayout.lock().await.rebuilds
    }

    pub async fn viewport_width(&self) -> f64 {
        self.state.lock().await.width
    }

    /// The current shared scene rendered as SVG, if any week has been
    /// committed yet.
    pub async fn board_svg(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.scene.as_ref().map(svg::render_scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &std::path::Path, name: &str, doc: &serde_json::Value) {
        std::fs::write(dir.join(name), serde_json::to_string(doc).unwrap()).unwrap();
    }

    fn season_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "data_week_1.json",
            &json!({
                "men": ["A", "B"],
                "women": ["X", "Y"],
                "probabilities": [[0.5, 0.5], [0.5, 0.5]],
                "ceremony": {"pairs": [{"man": "A", "woman": "X"}], "result": 1},
            }),
        );
        write(
            dir.path(),
            "data_week_2.json",
            &json!({
                "men": ["A", "B"],
                "women": ["X", "Y"],
                "probabilities": [[1.0, 0.0], [0.0, 1.0]],
                "ceremony": {"pairs": [{"man": "A", "woman": "X"}, {"man": "B", "woman": "Y"}], "result": 2},
            }),
        );
        dir
    }

    fn board(dir: &tempfile::TempDir) -> Arc<Board> {
        Arc::new(Board::new(Source::dir(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn test_boot_discovers_weeks_once() {
        let dir = season_dir();
        let board = board(&dir);
        assert_eq!(board.weeks().await.unwrap(), vec![1, 2]);
        assert_eq!(board.last_week().await.unwrap(), Some(2));

        // New files after boot are not picked up by the cached list.
        write(dir.path(), "data_week_3.json", &json!({"men": [], "women": []}));
        assert_eq!(board.weeks().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_select_week_commits_then_patches() {
        let dir = season_dir();
        let board = board(&dir);

        let v1 = board.select_week(1).await.unwrap().unwrap();
        assert_eq!(v1.update, SceneUpdate::Rebuilt);
        assert!(v1.svg.contains("data-key=\"a+x\""));
        assert_eq!(board.selected_week().await, Some(1));
        // Week 1 seats A+X for the first time.
        assert!(v1.ceremony_html.contains("NEW"));

        let v2 = board.select_week(2).await.unwrap().unwrap();
        match &v2.update {
            SceneUpdate::Patched(p) => {
                assert!(p.added.is_empty() && p.removed.is_empty());
                assert_eq!(p.updated.len(), 4);
            }
            other => panic!("expected a patch, got {:?}", other),
        }
        assert_eq!(board.selected_week().await, Some(2));
        // A+X was seated in week 1, so in week 2 only B+Y is new, and the
        // certain pairs read as confirmed.
        assert!(v2.ceremony_html.contains("CONFIRMED"));

        assert!(board.select_week(9).await.unwrap().is_none());
        assert_eq!(board.selected_week().await, Some(2));
    }

    #[tokio::test]
    async fn test_stale_selection_renders_but_does_not_commit() {
        let dir = season_dir();
        let board = board(&dir);
        board.select_week(2).await.unwrap().unwrap();
        assert_eq!(board.selected_week().await, Some(2));

        // A selection holding an outdated ticket still gets its own render,
        // but the board stays on week 2.
        let stale = board.render_week(1, 0).await.unwrap().unwrap();
        assert_eq!(stale.update, SceneUpdate::Rebuilt);
        assert!(stale.svg.contains("class=\"cell\""));
        assert_eq!(board.selected_week().await, Some(2));
        let shared = board.board_svg().await.unwrap();
        assert!(shared.contains(crate::color::heat_hex(1.0).as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relayout_debounces_a_burst_into_one_rebuild() {
        let dir = season_dir();
        let board = board(&dir);
        board.select_week(1).await.unwrap();

        board.request_relayout(500.0).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        board.request_relayout(480.0).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        board.request_relayout(470.0).await;

        // 149 ms after the last request nothing has run yet.
        tokio::time::advance(Duration::from_millis(149)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(board.relayout_rebuilds().await, 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(board.relayout_rebuilds().await, 1);
        assert_eq!(board.viewport_width().await, 470.0);

        // The scene is back to neutral until the next selection lands.
        let svg = board.board_svg().await.unwrap();
        assert!(svg.contains(crate::color::NEUTRAL_HEX));

        // A later, separate resize debounces on its own.
        board.request_relayout(900.0).await;
        tokio::time::advance(Duration::from_millis(151)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(board.relayout_rebuilds().await, 2);
        assert_eq!(board.viewport_width().await, 900.0);
    }

    #[tokio::test]
    async fn test_selection_after_relayout_uses_the_new_width() {
        let dir = season_dir();
        let board = board(&dir);
        board.select_week(1).await.unwrap();
        board.request_relayout(150.0).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(board.viewport_width().await, 150.0);

        let view = board.select_week(2).await.unwrap().unwrap();
        match view.update {
            SceneUpdate::Patched(_) => {}
            other => panic!("expected a patch, got {:?}", other),
        }
        // Cramped width floors the cells at the minimum size.
        assert!(view.svg.contains("width=\"28\"") || view.svg.contains("width=\"28."));
    }
}
