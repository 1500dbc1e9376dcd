//! # Week Page Handlers
//!
//! `GET /week/{n}` renders the full page for one week: navigation, the
//! probability heatmap, the ceremony table and a short footer. `GET
//! /svg/{n}` serves the heatmap alone as an SVG document.

use std::cmp::Reverse;
use std::fmt::Write;

use actix_web::{Responder, web};
use anyhow::Result;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Deserialize;

use super::template::{self, WeekPage, escape_html};
use crate::controller::{Board, WeekView};
use crate::dataset::Grid;
use crate::www::utils;

#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    /// Current viewport width in pixels. Reported widths feed the
    /// debounced relayout, so the board settles on the new size shortly
    /// after a burst of resizes.
    #[serde(default)]
    pub width: Option<f64>,
}

/// Handles `GET /week/{n}`.
pub async fn show(
    data: web::Data<Board>,
    path: web::Path<u64>,
    query: web::Query<ShowQuery>,
) -> impl Responder {
    let board = data.into_inner();
    let week = path.into_inner();
    if let Some(width) = query.width {
        board.request_relayout(width).await;
    }
    match board.select_week(week).await {
        Ok(Some(view)) => match page(&board, week, &view).await {
            Ok(html) => template::to_html_response(&html),
            Err(e) => template::to_error_response(&e),
        },
        Ok(None) => template::to_not_found_response(&format!(
            "No dataset was found for week {}.",
            week
        )),
        Err(e) => template::to_error_response(&e),
    }
}

/// Handles `GET /svg/{n}`.
pub async fn svg(data: web::Data<Board>, path: web::Path<u64>) -> impl Responder {
    let week = path.into_inner();
    match data.select_week(week).await {
        Ok(Some(view)) => template::to_svg_response(&view.svg),
        Ok(None) => template::to_not_found_response(&format!(
            "No dataset was found for week {}.",
            week
        )),
        Err(e) => template::to_error_response(&e),
    }
}

async fn page(board: &Board, week: u64, view: &WeekView) -> Result<String> {
    let weeks = board.weeks().await?;
    let page = WeekPage {
        week,
        nav: nav_links(&weeks, week),
        heatmap: view.svg.clone(),
        ceremony: view.ceremony_html.clone(),
        top_pairs: top_pairs_fragment(&view.grid)?,
        summary: summary_line(view),
    };
    template::render_week(&page)
}

/// One link per known week, with the current week in bold.
fn nav_links(weeks: &[u64], current: u64) -> String {
    let mut links: Vec<String> = weeks
        .iter()
        .map(|&w| {
            if w == current {
                format!("<b>week {}</b>", w)
            } else {
                format!(r#"<a href="/week/{}">week {}</a>"#, w, w)
            }
        })
        .collect();
    if !weeks.contains(&current) {
        links.push(format!("<b>week {}</b>", current));
    }
    links.join(" | ")
}

/// The five most likely pairs, skipping pairs the data gives no chance.
fn top_pairs_fragment(grid: &Grid) -> Result<String> {
    let ranked = (0..grid.rows())
        .cartesian_product(0..grid.cols())
        .map(|(mi, wi)| (mi, wi, grid.value(mi, wi)))
        .filter(|&(_, _, v)| v > 0.0)
        .sorted_by_key(|&(mi, wi, v)| (Reverse(OrderedFloat(v)), mi, wi))
        .take(5)
        .collect_vec();
    if ranked.is_empty() {
        return Ok(String::new());
    }
    let mut w = String::new();
    w.push_str(r#"<h2>Most likely pairs</h2><ol class="top-pairs">"#);
    for (mi, wi, v) in ranked {
        write!(
            w,
            r#"<li>{} + {} <span class="p">{:.1}%</span></li>"#,
            escape_html(&grid.men[mi]),
            escape_html(&grid.women[wi]),
            v * 100.0
        )?;
    }
    w.push_str("</ol>");
    Ok(w)
}

fn summary_line(view: &WeekView) -> String {
    let mut parts = Vec::new();
    if let Some(total) = view.bundle.dataset.total {
        parts.push(format!(
            "{} consistent matching{}",
            total,
            if total == 1 { "" } else { "s" }
        ));
    }
    parts.push(format!(
        "updated {}",
        utils::format_updated(view.bundle.updated)
    ));
    parts.join(" | ")
}
