//! # JSON API Handlers
//!
//! `/api/weeks` lists the discovered weeks, `/api/week/{n}` summarizes one
//! selection, and `/api/relayout` feeds viewport widths into the debounced
//! relayout.

use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;

use super::template;
use crate::controller::{Board, RELAYOUT_DEBOUNCE};
use crate::scene::SceneUpdate;

/// Handles `GET /api/weeks`.
pub async fn weeks(data: web::Data<Board>) -> impl Responder {
    match data.weeks().await {
        Ok(weeks) => {
            let last = weeks.last().copied();
            HttpResponse::Ok().json(json!({
                "weeks": weeks,
                "last": last,
            }))
        }
        Err(e) => template::to_error_response(&e),
    }
}

/// Handles `GET /api/week/{n}`.
pub async fn week(data: web::Data<Board>, path: web::Path<u64>) -> impl Responder {
    let week = path.into_inner();
    match data.select_week(week).await {
        Ok(Some(view)) => {
            let (update, changed_cells) = match &view.update {
                SceneUpdate::Rebuilt => ("rebuilt", view.grid.cell_count()),
                SceneUpdate::Patched(p) => {
                    ("patched", p.added.len() + p.updated.len() + p.removed.len())
                }
            };
            HttpResponse::Ok().json(json!({
                "week": view.bundle.week,
                "men": view.bundle.dataset.men,
                "women": view.bundle.dataset.women,
                "total": view.bundle.dataset.total,
                "updated": view.bundle.updated.map(|t| t.to_rfc3339()),
                "ceremony_pairs": view.bundle.ceremony.pairs.len(),
                "correct_matches": view.bundle.ceremony.meta.correct_matches(),
                "update": update,
                "changed_cells": changed_cells,
            }))
        }
        Ok(None) => HttpResponse::NotFound().json(json!({
            "error": format!("no dataset for week {}", week),
        })),
        Err(e) => template::to_error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RelayoutQuery {
    pub width: f64,
}

/// Handles `GET /api/relayout?width=`. The response reports the request
/// as accepted; the relayout itself lands after the debounce window.
pub async fn relayout(data: web::Data<Board>, query: web::Query<RelayoutQuery>) -> impl Responder {
    let board = data.into_inner();
    board.request_relayout(query.width).await;
    HttpResponse::Ok().json(json!({
        "width": query.width,
        "debounce_ms": RELAYOUT_DEBOUNCE.as_millis() as u64,
        "rebuilds": board.relayout_rebuilds().await,
    }))
}
