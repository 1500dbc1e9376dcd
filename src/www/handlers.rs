//! # Request Handlers
//!
//! One handler module per surface: `week` for the heatmap pages and the
//! SVG endpoint, `api` for the JSON routes, `template` for the shared
//! layout and response helpers.

use actix_web::{HttpResponse, Responder, web};

use crate::controller::Board;

/// JSON API routes.
pub mod api;
/// The page layout, the week page template, and response helpers.
pub mod template;
/// The week page and the standalone SVG endpoint.
pub mod week;

/// Handles `GET /`: redirects to the most recent week, or explains that
/// the source has no data yet.
pub async fn index(data: web::Data<Board>) -> impl Responder {
    match data.last_week().await {
        Ok(Some(week)) => HttpResponse::SeeOther()
            .append_header(("Location", format!("/week/{}", week)))
            .finish(),
        Ok(None) => template::to_html_response(
            "<h1>No weeks yet</h1>\
             <p>No week datasets were found at the configured source. \
             Generate or compute a season first.</p>",
        ),
        Err(e) => template::to_error_response(&e),
    }
}
