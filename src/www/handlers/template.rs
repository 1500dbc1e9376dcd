//! # HTML Templating and Response Helpers
//!
//! A small templating layer on the `handlebars` crate. It registers the
//! page layout plus the week page template, and offers helpers to turn
//! rendered content or errors into `actix_web::HttpResponse` values.
//!
//! The week page template must carry a `{{{heatmap}}}` and a
//! `{{{ceremony}}}` mount; [`verify_mounts`] checks this at boot so a
//! broken override fails the start instead of rendering hollow pages.

use actix_web::{HttpResponse, Responder};
use anyhow::Result;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::json;

use crate::BootError;

/// A lazily-initialized, global instance of the Handlebars templating engine.
static ENGINE: Lazy<Handlebars> = Lazy::new(new_engine);

const MAIN_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1.0,user-scalable=yes">
<title>AYTO Odds</title>
<style>
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 0; color: #222; }
nav.top { background: #222; padding: 8px 16px; }
nav.top a { color: #eee; text-decoration: none; font-weight: bold; }
main { padding: 12px 16px; }
nav.weeks b { color: #008000; }
table.ceremony td, table.ceremony th { border: 1px solid #ccc; padding: 4px 8px; }
tr.new-pair td { background: #fdf6e3; }
tr.certain-pair td { background: #e8f5e9; }
.badge { font-size: 11px; padding: 1px 5px; border-radius: 3px; color: #fff; }
.badge.new { background: #f0a202; }
.badge.certain { background: #008000; }
p.note.blackout { color: #7a0000; font-weight: bold; }
footer.meta { color: #777; font-size: 12px; margin-top: 16px; }
</style>
</head>
<body>
<nav class="top"><a href="/">AYTO Odds</a></nav>
<main>
<article>
{{{contents}}}
</article>
</main>
</body>
</html>"#;

const WEEK_TEMPLATE: &str = r#"<h1>Week {{week}}</h1>
<nav class="weeks">{{{nav}}}</nav>
<section class="board">
{{{heatmap}}}
</section>
<h2>Matching ceremony</h2>
<section class="ceremony">
{{{ceremony}}}
</section>
<section class="pairs">
{{{top_pairs}}}
</section>
<footer class="meta">{{{summary}}}</footer>
<script>
window.addEventListener("resize", function () {
  fetch("/api/relayout?width=" + Math.round(document.body.clientWidth));
});
</script>"#;

/// Creates and configures a new `Handlebars` engine instance.
///
/// Registers the "main" layout with its `{{{contents}}}` placeholder and
/// the "week" page template. Setting `AYTO_WEEK_TEMPLATE` to a file path
/// replaces the built-in week template with that file's contents.
pub fn new_engine() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string("main", MAIN_LAYOUT)
        .unwrap();
    let week_source = match std::env::var("AYTO_WEEK_TEMPLATE") {
        Ok(path) => std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read AYTO_WEEK_TEMPLATE {}: {}", path, e)),
        Err(_) => WEEK_TEMPLATE.to_string(),
    };
    handlebars
        .register_template_string("week", week_source)
        .unwrap();
    handlebars
}

/// A simple utility to escape HTML special characters.
pub(crate) fn escape_html(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            '/' => "&#x2F;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Everything the week page template consumes. The fragment fields are
/// pre-rendered HTML and land in the page unescaped.
#[derive(Debug, Clone, Serialize)]
pub struct WeekPage {
    pub week: u64,
    pub nav: String,
    pub heatmap: String,
    pub ceremony: String,
    pub top_pairs: String,
    pub summary: String,
}

/// Renders the given content string into the main HTML layout.
pub fn render(contents: &str) -> String {
    ENGINE
        .render(
            "main",
            &json!({
                "contents": contents,
            }),
        )
        .unwrap()
}

/// Renders the week page contents (not yet wrapped in the layout).
pub fn render_week(page: &WeekPage) -> Result<String> {
    Ok(ENGINE.render("week", page)?)
}

fn verify_mounts_in(engine: &Handlebars) -> Result<(), BootError> {
    let probe = engine
        .render(
            "week",
            &json!({
                "week": 0,
                "nav": "",
                "heatmap": "__HEATMAP_MOUNT__",
                "ceremony": "__CEREMONY_MOUNT__",
                "top_pairs": "",
                "summary": "",
            }),
        )
        .map_err(|_| BootError::MissingMount("heatmap"))?;
    if !probe.contains("__HEATMAP_MOUNT__") {
        return Err(BootError::MissingMount("heatmap"));
    }
    if !probe.contains("__CEREMONY_MOUNT__") {
        return Err(BootError::MissingMount("ceremony"));
    }
    Ok(())
}

/// Checks that the active week template still carries both content
/// mounts. Run once at boot, before binding the server.
pub fn verify_mounts() -> Result<(), BootError> {
    verify_mounts_in(&ENGINE)
}

/// Creates an HTML response for displaying an `anyhow::Error`.
///
/// The error is formatted within a `<pre>` block inside the main page layout.
pub fn to_error_response(result: &anyhow::Error) -> HttpResponse {
    HttpResponse::InternalServerError()
        .content_type("text/html")
        .body(render(&format!(
            "<h1>Error</h1><pre><code>{}</code></pre>",
            escape_html(&format!("{:?}", result))
        )))
}

/// Creates a standard HTML `Ok` response from a string slice.
pub fn to_html_response(result: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html")
        .body(render(result))
}

/// Creates a 404 page in the main layout.
pub fn to_not_found_response(message: &str) -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html")
        .body(render(&format!(
            "<h1>Not found</h1><p>{}</p>",
            escape_html(message)
        )))
}

/// Creates an SVG image response. The board is live data, so clients are
/// told not to cache it.
pub fn to_svg_response(result: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("image/svg+xml")
        .append_header(("Cache-Control", "no-cache"))
        .body(result.to_owned())
}

/// A generic helper that converts a `Result<String>` into an appropriate HTML response.
pub fn to_response(result: Result<String>) -> impl Responder {
    match result {
        Ok(x) => to_html_response(&x),
        Err(e) => to_error_response(&e),
    }
}
