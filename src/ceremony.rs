use std::fmt::Write;

use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::pairs::{self, Pair};

/// Probabilities at or above this are shown as confirmed matches.
pub const CERTAIN_THRESHOLD: f64 = 0.9999;

/// Ceremony fields besides the seated pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CeremonyMeta {
    /// Announced number of correct matches (the beam count).
    pub result: Option<u64>,
    /// Alias some documents use instead of `result`.
    pub beams: Option<u64>,
    pub blackout: Option<bool>,
    pub week: Option<u64>,
}

impl CeremonyMeta {
    /// The announced match count, whichever alias carried it.
    pub fn correct_matches(&self) -> Option<u64> {
        self.result.or(self.beams)
    }
}

/// One week's matching ceremony: seated pairs in document order plus the
/// announced outcome.
#[derive(Debug, Clone, Default)]
pub struct CeremonyRecord {
    pub pairs: Vec<Pair>,
    pub meta: CeremonyMeta,
}

fn as_count(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

impl CeremonyRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a ceremony out of any accepted document shape. Documents with
    /// no recognizable pair list still contribute their meta fields.
    pub fn from_doc(doc: &Value) -> Self {
        let pairs = pairs::ceremony_pairs(doc)
            .map(pairs::normalize)
            .unwrap_or_default();
        let meta = match pairs::ceremony_body(doc) {
            Some(body) => CeremonyMeta {
                result: body.get("result").and_then(as_count),
                beams: body.get("beams").and_then(as_count),
                blackout: body.get("blackout").and_then(Value::as_bool),
                week: body.get("week").and_then(as_count),
            },
            None => CeremonyMeta::default(),
        };
        CeremonyRecord { pairs, meta }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders the ceremony results fragment: outcome notes and one table row
/// per seated pair, with first-time pairs and confirmed matches flagged.
///
/// `prior` holds the pair identities seated in earlier weeks and `values`
/// the current probability per pair identity.
pub fn render_table(
    record: &CeremonyRecord,
    prior: &FxHashSet<String>,
    values: &FxHashMap<String, f64>,
) -> Result<String> {
    let mut w = String::new();

    if record.meta.blackout == Some(true) {
        w.push_str(r#"<p class="note blackout">Blackout ceremony.</p>"#);
    }
    if let Some(n) = record.meta.correct_matches() {
        write!(w, r#"<p class="summary">Correct matches: {}</p>"#, n)?;
    }

    if record.is_empty() {
        w.push_str(r#"<p class="placeholder">No ceremony recorded for this week.</p>"#);
        return Ok(w);
    }

    w.push_str(
        r#"<table class="ceremony" style="border-collapse:collapse;font-size:13px;">
<tr><th>Man</th><th>Woman</th><th>Probability</th><th></th></tr>"#,
    );
    for pair in &record.pairs {
        let key = pair.key();
        let value = values.get(&key).copied();
        let is_new = !prior.contains(&key);
        let is_certain = value.is_some_and(|v| v >= CERTAIN_THRESHOLD);

        let mut classes = Vec::new();
        let mut badges = String::new();
        if is_new {
            classes.push("new-pair");
            badges.push_str(r#" <span class="badge new">NEW</span>"#);
        }
        if is_certain {
            classes.push("certain-pair");
            badges.push_str(r#" <span class="badge certain">CONFIRMED</span>"#);
        }
        let class_attr = if classes.is_empty() {
            String::new()
        } else {
            format!(" class=\"{}\"", classes.join(" "))
        };
        let shown = match value {
            Some(v) => format!("{:.1}%", v * 100.0),
            None => "n/a".to_string(),
        };
        write!(
            w,
            "\n<tr{}><td>{}</td><td>{}</td><td style=\"text-align:right;\">{}</td><td>{}</td></tr>",
            class_attr,
            esc(&pair.man),
            esc(&pair.woman),
            shown,
            badges.trim_start(),
        )?;
    }
    w.push_str("\n</table>");
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, &str)]) -> CeremonyRecord {
        CeremonyRecord {
            pairs: pairs.iter().map(|(m, w)| Pair::new(m, w)).collect(),
            meta: CeremonyMeta::default(),
        }
    }

    fn no_prior() -> FxHashSet<String> {
        FxHashSet::default()
    }

    #[test]
    fn test_from_doc_reads_pairs_and_meta() {
        let doc = json!({
            "matchups": [["Adam", "Bella"]],
            "result": 2.0,
            "blackout": false,
        });
        let r = CeremonyRecord::from_doc(&doc);
        assert_eq!(r.pairs.len(), 1);
        assert_eq!(r.meta.result, Some(2));
        assert_eq!(r.meta.blackout, Some(false));

        let wrapped = json!({"ceremony": {"beams": 3, "couples": {"Adam": "Bella"}}});
        let r = CeremonyRecord::from_doc(&wrapped);
        assert_eq!(r.meta.correct_matches(), Some(3));
        assert_eq!(r.pairs[0].key(), "adam+bella");

        assert!(CeremonyRecord::from_doc(&json!({"week": 1})).is_empty());
    }

    #[test]
    fn test_placeholder_when_no_pairs() {
        let html = render_table(&CeremonyRecord::empty(), &no_prior(), &FxHashMap::default())
            .unwrap();
        assert!(html.contains("No ceremony recorded"));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_new_pair_flagged_against_prior_weeks() {
        let r = record(&[("Adam", "Bella"), ("Carl", "Dana")]);
        let mut prior = no_prior();
        prior.insert("adam+bella".to_string());
        let html = render_table(&r, &prior, &FxHashMap::default()).unwrap();
        assert_eq!(html.matches("badge new").count(), 1);
        let adam = html.find("Adam").unwrap();
        let carl = html.find("Carl").unwrap();
        let badge = html.find("badge new").unwrap();
        assert!(badge > carl && carl > adam);
    }

    #[test]
    fn test_every_pair_is_new_when_nothing_is_prior() {
        let r = record(&[("Adam", "Bella"), ("Carl", "Dana")]);
        let html = render_table(&r, &no_prior(), &FxHashMap::default()).unwrap();
        assert_eq!(html.matches("badge new").count(), 2);
    }

    #[test]
    fn test_certain_pairs_need_the_full_threshold() {
        let r = record(&[("Adam", "Bella"), ("Carl", "Dana")]);
        let mut values = FxHashMap::default();
        values.insert("adam+bella".to_string(), 0.99999);
        values.insert("carl+dana".to_string(), 0.95);
        let html = render_table(&r, &no_prior(), &values).unwrap();
        assert_eq!(html.matches("CONFIRMED").count(), 1);
        assert!(html.contains("certain-pair"));
        assert!(html.contains("100.0%"));
        assert!(html.contains("95.0%"));
    }

    #[test]
    fn test_missing_values_render_as_na() {
        let r = record(&[("Adam", "Bella")]);
        let html = render_table(&r, &no_prior(), &FxHashMap::default()).unwrap();
        assert!(html.contains("n/a"));
    }

    #[test]
    fn test_outcome_notes() {
        let mut r = record(&[("Adam", "Bella")]);
        r.meta.blackout = Some(true);
        r.meta.beams = Some(0);
        let html = render_table(&r, &no_prior(), &FxHashMap::default()).unwrap();
        assert!(html.contains("Blackout ceremony"));
        assert!(html.contains("Correct matches: 0"));
    }

    #[test]
    fn test_names_are_escaped() {
        let r = record(&[("<Adam>", "B&b")]);
        let html = render_table(&r, &no_prior(), &FxHashMap::default()).unwrap();
        assert!(html.contains("&lt;Adam&gt;"));
        assert!(html.contains("B&amp;b"));
    }
}
