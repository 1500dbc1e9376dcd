//! Where week data comes from: a local data directory or an HTTP base URL.
//!
//! Fetching a document that does not exist is an answer (`None`), not an
//! error. Over HTTP, connection failures, non-success statuses, and
//! unparseable bodies also read as absence. A local file that exists but
//! cannot be read or parsed surfaces as `Err`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::BootError;
use crate::ceremony::CeremonyRecord;
use crate::client;
use crate::dataset::WeekDataset;

/// Everything the viewer needs for one week: the parsed dataset, the
/// resolved ceremony, and when the data was last touched.
#[derive(Debug, Clone)]
pub struct WeekBundle {
    pub week: u64,
    pub dataset: WeekDataset,
    pub ceremony: CeremonyRecord,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub enum Source {
    Dir(PathBuf),
    Http(Url),
}

/// Highest week index discovery will probe; the season ends at the first
/// gap or here, whichever comes first.
const DISCOVER_BOUND: u64 = 40;

impl Source {
    /// A local directory source. The directory must exist up front so a
    /// typo fails the boot instead of rendering an endless empty season.
    pub fn dir(path: impl Into<PathBuf>) -> Result<Source, BootError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(BootError::DataDir(path));
        }
        Ok(Source::Dir(path))
    }

    /// An HTTP source rooted at `base`. A trailing slash is added so week
    /// file names join under the base instead of replacing its last
    /// segment.
    pub fn http(base: &str) -> Result<Source, BootError> {
        let trimmed = base.trim();
        let padded = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let url =
            Url::parse(&padded).map_err(|e| BootError::BaseUrl(format!("{}: {}", base, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BootError::BaseUrl(format!(
                "{}: expected an http or https URL",
                base
            )));
        }
        Ok(Source::Http(url))
    }

    /// Fetches one JSON document by relative name. `Ok(None)` means the
    /// document does not exist at this source.
    pub async fn fetch_doc(&self, name: &str) -> Result<Option<(Value, DateTime<Utc>)>> {
        match self {
            Source::Dir(dir) => {
                let path = dir.join(name);
                let raw = match std::fs::read_to_string(&path) {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e).with_context(|| format!("reading {:?}", path)),
                };
                let doc = serde_json::from_str(raw.trim_start_matches('\u{feff}'))
                    .with_context(|| format!("invalid JSON in {:?}", path))?;
                let updated = std::fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                Ok(Some((doc, updated)))
            }
            Source::Http(base) => {
                let url = base
                    .join(name)
                    .with_context(|| format!("bad document name {:?}", name))?;
                let resp = match client::CLIENT
                    .get(url)
                    .query(&[("v", client::cache_buster())])
                    .send()
                    .await
                {
                    Ok(resp) => resp,
                    Err(_) => return Ok(None),
                };
                if !resp.status().is_success() {
                    return Ok(None);
                }
                match resp.json().await {
                    Ok(doc) => Ok(Some((doc, Utc::now()))),
                    Err(_) => Ok(None),
                }
            }
        }
    }

    /// Fetches and assembles one week. The dataset document is
    /// `data_week_<n>.json`, falling back to `week_<n>.json`; the ceremony
    /// comes from the dataset's embedded `ceremony` field, then
    /// `ceremony_data/week_<n>.json`, then the root `week_<n>.json`, then
    /// an empty record.
    pub async fn week_bundle(&self, week: u64) -> Result<Option<WeekBundle>> {
        let root_name = format!("week_{}.json", week);
        let (doc, updated, doc_is_root) =
            match self.fetch_doc(&format!("data_week_{}.json", week)).await? {
                Some((doc, at)) => (doc, at, false),
                None => match self.fetch_doc(&root_name).await? {
                    Some((doc, at)) => (doc, at, true),
                    None => return Ok(None),
                },
            };
        let dataset: WeekDataset = serde_json::from_value(doc.clone())
            .with_context(|| format!("week {} dataset has an unexpected shape", week))?;

        let ceremony = if let Some(embedded) = &dataset.ceremony {
            CeremonyRecord::from_doc(embedded)
        } else if let Some((cdoc, _)) = self
            .fetch_doc(&format!("ceremony_data/week_{}.json", week))
            .await?
        {
            CeremonyRecord::from_doc(&cdoc)
        } else if doc_is_root {
            CeremonyRecord::from_doc(&doc)
        } else if let Some((cdoc, _)) = self.fetch_doc(&root_name).await? {
            CeremonyRecord::from_doc(&cdoc)
        } else {
            CeremonyRecord::empty()
        };

        Ok(Some(WeekBundle {
            week,
            dataset,
            ceremony,
            updated: Some(updated),
        }))
    }

    /// Walks weeks one by one and returns every bundle up to the first
    /// missing index, probing at most [`DISCOVER_BOUND`] weeks. Week 0 is
    /// optional: a season may start at week 1.
    pub async fn discover(&self) -> Result<Vec<WeekBundle>> {
        let mut bundles = Vec::new();
        if let Some(b) = self.week_bundle(0).await? {
            bundles.push(b);
        }
        for week in 1..DISCOVER_BOUND {
            match self.week_bundle(week).await? {
                Some(b) => bundles.push(b),
                None => break,
            }
        }
        Ok(bundles)
    }

    /// Like [`Source::discover`], but fetches each probe window
    /// concurrently. Weeks keep their order in the result.
    pub async fn prefetch(&self) -> Result<Vec<WeekBundle>> {
        const WINDOW: u64 = 8;

        let mut bundles: Vec<WeekBundle> = Vec::new();
        let mut next = 0u64;
        while next < DISCOVER_BOUND {
            let hi = (next + WINDOW).min(DISCOVER_BOUND);
            let mut set: JoinSet<Result<(u64, Option<WeekBundle>)>> = JoinSet::new();
            for week in next..hi {
                let source = self.clone();
                set.spawn(async move { Ok((week, source.week_bundle(week).await?)) });
            }
            let mut window: Vec<(u64, Option<WeekBundle>)> = Vec::new();
            while let Some(res) = set.join_next().await {
                match res {
                    Ok(Ok(item)) => window.push(item),
                    Ok(Err(e)) => return Err(e),
                    Err(e) => return Err(anyhow::anyhow!("join error: {}", e)),
                }
            }
            window.sort_by_key(|(week, _)| *week);

            let mut done = false;
            for (week, bundle) in window {
                match bundle {
                    Some(b) => bundles.push(b),
                    // Week 0 is allowed to be missing; any later gap ends
                    // the season.
                    None if week == 0 => {}
                    None => {
                        done = true;
                        break;
                    }
                }
            }
            if done {
                break;
            }
            next = hi;
        }
        Ok(bundles)
    }

    /// The highest available week, or `None` when the source has no data.
    pub async fn last_week(&self) -> Result<Option<u64>> {
        Ok(self.discover().await?.last().map(|b| b.week))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &std::path::Path, name: &str, doc: &Value) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_string(doc).unwrap()).unwrap();
    }

    fn dataset_doc(p00: f64) -> Value {
        json!({
            "men": ["A", "B"],
            "women": ["X", "Y"],
            "probabilities": [[p00, 1.0 - p00], [1.0 - p00, p00]],
        })
    }

    #[test]
    fn test_dir_source_requires_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Source::dir(dir.path()).is_ok());
        let missing = dir.path().join("nope");
        match Source::dir(&missing) {
            Err(BootError::DataDir(p)) => assert_eq!(p, missing),
            other => panic!("expected DataDir error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_http_source_validates_the_base_url() {
        assert!(Source::http("https://example.com/season7").is_ok());
        assert!(Source::http("http://example.com/season7/").is_ok());
        assert!(matches!(
            Source::http("ftp://example.com/x"),
            Err(BootError::BaseUrl(_))
        ));
        assert!(matches!(Source::http("not a url"), Err(BootError::BaseUrl(_))));
    }

    #[test]
    fn test_http_base_joins_under_the_last_segment() {
        let Ok(Source::Http(base)) = Source::http("https://example.com/season7") else {
            panic!("expected an http source");
        };
        let joined = base.join("data_week_3.json").unwrap();
        assert_eq!(joined.as_str(), "https://example.com/season7/data_week_3.json");
    }

    #[tokio::test]
    async fn test_missing_documents_are_absence_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::dir(dir.path()).unwrap();
        assert!(source.fetch_doc("data_week_1.json").await.unwrap().is_none());
        assert!(source.week_bundle(1).await.unwrap().is_none());
        assert_eq!(source.last_week().await.unwrap(), None);

        // A document that exists but is broken is an error.
        std::fs::write(dir.path().join("data_week_1.json"), "{oops").unwrap();
        assert!(source.fetch_doc("data_week_1.json").await.is_err());
    }

    #[tokio::test]
    async fn test_week_bundle_resolves_the_ceremony_chain() {
        let dir = tempfile::tempdir().unwrap();

        // Week 1: ceremony embedded in the dataset document.
        let mut doc = dataset_doc(0.25);
        doc["ceremony"] = json!({
            "pairs": [{"man": "A", "woman": "X"}],
            "result": 1,
        });
        write(dir.path(), "data_week_1.json", &doc);

        // Week 2: sidecar file under ceremony_data/.
        write(dir.path(), "data_week_2.json", &dataset_doc(0.5));
        write(
            dir.path(),
            "ceremony_data/week_2.json",
            &json!({"matches": [{"man": "B", "woman": "Y"}], "result": 0}),
        );

        // Week 3: the root week file is both dataset and ceremony.
        let mut doc = dataset_doc(0.75);
        doc["pairs"] = json!([{"man": "A", "woman": "Y"}]);
        write(dir.path(), "week_3.json", &doc);

        // Week 4: no ceremony anywhere.
        write(dir.path(), "data_week_4.json", &dataset_doc(1.0));

        let source = Source::dir(dir.path()).unwrap();
        let b1 = source.week_bundle(1).await.unwrap().unwrap();
        assert_eq!(b1.ceremony.pairs[0].key(), "a+x");
        assert_eq!(b1.ceremony.meta.correct_matches(), Some(1));

        let b2 = source.week_bundle(2).await.unwrap().unwrap();
        assert_eq!(b2.ceremony.pairs[0].key(), "b+y");

        let b3 = source.week_bundle(3).await.unwrap().unwrap();
        assert_eq!(b3.dataset.men, vec!["A", "B"]);
        assert_eq!(b3.ceremony.pairs[0].key(), "a+y");

        let b4 = source.week_bundle(4).await.unwrap().unwrap();
        assert!(b4.ceremony.is_empty());
        assert!(b4.updated.is_some());
    }

    #[tokio::test]
    async fn test_discover_stops_at_the_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "data_week_1.json", &dataset_doc(0.1));
        write(dir.path(), "data_week_2.json", &dataset_doc(0.2));
        write(dir.path(), "data_week_4.json", &dataset_doc(0.4));

        let source = Source::dir(dir.path()).unwrap();
        let bundles = source.discover().await.unwrap();
        assert_eq!(bundles.iter().map(|b| b.week).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(source.last_week().await.unwrap(), Some(2));

        let prefetched = source.prefetch().await.unwrap();
        assert_eq!(prefetched.iter().map(|b| b.week).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_week_zero_is_optional_but_included_when_present() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "data_week_0.json", &dataset_doc(0.5));
        write(dir.path(), "data_week_1.json", &dataset_doc(0.6));

        let source = Source::dir(dir.path()).unwrap();
        let weeks: Vec<u64> = source.discover().await.unwrap().iter().map(|b| b.week).collect();
        assert_eq!(weeks, vec![0, 1]);
        let weeks: Vec<u64> = source.prefetch().await.unwrap().iter().map(|b| b.week).collect();
        assert_eq!(weeks, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_prefetch_crosses_window_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        for week in 1..=11 {
            write(
                dir.path(),
                &format!("data_week_{}.json", week),
                &dataset_doc(week as f64 / 11.0),
            );
        }
        let source = Source::dir(dir.path()).unwrap();
        let weeks: Vec<u64> = source.prefetch().await.unwrap().iter().map(|b| b.week).collect();
        assert_eq!(weeks, (1..=11).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_discovery_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        for week in 0..=45 {
            write(dir.path(), &format!("data_week_{}.json", week), &dataset_doc(0.5));
        }
        let source = Source::dir(dir.path()).unwrap();
        assert_eq!(source.discover().await.unwrap().len(), 40);
        assert_eq!(source.prefetch().await.unwrap().len(), 40);
        assert_eq!(source.last_week().await.unwrap(), Some(39));
    }
}
