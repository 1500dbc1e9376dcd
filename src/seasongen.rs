//! Deterministic generation of synthetic seasons, for demos and local
//! testing without real show data.
//!
//! A generated season has a hidden perfect matching. Each week seats a
//! random permutation and reports how many seated pairs agree with the
//! hidden matching; one truth booth per week checks the pair some man was
//! seated with. The final ceremony seats the hidden matching itself, so a
//! full season always narrows down to a single consistent matching.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde_json::{Value, json};

use crate::solver::MAX_ROSTER;

const MEN_POOL: &[&str] = &[
    "Adam", "Bruno", "Caleb", "Dante", "Elio", "Felix", "Gavin", "Hugo", "Ivan", "Jonas", "Kofi",
    "Liam", "Mateo", "Noah", "Oscar", "Pavel",
];

const WOMEN_POOL: &[&str] = &[
    "Alba", "Bianca", "Carmen", "Daria", "Elena", "Fiona", "Greta", "Hana", "Iris", "Jade",
    "Keira", "Luna", "Mara", "Nadia", "Olive", "Paula",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCeremony {
    pub week: u64,
    /// `seating[i]` is the woman index seated with man `i`.
    pub seating: Vec<usize>,
    pub beams: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBooth {
    pub week: u64,
    pub man: usize,
    pub woman: usize,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub men: Vec<String>,
    pub women: Vec<String>,
    /// The hidden matching: `matching[i]` is the true partner of man `i`.
    pub matching: Vec<usize>,
    pub ceremonies: Vec<GeneratedCeremony>,
    pub booths: Vec<GeneratedBooth>,
}

/// Generates a season with `couples` pairs and `weeks` ceremonies. A seed
/// makes the output reproducible.
pub fn generate(couples: usize, weeks: u64, seed: Option<u64>) -> Result<Season> {
    if couples < 2 {
        bail!("need at least 2 couples");
    }
    if couples > MEN_POOL.len() || couples > MAX_ROSTER {
        bail!("at most {} couples are supported", MEN_POOL.len().min(MAX_ROSTER));
    }
    if weeks == 0 {
        bail!("need at least 1 week");
    }
    let mut rng = match seed {
        Some(s) => ChaCha20Rng::seed_from_u64(s),
        None => ChaCha20Rng::from_os_rng(),
    };

    let men: Vec<String> = MEN_POOL[..couples].iter().map(|s| s.to_string()).collect();
    let women: Vec<String> = WOMEN_POOL[..couples].iter().map(|s| s.to_string()).collect();

    let mut matching: Vec<usize> = (0..couples).collect();
    matching.shuffle(&mut rng);

    let mut ceremonies = Vec::with_capacity(weeks as usize);
    let mut booths = Vec::with_capacity(weeks as usize);
    for week in 1..=weeks {
        let seating = if week == weeks {
            matching.clone()
        } else {
            let mut seating: Vec<usize> = (0..couples).collect();
            seating.shuffle(&mut rng);
            seating
        };
        let beams = seating
            .iter()
            .zip(&matching)
            .filter(|(s, m)| s == m)
            .count() as u64;

        // The booth checks the couple some man sat with this week, so the
        // verdict always refers to a pair the audience has seen.
        let man = rng.random_range(0..couples);
        let woman = seating[man];
        booths.push(GeneratedBooth {
            week,
            man,
            woman,
            matched: matching[man] == woman,
        });
        ceremonies.push(GeneratedCeremony {
            week,
            seating,
            beams,
        });
    }

    Ok(Season {
        men,
        women,
        matching,
        ceremonies,
        booths,
    })
}

impl Season {
    pub fn ceremony_doc(&self, ceremony: &GeneratedCeremony) -> Value {
        let matches: Vec<Value> = ceremony
            .seating
            .iter()
            .enumerate()
            .map(|(i, &j)| json!({"man": self.men[i], "woman": self.women[j]}))
            .collect();
        json!({
            "week": ceremony.week,
            "men": self.men,
            "women": self.women,
            "matches": matches,
            "result": ceremony.beams,
        })
    }

    pub fn booth_doc(&self, booth: &GeneratedBooth) -> Value {
        json!({
            "week": booth.week,
            "man": self.men[booth.man],
            "woman": self.women[booth.woman],
            "result": if booth.matched { "match" } else { "no match" },
        })
    }

    /// Writes `week_<n>.json` and `booth_<n>.json` files and returns the
    /// written paths.
    pub fn write_to(&self, ceremony_dir: &Path, booth_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(ceremony_dir)
            .with_context(|| format!("creating {:?}", ceremony_dir))?;
        std::fs::create_dir_all(booth_dir).with_context(|| format!("creating {:?}", booth_dir))?;
        let mut written = Vec::new();
        for ceremony in &self.ceremonies {
            let path = ceremony_dir.join(format!("week_{}.json", ceremony.week));
            let body = serde_json::to_string_pretty(&self.ceremony_doc(ceremony))?;
            std::fs::write(&path, body).with_context(|| format!("writing {:?}", path))?;
            written.push(path);
        }
        for booth in &self.booths {
            let path = booth_dir.join(format!("booth_{}.json", booth.week));
            let body = serde_json::to_string_pretty(&self.booth_doc(booth))?;
            std::fs::write(&path, body).with_context(|| format!("writing {:?}", path))?;
            written.push(path);
        }
        Ok(written)
    }

    /// The season as in-memory (path, document) pairs, shaped like the
    /// result of loading the written files back.
    pub fn docs(&self) -> (Vec<(PathBuf, Value)>, Vec<(PathBuf, Value)>) {
        let ceremonies = self
            .ceremonies
            .iter()
            .map(|c| {
                (
                    PathBuf::from(format!("week_{}.json", c.week)),
                    self.ceremony_doc(c),
                )
            })
            .collect();
        let booths = self
            .booths
            .iter()
            .map(|b| {
                (
                    PathBuf::from(format!("booth_{}.json", b.week)),
                    self.booth_doc(b),
                )
            })
            .collect();
        (ceremonies, booths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate(8, 5, Some(7)).unwrap();
        let b = generate(8, 5, Some(7)).unwrap();
        assert_eq!(a, b);
        let c = generate(8, 5, Some(8)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_size_limits() {
        assert!(generate(1, 3, Some(0)).is_err());
        assert!(generate(17, 3, Some(0)).is_err());
        assert!(generate(4, 0, Some(0)).is_err());
    }

    #[test]
    fn test_booths_report_the_truth() {
        let season = generate(10, 6, Some(42)).unwrap();
        for booth in &season.booths {
            assert_eq!(booth.matched, season.matching[booth.man] == booth.woman);
        }
    }

    #[test]
    fn test_final_week_reveals_the_matching() {
        let season = generate(6, 4, Some(3)).unwrap();
        let last = season.ceremonies.last().unwrap();
        assert_eq!(last.seating, season.matching);
        assert_eq!(last.beams, 6);
    }

    #[test]
    fn test_generated_season_is_solvable() {
        let season = generate(7, 5, Some(11)).unwrap();
        let (ceremonies, booths) = season.docs();
        let problem = solver::build_problem(&ceremonies, &booths).unwrap();
        let e = solver::enumerate_matchings(&problem);
        // The final ceremony seats the hidden matching with a full beam
        // count, which pins it down uniquely.
        assert_eq!(e.total, 1);
        let probs = e.probabilities();
        for (i, &j) in season.matching.iter().enumerate() {
            assert_eq!(probs[i][j], 1.0);
        }
    }

    #[test]
    fn test_intermediate_weeks_keep_the_matching_alive() {
        let season = generate(7, 5, Some(11)).unwrap();
        let (mut ceremonies, mut booths) = season.docs();
        // Drop the final, fully revealing week.
        ceremonies.pop();
        booths.pop();
        let problem = solver::build_problem(&ceremonies, &booths).unwrap();
        let e = solver::enumerate_matchings(&problem);
        assert!(e.total >= 1);
        let probs = e.probabilities();
        for (i, &j) in season.matching.iter().enumerate() {
            assert!(probs[i][j] > 0.0);
        }
    }

    #[test]
    fn test_docs_round_trip_through_the_loader() {
        use std::io::Write as _;

        let season = generate(4, 3, Some(9)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cdir = dir.path().join("ceremony_data");
        let bdir = dir.path().join("truth_booth_data");
        let written = season.write_to(&cdir, &bdir).unwrap();
        assert_eq!(written.len(), 6);
        // Comments in hand-edited files still load when allowed.
        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(cdir.join("week_1.json"))
            .unwrap();
        writeln!(f, "// edited by hand").unwrap();

        let files = solver::load_season(&cdir, &bdir, true, false).unwrap();
        assert_eq!(files.ceremonies.len(), 3);
        assert_eq!(files.booths.len(), 3);
        assert_eq!(files.max_week(), Some(3));
        let problem = files.full_problem().unwrap();
        assert_eq!(problem.men, season.men);
        assert_eq!(solver::enumerate_matchings(&problem).total, 1);
    }
}
