//! Exact enumeration of perfect matchings consistent with matching
//! ceremonies and truth booths.
//!
//! Every ceremony contributes a seating (who sat with whom) and a beam
//! count (how many seated pairs are correct). Truth booths either forbid a
//! pair or force it. The search walks all perfect matchings that satisfy
//! every constraint, counting per-pair occurrences, and the probability of
//! a pair is its occurrence count over the total.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

/// Hard cap on roster size. The search uses one bit per woman in a `u64`
/// mask, and seasons never come close to this.
pub const MAX_ROSTER: usize = 32;

/// One ceremony turned into per-man seating masks plus the announced beam
/// count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyConstraint {
    /// `rows[i]` has bit `j` set when man `i` sat with woman `j`.
    pub rows: Vec<u64>,
    pub beams: u64,
}

/// The full season constraint set for one enumeration.
#[derive(Debug, Clone)]
pub struct Problem {
    pub men: Vec<String>,
    pub women: Vec<String>,
    pub ceremonies: Vec<CeremonyConstraint>,
    /// Per man, the mask of women still allowed by truth booths.
    pub allowed: Vec<u64>,
    /// Pairs confirmed by a truth booth, man index to woman index.
    pub forced: FxHashMap<usize, usize>,
}

/// Result of the search: the number of consistent matchings and, per pair,
/// in how many of them it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub total: u64,
    pub counts: Vec<Vec<u64>>,
}

impl Enumeration {
    fn zero(n: usize) -> Self {
        Enumeration {
            total: 0,
            counts: mat![0; n; n],
        }
    }

    /// Per-pair probabilities. All zeros when nothing is consistent.
    pub fn probabilities(&self) -> Vec<Vec<f64>> {
        let n = self.counts.len();
        let mut probs = mat![0.0; n; n];
        if self.total > 0 {
            for i in 0..n {
                for j in 0..n {
                    probs[i][j] = self.counts[i][j] as f64 / self.total as f64;
                }
            }
        }
        probs
    }
}

// ---------- reading season files ----------

/// Splits a string into digit runs and lowercased text runs, so that
/// `week_2` sorts before `week_10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalPart {
    Num(u64),
    Text(String),
}

pub fn natural_key(s: &str) -> Vec<NaturalPart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();
    let flush_text = |text: &mut String, parts: &mut Vec<NaturalPart>| {
        if !text.is_empty() {
            parts.push(NaturalPart::Text(std::mem::take(text).to_lowercase()));
        }
    };
    let flush_digits = |digits: &mut String, parts: &mut Vec<NaturalPart>| {
        if !digits.is_empty() {
            // Digit runs beyond u64 range stay textual.
            match digits.parse() {
                Ok(n) => parts.push(NaturalPart::Num(n)),
                Err(_) => parts.push(NaturalPart::Text(std::mem::take(digits))),
            }
            digits.clear();
        }
    };
    for c in s.chars() {
        if c.is_ascii_digit() {
            flush_text(&mut text, &mut parts);
            digits.push(c);
        } else {
            flush_digits(&mut digits, &mut parts);
            text.push(c);
        }
    }
    flush_text(&mut text, &mut parts);
    flush_digits(&mut digits, &mut parts);
    parts
}

/// Week index encoded in a filename: the first digit run, if any.
pub fn week_of(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Strips `//` line comments and `/* */` block comments, leaving string
/// literals untouched.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Reads one JSON document, tolerating a UTF-8 BOM, surrounding
/// whitespace, and (optionally) comments.
pub fn read_json_file(path: &Path, allow_comments: bool) -> Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let mut cleaned = raw.trim_start_matches('\u{feff}').trim().to_string();
    if cleaned.is_empty() {
        bail!("{:?} is empty", path);
    }
    if allow_comments {
        cleaned = strip_comments(&cleaned);
    }
    serde_json::from_str(&cleaned).with_context(|| format!("invalid JSON in {:?}", path))
}

/// Loads every `<prefix>*.json` in `dir` (case-insensitive), in natural
/// filename order. A missing directory reads as no files.
pub fn load_json_files(
    dir: &Path,
    prefix: &str,
    allow_comments: bool,
    verbose: bool,
) -> Result<Vec<(PathBuf, Value)>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {:?}", dir))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.starts_with(prefix) && lower.ends_with(".json")
        })
        .collect();
    names.sort_by_key(|name| natural_key(name));
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(&name);
        if verbose {
            eprintln!("[load] {}", path.display());
        }
        let doc = read_json_file(&path, allow_comments)?;
        out.push((path, doc));
    }
    Ok(out)
}

/// Parses a truth booth verdict. Returns `true` for a confirmed match.
pub fn parse_truth_result(v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i != 0),
            None => bail!("unrecognized truth booth result: {}", v),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "match" | "true" | "yes" | "1" => Ok(true),
            "no match" | "nomatch" | "false" | "no" | "0" => Ok(false),
            _ => bail!("unrecognized truth booth result: {:?}", s),
        },
        _ => bail!("unrecognized truth booth result: {}", v),
    }
}

fn string_array(v: &Value) -> Option<Vec<String>> {
    let arr = v.as_array()?;
    arr.iter()
        .map(|x| x.as_str().map(|s| s.to_string()))
        .collect()
}

/// Extracts the roster from a ceremony document. With `allow_from_matches`
/// the roster may be derived from the order of appearance in a `matches`
/// list when the explicit arrays are absent.
pub fn roster_from_ceremony(
    obj: &Value,
    allow_from_matches: bool,
) -> Option<(Vec<String>, Vec<String>)> {
    let men = obj.get("men").and_then(string_array).unwrap_or_default();
    let women = obj.get("women").and_then(string_array).unwrap_or_default();
    if !men.is_empty() && !women.is_empty() {
        return Some((men, women));
    }
    if allow_from_matches {
        if let Some(matches) = obj.get("matches").and_then(Value::as_array) {
            let mut men = Vec::new();
            let mut women = Vec::new();
            for pair in matches {
                let man = pair.get("man").and_then(Value::as_str).unwrap_or("").trim();
                let woman = pair
                    .get("woman")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                if !man.is_empty() && !men.iter().any(|m| m == man) {
                    men.push(man.to_string());
                }
                if !woman.is_empty() && !women.iter().any(|w| w == woman) {
                    women.push(woman.to_string());
                }
            }
            if !men.is_empty() && !women.is_empty() {
                return Some((men, women));
            }
        }
    }
    None
}

/// Reads a non-negative count that may arrive as an integer, an integral
/// float, or a numeric string.
fn count_value(v: &Value) -> Option<u64> {
    match v {
        Value::Number(_) => v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Builds the seating masks for one ceremony against a fixed roster. The
/// document must carry the seating as an `n x n` `matchups` matrix or a
/// `matches` list, plus the announced beam count under `result`.
pub fn ceremony_constraint(
    obj: &Value,
    men: &[String],
    women: &[String],
) -> Result<CeremonyConstraint> {
    let n = men.len();
    let beams = match obj.get("result").and_then(count_value) {
        Some(b) => b,
        None => bail!("ceremony missing 'result'"),
    };

    if let Some(matrix) = obj.get("matchups") {
        let matrix = matrix
            .as_array()
            .with_context(|| "'matchups' must be an array")?;
        if matrix.len() != n {
            bail!("ceremony matchups must be {}x{}", n, n);
        }
        let mut rows = Vec::with_capacity(n);
        for row in matrix {
            let row = row.as_array().with_context(|| "'matchups' row")?;
            if row.len() != n {
                bail!("ceremony matchups must be {}x{}", n, n);
            }
            let mut mask = 0u64;
            for (j, v) in row.iter().enumerate() {
                let seated = v
                    .as_f64()
                    .map(|f| f != 0.0)
                    .or_else(|| v.as_bool());
                match seated {
                    Some(false) => {}
                    Some(true) => mask |= 1 << j,
                    None => bail!("ceremony matchups cell must be 0 or 1"),
                }
            }
            rows.push(mask);
        }
        return Ok(CeremonyConstraint { rows, beams });
    }

    if let Some(matches) = obj.get("matches").and_then(Value::as_array) {
        let man_index: FxHashMap<&str, usize> =
            men.iter().enumerate().map(|(i, m)| (m.as_str(), i)).collect();
        let woman_index: FxHashMap<&str, usize> = women
            .iter()
            .enumerate()
            .map(|(j, w)| (w.as_str(), j))
            .collect();
        let mut rows = vec![0u64; n];
        for pair in matches {
            let man = pair.get("man").and_then(Value::as_str).unwrap_or("").trim();
            let woman = pair
                .get("woman")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            match (man_index.get(man), woman_index.get(woman)) {
                (Some(&i), Some(&j)) => rows[i] |= 1 << j,
                _ => bail!("unknown name in matches: {:?} / {:?}", man, woman),
            }
        }
        return Ok(CeremonyConstraint { rows, beams });
    }

    bail!("ceremony must contain either 'matchups' or 'matches'")
}

/// Builds the season problem from ceremony and truth booth documents. The
/// roster comes from the earliest ceremony file; later files that declare
/// their own roster must agree with it.
pub fn build_problem(
    ceremony_docs: &[(PathBuf, Value)],
    truth_docs: &[(PathBuf, Value)],
) -> Result<Problem> {
    let mut docs: Vec<&(PathBuf, Value)> = ceremony_docs.iter().collect();
    docs.sort_by_key(|(path, _)| natural_key(&path.to_string_lossy()));

    let mut roster: Option<(Vec<String>, Vec<String>)> = None;
    let mut ceremonies = Vec::new();
    for (idx, (path, obj)) in docs.iter().enumerate() {
        match &roster {
            None if idx == 0 => {
                let Some(r) = roster_from_ceremony(obj, true) else {
                    bail!("{:?}: cannot infer men/women roster", path);
                };
                roster = Some(r);
            }
            _ => {
                if let Some((cm, cw)) = roster_from_ceremony(obj, false) {
                    if Some(&(cm, cw)) != roster.as_ref() {
                        bail!("{:?}: men/women differ from earlier ceremony file(s)", path);
                    }
                }
            }
        }
        let (men, women) = roster.as_ref().with_context(|| "roster not established")?;
        let constraint = ceremony_constraint(obj, men, women)
            .with_context(|| format!("in {:?}", path))?;
        ceremonies.push(constraint);
    }

    let Some((men, women)) = roster else {
        bail!("need at least one ceremony to define the roster");
    };
    let n = men.len();
    if n != women.len() {
        bail!("roster must pair {} men with {} women", n, women.len());
    }
    if n > MAX_ROSTER {
        bail!("rosters larger than {} are not supported", MAX_ROSTER);
    }

    let man_index: FxHashMap<&str, usize> =
        men.iter().enumerate().map(|(i, m)| (m.as_str(), i)).collect();
    let woman_index: FxHashMap<&str, usize> = women
        .iter()
        .enumerate()
        .map(|(j, w)| (w.as_str(), j))
        .collect();

    let mut allowed = vec![(1u64 << n) - 1; n];
    let mut forced: FxHashMap<usize, usize> = FxHashMap::default();
    for (path, obj) in truth_docs {
        let man = obj.get("man").and_then(Value::as_str).unwrap_or("").trim();
        let woman = obj
            .get("woman")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let (Some(&i), Some(&j)) = (man_index.get(man), woman_index.get(woman)) else {
            bail!("{:?}: unknown names {:?}, {:?}", path, man, woman);
        };
        let verdict = parse_truth_result(obj.get("result").unwrap_or(&Value::Null))
            .with_context(|| format!("in {:?}", path))?;
        if verdict {
            if let Some(&prev) = forced.get(&i) {
                if prev != j {
                    bail!("conflicting forced matches for {}", man);
                }
            }
            forced.insert(i, j);
        } else {
            allowed[i] &= !(1 << j);
        }
    }

    for (&i, &j) in &forced {
        if allowed[i] & (1 << j) == 0 {
            bail!(
                "forced pair {} / {} contradicts a 'no match'",
                men[i],
                women[j]
            );
        }
        allowed[i] = 1 << j;
        for ii in 0..n {
            if ii != i {
                allowed[ii] &= !(1 << j);
            }
        }
        for (&ii, &jj) in &forced {
            if ii != i && jj == j {
                bail!("two forced pairs use woman {}", women[j]);
            }
        }
    }

    for i in 0..n {
        if allowed[i] == 0 {
            bail!(
                "no allowed options remain for {} after truth-booth constraints",
                men[i]
            );
        }
    }

    Ok(Problem {
        men,
        women,
        ceremonies,
        allowed,
        forced,
    })
}

// ---------- the search ----------

struct Search<'a> {
    n: usize,
    full_mask: u64,
    rows: Vec<&'a [u64]>,
    beams: Vec<u64>,
    allowed: &'a [u64],
    order: Vec<usize>,
    assignment: Vec<Option<usize>>,
    sofar: Vec<u64>,
    free_men: Vec<usize>,
    total: u64,
    counts: Vec<Vec<u64>>,
}

impl Search<'_> {
    /// Optimistic count of additional beams ceremony `k` could still gain
    /// from the currently unassigned men (minus `skip`).
    fn upper_bound(&self, k: usize, avail_mask: u64, skip: Option<usize>) -> u64 {
        let rows = self.rows[k];
        let mut ub = 0;
        for &i in &self.free_men {
            if self.assignment[i].is_none()
                && Some(i) != skip
                && rows[i] & self.allowed[i] & avail_mask != 0
            {
                ub += 1;
            }
        }
        ub
    }

    fn feasible_here(&self, taken: u64, skip: Option<usize>) -> bool {
        let avail = !taken & self.full_mask;
        for k in 0..self.rows.len() {
            if self.sofar[k] > self.beams[k] {
                return false;
            }
            if self.sofar[k] + self.upper_bound(k, avail, skip) < self.beams[k] {
                return false;
            }
        }
        true
    }

    fn dfs(&mut self, idx: usize, taken: u64) {
        if idx == self.order.len() {
            if self.sofar != self.beams {
                return;
            }
            self.total += 1;
            for (i, a) in self.assignment.iter().enumerate() {
                if let Some(j) = a {
                    self.counts[i][*j] += 1;
                }
            }
            return;
        }

        let i = self.order[idx];
        if self.assignment[i].is_some() {
            if self.feasible_here(taken, None) {
                self.dfs(idx + 1, taken);
            }
            return;
        }

        let candidates = self.allowed[i] & !taken;
        if candidates == 0 {
            return;
        }
        let mut cand_js: Vec<usize> = (0..self.n).filter(|j| candidates >> j & 1 == 1).collect();
        // Try women this man was seated with most often first; among the
        // rest prefer the ones fewest other men still compete for.
        cand_js.sort_by_key(|&j| {
            let hits = self.rows.iter().filter(|r| r[i] >> j & 1 == 1).count();
            let fanout = self
                .free_men
                .iter()
                .filter(|&&ii| {
                    ii != i && self.assignment[ii].is_none() && self.allowed[ii] >> j & 1 == 1
                })
                .count();
            (std::cmp::Reverse(hits), fanout)
        });

        for j in cand_js {
            let mut ok = true;
            for k in 0..self.rows.len() {
                if self.rows[k][i] >> j & 1 == 1 && self.sofar[k] + 1 > self.beams[k] {
                    ok = false;
                    break;
                }
            }
            if !ok {
                continue;
            }

            let next_taken = taken | 1 << j;
            for k in 0..self.rows.len() {
                self.sofar[k] += self.rows[k][i] >> j & 1;
            }
            self.assignment[i] = Some(j);
            if self.feasible_here(next_taken, Some(i)) {
                self.dfs(idx + 1, next_taken);
            }
            self.assignment[i] = None;
            for k in 0..self.rows.len() {
                self.sofar[k] -= self.rows[k][i] >> j & 1;
            }
        }
    }
}

/// Walks every consistent perfect matching and counts per-pair
/// occurrences. A problem whose forced pairs already violate a beam count
/// returns the zero enumeration.
pub fn enumerate_matchings(problem: &Problem) -> Enumeration {
    let n = problem.men.len();
    let mut assignment = vec![None; n];
    let mut taken = 0u64;
    for (&i, &j) in &problem.forced {
        if taken >> j & 1 == 1 {
            return Enumeration::zero(n);
        }
        assignment[i] = Some(j);
        taken |= 1 << j;
    }

    let mut sofar = vec![0u64; problem.ceremonies.len()];
    for (k, cer) in problem.ceremonies.iter().enumerate() {
        let mut cnt = 0;
        for (i, a) in assignment.iter().enumerate() {
            if let Some(j) = a {
                cnt += cer.rows[i] >> j & 1;
            }
        }
        sofar[k] = cnt;
        if sofar[k] > cer.beams {
            return Enumeration::zero(n);
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    let domain = |i: usize| {
        if assignment[i].is_some() {
            1
        } else {
            (problem.allowed[i] & !taken).count_ones()
        }
    };
    order.sort_by_key(|&i| domain(i));

    let free_men: Vec<usize> = (0..n).filter(|&i| assignment[i].is_none()).collect();
    let mut search = Search {
        n,
        full_mask: (1u64 << n) - 1,
        rows: problem.ceremonies.iter().map(|c| c.rows.as_slice()).collect(),
        beams: problem.ceremonies.iter().map(|c| c.beams).collect(),
        allowed: &problem.allowed,
        order,
        assignment,
        sofar,
        free_men,
        total: 0,
        counts: mat![0; n; n],
    };
    search.dfs(0, taken);
    Enumeration {
        total: search.total,
        counts: search.counts,
    }
}

// ---------- season drivers ----------

/// All season input files, loaded once.
#[derive(Debug, Clone)]
pub struct SeasonFiles {
    pub ceremonies: Vec<(PathBuf, Value)>,
    pub booths: Vec<(PathBuf, Value)>,
}

/// Loads `week_*.json` ceremonies and `booth_*.json` truth booths.
pub fn load_season(
    ceremony_dir: &Path,
    booth_dir: &Path,
    allow_comments: bool,
    verbose: bool,
) -> Result<SeasonFiles> {
    Ok(SeasonFiles {
        ceremonies: load_json_files(ceremony_dir, "week_", allow_comments, verbose)?,
        booths: load_json_files(booth_dir, "booth_", allow_comments, verbose)?,
    })
}

impl SeasonFiles {
    /// Highest week index named by a ceremony file.
    pub fn max_week(&self) -> Option<u64> {
        self.ceremonies
            .iter()
            .filter_map(|(p, _)| week_of(p))
            .max()
    }

    fn upto(docs: &[(PathBuf, Value)], week: u64) -> Vec<(PathBuf, Value)> {
        docs.iter()
            .filter(|(p, _)| week_of(p).is_some_and(|w| w <= week))
            .cloned()
            .collect()
    }

    fn earliest_ceremony(&self) -> Result<(PathBuf, Value)> {
        self.ceremonies
            .iter()
            .min_by_key(|(p, _)| week_of(p).unwrap_or(u64::MAX))
            .cloned()
            .with_context(|| "no ceremony files found (needed for roster)")
    }

    /// The problem using every loaded file.
    pub fn full_problem(&self) -> Result<Problem> {
        if self.ceremonies.is_empty() {
            bail!("no ceremony files found (needed for roster)");
        }
        build_problem(&self.ceremonies, &self.booths)
    }

    /// The problem using files up to and including `week`. Week 0 keeps the
    /// roster from the earliest ceremony but drops all ceremony
    /// constraints, so it reflects truth booths alone.
    pub fn problem_for_week(&self, week: u64) -> Result<Problem> {
        let booths = Self::upto(&self.booths, week);
        if week == 0 {
            let first = self.earliest_ceremony()?;
            let mut problem = build_problem(std::slice::from_ref(&first), &booths)?;
            problem.ceremonies.clear();
            return Ok(problem);
        }
        let ceremonies = Self::upto(&self.ceremonies, week);
        if ceremonies.is_empty() {
            bail!("no ceremony files found (needed for roster)");
        }
        build_problem(&ceremonies, &booths)
    }
}

/// Dataset document written for one enumeration, in the shape the viewer
/// reads back.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonOutput {
    pub men: Vec<String>,
    pub women: Vec<String>,
    pub probabilities: Vec<Vec<f64>>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<u64>,
}

impl SeasonOutput {
    pub fn new(problem: &Problem, enumeration: &Enumeration, week: Option<u64>) -> Self {
        SeasonOutput {
            men: problem.men.clone(),
            women: problem.women.clone(),
            probabilities: enumeration.probabilities(),
            total: enumeration.total,
            week,
        }
    }
}
