use serde_json::Value;

/// Keys accepted for the man's name in record-shaped pair entries, in
/// lookup order.
pub const MAN_KEYS: [&str; 3] = ["man", "male", "guy"];

/// Keys accepted for the woman's name in record-shaped pair entries, in
/// lookup order.
pub const WOMAN_KEYS: [&str; 3] = ["woman", "female", "girl"];

/// Keys under which a ceremony document may store its pair list, in
/// precedence order. The first key present wins even if its value
/// normalizes to nothing.
pub const CEREMONY_PAIR_KEYS: [&str; 4] = ["pairs", "matches", "matchups", "couples"];

/// A matchup between one man and one woman. Names keep their original
/// casing for display; identity is decided by [`Pair::key`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub man: String,
    pub woman: String,
}

impl Pair {
    pub fn new(man: &str, woman: &str) -> Self {
        Self {
            man: man.trim().to_string(),
            woman: woman.trim().to_string(),
        }
    }

    /// Case- and whitespace-insensitive identity of this pair.
    pub fn key(&self) -> String {
        pair_key(&self.man, &self.woman)
    }
}

/// Canonical form of a participant name: trimmed and lowercased.
pub fn canon(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Identity of a matchup. Two pairs are the same pair iff their keys are
/// equal, regardless of casing or surrounding whitespace in the source data.
pub fn pair_key(man: &str, woman: &str) -> String {
    format!("{}+{}", canon(man), canon(woman))
}

fn name_of(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn field<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| obj.get(*k).and_then(name_of))
}

/// The shape a raw pair collection was classified as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairShape {
    /// Array of `[man, woman, ...]` arrays. Elements past the second are ignored.
    PairList,
    /// Array of objects carrying name fields under accepted key aliases.
    RecordList,
    /// Object mapping man name to woman name, in document order.
    NameMap,
    /// Nothing usable (null, scalar, or an empty/unrecognizable array).
    Empty,
}

/// Classifies a raw value by inspecting its shape once. Arrays are
/// classified by their first array- or object-shaped element.
pub fn classify(raw: &Value) -> PairShape {
    match raw {
        Value::Array(entries) => {
            for e in entries {
                match e {
                    Value::Array(_) => return PairShape::PairList,
                    Value::Object(_) => return PairShape::RecordList,
                    _ => continue,
                }
            }
            PairShape::Empty
        }
        Value::Object(_) => PairShape::NameMap,
        _ => PairShape::Empty,
    }
}

/// Normalizes any accepted raw pair shape into a list of [`Pair`]s,
/// preserving source order. Entries missing either name, or carrying a
/// non-string where a name is expected, are dropped.
pub fn normalize(raw: &Value) -> Vec<Pair> {
    match classify(raw) {
        PairShape::PairList => {
            let Value::Array(entries) = raw else {
                return vec![];
            };
            entries
                .iter()
                .filter_map(|e| match e {
                    Value::Array(xs) => {
                        let man = xs.first().and_then(name_of)?;
                        let woman = xs.get(1).and_then(name_of)?;
                        Some(Pair::new(man, woman))
                    }
                    _ => None,
                })
                .collect()
        }
        PairShape::RecordList => {
            let Value::Array(entries) = raw else {
                return vec![];
            };
            entries
                .iter()
                .filter_map(|e| match e {
                    Value::Object(obj) => {
                        let man = field(obj, &MAN_KEYS)?;
                        let woman = field(obj, &WOMAN_KEYS)?;
                        Some(Pair::new(man, woman))
                    }
                    _ => None,
                })
                .collect()
        }
        PairShape::NameMap => {
            let Value::Object(obj) = raw else {
                return vec![];
            };
            obj.iter()
                .filter_map(|(man, v)| {
                    if man.trim().is_empty() {
                        return None;
                    }
                    let woman = name_of(v)?;
                    Some(Pair::new(man, woman))
                })
                .collect()
        }
        PairShape::Empty => vec![],
    }
}

/// Locates the pair list inside a ceremony document. If the document wraps
/// its payload in a `ceremony` object, the lookup descends into it first.
/// Returns the raw value under the first present alias key.
pub fn ceremony_pairs(doc: &Value) -> Option<&Value> {
    let obj = ceremony_body(doc)?;
    CEREMONY_PAIR_KEYS
        .iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
}

/// The object holding ceremony fields: `doc.ceremony` when that is an
/// object, otherwise the document itself.
pub fn ceremony_body(doc: &Value) -> Option<&serde_json::Map<String, Value>> {
    let obj = doc.as_object()?;
    match obj.get("ceremony") {
        Some(Value::Object(inner)) => Some(inner),
        _ => Some(obj),
    }
}
