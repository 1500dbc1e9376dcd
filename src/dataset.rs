use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pairs::pair_key;

/// A week's dataset as found on disk or over HTTP. Every field is optional
/// in the wire format; absent rosters read as empty and absent matrix cells
/// read as probability 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekDataset {
    #[serde(default)]
    pub men: Vec<String>,
    #[serde(default)]
    pub women: Vec<String>,
    /// Probability matrix. Kept as raw values so malformed cells can degrade
    /// to 0 instead of failing the whole document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<Vec<Value>>>,
    /// Optional orientation tag, `men_by_women` or `women_by_men`.
    #[serde(
        default,
        rename = "matrix_orientation",
        alias = "orientation",
        skip_serializing_if = "Option::is_none"
    )]
    pub orientation: Option<String>,
    /// Ceremony embedded directly in the dataset document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceremony: Option<Value>,
    /// Number of matchings consistent with the constraints, when the
    /// dataset was produced by the enumeration engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u64>,
}

/// How the probability matrix is laid out in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Rows are men, columns are women.
    #[default]
    MenByWomen,
    /// Rows are women, columns are men.
    WomenByMen,
}

impl Orientation {
    fn from_tag(tag: &str) -> Option<Orientation> {
        match tag.trim().to_lowercase().as_str() {
            "men_by_women" => Some(Orientation::MenByWomen),
            "women_by_men" => Some(Orientation::WomenByMen),
            _ => None,
        }
    }
}

/// Resolves the matrix orientation. An explicit, recognized tag always
/// wins. Otherwise the matrix dimensions decide, and a matrix that fits
/// neither way (or is missing) is read as men-by-women.
pub fn resolve_orientation(
    tag: Option<&str>,
    rows: usize,
    cols: usize,
    men: usize,
    women: usize,
) -> Orientation {
    if let Some(o) = tag.and_then(Orientation::from_tag) {
        return o;
    }
    if rows == men && cols == women {
        Orientation::MenByWomen
    } else if rows == women && cols == men {
        Orientation::WomenByMen
    } else {
        Orientation::default()
    }
}

/// The resolved probability grid: always men-by-women, always exactly
/// `men.len() * women.len()` cells.
#[derive(Debug, Clone)]
pub struct Grid {
    pub men: Vec<String>,
    pub women: Vec<String>,
    pub orientation: Orientation,
    values: Vec<Vec<f64>>,
}

fn cell_value(rows: &[Vec<Value>], r: usize, c: usize) -> f64 {
    rows.get(r)
        .and_then(|row| row.get(c))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

impl Grid {
    /// Builds the grid from a dataset, transposing the matrix when it is
    /// oriented women-by-men.
    pub fn build(ds: &WeekDataset) -> Grid {
        let men = ds.men.clone();
        let women = ds.women.clone();
        let matrix = ds.probabilities.as_deref().unwrap_or(&[]);
        let cols = matrix.iter().map(|r| r.len()).max().unwrap_or(0);
        let orientation = resolve_orientation(
            ds.orientation.as_deref(),
            matrix.len(),
            cols,
            men.len(),
            women.len(),
        );
        let values = (0..men.len())
            .map(|mi| {
                (0..women.len())
                    .map(|wi| match orientation {
                        Orientation::MenByWomen => cell_value(matrix, mi, wi),
                        Orientation::WomenByMen => cell_value(matrix, wi, mi),
                    })
                    .collect()
            })
            .collect();
        Grid {
            men,
            women,
            orientation,
            values,
        }
    }

    pub fn rows(&self) -> usize {
        self.men.len()
    }

    pub fn cols(&self) -> usize {
        self.women.len()
    }

    pub fn cell_count(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Probability for man `mi` and woman `wi`. Out-of-range indices read
    /// as 0, same as cells the source matrix never provided.
    pub fn value(&self, mi: usize, wi: usize) -> f64 {
        self.values
            .get(mi)
            .and_then(|row| row.get(wi))
            .copied()
            .unwrap_or(0.0)
    }

    /// Probabilities keyed by pair identity, for lookups from the ceremony
    /// table and the top-pairs summary.
    pub fn key_values(&self) -> FxHashMap<String, f64> {
        let mut out = FxHashMap::default();
        for (mi, man) in self.men.iter().enumerate() {
            for (wi, woman) in self.women.iter().enumerate() {
                out.insert(pair_key(man, woman), self.value(mi, wi));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn dataset(men: usize, women: usize, matrix: Value) -> WeekDataset {
        serde_json::from_value(json!({
            "men": names("M", men),
            "women": names("W", women),
            "probabilities": matrix,
        }))
        .unwrap()
    }

    #[test]
    fn test_grid_has_full_cell_count_and_zero_fills() {
        // Ragged and short matrices fill the missing cells with 0.
        let ds = dataset(3, 2, json!([[0.5], [0.1, 0.9]]));
        let g = Grid::build(&ds);
        assert_eq!(g.cell_count(), 6);
        assert_eq!(g.value(0, 0), 0.5);
        assert_eq!(g.value(0, 1), 0.0);
        assert_eq!(g.value(1, 1), 0.9);
        assert_eq!(g.value(2, 0), 0.0);
        assert_eq!(g.value(9, 9), 0.0);
    }

    #[test]
    fn test_malformed_cells_read_as_zero() {
        let ds = dataset(1, 3, json!([["0.5", null, 0.25]]));
        let g = Grid::build(&ds);
        assert_eq!(g.value(0, 0), 0.0);
        assert_eq!(g.value(0, 1), 0.0);
        assert_eq!(g.value(0, 2), 0.25);
    }

    #[test]
    fn test_orientation_inferred_from_dimensions() {
        // 2 men, 3 women; a 2x3 matrix reads rows as men.
        let ds = dataset(2, 3, json!([[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]));
        let g = Grid::build(&ds);
        assert_eq!(g.orientation, Orientation::MenByWomen);
        assert_eq!(g.value(1, 2), 0.6);

        // Same roster with a 3x2 matrix reads rows as women.
        let ds = dataset(2, 3, json!([[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]));
        let g = Grid::build(&ds);
        assert_eq!(g.orientation, Orientation::WomenByMen);
        assert_eq!(g.value(1, 2), 0.6);
        assert_eq!(g.value(0, 1), 0.3);
    }

    #[test]
    fn test_explicit_tag_beats_inference() {
        let mut ds = dataset(2, 2, json!([[0.1, 0.2], [0.3, 0.4]]));
        ds.orientation = Some("WOMEN_BY_MEN".to_string());
        let g = Grid::build(&ds);
        assert_eq!(g.orientation, Orientation::WomenByMen);
        assert_eq!(g.value(0, 1), 0.3);

        // An unrecognized tag falls back to inference.
        ds.orientation = Some("columns_first".to_string());
        let g = Grid::build(&ds);
        assert_eq!(g.orientation, Orientation::MenByWomen);
    }

    #[test]
    fn test_orientation_tag_reads_the_wire_name() {
        let ds: WeekDataset = serde_json::from_value(json!({
            "men": ["M0", "M1"],
            "women": ["W0", "W1"],
            "probabilities": [[0.1, 0.2], [0.3, 0.4]],
            "matrix_orientation": "women_by_men",
        }))
        .unwrap();
        assert_eq!(ds.orientation.as_deref(), Some("women_by_men"));
        let g = Grid::build(&ds);
        assert_eq!(g.value(0, 1), 0.3);
    }

    #[test]
    fn test_ambiguous_square_defaults_to_men_by_women() {
        assert_eq!(resolve_orientation(None, 4, 4, 4, 4), Orientation::MenByWomen);
        assert_eq!(resolve_orientation(None, 0, 0, 0, 0), Orientation::MenByWomen);
        assert_eq!(resolve_orientation(None, 7, 5, 2, 3), Orientation::MenByWomen);
    }

    #[test]
    fn test_dataset_tolerates_missing_fields() {
        let ds: WeekDataset = serde_json::from_str("{}").unwrap();
        assert!(ds.men.is_empty() && ds.women.is_empty());
        let g = Grid::build(&ds);
        assert_eq!(g.cell_count(), 0);
        assert_eq!(g.value(0, 0), 0.0);
    }

    #[test]
    fn test_key_values_lookup() {
        let ds = dataset(2, 2, json!([[0.1, 0.2], [0.3, 0.4]]));
        let kv = Grid::build(&ds).key_values();
        assert_eq!(kv.len(), 4);
        assert_eq!(kv["m1+w0"], 0.3);
    }
}
