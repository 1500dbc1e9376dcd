#[cfg(feature = "reqwest")]
pub mod client;

// # AYTO Odds: The Matchup Probability Board
//
// This crate computes and serves weekly matchup probabilities for an
// "Are You The One?" style season: an exact enumeration engine over matching
// ceremonies and truth booths, a heatmap/ceremony scene model, an SVG
// renderer, and a small web dashboard.
//
// The crate is modular and uses feature flags (`reqwest`, `tokio`,
// `actix-web`) to enable the data fetching layer and the web server on top
// of the always-available core (normalization, scene, rendering, engine).

/// WWW server implementation. Enabled with `tokio` and `reqwest` features.
#[cfg(feature = "tokio")]
#[cfg(feature = "reqwest")]
pub mod www;

/// Week dataset and ceremony retrieval. Enabled with `reqwest` and `tokio` features.
#[cfg(all(feature = "reqwest", feature = "tokio"))]
pub mod source;

/// Shared board state: week selection, caching, relayout debouncing.
#[cfg(all(feature = "reqwest", feature = "tokio"))]
pub mod controller;

/// A trait for conveniently updating a value to its minimum or maximum.
pub trait SetMinMax {
    /// If `v` is less than `self`, updates `self` to `v` and returns `true`.
    /// Otherwise, returns `false`.
    fn setmin(&mut self, v: Self) -> bool;
    /// If `v` is greater than `self`, updates `self` to `v` and returns `true`.
    /// Otherwise, returns `false`.
    fn setmax(&mut self, v: Self) -> bool;
}
impl<T> SetMinMax for T
where
    T: PartialOrd,
{
    fn setmin(&mut self, v: T) -> bool {
        *self > v && {
            *self = v;
            true
        }
    }
    fn setmax(&mut self, v: T) -> bool {
        *self < v && {
            *self = v;
            true
        }
    }
}

/// A macro for convenient initialization of vectors, including nested vectors for multi-dimensional arrays.
///
/// # Examples
///
/// ```
/// use ayto_odds::mat;
/// // A simple vector
/// let v1 = mat![1, 2, 3];
///
/// // A 2x3 matrix initialized with zeros
/// let m1 = mat![0; 2; 3];
/// assert_eq!(m1, vec![vec![0, 0, 0], vec![0, 0, 0]]);
/// ```
#[macro_export]
macro_rules! mat {
    ($($e:expr),*) => { vec![$($e),*] };
    ($($e:expr,)*) => { vec![$($e),*] };
    ($e:expr; $d:expr) => { vec![$e; $d] };
    ($e:expr; $d:expr $(; $ds:expr)+) => { vec![mat![$e $(; $ds)*]; $d] };
}

/// Fatal start-up failures. Anything else (missing week files, bad cells)
/// degrades to absence or a neutral value instead of an error.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("data directory {0:?} does not exist or is not a directory")]
    DataDir(std::path::PathBuf),
    #[error("invalid base url {0}")]
    BaseUrl(String),
    #[error("week page template is missing its {{{{{{{0}}}}}}} mount")]
    MissingMount(&'static str),
}

#[cfg(test)]
mod tests {}

/// Raw pair shapes and the normalized pair model.
pub mod pairs;

/// Week dataset wire formats and the probability grid.
pub mod dataset;

/// Which pairs have been seen in earlier ceremonies.
pub mod history;

/// Probability-to-color interpolation in CIELAB space.
pub mod color;

/// Heatmap scene model: layout, cells, diffing, relayout.
pub mod scene;

/// SVG rendering of a heatmap scene.
pub mod svg;

/// Ceremony results table rendering.
pub mod ceremony;

/// Exact enumeration of matchings consistent with ceremonies and truth booths.
pub mod solver;

pub mod seasongen;
