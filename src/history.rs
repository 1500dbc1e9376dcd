use rustc_hash::FxHashSet;

use crate::pairs::Pair;

/// Records which pair identities were seated in each week's ceremony, so a
/// later week can ask whether a pair is being seen for the first time.
#[derive(Debug, Clone, Default)]
pub struct History {
    seen: Vec<FxHashSet<String>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the ceremony pairs for `week`, replacing anything previously
    /// recorded there. Weeks can be recorded in any order.
    pub fn record(&mut self, week: usize, pairs: &[Pair]) {
        if self.seen.len() <= week {
            self.seen.resize_with(week + 1, FxHashSet::default);
        }
        self.seen[week] = pairs.iter().map(Pair::key).collect();
    }

    /// Pair identities seated in any ceremony strictly before `week`.
    pub fn prior(&self, week: usize) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        for set in self.seen.iter().take(week) {
            out.extend(set.iter().cloned());
        }
        out
    }

    /// Whether `key` has never been seated before `week`.
    pub fn is_new(&self, week: usize, key: &str) -> bool {
        !self.seen.iter().take(week).any(|set| set.contains(key))
    }
}
