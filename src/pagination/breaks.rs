//! Break opportunity bookkeeping.
//!
//! Between every two placed atoms sits a potential page break whose
//! *forbidding* weight is the strongest keep spanning it. On overflow the
//! formatter picks the latest opportunity whose weight falls below a rising
//! threshold: first anything weaker than `always`; only if every opportunity
//! is `always`-kept, any opportunity at all, with a diagnostic, because an
//! unsatisfiable keep must not wedge pagination.

use crate::properties::parse::KeepStrength;

/// A break opportunity before the atom at `placed_index`.
#[derive(Debug, Clone, Copy)]
pub struct BreakCandidate {
    /// Number of atoms that stay on the page when breaking here.
    pub placed_index: usize,
    /// Strongest keep spanning this boundary.
    pub forbid: KeepStrength,
    /// The boundary lies inside a block whose `keep-together` produced the
    /// keep (as opposed to keep-with-next/previous between blocks).
    pub within_keep_together: bool,
}

/// Outcome of break selection.
#[derive(Debug, Clone, Copy)]
pub struct BreakChoice {
    pub placed_index: usize,
    /// A keep had to be violated to break at all.
    pub violated: bool,
    pub violated_keep_together: bool,
}

/// Choose where to end the page. Returns `None` when there is no opportunity
/// at all (nothing placed yet).
pub fn select_break(candidates: &[BreakCandidate]) -> Option<BreakChoice> {
    // Pass 1: latest candidate not forbidden outright.
    if let Some(c) = candidates.iter().rev().find(|c| c.forbid < KeepStrength::Always) {
        return Some(BreakChoice {
            placed_index: c.placed_index,
            violated: false,
            violated_keep_together: false,
        });
    }
    // Pass 2: every boundary is always-kept; take the latest anyway.
    candidates.last().map(|c| BreakChoice {
        placed_index: c.placed_index,
        violated: true,
        violated_keep_together: c.within_keep_together,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, forbid: KeepStrength) -> BreakCandidate {
        BreakCandidate { placed_index: index, forbid, within_keep_together: false }
    }

    #[test]
    fn picks_latest_unforbidden() {
        let candidates = vec![
            candidate(1, KeepStrength::Auto),
            candidate(2, KeepStrength::Auto),
            candidate(3, KeepStrength::Always),
        ];
        let choice = select_break(&candidates).unwrap();
        assert_eq!(choice.placed_index, 2);
        assert!(!choice.violated);
    }

    #[test]
    fn integer_strengths_are_breakable_below_always() {
        let candidates = vec![
            candidate(1, KeepStrength::Strength(3)),
            candidate(2, KeepStrength::Always),
        ];
        let choice = select_break(&candidates).unwrap();
        assert_eq!(choice.placed_index, 1);
        assert!(!choice.violated);
    }

    #[test]
    fn all_always_forces_violation() {
        let candidates = vec![
            candidate(1, KeepStrength::Always),
            candidate(2, KeepStrength::Always),
        ];
        let choice = select_break(&candidates).unwrap();
        assert_eq!(choice.placed_index, 2);
        assert!(choice.violated);
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert!(select_break(&[]).is_none());
    }
}
