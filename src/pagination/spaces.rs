//! Space specifier arithmetic.
//!
//! `space-before` / `space-after` are five-field specifiers, not plain
//! lengths: `{min, opt, max, precedence, conditionality}`. Adjacent vertical
//! spaces collapse by the max rule after precedence filtering; conditional
//! (`discard`) spaces vanish at region edges. The page formatter uses `opt`
//! normally, retreats to `min` to satisfy a keep, and may stretch toward
//! `max` to fill a page.

use crate::properties::SpaceSpec;

/// Collapse two adjacent specifiers (previous sibling's space-after and next
/// sibling's space-before). Higher precedence suppresses the other; equal
/// precedence takes the component-wise max.
pub fn collapse_pair(after: SpaceSpec, before: SpaceSpec) -> SpaceSpec {
    if after.precedence > before.precedence {
        return after;
    }
    if before.precedence > after.precedence {
        return before;
    }
    SpaceSpec {
        minimum: after.minimum.max(before.minimum),
        optimum: after.optimum.max(before.optimum),
        maximum: after.maximum.max(before.maximum),
        precedence: after.precedence,
        discard: after.discard && before.discard,
    }
}

/// Collapse a chain of specifiers. The loop is bounded by `max_iterations`;
/// a longer chain collapses pairwise in document order, which converges in
/// one pass but the guard keeps hostile inputs finite.
pub fn collapse_chain(specs: &[SpaceSpec], max_iterations: u32) -> SpaceSpec {
    let mut result = SpaceSpec::ZERO;
    let mut first = true;
    for (i, &spec) in specs.iter().enumerate() {
        if i as u32 >= max_iterations.max(1) * specs.len().max(1) as u32 {
            break;
        }
        if first {
            result = spec;
            first = false;
        } else {
            result = collapse_pair(result, spec);
        }
    }
    result
}

/// The space actually inserted at a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSpace {
    pub used: f64,
    pub minimum: f64,
}

/// Resolve a collapsed specifier at a placement point. At a region edge
/// (page top for space-before, page bottom for space-after), conditional
/// spaces are discarded.
pub fn resolve(spec: SpaceSpec, at_region_edge: bool) -> ResolvedSpace {
    if at_region_edge && spec.discard {
        return ResolvedSpace { used: 0.0, minimum: 0.0 };
    }
    ResolvedSpace { used: spec.optimum, minimum: spec.minimum }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(min: f64, opt: f64, max: f64) -> SpaceSpec {
        SpaceSpec { minimum: min, optimum: opt, maximum: max, precedence: 0, discard: true }
    }

    #[test]
    fn collapse_takes_componentwise_max() {
        let merged = collapse_pair(spec(2.0, 6.0, 8.0), spec(4.0, 5.0, 10.0));
        assert_eq!((merged.minimum, merged.optimum, merged.maximum), (4.0, 6.0, 10.0));
    }

    #[test]
    fn higher_precedence_suppresses() {
        let weak = spec(0.0, 20.0, 20.0);
        let strong = SpaceSpec { precedence: 5, ..spec(1.0, 2.0, 3.0) };
        let merged = collapse_pair(weak, strong);
        assert_eq!(merged.optimum, 2.0);
    }

    #[test]
    fn retain_beats_discard_in_pair() {
        let discard = spec(0.0, 6.0, 6.0);
        let retain = SpaceSpec { discard: false, ..spec(0.0, 4.0, 4.0) };
        let merged = collapse_pair(discard, retain);
        assert!(!merged.discard);
    }

    #[test]
    fn edge_discards_conditional_space() {
        let resolved = resolve(spec(2.0, 6.0, 8.0), true);
        assert_eq!(resolved.used, 0.0);
        let kept = resolve(SpaceSpec { discard: false, ..spec(2.0, 6.0, 8.0) }, true);
        assert_eq!(kept.used, 6.0);
    }

    #[test]
    fn mid_page_uses_optimum() {
        let resolved = resolve(spec(2.0, 6.0, 8.0), false);
        assert_eq!(resolved.used, 6.0);
        assert_eq!(resolved.minimum, 2.0);
    }

    #[test]
    fn chain_collapse_converges() {
        let chain = [spec(1.0, 2.0, 3.0), spec(0.0, 5.0, 5.0), spec(2.0, 2.0, 9.0)];
        let merged = collapse_chain(&chain, 10);
        assert_eq!(merged.optimum, 5.0);
        assert_eq!(merged.maximum, 9.0);
    }
}
