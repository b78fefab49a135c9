//! Pure, `&self`-free cascade math: dampening curves and the static
//! cross-domain transition table. Everything here is unit-testable in
//! isolation with no engine state at all.

use std::sync::OnceLock;

use chronicle_events::category::EventCategory;

/// `base * (1 - dampening)^depth`. `depth = 0` is the identity case
/// (`(1-d)^0 == 1`), which is how "`depth <= 0` => base" falls out
/// naturally for the unsigned depth this crate uses.
pub fn dampened_probability(base: f64, dampening: f64, depth: u32) -> f64 {
    let base = base.clamp(0.0, 1.0);
    let dampening = dampening.clamp(0.0, 1.0);
    base * (1.0 - dampening).powi(depth as i32)
}

/// Significance-aware adjustment to a dampening value: high-significance
/// sources dampen less (consequences propagate more readily), very
/// low-significance sources dampen more.
pub fn adjust_dampening_for_significance(base: f64, significance: i32) -> f64 {
    let base = base.clamp(0.0, 1.0);
    let sig = significance.clamp(0, 100) as f64;
    let adjusted = if sig >= 80.0 {
        let t = ((sig - 80.0) / 20.0).clamp(0.0, 1.0);
        base * (1.0 - 0.4 * t)
    } else if sig < 30.0 {
        let t = ((30.0 - sig) / 30.0).clamp(0.0, 1.0);
        base * (1.0 + 0.5 * t)
    } else {
        base
    };
    adjusted.clamp(0.0, 1.0)
}

pub fn should_continue_cascade(probability: f64, threshold: f64) -> bool {
    probability >= threshold
}

/// Penalty multiplier applied when `cross_domain_modifier` has no entry
/// for a `(source, target)` pair.
pub const UNDEFINED_TRANSITION_PENALTY: f64 = 0.1;

/// A defined cross-domain transition: how strongly an event in one
/// domain tends to provoke a consequence in another, and the delay at
/// which that consequence typically manifests (informational -- actual
/// scheduling delay comes from the triggering `ConsequenceRule`, not
/// this table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossDomainEntry {
    pub multiplier: f64,
    pub typical_delay_ticks: u32,
}

type Table = std::collections::HashMap<(EventCategory, EventCategory), CrossDomainEntry>;

fn cross_domain_table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| {
        use EventCategory::*;
        let rows: &[(EventCategory, &[(EventCategory, f64, u32)])] = &[
            (Military, &[(Political, 0.6, 14), (Economic, 0.4, 30), (Personal, 0.3, 7)]),
            (Political, &[(Military, 0.5, 20), (Religious, 0.3, 40), (Cultural, 0.2, 60)]),
            (Religious, &[(Political, 0.4, 30), (Cultural, 0.5, 20), (Personal, 0.2, 10)]),
            (Personal, &[(Political, 0.2, 10), (Religious, 0.1, 15)]),
            (Economic, &[(Political, 0.3, 20), (Military, 0.2, 40), (Cultural, 0.1, 30)]),
            (Disaster, &[(Economic, 0.6, 10), (Religious, 0.4, 20), (Political, 0.3, 15), (Personal, 0.5, 5)]),
            (Magical, &[(Religious, 0.5, 10), (Cultural, 0.4, 20), (Scientific, 0.2, 30)]),
            (Cultural, &[(Religious, 0.3, 20), (Political, 0.2, 30), (Scientific, 0.2, 40)]),
            (Scientific, &[(Economic, 0.4, 30), (Magical, 0.2, 50), (Cultural, 0.3, 20)]),
            (Exploratory, &[(Economic, 0.4, 20), (Cultural, 0.3, 30), (Scientific, 0.3, 15)]),
        ];
        let mut table = Table::new();
        for (source, targets) in rows {
            for &(target, multiplier, typical_delay_ticks) in *targets {
                table.insert((*source, target), CrossDomainEntry { multiplier, typical_delay_ticks });
            }
        }
        table
    })
}

/// Look up the defined transition from `source` to `target`, if any.
/// Callers that get `None` apply [`UNDEFINED_TRANSITION_PENALTY`].
pub fn cross_domain_modifier(source: EventCategory, target: EventCategory) -> Option<CrossDomainEntry> {
    cross_domain_table().get(&(source, target)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dampened_probability_at_depth_zero_is_base() {
        assert_eq!(dampened_probability(0.8, 0.3, 0), 0.8);
    }

    #[test]
    fn dampened_probability_decreases_with_depth() {
        let d1 = dampened_probability(0.8, 0.3, 1);
        let d2 = dampened_probability(0.8, 0.3, 2);
        assert!(d2 < d1);
        assert!((d1 - 0.8 * 0.7).abs() < 1e-9);
    }

    #[test]
    fn dampened_probability_monotone_non_increasing_in_depth_and_dampening() {
        for depth in 0..10u32 {
            let p_at_depth = dampened_probability(0.9, 0.2, depth);
            let p_at_next = dampened_probability(0.9, 0.2, depth + 1);
            assert!(p_at_next <= p_at_depth);
        }
        for i in 0..10 {
            let d0 = i as f64 / 10.0;
            let d1 = (i + 1) as f64 / 10.0;
            let p0 = dampened_probability(0.9, d0, 3);
            let p1 = dampened_probability(0.9, d1, 3);
            assert!(p1 <= p0);
        }
    }

    #[test]
    fn adjust_dampening_high_significance_reduces() {
        let adjusted = adjust_dampening_for_significance(0.5, 100);
        assert!((adjusted - 0.5 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn adjust_dampening_low_significance_increases() {
        let adjusted = adjust_dampening_for_significance(0.4, 0);
        assert!((adjusted - 0.4 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn adjust_dampening_mid_significance_is_identity() {
        assert_eq!(adjust_dampening_for_significance(0.4, 50), 0.4);
    }

    #[test]
    fn should_continue_cascade_respects_threshold() {
        assert!(should_continue_cascade(0.01, 0.01));
        assert!(!should_continue_cascade(0.0099, 0.01));
    }

    #[test]
    fn cross_domain_modifier_known_and_unknown_transitions() {
        assert!(cross_domain_modifier(EventCategory::Military, EventCategory::Political).is_some());
        assert!(cross_domain_modifier(EventCategory::Cultural, EventCategory::Military).is_none());
    }
}
