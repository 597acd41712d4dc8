//! Automation policy consolidation
//!
//! Orders policies from most to least specific, drops policies that carry
//! no settings, and folds together policies that configure certificates the
//! same way, without changing which settings govern any given hostname.

use tracing::{debug, trace};

use crate::policy::AutomationPolicy;

/// What to do with a pair of policies at positions `i < j`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Keep,
    /// `j` duplicates `i` exactly
    DropLater,
    /// `i` is covered by the catch-all at `j`
    DropEarlier,
    /// Move `j`'s subjects into `i`
    Merge,
}

/// Consolidate a policy list
///
/// The input list is consumed and a new list is returned, ordered from the
/// most to the least specific policy. A rewrite is only kept when every
/// listed subject is still governed by a policy with the same settings, so
/// the result is a fixed point and consolidating it again changes nothing.
pub fn consolidate_automation_policies(policies: Vec<AutomationPolicy>) -> Vec<AutomationPolicy> {
    let input_len = policies.len();

    let mut consolidated: Vec<AutomationPolicy> = order_by_specificity(policies)
        .into_iter()
        .filter(|policy| !policy.is_empty_apart_from_subjects())
        .collect();

    while let Some(rewritten) = simplify_once(&consolidated) {
        consolidated = rewritten;
    }

    debug!(
        before = input_len,
        after = consolidated.len(),
        "Consolidated automation policies"
    );
    consolidated
}

/// Apply the first rewrite that keeps every subject's settings, if any
fn simplify_once(policies: &[AutomationPolicy]) -> Option<Vec<AutomationPolicy>> {
    let subjects: Vec<&str> = policies
        .iter()
        .flat_map(|policy| policy.subjects.iter().map(String::as_str))
        .collect();

    for i in 0..policies.len() {
        for j in (i + 1)..policies.len() {
            let resolution = resolve(&policies[i], &policies[j]);
            if resolution == Resolution::Keep {
                continue;
            }

            let candidate = order_by_specificity(apply(policies, i, j, resolution));
            if governed_alike(policies, &candidate, &subjects) {
                trace!(earlier = i, later = j, ?resolution, "Consolidating automation policies");
                return Some(candidate);
            }
            trace!(
                earlier = i,
                later = j,
                ?resolution,
                "Keeping policies apart; a subject would change hands"
            );
        }
    }
    None
}

fn resolve(current: &AutomationPolicy, later: &AutomationPolicy) -> Resolution {
    if current == later {
        return Resolution::DropLater;
    }
    if !current.has_same_settings(later) {
        return Resolution::Keep;
    }
    if !current.is_catch_all() && later.is_catch_all() {
        Resolution::DropEarlier
    } else {
        Resolution::Merge
    }
}

fn apply(
    policies: &[AutomationPolicy],
    i: usize,
    j: usize,
    resolution: Resolution,
) -> Vec<AutomationPolicy> {
    let mut result = policies.to_vec();
    match resolution {
        Resolution::Keep => {}
        Resolution::DropLater => {
            result.remove(j);
        }
        Resolution::DropEarlier => {
            result.remove(i);
        }
        Resolution::Merge => {
            let later = result.remove(j);
            let current = &mut result[i];
            for subject in later.subjects {
                if !current.subjects.contains(&subject) {
                    current.subjects.push(subject);
                }
            }
        }
    }
    result
}

/// The first policy in list order that applies to `hostname`
fn governing<'a>(policies: &'a [AutomationPolicy], hostname: &str) -> Option<&'a AutomationPolicy> {
    policies.iter().find(|policy| policy.matches(hostname))
}

fn governed_alike(
    before: &[AutomationPolicy],
    after: &[AutomationPolicy],
    subjects: &[&str],
) -> bool {
    subjects.iter().all(|subject| {
        match (governing(before, subject), governing(after, subject)) {
            (Some(old), Some(new)) => old.has_same_settings(new),
            (None, None) => true,
            _ => false,
        }
    })
}

fn is_strict_subset(a: &AutomationPolicy, b: &AutomationPolicy) -> bool {
    a.is_subset_of(b) && !b.is_subset_of(a)
}

/// Order policies so that a policy precedes every policy it is a strict
/// (wildcard-aware) subset of; otherwise by descending subject count
///
/// Specificity is only a partial order, so the list is first sorted by
/// subject count and then emitted one policy at a time, always taking the
/// earliest policy that has no stricter policy left behind it. Both steps
/// are stable.
pub fn order_by_specificity(mut policies: Vec<AutomationPolicy>) -> Vec<AutomationPolicy> {
    policies.sort_by(|a, b| b.subjects.len().cmp(&a.subjects.len()));

    let mut remaining: Vec<Option<AutomationPolicy>> = policies.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    while ordered.len() < remaining.len() {
        let unblocked = (0..remaining.len()).find(|&k| {
            remaining[k].as_ref().is_some_and(|candidate| {
                !remaining
                    .iter()
                    .flatten()
                    .any(|other| is_strict_subset(other, candidate))
            })
        });
        // a cycle in the relation leaves nothing unblocked; fall back to list order
        let next = unblocked.or_else(|| remaining.iter().position(Option::is_some));
        match next.and_then(|k| remaining[k].take()) {
            Some(policy) => ordered.push(policy),
            None => break,
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(subjects: &[&str], issuer: &str) -> AutomationPolicy {
        AutomationPolicy {
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            issuer_raw: Some(json!({ "module": issuer })),
            ..Default::default()
        }
    }

    fn subjects(policies: &[AutomationPolicy]) -> Vec<Vec<&str>> {
        policies
            .iter()
            .map(|p| p.subjects.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_order_puts_subsets_first() {
        let ordered = order_by_specificity(vec![
            policy(&[], "acme"),
            policy(&["*.example.com"], "acme"),
            policy(&["a.example.com"], "internal"),
        ]);
        assert_eq!(
            subjects(&ordered),
            vec![vec!["a.example.com"], vec!["*.example.com"], vec![]]
        );
    }

    #[test]
    fn test_order_subset_beats_subject_count() {
        let ordered = order_by_specificity(vec![
            policy(&["*.example.com", "x.org", "y.org"], "acme"),
            policy(&["a.example.com"], "internal"),
        ]);
        assert_eq!(ordered[0].subjects, vec!["a.example.com"]);
    }

    #[test]
    fn test_order_unrelated_by_descending_count() {
        let ordered = order_by_specificity(vec![
            policy(&["a.org"], "acme"),
            policy(&["b.org", "c.org"], "internal"),
            policy(&["d.org"], "zerossl"),
        ]);
        assert_eq!(
            subjects(&ordered),
            vec![vec!["b.org", "c.org"], vec!["a.org"], vec!["d.org"]]
        );
    }

    #[test]
    fn test_empty_policies_are_dropped() {
        let consolidated = consolidate_automation_policies(vec![
            AutomationPolicy::for_subjects(vec!["a.example".to_string()], None),
            policy(&["b.example"], "acme"),
        ]);
        assert_eq!(subjects(&consolidated), vec![vec!["b.example"]]);
    }

    #[test]
    fn test_identical_policies_collapse() {
        let consolidated = consolidate_automation_policies(vec![
            policy(&[], "internal"),
            policy(&[], "internal"),
        ]);
        assert_eq!(consolidated, vec![policy(&[], "internal")]);
    }

    #[test]
    fn test_equivalent_policies_merge_subjects() {
        let consolidated = consolidate_automation_policies(vec![
            policy(&["a.example", "b.example"], "acme"),
            policy(&["c.example"], "internal"),
            policy(&["b.example", "d.example"], "acme"),
        ]);
        assert_eq!(
            subjects(&consolidated),
            vec![vec!["a.example", "b.example", "d.example"], vec!["c.example"]]
        );
    }

    #[test]
    fn test_policy_covered_by_catch_all_is_dropped() {
        let mut specific = policy(&["a.example"], "acme");
        specific.on_demand = true;
        let mut catch_all = policy(&[], "acme");
        catch_all.on_demand = true;

        let consolidated = consolidate_automation_policies(vec![specific, catch_all.clone()]);

        assert_eq!(consolidated, vec![catch_all]);
    }

    #[test]
    fn test_shadowed_policy_survives() {
        let mut specific = policy(&["a.example"], "acme");
        specific.on_demand = true;
        let mut catch_all = policy(&[], "acme");
        catch_all.on_demand = true;
        let mut wildcard = policy(&["*.example"], "zerossl");
        wildcard.on_demand = true;

        let consolidated =
            consolidate_automation_policies(vec![specific, catch_all, wildcard]);

        assert_eq!(
            subjects(&consolidated),
            vec![vec!["a.example"], vec!["*.example"], vec![]]
        );
    }

    #[test]
    fn test_different_settings_are_kept_apart() {
        let mut must_staple = policy(&["a.example"], "acme");
        must_staple.must_staple = true;

        let consolidated =
            consolidate_automation_policies(vec![must_staple, policy(&["b.example"], "acme")]);

        assert_eq!(consolidated.len(), 2);
    }

    #[test]
    fn test_merged_policy_is_not_dropped_behind_wildcard() {
        let consolidated = consolidate_automation_policies(vec![
            policy(&["a.example.com"], "vault"),
            policy(&["*.example.com"], "internal"),
            policy(&["b.org"], "vault"),
            policy(&[], "vault"),
        ]);

        assert_eq!(
            subjects(&consolidated),
            vec![vec!["a.example.com", "b.org"], vec!["*.example.com"], vec![]]
        );
        let governing = consolidated
            .iter()
            .find(|policy| policy.matches("a.example.com"))
            .unwrap();
        assert_eq!(governing.issuer_raw, Some(json!({"module": "vault"})));
    }

    #[test]
    fn test_merge_does_not_jump_ahead_of_covering_wildcard() {
        // the wildcard sits between the two acme policies and governs a.example.com
        let consolidated = consolidate_automation_policies(vec![
            policy(&["v.org", "w.org", "x.org", "y.org"], "acme"),
            policy(&["*.example.com", "p.org", "q.org"], "internal"),
            policy(&["a.example.com", "z.org"], "acme"),
        ]);

        assert_eq!(consolidated.len(), 3);
        let issuer_of = |hostname: &str| {
            consolidated
                .iter()
                .find(|p| p.matches(hostname))
                .and_then(|p| p.issuer_raw.clone())
        };
        assert_eq!(issuer_of("a.example.com"), Some(json!({"module": "internal"})));
        assert_eq!(issuer_of("z.org"), Some(json!({"module": "acme"})));
        assert_eq!(issuer_of("v.org"), Some(json!({"module": "acme"})));
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let once = consolidate_automation_policies(vec![
            policy(&["a.org"], "internal"),
            policy(&["b.org", "c.org"], "acme"),
            policy(&["d.org"], "acme"),
            policy(&["e.org"], "zerossl"),
        ]);
        let twice = consolidate_automation_policies(once.clone());
        assert_eq!(once, twice);
        assert_eq!(
            subjects(&once),
            vec![vec!["b.org", "c.org", "d.org"], vec!["a.org"], vec!["e.org"]]
        );
    }
}
