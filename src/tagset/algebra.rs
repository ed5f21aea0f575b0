//! Tagset matching algebra
//!
//! Set operations that define what it means for a tagset to "match" a
//! pattern:
//!
//! - **subset**: every pattern tag is satisfied by the candidate
//! - **intersection**: the tags shared by a group of tagsets
//! - **template**: fill a pattern's wildcard slots from a concrete tagset
//! - **permutation matching**: pair a list of patterns with a list of
//!   candidates so that every pattern is a subset of its partner
//!
//! A concrete pattern tag `a=1` is only satisfied by a candidate holding
//! `a=1`; a wildcard pattern tag `a` is satisfied by any candidate tag named
//! `a`, including a wildcard. The reverse does not hold: a wildcard in the
//! candidate never satisfies a concrete pattern tag.

use std::collections::BTreeSet;

use crate::tagset::types::{Tag, Tagset};

impl Tagset {
    /// Check whether every tag of `self` is satisfied by `other`
    ///
    /// The empty tagset is a subset of everything; a non-empty tagset is
    /// never a subset of the empty tagset.
    pub fn is_subset_of(&self, other: &Tagset) -> bool {
        self.iter().all(|tag| match &tag.value {
            Some(value) => other.has_tag(&tag.name, value),
            None => other.has_name(&tag.name),
        })
    }

    /// Check whether `other` is a subset of `self`
    pub fn is_superset_of(&self, other: &Tagset) -> bool {
        other.is_subset_of(self)
    }

    /// Intersection of any number of tagsets
    ///
    /// A name survives only if every input mentions it. For a surviving name,
    /// each concrete value is kept once if every input holds it or holds a
    /// wildcard for that name. A name that only appears as a wildcard
    /// survives as a wildcard.
    pub fn intersection<'a, I>(tagsets: I) -> Tagset
    where
        I: IntoIterator<Item = &'a Tagset>,
    {
        let inputs: Vec<&Tagset> = tagsets.into_iter().collect();
        let Some((first, rest)) = inputs.split_first() else {
            return Tagset::new();
        };

        let mut result = Tagset::new();
        for name in first.names() {
            if rest.iter().any(|t| !t.has_name(name)) {
                continue;
            }

            let candidates: BTreeSet<&str> = inputs
                .iter()
                .flat_map(|t| t.values(name).flatten())
                .collect();

            if candidates.is_empty() {
                result.insert(Tag::wildcard(name));
                continue;
            }

            for value in candidates {
                let shared = inputs
                    .iter()
                    .all(|t| t.has_tag(name, value) || t.has_wildcard(name));
                if shared {
                    result.insert(Tag::new(name, value));
                }
            }
        }

        result
    }

    /// Fill this pattern's wildcard slots from `content`
    ///
    /// Concrete pattern tags are copied unchanged. A wildcard tag `n` becomes
    /// one tag per value `content` holds for `n`, or stays a wildcard if
    /// `content` has none. Names absent from the pattern are dropped.
    pub fn template(&self, content: &Tagset) -> Tagset {
        let mut result = Tagset::new();
        for tag in self.iter() {
            if tag.value.is_some() {
                result.insert(tag.clone());
                continue;
            }

            let mut filled = false;
            for value in content.values(&tag.name) {
                result.insert(Tag {
                    name: tag.name.clone(),
                    value: value.map(str::to_string),
                });
                filled = true;
            }
            if !filled {
                result.insert(tag.clone());
            }
        }
        result
    }
}

/// Find candidates that cover every query, one candidate per query
///
/// Returns the candidates reordered so that `queries[i]` is a subset of the
/// `i`th returned candidate, or `None` when no such assignment exists.
/// Surplus candidates are left out of the result.
pub fn permutation_is_superset<'a>(
    candidates: &'a [Tagset],
    queries: &[Tagset],
) -> Option<Vec<&'a Tagset>> {
    assign_candidates(candidates, queries)
        .map(|assignment| assignment.into_iter().map(|j| &candidates[j]).collect())
}

/// Index form of [`permutation_is_superset`]: `result[i]` is the candidate
/// index assigned to `queries[i]`
pub fn assign_candidates(candidates: &[Tagset], queries: &[Tagset]) -> Option<Vec<usize>> {
    if queries.len() > candidates.len() {
        return None;
    }

    let feasible: Vec<Vec<bool>> = queries
        .iter()
        .map(|q| candidates.iter().map(|c| q.is_subset_of(c)).collect())
        .collect();

    // owner[j] = query currently holding candidate j
    let mut owner: Vec<Option<usize>> = vec![None; candidates.len()];
    for query in 0..queries.len() {
        let mut visited = vec![false; candidates.len()];
        if !augment(query, &feasible, &mut owner, &mut visited) {
            return None;
        }
    }

    let mut assignment = vec![0; queries.len()];
    for (candidate, query) in owner.iter().enumerate() {
        if let Some(query) = query {
            assignment[*query] = candidate;
        }
    }
    Some(assignment)
}

/// Augmenting-path step of bipartite matching
fn augment(
    query: usize,
    feasible: &[Vec<bool>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for candidate in 0..feasible[query].len() {
        if !feasible[query][candidate] || visited[candidate] {
            continue;
        }
        visited[candidate] = true;

        let available = match owner[candidate] {
            None => true,
            Some(other) => augment(other, feasible, owner, visited),
        };
        if available {
            owner[candidate] = Some(query);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(text: &str) -> Tagset {
        Tagset::parse(text).unwrap()
    }

    #[test]
    fn test_subset_reflexive_and_empty() {
        let empty = Tagset::new();
        for text in ["a=1", "a,b=2", "a=1,a=2,c", ""] {
            let t = tc(text);
            assert!(t.is_subset_of(&t));
            assert!(empty.is_subset_of(&t));
            assert_eq!(t.is_subset_of(&empty), t.is_empty());
        }
    }

    #[test]
    fn test_subset_wildcard_asymmetry() {
        assert!(tc("a,a=1").is_subset_of(&tc("a=1")));
        assert!(!tc("a=1").is_subset_of(&tc("a")));
        assert!(tc("a").is_subset_of(&tc("a")));
        assert!(tc("a").is_subset_of(&tc("a=7,b=1")));
        assert!(!tc("a=1,b").is_subset_of(&tc("a=1")));
        assert!(tc("color=red").is_superset_of(&tc("color")));
    }

    #[test]
    fn test_intersection_fixture() {
        let inputs = [
            tc("a=1,a=2,b=3,c=4,z=1"),
            tc("a=2,c=4,z=2"),
            tc("z=3,c=4,a=2"),
        ];
        assert_eq!(Tagset::intersection(&inputs), tc("a=2,c=4"));
    }

    #[test]
    fn test_intersection_wildcards() {
        // A wildcard accepts whatever the other inputs agree on
        let inputs = [tc("a=1,a=2,b"), tc("a,b"), tc("a=2,a=1,b")];
        assert_eq!(Tagset::intersection(&inputs), tc("a=1,a=2,b"));

        assert_eq!(Tagset::intersection(&[tc("a=1")]), tc("a=1"));
        assert_eq!(Tagset::intersection(Vec::<&Tagset>::new()), Tagset::new());
        assert_eq!(Tagset::intersection(&[tc("a=1"), tc("b=1")]), Tagset::new());
    }

    #[test]
    fn test_template_fixture() {
        assert_eq!(
            tc("a=1,a,b").template(&tc("a=92,a=93,b=2,c=11")),
            tc("a=1,a=92,a=93,b=2")
        );
    }

    #[test]
    fn test_template_unfilled_slots() {
        assert_eq!(tc("a,b=5").template(&tc("c=1")), tc("a,b=5"));
        assert_eq!(tc("a").template(&tc("a")), tc("a"));
        assert_eq!(Tagset::new().template(&tc("a=1")), Tagset::new());
    }

    #[test]
    fn test_permutation_identity() {
        let candidates = [tc("a=1"), tc("b=2"), tc("c=3")];
        let queries = [tc("a=1"), tc("b=2"), tc("c=3")];
        let result = permutation_is_superset(&candidates, &queries).unwrap();
        assert_eq!(result, vec![&candidates[0], &candidates[1], &candidates[2]]);
    }

    #[test]
    fn test_permutation_superset_candidate() {
        let candidates = [tc("a=1"), tc("b=2"), tc("c=3,d=4")];
        let queries = [tc("a=1"), tc("b=2"), tc("c=3")];
        assert!(permutation_is_superset(&candidates, &queries).is_some());

        let candidates = [tc("a=1"), tc("b=2"), tc("c=3")];
        let queries = [tc("a=1"), tc("b=2"), tc("c=3,d=4")];
        assert!(permutation_is_superset(&candidates, &queries).is_none());
    }

    #[test]
    fn test_permutation_reorders() {
        let candidates = [tc("c=3"), tc("a=1,b=2"), tc("a=1")];
        let queries = [tc("a=1,b=2"), tc("a=1"), tc("c")];
        let result = permutation_is_superset(&candidates, &queries).unwrap();
        assert_eq!(result, vec![&candidates[1], &candidates[2], &candidates[0]]);
    }

    #[test]
    fn test_permutation_requires_augmenting_path() {
        // Greedy would give query 0 the first candidate and strand query 1
        let candidates = [tc("a=1,b=1"), tc("a=1")];
        let queries = [tc("a=1"), tc("b=1")];
        assert_eq!(assign_candidates(&candidates, &queries), Some(vec![1, 0]));
    }

    #[test]
    fn test_permutation_surplus_candidates() {
        let candidates = [tc("x=1"), tc("a=1"), tc("y=1"), tc("b=2")];
        let queries = [tc("b"), tc("a")];
        let result = permutation_is_superset(&candidates, &queries).unwrap();
        assert_eq!(result, vec![&candidates[3], &candidates[1]]);

        assert!(permutation_is_superset(&candidates[..1], &queries).is_none());
        assert_eq!(permutation_is_superset(&candidates, &[]), Some(vec![]));
    }
}
