//! Canonical merging: fold a match group into one publication and reconcile
//! its citation count. Every rule here is deterministic over the group
//! contents; arrival order within a run never changes the outcome.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::resolve::MatchGroup;
use crate::snapshot::Publication;
use crate::sources::SourceRecord;

/// Stable total order over sources, taken from the adapter registration
/// order. "Earliest-received" tie-breaks are defined against this, never
/// wall-clock arrival.
pub struct SourcePriority {
    rank: HashMap<String, usize>,
}

impl SourcePriority {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rank: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name.into(), i))
                .collect(),
        }
    }

    /// Unregistered sources sort after all registered ones.
    fn rank(&self, source: &str) -> usize {
        self.rank.get(source).copied().unwrap_or(usize::MAX)
    }
}

/// Collapse a match group into its canonical publication.
pub fn merge_group(group: &MatchGroup, priority: &SourcePriority) -> Publication {
    debug_assert!(!group.is_empty());

    let mut members: Vec<&SourceRecord> = group.iter().collect();
    members.sort_by(|a, b| member_order(a, b, priority));

    // Longest title wins: the longest variant is assumed least truncated.
    // Ties go to the earliest member in priority order.
    let name = members
        .iter()
        .map(|m| m.title.as_str())
        .fold("", |best, title| {
            if title.chars().count() > best.chars().count() {
                title
            } else {
                best
            }
        })
        .to_string();

    Publication {
        name,
        authors: merge_authors(&members),
        year: merge_year(&members),
        cites: reconcile_cites(group),
        sources: members.iter().map(|m| m.source_id.clone()).collect(),
    }
}

/// Unified citation count: the maximum of the non-null per-source counts.
/// Sources under-count due to partial indexing, so the maximum is the best
/// available lower bound. All-null stays null; zero and unknown are not
/// interchangeable.
pub fn reconcile_cites(group: &[SourceRecord]) -> Option<u32> {
    group.iter().filter_map(|record| record.cites).max()
}

fn member_order(a: &SourceRecord, b: &SourceRecord, priority: &SourcePriority) -> Ordering {
    priority
        .rank(&a.source_id)
        .cmp(&priority.rank(&b.source_id))
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.external_ref.cmp(&b.external_ref))
}

/// Union of author lists in the order of the longest list (assumed most
/// complete), with case-insensitive duplicates collapsed and the remaining
/// members' extras appended in member order.
fn merge_authors(members: &[&SourceRecord]) -> Vec<String> {
    let base = members.iter().copied().fold(members[0], |best, m| {
        if m.authors.len() > best.authors.len() {
            m
        } else {
            best
        }
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut authors = Vec::new();
    for name in base
        .authors
        .iter()
        .chain(members.iter().flat_map(|m| m.authors.iter()))
    {
        if seen.insert(name.to_lowercase()) {
            authors.push(name.clone());
        }
    }
    authors
}

/// All reporting members agreeing wins outright; otherwise a strict majority
/// among reported years; no majority means no year.
fn merge_year(members: &[&SourceRecord]) -> Option<u32> {
    let mut votes: BTreeMap<u32, usize> = BTreeMap::new();
    for year in members.iter().filter_map(|m| m.year) {
        *votes.entry(year).or_insert(0) += 1;
    }
    let best = votes.values().copied().max()?;
    let mut winners = votes.iter().filter(|(_, &count)| count == best);
    let (&year, _) = winners.next()?;
    if winners.next().is_some() {
        None
    } else {
        Some(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        source: &str,
        title: &str,
        authors: &[&str],
        year: Option<u32>,
        cites: Option<u32>,
    ) -> SourceRecord {
        SourceRecord {
            source_id: source.to_string(),
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            year,
            cites,
            external_ref: format!("{}:{}", source, title),
        }
    }

    fn priority() -> SourcePriority {
        SourcePriority::new(["a", "b", "c"])
    }

    #[test]
    fn test_longest_title_wins() {
        let group = vec![
            record("a", "Deep learning", &[], Some(2016), None),
            record("b", "Deep learning: an overview", &[], Some(2016), None),
        ];
        let publication = merge_group(&group, &priority());
        assert_eq!(publication.name, "Deep learning: an overview");
    }

    #[test]
    fn test_title_tie_goes_to_priority_order() {
        let group = vec![
            record("b", "Deep Learning", &[], Some(2016), None),
            record("a", "DEEP LEARNING!", &[], Some(2016), None),
        ];
        // Equal length; source "a" is earlier in the priority order.
        let publication = merge_group(&group, &priority());
        assert_eq!(publication.name, "DEEP LEARNING!");
    }

    #[test]
    fn test_merge_is_order_independent() {
        let r1 = record("b", "Deep learning", &["Y. LeCun", "Y. Bengio"], Some(2015), Some(7));
        let r2 = record("a", "Deep learning: an overview", &["Yann LeCun"], Some(2016), Some(3));
        let r3 = record("c", "Deep learning", &["Geoffrey Hinton"], Some(2016), None);

        let forward = merge_group(&vec![r1.clone(), r2.clone(), r3.clone()], &priority());
        let reversed = merge_group(&vec![r3, r1, r2], &priority());

        assert_eq!(forward.name, reversed.name);
        assert_eq!(forward.authors, reversed.authors);
        assert_eq!(forward.year, reversed.year);
        assert_eq!(forward.cites, reversed.cites);
        assert_eq!(forward.sources, reversed.sources);
    }

    #[test]
    fn test_authors_keep_longest_list_order_and_collapse_duplicates() {
        let group = vec![
            record("b", "Paper", &["G. Hinton", "Y. LeCun"], None, None),
            record(
                "a",
                "Paper",
                &["Y. LeCun", "Y. Bengio", "G. Hinton"],
                None,
                None,
            ),
            record("c", "Paper", &["y. lecun", "Jane Doe"], None, None),
        ];
        let publication = merge_group(&group, &priority());
        assert_eq!(
            publication.authors,
            vec!["Y. LeCun", "Y. Bengio", "G. Hinton", "Jane Doe"]
        );
    }

    #[test]
    fn test_year_majority_vote() {
        let group = vec![
            record("a", "Paper", &[], Some(2016), None),
            record("b", "Paper", &[], Some(2016), None),
            record("c", "Paper", &[], Some(2015), None),
        ];
        assert_eq!(merge_group(&group, &priority()).year, Some(2016));
    }

    #[test]
    fn test_year_tie_is_null() {
        let group = vec![
            record("a", "Paper", &[], Some(2016), None),
            record("b", "Paper", &[], Some(2015), None),
        ];
        assert_eq!(merge_group(&group, &priority()).year, None);
    }

    #[test]
    fn test_year_ignores_non_reporting_members() {
        let group = vec![
            record("a", "Paper", &[], None, None),
            record("b", "Paper", &[], Some(2015), None),
        ];
        assert_eq!(merge_group(&group, &priority()).year, Some(2015));
    }

    #[test]
    fn test_no_year_reported_is_null() {
        let group = vec![record("a", "Paper", &[], None, None)];
        assert_eq!(merge_group(&group, &priority()).year, None);
    }

    #[test]
    fn test_cites_max_of_reported() {
        let group = vec![
            record("a", "Paper", &[], None, None),
            record("b", "Paper", &[], None, Some(5)),
            record("c", "Paper", &[], None, Some(3)),
        ];
        assert_eq!(reconcile_cites(&group), Some(5));
    }

    #[test]
    fn test_cites_all_null_is_null() {
        let group = vec![
            record("a", "Paper", &[], None, None),
            record("b", "Paper", &[], None, None),
        ];
        assert_eq!(reconcile_cites(&group), None);
    }

    #[test]
    fn test_sources_collects_contributors() {
        let group = vec![
            record("b", "Paper", &[], None, None),
            record("a", "Paper", &[], None, None),
            record("a", "Paper.", &[], None, None),
        ];
        let publication = merge_group(&group, &priority());
        let expected: Vec<&str> = publication.sources.iter().map(String::as_str).collect();
        assert_eq!(expected, vec!["a", "b"]);
    }
}
