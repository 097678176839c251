//! Identity resolution: group per-source records that describe the same
//! real-world publication, without any cross-source id registry.

use std::collections::HashSet;

use crate::sources::SourceRecord;

/// A cluster of records judged to describe one publication. Non-empty;
/// membership is by chained similarity, not all-pairs.
pub type MatchGroup = Vec<SourceRecord>;

const TITLE_WEIGHT: f64 = 0.7;
const AUTHOR_WEIGHT: f64 = 0.3;
const MATCH_THRESHOLD: f64 = 0.75;

/// Records whose reported years differ by more than this never match,
/// regardless of title/author score. Guards against sequels and reprints
/// sharing a title.
const MAX_YEAR_DRIFT: u32 = 1;

/// Partition records into match groups by transitive closure over pairwise
/// matches: connected components of the match graph.
pub fn group_records(records: Vec<SourceRecord>) -> Vec<MatchGroup> {
    let n = records.len();
    let mut dsu = DisjointSet::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if records_match(&records[i], &records[j]) {
                dsu.union(i, j);
            }
        }
    }

    let mut groups: Vec<MatchGroup> = Vec::new();
    let mut group_of = vec![usize::MAX; n];
    for (i, record) in records.into_iter().enumerate() {
        let root = dsu.find(i);
        if group_of[root] == usize::MAX {
            group_of[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[group_of[root]].push(record);
    }
    groups
}

/// Whether two records describe the same publication.
pub fn records_match(a: &SourceRecord, b: &SourceRecord) -> bool {
    if let (Some(ya), Some(yb)) = (a.year, b.year) {
        if ya.abs_diff(yb) > MAX_YEAR_DRIFT {
            return false;
        }
    }
    record_similarity(a, b) >= MATCH_THRESHOLD
}

/// Combined similarity score in [0, 1]: normalized-title similarity weighted
/// against author-surname overlap. When either record lists no authors the
/// title score stands alone.
pub fn record_similarity(a: &SourceRecord, b: &SourceRecord) -> f64 {
    let title_a = normalize_title(&a.title);
    let title_b = normalize_title(&b.title);
    if title_a.is_empty() || title_b.is_empty() {
        return 0.0;
    }
    let title = strsim::jaro_winkler(&title_a, &title_b);

    match author_overlap(&a.authors, &b.authors) {
        Some(overlap) => TITLE_WEIGHT * title + AUTHOR_WEIGHT * overlap,
        None => title,
    }
}

/// Lowercase, strip punctuation, sort and dedup tokens. Sorting makes the
/// comparison a token-set one, insensitive to word order.
fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let mut tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens.join(" ")
}

/// Fraction of shared normalized surnames over the smaller author set, or
/// `None` when either record lists no usable surnames.
fn author_overlap(a: &[String], b: &[String]) -> Option<f64> {
    let surnames_a = surnames(a);
    let surnames_b = surnames(b);
    if surnames_a.is_empty() || surnames_b.is_empty() {
        return None;
    }
    let shared = surnames_a.intersection(&surnames_b).count();
    Some(shared as f64 / surnames_a.len().min(surnames_b.len()) as f64)
}

fn surnames(authors: &[String]) -> HashSet<String> {
    authors.iter().filter_map(|name| surname(name)).collect()
}

/// "Smith, John" -> "smith"; "John Smith" -> "smith".
fn surname(name: &str) -> Option<String> {
    let family = match name.split_once(',') {
        Some((family, _)) => family,
        None => name.split_whitespace().last()?,
    };
    let family: String = family
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if family.is_empty() {
        None
    } else {
        Some(family)
    }
}

/// Union-find with path halving; plenty for per-user record counts.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, title: &str, authors: &[&str], year: Option<u32>) -> SourceRecord {
        SourceRecord {
            source_id: source.to_string(),
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            year,
            cites: None,
            external_ref: format!("{}:{}", source, title),
        }
    }

    #[test]
    fn test_title_variants_merge() {
        let a = record(
            "a",
            "Deep Learning",
            &["Yann LeCun", "Yoshua Bengio", "Geoffrey Hinton", "Jane Doe", "Bob Roe"],
            Some(2016),
        );
        let b = record(
            "b",
            "Deep learning.",
            &["Y. LeCun", "Y. Bengio", "G. Hinton", "J. Doe", "Alice Poe"],
            Some(2016),
        );
        assert!(records_match(&a, &b));
        let groups = group_records(vec![a, b]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_year_drift_disqualifies() {
        let a = record("a", "Deep Learning", &["Yann LeCun"], Some(2016));
        let b = record("b", "Deep Learning", &["Yann LeCun"], Some(2020));
        assert!(!records_match(&a, &b));
        assert_eq!(group_records(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_adjacent_years_still_match() {
        let a = record("a", "Deep Learning", &["Yann LeCun"], Some(2015));
        let b = record("b", "Deep Learning", &["Yann LeCun"], Some(2016));
        assert!(records_match(&a, &b));
    }

    #[test]
    fn test_missing_year_is_not_a_filter() {
        let a = record("a", "Deep Learning", &["Yann LeCun"], None);
        let b = record("b", "Deep Learning", &["Yann LeCun"], Some(2016));
        assert!(records_match(&a, &b));
    }

    #[test]
    fn test_unmatched_record_is_singleton_group() {
        let a = record("a", "Deep Learning", &["Yann LeCun"], Some(2016));
        let b = record("b", "A Theory of Justice", &["John Rawls"], Some(1971));
        let groups = group_records(vec![a, b]);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_chained_similarity_links_one_group() {
        // a~b and b~c suffice even though a and c fail the year filter
        // against each other.
        let a = record("a", "Attention Is All You Need", &["Ashish Vaswani"], Some(2016));
        let b = record("b", "Attention is all you need", &["A. Vaswani"], Some(2017));
        let c = record("c", "Attention is all you need", &["A. Vaswani"], Some(2018));
        assert!(!records_match(&a, &c));
        let groups = group_records(vec![a, b, c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_empty_titles_never_match() {
        let a = record("a", "???", &["Yann LeCun"], Some(2016));
        let b = record("b", "...", &["Yann LeCun"], Some(2016));
        assert!(!records_match(&a, &b));
    }

    #[test]
    fn test_title_alone_carries_match_when_authors_absent() {
        let a = record("a", "Deep Learning", &[], Some(2016));
        let b = record("b", "Deep learning", &[], Some(2016));
        assert!(records_match(&a, &b));
    }

    #[test]
    fn test_word_order_is_ignored() {
        let a = record("a", "Learning, Deep", &["Yann LeCun"], Some(2016));
        let b = record("b", "Deep Learning", &["Yann LeCun"], Some(2016));
        assert!(records_match(&a, &b));
    }

    #[test]
    fn test_surname_extraction() {
        assert_eq!(surname("John Smith"), Some("smith".to_string()));
        assert_eq!(surname("Smith, John"), Some("smith".to_string()));
        assert_eq!(surname("J. Smith"), Some("smith".to_string()));
        assert_eq!(surname("  "), None);
    }
}
