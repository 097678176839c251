//! Bibliometric indices over the canonical publication set.
//!
//! Publications without a reconciled citation count are excluded from every
//! index, not treated as zero-cited. Everything is recomputed from scratch
//! on each run; per-user sets are small enough that incremental maintenance
//! would buy nothing.

use crate::snapshot::{MetricsSnapshot, Publication};

pub fn compute(publications: &[Publication]) -> MetricsSnapshot {
    let pub_count = publications.len();
    let avg_author_count = if pub_count == 0 {
        0.0
    } else {
        let total: usize = publications.iter().map(|p| p.authors.len()).sum();
        total as f64 / pub_count as f64
    };

    let mut cites: Vec<u32> = publications.iter().filter_map(|p| p.cites).collect();
    cites.sort_unstable_by(|a, b| b.cmp(a));

    let h_index = h_index(&cites);
    MetricsSnapshot {
        pub_count,
        avg_author_count,
        h_index,
        g_index: g_index(&cites),
        e_index: e_index(&cites, h_index),
        i_indices: i_indices(&cites),
    }
}

/// Largest h such that at least h publications have at least h citations.
/// Input must be sorted descending.
fn h_index(cites: &[u32]) -> u32 {
    cites
        .iter()
        .enumerate()
        .take_while(|(i, &c)| c as usize >= i + 1)
        .count() as u32
}

/// Largest g such that the top g publications have a combined citation
/// count of at least g^2. Bounded by the number of counted publications.
fn g_index(cites: &[u32]) -> u32 {
    let mut sum: u64 = 0;
    let mut g = 0u64;
    for (i, &c) in cites.iter().enumerate() {
        sum += c as u64;
        let rank = (i + 1) as u64;
        if sum >= rank * rank {
            g = rank;
        }
    }
    g as u32
}

/// Square root of the citation excess beyond the h-core: for the top h
/// publications, the citations above h each.
fn e_index(cites: &[u32], h: u32) -> f64 {
    let excess: u64 = cites
        .iter()
        .take(h as usize)
        .map(|&c| (c - h) as u64)
        .sum();
    (excess as f64).sqrt()
}

/// For k = 1 up to the maximum citation count, how many publications are
/// cited at least k times. Strictly non-increasing by construction.
fn i_indices(cites: &[u32]) -> Vec<u32> {
    let max = cites.first().copied().unwrap_or(0);
    (1..=max)
        .map(|k| cites.iter().take_while(|&&c| c >= k).count() as u32)
        .collect()
}
