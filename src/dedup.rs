//! Collapse near-duplicate items to one representative each, then rank.
//!
//! Order of operations:
//! 1. explicit `dedupe_key`: first occurrence wins, later ones are dropped;
//! 2. items without a title are skipped (after claiming their key);
//! 3. the survivors are grouped by [`title_key`], keeping input order inside a group;
//! 4. each group keeps its most reliable member (first-seen on ties);
//! 5. representatives are sorted by score, descending (stable; unscored = 0).
//!
//! Running it on its own output is a no-op.

use std::collections::{HashMap, HashSet};

use metrics::counter;

use crate::model::Item;
use crate::title_key::title_key;

/// Per-run counters, mirrored into metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DedupStats {
    pub kept: usize,
    pub untitled: usize,
    pub dropped_by_key: usize,
    pub dropped_by_title: usize,
}

/// Deduplicate and rank. See module docs.
pub fn dedupe(items: &[Item]) -> Vec<Item> {
    dedupe_with_stats(items).0
}

pub fn dedupe_with_stats(items: &[Item]) -> (Vec<Item>, DedupStats) {
    let mut stats = DedupStats::default();

    // (1)+(2) explicit keys, then untitled skip
    let mut seen_keys: HashSet<&str> = HashSet::new();
    let mut survivors: Vec<&Item> = Vec::with_capacity(items.len());
    for it in items {
        if let Some(key) = it.dedupe_key.as_deref() {
            if !seen_keys.insert(key) {
                stats.dropped_by_key += 1;
                continue;
            }
        }
        if it.title_text().is_none() {
            stats.untitled += 1;
            continue;
        }
        survivors.push(it);
    }

    // (3) title-key groups in first-seen order
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Item>> = Vec::new();
    for it in survivors {
        let key = title_key(it.title_text().unwrap_or_default());
        match group_index.get(&key) {
            Some(&gi) => groups[gi].push(it),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![it]);
            }
        }
    }

    // (4) best-quality representative per group
    let mut out: Vec<Item> = Vec::with_capacity(groups.len());
    for group in &groups {
        stats.dropped_by_title += group.len() - 1;
        if let Some(best) = most_reliable(group) {
            out.push(best.clone());
        }
    }

    // (5) stable sort by score, descending
    out.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));

    stats.kept = out.len();
    counter!("feed_dedup_dropped_total")
        .increment((stats.dropped_by_key + stats.dropped_by_title) as u64);
    tracing::debug!(
        target: "feed::dedup",
        kept = stats.kept,
        untitled = stats.untitled,
        by_key = stats.dropped_by_key,
        by_title = stats.dropped_by_title,
        "dedup pass"
    );

    (out, stats)
}

/// Highest reliability wins; a strictly greater value is needed to replace
/// the current pick, so ties stay with the earliest item. Items without a
/// source lose to any sourced item.
fn most_reliable<'a>(group: &[&'a Item]) -> Option<&'a Item> {
    let mut best: Option<&'a Item> = None;
    for &it in group {
        best = match best {
            None => Some(it),
            Some(cur) if reliability_rank(it) > reliability_rank(cur) => Some(it),
            keep => keep,
        };
    }
    best
}

fn reliability_rank(it: &Item) -> f64 {
    it.reliability().unwrap_or(-1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn it(id: &str, title: &str, rel: f64, score: f64) -> Item {
        let mut i = Item::new(id)
            .with_title(title)
            .with_source(Source::new("src", 1, rel));
        i.score = Some(score);
        i
    }

    fn ids(v: &[Item]) -> Vec<&str> {
        v.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn first_seen_explicit_key_wins() {
        let a = it("a", "Alpha story one", 50.0, 10.0).with_dedupe_key("k1");
        let b = it("b", "Totally different headline", 99.0, 90.0).with_dedupe_key("k1");
        let (out, stats) = dedupe_with_stats(&[a, b]);
        assert_eq!(ids(&out), vec!["a"]);
        assert_eq!(stats.dropped_by_key, 1);
    }

    #[test]
    fn most_reliable_member_represents_the_group() {
        let a = it("a", "Nvidia beats estimates", 60.0, 70.0);
        let b = it("b", "NVIDIA Beats Estimates, shares jump", 95.0, 40.0);
        let c = it("c", "Oil slides on supply glut", 70.0, 50.0);
        let out = dedupe(&[a, b, c]);
        assert_eq!(ids(&out), vec!["c", "b"]);
    }

    #[test]
    fn reliability_tie_keeps_first_seen() {
        let a = it("a", "Nvidia beats estimates", 80.0, 10.0);
        let b = it("b", "Nvidia beats estimates again", 80.0, 90.0);
        assert_eq!(ids(&dedupe(&[a, b])), vec!["a"]);
    }

    #[test]
    fn untitled_items_are_skipped() {
        let mut a = it("a", "x", 50.0, 10.0);
        a.title = None;
        let b = it("b", "   ", 50.0, 10.0);
        let (out, stats) = dedupe_with_stats(&[a, b]);
        assert!(out.is_empty());
        assert_eq!(stats.untitled, 2);
    }

    #[test]
    fn untitled_first_occurrence_still_claims_its_key() {
        let mut a = it("a", "x", 50.0, 10.0).with_dedupe_key("k1");
        a.title = None;
        let b = it("b", "Fed signals patience", 90.0, 80.0).with_dedupe_key("k1");
        let (out, stats) = dedupe_with_stats(&[a, b]);
        assert!(out.is_empty());
        assert_eq!(stats.dropped_by_key, 1);
        assert_eq!(stats.untitled, 1);
    }

    #[test]
    fn unscored_items_sort_as_zero() {
        let mut a = it("a", "Alpha headline here", 50.0, 0.0);
        a.score = None;
        let b = it("b", "Bravo headline here", 50.0, 5.0);
        assert_eq!(ids(&dedupe(&[a, b])), vec!["b", "a"]);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let v = vec![
            it("a", "Nvidia beats estimates", 60.0, 70.0).with_dedupe_key("k"),
            it("b", "Nvidia beats estimates, shares jump", 95.0, 40.0),
            it("c", "Oil slides on supply glut", 70.0, 50.0).with_dedupe_key("k"),
            it("d", "Yields climb after CPI", 70.0, 50.0),
        ];
        let once = dedupe(&v);
        assert_eq!(dedupe(&once), once);
    }
}
