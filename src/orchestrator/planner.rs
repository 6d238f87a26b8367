// Mon Jan 19 2026 - Alex

use crate::config::Config;
use crate::query::TimeRange;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Shard ids requested together in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardGroup {
    shards: Vec<i64>,
}

impl ShardGroup {
    pub fn new(shards: Vec<i64>) -> Self {
        Self { shards }
    }

    pub fn shards(&self) -> &[i64] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn contains(&self, shard: i64) -> bool {
        self.shards.contains(&shard)
    }

    pub fn is_catch_all(&self, sentinel: i64) -> bool {
        !self.shards.is_empty() && self.shards.iter().all(|&id| id == sentinel)
    }
}

impl fmt::Display for ShardGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.shards.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(", "))
    }
}

/// Discovered shard ids, highest first, without duplicates or the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardSet {
    ids: Vec<i64>,
}

impl ShardSet {
    pub fn from_ids(mut ids: Vec<i64>, sentinel: i64) -> Self {
        ids.retain(|&id| id != sentinel);
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();
        Self { ids }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardPlan {
    groups: Vec<ShardGroup>,
    catch_all_first: bool,
}

impl ShardPlan {
    pub fn groups(&self) -> &[ShardGroup] {
        &self.groups
    }

    pub fn group(&self, cycle: usize) -> Option<&ShardGroup> {
        self.groups.get(cycle)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn catch_all_first(&self) -> bool {
        self.catch_all_first
    }

    pub fn shard_ids(&self) -> Vec<i64> {
        self.groups.iter().flat_map(|g| g.shards().iter().copied()).collect()
    }
}

impl fmt::Display for ShardPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self.groups.iter().map(|g| g.to_string()).collect();
        write!(f, "[{}]", groups.join(", "))
    }
}

pub struct ShardPlanner {
    sentinel: i64,
    short_window: Duration,
    max_groups: Option<usize>,
}

impl ShardPlanner {
    pub fn new(sentinel: i64, short_window: Duration) -> Self {
        Self {
            sentinel,
            short_window,
            max_groups: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            sentinel: config.sentinel_shard,
            short_window: config.short_window(),
            max_groups: config.max_groups,
        }
    }

    pub fn with_max_groups(mut self, max_groups: usize) -> Self {
        self.max_groups = Some(max_groups);
        self
    }

    /// Splits `shards` into request groups, highest ids first, with the
    /// catch-all group first for short windows and last otherwise.
    /// Returns `None` when there is nothing to shard.
    pub fn plan(&self, shards: &ShardSet, range: &TimeRange) -> Option<ShardPlan> {
        if shards.is_empty() {
            return None;
        }

        let ids = shards.ids();
        let group_count = self
            .max_groups
            .unwrap_or_else(|| max_groups(ids.len()))
            .clamp(1, ids.len());
        let group_size = ids.len().div_ceil(group_count);

        let mut groups: Vec<ShardGroup> = ids
            .chunks(group_size)
            .map(|chunk| ShardGroup::new(chunk.to_vec()))
            .collect();

        let catch_all = ShardGroup::new(vec![self.sentinel]);
        let catch_all_first = range.duration() <= self.short_window;
        if catch_all_first {
            groups.insert(0, catch_all);
        } else {
            groups.push(catch_all);
        }

        Some(ShardPlan {
            groups,
            catch_all_first,
        })
    }
}

/// `min(ceil(sqrt(n)), n - 1)`, never below one group.
pub fn max_groups(shard_count: usize) -> usize {
    ceil_sqrt(shard_count)
        .min(shard_count.saturating_sub(1))
        .max(1)
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root < n {
        root += 1;
    }
    while root > 0 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const HOUR_MS: i64 = 3_600_000;

    fn planner() -> ShardPlanner {
        ShardPlanner::new(-1, Duration::from_secs(6 * 3600))
    }

    fn window(ms: i64) -> TimeRange {
        TimeRange::new(0, ms)
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(16), 4);
        assert_eq!(ceil_sqrt(17), 5);
    }

    #[test]
    fn test_max_groups() {
        assert_eq!(max_groups(1), 1);
        assert_eq!(max_groups(2), 1);
        assert_eq!(max_groups(3), 2);
        assert_eq!(max_groups(5), 3);
        assert_eq!(max_groups(100), 10);
    }

    #[test]
    fn test_shard_set_normalizes() {
        let set = ShardSet::from_ids(vec![2, 5, -1, 3, 5, 1], -1);
        assert_eq!(set.ids(), &[5, 3, 2, 1]);
    }

    #[test]
    fn test_short_window_example() {
        let shards = ShardSet::from_ids(vec![1, 2, 3, 4, 5], -1);
        let plan = planner().plan(&shards, &window(6 * HOUR_MS)).unwrap();

        let groups: Vec<Vec<i64>> = plan.groups().iter().map(|g| g.shards().to_vec()).collect();
        assert_eq!(groups, vec![vec![-1], vec![5, 4], vec![3, 2], vec![1]]);
        assert!(plan.catch_all_first());
    }

    #[test]
    fn test_long_window_puts_catch_all_last() {
        let shards = ShardSet::from_ids(vec![1, 2, 3, 4, 5], -1);
        let plan = planner().plan(&shards, &window(6 * HOUR_MS + 60_000)).unwrap();

        assert!(!plan.catch_all_first());
        assert_eq!(plan.groups().last().unwrap().shards(), &[-1]);
        assert_eq!(plan.groups()[0].shards(), &[5, 4]);
    }

    #[test]
    fn test_empty_shard_set_has_no_plan() {
        assert!(planner().plan(&ShardSet::default(), &window(HOUR_MS)).is_none());
    }

    #[test]
    fn test_single_shard() {
        let shards = ShardSet::from_ids(vec![7], -1);
        let plan = planner().plan(&shards, &window(HOUR_MS)).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.groups()[1].shards(), &[7]);
    }

    #[test]
    fn test_group_count_and_coverage() {
        for n in 2..=400usize {
            let ids: Vec<i64> = (0..n as i64).collect();
            let shards = ShardSet::from_ids(ids.clone(), -1);
            let plan = planner().plan(&shards, &window(24 * HOUR_MS)).unwrap();

            let regular: Vec<&ShardGroup> = plan.groups().iter().filter(|g| !g.is_catch_all(-1)).collect();
            assert_eq!(regular.len(), max_groups(n), "group count for n={}", n);

            let flattened = plan.shard_ids();
            let unique: HashSet<i64> = flattened.iter().copied().collect();
            assert_eq!(unique.len(), flattened.len(), "duplicates for n={}", n);

            let mut expected: HashSet<i64> = ids.into_iter().collect();
            expected.insert(-1);
            assert_eq!(unique, expected, "coverage for n={}", n);
        }
    }

    #[test]
    fn test_groups_descend() {
        let shards = ShardSet::from_ids((0..20).collect(), -1);
        let plan = planner().plan(&shards, &window(24 * HOUR_MS)).unwrap();
        let flattened: Vec<i64> = plan.shard_ids().into_iter().filter(|&id| id != -1).collect();
        let mut sorted = flattened.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(flattened, sorted);
    }

    #[test]
    fn test_max_groups_override() {
        let shards = ShardSet::from_ids((1..=10).collect(), -1);
        let plan = planner().with_max_groups(2).plan(&shards, &window(HOUR_MS)).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.groups()[1].len(), 5);
    }
}
