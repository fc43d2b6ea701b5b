//! Node sorting and selection.

use super::distance::compare3;
use crate::domain::Kuid;

/// Sort items by XOR distance of their identifier to `target` (closest first).
pub fn sort_by_distance<T, F>(items: &mut [T], target: &Kuid, key: F)
where
    F: Fn(&T) -> Kuid,
{
    items.sort_by(|a, b| compare3(target, &key(a), &key(b)));
}

/// Keep the `k` items closest to `target`, sorted closest first.
pub fn find_k_closest<T, F>(mut items: Vec<T>, target: &Kuid, k: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> Kuid,
{
    sort_by_distance(&mut items, target, key);
    items.truncate(k);
    items
}
