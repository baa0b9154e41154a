use std::collections::HashMap;

use glam::Vec2;

use crate::{
    collision::{queries::RayCastInput, shapes::Aabb},
    config::{AABB_EXTENSION, AABB_MULTIPLIER, DEFAULT_BROADPHASE_CELL_SIZE, MAX_PROXY_CELLS},
    utils::allocator::{Arena, Handle},
};

/// A fattened box registered with the broad-phase.
#[derive(Debug, Clone)]
pub struct Proxy<T> {
    pub fat_aabb: Aabb,
    pub user_data: T,
    oversized: bool,
}

pub type ProxyId<T> = Handle<Proxy<T>>;

/// Uniform grid spatial partitioning used by the broad-phase.
pub struct SpatialGrid<T> {
    cell_size: f32,
    grid: HashMap<(i32, i32), Vec<ProxyId<T>>>,
}

impl<T> SpatialGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            grid: HashMap::new(),
        }
    }

    fn world_to_grid(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_range(&self, aabb: &Aabb) -> ((i32, i32), (i32, i32)) {
        (self.world_to_grid(aabb.min), self.world_to_grid(aabb.max))
    }

    fn cell_count(&self, aabb: &Aabb) -> usize {
        let (min, max) = self.cell_range(aabb);
        let w = (max.0 as i64 - min.0 as i64 + 1).max(0) as usize;
        let h = (max.1 as i64 - min.1 as i64 + 1).max(0) as usize;
        w.saturating_mul(h)
    }

    pub fn insert(&mut self, id: ProxyId<T>, aabb: &Aabb) {
        let (min, max) = self.cell_range(aabb);
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                self.grid.entry((x, y)).or_default().push(id);
            }
        }
    }

    pub fn remove(&mut self, id: ProxyId<T>, aabb: &Aabb) {
        let (min, max) = self.cell_range(aabb);
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                if let Some(cell) = self.grid.get_mut(&(x, y)) {
                    cell.retain(|other| *other != id);
                    if cell.is_empty() {
                        self.grid.remove(&(x, y));
                    }
                }
            }
        }
    }

    /// Proxies registered in any cell the box covers, sorted and deduplicated.
    pub fn query(&self, aabb: &Aabb, results: &mut Vec<ProxyId<T>>) {
        let (min, max) = self.cell_range(aabb);
        if self.cell_count(aabb) > self.grid.len() {
            // Sparse grid: scan occupied cells instead of the covered range.
            for (&(x, y), ids) in &self.grid {
                if x >= min.0 && x <= max.0 && y >= min.1 && y <= max.1 {
                    results.extend(ids.iter().copied());
                }
            }
        } else {
            for x in min.0..=max.0 {
                for y in min.1..=max.1 {
                    if let Some(ids) = self.grid.get(&(x, y)) {
                        results.extend(ids.iter().copied());
                    }
                }
            }
        }
        results.sort();
        results.dedup();
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }
}

/// Broad-phase over fattened boxes with a move buffer for incremental pair updates.
///
/// `T` is the user payload reported back with pairs and query hits.
pub struct BroadPhase<T> {
    proxies: Arena<Proxy<T>>,
    grid: SpatialGrid<T>,
    oversized: Vec<ProxyId<T>>,
    move_buffer: Vec<ProxyId<T>>,
    pair_buffer: Vec<(ProxyId<T>, ProxyId<T>)>,
    scratch: Vec<ProxyId<T>>,
}

impl<T: Copy> Default for BroadPhase<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BROADPHASE_CELL_SIZE)
    }
}

impl<T: Copy> BroadPhase<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            proxies: Arena::new(),
            grid: SpatialGrid::new(cell_size),
            oversized: Vec::new(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> ProxyId<T> {
        let fat_aabb = aabb.extended(AABB_EXTENSION);
        let oversized = self.grid.cell_count(&fat_aabb) > MAX_PROXY_CELLS;
        let id = self.proxies.insert(Proxy {
            fat_aabb,
            user_data,
            oversized,
        });
        self.register(id, &fat_aabb, oversized);
        self.move_buffer.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: ProxyId<T>) {
        if let Some(proxy) = self.proxies.remove(id) {
            self.unregister(id, &proxy.fat_aabb, proxy.oversized);
            self.move_buffer.retain(|moved| *moved != id);
        }
    }

    /// Updates a proxy after its shape moved. Returns true when the fat box
    /// had to be rebuilt, which queues the proxy for pair finding.
    pub fn move_proxy(&mut self, id: ProxyId<T>, aabb: &Aabb, displacement: Vec2) -> bool {
        let (old_aabb, old_oversized) = match self.proxies.get(id) {
            Some(proxy) if proxy.fat_aabb.contains(aabb) => return false,
            Some(proxy) => (proxy.fat_aabb, proxy.oversized),
            None => return false,
        };

        // Extend the box along the predicted motion.
        let mut fat = aabb.extended(AABB_EXTENSION);
        let d = displacement * AABB_MULTIPLIER;
        if d.x < 0.0 {
            fat.min.x += d.x;
        } else {
            fat.max.x += d.x;
        }
        if d.y < 0.0 {
            fat.min.y += d.y;
        } else {
            fat.max.y += d.y;
        }

        self.unregister(id, &old_aabb, old_oversized);
        let oversized = self.grid.cell_count(&fat) > MAX_PROXY_CELLS;
        if let Some(proxy) = self.proxies.get_mut(id) {
            proxy.fat_aabb = fat;
            proxy.oversized = oversized;
        }
        self.register(id, &fat, oversized);
        self.touch_proxy(id);
        true
    }

    /// Queues a proxy so its pairs are re-reported on the next update.
    pub fn touch_proxy(&mut self, id: ProxyId<T>) {
        if !self.move_buffer.contains(&id) {
            self.move_buffer.push(id);
        }
    }

    pub fn fat_aabb(&self, id: ProxyId<T>) -> Option<Aabb> {
        self.proxies.get(id).map(|proxy| proxy.fat_aabb)
    }

    pub fn user_data(&self, id: ProxyId<T>) -> Option<T> {
        self.proxies.get(id).map(|proxy| proxy.user_data)
    }

    pub fn test_overlap(&self, a: ProxyId<T>, b: ProxyId<T>) -> bool {
        match (self.proxies.get(a), self.proxies.get(b)) {
            (Some(pa), Some(pb)) => pa.fat_aabb.overlaps(&pb.fat_aabb),
            _ => false,
        }
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn move_count(&self) -> usize {
        self.move_buffer.len()
    }

    /// Reports every new overlapping pair involving a moved proxy, in a
    /// deterministic order, and clears the move buffer.
    pub fn update_pairs(&mut self) -> Vec<(T, T)> {
        self.pair_buffer.clear();
        let mut moved = std::mem::take(&mut self.move_buffer);
        // Pairs are sorted below, so the query order does not matter.
        moved.sort_unstable();
        moved.dedup();

        for &query_id in &moved {
            let query_aabb = match self.proxies.get(query_id) {
                Some(proxy) => proxy.fat_aabb,
                None => continue,
            };

            self.scratch.clear();
            self.grid.query(&query_aabb, &mut self.scratch);
            self.scratch.extend(self.oversized.iter().copied());

            for &other in &self.scratch {
                if other == query_id {
                    continue;
                }
                // Both moved: only the lower id reports the pair.
                if other < query_id && moved.binary_search(&other).is_ok() {
                    continue;
                }
                let overlaps = self
                    .proxies
                    .get(other)
                    .map(|proxy| proxy.fat_aabb.overlaps(&query_aabb))
                    .unwrap_or(false);
                if overlaps {
                    self.pair_buffer.push((query_id.min(other), query_id.max(other)));
                }
            }
        }

        self.pair_buffer.sort();
        self.pair_buffer.dedup();

        let proxies = &self.proxies;
        self.pair_buffer
            .iter()
            .filter_map(|&(a, b)| {
                let pa = proxies.get(a)?;
                let pb = proxies.get(b)?;
                Some((pa.user_data, pb.user_data))
            })
            .collect()
    }

    /// Calls `callback` with every proxy whose fat box overlaps `aabb`.
    /// Returning false stops the query.
    pub fn query<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(T) -> bool,
    {
        let mut candidates = Vec::new();
        self.grid.query(aabb, &mut candidates);
        candidates.extend(self.oversized.iter().copied());
        candidates.sort();
        candidates.dedup();

        for id in candidates {
            let Some(proxy) = self.proxies.get(id) else {
                continue;
            };
            if proxy.fat_aabb.overlaps(aabb) && !callback(proxy.user_data) {
                return;
            }
        }
    }

    /// Casts a ray against the fat boxes, nearest candidates first.
    ///
    /// The callback returns the new maximum fraction: `0` terminates, a
    /// negative value ignores the proxy, and a positive value clips the ray.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mut callback: F)
    where
        F: FnMut(&RayCastInput, T) -> f32,
    {
        let mut max_fraction = input.max_fraction;
        let end = input.point_at(max_fraction);
        let ray_box = Aabb::from_points(input.p1, end);

        let mut candidates = Vec::new();
        self.grid.query(&ray_box, &mut candidates);
        candidates.extend(self.oversized.iter().copied());
        candidates.sort();
        candidates.dedup();

        let mut ordered: Vec<(f32, ProxyId<T>)> = candidates
            .into_iter()
            .filter_map(|id| {
                let proxy = self.proxies.get(id)?;
                proxy.fat_aabb.ray_cast(input).map(|t| (t, id))
            })
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (entry, id) in ordered {
            if entry > max_fraction {
                break;
            }
            let Some(proxy) = self.proxies.get(id) else {
                continue;
            };
            let sub_input = RayCastInput {
                max_fraction,
                ..*input
            };
            let value = callback(&sub_input, proxy.user_data);
            if value == 0.0 {
                return;
            }
            if value > 0.0 {
                max_fraction = value;
            }
        }
    }

    /// Translates every proxy so that `new_origin` becomes the origin.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.grid.clear();
        self.oversized.clear();
        let mut entries = Vec::with_capacity(self.proxies.len());
        for (id, proxy) in self.proxies.iter_mut() {
            proxy.fat_aabb.min -= new_origin;
            proxy.fat_aabb.max -= new_origin;
            entries.push((id, proxy.fat_aabb));
        }
        for (id, aabb) in entries {
            let oversized = self.grid.cell_count(&aabb) > MAX_PROXY_CELLS;
            if let Some(proxy) = self.proxies.get_mut(id) {
                proxy.oversized = oversized;
            }
            self.register(id, &aabb, oversized);
        }
    }

    fn register(&mut self, id: ProxyId<T>, aabb: &Aabb, oversized: bool) {
        if oversized {
            self.oversized.push(id);
        } else {
            self.grid.insert(id, aabb);
        }
    }

    fn unregister(&mut self, id: ProxyId<T>, aabb: &Aabb, oversized: bool) {
        if oversized {
            self.oversized.retain(|other| *other != id);
        } else {
            self.grid.remove(id, aabb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(center: Vec2, half: f32) -> Aabb {
        Aabb::new(center - Vec2::splat(half), center + Vec2::splat(half))
    }

    #[test]
    fn overlapping_proxies_are_paired_once() {
        let mut bp = BroadPhase::new(2.0);
        bp.create_proxy(&square(Vec2::ZERO, 0.5), 1u32);
        bp.create_proxy(&square(Vec2::new(0.8, 0.0), 0.5), 2u32);
        bp.create_proxy(&square(Vec2::new(10.0, 0.0), 0.5), 3u32);

        let pairs = bp.update_pairs();
        assert_eq!(pairs, vec![(1, 2)]);
        assert_eq!(bp.move_count(), 0);
        assert!(bp.update_pairs().is_empty());
    }

    #[test]
    fn crowded_move_buffer_reports_each_pair_once() {
        let mut bp = BroadPhase::new(2.0);
        let ids: Vec<_> = (0..6u32)
            .map(|i| bp.create_proxy(&square(Vec2::new(i as f32 * 0.35, 0.0), 0.5), i))
            .collect();
        bp.update_pairs();

        // Touch every proxy twice, in reverse order.
        for &id in ids.iter().rev().chain(ids.iter()) {
            bp.touch_proxy(id);
        }
        let pairs = bp.update_pairs();
        let mut expected = Vec::new();
        for a in 0..6u32 {
            for b in (a + 1)..6 {
                if (b - a) as f32 * 0.35 < 1.0 + 2.0 * AABB_EXTENSION {
                    expected.push((a, b));
                }
            }
        }
        assert_eq!(pairs, expected);
        assert_eq!(bp.move_count(), 0);
    }

    #[test]
    fn small_moves_stay_inside_fat_box() {
        let mut bp = BroadPhase::new(2.0);
        let id = bp.create_proxy(&square(Vec2::ZERO, 0.5), 7u32);
        bp.update_pairs();
        assert!(!bp.move_proxy(id, &square(Vec2::new(0.05, 0.0), 0.5), Vec2::new(0.05, 0.0)));
        assert!(bp.move_proxy(id, &square(Vec2::new(3.0, 0.0), 0.5), Vec2::new(3.0, 0.0)));
        let fat = bp.fat_aabb(id).unwrap();
        assert!(fat.max.x > 3.5 + 2.0 * 3.0 - 0.01);
        assert_eq!(bp.move_count(), 1);
    }

    #[test]
    fn oversized_proxies_still_pair() {
        let mut bp = BroadPhase::new(1.0);
        bp.create_proxy(&Aabb::new(Vec2::new(-100.0, -0.1), Vec2::new(100.0, 0.1)), 1u32);
        bp.create_proxy(&square(Vec2::new(40.0, 0.3), 0.5), 2u32);
        assert_eq!(bp.update_pairs(), vec![(1, 2)]);
    }

    #[test]
    fn ray_cast_clips_and_orders_candidates() {
        let mut bp = BroadPhase::new(2.0);
        bp.create_proxy(&square(Vec2::new(8.0, 0.0), 0.5), 2u32);
        bp.create_proxy(&square(Vec2::new(4.0, 0.0), 0.5), 1u32);
        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        let mut seen = Vec::new();
        bp.ray_cast(&input, |sub, data| {
            seen.push(data);
            assert!(sub.max_fraction <= 1.0);
            0.4
        });
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn shift_origin_moves_boxes() {
        let mut bp = BroadPhase::new(2.0);
        let id = bp.create_proxy(&square(Vec2::new(5.0, 5.0), 0.5), 1u32);
        bp.shift_origin(Vec2::new(5.0, 5.0));
        let fat = bp.fat_aabb(id).unwrap();
        assert!(fat.center().length() < 1e-5);
        let mut hits = Vec::new();
        bp.query(&square(Vec2::ZERO, 0.1), |data| {
            hits.push(data);
            true
        });
        assert_eq!(hits, vec![1]);
    }
}
