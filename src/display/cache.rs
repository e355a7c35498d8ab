/*
 *  display/cache.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Keyed cache for drawing resources that are costly to rebuild per frame
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use mini_moka::unsync::Cache;

use crate::constants::RESOURCE_CACHE_CAPACITY;
use crate::display::color::{ColorScheme, LinearGradient};

/// What a cached resource is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BarGradient,
    ReflectionGradient,
}

/// Cache key: identical inputs always address the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub scheme: ColorScheme,
    /// Span the resource was built for (surface rows)
    pub height: u32,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, scheme: ColorScheme, height: u32) -> Self {
        Self { kind, scheme, height }
    }
}

/// Rough heap footprint, for the memory estimate in metrics.
pub trait ResourceSize {
    fn bytes(&self) -> usize;
}

impl ResourceSize for LinearGradient {
    fn bytes(&self) -> usize {
        LinearGradient::bytes(self)
    }
}

/// Key -> resource cache. No partial eviction in practice: capacity is well
/// above the handful of live keys, and the owner clears the lot when the
/// surface is resized or the palette changes.
pub struct ResourceCache<K, R> {
    entries: Cache<K, Rc<R>>,
    hits: u64,
    misses: u64,
    bytes: usize,
}

impl<K: Eq + Hash, R: ResourceSize> ResourceCache<K, R> {
    pub fn new() -> Self {
        Self::with_capacity(RESOURCE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self { entries: Cache::new(capacity), hits: 0, misses: 0, bytes: 0 }
    }

    /// Cached resource for `key`, building it with `factory` on a miss.
    /// A failed build leaves nothing behind, so the next call retries.
    pub fn get_or_create<E, F>(&mut self, key: K, factory: F) -> Result<Rc<R>, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(Rc::clone(hit));
        }
        self.misses += 1;
        let made = Rc::new(factory()?);
        self.bytes += made.bytes();
        self.entries.insert(key, Rc::clone(&made));
        Ok(made)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        let n = self.len();
        if n > 0 {
            log::debug!("resource cache cleared ({} entries)", n);
        }
        self.entries.invalidate_all();
        self.bytes = 0;
    }

    pub fn len(&self) -> usize { self.entries.entry_count() as usize }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn hits(&self) -> u64 { self.hits }
    pub fn misses(&self) -> u64 { self.misses }
    pub fn bytes(&self) -> usize { self.bytes }
}

impl<K: Eq + Hash, R: ResourceSize> Default for ResourceCache<K, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, R: ResourceSize> fmt::Debug for ResourceCache<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("bytes", &self.bytes)
            .finish()
    }
}
