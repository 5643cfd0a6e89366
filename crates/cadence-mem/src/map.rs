//! Key/value map with an explicitly controlled memory lifecycle.
//!
//! Keys are opaque byte strings built field by field through [`MapKey`];
//! values are fixed-size byte slots read and written through [`MapValue`].
//! Key and value bytes live in budgeted pages, the open-addressed slot table
//! (linear probing) only holds entry indexes. Each slot is stamped with the
//! generation that filled it, so `clear` bumps one counter instead of
//! rewriting the table.
//!
//! Memory lifecycle is carried by the type system:
//! - a [`FastMap`] always owns live memory; dropping it releases everything;
//! - [`FastMap::close`] turns it into a [`ReleasedMap`], which holds only the
//!   sizing and the budget, and [`ReleasedMap::reallocate`] turns it back;
//! - [`MapSlot`] is what a factory keeps between executions.
//!
//! There is no way to call `with_key` on released memory.

use std::mem;

use cadence_core::budget::BudgetGuard;
use cadence_core::config::{MapConfig, MAX_MAP_PAGE_SIZE};
use cadence_core::hash::hash_key;

use crate::error::{Error, Result};
use crate::guard::{BudgetGuardImpl, MemoryBudgetImpl};
use crate::pool::{BufferPool, OwnedBuf};

/// One slot of the probe table. Occupied only when `generation` matches the
/// map's current generation.
#[derive(Debug, Clone, Copy, Default)]
struct SlotRef {
    generation: u32,
    entry: u32,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    hash: u64,
    page: u32,
    offset: u32,
    key_len: u32,
}

enum Probe {
    Found(usize),
    Vacant(usize),
}

/// Largest key, length prefixes included; key lengths are written as `i32`.
pub const MAX_KEY_BYTES: usize = i32::MAX as usize;

fn slot_count_for(key_capacity: usize, load_factor: f64) -> Option<usize> {
    let wanted = (key_capacity as f64 / load_factor).ceil();
    if wanted.is_nan() || wanted >= usize::MAX as f64 {
        return None;
    }
    (wanted as usize).max(2).checked_next_power_of_two()
}

fn max_entries_for(slot_count: usize, load_factor: f64) -> usize {
    ((slot_count as f64 * load_factor) as usize).clamp(1, slot_count - 1)
}

fn index_bytes(slot_count: usize, max_entries: usize) -> Option<usize> {
    let slots = slot_count.checked_mul(mem::size_of::<SlotRef>())?;
    let entries = max_entries.checked_mul(mem::size_of::<Entry>())?;
    slots.checked_add(entries)
}

/// Slot table sizing for `config`, rejecting sizes that cannot be indexed.
fn initial_sizing(config: &MapConfig) -> Result<(usize, usize, usize)> {
    let too_big = || {
        Error::Config(format!(
            "map of {} keys at load factor {} cannot be indexed",
            config.key_capacity, config.load_factor
        ))
    };
    let slot_count = slot_count_for(config.key_capacity, config.load_factor).ok_or_else(too_big)?;
    let max_entries = max_entries_for(slot_count, config.load_factor);
    if max_entries > u32::MAX as usize {
        return Err(too_big());
    }
    let bytes = index_bytes(slot_count, max_entries).ok_or_else(too_big)?;
    Ok((slot_count, max_entries, bytes))
}

pub struct FastMap {
    config: MapConfig,
    value_size: usize,
    pool: BufferPool,
    pages: Vec<OwnedBuf>,
    active_page: usize,
    entries: Vec<Entry>,
    slots: Vec<SlotRef>,
    generation: u32,
    max_entries: usize,
    resizes: u32,
    index_guard: BudgetGuardImpl,
    key_buf: Vec<u8>,
}

impl FastMap {
    /// Allocate a map whose values are `value_size` bytes wide.
    pub fn new(config: MapConfig, value_size: usize, budget: &MemoryBudgetImpl) -> Result<Self> {
        Self::with_pool(config, value_size, BufferPool::new(budget.clone()))
    }

    fn with_pool(config: MapConfig, value_size: usize, pool: BufferPool) -> Result<Self> {
        config.validate()?;
        let (slot_count, max_entries, bytes) = initial_sizing(&config)?;
        let index_guard = pool.acquire(bytes, "map-index")?;
        let first_page = pool.alloc_page(config.page_size, "map-page")?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            slots = slot_count,
            page_size = config.page_size,
            value_size,
            "map allocated"
        );

        Ok(Self {
            config,
            value_size,
            pool,
            pages: vec![first_page],
            active_page: 0,
            entries: Vec::with_capacity(max_entries),
            slots: vec![SlotRef::default(); slot_count],
            generation: 1,
            max_entries,
            resizes: 0,
            index_guard,
            key_buf: Vec::with_capacity(64),
        })
    }

    /// Start building a key. The previous key, if any, is discarded.
    pub fn with_key(&mut self) -> MapKey<'_> {
        self.key_buf.clear();
        MapKey { map: self }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries the map can hold before its slot table doubles.
    pub fn key_capacity(&self) -> usize {
        self.max_entries
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Bytes currently accounted against the budget for this map.
    pub fn allocated_bytes(&self) -> usize {
        self.index_guard.bytes()
            + self
                .pages
                .iter()
                .map(|p| p.accounted_bytes())
                .sum::<usize>()
    }

    /// Drop every entry; pages and slot table stay allocated.
    ///
    /// Constant in the size of the slot table: only the generation moves and
    /// the pages written since the last clear are rewound.
    pub fn clear(&mut self) {
        self.entries.clear();
        let used = (self.active_page + 1).min(self.pages.len());
        for page in &mut self.pages[..used] {
            page.clear();
        }
        self.active_page = 0;
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.slots.fill(SlotRef::default());
            self.generation = 1;
        }
    }

    /// Release all memory, keeping what is needed to allocate again.
    pub fn close(self) -> ReleasedMap {
        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = self.allocated_bytes(), entries = self.size(), "map closed");
        self.template()
    }

    fn template(&self) -> ReleasedMap {
        ReleasedMap {
            config: self.config,
            value_size: self.value_size,
            pool: self.pool.clone(),
        }
    }

    fn key_of(&self, e: &Entry) -> &[u8] {
        let start = e.offset as usize;
        &self.pages[e.page as usize][start..start + e.key_len as usize]
    }

    fn probe(&self, hash: u64, key: &[u8]) -> Probe {
        let mask = self.slots.len() - 1;
        let mut idx = hash as usize & mask;
        loop {
            let s = self.slots[idx];
            if s.generation != self.generation {
                return Probe::Vacant(idx);
            }
            let entry_idx = s.entry as usize;
            let e = &self.entries[entry_idx];
            if e.hash == hash && self.key_of(e) == key {
                return Probe::Found(entry_idx);
            }
            idx = (idx + 1) & mask;
        }
    }

    fn vacant_slot(slots: &[SlotRef], generation: u32, hash: u64) -> usize {
        let mask = slots.len() - 1;
        let mut idx = hash as usize & mask;
        while slots[idx].generation == generation {
            idx = (idx + 1) & mask;
        }
        idx
    }

    fn insert(&mut self, hash: u64, key: &[u8], mut slot: usize) -> Result<usize> {
        if self.entries.len() >= self.max_entries {
            self.grow()?;
            slot = Self::vacant_slot(&self.slots, self.generation, hash);
        }
        let (page, offset) = self.append_entry(key)?;
        let idx = self.entries.len();
        self.entries.push(Entry {
            hash,
            page: page as u32,
            offset: offset as u32,
            key_len: key.len() as u32,
        });
        self.slots[slot] = SlotRef {
            generation: self.generation,
            entry: idx as u32,
        };
        Ok(idx)
    }

    /// Copy key plus a zeroed value into the key heap.
    fn append_entry(&mut self, key: &[u8]) -> Result<(usize, usize)> {
        let need = key.len() + self.value_size;
        if key.len() > MAX_KEY_BYTES || need > MAX_MAP_PAGE_SIZE {
            return Err(Error::EntryTooLarge {
                need,
                page: MAX_MAP_PAGE_SIZE,
            });
        }
        while self.active_page < self.pages.len() {
            if let Some(offset) = self.pages[self.active_page].append(key, self.value_size) {
                return Ok((self.active_page, offset));
            }
            self.active_page += 1;
        }

        let cap = need.max(self.config.page_size);
        let mut page = self.pool.alloc_page(cap, "map-page")?;
        let offset = page
            .append(key, self.value_size)
            .ok_or(Error::EntryTooLarge { need, page: cap })?;
        self.pages.push(page);
        self.active_page = self.pages.len() - 1;
        Ok((self.active_page, offset))
    }

    fn grow(&mut self) -> Result<()> {
        let full = || Error::MapFull {
            entries: self.entries.len(),
            resizes: self.resizes,
            max_resizes: self.config.max_resizes,
        };
        if self.resizes >= self.config.max_resizes {
            return Err(full());
        }
        let slot_count = self.slots.len().checked_mul(2).ok_or_else(full)?;
        let max_entries = max_entries_for(slot_count, self.config.load_factor);
        if max_entries > u32::MAX as usize {
            return Err(full());
        }
        let bytes = index_bytes(slot_count, max_entries).ok_or_else(full)?;
        if !self.index_guard.try_resize(bytes) {
            let budget = self.pool.budget();
            return Err(Error::BudgetExceeded {
                tag: "map-index",
                requested: bytes,
                capacity: budget.capacity_bytes(),
                used: budget.used_bytes(),
            });
        }

        let generation = self.generation;
        let mut slots = vec![SlotRef::default(); slot_count];
        for (i, e) in self.entries.iter().enumerate() {
            let idx = Self::vacant_slot(&slots, generation, e.hash);
            slots[idx] = SlotRef {
                generation,
                entry: i as u32,
            };
        }
        self.slots = slots;
        self.max_entries = max_entries;
        self.entries
            .reserve_exact(max_entries.saturating_sub(self.entries.len()));
        self.resizes += 1;

        #[cfg(feature = "tracing")]
        tracing::trace!(slots = slot_count, resizes = self.resizes, "map grew");
        Ok(())
    }

    fn value_at(&mut self, idx: usize, new: bool) -> MapValue<'_> {
        let e = self.entries[idx];
        let start = e.offset as usize + e.key_len as usize;
        let end = start + self.value_size;
        MapValue {
            bytes: &mut self.pages[e.page as usize][start..end],
            new,
        }
    }
}

impl std::fmt::Debug for FastMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastMap")
            .field("size", &self.size())
            .field("slots", &self.slots.len())
            .field("pages", &self.pages.len())
            .field("value_size", &self.value_size)
            .finish()
    }
}

/// Key under construction. Consumed by `create`, `create_value` or `find_value`.
pub struct MapKey<'m> {
    map: &'m mut FastMap,
}

impl<'m> MapKey<'m> {
    pub fn put_bool(&mut self, v: bool) {
        self.map.key_buf.push(v as u8);
    }

    pub fn put_int(&mut self, v: i32) {
        self.map.key_buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_long(&mut self, v: i64) {
        self.map.key_buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Doubles are canonicalised so that `-0.0 == 0.0` and every NaN is one key.
    pub fn put_double(&mut self, v: f64) {
        let bits = if v.is_nan() {
            f64::NAN.to_bits()
        } else if v == 0.0 {
            0.0f64.to_bits()
        } else {
            v.to_bits()
        };
        self.map.key_buf.extend_from_slice(&bits.to_le_bytes());
    }

    pub fn put_timestamp(&mut self, v: i64) {
        self.put_long(v);
    }

    /// Length-prefixed text; null is length -1.
    pub fn put_str(&mut self, v: Option<&str>) {
        self.put_bin(v.map(str::as_bytes));
    }

    /// Length-prefixed bytes; null is length -1.
    pub fn put_bin(&mut self, v: Option<&[u8]>) {
        match v {
            Some(bytes) => {
                // Keys past MAX_KEY_BYTES are refused on insert, never stored.
                self.put_int(i32::try_from(bytes.len()).unwrap_or(i32::MAX));
                self.map.key_buf.extend_from_slice(bytes);
            }
            None => self.put_int(-1),
        }
    }

    /// Serialized key so far.
    pub fn bytes(&self) -> &[u8] {
        &self.map.key_buf
    }

    /// Insert the key if absent. Returns `true` when the entry is new.
    pub fn create(self) -> Result<bool> {
        let map = self.map;
        let key = mem::take(&mut map.key_buf);
        let hash = hash_key(&key);
        let res = match map.probe(hash, &key) {
            Probe::Found(_) => Ok(false),
            Probe::Vacant(slot) => map.insert(hash, &key, slot).map(|_| true),
        };
        map.key_buf = key;
        res
    }

    /// Insert-or-fetch; the returned value reports whether it was just created
    /// (new values are zeroed).
    pub fn create_value(self) -> Result<MapValue<'m>> {
        let map = self.map;
        let key = mem::take(&mut map.key_buf);
        let hash = hash_key(&key);
        let res = match map.probe(hash, &key) {
            Probe::Found(idx) => Ok((idx, false)),
            Probe::Vacant(slot) => map.insert(hash, &key, slot).map(|idx| (idx, true)),
        };
        map.key_buf = key;
        let (idx, new) = res?;
        Ok(map.value_at(idx, new))
    }

    /// Look the key up without inserting.
    pub fn find_value(self) -> Option<MapValue<'m>> {
        let map = self.map;
        let hash = hash_key(&map.key_buf);
        match map.probe(hash, &map.key_buf) {
            Probe::Found(idx) => Some(map.value_at(idx, false)),
            Probe::Vacant(_) => None,
        }
    }
}

/// Mutable view of one entry's value bytes.
pub struct MapValue<'m> {
    bytes: &'m mut [u8],
    new: bool,
}

impl MapValue<'_> {
    pub fn is_new(&self) -> bool {
        self.new
    }

    fn range(&self, offset: usize, width: usize) -> Result<std::ops::Range<usize>> {
        if offset + width > self.bytes.len() {
            return Err(Error::ValueOutOfBounds {
                offset,
                width,
                size: self.bytes.len(),
            });
        }
        Ok(offset..offset + width)
    }

    pub fn get_long(&self, offset: usize) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[self.range(offset, 8)?]);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn put_long(&mut self, offset: usize, v: i64) -> Result<()> {
        let r = self.range(offset, 8)?;
        self.bytes[r].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Add `delta` and return the new value.
    pub fn add_long(&mut self, offset: usize, delta: i64) -> Result<i64> {
        let v = self.get_long(offset)?.wrapping_add(delta);
        self.put_long(offset, v)?;
        Ok(v)
    }

    pub fn get_int(&self, offset: usize) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[self.range(offset, 4)?]);
        Ok(i32::from_le_bytes(buf))
    }

    pub fn put_int(&mut self, offset: usize, v: i32) -> Result<()> {
        let r = self.range(offset, 4)?;
        self.bytes[r].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    pub fn get_bool(&self, offset: usize) -> Result<bool> {
        Ok(self.bytes[self.range(offset, 1)?][0] != 0)
    }

    pub fn put_bool(&mut self, offset: usize, v: bool) -> Result<()> {
        let r = self.range(offset, 1)?;
        self.bytes[r][0] = v as u8;
        Ok(())
    }
}

/// A map whose memory has been returned to the budget.
#[derive(Debug, Clone)]
pub struct ReleasedMap {
    config: MapConfig,
    value_size: usize,
    pool: BufferPool,
}

impl ReleasedMap {
    pub fn new(config: MapConfig, value_size: usize, budget: &MemoryBudgetImpl) -> Self {
        Self {
            config,
            value_size,
            pool: BufferPool::new(budget.clone()),
        }
    }

    /// Acquire fresh memory with the sizing it was created with.
    pub fn reallocate(self) -> Result<FastMap> {
        #[cfg(feature = "tracing")]
        tracing::debug!(key_capacity = self.config.key_capacity, "map reallocate");
        FastMap::with_pool(self.config, self.value_size, self.pool)
    }
}

/// What a factory keeps between executions: either a live map allocated at
/// construction, or the released template left behind once a bound cursor
/// took the live map.
#[derive(Debug)]
pub enum MapSlot {
    Allocated(FastMap),
    Released(ReleasedMap),
}

impl MapSlot {
    /// Allocate eagerly, so sizing and budget errors surface at construction.
    pub fn allocate(config: MapConfig, value_size: usize, budget: &MemoryBudgetImpl) -> Result<Self> {
        Ok(MapSlot::Allocated(FastMap::new(config, value_size, budget)?))
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, MapSlot::Allocated(_))
    }

    /// Hand a live, empty map to a cursor being bound. The slot is left
    /// `Released`; the memory now belongs to the caller.
    pub fn acquire(&mut self) -> Result<FastMap> {
        let template = match self {
            MapSlot::Allocated(map) => map.template(),
            MapSlot::Released(released) => released.clone(),
        };
        match mem::replace(self, MapSlot::Released(template)) {
            MapSlot::Allocated(mut map) => {
                map.clear();
                Ok(map)
            }
            MapSlot::Released(released) => released.reallocate(),
        }
    }
}
