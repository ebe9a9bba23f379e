//! Zone-based bump allocator.
//!
//! Allocations are handed out as [`ArenaSlot`] handles rather than
//! references, so an arena can be filled while other parts of a session are
//! borrowed. Nothing is ever freed individually; [`Arena::release_all`] (or
//! dropping the arena) drops every zone at once and invalidates every handle
//! issued before it.

use super::AllocError;

/// Default zone size (4KB)
pub const DEFAULT_ZONE_SIZE: usize = 4096;

struct Zone {
    // len() is the write cursor, capacity() never changes after creation
    data: Vec<u8>,
}

impl Zone {
    fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| AllocError::from_reserve(capacity, e))?;
        Ok(Self { data })
    }

    fn remaining(&self) -> usize {
        self.data.capacity() - self.data.len()
    }
}

/// Handle to a byte region inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSlot {
    generation: u32,
    zone: usize,
    offset: usize,
    len: usize,
}

impl ArenaSlot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Handle to a UTF-8 string copied into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStr(ArenaSlot);

impl ArenaStr {
    pub fn slot(&self) -> ArenaSlot {
        self.0
    }
}

pub struct Arena {
    zones: Vec<Zone>,
    zone_size: usize,
    generation: u32,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_zone_size(DEFAULT_ZONE_SIZE)
    }

    /// Creates an arena whose zones are at least `zone_size` bytes.
    ///
    /// No zone is allocated until the first request.
    pub fn with_zone_size(zone_size: usize) -> Self {
        Self {
            zones: Vec::new(),
            zone_size: zone_size.max(1),
            generation: 0,
        }
    }

    /// Reserves `size` zeroed bytes.
    ///
    /// The request is served from the current zone when it fits; otherwise a
    /// new zone of `max(size, zone_size)` bytes is appended and becomes the
    /// current one. Fails only when the system allocator does.
    pub fn allocate(&mut self, size: usize) -> Result<ArenaSlot, AllocError> {
        let fits = self
            .zones
            .last()
            .map(|zone| zone.remaining() >= size)
            .unwrap_or(false);

        if !fits {
            let zone = Zone::with_capacity(size.max(self.zone_size))?;
            self.zones.push(zone);
        }

        let zone_index = self.zones.len() - 1;
        let zone = &mut self.zones[zone_index];
        let offset = zone.data.len();
        // Within capacity, so this never reallocates.
        zone.data.resize(offset + size, 0);

        Ok(ArenaSlot {
            generation: self.generation,
            zone: zone_index,
            offset,
            len: size,
        })
    }

    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> Result<ArenaSlot, AllocError> {
        let slot = self.allocate(bytes.len())?;
        if let Some(dst) = self.get_mut(slot) {
            dst.copy_from_slice(bytes);
        }
        Ok(slot)
    }

    pub fn alloc_str(&mut self, s: &str) -> Result<ArenaStr, AllocError> {
        self.alloc_bytes(s.as_bytes()).map(ArenaStr)
    }

    /// Resolves a handle. Returns `None` for handles issued before the last
    /// [`release_all`](Self::release_all) or by another arena.
    pub fn get(&self, slot: ArenaSlot) -> Option<&[u8]> {
        if slot.generation != self.generation {
            return None;
        }
        self.zones
            .get(slot.zone)
            .and_then(|zone| zone.data.get(slot.offset..slot.offset + slot.len))
    }

    pub fn get_mut(&mut self, slot: ArenaSlot) -> Option<&mut [u8]> {
        if slot.generation != self.generation {
            return None;
        }
        self.zones
            .get_mut(slot.zone)
            .and_then(|zone| zone.data.get_mut(slot.offset..slot.offset + slot.len))
    }

    pub fn str(&self, handle: ArenaStr) -> Option<&str> {
        self.get(handle.0).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Frees every zone.
    pub fn release_all(&mut self) {
        self.zones.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Total bytes handed out since the last release.
    pub fn allocated_bytes(&self) -> usize {
        self.zones.iter().map(|zone| zone.data.len()).sum()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_allocations_share_a_zone() {
        let mut arena = Arena::with_zone_size(64);
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(20).unwrap();

        assert_eq!(arena.zone_count(), 1);
        assert_eq!(a.zone, b.zone);
        assert_eq!(b.offset, 10);
    }
}
