//! Strut interning
//!
//! A strut is one addressable LED strip: an edge of the installation frame,
//! identified by its global index plus a direction flag. The same
//! `(index, reversed)` pair must always resolve to the same handle, because
//! the direction decides which end is LED zero for gradient rendering.
//!
//! Interning goes through an explicit registry owned by the topology (not a
//! process-wide cache), synchronized internally so construction can happen
//! from any thread.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{Result, TopologyError};

/// Stable handle to an interned strut. Cheap to copy and hash; resolve it
/// through the registry that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrutHandle(pub(crate) usize);

/// One addressable LED strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strut {
    /// Global strut index (position in the frame's edge list).
    pub index: usize,
    /// `true` when the strut is addressed against its default direction.
    pub reversed: bool,
    /// LED count, already adjusted for the configured trim.
    pub length: usize,
}

/// Arena of interned struts.
///
/// Built once per installation from the raw per-strut LED counts; the trim
/// (LEDs sacrificed at the strut end during mounting) is applied here so
/// every consumer sees the effective length.
pub struct StrutRegistry {
    lengths: Vec<usize>,
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    arena: Vec<Strut>,
    by_identity: HashMap<(usize, bool), StrutHandle>,
}

impl StrutRegistry {
    /// Create a registry for `raw_lengths.len()` struts, trimming each
    /// length by `trim` LEDs.
    pub fn new(raw_lengths: Vec<usize>, trim: usize) -> Self {
        let lengths = raw_lengths
            .into_iter()
            .map(|l| l.saturating_sub(trim))
            .collect();
        Self {
            lengths,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Registry for struts of one uniform length.
    pub fn uniform(strut_count: usize, length: usize, trim: usize) -> Self {
        Self::new(vec![length; strut_count], trim)
    }

    /// Number of struts this registry covers.
    pub fn strut_count(&self) -> usize {
        self.lengths.len()
    }

    /// Intern `(index, reversed)`, returning the canonical handle for that
    /// identity. Repeated calls with the same identity return the same
    /// handle.
    pub fn intern(&self, index: usize, reversed: bool) -> Result<StrutHandle> {
        if index >= self.lengths.len() {
            return Err(TopologyError::UnknownStrut(index));
        }
        {
            let inner = self.inner.read();
            if let Some(&h) = inner.by_identity.get(&(index, reversed)) {
                return Ok(h);
            }
        }
        let mut inner = self.inner.write();
        // Racing interners may have beaten us to the write lock.
        if let Some(&h) = inner.by_identity.get(&(index, reversed)) {
            return Ok(h);
        }
        let handle = StrutHandle(inner.arena.len());
        inner.arena.push(Strut {
            index,
            reversed,
            length: self.lengths[index],
        });
        inner.by_identity.insert((index, reversed), handle);
        Ok(handle)
    }

    /// Resolve a handle to its strut.
    pub fn get(&self, handle: StrutHandle) -> Strut {
        self.inner.read().arena[handle.0]
    }

    /// Handle for the same strut addressed in the opposite direction.
    pub fn opposite(&self, handle: StrutHandle) -> StrutHandle {
        let strut = self.get(handle);
        self.intern(strut.index, !strut.reversed)
            .expect("opposite of an interned strut is always in range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_canonical() {
        let registry = StrutRegistry::uniform(4, 60, 0);

        let a = registry.intern(2, false).unwrap();
        let b = registry.intern(2, false).unwrap();
        assert_eq!(a, b);

        let c = registry.intern(2, true).unwrap();
        assert_ne!(a, c);
        assert_eq!(registry.get(c).index, 2);
        assert!(registry.get(c).reversed);
    }

    #[test]
    fn test_trim_applied_once() {
        let registry = StrutRegistry::new(vec![60, 45, 3], 5);

        let h = registry.intern(0, false).unwrap();
        assert_eq!(registry.get(h).length, 55);

        let h = registry.intern(1, true).unwrap();
        assert_eq!(registry.get(h).length, 40);

        // Shorter than the trim saturates to zero rather than wrapping.
        let h = registry.intern(2, false).unwrap();
        assert_eq!(registry.get(h).length, 0);
    }

    #[test]
    fn test_unknown_strut_rejected() {
        let registry = StrutRegistry::uniform(4, 60, 0);
        assert!(registry.intern(4, false).is_err());
    }

    #[test]
    fn test_opposite_round_trips() {
        let registry = StrutRegistry::uniform(4, 60, 0);
        let h = registry.intern(1, false).unwrap();
        let o = registry.opposite(h);
        assert_eq!(registry.get(o).index, 1);
        assert!(registry.get(o).reversed);
        assert_eq!(registry.opposite(o), h);
    }
}
