//! Variable-length field storage.
//!
//! All dynamic fields of one entity share a single flat value buffer. A side
//! table records where each field lives in the buffer and how it changed since
//! the last flush; a parallel vector carries the per-element dirty bits.

use super::{DynamicField, UpdateMask};
use crate::error::FieldError;
use serde::{Deserialize, Serialize};

/// Longest a dynamic field may grow: the element mask is written as a one-byte
/// block count of 32-bit blocks.
pub const MAX_DYNAMIC_ELEMENTS: usize = u8::MAX as usize * 32;

/// How a dynamic field changed since the last flush.
///
/// Ordered so that merging two changes keeps the stronger one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DynamicChange {
    #[default]
    Unchanged = 0,
    ValueChanged = 1,
    ValueAndSizeChanged = 2,
}

impl DynamicChange {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DynamicChange::Unchanged),
            1 => Some(DynamicChange::ValueChanged),
            2 => Some(DynamicChange::ValueAndSizeChanged),
            _ => None,
        }
    }
}

/// A fixed-size record packed into consecutive elements of a dynamic field.
pub trait DynamicRecord: Sized {
    /// Number of 32-bit elements one record occupies.
    const SLOTS: usize;

    fn write(&self, out: &mut [u32]);

    fn read(slots: &[u32]) -> Self;
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    offset: usize,
    len: usize,
    change: DynamicChange,
}

/// Flat arena holding every dynamic field of one entity.
#[derive(Debug, Clone, Default)]
pub struct DynamicFieldStore {
    entries: Vec<Entry>,
    values: Vec<u32>,
    dirty: Vec<bool>,
}

impl DynamicFieldStore {
    pub fn new(field_count: u16) -> Self {
        Self {
            entries: vec![Entry::default(); field_count as usize],
            values: Vec::new(),
            dirty: Vec::new(),
        }
    }

    pub fn field_count(&self) -> u16 {
        self.entries.len() as u16
    }

    fn entry(&self, field: DynamicField) -> Result<Entry, FieldError> {
        self.entries
            .get(field.0 as usize)
            .copied()
            .ok_or(FieldError::DynamicFieldOutOfRange {
                index: field.0,
                len: self.entries.len() as u16,
            })
    }

    /// Current elements of `field`.
    pub fn values(&self, field: DynamicField) -> Result<&[u32], FieldError> {
        let entry = self.entry(field)?;
        Ok(&self.values[entry.offset..entry.offset + entry.len])
    }

    pub fn len(&self, field: DynamicField) -> usize {
        self.entry(field).map(|entry| entry.len).unwrap_or(0)
    }

    pub fn change(&self, field: DynamicField) -> DynamicChange {
        self.entry(field)
            .map(|entry| entry.change)
            .unwrap_or(DynamicChange::Unchanged)
    }

    pub fn is_element_dirty(&self, field: DynamicField, index: usize) -> bool {
        match self.entry(field) {
            Ok(entry) if index < entry.len => self.dirty[entry.offset + index],
            _ => false,
        }
    }

    /// Per-element dirty mask of `field`, sized to its current length.
    pub fn dirty_elements(&self, field: DynamicField) -> UpdateMask {
        let Ok(entry) = self.entry(field) else {
            return UpdateMask::new(0);
        };
        let mut mask = UpdateMask::new(entry.len);
        for (index, dirty) in self.dirty[entry.offset..entry.offset + entry.len].iter().enumerate() {
            if *dirty {
                mask.set(index);
            }
        }
        mask
    }

    /// Mask of fields whose change tag is not `Unchanged`.
    pub fn changed_fields(&self) -> UpdateMask {
        let mut mask = UpdateMask::new(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.change != DynamicChange::Unchanged {
                mask.set(index);
            }
        }
        mask
    }

    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|entry| entry.change != DynamicChange::Unchanged)
    }

    fn ensure_capacity(field: DynamicField, requested: usize) -> Result<(), FieldError> {
        if requested > MAX_DYNAMIC_ELEMENTS {
            return Err(FieldError::DynamicFieldFull {
                index: field.0,
                requested,
                max: MAX_DYNAMIC_ELEMENTS,
            });
        }
        Ok(())
    }

    /// Inserts `count` zeroed elements at the end of `field`, shifting every
    /// field stored after it.
    fn grow(&mut self, index: usize, count: usize) {
        let entry = self.entries[index];
        let at = entry.offset + entry.len;
        self.values.splice(at..at, std::iter::repeat(0).take(count));
        self.dirty.splice(at..at, std::iter::repeat(false).take(count));
        for (other_index, other) in self.entries.iter_mut().enumerate() {
            if other_index != index && other.offset >= at {
                other.offset += count;
            }
        }
        self.entries[index].len += count;
    }

    fn mark(&mut self, index: usize, change: DynamicChange) {
        let entry = &mut self.entries[index];
        entry.change = entry.change.max(change);
    }

    pub fn append(&mut self, field: DynamicField, value: u32) -> Result<(), FieldError> {
        let entry = self.entry(field)?;
        Self::ensure_capacity(field, entry.len + 1)?;
        let index = field.0 as usize;
        self.grow(index, 1);
        let slot = entry.offset + entry.len;
        self.values[slot] = value;
        self.dirty[slot] = true;
        self.mark(index, DynamicChange::ValueAndSizeChanged);
        Ok(())
    }

    /// Writes element `element`, growing the field with zeros when needed.
    ///
    /// Returns `false` when the element already held `value` and nothing grew.
    pub fn set(&mut self, field: DynamicField, element: usize, value: u32) -> Result<bool, FieldError> {
        let entry = self.entry(field)?;
        Self::ensure_capacity(field, element.saturating_add(1))?;
        let index = field.0 as usize;
        let grew = element >= entry.len;
        if grew {
            self.grow(index, element + 1 - entry.len);
        } else if self.values[entry.offset + element] == value {
            return Ok(false);
        }

        let slot = entry.offset + element;
        self.values[slot] = value;
        self.dirty[slot] = true;
        self.mark(
            index,
            if grew { DynamicChange::ValueAndSizeChanged } else { DynamicChange::ValueChanged },
        );
        Ok(true)
    }

    /// Zeroes the first element equal to `value`.
    pub fn remove_value(&mut self, field: DynamicField, value: u32) -> Result<bool, FieldError> {
        let entry = self.entry(field)?;
        let elements = &self.values[entry.offset..entry.offset + entry.len];
        let Some(position) = elements.iter().position(|&element| element == value) else {
            return Ok(false);
        };
        let slot = entry.offset + position;
        self.values[slot] = 0;
        self.dirty[slot] = true;
        self.mark(field.0 as usize, DynamicChange::ValueChanged);
        Ok(true)
    }

    /// Drops every element of `field`. Clearing an empty field is a no-op.
    pub fn clear(&mut self, field: DynamicField) -> Result<bool, FieldError> {
        let entry = self.entry(field)?;
        if entry.len == 0 {
            return Ok(false);
        }
        let range = entry.offset..entry.offset + entry.len;
        self.values.drain(range.clone());
        self.dirty.drain(range);
        let index = field.0 as usize;
        self.entries[index].len = 0;
        let end = entry.offset + entry.len;
        for (other_index, other) in self.entries.iter_mut().enumerate() {
            if other_index != index && other.offset >= end {
                other.offset -= entry.len;
            }
        }
        self.mark(index, DynamicChange::ValueAndSizeChanged);
        Ok(true)
    }

    pub fn append_record<R: DynamicRecord>(&mut self, field: DynamicField, record: &R) -> Result<(), FieldError> {
        Self::ensure_capacity(field, self.entry(field)?.len + R::SLOTS)?;
        let mut packed = vec![0u32; R::SLOTS];
        record.write(&mut packed);
        for value in packed {
            self.append(field, value)?;
        }
        Ok(())
    }

    /// Writes record number `index`, growing the field as needed.
    pub fn set_record<R: DynamicRecord>(
        &mut self,
        field: DynamicField,
        index: usize,
        record: &R,
    ) -> Result<bool, FieldError> {
        self.entry(field)?;
        Self::ensure_capacity(field, index.saturating_add(1).saturating_mul(R::SLOTS))?;
        let mut packed = vec![0u32; R::SLOTS];
        record.write(&mut packed);
        let mut changed = false;
        for (element, value) in packed.into_iter().enumerate() {
            changed |= self.set(field, index * R::SLOTS + element, value)?;
        }
        Ok(changed)
    }

    pub fn record<R: DynamicRecord>(&self, field: DynamicField, index: usize) -> Option<R> {
        let values = self.values(field).ok()?;
        let start = index * R::SLOTS;
        values.get(start..start + R::SLOTS).map(R::read)
    }

    pub fn records<R: DynamicRecord>(&self, field: DynamicField) -> Vec<R> {
        self.values(field)
            .map(|values| values.chunks_exact(R::SLOTS).map(R::read).collect())
            .unwrap_or_default()
    }

    /// Resets change tags and element dirty bits.
    pub fn clear_dirty(&mut self) {
        self.entries.iter_mut().for_each(|entry| entry.change = DynamicChange::Unchanged);
        self.dirty.iter_mut().for_each(|dirty| *dirty = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPELLS: DynamicField = DynamicField(0);
    const EFFECTS: DynamicField = DynamicField(1);

    #[derive(Debug, PartialEq)]
    struct Line {
        id: u32,
        start_time: u32,
    }

    impl DynamicRecord for Line {
        const SLOTS: usize = 2;

        fn write(&self, out: &mut [u32]) {
            out[0] = self.id;
            out[1] = self.start_time;
        }

        fn read(slots: &[u32]) -> Self {
            Self { id: slots[0], start_time: slots[1] }
        }
    }

    #[test]
    fn fields_share_one_buffer_without_bleeding() {
        let mut store = DynamicFieldStore::new(2);
        store.append(EFFECTS, 7).unwrap();
        store.append(SPELLS, 1).unwrap();
        store.append(SPELLS, 2).unwrap();
        store.append(EFFECTS, 8).unwrap();

        assert_eq!(store.values(SPELLS).unwrap(), &[1, 2]);
        assert_eq!(store.values(EFFECTS).unwrap(), &[7, 8]);

        store.clear(SPELLS).unwrap();
        assert_eq!(store.values(SPELLS).unwrap(), &[] as &[u32]);
        assert_eq!(store.values(EFFECTS).unwrap(), &[7, 8]);
    }

    #[test]
    fn set_past_end_grows_and_marks_size_change() {
        let mut store = DynamicFieldStore::new(1);
        assert!(store.set(SPELLS, 3, 99).unwrap());
        assert_eq!(store.values(SPELLS).unwrap(), &[0, 0, 0, 99]);
        assert_eq!(store.change(SPELLS), DynamicChange::ValueAndSizeChanged);
        assert_eq!(store.dirty_elements(SPELLS).iter_set().collect::<Vec<_>>(), vec![3]);

        store.clear_dirty();
        assert!(!store.set(SPELLS, 3, 99).unwrap());
        assert!(store.set(SPELLS, 1, 5).unwrap());
        assert_eq!(store.change(SPELLS), DynamicChange::ValueChanged);
    }

    #[test]
    fn remove_value_zeroes_first_match_only() {
        let mut store = DynamicFieldStore::new(1);
        for value in [4, 6, 4] {
            store.append(SPELLS, value).unwrap();
        }
        store.clear_dirty();

        assert!(store.remove_value(SPELLS, 4).unwrap());
        assert_eq!(store.values(SPELLS).unwrap(), &[0, 6, 4]);
        assert_eq!(store.change(SPELLS), DynamicChange::ValueChanged);
        assert!(!store.remove_value(SPELLS, 42).unwrap());
    }

    #[test]
    fn clearing_empty_field_is_a_no_op() {
        let mut store = DynamicFieldStore::new(1);
        assert!(!store.clear(SPELLS).unwrap());
        assert!(!store.has_changes());
    }

    #[test]
    fn records_pack_into_consecutive_elements() {
        let mut store = DynamicFieldStore::new(2);
        store.append_record(EFFECTS, &Line { id: 10, start_time: 0 }).unwrap();
        store.append_record(EFFECTS, &Line { id: 11, start_time: 2500 }).unwrap();

        assert_eq!(store.len(EFFECTS), 4);
        assert_eq!(store.record::<Line>(EFFECTS, 1), Some(Line { id: 11, start_time: 2500 }));
        assert_eq!(store.records::<Line>(EFFECTS).len(), 2);
        assert_eq!(store.record::<Line>(EFFECTS, 2), None);
    }

    #[test]
    fn fields_stop_growing_at_the_mask_limit() {
        let mut store = DynamicFieldStore::new(2);
        assert!(store.set(SPELLS, MAX_DYNAMIC_ELEMENTS - 1, 5).unwrap());
        assert_eq!(store.len(SPELLS), MAX_DYNAMIC_ELEMENTS);

        let full = FieldError::DynamicFieldFull {
            index: 0,
            requested: MAX_DYNAMIC_ELEMENTS + 1,
            max: MAX_DYNAMIC_ELEMENTS,
        };
        assert_eq!(store.append(SPELLS, 1), Err(full.clone()));
        assert_eq!(store.set(SPELLS, MAX_DYNAMIC_ELEMENTS, 1), Err(full));
        assert!(store.set(SPELLS, 0, 9).unwrap());
        assert_eq!(store.len(SPELLS), MAX_DYNAMIC_ELEMENTS);

        store.set(EFFECTS, MAX_DYNAMIC_ELEMENTS - 2, 0).unwrap();
        assert!(store.append_record(EFFECTS, &Line { id: 1, start_time: 2 }).is_err());
        assert_eq!(store.len(EFFECTS), MAX_DYNAMIC_ELEMENTS - 1);
        assert!(store.set_record(EFFECTS, MAX_DYNAMIC_ELEMENTS / 2, &Line { id: 1, start_time: 2 }).is_err());
        assert_eq!(store.len(EFFECTS), MAX_DYNAMIC_ELEMENTS - 1);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut store = DynamicFieldStore::new(1);
        assert_eq!(
            store.append(DynamicField(3), 1),
            Err(FieldError::DynamicFieldOutOfRange { index: 3, len: 1 })
        );
    }
}
