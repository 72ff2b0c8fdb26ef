//! Per-entity scalar and dynamic field storage with change tracking.

use super::{DynamicChange, DynamicField, DynamicFieldStore, DynamicRecord, Field, FieldLayout, FieldValue, UpdateMask};
use crate::error::FieldError;
use tracing::error;

/// Field values of one entity plus everything needed to build its deltas.
///
/// A slot's dirty bit is set exactly when its value differs from the value it
/// held at the last [`clear_dirty`](Self::clear_dirty), or when it was forced.
/// Writes that store the value already present are no-ops.
#[derive(Debug, Clone)]
pub struct FieldStore {
    layout: &'static FieldLayout,
    values: Vec<u32>,
    flushed: Vec<u32>,
    changed: UpdateMask,
    notify: UpdateMask,
    dynamic: DynamicFieldStore,
    pending_update: bool,
}

impl FieldStore {
    pub fn new(layout: &'static FieldLayout) -> Self {
        let slots = layout.slot_count as usize;
        Self {
            layout,
            values: vec![0; slots],
            flushed: vec![0; slots],
            changed: UpdateMask::new(slots),
            notify: UpdateMask::new(slots),
            dynamic: DynamicFieldStore::new(layout.dynamic_count()),
            pending_update: false,
        }
    }

    pub fn layout(&self) -> &'static FieldLayout {
        self.layout
    }

    pub fn slot_count(&self) -> u16 {
        self.layout.slot_count
    }

    /// Raw content of every slot.
    pub fn raw_slots(&self) -> &[u32] {
        &self.values
    }

    pub fn raw(&self, slot: u16) -> u32 {
        self.values.get(slot as usize).copied().unwrap_or(0)
    }

    fn check_range(&self, offset: u16, width: u16) -> Result<std::ops::Range<usize>, FieldError> {
        let end = offset as usize + width as usize;
        if end > self.values.len() {
            return Err(FieldError::SlotOutOfRange {
                slot: offset,
                width,
                len: self.layout.slot_count,
            });
        }
        Ok(offset as usize..end)
    }

    pub fn try_get<T: FieldValue>(&self, field: Field<T>) -> Result<T, FieldError> {
        let range = self.check_range(field.offset(), T::SLOTS)?;
        Ok(T::read_slots(&self.values[range]))
    }

    /// Reads a field. A field outside this layout reads as zero.
    pub fn get<T: FieldValue>(&self, field: Field<T>) -> T {
        match self.try_get(field) {
            Ok(value) => value,
            Err(_) => T::read_slots(&[0; 2]),
        }
    }

    fn write_slots<T: FieldValue>(&mut self, field: Field<T>, value: T, force: bool) -> Result<bool, FieldError> {
        let range = self.check_range(field.offset(), T::SLOTS)?;
        let mut packed = [0u32; 2];
        value.write_slots(&mut packed[..T::SLOTS as usize]);
        let packed = &packed[..T::SLOTS as usize];

        if !force && self.values[range.clone()] == *packed {
            return Ok(false);
        }

        self.values[range.clone()].copy_from_slice(packed);
        for slot in range {
            if force || self.values[slot] != self.flushed[slot] {
                self.changed.set(slot);
            } else {
                self.changed.unset(slot);
            }
        }
        self.pending_update = true;
        Ok(true)
    }

    /// Writes a field, returning whether it changed.
    pub fn try_set<T: FieldValue>(&mut self, field: Field<T>, value: T) -> Result<bool, FieldError> {
        self.write_slots(field, value, false)
    }

    /// Writes a field, logging and dropping invalid writes.
    pub fn set<T: FieldValue>(&mut self, field: Field<T>, value: T) -> bool {
        let result = self.write_slots(field, value, false);
        self.report(result)
    }

    /// Writes a field and marks it dirty even when the value is unchanged.
    pub fn force_set<T: FieldValue>(&mut self, field: Field<T>, value: T) -> bool {
        let result = self.write_slots(field, value, true);
        self.report(result)
    }

    fn report(&self, result: Result<bool, FieldError>) -> bool {
        match result {
            Ok(changed) => changed,
            Err(err) => {
                error!(layout = self.layout.name, %err, "❌ Rejected field write");
                false
            }
        }
    }

    fn write_bits(&mut self, field: Field<u32>, offset: u8, width: u8, value: u32) -> Result<bool, FieldError> {
        let max_offset = 4 - width;
        if offset > max_offset {
            return Err(FieldError::InvalidOffset {
                slot: field.offset(),
                offset,
                width,
            });
        }
        let current = self.try_get(field)?;
        let shift = offset as u32 * 8;
        let mask = (u32::MAX >> (32 - width as u32 * 8)) << shift;
        let updated = (current & !mask) | ((value << shift) & mask);
        self.try_set(field, updated)
    }

    /// Writes one byte of a slot; `offset` is 0..=3.
    pub fn try_set_byte(&mut self, field: Field<u32>, offset: u8, value: u8) -> Result<bool, FieldError> {
        self.write_bits(field, offset, 1, value as u32)
    }

    pub fn set_byte(&mut self, field: Field<u32>, offset: u8, value: u8) -> bool {
        let result = self.try_set_byte(field, offset, value);
        self.report(result)
    }

    /// Writes two bytes of a slot starting at byte `offset`; `offset` is 0..=2.
    pub fn try_set_u16(&mut self, field: Field<u32>, offset: u8, value: u16) -> Result<bool, FieldError> {
        self.write_bits(field, offset, 2, value as u32)
    }

    pub fn set_u16(&mut self, field: Field<u32>, offset: u8, value: u16) -> bool {
        let result = self.try_set_u16(field, offset, value);
        self.report(result)
    }

    pub fn get_byte(&self, field: Field<u32>, offset: u8) -> u8 {
        if offset > 3 {
            return 0;
        }
        (self.get(field) >> (offset as u32 * 8)) as u8
    }

    pub fn get_u16(&self, field: Field<u32>, offset: u8) -> u16 {
        if offset > 2 {
            return 0;
        }
        (self.get(field) >> (offset as u32 * 8)) as u16
    }

    pub fn has_flag(&self, field: Field<u32>, flag: u32) -> bool {
        self.get(field) & flag != 0
    }

    pub fn add_flag(&mut self, field: Field<u32>, flag: u32) -> bool {
        let value = self.get(field) | flag;
        self.set(field, value)
    }

    pub fn remove_flag(&mut self, field: Field<u32>, flag: u32) -> bool {
        let value = self.get(field) & !flag;
        self.set(field, value)
    }

    pub fn toggle_flag(&mut self, field: Field<u32>, flag: u32) -> bool {
        let value = self.get(field) ^ flag;
        self.set(field, value)
    }

    pub fn apply_flag(&mut self, field: Field<u32>, flag: u32, apply: bool) -> bool {
        if apply {
            self.add_flag(field, flag)
        } else {
            self.remove_flag(field, flag)
        }
    }

    pub fn has_flag64(&self, field: Field<u64>, flag: u64) -> bool {
        self.get(field) & flag != 0
    }

    pub fn add_flag64(&mut self, field: Field<u64>, flag: u64) -> bool {
        let value = self.get(field) | flag;
        self.set(field, value)
    }

    pub fn remove_flag64(&mut self, field: Field<u64>, flag: u64) -> bool {
        let value = self.get(field) & !flag;
        self.set(field, value)
    }

    pub fn apply_flag64(&mut self, field: Field<u64>, flag: u64, apply: bool) -> bool {
        if apply {
            self.add_flag64(field, flag)
        } else {
            self.remove_flag64(field, flag)
        }
    }

    pub fn has_byte_flag(&self, field: Field<u32>, offset: u8, flag: u8) -> bool {
        self.get_byte(field, offset) & flag != 0
    }

    pub fn set_byte_flag(&mut self, field: Field<u32>, offset: u8, flag: u8) -> bool {
        let value = self.get_byte(field, offset) | flag;
        self.set_byte(field, offset, value)
    }

    pub fn remove_byte_flag(&mut self, field: Field<u32>, offset: u8, flag: u8) -> bool {
        let value = self.get_byte(field, offset) & !flag;
        self.set_byte(field, offset, value)
    }

    /// Marks a field dirty without touching its value.
    pub fn force_update<T: FieldValue>(&mut self, field: Field<T>) {
        match self.check_range(field.offset(), T::SLOTS) {
            Ok(range) => {
                for slot in range {
                    self.changed.set(slot);
                }
                self.pending_update = true;
            }
            Err(err) => {
                error!(layout = self.layout.name, %err, "❌ Cannot force update of field");
            }
        }
    }

    /// Subscribes a field to every values block built for this entity,
    /// whether it changed or not.
    pub fn subscribe_notify<T: FieldValue>(&mut self, field: Field<T>) {
        if let Ok(range) = self.check_range(field.offset(), T::SLOTS) {
            for slot in range {
                self.notify.set(slot);
            }
        }
    }

    pub fn unsubscribe_notify<T: FieldValue>(&mut self, field: Field<T>) {
        if let Ok(range) = self.check_range(field.offset(), T::SLOTS) {
            for slot in range {
                self.notify.unset(slot);
            }
        }
    }

    pub fn is_dirty<T: FieldValue>(&self, field: Field<T>) -> bool {
        self.check_range(field.offset(), T::SLOTS)
            .map(|mut range| range.any(|slot| self.changed.get(slot)))
            .unwrap_or(false)
    }

    pub fn is_slot_dirty(&self, slot: u16) -> bool {
        self.changed.get(slot as usize)
    }

    /// Slots written since the last flush.
    pub fn changed_mask(&self) -> &UpdateMask {
        &self.changed
    }

    /// Slots included in a values block: changed slots plus notify subscriptions.
    pub fn update_mask(&self) -> UpdateMask {
        let mut mask = self.changed.clone();
        mask.union_with(&self.notify);
        mask
    }

    /// True when a scalar or dynamic field changed since the last flush.
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || self.dynamic.has_changes()
    }

    /// Whether the entity must be scheduled into its map's update queue.
    pub fn has_pending_update(&self) -> bool {
        self.pending_update
    }

    pub fn dynamic(&self) -> &DynamicFieldStore {
        &self.dynamic
    }

    pub fn dynamic_values(&self, field: DynamicField) -> &[u32] {
        self.dynamic.values(field).unwrap_or(&[])
    }

    pub fn dynamic_change(&self, field: DynamicField) -> DynamicChange {
        self.dynamic.change(field)
    }

    fn report_dynamic<R: Default>(&mut self, result: Result<R, FieldError>) -> R {
        match result {
            Ok(value) => {
                if self.dynamic.has_changes() {
                    self.pending_update = true;
                }
                value
            }
            Err(err) => {
                error!(layout = self.layout.name, %err, "❌ Rejected dynamic field write");
                R::default()
            }
        }
    }

    pub fn append_dynamic(&mut self, field: DynamicField, value: u32) {
        let result = self.dynamic.append(field, value);
        self.report_dynamic(result)
    }

    pub fn set_dynamic(&mut self, field: DynamicField, index: usize, value: u32) -> bool {
        let result = self.dynamic.set(field, index, value);
        self.report_dynamic(result)
    }

    pub fn remove_dynamic_value(&mut self, field: DynamicField, value: u32) -> bool {
        let result = self.dynamic.remove_value(field, value);
        self.report_dynamic(result)
    }

    pub fn clear_dynamic(&mut self, field: DynamicField) -> bool {
        let result = self.dynamic.clear(field);
        self.report_dynamic(result)
    }

    pub fn append_dynamic_record<R: DynamicRecord>(&mut self, field: DynamicField, record: &R) {
        let result = self.dynamic.append_record(field, record);
        self.report_dynamic(result)
    }

    pub fn set_dynamic_record<R: DynamicRecord>(&mut self, field: DynamicField, index: usize, record: &R) -> bool {
        let result = self.dynamic.set_record(field, index, record);
        self.report_dynamic(result)
    }

    pub fn dynamic_record<R: DynamicRecord>(&self, field: DynamicField, index: usize) -> Option<R> {
        self.dynamic.record(field, index)
    }

    pub fn dynamic_records<R: DynamicRecord>(&self, field: DynamicField) -> Vec<R> {
        self.dynamic.records(field)
    }

    /// Resets every dirty bit and change tag after a flush.
    pub fn clear_dirty(&mut self) {
        self.flushed.copy_from_slice(&self.values);
        self.changed.clear();
        self.dynamic.clear_dirty();
        self.pending_update = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::layout::{self, object, player, unit};
    use crate::types::{HighGuid, ObjectGuid};

    fn unit_store() -> FieldStore {
        FieldStore::new(&layout::UNIT_LAYOUT)
    }

    #[test]
    fn writing_the_stored_value_leaves_slot_clean() {
        let mut store = unit_store();
        store.set(unit::HEALTH, 100);
        store.clear_dirty();

        assert!(!store.set(unit::HEALTH, 100));
        assert!(!store.is_dirty(unit::HEALTH));
        assert!(!store.has_pending_update());

        assert!(store.set(unit::HEALTH, 150));
        assert!(store.is_dirty(unit::HEALTH));
        assert_eq!(store.get(unit::HEALTH), 150);
        assert!(store.has_pending_update());
    }

    #[test]
    fn dirty_bit_tracks_difference_from_last_flush() {
        let mut store = unit_store();
        let writes = [5u32, 5, 7, 0, 9, 9, 5, 9, 5];
        let mut flushed = 0u32;
        for (step, value) in writes.into_iter().enumerate() {
            store.set(unit::LEVEL, value);
            assert_eq!(store.is_dirty(unit::LEVEL), value != flushed, "step {step}");
            if step % 3 == 2 {
                flushed = value;
                store.clear_dirty();
                assert!(!store.is_dirty(unit::LEVEL));
            }
        }
    }

    #[test]
    fn guid_fields_span_two_slots() {
        let mut store = unit_store();
        let target = ObjectGuid::create(HighGuid::Creature, 1234, 9);
        store.set(unit::TARGET, target);

        assert_eq!(store.get(unit::TARGET), target);
        let dirty: Vec<_> = store.changed_mask().iter_set().collect();
        assert_eq!(dirty, vec![15, 16]);
    }

    #[test]
    fn byte_writes_stay_inside_their_slot() {
        let mut store = unit_store();
        assert!(store.set_byte(unit::BYTES_1, 3, 0xAB));
        assert!(store.set_u16(unit::BYTES_1, 1, 0x1234));
        assert_eq!(store.get(unit::BYTES_1), 0xAB12_3400);
        assert_eq!(store.get_byte(unit::BYTES_1, 3), 0xAB);
        assert_eq!(store.get_u16(unit::BYTES_1, 1), 0x1234);
    }

    #[test]
    fn invalid_offsets_are_rejected_without_side_effects() {
        let mut store = unit_store();
        assert_eq!(
            store.try_set_byte(unit::BYTES_1, 4, 1),
            Err(FieldError::InvalidOffset { slot: 33, offset: 4, width: 1 })
        );
        assert!(store.try_set_u16(unit::BYTES_1, 3, 1).is_err());
        assert!(!store.set_u16(unit::BYTES_1, 3, 1));
        assert_eq!(store.get(unit::BYTES_1), 0);
        assert!(!store.has_changes());
    }

    #[test]
    fn out_of_layout_write_is_dropped() {
        let mut store = FieldStore::new(&layout::GAME_OBJECT_LAYOUT);
        assert!(!store.set(unit::HEALTH, 10));
        assert!(matches!(
            store.try_set(unit::HEALTH, 10),
            Err(FieldError::SlotOutOfRange { slot: 18, .. })
        ));
        assert_eq!(store.get(unit::HEALTH), 0);
        assert!(!store.has_pending_update());
    }

    #[test]
    fn flag_helpers_detect_changes() {
        let mut store = FieldStore::new(&layout::PLAYER_LAYOUT);
        assert!(store.add_flag(player::FLAGS, player::FLAG_AFK));
        assert!(!store.add_flag(player::FLAGS, player::FLAG_AFK));
        assert!(store.toggle_flag(player::FLAGS, player::FLAG_GHOST));
        assert!(store.has_flag(player::FLAGS, player::FLAG_GHOST));
        assert!(store.apply_flag(player::FLAGS, player::FLAG_AFK, false));
        assert_eq!(store.get(player::FLAGS), player::FLAG_GHOST);

        assert!(store.add_flag64(player::KNOWN_TITLES, 1 << 40));
        assert!(store.has_flag64(player::KNOWN_TITLES, 1 << 40));
        assert!(store.set_byte_flag(unit::BYTES_2, 1, 0x08));
        assert!(store.has_byte_flag(unit::BYTES_2, 1, 0x08));
        assert!(store.remove_byte_flag(unit::BYTES_2, 1, 0x08));
    }

    #[test]
    fn force_update_and_notify_fields() {
        let mut store = unit_store();
        store.force_update(object::SCALE_X);
        assert!(store.is_dirty(object::SCALE_X));
        store.clear_dirty();

        store.subscribe_notify(unit::HEALTH);
        assert!(!store.has_changes());
        assert!(store.update_mask().get(unit::HEALTH.offset() as usize));
        store.unsubscribe_notify(unit::HEALTH);
        assert!(store.update_mask().is_empty());
    }

    #[test]
    fn dynamic_writes_schedule_an_update() {
        let mut store = FieldStore::new(&layout::PLAYER_LAYOUT);
        store.append_dynamic(player::DYNAMIC_DAILY_QUESTS, 3001);
        assert!(store.has_pending_update());
        assert_eq!(store.dynamic_values(player::DYNAMIC_DAILY_QUESTS), &[3001]);

        store.clear_dirty();
        assert!(!store.clear_dynamic(player::DYNAMIC_RESEARCH_SITES));
        assert!(!store.has_changes());
        assert!(store.clear_dynamic(player::DYNAMIC_DAILY_QUESTS));
        assert_eq!(store.dynamic_change(player::DYNAMIC_DAILY_QUESTS), DynamicChange::ValueAndSizeChanged);
    }
}
