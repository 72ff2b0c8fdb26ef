//! # Update Field Storage
//!
//! Every replicated entity owns a [`FieldStore`]: a fixed array of 32-bit
//! scalar slots described by a static [`FieldLayout`], plus a set of dynamic
//! (variable-length) fields. Writes track what changed since the last flush so
//! the update builder only sends the delta.
//!
//! ## Typed access
//!
//! Fields are addressed through typed handles ([`Field<T>`]) declared in
//! [`layout`]. The handle fixes the value type and slot width at compile time,
//! so a 64-bit value or a GUID always spans exactly two slots and is always
//! read back low slot first.
//!
//! ```rust
//! use world_replication::fields::{layout, FieldStore};
//!
//! let mut store = FieldStore::new(&layout::UNIT_LAYOUT);
//! assert!(store.set(layout::unit::HEALTH, 100));
//! store.clear_dirty();
//! assert!(!store.set(layout::unit::HEALTH, 100));
//! assert!(!store.is_dirty(layout::unit::HEALTH));
//! ```

mod dynamic;
pub mod layout;
mod mask;
mod store;

pub use dynamic::{DynamicChange, DynamicFieldStore, DynamicRecord, MAX_DYNAMIC_ELEMENTS};
pub use mask::UpdateMask;
pub use store::FieldStore;

use crate::types::ObjectGuid;
use bitflags::bitflags;
use std::marker::PhantomData;

bitflags! {
    /// Which observers a field is replicated to.
    ///
    /// A field is sent to an observer when its flags intersect the flags the
    /// observer earns through its relationship with the entity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u16 {
        /// Every observer
        const PUBLIC = 0x0001;
        /// Only the entity itself
        const PRIVATE = 0x0002;
        /// The owner, summoner or caster of the entity
        const OWNER = 0x0004;
        /// Observers holding an empathy effect on the unit
        const SPECIAL_INFO = 0x0008;
        /// Members of the owning player's party or raid
        const PARTY_MEMBER = 0x0010;
        /// Every observer that is itself a unit
        const UNIT_ALL = 0x0020;
        /// Value is rewritten per observer before it is sent
        const DYNAMIC = 0x0040;
    }
}

/// A value type that can live in one or more consecutive 32-bit slots.
pub trait FieldValue: Copy + std::fmt::Debug {
    /// Number of slots the value occupies.
    const SLOTS: u16;

    fn write_slots(self, out: &mut [u32]);

    fn read_slots(slots: &[u32]) -> Self;
}

impl FieldValue for u32 {
    const SLOTS: u16 = 1;

    fn write_slots(self, out: &mut [u32]) {
        out[0] = self;
    }

    fn read_slots(slots: &[u32]) -> Self {
        slots[0]
    }
}

impl FieldValue for i32 {
    const SLOTS: u16 = 1;

    fn write_slots(self, out: &mut [u32]) {
        out[0] = self as u32;
    }

    fn read_slots(slots: &[u32]) -> Self {
        slots[0] as i32
    }
}

impl FieldValue for f32 {
    const SLOTS: u16 = 1;

    fn write_slots(self, out: &mut [u32]) {
        out[0] = self.to_bits();
    }

    fn read_slots(slots: &[u32]) -> Self {
        f32::from_bits(slots[0])
    }
}

impl FieldValue for u64 {
    const SLOTS: u16 = 2;

    fn write_slots(self, out: &mut [u32]) {
        out[0] = self as u32;
        out[1] = (self >> 32) as u32;
    }

    fn read_slots(slots: &[u32]) -> Self {
        (slots[1] as u64) << 32 | slots[0] as u64
    }
}

impl FieldValue for ObjectGuid {
    const SLOTS: u16 = 2;

    fn write_slots(self, out: &mut [u32]) {
        let [low, high] = self.to_slots();
        out[0] = low;
        out[1] = high;
    }

    fn read_slots(slots: &[u32]) -> Self {
        ObjectGuid::from_slots(slots[0], slots[1])
    }
}

/// Typed handle to a scalar field at a fixed slot offset.
pub struct Field<T> {
    offset: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    pub const fn new(offset: u16) -> Self {
        Self { offset, _marker: PhantomData }
    }

    pub const fn offset(&self) -> u16 {
        self.offset
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Field({})", self.offset)
    }
}

/// Handle to a dynamic field by its index in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicField(pub u16);

/// Static description of one scalar field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub offset: u16,
    pub width: u16,
    pub flags: FieldFlags,
}

impl FieldDescriptor {
    pub const fn of<T: FieldValue>(name: &'static str, field: Field<T>, flags: FieldFlags) -> Self {
        Self { name, offset: field.offset, width: T::SLOTS, flags }
    }

    /// A run of `count` single-slot fields starting at `field`.
    pub const fn array(name: &'static str, field: Field<u32>, count: u16, flags: FieldFlags) -> Self {
        Self { name, offset: field.offset, width: count, flags }
    }

    pub fn covers(&self, slot: u16) -> bool {
        slot >= self.offset && slot < self.offset + self.width
    }
}

/// Static description of one dynamic field.
#[derive(Debug, Clone, Copy)]
pub struct DynamicFieldDescriptor {
    pub name: &'static str,
    pub field: DynamicField,
    pub flags: FieldFlags,
}

/// Field table of one entity category.
///
/// Built from layered parts (object, then unit, then player...) so derived
/// categories share the base descriptors.
#[derive(Debug)]
pub struct FieldLayout {
    pub name: &'static str,
    pub slot_count: u16,
    pub parts: &'static [&'static [FieldDescriptor]],
    pub dynamic: &'static [DynamicFieldDescriptor],
}

impl FieldLayout {
    pub fn descriptors(&self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.parts.iter().flat_map(|part| part.iter())
    }

    pub fn descriptor_for(&self, slot: u16) -> Option<&'static FieldDescriptor> {
        self.descriptors().find(|descriptor| descriptor.covers(slot))
    }

    pub fn slot_flags(&self, slot: u16) -> FieldFlags {
        self.descriptor_for(slot)
            .map(|descriptor| descriptor.flags)
            .unwrap_or(FieldFlags::empty())
    }

    pub fn dynamic_count(&self) -> u16 {
        self.dynamic.len() as u16
    }

    pub fn dynamic_flags(&self, field: DynamicField) -> FieldFlags {
        self.dynamic
            .iter()
            .find(|descriptor| descriptor.field == field)
            .map(|descriptor| descriptor.flags)
            .unwrap_or(FieldFlags::empty())
    }

    /// Mask of slots whose flags intersect `visible`.
    pub fn visible_slots(&self, visible: FieldFlags) -> UpdateMask {
        let mut mask = UpdateMask::new(self.slot_count as usize);
        for descriptor in self.descriptors().filter(|d| d.flags.intersects(visible)) {
            for slot in descriptor.offset..descriptor.offset + descriptor.width {
                mask.set(slot as usize);
            }
        }
        mask
    }

    /// Mask of dynamic fields whose flags intersect `visible`.
    pub fn visible_dynamic(&self, visible: FieldFlags) -> UpdateMask {
        let mut mask = UpdateMask::new(self.dynamic.len());
        for descriptor in self.dynamic.iter().filter(|d| d.flags.intersects(visible)) {
            mask.set(descriptor.field.0 as usize);
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_values_split_low_slot_first() {
        let mut slots = [0u32; 2];
        0x1122_3344_5566_7788u64.write_slots(&mut slots);
        assert_eq!(slots, [0x5566_7788, 0x1122_3344]);
        assert_eq!(u64::read_slots(&slots), 0x1122_3344_5566_7788);
    }

    #[test]
    fn float_round_trips_bit_exact() {
        let mut slots = [0u32; 1];
        1.5f32.write_slots(&mut slots);
        assert_eq!(f32::read_slots(&slots), 1.5);
    }

    #[test]
    fn every_layout_has_non_overlapping_descriptors() {
        for layout in layout::ALL_LAYOUTS {
            let mut seen = vec![false; layout.slot_count as usize];
            for descriptor in layout.descriptors() {
                for slot in descriptor.offset..descriptor.offset + descriptor.width {
                    assert!(
                        (slot as usize) < seen.len(),
                        "{} overflows layout {}",
                        descriptor.name,
                        layout.name
                    );
                    assert!(!seen[slot as usize], "{} overlaps in {}", descriptor.name, layout.name);
                    seen[slot as usize] = true;
                }
            }
        }
    }
}
