//! Stealth, invisibility and server-side visibility tables.

pub const STEALTH_GENERAL: usize = 0;
pub const STEALTH_TRAP: usize = 1;
pub const STEALTH_TYPE_COUNT: usize = 2;

pub const INVISIBILITY_GENERAL: usize = 0;
pub const INVISIBILITY_TRAP: usize = 3;
pub const INVISIBILITY_DRUNK: usize = 6;
pub const INVISIBILITY_TYPE_COUNT: usize = 16;

/// Server-side visibility types.
pub const SERVER_SIDE_GM: usize = 0;
pub const SERVER_SIDE_GHOST: usize = 1;
pub const SERVER_SIDE_TYPE_COUNT: usize = 2;

// Bits of the SERVER_SIDE_GHOST value.
pub const GHOST_VISIBILITY_ALIVE: i32 = 0x1;
pub const GHOST_VISIBILITY_GHOST: i32 = 0x2;

/// A flag mask over `N` concealment types plus one magnitude per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlaggedValues<const N: usize> {
    flags: u32,
    values: [i32; N],
}

impl<const N: usize> Default for FlaggedValues<N> {
    fn default() -> Self {
        Self { flags: 0, values: [0; N] }
    }
}

impl<const N: usize> FlaggedValues<N> {
    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn has_flag(&self, kind: usize) -> bool {
        kind < N && self.flags & (1 << kind) != 0
    }

    pub fn add_flag(&mut self, kind: usize) {
        if kind < N {
            self.flags |= 1 << kind;
        }
    }

    pub fn remove_flag(&mut self, kind: usize) {
        if kind < N {
            self.flags &= !(1 << kind);
        }
    }

    pub fn value(&self, kind: usize) -> i32 {
        self.values.get(kind).copied().unwrap_or(0)
    }

    pub fn set_value(&mut self, kind: usize, value: i32) {
        if let Some(slot) = self.values.get_mut(kind) {
            *slot = value;
        }
    }

    pub fn add_value(&mut self, kind: usize, delta: i32) {
        if let Some(slot) = self.values.get_mut(kind) {
            *slot += delta;
        }
    }

    /// Sets both the flag and the magnitude of `kind`.
    pub fn apply(&mut self, kind: usize, value: i32) {
        self.add_flag(kind);
        self.set_value(kind, value);
    }

    /// Types present in the mask, in ascending order.
    pub fn active_types(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N).filter(move |kind| self.has_flag(*kind))
    }
}

/// Everything an entity hides behind and everything it can see through.
#[derive(Debug, Clone, PartialEq)]
pub struct Concealment {
    pub stealth: FlaggedValues<STEALTH_TYPE_COUNT>,
    pub stealth_detect: FlaggedValues<STEALTH_TYPE_COUNT>,
    pub invisibility: FlaggedValues<INVISIBILITY_TYPE_COUNT>,
    pub invisibility_detect: FlaggedValues<INVISIBILITY_TYPE_COUNT>,
    pub server_side: FlaggedValues<SERVER_SIDE_TYPE_COUNT>,
    pub server_side_detect: FlaggedValues<SERVER_SIDE_TYPE_COUNT>,
}

impl Default for Concealment {
    /// Non-player objects are seen by the living and the dead, and see the living.
    fn default() -> Self {
        let mut concealment = Self {
            stealth: FlaggedValues::default(),
            stealth_detect: FlaggedValues::default(),
            invisibility: FlaggedValues::default(),
            invisibility_detect: FlaggedValues::default(),
            server_side: FlaggedValues::default(),
            server_side_detect: FlaggedValues::default(),
        };
        concealment
            .server_side
            .set_value(SERVER_SIDE_GHOST, GHOST_VISIBILITY_ALIVE | GHOST_VISIBILITY_GHOST);
        concealment
            .server_side_detect
            .set_value(SERVER_SIDE_GHOST, GHOST_VISIBILITY_ALIVE);
        concealment
    }
}

impl Concealment {
    /// Living players are only visible to the living.
    pub fn living_player() -> Self {
        let mut concealment = Self::default();
        concealment.server_side.set_value(SERVER_SIDE_GHOST, GHOST_VISIBILITY_ALIVE);
        concealment
    }

    /// Switches between the living and the ghost world.
    pub fn set_ghost(&mut self, ghost: bool) {
        let value = if ghost { GHOST_VISIBILITY_GHOST } else { GHOST_VISIBILITY_ALIVE };
        self.server_side.set_value(SERVER_SIDE_GHOST, value);
        self.server_side_detect.set_value(SERVER_SIDE_GHOST, value);
    }

    /// GM level required to see this object; 0 means visible to everyone.
    pub fn set_gm_visibility(&mut self, level: i32) {
        self.server_side.set_value(SERVER_SIDE_GM, level);
    }

    /// GM level this object sees through.
    pub fn set_gm_detect(&mut self, level: i32) {
        self.server_side_detect.set_value(SERVER_SIDE_GM, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_values_are_independent() {
        let mut stealth = FlaggedValues::<STEALTH_TYPE_COUNT>::default();
        stealth.set_value(STEALTH_GENERAL, 10);
        assert!(!stealth.has_flag(STEALTH_GENERAL));

        stealth.add_flag(STEALTH_GENERAL);
        stealth.add_value(STEALTH_GENERAL, 5);
        assert_eq!(stealth.value(STEALTH_GENERAL), 15);
        assert_eq!(stealth.active_types().collect::<Vec<_>>(), vec![STEALTH_GENERAL]);

        stealth.add_flag(STEALTH_TYPE_COUNT + 3);
        assert_eq!(stealth.flags(), 1);
    }

    #[test]
    fn ghosts_only_see_ghosts() {
        let mut concealment = Concealment::living_player();
        concealment.set_ghost(true);
        assert_eq!(concealment.server_side.value(SERVER_SIDE_GHOST), GHOST_VISIBILITY_GHOST);
        assert_eq!(concealment.server_side_detect.value(SERVER_SIDE_GHOST), GHOST_VISIBILITY_GHOST);
    }
}
