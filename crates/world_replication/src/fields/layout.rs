//! Field tables for every entity category.
//!
//! Offsets are absolute slot indices. Derived categories continue where their
//! base ends (`object::END`, `unit::END`), so a player store holds object,
//! unit and player fields in one array.

use super::{DynamicField, DynamicFieldDescriptor, Field, FieldDescriptor, FieldFlags, FieldLayout};
use crate::types::ObjectGuid;

const PUBLIC: FieldFlags = FieldFlags::PUBLIC;
const PRIVATE: FieldFlags = FieldFlags::PRIVATE;
const OWNER: FieldFlags = FieldFlags::OWNER;
const PRIVATE_OWNER: FieldFlags = FieldFlags::PRIVATE.union(FieldFlags::OWNER);
const PRIVATE_OWNER_SPECIAL: FieldFlags = PRIVATE_OWNER.union(FieldFlags::SPECIAL_INFO);
const PARTY: FieldFlags = FieldFlags::PARTY_MEMBER;
const UNIT_ALL: FieldFlags = FieldFlags::UNIT_ALL;
const DYNAMIC: FieldFlags = FieldFlags::DYNAMIC;

pub mod object {
    use super::*;

    pub const GUID: Field<ObjectGuid> = Field::new(0);
    /// Bit mask of the categories the entity belongs to.
    pub const TYPE: Field<u32> = Field::new(2);
    pub const ENTRY: Field<u32> = Field::new(3);
    pub const SCALE_X: Field<f32> = Field::new(4);
    pub const END: u16 = 5;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("OBJECT_FIELD_GUID", GUID, PUBLIC),
        FieldDescriptor::of("OBJECT_FIELD_TYPE", TYPE, PUBLIC),
        FieldDescriptor::of("OBJECT_FIELD_ENTRY", ENTRY, PUBLIC),
        FieldDescriptor::of("OBJECT_FIELD_SCALE_X", SCALE_X, PUBLIC),
    ];
}

pub mod unit {
    use super::*;

    pub const CHARM: Field<ObjectGuid> = Field::new(5);
    pub const SUMMON: Field<ObjectGuid> = Field::new(7);
    pub const CHARMED_BY: Field<ObjectGuid> = Field::new(9);
    pub const SUMMONED_BY: Field<ObjectGuid> = Field::new(11);
    pub const CREATED_BY: Field<ObjectGuid> = Field::new(13);
    pub const TARGET: Field<ObjectGuid> = Field::new(15);
    /// race, class, gender, power type
    pub const BYTES_0: Field<u32> = Field::new(17);
    pub const HEALTH: Field<u32> = Field::new(18);
    pub const POWER: Field<u32> = Field::new(19);
    pub const MAX_HEALTH: Field<u32> = Field::new(20);
    pub const MAX_POWER: Field<u32> = Field::new(21);
    pub const POWER_REGEN: Field<f32> = Field::new(22);
    pub const LEVEL: Field<u32> = Field::new(23);
    pub const FACTION_TEMPLATE: Field<u32> = Field::new(24);
    pub const FLAGS: Field<u32> = Field::new(25);
    pub const FLAGS_2: Field<u32> = Field::new(26);
    pub const AURA_STATE: Field<u32> = Field::new(27);
    pub const BOUNDING_RADIUS: Field<f32> = Field::new(28);
    pub const COMBAT_REACH: Field<f32> = Field::new(29);
    pub const DISPLAY_ID: Field<u32> = Field::new(30);
    pub const NATIVE_DISPLAY_ID: Field<u32> = Field::new(31);
    pub const MOUNT_DISPLAY_ID: Field<u32> = Field::new(32);
    /// stand state, pet talents, vis flags, anim tier
    pub const BYTES_1: Field<u32> = Field::new(33);
    pub const PET_NUMBER: Field<u32> = Field::new(34);
    pub const PET_NAME_TIMESTAMP: Field<u32> = Field::new(35);
    pub const PET_EXPERIENCE: Field<u32> = Field::new(36);
    pub const PET_NEXT_LEVEL_EXP: Field<u32> = Field::new(37);
    pub const DYNAMIC_FLAGS: Field<u32> = Field::new(38);
    pub const NPC_FLAGS: Field<u32> = Field::new(39);
    pub const STAT0: Field<u32> = Field::new(40);
    pub const STAT_COUNT: u16 = 5;
    pub const RESISTANCES: Field<u32> = Field::new(45);
    pub const BASE_MANA: Field<u32> = Field::new(46);
    /// sheath state, pvp flags, pet flags, shapeshift form
    pub const BYTES_2: Field<u32> = Field::new(47);
    pub const ATTACK_POWER: Field<u32> = Field::new(48);
    pub const HOVER_HEIGHT: Field<f32> = Field::new(49);
    pub const END: u16 = 50;

    pub const DYNAMIC_PASSIVE_SPELLS: DynamicField = DynamicField(0);
    pub const DYNAMIC_WORLD_EFFECTS: DynamicField = DynamicField(1);

    // UNIT_DYNAMIC_FLAGS bits
    pub const DYNFLAG_LOOTABLE: u32 = 0x0001;
    pub const DYNFLAG_TRACK_UNIT: u32 = 0x0002;
    pub const DYNFLAG_TAPPED: u32 = 0x0004;
    pub const DYNFLAG_TAPPED_BY_PLAYER: u32 = 0x0008;
    pub const DYNFLAG_SPECIAL_INFO: u32 = 0x0010;
    pub const DYNFLAG_DEAD: u32 = 0x0020;

    // UNIT_FIELD_FLAGS bits
    pub const FLAG_POSSESSED: u32 = 0x0100_0000;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("UNIT_FIELD_CHARM", CHARM, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_SUMMON", SUMMON, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_CHARMEDBY", CHARMED_BY, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_SUMMONEDBY", SUMMONED_BY, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_CREATEDBY", CREATED_BY, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_TARGET", TARGET, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_BYTES_0", BYTES_0, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_HEALTH", HEALTH, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_POWER", POWER, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_MAXHEALTH", MAX_HEALTH, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_MAXPOWER", MAX_POWER, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_POWER_REGEN", POWER_REGEN, PRIVATE_OWNER),
        FieldDescriptor::of("UNIT_FIELD_LEVEL", LEVEL, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_FACTIONTEMPLATE", FACTION_TEMPLATE, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_FLAGS", FLAGS, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_FLAGS_2", FLAGS_2, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_AURASTATE", AURA_STATE, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_BOUNDINGRADIUS", BOUNDING_RADIUS, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_COMBATREACH", COMBAT_REACH, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_DISPLAYID", DISPLAY_ID, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_NATIVEDISPLAYID", NATIVE_DISPLAY_ID, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_MOUNTDISPLAYID", MOUNT_DISPLAY_ID, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_BYTES_1", BYTES_1, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_PETNUMBER", PET_NUMBER, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_PET_NAME_TIMESTAMP", PET_NAME_TIMESTAMP, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_PETEXPERIENCE", PET_EXPERIENCE, OWNER),
        FieldDescriptor::of("UNIT_FIELD_PETNEXTLEVELEXP", PET_NEXT_LEVEL_EXP, OWNER),
        FieldDescriptor::of("UNIT_DYNAMIC_FLAGS", DYNAMIC_FLAGS, UNIT_ALL.union(DYNAMIC)),
        FieldDescriptor::of("UNIT_NPC_FLAGS", NPC_FLAGS, PUBLIC),
        FieldDescriptor::array("UNIT_FIELD_STAT", STAT0, STAT_COUNT, PRIVATE_OWNER),
        FieldDescriptor::of("UNIT_FIELD_RESISTANCES", RESISTANCES, PRIVATE_OWNER_SPECIAL),
        FieldDescriptor::of("UNIT_FIELD_BASE_MANA", BASE_MANA, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_BYTES_2", BYTES_2, PUBLIC),
        FieldDescriptor::of("UNIT_FIELD_ATTACK_POWER", ATTACK_POWER, PRIVATE_OWNER),
        FieldDescriptor::of("UNIT_FIELD_HOVERHEIGHT", HOVER_HEIGHT, PUBLIC),
    ];

    pub(super) const DYNAMIC_FIELDS: &[DynamicFieldDescriptor] = &[
        DynamicFieldDescriptor { name: "UNIT_DYNAMIC_FIELD_PASSIVE_SPELLS", field: DYNAMIC_PASSIVE_SPELLS, flags: PRIVATE_OWNER },
        DynamicFieldDescriptor { name: "UNIT_DYNAMIC_FIELD_WORLD_EFFECTS", field: DYNAMIC_WORLD_EFFECTS, flags: PUBLIC },
    ];
}

pub mod player {
    use super::*;

    pub const DUEL_ARBITER: Field<ObjectGuid> = Field::new(50);
    pub const FLAGS: Field<u32> = Field::new(52);
    pub const GUILD_ID: Field<u32> = Field::new(53);
    pub const GUILD_RANK: Field<u32> = Field::new(54);
    pub const BYTES: Field<u32> = Field::new(55);
    pub const BYTES_2: Field<u32> = Field::new(56);
    pub const BYTES_3: Field<u32> = Field::new(57);
    pub const DUEL_TEAM: Field<u32> = Field::new(58);
    pub const QUEST_LOG_1_ID: Field<u32> = Field::new(59);
    pub const QUEST_LOG_1_STATE: Field<u32> = Field::new(60);
    pub const VISIBLE_ITEM_1_ENTRY: Field<u32> = Field::new(61);
    pub const CHOSEN_TITLE: Field<u32> = Field::new(62);
    pub const FAKE_INEBRIATION: Field<i32> = Field::new(63);
    pub const FARSIGHT: Field<ObjectGuid> = Field::new(64);
    pub const XP: Field<u32> = Field::new(66);
    pub const NEXT_LEVEL_XP: Field<u32> = Field::new(67);
    pub const COINAGE: Field<u32> = Field::new(68);
    pub const KNOWN_TITLES: Field<u64> = Field::new(69);
    pub const FIELD_BYTES: Field<u32> = Field::new(71);
    pub const END: u16 = 72;

    pub const DYNAMIC_RESEARCH_SITES: DynamicField = DynamicField(2);
    pub const DYNAMIC_DAILY_QUESTS: DynamicField = DynamicField(3);

    // PLAYER_FLAGS bits
    pub const FLAG_GROUP_LEADER: u32 = 0x0001;
    pub const FLAG_AFK: u32 = 0x0002;
    pub const FLAG_GHOST: u32 = 0x0010;
    pub const FLAG_GM: u32 = 0x0008;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("PLAYER_DUEL_ARBITER", DUEL_ARBITER, PUBLIC),
        FieldDescriptor::of("PLAYER_FLAGS", FLAGS, PUBLIC),
        FieldDescriptor::of("PLAYER_GUILDID", GUILD_ID, PUBLIC),
        FieldDescriptor::of("PLAYER_GUILDRANK", GUILD_RANK, PUBLIC),
        FieldDescriptor::of("PLAYER_BYTES", BYTES, PUBLIC),
        FieldDescriptor::of("PLAYER_BYTES_2", BYTES_2, PUBLIC),
        FieldDescriptor::of("PLAYER_BYTES_3", BYTES_3, PUBLIC),
        FieldDescriptor::of("PLAYER_DUEL_TEAM", DUEL_TEAM, PUBLIC),
        FieldDescriptor::of("PLAYER_QUEST_LOG_1_1", QUEST_LOG_1_ID, PARTY),
        FieldDescriptor::of("PLAYER_QUEST_LOG_1_2", QUEST_LOG_1_STATE, PRIVATE),
        FieldDescriptor::of("PLAYER_VISIBLE_ITEM_1_ENTRYID", VISIBLE_ITEM_1_ENTRY, PUBLIC),
        FieldDescriptor::of("PLAYER_CHOSEN_TITLE", CHOSEN_TITLE, PUBLIC),
        FieldDescriptor::of("PLAYER_FAKE_INEBRIATION", FAKE_INEBRIATION, PUBLIC),
        FieldDescriptor::of("PLAYER_FARSIGHT", FARSIGHT, PRIVATE),
        FieldDescriptor::of("PLAYER_XP", XP, PRIVATE),
        FieldDescriptor::of("PLAYER_NEXT_LEVEL_XP", NEXT_LEVEL_XP, PRIVATE),
        FieldDescriptor::of("PLAYER_FIELD_COINAGE", COINAGE, PRIVATE),
        FieldDescriptor::of("PLAYER_FIELD_KNOWN_TITLES", KNOWN_TITLES, PRIVATE),
        FieldDescriptor::of("PLAYER_FIELD_BYTES", FIELD_BYTES, PRIVATE),
    ];

    pub(super) const DYNAMIC_FIELDS: &[DynamicFieldDescriptor] = &[
        DynamicFieldDescriptor { name: "UNIT_DYNAMIC_FIELD_PASSIVE_SPELLS", field: unit::DYNAMIC_PASSIVE_SPELLS, flags: PRIVATE_OWNER },
        DynamicFieldDescriptor { name: "UNIT_DYNAMIC_FIELD_WORLD_EFFECTS", field: unit::DYNAMIC_WORLD_EFFECTS, flags: PUBLIC },
        DynamicFieldDescriptor { name: "PLAYER_DYNAMIC_FIELD_RESEARCH_SITES", field: DYNAMIC_RESEARCH_SITES, flags: PRIVATE },
        DynamicFieldDescriptor { name: "PLAYER_DYNAMIC_FIELD_DAILY_QUESTS", field: DYNAMIC_DAILY_QUESTS, flags: PRIVATE },
    ];
}

pub mod game_object {
    use super::*;

    pub const CREATED_BY: Field<ObjectGuid> = Field::new(5);
    pub const DISPLAY_ID: Field<u32> = Field::new(7);
    pub const FLAGS: Field<u32> = Field::new(8);
    pub const PARENT_ROTATION_X: Field<f32> = Field::new(9);
    pub const PARENT_ROTATION_Y: Field<f32> = Field::new(10);
    pub const PARENT_ROTATION_Z: Field<f32> = Field::new(11);
    pub const PARENT_ROTATION_W: Field<f32> = Field::new(12);
    pub const DYNAMIC: Field<u32> = Field::new(13);
    pub const FACTION: Field<u32> = Field::new(14);
    pub const LEVEL: Field<u32> = Field::new(15);
    /// state, type, art kit, anim progress
    pub const BYTES_1: Field<u32> = Field::new(16);
    pub const END: u16 = 17;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("GAMEOBJECT_FIELD_CREATED_BY", CREATED_BY, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_DISPLAYID", DISPLAY_ID, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_FLAGS", FLAGS, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_PARENTROTATION_X", PARENT_ROTATION_X, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_PARENTROTATION_Y", PARENT_ROTATION_Y, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_PARENTROTATION_Z", PARENT_ROTATION_Z, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_PARENTROTATION_W", PARENT_ROTATION_W, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_DYNAMIC", DYNAMIC, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_FACTION", FACTION, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_LEVEL", LEVEL, PUBLIC),
        FieldDescriptor::of("GAMEOBJECT_BYTES_1", BYTES_1, PUBLIC),
    ];
}

pub mod dynamic_object {
    use super::*;

    pub const CASTER: Field<ObjectGuid> = Field::new(5);
    /// visual type, spell visual
    pub const BYTES: Field<u32> = Field::new(7);
    pub const SPELL_ID: Field<u32> = Field::new(8);
    pub const RADIUS: Field<f32> = Field::new(9);
    pub const CAST_TIME: Field<u32> = Field::new(10);
    pub const END: u16 = 11;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("DYNAMICOBJECT_CASTER", CASTER, PUBLIC),
        FieldDescriptor::of("DYNAMICOBJECT_BYTES", BYTES, PUBLIC),
        FieldDescriptor::of("DYNAMICOBJECT_SPELLID", SPELL_ID, PUBLIC),
        FieldDescriptor::of("DYNAMICOBJECT_RADIUS", RADIUS, PUBLIC),
        FieldDescriptor::of("DYNAMICOBJECT_CASTTIME", CAST_TIME, PUBLIC),
    ];
}

pub mod corpse {
    use super::*;

    pub const OWNER: Field<ObjectGuid> = Field::new(5);
    pub const PARTY: Field<ObjectGuid> = Field::new(7);
    pub const DISPLAY_ID: Field<u32> = Field::new(9);
    pub const ITEM: Field<u32> = Field::new(10);
    pub const ITEM_COUNT: u16 = 19;
    pub const BYTES_1: Field<u32> = Field::new(29);
    pub const BYTES_2: Field<u32> = Field::new(30);
    pub const GUILD: Field<u32> = Field::new(31);
    pub const FLAGS: Field<u32> = Field::new(32);
    pub const DYNAMIC_FLAGS: Field<u32> = Field::new(33);
    pub const END: u16 = 34;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("CORPSE_FIELD_OWNER", OWNER, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_PARTY", PARTY, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_DISPLAY_ID", DISPLAY_ID, PUBLIC),
        FieldDescriptor::array("CORPSE_FIELD_ITEM", ITEM, ITEM_COUNT, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_BYTES_1", BYTES_1, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_BYTES_2", BYTES_2, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_GUILD", GUILD, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_FLAGS", FLAGS, PUBLIC),
        FieldDescriptor::of("CORPSE_FIELD_DYNAMIC_FLAGS", DYNAMIC_FLAGS, PUBLIC),
    ];
}

pub mod area_trigger {
    use super::*;

    pub const CASTER: Field<ObjectGuid> = Field::new(5);
    pub const DURATION: Field<u32> = Field::new(7);
    pub const SPELL_ID: Field<u32> = Field::new(8);
    pub const SPELL_VISUAL_ID: Field<u32> = Field::new(9);
    pub const EXPLICIT_SCALE: Field<f32> = Field::new(10);
    pub const END: u16 = 11;

    pub(super) const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::of("AREATRIGGER_CASTER", CASTER, PUBLIC),
        FieldDescriptor::of("AREATRIGGER_DURATION", DURATION, PUBLIC),
        FieldDescriptor::of("AREATRIGGER_SPELLID", SPELL_ID, PUBLIC),
        FieldDescriptor::of("AREATRIGGER_SPELLVISUALID", SPELL_VISUAL_ID, PUBLIC),
        FieldDescriptor::of("AREATRIGGER_EXPLICIT_SCALE", EXPLICIT_SCALE, PUBLIC),
    ];
}

pub mod conversation {
    use super::*;

    pub const LAST_LINE_END_TIME: Field<u32> = Field::new(5);
    pub const END: u16 = 6;

    pub const DYNAMIC_ACTORS: DynamicField = DynamicField(0);
    pub const DYNAMIC_LINES: DynamicField = DynamicField(1);

    pub(super) const FIELDS: &[FieldDescriptor] = &[FieldDescriptor::of(
        "CONVERSATION_LAST_LINE_END_TIME",
        LAST_LINE_END_TIME,
        PUBLIC,
    )];

    pub(super) const DYNAMIC_FIELDS: &[DynamicFieldDescriptor] = &[
        DynamicFieldDescriptor { name: "CONVERSATION_DYNAMIC_FIELD_ACTORS", field: DYNAMIC_ACTORS, flags: PUBLIC },
        DynamicFieldDescriptor { name: "CONVERSATION_DYNAMIC_FIELD_LINES", field: DYNAMIC_LINES, flags: PUBLIC },
    ];
}

pub static UNIT_LAYOUT: FieldLayout = FieldLayout {
    name: "Unit",
    slot_count: unit::END,
    parts: &[object::FIELDS, unit::FIELDS],
    dynamic: unit::DYNAMIC_FIELDS,
};

pub static PLAYER_LAYOUT: FieldLayout = FieldLayout {
    name: "Player",
    slot_count: player::END,
    parts: &[object::FIELDS, unit::FIELDS, player::FIELDS],
    dynamic: player::DYNAMIC_FIELDS,
};

pub static GAME_OBJECT_LAYOUT: FieldLayout = FieldLayout {
    name: "GameObject",
    slot_count: game_object::END,
    parts: &[object::FIELDS, game_object::FIELDS],
    dynamic: &[],
};

pub static DYNAMIC_OBJECT_LAYOUT: FieldLayout = FieldLayout {
    name: "DynamicObject",
    slot_count: dynamic_object::END,
    parts: &[object::FIELDS, dynamic_object::FIELDS],
    dynamic: &[],
};

pub static CORPSE_LAYOUT: FieldLayout = FieldLayout {
    name: "Corpse",
    slot_count: corpse::END,
    parts: &[object::FIELDS, corpse::FIELDS],
    dynamic: &[],
};

pub static AREA_TRIGGER_LAYOUT: FieldLayout = FieldLayout {
    name: "AreaTrigger",
    slot_count: area_trigger::END,
    parts: &[object::FIELDS, area_trigger::FIELDS],
    dynamic: &[],
};

pub static CONVERSATION_LAYOUT: FieldLayout = FieldLayout {
    name: "Conversation",
    slot_count: conversation::END,
    parts: &[object::FIELDS, conversation::FIELDS],
    dynamic: conversation::DYNAMIC_FIELDS,
};

pub static ALL_LAYOUTS: &[&FieldLayout] = &[
    &UNIT_LAYOUT,
    &PLAYER_LAYOUT,
    &GAME_OBJECT_LAYOUT,
    &DYNAMIC_OBJECT_LAYOUT,
    &CORPSE_LAYOUT,
    &AREA_TRIGGER_LAYOUT,
    &CONVERSATION_LAYOUT,
];
