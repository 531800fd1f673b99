//! For lack of a better name, a "universe" is everything the engine knows about entity classnames
//! without looking at any particular level: what kind of thing each one is and how big it is.


#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    World,
    PlayerStart,
    Weapon,
    Ammo,
    Item,
    Light,
    Trigger,
    Target,
    Other,
}

impl EntityCategory {
    pub fn name(&self) -> &'static str {
        match *self {
            EntityCategory::World => "world",
            EntityCategory::PlayerStart => "player start",
            EntityCategory::Weapon => "weapon",
            EntityCategory::Ammo => "ammo",
            EntityCategory::Item => "item",
            EntityCategory::Light => "light",
            EntityCategory::Trigger => "trigger",
            EntityCategory::Target => "target",
            EntityCategory::Other => "other",
        }
    }
}

pub struct EntityType {
    pub classname: &'static str,
    /// Half the width of the bounding box, in level units
    pub radius: u32,
    pub category: EntityCategory,
}

macro_rules! entity_type {
    ($classname:expr, $radius:expr, $category:ident) => {
        EntityType{
            classname: $classname,
            radius: $radius,
            category: EntityCategory::$category,
        }
    };
}

pub static QUAKE3_ENTITY_TYPES: [EntityType; 36] = [
    entity_type!("worldspawn", 0, World),
    entity_type!("info_player_deathmatch", 16, PlayerStart),
    entity_type!("info_player_start", 16, PlayerStart),
    entity_type!("team_CTF_redplayer", 16, PlayerStart),
    entity_type!("team_CTF_blueplayer", 16, PlayerStart),
    entity_type!("team_CTF_redspawn", 16, PlayerStart),
    entity_type!("team_CTF_bluespawn", 16, PlayerStart),
    entity_type!("info_player_intermission", 16, Target),
    entity_type!("weapon_gauntlet", 15, Weapon),
    entity_type!("weapon_machinegun", 15, Weapon),
    entity_type!("weapon_shotgun", 15, Weapon),
    entity_type!("weapon_grenadelauncher", 15, Weapon),
    entity_type!("weapon_rocketlauncher", 15, Weapon),
    entity_type!("weapon_lightning", 15, Weapon),
    entity_type!("weapon_railgun", 15, Weapon),
    entity_type!("weapon_plasmagun", 15, Weapon),
    entity_type!("weapon_bfg", 15, Weapon),
    entity_type!("ammo_bullets", 15, Ammo),
    entity_type!("ammo_shells", 15, Ammo),
    entity_type!("ammo_grenades", 15, Ammo),
    entity_type!("ammo_rockets", 15, Ammo),
    entity_type!("ammo_slugs", 15, Ammo),
    entity_type!("item_armor_shard", 15, Item),
    entity_type!("item_armor_combat", 15, Item),
    entity_type!("item_armor_body", 15, Item),
    entity_type!("item_health_small", 15, Item),
    entity_type!("item_health", 15, Item),
    entity_type!("item_health_large", 15, Item),
    entity_type!("item_health_mega", 15, Item),
    entity_type!("item_quad", 15, Item),
    entity_type!("light", 8, Light),
    entity_type!("trigger_teleport", 0, Trigger),
    entity_type!("trigger_push", 0, Trigger),
    entity_type!("trigger_multiple", 0, Trigger),
    entity_type!("target_position", 8, Target),
    entity_type!("misc_teleporter_dest", 16, Target),
];

/// Classnames a player can spawn at, most preferred first.  Free-for-all maps use the first;
/// single-player and CTF maps often only have the others.
pub static SPAWN_CLASSNAMES: [&str; 6] = [
    "info_player_deathmatch",
    "info_player_start",
    "team_CTF_redplayer",
    "team_CTF_blueplayer",
    "team_CTF_redspawn",
    "team_CTF_bluespawn",
];

pub fn lookup_entity_type(classname: &str) -> Option<&'static EntityType> {
    QUAKE3_ENTITY_TYPES.iter().find(|entity_type| entity_type.classname == classname)
}

/// Category of any classname, falling back to the naming conventions for ones not in the table.
pub fn categorize(classname: &str) -> EntityCategory {
    if let Some(entity_type) = lookup_entity_type(classname) {
        return entity_type.category;
    }

    if classname.starts_with("weapon_") {
        EntityCategory::Weapon
    }
    else if classname.starts_with("ammo_") {
        EntityCategory::Ammo
    }
    else if classname.starts_with("item_") || classname.starts_with("holdable_") {
        EntityCategory::Item
    }
    else if classname.starts_with("trigger_") {
        EntityCategory::Trigger
    }
    else if classname.starts_with("target_") || classname.starts_with("info_") {
        EntityCategory::Target
    }
    else {
        EntityCategory::Other
    }
}
