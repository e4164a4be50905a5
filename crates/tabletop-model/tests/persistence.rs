//! Save-file and wire-format tests for characters.

use tabletop_model::{
    Ability, Character, ClassData, Item, RaceData, RulesData, SpellLevel,
};

fn rules() -> RulesData {
    let mut rules = RulesData::default();
    rules.races.insert(
        "Halfling".into(),
        RaceData {
            speed: 25,
            ability_bonuses: [(Ability::Dexterity, 2)].into_iter().collect(),
            proficiencies: vec![],
            languages: vec!["Common".into(), "Halfling".into()],
        },
    );
    rules.classes.insert(
        "Cleric".into(),
        ClassData {
            hit_die: 8,
            proficiencies: vec!["Light Armor".into(), "Shields".into()],
            spell_slots: [(
                3,
                [(SpellLevel::new(1), 4), (SpellLevel::new(2), 2)]
                    .into_iter()
                    .collect(),
            )]
            .into_iter()
            .collect(),
            ..ClassData::default()
        },
    );
    rules
}

fn cleric() -> Character {
    let mut c = Character::new("Merry", "Halfling", "Cleric");
    c.level = 3;
    c.base_abilities.wisdom = 16;
    c.initialize(&rules());
    c.spells.entry(SpellLevel::new(0)).or_default().insert("Light".into());
    c.spells.entry(SpellLevel::new(1)).or_default().insert("Bless".into());
    c.spells.entry(SpellLevel::new(2)).or_default().insert("Aid".into());
    c.add_item(Item::healing("Potion of Healing", 2, "2d4+2"));
    c.equip("Shield", 2);
    c.alignment = "Neutral Good".into();
    c.spell_slots.insert(SpellLevel::new(1), 1);
    c
}

#[test]
fn test_round_trip_reproduces_every_field() {
    let original = cleric();
    let json = original.to_json().unwrap();
    let restored = Character::from_json(&json).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn test_round_trip_through_value() {
    let original = cleric();
    let value = original.to_value().unwrap();
    assert_eq!(Character::from_value(value).unwrap(), original);
}

#[test]
fn test_spell_buckets_serialize_with_string_keys() {
    let value = cleric().to_value().unwrap();
    let spells = value["spells"].as_object().unwrap();
    let keys: Vec<_> = spells.keys().cloned().collect();
    assert_eq!(keys, vec!["0", "1", "2"]);
    assert_eq!(value["max_spell_slots"]["2"], 2);
}

#[test]
fn test_legacy_spell_keys_load_as_levels() {
    let json = r#"{
        "name": "Old Save",
        "spells": {"cantrips": ["Light"], "level1": ["Missile"], "2": ["Fire"]},
        "spell_slots": {"level1": 2}
    }"#;
    let c = Character::from_json(json).unwrap();
    assert!(c.spells[&SpellLevel::new(0)].contains("Light"));
    assert!(c.spells[&SpellLevel::new(1)].contains("Missile"));
    assert!(c.spells[&SpellLevel::new(2)].contains("Fire"));
    assert_eq!(c.spell_slots[&SpellLevel::new(1)], 2);
}

#[test]
fn test_missing_keys_fall_back_to_defaults() {
    let c = Character::from_json(r#"{"name": "Bare"}"#).unwrap();
    assert_eq!(c.level, 1);
    assert_eq!(c.base_abilities.strength, 10);
    assert_eq!(c.actions_per_turn, 1);
    assert!(c.inventory.is_empty());
}

#[test]
fn test_restored_character_reinitializes_consistently() {
    let original = cleric();
    let mut restored = Character::from_json(&original.to_json().unwrap()).unwrap();
    restored.initialize(&rules());
    assert_eq!(restored.max_hit_points, original.max_hit_points);
    assert_eq!(restored.armor_class, original.armor_class);
    assert_eq!(restored.max_hit_dice, 3);
}
