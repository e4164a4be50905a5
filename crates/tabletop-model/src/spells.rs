//! Spell levels, spell buckets, and legacy key normalization.
//!
//! Internally every spell map is keyed by a validated [`SpellLevel`].
//! Save files written by older tools key buckets by `"cantrips"`,
//! `"level<N>"`, or a stringified integer; those shapes are accepted only
//! at the deserialization boundary and folded into integer keys here.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A non-negative spell level. Level 0 holds cantrips.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SpellLevel(u8);

impl SpellLevel {
    /// Cantrips: unlimited use, never consume a slot.
    pub const CANTRIP: SpellLevel = SpellLevel(0);

    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_cantrip(self) -> bool {
        self.0 == 0
    }

    /// Parses one of the accepted bucket key shapes.
    ///
    /// `"cantrips"` → 0, `"level3"` → 3, `"2"` → 2. Anything else is `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.eq_ignore_ascii_case("cantrips") {
            return Some(Self::CANTRIP);
        }
        let digits = key
            .strip_prefix("level")
            .or_else(|| key.strip_prefix("Level"))
            .unwrap_or(key);
        digits.trim().parse::<u8>().ok().map(Self)
    }
}

impl fmt::Display for SpellLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for SpellLevel {
    fn from(level: u8) -> Self {
        Self(level)
    }
}

/// Spells grouped by level, names deduplicated and sorted.
pub type SpellBuckets = BTreeMap<SpellLevel, BTreeSet<String>>;

/// Per-level slot counts.
pub type SpellSlots = BTreeMap<SpellLevel, u32>;

/// Folds legacy-keyed spell buckets into integer-keyed buckets.
///
/// Buckets whose key can't be parsed are skipped. Buckets that map to the
/// same level are merged, and names within a bucket are deduplicated.
/// Applying this to its own output (with keys rendered back to strings)
/// returns the same buckets.
pub fn normalize_spells<K, I, S>(raw: impl IntoIterator<Item = (K, I)>) -> SpellBuckets
where
    K: AsRef<str>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut buckets = SpellBuckets::new();
    for (key, spells) in raw {
        let Some(level) = SpellLevel::from_key(key.as_ref()) else {
            tracing::debug!(key = key.as_ref(), "skipping unrecognized spell bucket");
            continue;
        };
        let bucket = buckets.entry(level).or_default();
        bucket.extend(spells.into_iter().map(Into::into));
    }
    buckets
}

/// Folds legacy-keyed slot counts into integer keys. Later duplicates win.
pub fn normalize_slots<K: AsRef<str>>(raw: impl IntoIterator<Item = (K, u32)>) -> SpellSlots {
    raw.into_iter()
        .filter_map(|(key, count)| SpellLevel::from_key(key.as_ref()).map(|l| (l, count)))
        .collect()
}

/// `deserialize_with` adapter for spell buckets.
pub(crate) fn deserialize_buckets<'de, D>(deserializer: D) -> Result<SpellBuckets, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Vec<String>> = BTreeMap::deserialize(deserializer)?;
    Ok(normalize_spells(raw))
}

/// `deserialize_with` adapter for slot maps.
pub(crate) fn deserialize_slots<'de, D>(deserializer: D) -> Result<SpellSlots, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, u32> = BTreeMap::deserialize(deserializer)?;
    Ok(normalize_slots(raw))
}

/// Finds which bucket holds `spell`, if any.
pub fn find_spell(buckets: &SpellBuckets, spell: &str) -> Option<SpellLevel> {
    buckets
        .iter()
        .find(|(_, names)| names.contains(spell))
        .map(|(level, _)| *level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(n: u8) -> SpellLevel {
        SpellLevel::new(n)
    }

    #[test]
    fn test_from_key_accepts_all_legacy_shapes() {
        assert_eq!(SpellLevel::from_key("cantrips"), Some(lvl(0)));
        assert_eq!(SpellLevel::from_key("level1"), Some(lvl(1)));
        assert_eq!(SpellLevel::from_key("level9"), Some(lvl(9)));
        assert_eq!(SpellLevel::from_key("2"), Some(lvl(2)));
        assert_eq!(SpellLevel::from_key("0"), Some(lvl(0)));
    }

    #[test]
    fn test_from_key_rejects_garbage() {
        assert_eq!(SpellLevel::from_key("levelX"), None);
        assert_eq!(SpellLevel::from_key("-1"), None);
        assert_eq!(SpellLevel::from_key("rituals"), None);
    }

    #[test]
    fn test_normalize_spells_mixed_keys() {
        let raw = vec![
            ("cantrips", vec!["Light"]),
            ("level1", vec!["Missile"]),
            ("2", vec!["Fire"]),
        ];
        let buckets = normalize_spells(raw);

        assert_eq!(buckets.len(), 3);
        assert!(buckets[&lvl(0)].contains("Light"));
        assert!(buckets[&lvl(1)].contains("Missile"));
        assert!(buckets[&lvl(2)].contains("Fire"));
    }

    #[test]
    fn test_normalize_spells_is_idempotent() {
        let raw = vec![
            ("cantrips", vec!["Light"]),
            ("level1", vec!["Missile"]),
            ("2", vec!["Fire"]),
        ];
        let once = normalize_spells(raw);
        let twice = normalize_spells(
            once.iter()
                .map(|(k, v)| (k.to_string(), v.iter().cloned().collect::<Vec<_>>())),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_spells_merges_and_dedups() {
        let raw = vec![
            ("cantrips", vec!["Light", "Mage Hand"]),
            ("0", vec!["Light"]),
            ("levelZ", vec!["Lost"]),
        ];
        let buckets = normalize_spells(raw);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&lvl(0)].len(), 2);
        assert!(find_spell(&buckets, "Lost").is_none());
    }

    #[test]
    fn test_normalize_slots_parses_keys() {
        let slots = normalize_slots(vec![("level1", 4), ("2", 2), ("bogus", 9)]);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[&lvl(1)], 4);
        assert_eq!(slots[&lvl(2)], 2);
    }

    #[test]
    fn test_spell_level_serializes_as_string_map_key() {
        let mut buckets = SpellBuckets::new();
        buckets.entry(lvl(1)).or_default().insert("Shield".into());
        let json = serde_json::to_string(&buckets).unwrap();
        assert_eq!(json, r#"{"1":["Shield"]}"#);
    }
}
