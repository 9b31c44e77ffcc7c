//! Asset keys.
//!
//! Two disjoint, fixed namespaces identify the model slots of the viewer:
//! character classes and abilities. [`AssetKey`] is their union and is what
//! the loader, the progress listeners and the logs talk about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which namespace a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Class,
    Ability,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Class => "class",
            Category::Ability => "ability",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKey {
    Mage,
    Warrior,
    Archer,
    Paladin,
}

impl ClassKey {
    /// Load order.
    pub const ALL: [ClassKey; 4] = [
        ClassKey::Mage,
        ClassKey::Warrior,
        ClassKey::Archer,
        ClassKey::Paladin,
    ];

    /// Order of the class selection buttons, which differs from the load order.
    pub const BUTTONS: [ClassKey; 4] = [
        ClassKey::Warrior,
        ClassKey::Archer,
        ClassKey::Mage,
        ClassKey::Paladin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ClassKey::Mage => "mage",
            ClassKey::Warrior => "warrior",
            ClassKey::Archer => "archer",
            ClassKey::Paladin => "paladin",
        }
    }

    pub fn from_button(index: usize) -> Option<Self> {
        Self::BUTTONS.get(index).copied()
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityKey {
    Ability1,
    Ability2,
    Ability3,
    Ability4,
    Ability5,
}

impl AbilityKey {
    pub const ALL: [AbilityKey; 5] = [
        AbilityKey::Ability1,
        AbilityKey::Ability2,
        AbilityKey::Ability3,
        AbilityKey::Ability4,
        AbilityKey::Ability5,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AbilityKey::Ability1 => "ability1",
            AbilityKey::Ability2 => "ability2",
            AbilityKey::Ability3 => "ability3",
            AbilityKey::Ability4 => "ability4",
            AbilityKey::Ability5 => "ability5",
        }
    }

    /// Ability buttons are laid out in key order.
    pub fn from_button(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for AbilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any loadable slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKey {
    Class(ClassKey),
    Ability(AbilityKey),
}

impl AssetKey {
    /// Every slot the viewer expects, classes first.
    pub fn all() -> impl Iterator<Item = AssetKey> {
        ClassKey::ALL
            .into_iter()
            .map(AssetKey::Class)
            .chain(AbilityKey::ALL.into_iter().map(AssetKey::Ability))
    }

    pub fn category(&self) -> Category {
        match self {
            AssetKey::Class(_) => Category::Class,
            AssetKey::Ability(_) => Category::Ability,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssetKey::Class(key) => key.name(),
            AssetKey::Ability(key) => key.name(),
        }
    }
}

impl From<ClassKey> for AssetKey {
    fn from(key: ClassKey) -> Self {
        AssetKey::Class(key)
    }
}

impl From<AbilityKey> for AssetKey {
    fn from(key: AbilityKey) -> Self {
        AssetKey::Ability(key)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expect_nine_slots() {
        let keys: Vec<_> = AssetKey::all().collect();
        assert_eq!(keys.len(), 9);
        assert_eq!(
            keys.iter()
                .filter(|k| k.category() == Category::Class)
                .count(),
            4
        );
    }

    #[test]
    fn should_map_buttons_in_display_order() {
        assert_eq!(ClassKey::from_button(0), Some(ClassKey::Warrior));
        assert_eq!(ClassKey::from_button(2), Some(ClassKey::Mage));
        assert_eq!(ClassKey::from_button(4), None);
        assert_eq!(AbilityKey::from_button(2), Some(AbilityKey::Ability3));
        assert_eq!(AbilityKey::from_button(5), None);
    }
}
