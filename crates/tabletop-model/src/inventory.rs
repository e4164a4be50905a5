//! Inventory items and coin purses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One inventory line. Healing items carry a dice string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healing: Option<String>,
}

fn one() -> u32 {
    1
}

impl Item {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            healing: None,
        }
    }

    /// A consumable that heals for `dice` when used.
    pub fn healing(name: impl Into<String>, quantity: u32, dice: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            healing: Some(dice.into()),
        }
    }
}

/// The five coin denominations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    Cp,
    Sp,
    Ep,
    Gp,
    Pp,
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Denomination::Cp => "cp",
            Denomination::Sp => "sp",
            Denomination::Ep => "ep",
            Denomination::Gp => "gp",
            Denomination::Pp => "pp",
        };
        f.write_str(s)
    }
}

/// A coin purse. Balances never go negative through [`Currency::adjust`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub cp: i64,
    pub sp: i64,
    pub ep: i64,
    pub gp: i64,
    pub pp: i64,
}

impl Currency {
    pub fn get(&self, denomination: Denomination) -> i64 {
        match denomination {
            Denomination::Cp => self.cp,
            Denomination::Sp => self.sp,
            Denomination::Ep => self.ep,
            Denomination::Gp => self.gp,
            Denomination::Pp => self.pp,
        }
    }

    fn slot(&mut self, denomination: Denomination) -> &mut i64 {
        match denomination {
            Denomination::Cp => &mut self.cp,
            Denomination::Sp => &mut self.sp,
            Denomination::Ep => &mut self.ep,
            Denomination::Gp => &mut self.gp,
            Denomination::Pp => &mut self.pp,
        }
    }

    /// Adds `delta` (possibly negative). Returns the new balance, or `None`
    /// without changing anything if the result would be negative.
    pub fn adjust(&mut self, denomination: Denomination, delta: i64) -> Option<i64> {
        let slot = self.slot(denomination);
        let next = slot.checked_add(delta).filter(|v| *v >= 0)?;
        *slot = next;
        Some(next)
    }
}
