//! Dice notation parsing and rolling.
//!
//! Supports the notation found in rule tables and save files: `NdS`, `dS`
//! (a single die), flat modifiers, and any sum/difference of those terms
//! (`"2d6+1"`, `"1d8 + 1d6 - 1"`).
//!
//! Randomness goes through the [`DiceRoller`] trait so that combat and
//! resting can be driven by a seeded RNG in production and by
//! [`FixedRolls`] in tests.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::DiceError;

/// Most dice a single expression may roll, summed over every term.
pub const MAX_DICE: u32 = 1_000;

/// Largest die an expression may name.
pub const MAX_DIE_SIDES: u32 = 1_000;

// ---------------------------------------------------------------------------
// DiceRoller
// ---------------------------------------------------------------------------

/// A source of uniform die rolls.
///
/// Every roll in the system is a uniform integer in `[1, sides]`.
pub trait DiceRoller {
    /// Rolls one die with the given number of sides.
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl DiceRoller for rand::rngs::StdRng {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.random_range(1..=sides.max(1))
    }
}

impl DiceRoller for rand::rngs::ThreadRng {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.random_range(1..=sides.max(1))
    }
}

/// A scripted roller that replays a fixed sequence of outcomes.
///
/// Each outcome is clamped into `[1, sides]` for the die being rolled.
/// Once the script runs out every roll returns 1.
#[derive(Debug, Clone, Default)]
pub struct FixedRolls {
    outcomes: VecDeque<u32>,
}

impl FixedRolls {
    /// Creates a roller that will return `outcomes` in order.
    pub fn new(outcomes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    /// Appends more outcomes to the end of the script.
    pub fn push(&mut self, outcome: u32) {
        self.outcomes.push_back(outcome);
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.outcomes.len()
    }
}

impl DiceRoller for FixedRolls {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        self.outcomes
            .pop_front()
            .map(|v| v.clamp(1, sides))
            .unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// DiceExpression
// ---------------------------------------------------------------------------

/// One `NdS` group inside an expression. `sign` is +1 or -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: u32,
    pub sides: u32,
    pub sign: i32,
}

/// A parsed dice expression such as `2d6+1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub terms: Vec<DiceTerm>,
    pub modifier: i32,
}

impl DiceExpression {
    /// Parses dice notation.
    ///
    /// # Errors
    /// [`DiceError::NoDice`] for an empty string, [`DiceError::InvalidNotation`]
    /// for an unparseable term or an out-of-range modifier,
    /// [`DiceError::InvalidDieSize`] for `d0` or a die above [`MAX_DIE_SIDES`],
    /// [`DiceError::TooManyDice`] past [`MAX_DICE`] dice in total.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let cleaned: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if cleaned.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut terms = Vec::new();
        let mut modifier = 0i32;
        let mut current = String::new();
        let mut sign = 1i32;

        for ch in cleaned.chars() {
            if ch == '+' || ch == '-' {
                if !current.is_empty() {
                    Self::push_term(&current, sign, &mut terms, &mut modifier)?;
                    current.clear();
                } else if !terms.is_empty() || modifier != 0 {
                    // "1d6+-2" style double operators
                    return Err(DiceError::InvalidNotation(notation.to_string()));
                }
                sign = if ch == '+' { 1 } else { -1 };
            } else {
                current.push(ch);
            }
        }
        if current.is_empty() {
            // trailing operator
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }
        Self::push_term(&current, sign, &mut terms, &mut modifier)?;

        let count: u64 = terms.iter().map(|t| u64::from(t.count)).sum();
        if count > u64::from(MAX_DICE) {
            return Err(DiceError::TooManyDice {
                count,
                max: MAX_DICE,
            });
        }

        Ok(Self { terms, modifier })
    }

    fn push_term(
        term: &str,
        sign: i32,
        terms: &mut Vec<DiceTerm>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(term.to_string());

        match term.split_once('d') {
            Some((count, sides)) => {
                let count: u32 = if count.is_empty() {
                    1
                } else {
                    count.parse().map_err(|_| invalid())?
                };
                let sides: u32 = sides.parse().map_err(|_| invalid())?;
                if sides == 0 || sides > MAX_DIE_SIDES {
                    return Err(DiceError::InvalidDieSize(sides));
                }
                terms.push(DiceTerm { count, sides, sign });
            }
            None => {
                let flat: i32 = term.parse().map_err(|_| invalid())?;
                *modifier = flat
                    .checked_mul(sign)
                    .and_then(|v| modifier.checked_add(v))
                    .ok_or_else(invalid)?;
            }
        }
        Ok(())
    }

    /// Rolls every term and returns the total including the modifier.
    ///
    /// Totals saturate at the `i32` bounds.
    pub fn roll(&self, roller: &mut dyn DiceRoller) -> i32 {
        let mut total = i64::from(self.modifier);
        for term in &self.terms {
            let sign = i64::from(term.sign.signum());
            for _ in 0..term.count {
                total = total.saturating_add(sign * i64::from(roller.roll_die(term.sides)));
            }
        }
        saturate(total)
    }

    /// The smallest total this expression can produce.
    pub fn min(&self) -> i32 {
        self.bound(|lo, hi, sign| if sign > 0 { lo } else { -hi })
    }

    /// The largest total this expression can produce.
    pub fn max(&self) -> i32 {
        self.bound(|lo, hi, sign| if sign > 0 { hi } else { -lo })
    }

    fn bound(&self, pick: impl Fn(i64, i64, i32) -> i64) -> i32 {
        let total = self.terms.iter().fold(i64::from(self.modifier), |acc, t| {
            let lo = i64::from(t.count);
            let hi = lo.saturating_mul(i64::from(t.sides.max(1)));
            acc.saturating_add(pick(lo, hi, t.sign))
        });
        saturate(total)
    }
}

fn saturate(total: i64) -> i32 {
    i32::try_from(total).unwrap_or(if total < 0 { i32::MIN } else { i32::MAX })
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for term in &self.terms {
            if term.sign < 0 {
                write!(f, "-")?;
            } else if !first {
                write!(f, "+")?;
            }
            write!(f, "{}d{}", term.count, term.sides)?;
            first = false;
        }
        if self.modifier > 0 && !first {
            write!(f, "+{}", self.modifier)?;
        } else if self.modifier != 0 || first {
            write!(f, "{}", self.modifier)?;
        }
        Ok(())
    }
}

/// Parses and rolls `notation` in one step.
pub fn roll_notation(
    notation: &str,
    roller: &mut dyn DiceRoller,
) -> Result<i32, DiceError> {
    Ok(DiceExpression::parse(notation)?.roll(roller))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_parse_simple_expression() {
        let expr = DiceExpression::parse("2d6+1").unwrap();
        assert_eq!(
            expr.terms,
            vec![DiceTerm { count: 2, sides: 6, sign: 1 }]
        );
        assert_eq!(expr.modifier, 1);
    }

    #[test]
    fn test_parse_implicit_count_and_spaces() {
        let expr = DiceExpression::parse(" D8 + 1d6 - 2 ").unwrap();
        assert_eq!(expr.terms.len(), 2);
        assert_eq!(expr.terms[0], DiceTerm { count: 1, sides: 8, sign: 1 });
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_flat_number_is_valid() {
        let expr = DiceExpression::parse("5").unwrap();
        assert!(expr.terms.is_empty());
        assert_eq!(expr.modifier, 5);
    }

    #[test]
    fn test_parse_empty_returns_no_dice() {
        assert_eq!(DiceExpression::parse("  "), Err(DiceError::NoDice));
    }

    #[test]
    fn test_parse_garbage_returns_invalid_notation() {
        assert!(matches!(
            DiceExpression::parse("2x6"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("1d6+"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("d"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_parse_zero_sided_die_rejected() {
        assert_eq!(
            DiceExpression::parse("1d0"),
            Err(DiceError::InvalidDieSize(0))
        );
    }

    #[test]
    fn test_roll_with_fixed_outcomes() {
        let mut rolls = FixedRolls::new([3, 5]);
        let total = roll_notation("2d6+1", &mut rolls).unwrap();
        assert_eq!(total, 9);
        assert_eq!(rolls.remaining(), 0);
    }

    #[test]
    fn test_roll_subtracted_term() {
        let mut rolls = FixedRolls::new([6, 2]);
        assert_eq!(roll_notation("1d6-1d4", &mut rolls).unwrap(), 4);
    }

    #[test]
    fn test_fixed_rolls_clamp_to_die_size() {
        let mut rolls = FixedRolls::new([50, 0]);
        assert_eq!(rolls.roll_die(20), 20);
        assert_eq!(rolls.roll_die(20), 1);
        // exhausted script falls back to 1
        assert_eq!(rolls.roll_die(6), 1);
    }

    #[test]
    fn test_seeded_rolls_stay_within_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let expr = DiceExpression::parse("3d6+2").unwrap();
        for _ in 0..500 {
            let v = expr.roll(&mut rng);
            assert!((expr.min()..=expr.max()).contains(&v), "{v}");
        }
        assert_eq!(expr.min(), 5);
        assert_eq!(expr.max(), 20);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for s in ["2d6+1", "1d8-1d4", "1d20", "-1d4+3"] {
            let expr = DiceExpression::parse(s).unwrap();
            assert_eq!(DiceExpression::parse(&expr.to_string()).unwrap(), expr);
        }
    }

    #[test]
    fn test_parse_modifier_overflow_returns_invalid_notation() {
        assert!(matches!(
            DiceExpression::parse("2147483647+1"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("-2147483647-2"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_parse_too_many_dice_rejected() {
        assert_eq!(
            DiceExpression::parse("3000000000d6"),
            Err(DiceError::TooManyDice { count: 3_000_000_000, max: MAX_DICE })
        );
        assert!(matches!(
            DiceExpression::parse("600d6+600d6"),
            Err(DiceError::TooManyDice { count: 1200, .. })
        ));
        assert!(DiceExpression::parse("1000d6").is_ok());
    }

    #[test]
    fn test_parse_oversized_die_rejected() {
        assert_eq!(
            DiceExpression::parse("70000d100000"),
            Err(DiceError::InvalidDieSize(100_000))
        );
        assert!(DiceExpression::parse("1d1000").is_ok());
    }

    #[test]
    fn test_bounds_of_hand_built_expression_saturate() {
        let expr = DiceExpression {
            terms: vec![DiceTerm { count: u32::MAX, sides: u32::MAX, sign: 1 }],
            modifier: i32::MAX,
        };
        assert_eq!(expr.max(), i32::MAX);
        assert_eq!(expr.min(), i32::MAX);

        let negative = DiceExpression {
            terms: vec![DiceTerm { count: u32::MAX, sides: u32::MAX, sign: -1 }],
            modifier: i32::MIN,
        };
        assert_eq!(negative.min(), i32::MIN);
    }

    #[test]
    fn test_roll_saturates_instead_of_overflowing() {
        let expr = DiceExpression {
            terms: vec![DiceTerm { count: 2, sides: u32::MAX, sign: 1 }],
            modifier: i32::MAX,
        };
        let mut rolls = FixedRolls::new([u32::MAX, u32::MAX]);
        assert_eq!(expr.roll(&mut rolls), i32::MAX);
    }

    #[test]
    fn test_largest_allowed_expression_stays_in_range() {
        let expr = DiceExpression::parse("1000d1000+2147483647").unwrap();
        assert_eq!(expr.max(), i32::MAX);
        assert_eq!(expr.min(), i32::MAX);
    }
}
