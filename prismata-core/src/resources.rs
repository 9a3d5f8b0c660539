//! Per-player resource ledger.
//!
//! Resource strings use a small grammar: an optional leading decimal integer
//! is gold, and every occurrence of `G`, `B`, `C`, `H` or `A` counts one unit
//! of green, blue, red, energy or attack respectively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resources {
    pub gold: i32,
    pub green: i32,
    pub blue: i32,
    pub red: i32,
    pub energy: i32,
    /// Unresolved combat damage available to spend.
    pub attack: i32,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        gold: 0,
        green: 0,
        blue: 0,
        red: 0,
        energy: 0,
        attack: 0,
    };

    /// Parse a resource string such as `"3GG"` or `"2GGBH"`.
    ///
    /// Never fails: characters outside the alphabet are ignored and a missing
    /// leading number means zero gold.
    pub fn parse(s: &str) -> Self {
        let count = |c: char| s.chars().filter(|&x| x == c).count() as i32;
        Self {
            gold: leading_int(s),
            green: count('G'),
            blue: count('B'),
            red: count('C'),
            energy: count('H'),
            attack: count('A'),
        }
    }

    pub fn gold(amount: i32) -> Self {
        Self {
            gold: amount,
            ..Self::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Whether every counter here is at least the matching counter of `cost`.
    pub fn covers(&self, cost: &Resources) -> bool {
        self.gold >= cost.gold
            && self.green >= cost.green
            && self.blue >= cost.blue
            && self.red >= cost.red
            && self.energy >= cost.energy
            && self.attack >= cost.attack
    }

    /// Add every counter except attack.
    pub fn add_currencies(&mut self, other: &Resources) {
        self.gold += other.gold;
        self.green += other.green;
        self.blue += other.blue;
        self.red += other.red;
        self.energy += other.energy;
    }

    /// Subtract every counter except attack.
    pub fn sub_currencies(&mut self, other: &Resources) {
        self.gold -= other.gold;
        self.green -= other.green;
        self.blue -= other.blue;
        self.red -= other.red;
        self.energy -= other.energy;
    }
}

/// `parseInt`-style prefix: optional whitespace, optional sign, digits.
fn leading_int(s: &str) -> i32 {
    let trimmed = s.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    // Oversized amounts clamp to the i32 range.
    rest.bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| {
            acc.saturating_mul(10)
                .saturating_add(sign * i32::from(d - b'0'))
        })
}

impl std::str::FromStr for Resources {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Resources::parse(s))
    }
}

impl Add for Resources {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for Resources {
    fn add_assign(&mut self, other: Self) {
        self.add_currencies(&other);
        self.attack += other.attack;
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = [
            ('G', self.green),
            ('B', self.blue),
            ('C', self.red),
            ('H', self.energy),
            ('A', self.attack),
        ];
        let has_letters = letters.iter().any(|&(_, n)| n > 0);
        if self.gold != 0 || !has_letters {
            write!(f, "{}", self.gold)?;
        }
        for (c, n) in letters {
            for _ in 0..n.max(0) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}
