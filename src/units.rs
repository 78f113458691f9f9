//! Quantity units for servings, portions, and nutrition data
//!
//! Quantities are stored as a number plus a unit abbreviation. Every unit has
//! a metric factor relating it to its base unit (grams for mass, millilitres
//! for volume); converting a volume to a mass additionally needs a density.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A unit a quantity can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QtyUnit {
    /// Grams - the base mass unit
    Grams,
    /// Milligrams
    Milligrams,
    /// Millilitres - the base volume unit
    Millilitres,
    /// Litres
    Litres,
}

impl QtyUnit {
    /// Stored abbreviation of the unit
    pub fn abbr(&self) -> &'static str {
        match self {
            QtyUnit::Grams => "g",
            QtyUnit::Milligrams => "mg",
            QtyUnit::Millilitres => "ml",
            QtyUnit::Litres => "l",
        }
    }

    /// Factor to the unit's metric base (grams or millilitres)
    pub fn metric_factor(&self) -> f64 {
        match self {
            QtyUnit::Grams => 1.0,
            QtyUnit::Milligrams => 0.001,
            QtyUnit::Millilitres => 1.0,
            QtyUnit::Litres => 1000.0,
        }
    }

    /// Whether this unit measures volume rather than mass
    pub fn is_volume(&self) -> bool {
        matches!(self, QtyUnit::Millilitres | QtyUnit::Litres)
    }

    /// Get all units
    pub fn all() -> &'static [QtyUnit] {
        &[QtyUnit::Grams, QtyUnit::Milligrams, QtyUnit::Millilitres, QtyUnit::Litres]
    }
}

impl std::str::FromStr for QtyUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(QtyUnit::Grams),
            "mg" | "milligram" | "milligrams" => Ok(QtyUnit::Milligrams),
            "ml" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => {
                Ok(QtyUnit::Millilitres)
            }
            "l" | "litre" | "litres" | "liter" | "liters" => Ok(QtyUnit::Litres),
            _ => Err(Error::InvalidArguments(format!("unknown quantity unit: {}", s))),
        }
    }
}

impl std::fmt::Display for QtyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_roundtrip() {
        for unit in QtyUnit::all() {
            let parsed: QtyUnit = unit.abbr().parse().unwrap();
            assert_eq!(*unit, parsed);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("grams".parse::<QtyUnit>().unwrap(), QtyUnit::Grams);
        assert_eq!("milliliters".parse::<QtyUnit>().unwrap(), QtyUnit::Millilitres);
        assert!("cups".parse::<QtyUnit>().is_err());
    }

    #[test]
    fn test_metric_factors() {
        assert_eq!(QtyUnit::Milligrams.metric_factor(), 0.001);
        assert_eq!(QtyUnit::Litres.metric_factor(), 1000.0);
        assert!(QtyUnit::Millilitres.is_volume());
        assert!(!QtyUnit::Grams.is_volume());
    }
}
