//! Gas identity canonicalizer.
//!
//! Programs name the same gas several ways (`CCL4`, `ccl4`, `CCl4`; `COS`
//! vs `OCS`; `F11B` for the second-generation F11 file). Everything past the
//! validation boundary works with the canonical [`GasId`].

use super::CatalogError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical spellings of every gas measured by at least one program.
pub const KNOWN_GASES: &[&str] = &[
    // CFCs
    "F11", "F12", "F113", "F114", "F115", "F13",
    // Halons
    "h1211", "h1301", "h2402",
    // HCFCs
    "HCFC22", "HCFC141b", "HCFC142b", "HCFC123", "HCFC124", "HCFC133a",
    // HFCs and HFOs
    "HFC134a", "HFC152a", "HFC143a", "HFC365mfc", "HFC32", "HFC227ea", "HFC125", "HFC236fa",
    "HFO1234yf", "HFO1234ze",
    // Methyl halides and solvents
    "CH3Br", "CH3Cl", "C2Cl4", "CH2Cl2", "CH3CCl3", "CCl4", "CHCl3",
    // Other long-lived gases
    "N2O", "SF6", "OCS", "CF4", "NF3", "PFC116", "PFC218", "SO2F2",
    // Hydrocarbons
    "C2H2", "C2H6", "C3H8", "i-butane", "n-butane", "i-pentane", "n-pentane", "n-hexane",
];

/// Historical and short codes that do not fold onto a canonical spelling.
const ALIASES: &[(&str, &str)] = &[
    ("COS", "OCS"),
    ("CARBONYLSULFIDE", "OCS"),
    ("F11B", "F11"),
    ("CFC11", "F11"),
    ("CFC12", "F12"),
    ("CFC113", "F113"),
    ("CFC114", "F114"),
    ("CFC115", "F115"),
    ("CFC13", "F13"),
    ("F134A", "HFC134a"),
    ("HALON1211", "h1211"),
    ("HALON1301", "h1301"),
    ("HALON2402", "h2402"),
    ("MC", "CH3CCl3"),
    ("METHYLCHLOROFORM", "CH3CCl3"),
    ("PCE", "C2Cl4"),
    ("C2F6", "PFC116"),
    ("C3F8", "PFC218"),
];

/// Fold a spelling to its comparison key: uppercase, separators removed.
fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' ' | '.'))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Canonical gas identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GasId(String);

impl GasId {
    /// Resolve a user-supplied alias to its canonical identifier.
    pub fn parse(alias: &str) -> Result<Self, CatalogError> {
        let key = fold(alias);
        if key.is_empty() {
            return Err(CatalogError::UnknownGas {
                alias: alias.to_string(),
            });
        }

        if let Some(canonical) = KNOWN_GASES.iter().find(|g| fold(g) == key) {
            return Ok(GasId((*canonical).to_string()));
        }

        ALIASES
            .iter()
            .find(|(from, _)| *from == key)
            .map(|(_, to)| GasId((*to).to_string()))
            .ok_or_else(|| CatalogError::UnknownGas {
                alias: alias.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mole-fraction unit label used in reports.
    pub fn units(&self) -> &'static str {
        if self.0 == "N2O" {
            "ppb"
        } else {
            "ppt"
        }
    }
}

impl fmt::Display for GasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for GasId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GasId::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_match_on_canonical_names() {
        assert_eq!(GasId::parse("ccl4").unwrap().as_str(), "CCl4");
        assert_eq!(GasId::parse("CCL4").unwrap().as_str(), "CCl4");
        assert_eq!(GasId::parse("n2o").unwrap().as_str(), "N2O");
        assert_eq!(GasId::parse("H1211").unwrap().as_str(), "h1211");
        assert_eq!(GasId::parse("hfc-134a").unwrap().as_str(), "HFC134a");
        assert_eq!(GasId::parse("I-Butane").unwrap().as_str(), "i-butane");
    }

    #[test]
    fn historical_codes_map_to_canonical() {
        assert_eq!(GasId::parse("COS").unwrap().as_str(), "OCS");
        assert_eq!(GasId::parse("f134a").unwrap().as_str(), "HFC134a");
        assert_eq!(GasId::parse("F11b").unwrap().as_str(), "F11");
        assert_eq!(GasId::parse("mc").unwrap().as_str(), "CH3CCl3");
        assert_eq!(GasId::parse("CFC-12").unwrap().as_str(), "F12");
    }

    #[test]
    fn unknown_alias_is_reported() {
        let err = GasId::parse("unobtainium").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownGas { .. }));
        assert!(err.to_string().contains("unobtainium"));
        assert!(GasId::parse("  ").is_err());
    }

    #[test]
    fn known_gases_fold_uniquely() {
        let mut keys: Vec<String> = KNOWN_GASES.iter().map(|g| fold(g)).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), KNOWN_GASES.len());
    }

    #[test]
    fn units_label() {
        assert_eq!(GasId::parse("n2o").unwrap().units(), "ppb");
        assert_eq!(GasId::parse("sf6").unwrap().units(), "ppt");
    }
}
