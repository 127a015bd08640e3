//! EIC area table
//!
//! The raw membership string follows the transparency platform listing, e.g.
//! `"SCA|CZ, BZN|CZ, Country|CZ"`: comma separated `TYPE|name` pairs.

use std::collections::HashMap;
use std::fmt;

use super::codes::{AreaType, UnknownCodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaCode {
    /// EIC code, globally unique
    pub code: &'static str,
    /// Raw area-type membership string
    pub area_types: &'static str,
    pub description: &'static str,
}

/// One `TYPE|name` entry of an area's membership string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaMembership {
    pub area_type: AreaType,
    pub name: &'static str,
}

pub static AREAS: &[AreaCode] = &[
    AreaCode { code: "10YAT-APG------L", area_types: "SCA|AT, MBA|AT, BZN|AT, BZA|AT, CTA|AT, Country|AT", description: "Austria, APG BZ / CA / MBA" },
    AreaCode { code: "10YBE----------2", area_types: "SCA|BE, MBA|BE, BZN|BE, BZA|BE, CTA|BE, Country|BE", description: "Belgium, Elia BZ / CA / MBA" },
    AreaCode { code: "10YCH-SWISSGRIDZ", area_types: "SCA|CH, MBA|CH, BZN|CH, BZA|CH, CTA|CH, Country|CH", description: "Switzerland, Swissgrid BZ / CA / MBA" },
    AreaCode { code: "10YCZ-CEPS-----N", area_types: "SCA|CZ, MBA|CZ, BZN|CZ, BZA|CZ, CTA|CZ, Country|CZ", description: "Czech Republic, CEPS BZ / CA / MBA" },
    AreaCode { code: "10Y1001A1001A82H", area_types: "BZN|DE-LU, IPA|DE-LU, MBA|DE-LU", description: "DE-LU MBA" },
    AreaCode { code: "10Y1001A1001A63L", area_types: "BZN|DE-AT-LU", description: "DE-AT-LU BZ" },
    AreaCode { code: "10Y1001A1001A83F", area_types: "Country|DE", description: "Germany" },
    AreaCode { code: "10YDE-VE-------2", area_types: "SCA|DE(50Hertz), CTA|DE(50Hertz), BZA|DE(50HzT)", description: "50Hertz CA, DE(50HzT) BZA" },
    AreaCode { code: "10YDE-RWENET---I", area_types: "SCA|DE(Amprion), CTA|DE(Amprion), BZA|DE(Amprion)", description: "Amprion CA" },
    AreaCode { code: "10YDK-1--------W", area_types: "IPA|DK1, SCA|DK1, MBA|DK1, BZN|DK1, BZA|DK1, LFA|DK1", description: "DK1 BZ / MBA" },
    AreaCode { code: "10YDK-2--------M", area_types: "IPA|DK2, SCA|DK2, MBA|DK2, BZN|DK2, BZA|DK2", description: "DK2 BZ / MBA" },
    AreaCode { code: "10YES-REE------0", area_types: "SCA|ES, MBA|ES, BZN|ES, BZA|ES, CTA|ES, Country|ES", description: "Spain, REE BZ / CA / MBA" },
    AreaCode { code: "10YFI-1--------U", area_types: "MBA|FI, SCA|FI, BZN|FI, BZA|FI, CTA|FI, Country|FI, IPA|FI", description: "Finland, Fingrid BZ / CA / MBA" },
    AreaCode { code: "10YFR-RTE------C", area_types: "SCA|FR, MBA|FR, BZN|FR, BZA|FR, CTA|FR, Country|FR", description: "France, RTE BZ / CA / MBA" },
    AreaCode { code: "10YHU-MAVIR----U", area_types: "SCA|HU, MBA|HU, BZN|HU, BZA|HU, CTA|HU, Country|HU", description: "Hungary, MAVIR CA / BZ / MBA" },
    AreaCode { code: "10YIT-GRTN-----B", area_types: "SCA|IT, CTA|IT, Country|IT", description: "Italy, IT CA / MBA" },
    AreaCode { code: "10Y1001A1001A73I", area_types: "BZN|IT-North, SCA|IT-North, MBA|IT-North", description: "Italy North BZ / MBA" },
    AreaCode { code: "10YNL----------L", area_types: "SCA|NL, MBA|NL, BZN|NL, BZA|NL, CTA|NL, Country|NL", description: "Netherlands, TenneT NL BZ / CA / MBA" },
    AreaCode { code: "10YNO-1--------2", area_types: "IPA|NO1, MBA|NO1, SCA|NO1, BZN|NO1", description: "NO1 BZ / MBA" },
    AreaCode { code: "10YPL-AREA-----S", area_types: "SCA|PL, MBA|PL, BZN|PL, BZA|PL, CTA|PL, Country|PL", description: "Poland, PSE SA BZ / BZA / CA / MBA" },
    AreaCode { code: "10Y1001A1001A44P", area_types: "IPA|SE1, BZN|SE1, MBA|SE1, SCA|SE1", description: "SE1 BZ / MBA" },
    AreaCode { code: "10YSK-SEPS-----K", area_types: "SCA|SK, MBA|SK, BZN|SK, BZA|SK, CTA|SK, Country|SK", description: "Slovakia, SEPS BZ / CA / MBA" },
];

lazy_static::lazy_static! {
    static ref BY_EIC: HashMap<&'static str, &'static AreaCode> =
        AREAS.iter().map(|a| (a.code, a)).collect();
    static ref BY_SHORT_CODE: HashMap<&'static str, &'static AreaCode> =
        AREAS.iter().map(|a| (a.short_code(), a)).collect();
}

impl AreaCode {
    /// Look up an area by EIC code
    pub fn from_eic(code: &str) -> Option<&'static AreaCode> {
        BY_EIC.get(code.trim()).copied()
    }

    /// Look up an area by EIC code or short display code ("CZ", "DE-LU")
    pub fn lookup(code: &str) -> Option<&'static AreaCode> {
        let code = code.trim();
        Self::from_eic(code).or_else(|| BY_SHORT_CODE.get(code).copied())
    }

    /// Parse the raw membership string
    ///
    /// The platform spells the country membership `Country`; it maps to `CTY`.
    pub fn memberships(&self) -> Result<Vec<AreaMembership>, UnknownCodeError> {
        self.area_types
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (kind, name) = entry.split_once('|').ok_or_else(|| UnknownCodeError {
                    kind: "area type",
                    code: entry.to_string(),
                })?;
                let area_type = match kind.trim() {
                    "Country" => AreaType::Country,
                    other => AreaType::from_code(other)?,
                };
                Ok(AreaMembership {
                    area_type,
                    name: name.trim(),
                })
            })
            .collect()
    }

    pub fn has_area_type(&self, area_type: AreaType) -> bool {
        self.memberships()
            .map(|m| m.iter().any(|entry| entry.area_type == area_type))
            .unwrap_or(false)
    }

    /// Short display code: the bidding zone name if the area is one,
    /// otherwise the first membership name
    pub fn short_code(&self) -> &'static str {
        let memberships = match self.memberships() {
            Ok(m) => m,
            Err(_) => return self.code,
        };

        memberships
            .iter()
            .find(|m| m.area_type == AreaType::BiddingZone)
            .or_else(|| memberships.first())
            .map(|m| m.name)
            .unwrap_or(self.code)
    }
}

impl fmt::Display for AreaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.short_code(), self.code)
    }
}
