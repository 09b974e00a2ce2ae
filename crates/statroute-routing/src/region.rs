//! Country and region resolution
//!
//! Normalizes free-form country identifiers ("U.S.", "United Kingdom",
//! "DEU") to ISO 3166 alpha-2 codes and expands named groups ("G7", "euro
//! area") to their members. Everything here is a static lookup; nothing
//! fails. Unrecognized input passes through uppercased.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output code format for [`RegionResolver::expand_region`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeFormat {
    #[default]
    Iso2,
    Iso3,
}

struct Country {
    iso2: &'static str,
    iso3: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
}

const fn country(
    iso2: &'static str,
    iso3: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
) -> Country {
    Country {
        iso2,
        iso3,
        name,
        aliases,
    }
}

static COUNTRIES: &[Country] = &[
    // North America
    country("US", "USA", "united states", &["usa", "united states of america", "america", "us of a"]),
    country("CA", "CAN", "canada", &[]),
    country("MX", "MEX", "mexico", &[]),
    // Latin America
    country("BR", "BRA", "brazil", &["brasil"]),
    country("AR", "ARG", "argentina", &[]),
    country("CL", "CHL", "chile", &[]),
    country("CO", "COL", "colombia", &[]),
    country("PE", "PER", "peru", &[]),
    country("CR", "CRI", "costa rica", &[]),
    // Europe
    country("GB", "GBR", "united kingdom", &["uk", "great britain", "britain", "england"]),
    country("DE", "DEU", "germany", &["deutschland"]),
    country("FR", "FRA", "france", &[]),
    country("IT", "ITA", "italy", &["italia"]),
    country("ES", "ESP", "spain", &["espana"]),
    country("PT", "PRT", "portugal", &[]),
    country("NL", "NLD", "netherlands", &["the netherlands", "holland"]),
    country("BE", "BEL", "belgium", &[]),
    country("LU", "LUX", "luxembourg", &[]),
    country("IE", "IRL", "ireland", &["republic of ireland"]),
    country("AT", "AUT", "austria", &[]),
    country("FI", "FIN", "finland", &[]),
    country("SE", "SWE", "sweden", &[]),
    country("DK", "DNK", "denmark", &[]),
    country("NO", "NOR", "norway", &[]),
    country("IS", "ISL", "iceland", &[]),
    country("CH", "CHE", "switzerland", &[]),
    country("PL", "POL", "poland", &[]),
    country("CZ", "CZE", "czechia", &["czech republic"]),
    country("SK", "SVK", "slovakia", &["slovak republic"]),
    country("HU", "HUN", "hungary", &[]),
    country("SI", "SVN", "slovenia", &[]),
    country("HR", "HRV", "croatia", &[]),
    country("RO", "ROU", "romania", &[]),
    country("BG", "BGR", "bulgaria", &[]),
    country("GR", "GRC", "greece", &["hellas"]),
    country("CY", "CYP", "cyprus", &[]),
    country("MT", "MLT", "malta", &[]),
    country("EE", "EST", "estonia", &[]),
    country("LV", "LVA", "latvia", &[]),
    country("LT", "LTU", "lithuania", &[]),
    country("TR", "TUR", "turkey", &["turkiye", "türkiye"]),
    country("RU", "RUS", "russia", &["russian federation"]),
    country("UA", "UKR", "ukraine", &[]),
    // Middle East & Africa
    country("IL", "ISR", "israel", &[]),
    country("SA", "SAU", "saudi arabia", &["ksa"]),
    country("AE", "ARE", "united arab emirates", &["uae", "emirates"]),
    country("QA", "QAT", "qatar", &[]),
    country("IR", "IRN", "iran", &["islamic republic of iran"]),
    country("EG", "EGY", "egypt", &[]),
    country("ZA", "ZAF", "south africa", &[]),
    country("NG", "NGA", "nigeria", &[]),
    country("KE", "KEN", "kenya", &[]),
    country("ET", "ETH", "ethiopia", &[]),
    country("GH", "GHA", "ghana", &[]),
    // Asia-Pacific
    country("CN", "CHN", "china", &["prc", "peoples republic of china", "mainland china"]),
    country("JP", "JPN", "japan", &[]),
    country("KR", "KOR", "south korea", &["korea", "republic of korea"]),
    country("IN", "IND", "india", &[]),
    country("ID", "IDN", "indonesia", &[]),
    country("AU", "AUS", "australia", &[]),
    country("NZ", "NZL", "new zealand", &[]),
    country("SG", "SGP", "singapore", &[]),
    country("MY", "MYS", "malaysia", &[]),
    country("TH", "THA", "thailand", &[]),
    country("VN", "VNM", "vietnam", &["viet nam"]),
    country("PH", "PHL", "philippines", &[]),
    country("MM", "MMR", "myanmar", &["burma"]),
    country("KH", "KHM", "cambodia", &[]),
    country("LA", "LAO", "laos", &["lao pdr"]),
    country("BN", "BRN", "brunei", &["brunei darussalam"]),
    country("PK", "PAK", "pakistan", &[]),
    country("BD", "BGD", "bangladesh", &[]),
];

struct Group {
    code: &'static str,
    aliases: &'static [&'static str],
    members: &'static [&'static str],
}

static GROUPS: &[Group] = &[
    Group {
        code: "G7",
        aliases: &["g7", "group of seven", "g 7"],
        members: &["US", "CA", "GB", "DE", "FR", "IT", "JP"],
    },
    Group {
        code: "G20",
        aliases: &["g20", "group of twenty", "g 20"],
        members: &[
            "AR", "AU", "BR", "CA", "CN", "FR", "DE", "IN", "ID", "IT", "JP", "KR", "MX", "RU",
            "SA", "ZA", "TR", "GB", "US",
        ],
    },
    Group {
        code: "EU",
        aliases: &["eu", "european union", "eu27", "eu 27", "eu member states"],
        members: &[
            "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE",
            "IT", "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
        ],
    },
    Group {
        code: "EUROZONE",
        aliases: &["eurozone", "euro area", "euro zone", "ea20", "ea"],
        members: &[
            "AT", "BE", "HR", "CY", "EE", "FI", "FR", "DE", "GR", "IE", "IT", "LV", "LT", "LU",
            "MT", "NL", "PT", "SK", "SI", "ES",
        ],
    },
    Group {
        code: "BRICS",
        aliases: &["brics", "brics countries"],
        members: &["BR", "RU", "IN", "CN", "ZA", "EG", "ET", "IR", "AE"],
    },
    Group {
        code: "ASEAN",
        aliases: &["asean", "southeast asia", "south east asia"],
        members: &["BN", "KH", "ID", "LA", "MY", "MM", "PH", "SG", "TH", "VN"],
    },
    Group {
        code: "OECD",
        aliases: &["oecd", "oecd countries", "oecd members"],
        members: &[
            "AU", "AT", "BE", "CA", "CL", "CO", "CR", "CZ", "DK", "EE", "FI", "FR", "DE", "GR",
            "HU", "IS", "IE", "IL", "IT", "JP", "KR", "LV", "LT", "LU", "MX", "NL", "NZ", "NO",
            "PL", "PT", "SK", "SI", "ES", "SE", "CH", "TR", "GB", "US",
        ],
    },
    Group {
        code: "NORDIC",
        aliases: &["nordic", "nordics", "nordic countries", "scandinavia"],
        members: &["DK", "FI", "IS", "NO", "SE"],
    },
    Group {
        code: "NORTH_AMERICA",
        aliases: &["north america", "usmca", "nafta"],
        members: &["US", "CA", "MX"],
    },
    Group {
        code: "LATIN_AMERICA",
        aliases: &["latin america", "latam", "south america"],
        members: &["AR", "BR", "CL", "CO", "MX", "PE", "CR"],
    },
    Group {
        code: "SUB_SAHARAN_AFRICA",
        aliases: &["sub saharan africa", "subsaharan africa", "ssa"],
        members: &["ZA", "NG", "KE", "ET", "GH"],
    },
    Group {
        code: "MIDDLE_EAST",
        aliases: &["middle east", "mena", "gulf states"],
        members: &["SA", "AE", "QA", "IR", "IL", "EG"],
    },
];

/// Lowercase, drop dots and apostrophes, turn other punctuation into
/// spaces and collapse whitespace: "U.S." -> "us", "Côte-d'Ivoire" ->
/// "côte divoire".
fn lookup_key(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        match ch {
            '.' | '\'' | '’' => {}
            c if c.is_alphanumeric() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

static COUNTRY_INDEX: Lazy<HashMap<String, &'static Country>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for country in COUNTRIES {
        index.insert(lookup_key(country.iso2), country);
        index.insert(lookup_key(country.iso3), country);
        index.insert(lookup_key(country.name), country);
        for alias in country.aliases {
            index.insert(lookup_key(alias), country);
        }
    }
    index
});

static ISO2_INDEX: Lazy<HashMap<&'static str, &'static Country>> =
    Lazy::new(|| COUNTRIES.iter().map(|c| (c.iso2, c)).collect());

static GROUP_INDEX: Lazy<HashMap<String, &'static Group>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for group in GROUPS {
        index.insert(lookup_key(group.code), group);
        for alias in group.aliases {
            index.insert(lookup_key(alias), group);
        }
    }
    index
});

/// Stateless country/region lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionResolver;

impl RegionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Canonical ISO2 code for a country name or code; unknown input is
    /// returned trimmed and uppercased.
    pub fn normalize(&self, name: &str) -> String {
        match COUNTRY_INDEX.get(&lookup_key(name)) {
            Some(country) => country.iso2.to_string(),
            None => name.trim().to_uppercase(),
        }
    }

    /// Whether `name` resolves to a known country
    pub fn is_known_country(&self, name: &str) -> bool {
        COUNTRY_INDEX.contains_key(&lookup_key(name))
    }

    /// ISO3 code for a country, when known
    pub fn iso3(&self, name: &str) -> Option<&'static str> {
        COUNTRY_INDEX.get(&lookup_key(name)).map(|c| c.iso3)
    }

    /// Canonical group code ("G7", "EUROZONE") for a group name
    pub fn group_code(&self, name: &str) -> Option<&'static str> {
        GROUP_INDEX.get(&lookup_key(name)).map(|g| g.code)
    }

    /// Member codes of a named group, or an empty vector if the group is unknown
    pub fn expand_region(&self, name: &str, format: CodeFormat) -> Vec<String> {
        let Some(group) = GROUP_INDEX.get(&lookup_key(name)) else {
            return Vec::new();
        };
        group
            .members
            .iter()
            .map(|iso2| match format {
                CodeFormat::Iso2 => (*iso2).to_string(),
                CodeFormat::Iso3 => ISO2_INDEX
                    .get(iso2)
                    .map(|c| c.iso3.to_string())
                    .unwrap_or_else(|| (*iso2).to_string()),
            })
            .collect()
    }

    /// Expand a group, or resolve a single country. Unknown input comes back
    /// as a one-element list holding the normalized literal.
    pub fn expand_or_normalize(&self, name: &str, format: CodeFormat) -> Vec<String> {
        let expanded = self.expand_region(name, format);
        if !expanded.is_empty() {
            return expanded;
        }
        let code = self.normalize(name);
        match format {
            CodeFormat::Iso2 => vec![code],
            CodeFormat::Iso3 => vec![self.iso3(&code).map(str::to_string).unwrap_or(code)],
        }
    }

    /// Whether `code` (any accepted spelling) is a member of `region`
    pub fn is_member(&self, code: &str, region: &str) -> bool {
        let Some(group) = GROUP_INDEX.get(&lookup_key(region)) else {
            return false;
        };
        let iso2 = self.normalize(code);
        group.members.contains(&iso2.as_str())
    }
}
