//! The fixed set of tracked data categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One tracked data field researched for every entity.
///
/// Categories are independent of each other: each one gets its own search,
/// its own corpus and its own aggregation, and only the coordinator joins
/// them back together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Yearly net revenue
    Revenue,
    /// Number of medical specialties
    Specialties,
    /// Number of doctors on staff
    Doctors,
    /// Chief executive
    Ceo,
    /// Official website
    Website,
    /// Management team members
    Management,
    /// Accepted insurance providers
    Insurance,
    /// Contact phone number
    Phone,
    /// Location within the UAE
    Location,
}

/// Error returned when parsing an unrecognized category name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Every category, in record order
    pub const ALL: [Category; 9] = [
        Category::Revenue,
        Category::Specialties,
        Category::Doctors,
        Category::Ceo,
        Category::Website,
        Category::Management,
        Category::Insurance,
        Category::Phone,
        Category::Location,
    ];

    /// Lowercase key used for corpus buckets and logs
    pub fn key(&self) -> &'static str {
        match self {
            Category::Revenue => "revenue",
            Category::Specialties => "specialties",
            Category::Doctors => "doctors",
            Category::Ceo => "ceo",
            Category::Website => "website",
            Category::Management => "management",
            Category::Insurance => "insurance",
            Category::Phone => "phone",
            Category::Location => "location",
        }
    }

    /// Human-facing field name used as the `EntityRecord` key
    pub fn field_name(&self) -> &'static str {
        match self {
            Category::Revenue => "NETREVENUEYEARLY",
            Category::Specialties => "NO_OF_SPECIALTIES",
            Category::Doctors => "NOOFDOCTORS",
            Category::Ceo => "CEO",
            Category::Website => "WEBSITE",
            Category::Management => "MANAGEMENT_TEAM",
            Category::Insurance => "INSURANCE",
            Category::Phone => "PHONE",
            Category::Location => "UAE_LOCATION",
        }
    }

    /// Canonical web search query for this category
    pub fn search_query(&self, entity: &str) -> String {
        match self {
            Category::Revenue => format!("{} yearly revenue financial report UAE", entity),
            Category::Specialties => {
                format!("{} medical specialties departments services UAE", entity)
            }
            Category::Doctors => format!("{} number of doctors physicians staff UAE", entity),
            Category::Ceo => format!("{} CEO director management leadership UAE", entity),
            Category::Website => format!("{} official website URL UAE", entity),
            Category::Management => {
                format!("{} management team directors board executives UAE", entity)
            }
            Category::Insurance => {
                format!("{} insurance accepted coverage providers UAE", entity)
            }
            Category::Phone => format!("{} contact phone number UAE", entity),
            Category::Location => format!("{} UAE hospital", entity),
        }
    }

    /// Role and goal handed to the extraction model
    pub fn persona(&self) -> (&'static str, &'static str) {
        match self {
            Category::Revenue => (
                "Revenue Data Extractor",
                "Extract all yearly net revenue figures from multiple sources and identify the most common value",
            ),
            Category::Specialties => (
                "Medical Specialties Counter",
                "Extract all numbers of medical specialties from multiple sources and identify the most common count",
            ),
            Category::Doctors => (
                "Physician Count Extractor",
                "Extract all numbers of doctors from multiple sources and identify the most common count",
            ),
            Category::Ceo => (
                "CEO Information Extractor",
                "Extract all CEO information from multiple sources and identify the most commonly mentioned name",
            ),
            Category::Website => (
                "Website URL Extractor",
                "Extract all website URLs from multiple sources and identify the most commonly mentioned URL",
            ),
            Category::Management => (
                "Management Team Extractor",
                "Extract all management team details from multiple sources and identify the most commonly mentioned members",
            ),
            Category::Insurance => (
                "Insurance Information Extractor",
                "Extract all insurance information from multiple sources and identify the most commonly accepted plans",
            ),
            Category::Phone => (
                "Phone Number Extractor",
                "Extract all hospital phone numbers from multiple sources and identify the most commonly listed number",
            ),
            Category::Location => (
                "UAE Location Specialist",
                "Extract all location details within the UAE from multiple sources and identify the most commonly mentioned address",
            ),
        }
    }

    /// What to extract, phrased for the extraction prompt headline
    pub fn subject(&self) -> &'static str {
        match self {
            Category::Revenue => "yearly net revenue figures",
            Category::Specialties => "numbers of medical specialties",
            Category::Doctors => "numbers of doctors",
            Category::Ceo => "CEO information",
            Category::Website => "website URLs",
            Category::Management => "management team information",
            Category::Insurance => "insurance information",
            Category::Phone => "phone numbers",
            Category::Location => "UAE location information",
        }
    }

    /// Where in a source the model should look
    pub fn hint(&self) -> &'static str {
        match self {
            Category::Revenue => {
                "look for phrases like \"net revenue of $X\", \"annual revenue\", \"yearly revenue\""
            }
            Category::Specialties => {
                "look for statements about number of specialties or lists of specialties"
            }
            Category::Doctors => {
                "look for statements about physician count or \"X physicians on staff\""
            }
            Category::Ceo => "look for names followed by \"CEO\" or \"Chief Executive Officer\"",
            Category::Website => {
                "look for URLs in the format of www.example.com or https://example.com"
            }
            Category::Management => {
                "look for executive leadership listings and management team sections"
            }
            Category::Insurance => {
                "look for lists of accepted insurance and insurance provider names"
            }
            Category::Phone => {
                "look for phone numbers in any format and contact information sections"
            }
            Category::Location => {
                "look for specific emirate names, districts, areas, neighborhoods, and specific addresses"
            }
        }
    }

    /// Two illustrative values shown in the response format example
    pub fn example_values(&self) -> [&'static str; 2] {
        match self {
            Category::Revenue => ["$X million/billion (YYYY)", "$Y million/billion (YYYY)"],
            Category::Specialties => ["42", "45"],
            Category::Doctors => ["157", "160"],
            Category::Ceo => ["Jane Smith, Chief Executive Officer", "John Smith, CEO"],
            Category::Website => ["https://www.hospitalabc.org", "https://hospitalabc.org"],
            Category::Management => [
                "John Doe, CFO; Jane Smith, COO; Mark Johnson, CMO",
                "John Doe, CFO; Sarah Williams, COO",
            ],
            Category::Insurance => [
                "Blue Cross Blue Shield, Aetna, Cigna, Medicare",
                "Aetna, Cigna, United Healthcare",
            ],
            Category::Phone => ["+971 4 377 6666", "+971 4 377 7777"],
            Category::Location => [
                "Emirate: Dubai, Area: Healthcare City, Location: Building 37, Al Razi Street",
                "Dubai Healthcare City, Phase 2",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts either the lowercase key or the record field name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| {
                c.key().eq_ignore_ascii_case(trimmed) || c.field_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
