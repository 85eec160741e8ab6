//! Math Categories
//!
//! The playable topics and the grouped catalog the category picker shows.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::challenge::OperatorSymbol;

/// A playable math topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
#[derive(Default)]
pub enum MathCategory {
    /// Sum of two or more operands
    #[default]
    Addition = 0,
    /// Difference of two operands
    Subtraction = 1,
    /// Product of two operands
    Multiplication = 2,
    /// Exact integer division
    Division = 3,
    /// Multiply then add
    Mixed = 4,
    /// Solve `x + a = b`
    Algebra = 5,
    /// `p% of n`
    Percentages = 6,
    /// `b ^ e`
    Exponents = 7,
}

impl MathCategory {
    /// All playable categories in picker order.
    pub const ALL: [MathCategory; 8] = [
        MathCategory::Addition,
        MathCategory::Subtraction,
        MathCategory::Multiplication,
        MathCategory::Division,
        MathCategory::Mixed,
        MathCategory::Algebra,
        MathCategory::Percentages,
        MathCategory::Exponents,
    ];

    /// URL slug (`addition`, `percentages`, ...).
    pub const fn slug(self) -> &'static str {
        match self {
            MathCategory::Addition => "addition",
            MathCategory::Subtraction => "subtraction",
            MathCategory::Multiplication => "multiplication",
            MathCategory::Division => "division",
            MathCategory::Mixed => "mixed",
            MathCategory::Algebra => "algebra",
            MathCategory::Percentages => "percentages",
            MathCategory::Exponents => "exponents",
        }
    }

    /// Operator symbol challenges of this category carry.
    pub const fn operator(self) -> OperatorSymbol {
        match self {
            MathCategory::Addition => OperatorSymbol::Add,
            MathCategory::Subtraction => OperatorSymbol::Subtract,
            MathCategory::Multiplication => OperatorSymbol::Multiply,
            MathCategory::Division => OperatorSymbol::Divide,
            MathCategory::Mixed => OperatorSymbol::Mixed,
            // x + a = b  =>  x = b - a
            MathCategory::Algebra => OperatorSymbol::Subtract,
            MathCategory::Percentages => OperatorSymbol::Percent,
            MathCategory::Exponents => OperatorSymbol::Power,
        }
    }

    /// Parse a slug, ignoring case and surrounding whitespace.
    pub fn from_slug(slug: &str) -> Result<Self, CategoryError> {
        let normalized = slug.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(CategoryError::Empty);
        }

        if let Some(category) = Self::ALL.iter().find(|c| c.slug() == normalized) {
            return Ok(*category);
        }

        if catalog_entry(&normalized).is_some() {
            Err(CategoryError::NotPlayable(normalized))
        } else {
            Err(CategoryError::Unknown(normalized))
        }
    }
}

impl fmt::Display for MathCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MathCategory {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slug(s)
    }
}

/// Category parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    /// Empty selection.
    #[error("empty category")]
    Empty,
    /// Listed in the catalog but has no built-in generator.
    #[error("category '{0}' is not playable yet")]
    NotPlayable(String),
    /// Not a known slug at all.
    #[error("unknown category '{0}'")]
    Unknown(String),
}

// =============================================================================
// CATALOG
// =============================================================================

/// Picker groups, in display order.
pub const CATEGORY_GROUPS: &[(&str, &[&str])] = &[
    ("Arithmetic", &["addition", "subtraction", "multiplication", "division", "mixed"]),
    ("Advanced Arithmetic", &[
        "fractions", "decimals", "percentages", "ratios", "exponents",
        "square-roots", "order-of-operations", "factorial",
    ]),
    ("Algebra", &[
        "algebra", "linear-equations", "quadratic-equations", "logarithms",
        "polynomial-addition", "polynomial-subtraction", "inequalities",
    ]),
    ("Geometry", &[
        "area-of-squares", "area-of-rectangles", "area-of-triangles", "circumference",
        "pythagorean-theorem", "volume-cube", "volume-sphere", "volume-cylinder",
        "distance-formula", "slope-formula",
    ]),
    ("Trigonometry", &["sine", "cosine", "tangent"]),
    ("Calculus", &["basic-derivatives", "basic-integrals"]),
    ("Discrete Math", &["permutations", "combinations", "set-union", "set-intersection"]),
    ("Number Theory", &["prime-numbers", "factors", "multiples", "roman-numerals"]),
    ("Statistics & Probability", &["mean", "median", "mode", "range", "simple-probability"]),
    ("Practical Math", &[
        "simple-interest", "compound-interest", "discounts", "sales-tax",
        "unit-conversion", "time-calculation",
    ]),
    ("Logic", &["logic-puzzles"]),
];

/// One tile in the category picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Group heading.
    pub group: &'static str,
    /// URL slug.
    pub slug: &'static str,
    /// Human label, e.g. `Area Of Squares`.
    pub label: String,
    /// Playable category, if the built-in generator supports it.
    pub category: Option<MathCategory>,
}

impl CatalogEntry {
    /// Whether selecting this tile can start a session.
    pub fn is_playable(&self) -> bool {
        self.category.is_some()
    }
}

/// Turn a slug into a display label.
pub fn display_label(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The full picker catalog, grouped and ordered.
pub fn catalog() -> Vec<CatalogEntry> {
    CATEGORY_GROUPS
        .iter()
        .flat_map(|(group, slugs)| {
            slugs.iter().map(move |slug| CatalogEntry {
                group: *group,
                slug: *slug,
                label: display_label(slug),
                category: MathCategory::ALL.iter().copied().find(|c| c.slug() == *slug),
            })
        })
        .collect()
}

/// Look up a catalog entry by slug.
pub fn catalog_entry(slug: &str) -> Option<CatalogEntry> {
    catalog().into_iter().find(|entry| entry.slug == slug)
}
