//! Cardinality bounds.
//!
//! Cardinality constraints appear in two places: MRCM attribute rules
//! ("0..1 within a role group") and constraint-language refinements
//! (`[1..1] { 363698007 = * }`). Both share this representation.

/// Error type for cardinality parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardinalityParseError {
    /// Invalid format - expected "min..max"
    InvalidFormat(String),
    /// Invalid minimum value
    InvalidMin(String),
    /// Invalid maximum value
    InvalidMax(String),
}

impl std::fmt::Display for CardinalityParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(s) => {
                write!(f, "invalid cardinality format: '{}' (expected min..max)", s)
            }
            Self::InvalidMin(s) => write!(f, "invalid cardinality minimum: '{}'", s),
            Self::InvalidMax(s) => write!(f, "invalid cardinality maximum: '{}'", s),
        }
    }
}

impl std::error::Error for CardinalityParseError {}

/// Inclusive cardinality bounds like "0..*", "0..1", "1..1", "1..*".
///
/// # Examples
///
/// ```
/// use termgraph_types::Cardinality;
///
/// // Unbounded cardinality (0..*)
/// let card = Cardinality::parse("0..*").unwrap();
/// assert_eq!(card.min, 0);
/// assert_eq!(card.max, None);
/// assert!(card.allows(100));
///
/// // Exact cardinality (1..1)
/// let card = Cardinality::parse("1..1").unwrap();
/// assert!(!card.allows(0));
/// assert!(card.allows(1));
/// assert!(!card.allows(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cardinality {
    /// Minimum occurrences (inclusive).
    pub min: u32,
    /// Maximum occurrences (inclusive). None means unbounded (*).
    pub max: Option<u32>,
}

impl Cardinality {
    /// Creates a new cardinality with explicit min and max.
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Creates an unbounded cardinality (0..*).
    pub const fn unbounded() -> Self {
        Self { min: 0, max: None }
    }

    /// Creates an optional cardinality (0..1).
    pub const fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Creates a required single cardinality (1..1).
    pub const fn required() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Creates a required unbounded cardinality (1..*).
    pub const fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Parses a cardinality from a string like "0..*", "0..1", "1..1".
    ///
    /// # Examples
    ///
    /// ```
    /// use termgraph_types::Cardinality;
    ///
    /// assert_eq!(Cardinality::parse("0..*").unwrap(), Cardinality::unbounded());
    /// assert_eq!(Cardinality::parse("1..1").unwrap(), Cardinality::required());
    /// ```
    pub fn parse(s: &str) -> Result<Self, CardinalityParseError> {
        let parts: Vec<&str> = s.split("..").collect();
        if parts.len() != 2 {
            return Err(CardinalityParseError::InvalidFormat(s.to_string()));
        }

        let min = parts[0]
            .parse::<u32>()
            .map_err(|_| CardinalityParseError::InvalidMin(parts[0].to_string()))?;

        let max = if parts[1] == "*" {
            None
        } else {
            Some(
                parts[1]
                    .parse::<u32>()
                    .map_err(|_| CardinalityParseError::InvalidMax(parts[1].to_string()))?,
            )
        };

        Ok(Self { min, max })
    }

    /// Returns true if the given count satisfies these bounds.
    pub fn allows(&self, count: u32) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Returns true if this cardinality is unbounded (max = *).
    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    /// Returns true if this cardinality requires at least one occurrence.
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}
