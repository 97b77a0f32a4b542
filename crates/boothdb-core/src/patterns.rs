//! Learned extraction patterns and their validation events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patterns below this confidence are not eligible for Direct mode.
pub const DIRECT_CONFIDENCE_FLOOR: f64 = 0.3;

/// Weight (in pseudo-observations) of the learned confidence when revising
/// it against observed outcomes.
const PRIOR_WEIGHT: f64 = 2.0;

/// A pattern is only auto-deactivated after this many observations.
const MIN_OBSERVATIONS_FOR_DEACTIVATION: u32 = 3;

/// Fields a pattern can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternField {
    Name,
    Address,
    City,
    State,
    Country,
    MachineModel,
    Cost,
    Hours,
    Description,
}

impl PatternField {
    pub const ALL: [PatternField; 9] = [
        PatternField::Name,
        PatternField::Address,
        PatternField::City,
        PatternField::State,
        PatternField::Country,
        PatternField::MachineModel,
        PatternField::Cost,
        PatternField::Hours,
        PatternField::Description,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternField::Name => "name",
            PatternField::Address => "address",
            PatternField::City => "city",
            PatternField::State => "state",
            PatternField::Country => "country",
            PatternField::MachineModel => "machine_model",
            PatternField::Cost => "cost",
            PatternField::Hours => "hours",
            PatternField::Description => "description",
        }
    }

    /// `name` and `address` are mandatory for a valid record.
    #[must_use]
    pub fn is_required(self) -> bool {
        matches!(self, PatternField::Name | PatternField::Address)
    }
}

impl std::fmt::Display for PatternField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatternField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown pattern field '{s}'"))
    }
}

/// How `selector` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// A CSS selector evaluated inside the container.
    Css,
    /// A `/`-separated tag path from the container, e.g. `div/p`.
    Path,
    /// A regular expression over the container's text; the first capture
    /// group (or the whole match) is the value.
    Regex,
    /// `css :: regex`: the CSS part narrows to an element, the regex
    /// extracts from that element's text.
    Compound,
}

impl PatternType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::Css => "css",
            PatternType::Path => "path",
            PatternType::Regex => "regex",
            PatternType::Compound => "compound",
        }
    }
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "css" => Ok(PatternType::Css),
            "path" => Ok(PatternType::Path),
            "regex" => Ok(PatternType::Regex),
            "compound" => Ok(PatternType::Compound),
            other => Err(format!("unknown pattern type '{other}'")),
        }
    }
}

/// What to read from a matched element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Text,
    /// Read [`LearnedPattern::attribute_name`].
    Attribute,
    Markup,
}

impl ExtractionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::Text => "text",
            ExtractionMethod::Attribute => "attribute",
            ExtractionMethod::Markup => "markup",
        }
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ExtractionMethod::Text),
            "attribute" => Ok(ExtractionMethod::Attribute),
            "markup" => Ok(ExtractionMethod::Markup),
            other => Err(format!("unknown extraction method '{other}'")),
        }
    }
}

/// A reusable extraction rule for one field of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: Uuid,
    pub source_id: Uuid,
    pub field_name: PatternField,
    pub pattern_type: PatternType,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub extraction_method: ExtractionMethod,
    pub attribute_name: Option<String>,
    pub validation_regex: Option<String>,
    pub required: bool,
    pub transform: Option<String>,
    /// Heuristic confidence assigned when the pattern was learned.
    pub base_confidence: f64,
    pub confidence_score: f64,
    pub success_count: u32,
    pub failure_count: u32,
    pub is_active: bool,
    pub learned_at: DateTime<Utc>,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl LearnedPattern {
    /// A fresh, not-yet-validated text pattern.
    #[must_use]
    pub fn new(
        source_id: Uuid,
        field_name: PatternField,
        pattern_type: PatternType,
        selector: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            id: Uuid::new_v4(),
            source_id,
            field_name,
            pattern_type,
            selector: selector.into(),
            fallback_selectors: Vec::new(),
            extraction_method: ExtractionMethod::Text,
            attribute_name: None,
            validation_regex: None,
            required: field_name.is_required(),
            transform: None,
            base_confidence: confidence,
            confidence_score: confidence,
            success_count: 0,
            failure_count: 0,
            is_active: true,
            learned_at: Utc::now(),
            last_validated_at: None,
        }
    }

    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_selectors = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: &str) -> Self {
        self.transform = Some(transform.to_string());
        self
    }

    #[must_use]
    pub fn with_validation(mut self, regex: &str) -> Self {
        self.validation_regex = Some(regex.to_string());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.extraction_method = ExtractionMethod::Attribute;
        self.attribute_name = Some(attribute.to_string());
        self
    }

    /// Active and confident enough to be used by the Direct scraper.
    #[must_use]
    pub fn is_eligible_for_direct(&self) -> bool {
        self.is_active && self.confidence_score >= DIRECT_CONFIDENCE_FLOOR
    }

    /// Revise confidence after one observed application.
    ///
    /// Confidence is the observed success rate smoothed towards
    /// `base_confidence` with a weight of two pseudo-observations, so it
    /// rises with every success and falls with every failure. Patterns that
    /// sink below [`DIRECT_CONFIDENCE_FLOOR`] after enough observations are
    /// deactivated.
    pub fn apply_validation(&mut self, success: bool, at: DateTime<Utc>) {
        if success {
            self.success_count = self.success_count.saturating_add(1);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        self.confidence_score = revised_confidence(
            self.base_confidence,
            self.success_count,
            self.failure_count,
        );
        self.last_validated_at = Some(at);

        let observations = self.success_count.saturating_add(self.failure_count);
        if observations >= MIN_OBSERVATIONS_FOR_DEACTIVATION
            && self.confidence_score < DIRECT_CONFIDENCE_FLOOR
        {
            self.is_active = false;
        }
    }
}

/// Prior-weighted success rate used by every pattern store.
#[must_use]
pub fn revised_confidence(base: f64, successes: u32, failures: u32) -> f64 {
    let total = f64::from(successes) + f64::from(failures);
    ((f64::from(successes) + base * PRIOR_WEIGHT) / (total + PRIOR_WEIGHT)).clamp(0.0, 1.0)
}

/// One application of one pattern, emitted by the Direct scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternValidationEvent {
    pub pattern_id: Uuid,
    pub source_id: Uuid,
    pub field_name: PatternField,
    pub success: bool,
    pub extracted_value: Option<String>,
    /// Which selector fired: 0 for the primary, `n` for the n-th fallback.
    pub selector_index: Option<usize>,
    pub latency_micros: u64,
    pub observed_at: DateTime<Utc>,
}
