//! User-facing filter descriptions ("quick filters") and their translation
//! into [`Filter`] objects.

use serde::Deserialize;

use super::{Filter, InvertFilter, RegexFilter, SubstringFilter, WildcardFilter};
use crate::error::FilterError;

/// How a quick filter's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Substring,
    Wildcard,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuickFilterSettings {
    pub value: String,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default = "default_ignore_case")]
    pub ignore_case: bool,
    /// Keep the lines that do not match.
    #[serde(default)]
    pub inverted: bool,
}

fn default_ignore_case() -> bool {
    true
}

impl QuickFilterSettings {
    pub fn new(value: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            value: value.into(),
            match_type,
            ignore_case: default_ignore_case(),
            inverted: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Build the filter. Malformed expressions are reported here and never
    /// reach a running pipeline.
    pub fn create_filter(&self) -> Result<Box<dyn Filter>, FilterError> {
        if self.value.is_empty() {
            return Err(FilterError::EmptyPattern);
        }
        let filter: Box<dyn Filter> = match self.match_type {
            MatchType::Substring => Box::new(SubstringFilter::new(&self.value, self.ignore_case)),
            MatchType::Wildcard => Box::new(WildcardFilter::new(&self.value, self.ignore_case)?),
            MatchType::Regex => Box::new(RegexFilter::new(&self.value, self.ignore_case)?),
        };
        if self.inverted {
            Ok(Box::new(InvertFilter::new(filter)))
        } else {
            Ok(filter)
        }
    }
}
