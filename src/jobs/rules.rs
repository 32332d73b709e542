//! Subject pattern table.

use indexmap::{IndexMap, IndexSet};
use regex::{Regex, RegexBuilder};

use super::JobError;

/// One `pattern -> jobs` entry. Patterns always match case-insensitively.
#[derive(Debug, Clone)]
pub struct JobRule {
    pattern: Regex,
    jobs: Vec<String>,
}

impl JobRule {
    pub fn new(pattern: &str, jobs: Vec<String>) -> Result<Self, JobError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| JobError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { pattern, jobs })
    }

    pub fn matches(&self, subject: &str) -> bool {
        self.pattern.is_match(subject)
    }
}

/// Rules loaded once at startup, evaluated in configuration order.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<JobRule>,
}

impl RuleTable {
    /// Compile a configured `pattern -> jobs` table.
    pub fn from_config(table: &IndexMap<String, Vec<String>>) -> Result<Self, JobError> {
        let rules = table
            .iter()
            .map(|(pattern, jobs)| JobRule::new(pattern, jobs.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of the jobs of every rule matching `subject`, first-seen order.
    ///
    /// Empty when nothing matches.
    pub fn matching_jobs(&self, subject: &str) -> IndexSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(subject))
            .flat_map(|rule| rule.jobs.iter().cloned())
            .collect()
    }
}
