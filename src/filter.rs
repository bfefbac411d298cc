//! Sample name filtering.
//!
//! Patterns are `*`, an exact name, a `prefix*`, or any of those negated
//! with a leading `!`. A name is accepted when it matches at least one
//! positive pattern and no negated one.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl MeterFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            match pattern.strip_prefix('!') {
                Some(negated) => exclude.push(negated.to_string()),
                None => include.push(pattern.to_string()),
            }
        }
        // Only exclusions given: everything else is wanted.
        if include.is_empty() {
            include.push("*".to_string());
        }
        Self { include, exclude }
    }

    /// Accepts every sample name.
    pub fn all() -> Self {
        Self::new(&["*"])
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.include.iter().any(|p| matches(p, name))
            && !self.exclude.iter().any(|p| covers(p, name))
    }

    /// Whether any of a producer's declared names is accepted.
    pub fn accepts_any(&self, declared: &[&str]) -> bool {
        declared.iter().any(|name| self.accepts(name))
    }
}

impl Default for MeterFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Include side: a family such as `instance:*` matches when any of its
/// members could.
fn matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    if let Some(family) = name.strip_suffix('*') {
        return pattern.starts_with(family);
    }
    pattern == name
}

/// Exclude side: a family is only vetoed when every member is.
fn covers(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match (pattern.strip_suffix('*'), name.strip_suffix('*')) {
        (Some(prefix), Some(family)) => family.starts_with(prefix),
        (Some(prefix), None) => name.starts_with(prefix),
        (None, Some(_)) => false,
        (None, None) => pattern == name,
    }
}
