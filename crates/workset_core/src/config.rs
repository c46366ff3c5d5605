//! Session configuration.

use crate::relation::Mode;

/// Configuration for a [`Session`](crate::session::Session).
///
/// Built with defaults and customized through the `with_*` methods:
///
/// ```
/// use workset_core::{Mode, SessionConfig};
///
/// let config = SessionConfig::new()
///     .with_default_actor("importer")
///     .with_relation_mode(Mode::Manual);
/// assert_eq!(config.default_actor(), "importer");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    default_actor: String,
    relation_mode: Mode,
    key_length_suffix: String,
    element_length_suffix: String,
    plural_rewrite: Option<(String, String)>,
}

impl SessionConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_actor: "UNKNOWN".to_string(),
            relation_mode: Mode::Auto,
            key_length_suffix: ".index".to_string(),
            element_length_suffix: ".element".to_string(),
            plural_rewrite: Some(("property".to_string(), "properties".to_string())),
        }
    }

    /// Sets the actor stamped on objects when no explicit actor is given.
    #[must_use]
    pub fn with_default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }

    /// Sets the session-wide relationship management mode.
    ///
    /// [`Mode::Manual`] suppresses automatic inverse-side maintenance for
    /// every relationship touched through this session, regardless of how
    /// the individual links are declared.
    #[must_use]
    pub fn with_relation_mode(mut self, mode: Mode) -> Self {
        self.relation_mode = mode;
        self
    }

    /// Sets the suffix appended to a property name when looking up the
    /// length limit for keys of a keyed collection.
    #[must_use]
    pub fn with_key_length_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_length_suffix = suffix.into();
        self
    }

    /// Sets the suffix appended to a property name when looking up the
    /// length limit for elements of a keyed collection.
    #[must_use]
    pub fn with_element_length_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.element_length_suffix = suffix.into();
        self
    }

    /// Sets the singular/plural rewrite applied to keyed-collection property
    /// names before length lookup, or disables it with `None`.
    #[must_use]
    pub fn with_plural_rewrite(mut self, rewrite: Option<(String, String)>) -> Self {
        self.plural_rewrite = rewrite;
        self
    }

    /// Returns the default actor name.
    #[must_use]
    pub fn default_actor(&self) -> &str {
        &self.default_actor
    }

    /// Returns the session-wide relationship management mode.
    #[must_use]
    pub fn relation_mode(&self) -> Mode {
        self.relation_mode
    }

    /// Returns the length-lookup property name for keys of a keyed
    /// collection property, applying the plural rewrite when configured.
    #[must_use]
    pub fn key_length_property(&self, property: &str) -> String {
        format!("{}{}", self.rewritten(property), self.key_length_suffix)
    }

    /// Returns the length-lookup property name for elements of a keyed
    /// collection property, applying the plural rewrite when configured.
    #[must_use]
    pub fn element_length_property(&self, property: &str) -> String {
        format!("{}{}", self.rewritten(property), self.element_length_suffix)
    }

    fn rewritten(&self, property: &str) -> String {
        match &self.plural_rewrite {
            Some((from, to)) if property.ends_with(to.as_str()) => {
                let stem = &property[..property.len() - to.len()];
                format!("{stem}{from}")
            }
            _ => property.to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
