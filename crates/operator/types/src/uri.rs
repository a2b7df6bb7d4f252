//! Operator URIs
//!
//! An operator is addressed as `plugin/name`, where the plugin part is
//! itself usually scoped (`@org/operators`). Callers may pass a bare name,
//! which resolves into the default namespace, and may append `#method` to
//! address a specific entry point. The method suffix never participates in
//! registry lookup.

use crate::error::{OperatorError, Result};
use serde::{Deserialize, Serialize};

/// Namespace used for bare operator names
pub const DEFAULT_NAMESPACE: &str = "@org/operators";

/// A normalized operator URI
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorUri(String);

impl OperatorUri {
    /// Normalize a raw URI against the default namespace
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_in(raw, DEFAULT_NAMESPACE)
    }

    /// Normalize a raw URI against an explicit namespace
    pub fn parse_in(raw: &str, namespace: &str) -> Result<Self> {
        Ok(Self::resolve_with_method_in(raw, namespace)?.0)
    }

    /// Normalize a raw URI and return any `#method` suffix alongside it
    pub fn resolve_with_method(raw: &str) -> Result<(Self, Option<String>)> {
        Self::resolve_with_method_in(raw, DEFAULT_NAMESPACE)
    }

    /// Normalize against `namespace`, splitting off the `#method` suffix
    pub fn resolve_with_method_in(raw: &str, namespace: &str) -> Result<(Self, Option<String>)> {
        let trimmed = raw.trim();
        let (path, method) = match trimmed.split_once('#') {
            Some((path, method)) => (path, Some(method.to_string()).filter(|m| !m.is_empty())),
            None => (trimmed, None),
        };

        if path.is_empty() || path.ends_with('/') {
            return Err(OperatorError::InvalidUri(raw.to_string()));
        }

        let uri = if path.contains('/') {
            path.to_string()
        } else {
            format!("{}/{}", namespace.trim_end_matches('/'), path)
        };

        Ok((Self(uri), method))
    }

    /// Wrap an already-normalized string without re-resolving it
    pub fn from_normalized(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The plugin portion (everything before the final `/`)
    pub fn plugin(&self) -> &str {
        self.0.rsplit_once('/').map(|(plugin, _)| plugin).unwrap_or("")
    }

    /// The operator name (everything after the final `/`)
    pub fn name(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OperatorUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bare_name_gets_default_namespace() {
        let uri = OperatorUri::parse("noop").unwrap();
        assert_eq!(uri.as_str(), "@org/operators/noop");
        assert_eq!(uri.plugin(), "@org/operators");
        assert_eq!(uri.name(), "noop");
    }

    #[test]
    fn test_qualified_uri_is_kept() {
        let uri = OperatorUri::parse("@acme/tools/export").unwrap();
        assert_eq!(uri.as_str(), "@acme/tools/export");
        assert_eq!(uri.plugin(), "@acme/tools");
    }

    #[test]
    fn test_method_suffix_is_split_off() {
        let (uri, method) = OperatorUri::resolve_with_method("@acme/tools/export#on_change").unwrap();
        assert_eq!(uri.as_str(), "@acme/tools/export");
        assert_eq!(method.as_deref(), Some("on_change"));

        let (bare, method) = OperatorUri::resolve_with_method("noop#").unwrap();
        assert_eq!(bare.as_str(), "@org/operators/noop");
        assert!(method.is_none());
    }

    #[test]
    fn test_custom_namespace() {
        let uri = OperatorUri::parse_in("noop", "@local/plugins/").unwrap();
        assert_eq!(uri.as_str(), "@local/plugins/noop");
    }

    #[test]
    fn test_invalid_uris() {
        assert!(matches!(OperatorUri::parse(""), Err(OperatorError::InvalidUri(_))));
        assert!(OperatorUri::parse("#method").is_err());
        assert!(OperatorUri::parse("@acme/tools/").is_err());
    }

    proptest! {
        #[test]
        fn prop_normalized_uris_have_plugin_and_no_method(name in "[a-z_]{1,16}", method in "[a-z_]{0,8}") {
            let raw = format!("{}#{}", name, method);
            let uri = OperatorUri::parse(&raw).unwrap();
            prop_assert!(uri.as_str().contains('/'));
            prop_assert!(!uri.as_str().contains('#'));
            prop_assert_eq!(uri.name(), name.as_str());
        }
    }
}
