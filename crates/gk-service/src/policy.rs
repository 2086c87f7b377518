//! Access policy: which consumers may call which methods.
//!
//! The policy is a JSON object mapping a consumer identity to the list of
//! methods it may invoke:
//!
//! ```json
//! {
//!     "logger":    ["/gatekeeper.Admin/Logging"],
//!     "stat":      ["/gatekeeper.Admin/Statistics"],
//!     "biz_user":  ["/gatekeeper.Biz/Check", "/gatekeeper.Biz/Add"],
//!     "biz_admin": ["/gatekeeper.Biz/*"]
//! }
//! ```
//!
//! Both the requested method and every policy entry are reduced to their last
//! `/`-separated segment before comparison, so `"Check"` and
//! `"/gatekeeper.Biz/Check"` are equivalent entries. The entry `"*"` grants
//! every method. A consumer missing from the policy is denied everything.
//!
//! The policy is parsed once at startup and never mutated afterwards.

use std::collections::HashMap;
use thiserror::Error;

/// Policy entry granting every method.
pub const WILDCARD: &str = "*";

/// Policy document could not be parsed.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Document is not a JSON object of string arrays.
    #[error("Invalid policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable consumer -> permitted methods mapping.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    /// Permitted method names per consumer, already reduced to their last segment.
    grants: HashMap<String, Vec<String>>,
}

impl AccessPolicy {
    /// Parse a policy document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] unless the document is a JSON object
    /// whose values are arrays of strings.
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(document)?;
        Ok(Self::from_grants(raw))
    }

    /// Build a policy from an in-memory mapping.
    pub fn from_grants<I, M>(grants: I) -> Self
    where
        I: IntoIterator<Item = (String, M)>,
        M: IntoIterator<Item = String>,
    {
        let grants = grants
            .into_iter()
            .map(|(consumer, methods)| {
                let methods = methods
                    .into_iter()
                    .map(|m| method_name(&m).to_string())
                    .collect();
                (consumer, methods)
            })
            .collect();

        Self { grants }
    }

    /// Returns true iff `consumer` is known and may call `method`.
    ///
    /// `method` may be a full route (`/gatekeeper.Biz/Check`) or a bare name.
    #[must_use]
    pub fn authorize(&self, consumer: &str, method: &str) -> bool {
        let requested = method_name(method);
        self.grants.get(consumer).is_some_and(|methods| {
            methods
                .iter()
                .any(|permitted| permitted == WILDCARD || permitted == requested)
        })
    }

    /// Returns true if `consumer` is named in the policy.
    #[must_use]
    pub fn contains_consumer(&self, consumer: &str) -> bool {
        self.grants.contains_key(consumer)
    }

    /// Number of consumers named in the policy.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.grants.len()
    }
}

/// Reduce a method path to its last `/`-separated segment.
#[must_use]
pub fn method_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ACL: &str = r#"{
        "logger":    ["/gatekeeper.Admin/Logging"],
        "stat":      ["/gatekeeper.Admin/Statistics"],
        "biz_user":  ["/gatekeeper.Biz/Check", "/gatekeeper.Biz/Add"],
        "biz_admin": ["/gatekeeper.Biz/*"],
        "short":     ["Check"]
    }"#;

    fn policy() -> AccessPolicy {
        AccessPolicy::from_json(ACL).unwrap()
    }

    #[test]
    fn test_method_name_takes_last_segment() {
        assert_eq!(method_name("/gatekeeper.Biz/Check"), "Check");
        assert_eq!(method_name("Check"), "Check");
        assert_eq!(method_name("/gatekeeper.Biz/*"), "*");
        assert_eq!(method_name("trailing/"), "");
    }

    #[test]
    fn test_exact_method_granted() {
        let policy = policy();
        assert!(policy.authorize("biz_user", "/gatekeeper.Biz/Check"));
        assert!(policy.authorize("biz_user", "/gatekeeper.Biz/Add"));
        assert!(!policy.authorize("biz_user", "/gatekeeper.Biz/Test"));
    }

    #[test]
    fn test_wildcard_grants_everything() {
        let policy = policy();
        assert!(policy.authorize("biz_admin", "/gatekeeper.Biz/Test"));
        assert!(policy.authorize("biz_admin", "/gatekeeper.Admin/Logging"));
    }

    #[test]
    fn test_bare_entry_matches_full_route() {
        let policy = policy();
        assert!(policy.authorize("short", "/gatekeeper.Biz/Check"));
        assert!(policy.authorize("short", "Check"));
        assert!(!policy.authorize("short", "/gatekeeper.Biz/Add"));
    }

    #[test]
    fn test_unknown_consumer_denied() {
        let policy = policy();
        assert!(!policy.authorize("nobody", "/gatekeeper.Biz/Check"));
        assert!(!policy.authorize("", "/gatekeeper.Biz/Check"));
    }

    #[test]
    fn test_consumer_with_empty_list_denied() {
        let policy = AccessPolicy::from_json(r#"{"mute": []}"#).unwrap();
        assert!(!policy.authorize("mute", "/gatekeeper.Biz/Check"));
        assert_eq!(policy.consumer_count(), 1);
    }

    #[test]
    fn test_empty_document_denies_all() {
        let policy = AccessPolicy::from_json("{}").unwrap();
        assert_eq!(policy.consumer_count(), 0);
        assert!(!policy.authorize("biz_user", "/gatekeeper.Biz/Check"));
    }

    #[test]
    fn test_scenario_wildcard_allows_check() {
        let policy = AccessPolicy::from_json(r#"{"serviceA": ["*"]}"#).unwrap();
        assert!(policy.authorize("serviceA", "/gatekeeper.Biz/Check"));
    }

    #[test]
    fn test_scenario_add_only_denies_check() {
        let policy = AccessPolicy::from_json(r#"{"serviceA": ["Add"]}"#).unwrap();
        assert!(!policy.authorize("serviceA", "/gatekeeper.Biz/Check"));
    }

    #[test]
    fn test_malformed_documents_rejected() {
        for document in [
            "",
            "not json",
            r#"["logger"]"#,
            r#"{"logger": "/gatekeeper.Admin/Logging"}"#,
            r#"{"logger": [1, 2]}"#,
            r#"{"logger": ["ok"],"#,
        ] {
            let result = AccessPolicy::from_json(document);
            assert!(
                matches!(result, Err(PolicyError::Parse(_))),
                "document should be rejected: {document:?}"
            );
        }
    }

    #[test]
    fn test_authorize_does_not_mutate() {
        let policy = policy();
        let before = policy.consumer_count();
        let _ = policy.authorize("nobody", "/gatekeeper.Biz/Check");
        let _ = policy.authorize("biz_user", "/gatekeeper.Biz/Check");
        assert_eq!(policy.consumer_count(), before);
    }
}
