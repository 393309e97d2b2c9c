//! JWT claim requirements

use std::collections::{BTreeMap, BTreeSet};

use jsonwebtoken::Validation;
use serde_json::{Map, Value};

/// Decoded JWT payload.
pub type Claims = Map<String, Value>;

/// Claims that must be present by default.
pub const DEFAULT_REQUIRED_CLAIMS: [&str; 6] = ["iss", "sub", "aud", "exp", "nbf", "iat"];

/// Which claims a token must carry and which values they must have.
///
/// Presence and the values set with [`with_values`](Self::with_values) are
/// checked here; `iss`/`aud`/`sub` (and `exp`/`nbf` against the clock) are
/// checked by `jsonwebtoken` while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsOptions {
    pub required: BTreeSet<String>,
    pub issuers: Vec<String>,
    pub audiences: Vec<String>,
    pub subject: Option<String>,
    /// Accepted values per claim. Only checked when the claim is present.
    pub values: BTreeMap<String, Vec<Value>>,
}

impl Default for ClaimsOptions {
    fn default() -> Self {
        Self {
            required: DEFAULT_REQUIRED_CLAIMS.iter().map(|c| c.to_string()).collect(),
            issuers: Vec::new(),
            audiences: Vec::new(),
            subject: None,
            values: BTreeMap::new(),
        }
    }
}

impl ClaimsOptions {
    /// No claim required, no value enforced.
    pub fn none() -> Self {
        Self {
            required: BTreeSet::new(),
            ..Self::default()
        }
    }

    pub fn require(mut self, claim: impl Into<String>) -> Self {
        self.required.insert(claim.into());
        self
    }

    pub fn optional(mut self, claim: &str) -> Self {
        self.required.remove(claim);
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuers.push(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Accept `claim` only when it equals one of `values`. Combine with
    /// [`require`](Self::require) to also reject tokens without it.
    pub fn with_values<I, V>(mut self, claim: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values
            .entry(claim.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub(crate) fn apply(&self, validation: &mut Validation) {
        // jsonwebtoken ignores `iat` here, presence is checked by `check`.
        validation.required_spec_claims.clear();

        if self.audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audiences);
        }
        if !self.issuers.is_empty() {
            validation.set_issuer(&self.issuers);
        }
        validation.sub = self.subject.clone();
    }

    pub(crate) fn check(&self, claims: &Claims) -> Result<(), String> {
        if let Some(missing) = self.required.iter().find(|c| !claims.contains_key(c.as_str())) {
            return Err(format!("Missing {missing:?} claim"));
        }
        for (claim, accepted) in &self.values {
            match claims.get(claim) {
                Some(value) if !accepted.contains(value) => {
                    return Err(format!("Invalid {claim:?} claim"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
