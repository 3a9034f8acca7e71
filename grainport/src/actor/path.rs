//! Actor paths: actor type code plus instance id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::declaration::ActorTypeCode;
use crate::error::PathError;

/// Address of one actor instance.
///
/// # String Format
///
/// `code:id`, e.g. `bank.Account:alice`. The code never contains `:`; the id
/// may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorPath {
    code: ActorTypeCode,
    id: String,
}

impl ActorPath {
    /// Create a path from its parts.
    pub fn new(code: ActorTypeCode, id: impl Into<String>) -> Self {
        Self {
            code,
            id: id.into(),
        }
    }

    /// Actor type code.
    pub fn code(&self) -> &ActorTypeCode {
        &self.code
    }

    /// Instance id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `code:id` identity string hosts key activations by.
    pub fn identity(&self) -> String {
        self.to_string()
    }

    /// Parse an identity string produced by [`identity`](Self::identity).
    pub fn parse(identity: &str) -> Result<Self, PathError> {
        let (code, id) = identity.split_once(':').ok_or(PathError::InvalidFormat)?;

        if code.is_empty() {
            return Err(PathError::EmptyField("code"));
        }
        if id.is_empty() {
            return Err(PathError::EmptyField("id"));
        }

        Ok(Self {
            code: ActorTypeCode::from_type_name(code),
            id: id.to_string(),
        })
    }
}

impl fmt::Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_round_trip() {
        let path = ActorPath::new(ActorTypeCode::from("Foo.A"), "alice");
        assert_eq!(path.identity(), "Foo.A:alice");

        let parsed = ActorPath::parse("Foo.A:alice").expect("parse");
        assert_eq!(parsed, path);
    }

    #[test]
    fn test_id_may_contain_separator() {
        let parsed = ActorPath::parse("Foo.A:tenant:42").expect("parse");
        assert_eq!(parsed.code().as_str(), "Foo.A");
        assert_eq!(parsed.id(), "tenant:42");
    }

    #[test]
    fn test_invalid_paths() {
        assert_eq!(ActorPath::parse("Foo.A"), Err(PathError::InvalidFormat));
        assert_eq!(ActorPath::parse(":alice"), Err(PathError::EmptyField("code")));
        assert_eq!(ActorPath::parse("Foo.A:"), Err(PathError::EmptyField("id")));
    }
}
