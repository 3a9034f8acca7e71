//! Stable textual identifiers for actor implementations.
//!
//! An [`ActorTypeCode`] is derived from the implementation's fully-qualified
//! type name. It is the registration key of an actor kind and determines the
//! names of the generated endpoint types:
//!
//! ```text
//! type name        my_app::bank::Account
//! code             my_app.bank.Account
//! namespace        Fun.my_app.bank
//! interface        Fun.my_app.bank.IAccount
//! adapter          Fun.my_app.bank.Account
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root namespace for all generated endpoint types.
///
/// Keeps generated names out of the way of user types with the same path.
pub const GENERATED_ROOT_NAMESPACE: &str = "Fun";

/// Separators between namespace and nesting segments.
const SEPARATORS: [&str; 3] = ["::", ".", "+"];

/// Identifier of an actor kind.
///
/// Two implementations that resolve to the same code produce the same
/// generated type names; the endpoint compiler reports that as a duplicate
/// definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorTypeCode(String);

impl ActorTypeCode {
    /// Code of a Rust type, from [`std::any::type_name`].
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_type_name(std::any::type_name::<T>())
    }

    /// Code of a declared type name.
    ///
    /// Generic arguments are dropped, so `Cache<u32>` and `Cache<String>`
    /// share a code.
    pub fn from_type_name(name: &str) -> Self {
        Self(segments(name).join("."))
    }

    /// The code as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the generated adapter (last path segment).
    pub fn class_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or_default()
    }

    /// Generated namespace segments, rooted at [`GENERATED_ROOT_NAMESPACE`].
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![GENERATED_ROOT_NAMESPACE.to_string()];
        if let Some((prefix, _)) = self.0.rsplit_once('.') {
            namespaces.extend(prefix.split('.').map(str::to_string));
        }
        namespaces
    }
}

fn segments(name: &str) -> Vec<String> {
    let name = name.split('<').next().unwrap_or(name);

    let mut parts = vec![name];
    for separator in SEPARATORS {
        parts = parts
            .into_iter()
            .flat_map(|part| part.split(separator))
            .collect();
    }

    parts
        .into_iter()
        .map(str::trim)
        // Compiler-generated scopes such as `{{closure}}` carry no name.
        .filter(|part| !part.is_empty() && !part.starts_with("{{"))
        .map(identifier)
        .collect()
}

/// Make `raw` a valid endpoint program identifier.
///
/// Characters outside letters, digits and `_` become `_`; a leading digit
/// gets a `_` prefix.
pub(crate) fn identifier(raw: &str) -> String {
    let mut ident: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !ident.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        ident.insert(0, '_');
    }
    ident
}

impl fmt::Display for ActorTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ActorTypeCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorTypeCode {
    fn from(name: &str) -> Self {
        Self::from_type_name(name)
    }
}
