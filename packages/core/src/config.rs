//! Runtime Configuration
//!
//! Configuration for the organization service. Values come from the
//! environment when present and fall back to defaults suitable for tests
//! and embedded use.

/// Environment variable controlling the minimum organization name length.
pub const MIN_NAME_LEN_ENV: &str = "ORGSPACE_MIN_NAME_LEN";

/// Environment variable holding the comma-separated public user field list.
pub const PUBLIC_USER_FIELDS_ENV: &str = "ORGSPACE_PUBLIC_USER_FIELDS";

/// Service configuration.
///
/// `min_name_length` gates organization names at create/update time.
/// `public_user_fields` is the projection applied when member documents from
/// the host account table are exposed to read channels - only these profile
/// fields ever leave the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgConfig {
    /// Minimum number of characters an organization name must have
    pub min_name_length: usize,

    /// Profile fields projected by members-of-organization reads
    pub public_user_fields: Vec<String>,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            min_name_length: 1,
            public_user_fields: vec!["username".to_string(), "profile".to_string()],
        }
    }
}

impl OrgConfig {
    /// Build configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let min_name_length = std::env::var(MIN_NAME_LEN_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.min_name_length);

        let public_user_fields = std::env::var(PUBLIC_USER_FIELDS_ENV)
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.public_user_fields);

        Self {
            min_name_length,
            public_user_fields,
        }
    }
}
