use serde::{Deserialize, Serialize};

use crate::codec::DecodeOptions;
use crate::messaging::MESSAGING_CONTRACT_ID;
use crate::transport::{DEFAULT_LINK_NAME, Target};

/// Settings for senders and receivers of the messaging interfaces.
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capability contract the provider implements.
    pub contract_id: String,
    /// Link used to reach the provider.
    pub link_name: String,
    /// Reject records carrying fields this version does not know.
    pub deny_unknown_fields: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_id: MESSAGING_CONTRACT_ID.to_string(),
            link_name: DEFAULT_LINK_NAME.to_string(),
            deny_unknown_fields: false,
        }
    }
}

impl Config {
    pub fn with_link_name(mut self, link_name: impl Into<String>) -> Self {
        self.link_name = link_name.into();
        self
    }

    pub fn with_deny_unknown_fields(mut self, deny: bool) -> Self {
        self.deny_unknown_fields = deny;
        self
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            deny_unknown_fields: self.deny_unknown_fields,
        }
    }

    pub fn provider_target(&self) -> Target {
        Target::provider(self.contract_id.clone(), self.link_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.contract_id, "wasmcloud:messaging");
        assert_eq!(config.link_name, "default");
        assert_eq!(config.decode_options(), DecodeOptions::lenient());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "link_name": "backup", "deny_unknown_fields": true }"#)
                .expect("failed to parse config");
        assert_eq!(config.contract_id, MESSAGING_CONTRACT_ID);
        assert_eq!(config.link_name, "backup");
        assert_eq!(config.decode_options(), DecodeOptions::strict());
        assert_eq!(
            config.provider_target(),
            Target::provider("wasmcloud:messaging", "backup")
        );
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::default()
            .with_link_name("east")
            .with_deny_unknown_fields(true);
        assert_eq!(config.link_name, "east");
        assert!(config.decode_options().deny_unknown_fields);
    }
}
