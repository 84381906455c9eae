// ABOUTME: Account section of the configuration file.
// ABOUTME: Backend type discriminator, login credentials, and backend-specific keys.

use serde::{Deserialize, Serialize};

/// `[account]` configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Backend type: "memory", ...
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,

    /// E-mail address used to configure the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_pw: Option<String>,

    /// Location of the account database, for backends that persist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// Remaining fields passed to the backend factory
    #[serde(flatten)]
    pub options: toml::Table,
}

// Custom Debug impl to redact the password
impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("backend_type", &self.backend_type)
            .field("addr", &self.addr)
            .field("mail_pw", &self.mail_pw.as_ref().map(|_| "[REDACTED]"))
            .field("db_path", &self.db_path)
            .field("options", &self.options)
            .finish()
    }
}

fn default_backend_type() -> String {
    "memory".to_string()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            addr: None,
            mail_pw: None,
            db_path: None,
            options: toml::Table::new(),
        }
    }
}

impl AccountConfig {
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Backend factory input: the backend-specific keys plus `db_path` when set
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.options)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        if let (Some(db_path), Some(map)) = (&self.db_path, value.as_object_mut()) {
            map.insert("db_path".to_string(), db_path.clone().into());
        }
        value
    }
}
