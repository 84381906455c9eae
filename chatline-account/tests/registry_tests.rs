// ABOUTME: Tests for the AccountRegistry and AccountFactory pattern.
// ABOUTME: Validates runtime backend selection and creation from config.

use chatline_account::registry::AccountRegistry;
use chatline_account::{AccountConfig, AccountService};
use serde_json::json;

#[tokio::test]
async fn test_registry_creates_memory_backend() {
    let registry = AccountRegistry::default();
    let account = registry.create("memory", &json!({})).unwrap();
    assert_eq!(account.backend_name(), "memory");
    assert!(!account.is_configured().await.unwrap());
}

#[test]
fn test_registry_lists_available_backends() {
    let registry = AccountRegistry::default();
    assert_eq!(registry.available(), vec!["memory"]);
}

#[test]
fn test_registry_unknown_backend_errors() {
    let registry = AccountRegistry::default();
    match registry.create("deltachat", &json!({})) {
        Err(err) => assert!(err.to_string().contains("Unknown account backend: deltachat")),
        Ok(_) => panic!("Expected error for unknown backend"),
    }
}

#[test]
fn test_registry_invalid_options_error() {
    let registry = AccountRegistry::default();
    let result = registry.create("memory", &json!({ "echo": "yes please" }));
    assert!(result.is_err());
}

#[tokio::test]
async fn test_registry_custom_factory() {
    use chatline_account::backends::memory::MemoryAccount;
    use std::sync::Arc;

    let registry = AccountRegistry::new().register("preconfigured", |_options| {
        Ok(Arc::new(MemoryAccount::new().configured_as("me@example.org")) as Arc<dyn AccountService>)
    });
    let account = registry.create("preconfigured", &json!({})).unwrap();
    assert!(account.is_configured().await.unwrap());
}

#[tokio::test]
async fn test_create_from_config_applies_options() {
    let toml = r#"
type = "memory"
self_addr = "me@example.org"
chats = ["bob@example.org", "carol@example.org"]
"#;
    let config: AccountConfig = toml::from_str(toml).unwrap();
    let account = AccountRegistry::default().create_from_config(&config).unwrap();

    assert_eq!(account.self_contact().await.unwrap().addr, "me@example.org");
    let names: Vec<String> = account
        .get_chats()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["bob@example.org", "carol@example.org"]);
}

#[test]
fn test_memory_backend_rejects_db_path() {
    let config = AccountConfig {
        db_path: Some("/tmp/chatline/account.db".into()),
        ..Default::default()
    };
    match AccountRegistry::default().create_from_config(&config) {
        Err(err) => assert!(err.to_string().contains("db_path"), "{}", err),
        Ok(_) => panic!("memory backend accepted a database path"),
    }
}

#[test]
fn test_registry_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AccountRegistry>();
}
