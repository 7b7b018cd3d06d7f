//! Credential vault flows over file-backed persistence: the master key and
//! credential blobs survive process restarts, and legacy cookie migration
//! behaves the same against a real store as against the in-memory one.

use git_bridge::{Credential, JsonFileStore, KeyValueStore, Vault};
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::open(dir.path().join("store.json")).expect("open store"))
}

#[test]
fn test_credentials_survive_restart() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    {
        let store = open_store(&dir);
        let mut vault = Vault::new(store);
        vault.ensure_encryption()?;
        vault.save("github.com", &Credential::new("octocat", "ghp_secret"))?;
    }

    // A fresh store and vault, as on the next session start
    let store = open_store(&dir);
    let mut vault = Vault::new(store);
    vault.ensure_encryption()?;
    assert_eq!(
        vault.lookup("github.com")?,
        Some(Credential::new("octocat", "ghp_secret"))
    );
    Ok(())
}

#[test]
fn test_reauthentication_overwrites_previous_credential() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir);
    let mut vault = Vault::new(store);
    vault.ensure_encryption()?;

    vault.save("gitlab.com", &Credential::new("dev", "glpat-old"))?;
    vault.save("gitlab.com", &Credential::new("dev", "glpat-new"))?;
    assert_eq!(
        vault.lookup("gitlab.com")?,
        Some(Credential::new("dev", "glpat-new"))
    );

    vault.remove("gitlab.com")?;
    assert_eq!(vault.lookup("gitlab.com")?, None);
    Ok(())
}

#[test]
fn test_legacy_migration_through_file_store() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir);
    let mut vault = Vault::new(store.clone());
    vault.ensure_encryption()?;

    // Seed the old per-provider cookie layout
    store.set("githubUsername", &vault.encrypt("octocat")?)?;
    store.set("githubToken", &vault.encrypt("ghp_migrated")?)?;
    store.set("githubCredentials", "stale-entry")?;

    let recovered = vault.lookup("github.com")?;
    assert_eq!(recovered, Some(Credential::new("octocat", "ghp_migrated")));

    // The migrated entry persists; the legacy ones are gone even after a
    // restart.
    let reopened = open_store(&dir);
    assert!(reopened.get("github.com").is_some());
    assert_eq!(reopened.get("githubUsername"), None);
    assert_eq!(reopened.get("githubToken"), None);
    assert_eq!(reopened.get("githubCredentials"), None);
    Ok(())
}

#[test]
fn test_master_key_loss_invalidates_blobs_without_wedging() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    {
        let store = open_store(&dir);
        let mut vault = Vault::new(store.clone());
        vault.ensure_encryption()?;
        vault.save("github.com", &Credential::new("octocat", "ghp_secret"))?;
        // Simulate a lost master key
        store.remove("gitMasterKey")?;
    }

    let store = open_store(&dir);
    let mut vault = Vault::new(store.clone());
    vault.ensure_encryption()?;

    // The old blob no longer authenticates; lookup cleans it up and the
    // vault keeps working with the regenerated key.
    assert_eq!(vault.lookup("github.com")?, None);
    assert_eq!(store.get("github.com"), None);

    vault.save("github.com", &Credential::new("octocat", "ghp_new"))?;
    assert_eq!(
        vault.lookup("github.com")?,
        Some(Credential::new("octocat", "ghp_new"))
    );
    Ok(())
}
