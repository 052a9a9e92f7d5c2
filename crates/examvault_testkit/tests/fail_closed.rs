//! The store is never opened or written without a verified key.

use examvault_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn backend_is_linked_in_default_build() {
    let cipher = Cipher::detect().unwrap();
    assert!(!cipher.version().is_empty());
}

#[test]
fn plaintext_file_is_never_opened() {
    let store = TempStore::new();
    LegacyStore::new().patient(PATIENT_NAME).write(store.path());
    let before = store.raw_bytes();

    let (vault, acquirer) = store.vault([Some(SCENARIO_SECRET)]);
    let result = vault.open_unit_of_work();

    assert!(matches!(result, Err(VaultError::PlaintextStore { .. })));
    assert_eq!(acquirer.prompt_count(), 0);
    assert_eq!(store.raw_bytes(), before);
    assert!(!vault.is_encrypted().unwrap());
}

#[test]
fn empty_file_counts_as_missing() {
    let store = TempStore::new();
    std::fs::write(store.path(), b"").unwrap();

    let (vault, _) = store.vault([Some(SCENARIO_SECRET)]);
    assert!(matches!(
        vault.open_unit_of_work(),
        Err(VaultError::StoreMissing { .. })
    ));
    assert!(store.raw_bytes().is_empty());
}

#[test]
fn foreign_file_fails_authentication_and_is_untouched() {
    let store = TempStore::new();
    std::fs::write(store.path(), vec![0x42u8; 8192]).unwrap();

    let (vault, _) = store.vault([Some(SCENARIO_SECRET)]);
    assert!(matches!(
        vault.open_unit_of_work(),
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(store.raw_bytes(), vec![0x42u8; 8192]);
}

#[test]
fn empty_secret_is_refused() {
    let store = TempStore::new();
    let (vault, _) = store.vault(Vec::<Option<&str>>::new());

    let result = vault.create(&Secret::new(""), false);
    assert!(matches!(result, Err(VaultError::InvalidSecret { .. })));
    assert!(!store.path().exists());
}

#[test]
fn migrating_an_encrypted_store_is_refused() {
    let store = TempStore::new();
    store.create(SCENARIO_SECRET);

    let copy = store.sibling("copy.db");
    let target = Vault::new(VaultConfig::new(&copy), Arc::new(ScriptedAcquirer::empty())).unwrap();

    let result = target.migrate_from_plaintext(store.path(), &Secret::new("a"), false);
    assert!(matches!(result, Err(VaultError::NotPlaintext { .. })));
    assert!(!copy.exists());
}

#[test]
fn lock_contention_is_reported_not_retried() {
    let store = TempStore::new();
    let vault = store.create(SCENARIO_SECRET);

    let holder = vault.open_unit_of_work().unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let started = std::time::Instant::now();
    let result = vault.open_unit_of_work();
    assert!(matches!(result, Err(VaultError::StoreLocked { .. })));
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert!(result.unwrap_err().is_recoverable());

    holder.close().unwrap();
    vault.open_unit_of_work().unwrap();
}
