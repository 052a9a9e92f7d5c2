//! End-to-end scenarios for the vault lifecycle.

use examvault_testkit::prelude::*;

#[test]
fn create_then_open_without_prompt() {
    let store = TempStore::new();
    let (vault, acquirer) = store.vault(Vec::<Option<&str>>::new());

    vault
        .create(&Secret::new(SCENARIO_SECRET), false)
        .unwrap();
    let unit = vault.open_unit_of_work().unwrap();
    unit.close().unwrap();

    assert_eq!(acquirer.prompt_count(), 0);
}

#[test]
fn restart_prompts_and_checks_the_answer() {
    let store = TempStore::new();
    let creator = store.create(SCENARIO_SECRET);
    insert_patient(&creator, PATIENT_NAME);
    drop(creator);

    // A new process: nothing cached.
    let (vault, acquirer) = store.vault([Some(SCENARIO_SECRET)]);
    assert!(!vault.is_unlocked());
    let rows = read_patients(&vault).unwrap();
    assert_eq!(rows, vec![(1, PATIENT_NAME.to_string())]);
    assert_eq!(acquirer.prompt_count(), 1);

    let (wrong, _) = store.vault([Some(WRONG_SECRET)]);
    let result = wrong.open_unit_of_work();
    assert!(matches!(result, Err(VaultError::AuthenticationFailed)));
    assert!(!wrong.is_unlocked());
}

#[test]
fn second_create_reports_already_exists() {
    let store = TempStore::new();
    let (vault, _) = store.vault(Vec::<Option<&str>>::new());

    vault.create(&Secret::new("a"), false).unwrap();
    let before = store.raw_bytes();
    let result = vault.create(&Secret::new("a"), false);

    assert!(matches!(result, Err(VaultError::AlreadyExists { .. })));
    assert_eq!(store.raw_bytes(), before);
}

#[test]
fn migrated_row_is_readable_and_opaque() {
    let store = TempStore::new();
    let legacy = store.sibling("legacy.db");
    LegacyStore::new().patient(PATIENT_NAME).write(&legacy);

    let (vault, _) = store.vault(Vec::<Option<&str>>::new());
    vault
        .migrate_from_plaintext(&legacy, &Secret::new("a"), false)
        .unwrap();
    vault.lock();

    let (reader, _) = store.vault([Some("a")]);
    let rows = read_patients(&reader).unwrap();
    assert_eq!(rows, vec![(1, PATIENT_NAME.to_string())]);
    assert!(!store.raw_contains(PATIENT_NAME));
    assert!(contains_bytes(&read_raw(&legacy), PATIENT_NAME.as_bytes()));
}

#[test]
fn migration_keeps_user_version_and_records_metadata() {
    let store = TempStore::new();
    let legacy = store.sibling("legacy.db");
    LegacyStore::new()
        .patient(PATIENT_NAME)
        .patient("John Roe")
        .user_version(3)
        .write(&legacy);

    let (vault, _) = store.vault(Vec::<Option<&str>>::new());
    let info = vault
        .migrate_from_plaintext(&legacy, &Secret::new(SCENARIO_SECRET), false)
        .unwrap();
    assert_eq!(info.tables, vec!["patients"]);

    let described = vault.describe().unwrap();
    let meta = described.meta.unwrap();
    assert_eq!(meta.format_version, FORMAT_VERSION);
    assert!(meta.migrated_at.is_some());

    let version: i64 = vault
        .with_unit_of_work(|conn| Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(version, 3);
}

#[test]
fn key_file_unlocks_store() {
    let store = TempStore::new();
    store.create(SCENARIO_SECRET);
    let key_file = store.sibling("exam.key");
    std::fs::write(&key_file, format!("{SCENARIO_SECRET}\n")).unwrap();

    let vault = Vault::new(
        store.config(),
        std::sync::Arc::new(TokenFileAcquirer::new(&key_file)),
    )
    .unwrap();
    assert!(vault.verify_integrity().unwrap().is_ok());
}

#[test]
fn missing_key_file_is_a_source_error() {
    let store = TempStore::new();
    store.create(SCENARIO_SECRET);

    let vault = Vault::new(
        store.config(),
        std::sync::Arc::new(TokenFileAcquirer::new(store.sibling("absent.key"))),
    )
    .unwrap();
    let result = vault.open_unit_of_work();
    assert!(matches!(result, Err(VaultError::SecretSource { .. })));
}
