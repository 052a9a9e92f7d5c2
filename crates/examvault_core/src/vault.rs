//! Vault facade.

use crate::acquire::{PromptRequest, SecretAcquirer};
use crate::cipher::Cipher;
use crate::config::VaultConfig;
use crate::error::VaultResult;
use crate::format::StoreInfo;
use crate::gateway::{Gateway, IntegrityReport, UnitOfWork};
use crate::key_holder::KeyHolder;
use crate::lifecycle::{self, StoreLifecycle};
use crate::secret::Secret;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Ties a store path, the key holder, a secret source and the cipher together.
///
/// `Vault` is the entry point for applications:
///
/// ```rust,ignore
/// use examvault_core::{TerminalAcquirer, Vault, VaultConfig};
/// use std::sync::Arc;
///
/// let vault = Vault::new(VaultConfig::new("exam.db"), Arc::new(TerminalAcquirer::new()))?;
/// vault.create_interactive(false)?;
/// vault.with_unit_of_work(|conn| {
///     conn.execute_batch("CREATE TABLE examinations (id INTEGER PRIMARY KEY, taken_on TEXT)")?;
///     Ok(())
/// })?;
/// vault.lock();
/// ```
///
/// Consumers that need to share the cached secret can build several vaults
/// from one `Arc<KeyHolder>` with [`Vault::with_key_holder`].
pub struct Vault {
    config: VaultConfig,
    cipher: Cipher,
    keys: Arc<KeyHolder>,
    acquirer: Arc<dyn SecretAcquirer>,
    gateway: Gateway,
    lifecycle: StoreLifecycle,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("store_path", &self.config.store_path)
            .field("cipher", &self.cipher)
            .field("unlocked", &self.keys.has_secret())
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Creates a vault with its own key holder.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EncryptionUnavailable`](crate::VaultError::EncryptionUnavailable)
    /// if no encryption backend is linked.
    pub fn new(config: VaultConfig, acquirer: Arc<dyn SecretAcquirer>) -> VaultResult<Self> {
        let keys = match config.idle_timeout {
            Some(timeout) => KeyHolder::with_idle_timeout(timeout),
            None => KeyHolder::new(),
        };
        Self::with_key_holder(config, Arc::new(keys), acquirer)
    }

    /// Creates a vault sharing an existing key holder.
    ///
    /// The holder's own idle timeout applies; `config.idle_timeout` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EncryptionUnavailable`](crate::VaultError::EncryptionUnavailable)
    /// if no encryption backend is linked.
    pub fn with_key_holder(
        config: VaultConfig,
        keys: Arc<KeyHolder>,
        acquirer: Arc<dyn SecretAcquirer>,
    ) -> VaultResult<Self> {
        let cipher = Cipher::detect()?;
        let gateway = Gateway::new(cipher.clone(), &config, Arc::clone(&keys), Arc::clone(&acquirer));
        let lifecycle = StoreLifecycle::new(cipher.clone(), Arc::clone(&keys));
        Ok(Self {
            config,
            cipher,
            keys,
            acquirer,
            gateway,
            lifecycle,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.config.store_path()
    }

    /// Returns the cipher token.
    #[must_use]
    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// Returns the shared key holder.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyHolder> {
        &self.keys
    }

    /// Returns the gateway.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Returns true if a secret is cached.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.keys.has_secret()
    }

    /// Forgets the cached secret. The next unit of work prompts again.
    pub fn lock(&self) {
        self.keys.clear();
        info!(path = %self.path().display(), "vault locked");
    }

    /// See [`Gateway::open_unit_of_work`].
    ///
    /// # Errors
    ///
    /// As for [`Gateway::open_unit_of_work`].
    pub fn open_unit_of_work(&self) -> VaultResult<UnitOfWork<'_>> {
        self.gateway.open_unit_of_work()
    }

    /// See [`Gateway::with_unit_of_work`].
    ///
    /// # Errors
    ///
    /// As for [`Gateway::with_unit_of_work`].
    pub fn with_unit_of_work<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&mut Connection) -> VaultResult<T>,
    {
        self.gateway.with_unit_of_work(f)
    }

    /// See [`Gateway::verify_integrity`].
    ///
    /// # Errors
    ///
    /// As for [`Gateway::verify_integrity`].
    pub fn verify_integrity(&self) -> VaultResult<IntegrityReport> {
        self.gateway.verify_integrity()
    }

    /// See [`Gateway::describe`].
    ///
    /// # Errors
    ///
    /// As for [`Gateway::describe`].
    pub fn describe(&self) -> VaultResult<StoreInfo> {
        self.gateway.describe()
    }

    /// Creates the configured store with `secret`.
    ///
    /// # Errors
    ///
    /// As for [`StoreLifecycle::create`].
    pub fn create(&self, secret: &Secret, overwrite: bool) -> VaultResult<StoreInfo> {
        self.lifecycle.create(self.path(), secret, overwrite)
    }

    /// Creates the configured store with a confirmed secret from the acquirer.
    ///
    /// # Errors
    ///
    /// [`VaultError::AcquisitionCancelled`](crate::VaultError::AcquisitionCancelled)
    /// or [`VaultError::ConfirmationMismatch`](crate::VaultError::ConfirmationMismatch)
    /// from the prompt, otherwise as for [`StoreLifecycle::create`].
    pub fn create_interactive(&self, overwrite: bool) -> VaultResult<StoreInfo> {
        let secret = self.acquire_new_secret()?;
        self.create(&secret, overwrite)
    }

    /// Re-keys the configured store.
    ///
    /// # Errors
    ///
    /// As for [`StoreLifecycle::rekey`].
    pub fn rekey(&self, old: &Secret, new: &Secret) -> VaultResult<()> {
        self.lifecycle.rekey(self.path(), old, new)
    }

    /// Re-keys the configured store, asking for the current secret (unless
    /// cached) and a confirmed new one.
    ///
    /// # Errors
    ///
    /// As for [`rekey`](Self::rekey), plus prompt cancellation or mismatch.
    pub fn rekey_interactive(&self) -> VaultResult<()> {
        let old = match self.keys.get() {
            Some(secret) => secret,
            None => self
                .acquirer
                .acquire(&PromptRequest::unlock(self.config.unlock_prompt.clone()))?
                .into_secret()?,
        };
        let new = self.acquire_new_secret()?;
        self.rekey(&old, &new)
    }

    /// Migrates a plaintext database at `source` into the configured store.
    ///
    /// # Errors
    ///
    /// As for [`StoreLifecycle::migrate_from_plaintext`].
    pub fn migrate_from_plaintext(
        &self,
        source: &Path,
        secret: &Secret,
        overwrite: bool,
    ) -> VaultResult<StoreInfo> {
        self.lifecycle
            .migrate_from_plaintext(source, self.path(), secret, overwrite)
    }

    /// Migrates `source` into the configured store under a confirmed secret
    /// from the acquirer.
    ///
    /// # Errors
    ///
    /// As for [`migrate_from_plaintext`](Self::migrate_from_plaintext), plus
    /// prompt cancellation or mismatch.
    pub fn migrate_interactive(&self, source: &Path, overwrite: bool) -> VaultResult<StoreInfo> {
        let secret = self.acquire_new_secret()?;
        self.migrate_from_plaintext(source, &secret, overwrite)
    }

    /// Reports whether the configured store file is encrypted.
    ///
    /// # Errors
    ///
    /// As for [`lifecycle::is_encrypted`].
    pub fn is_encrypted(&self) -> VaultResult<bool> {
        lifecycle::is_encrypted(self.path())
    }

    fn acquire_new_secret(&self) -> VaultResult<Secret> {
        let request = PromptRequest::confirm(self.config.create_prompt.clone());
        let secret = self.acquirer.acquire(&request)?.into_secret()?;
        secret.validate()?;
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::ScriptedAcquirer;
    use crate::error::VaultError;

    #[cfg(not(feature = "encryption"))]
    #[test]
    fn refuses_to_build_without_backend() {
        let acquirer = Arc::new(ScriptedAcquirer::new([Some("alpha-9!")]));
        let result = Vault::new(VaultConfig::new("exam.db"), acquirer.clone());
        assert!(matches!(result, Err(VaultError::EncryptionUnavailable { .. })));
        assert_eq!(acquirer.prompt_count(), 0);
        assert!(!Path::new("exam.db").exists());
    }

    #[cfg(feature = "encryption")]
    mod encrypted {
        use super::*;
        use tempfile::{tempdir, TempDir};

        fn vault(entries: &[Option<&str>]) -> (TempDir, Vault, Arc<ScriptedAcquirer>) {
            let dir = tempdir().unwrap();
            let acquirer = Arc::new(ScriptedAcquirer::new(entries.iter().copied()));
            let vault = Vault::new(VaultConfig::new(dir.path().join("exam.db")), acquirer.clone())
                .unwrap();
            (dir, vault, acquirer)
        }

        #[test]
        fn interactive_create_confirms_then_opens_without_prompt() {
            let (_dir, vault, acquirer) = vault(&[Some("alpha-9!"), Some("alpha-9!")]);
            vault.create_interactive(false).unwrap();
            assert!(vault.is_unlocked());
            assert!(vault.is_encrypted().unwrap());

            vault.open_unit_of_work().unwrap();
            assert_eq!(acquirer.prompt_count(), 2);
        }

        #[test]
        fn mismatched_confirmation_creates_nothing() {
            let (_dir, vault, _) = vault(&[Some("alpha-9!"), Some("alpha-9?")]);
            let result = vault.create_interactive(false);
            assert!(matches!(result, Err(VaultError::ConfirmationMismatch)));
            assert!(!vault.path().exists());
        }

        #[test]
        fn lock_forces_a_new_prompt() {
            let (_dir, vault, acquirer) = vault(&[Some("alpha-9!")]);
            vault.create(&Secret::new("alpha-9!"), false).unwrap();
            vault.lock();
            assert!(!vault.is_unlocked());

            vault.open_unit_of_work().unwrap();
            assert_eq!(acquirer.prompt_count(), 1);
        }

        #[test]
        fn interactive_rekey_uses_cached_old_secret() {
            let (_dir, vault, acquirer) = vault(&[Some("beta-7?"), Some("beta-7?")]);
            vault.create(&Secret::new("alpha-9!"), false).unwrap();

            vault.rekey_interactive().unwrap();
            assert_eq!(acquirer.prompt_count(), 2);
            assert_eq!(vault.keys().get().unwrap().expose(), "beta-7?");
        }

        #[test]
        fn interactive_rekey_prompts_for_old_secret_when_locked() {
            let (_dir, vault, acquirer) =
                vault(&[Some("alpha-9!"), Some("beta-7?"), Some("beta-7?")]);
            vault.create(&Secret::new("alpha-9!"), false).unwrap();
            vault.lock();

            vault.rekey_interactive().unwrap();
            assert_eq!(acquirer.prompt_count(), 3);
            vault.lock();
            let result = vault.open_unit_of_work();
            // Script is exhausted: the point is that nothing was cached.
            assert!(matches!(result, Err(VaultError::SecretSource { .. })));
        }

        #[test]
        fn shared_key_holder_spans_vaults() {
            let dir = tempdir().unwrap();
            let keys = Arc::new(KeyHolder::new());
            let first = Vault::with_key_holder(
                VaultConfig::new(dir.path().join("exam.db")),
                Arc::clone(&keys),
                Arc::new(ScriptedAcquirer::empty()),
            )
            .unwrap();
            let second = Vault::with_key_holder(
                VaultConfig::new(dir.path().join("exam.db")),
                Arc::clone(&keys),
                Arc::new(ScriptedAcquirer::empty()),
            )
            .unwrap();

            first.create(&Secret::new("alpha-9!"), false).unwrap();
            second.open_unit_of_work().unwrap();
        }
    }
}
