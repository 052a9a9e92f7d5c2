//! Property-based test generators using proptest.
//!
//! Every keyed open pays the SQLCipher KDF cost, so suites using these
//! strategies should run with a small case count (see [`keyed_config`]).

use proptest::prelude::*;
use proptest::test_runner::Config;

/// Proptest configuration for tests that open encrypted stores.
pub fn keyed_config() -> Config {
    Config::with_cases(4)
}

/// Strategy for printable ASCII passphrases, quotes included.
pub fn secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~]{1,32}").expect("Invalid regex")
}

/// Strategy for passphrases drawn from non-control Unicode.
pub fn unicode_secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\PC{1,16}").expect("Invalid regex")
}

/// Strategy for two different passphrases.
pub fn distinct_secrets_strategy() -> impl Strategy<Value = (String, String)> {
    (secret_strategy(), secret_strategy()).prop_filter("Secrets must differ", |(a, b)| a != b)
}

/// Strategy for patient names long enough to be searched for in raw bytes.
pub fn patient_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{3,11} [A-Z][a-z]{3,11}").expect("Invalid regex")
}

/// Strategy for a batch of patient names.
pub fn patient_batch_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(patient_name_strategy(), 1..8)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn secrets_are_usable_keys(secret in secret_strategy()) {
            prop_assert!(!secret.is_empty());
            prop_assert!(!secret.contains('\0'));
        }

        #[test]
        fn unicode_secrets_have_no_nul(secret in unicode_secret_strategy()) {
            prop_assert!(!secret.contains('\0'));
        }

        #[test]
        fn distinct_secrets_differ((a, b) in distinct_secrets_strategy()) {
            prop_assert_ne!(a, b);
        }
    }
}
