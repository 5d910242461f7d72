//! Property tests for the sealed file format.

use pinvault_core::PinvaultError;
use pinvault_crypto::{sha256_hex, CryptoEngine};
use proptest::prelude::*;
use secrecy::SecretString;

// Low iteration count keeps the KDF from dominating proptest runtime.
fn engine() -> CryptoEngine {
    CryptoEngine::new(1_000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip_any_plaintext(
        data in proptest::collection::vec(any::<u8>(), 1..4096),
        password in "[ -~]{1,32}",
    ) {
        let pw = SecretString::from(password);
        let sealed = engine().encrypt(&data, "blob", &pw).unwrap();
        let opened = engine().decrypt(&sealed.ciphertext, &pw, &sealed.salt).unwrap();

        prop_assert_eq!(&opened, &data);
        prop_assert!(engine().verify_integrity(&opened, &sealed.content_hash));
    }

    #[test]
    fn any_bit_flip_fails_authentication(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let pw = SecretString::from("pw");
        let sealed = engine().encrypt(&data, "blob", &pw).unwrap();

        let mut tampered = sealed.ciphertext.clone();
        let i = pos.index(tampered.len());
        tampered[i] ^= 1 << bit;

        let result = engine().decrypt(&tampered, &pw, &sealed.salt);
        prop_assert!(matches!(result, Err(PinvaultError::DecryptionFailed)));
    }

    #[test]
    fn integrity_rejects_other_plaintext(
        a in proptest::collection::vec(any::<u8>(), 1..256),
        b in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        prop_assume!(a != b);
        prop_assert!(!engine().verify_integrity(&b, &sha256_hex(&a)));
    }
}
