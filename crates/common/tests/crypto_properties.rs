//! Integration tests for the field cipher's public contract

use common::crypto::{self, derive_key, FieldCipher, DECRYPTION_ERROR};
use uuid::Uuid;

const SECRET: &str = "vault secret";

#[tokio::test]
async fn test_round_trip_across_inputs() {
    let salt = Uuid::new_v4().to_string();
    let long = "x".repeat(4096);
    for plain in ["", "0", "1234.56", "naïve café ✓", long.as_str()] {
        let payload = crypto::encrypt(plain, SECRET, &salt).await.unwrap();
        assert!(crypto::is_encrypted(payload.as_str()));
        assert_eq!(crypto::decrypt(payload.as_str(), SECRET, &salt).await, plain);
    }
}

#[tokio::test]
async fn test_independent_derivations_share_key_material() {
    let salt = Uuid::new_v4().to_string();
    let writer: FieldCipher = derive_key(SECRET, &salt).await.unwrap().into();
    let reader: FieldCipher = derive_key(SECRET, &salt).await.unwrap().into();

    let payload = writer.encrypt("ledger entry").unwrap();
    assert_eq!(reader.decrypt(payload.as_str()), "ledger entry");
}

#[tokio::test]
async fn test_same_plaintext_never_repeats() {
    let salt = Uuid::new_v4().to_string();
    let cipher = FieldCipher::derive(SECRET, &salt).await.unwrap();
    let a = cipher.encrypt("42").unwrap();
    let b = cipher.encrypt("42").unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_other_users_cannot_read() {
    let alice = Uuid::new_v4().to_string();
    let bob = Uuid::new_v4().to_string();

    let payload = crypto::encrypt("salary: 90000", SECRET, &alice).await.unwrap();
    assert_eq!(
        crypto::decrypt(payload.as_str(), SECRET, &bob).await,
        DECRYPTION_ERROR
    );
    assert_eq!(
        crypto::decrypt(payload.as_str(), "wrong secret", &alice).await,
        DECRYPTION_ERROR
    );
}

#[test]
fn test_classifier_boundary() {
    assert!(!crypto::is_encrypted(&"A".repeat(39)));
    assert!(crypto::is_encrypted(&"A".repeat(40)));
    assert!(!crypto::is_encrypted(&format!("{} {}", "A".repeat(30), "B".repeat(30))));
    // long alphanumeric plain text is misread as ciphertext
    assert!(crypto::is_encrypted(
        "ThisIsAVeryLongIdentifierWithoutAnySpaces123"
    ));
}
