//! gpg encryption round-trips. Skipped when gpg is not installed.

mod support;

use homestack::core::backup::crypto::{decrypt_file, encrypt_file, Passphrase};
use homestack::core::context::Context;
use support::Test;

fn ctx_with_password(t: &Test, password: &str) -> Context {
    t.write_dotenv(&format!("BACKUP_PASSWORD={password}\n"));
    Context::at(t.project.path().to_path_buf(), t.base.path().to_path_buf()).unwrap()
}

#[test]
fn encrypt_then_decrypt_restores_content() {
    skip_without_tool!("gpg");
    let t = Test::new();
    let ctx = ctx_with_password(&t, "correct horse battery staple");
    let pass = Passphrase::from_context(&ctx).unwrap();

    let plain = t.project.path().join("payload.bin");
    let content: Vec<u8> = (0..4096u32).flat_map(|i| i.to_le_bytes()).collect();
    std::fs::write(&plain, &content).unwrap();

    let encrypted = t.project.path().join("payload.gpg");
    encrypt_file(&plain, &encrypted, &pass).unwrap();
    assert!(encrypted.exists());
    assert_ne!(std::fs::read(&encrypted).unwrap(), content);

    let decrypted = t.project.path().join("payload.out");
    decrypt_file(&encrypted, &decrypted, &pass).unwrap();
    assert_eq!(std::fs::read(&decrypted).unwrap(), content);
}

#[test]
fn wrong_passphrase_fails_decryption() {
    skip_without_tool!("gpg");
    let t = Test::new();
    let ctx = ctx_with_password(&t, "right-password");
    let pass = Passphrase::from_context(&ctx).unwrap();

    let plain = t.project.path().join("secret.txt");
    std::fs::write(&plain, b"confidential").unwrap();
    let encrypted = t.project.path().join("secret.gpg");
    encrypt_file(&plain, &encrypted, &pass).unwrap();

    let t2 = Test::new();
    let wrong_ctx = ctx_with_password(&t2, "wrong-password");
    let wrong = Passphrase::from_context(&wrong_ctx).unwrap();

    let out = t.project.path().join("secret.out");
    assert!(decrypt_file(&encrypted, &out, &wrong).is_err());
}

#[test]
fn missing_passphrase_is_an_error() {
    let t = Test::new();
    if std::env::var("BACKUP_PASSWORD").is_ok() {
        return;
    }
    let ctx = Context::at(t.project.path().to_path_buf(), t.base.path().to_path_buf()).unwrap();
    assert!(Passphrase::from_context(&ctx).is_err());
}

#[test]
fn empty_passphrase_counts_as_missing() {
    let t = Test::new();
    if std::env::var("BACKUP_PASSWORD").is_ok() {
        return;
    }
    let ctx = ctx_with_password(&t, "");
    assert!(Passphrase::from_context(&ctx).is_err());
}
