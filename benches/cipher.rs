use criterion::{black_box, criterion_group, criterion_main, Criterion};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use fieldencryption::cipher::FieldOptions;
use fieldencryption::keyset::{
    DataKeyConfig, KeyData, KeyEntry, KeysetConfig, KeyStatus, OutputFormat,
    KEYSET_FORMAT_VERSION,
};
use fieldencryption::{CipherConfig, CipherSpec, FieldCipher, KeySource};

fn data_key(identifier: &str, seed: u8, key_len: usize) -> DataKeyConfig {
    DataKeyConfig {
        identifier: identifier.into(),
        material: KeysetConfig {
            primary_key_id: 1,
            key: vec![KeyEntry {
                key_id: 1,
                status: KeyStatus::Enabled,
                key_data: KeyData {
                    type_tag: "fieldencryption/aes".into(),
                    value: BASE64.encode(vec![seed; key_len]),
                    output_format: OutputFormat::Prefixed,
                },
            }],
            version: KEYSET_FORMAT_VERSION,
        },
    }
}

fn build_cipher() -> FieldCipher {
    CipherConfig {
        key_source: KeySource::Config,
        default_key_identifier: "aead".into(),
        default_cipher: None,
        data_keys: vec![
            data_key("aead", 0xC1, 32),
            data_key("daead", 0xC2, 64),
            data_key("fpe", 0xC3, 32),
        ],
        encrypted_data_keys: vec![],
        kek: None,
        eager_key_resolution: true,
        fpe: None,
    }
    .build_cipher()
    .expect("benchmark configuration must build")
}

fn bench_encipher(c: &mut Criterion) {
    let cipher = build_cipher();
    let payload = vec![0x42u8; 1024];

    let gcm = FieldOptions::new();
    c.bench_function("encipher/aes_gcm/1KiB", |b| {
        b.iter(|| cipher.encipher(black_box(&payload), &gcm).unwrap())
    });

    let siv = FieldOptions::new()
        .with_cipher(CipherSpec::AesSiv)
        .with_key_identifier("daead");
    c.bench_function("encipher/aes_siv/1KiB", |b| {
        b.iter(|| cipher.encipher(black_box(&payload), &siv).unwrap())
    });

    let ff3 = FieldOptions::new()
        .with_cipher(CipherSpec::Ff3)
        .with_key_identifier("fpe");
    c.bench_function("encipher/ff3/16_digits", |b| {
        b.iter(|| {
            cipher
                .encipher_text(black_box("5544600070008000"), &ff3)
                .unwrap()
        })
    });
}

fn bench_decipher(c: &mut Criterion) {
    let cipher = build_cipher();
    let payload = vec![0x42u8; 1024];

    let gcm = FieldOptions::new();
    let gcm_field = cipher.encipher(&payload, &gcm).unwrap();
    c.bench_function("decipher/aes_gcm/1KiB", |b| {
        b.iter(|| cipher.decipher(black_box(&gcm_field), &gcm).unwrap())
    });

    let siv = FieldOptions::new()
        .with_cipher(CipherSpec::AesSiv)
        .with_key_identifier("daead");
    let siv_field = cipher.encipher(&payload, &siv).unwrap();
    c.bench_function("decipher/aes_siv/1KiB", |b| {
        b.iter(|| cipher.decipher(black_box(&siv_field), &siv).unwrap())
    });

    let ff3 = FieldOptions::new()
        .with_cipher(CipherSpec::Ff3)
        .with_key_identifier("fpe");
    let ff3_field = cipher.encipher_text("5544600070008000", &ff3).unwrap();
    c.bench_function("decipher/ff3/16_digits", |b| {
        b.iter(|| cipher.decipher_text(black_box(&ff3_field), &ff3).unwrap())
    });
}

criterion_group!(benches, bench_encipher, bench_decipher);
criterion_main!(benches);
