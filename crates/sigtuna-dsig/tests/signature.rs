#![forbid(unsafe_code)]

//! End-to-end signing and verification.

use sigtuna_core::{algorithm, Error};
use sigtuna_dsig::{DsigContext, ObjectElement, Reference, SignedInfo, SignedXml};
use sigtuna_keys::{Key, KeyData, KeyInfo, KeyUsage, KeyValue};

fn hmac_key() -> Key {
    Key::new(KeyData::Hmac(b"integration-test-secret".to_vec()), KeyUsage::Any)
}

fn rsa_key() -> Key {
    let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let public = private.to_public_key();
    Key::new(
        KeyData::Rsa {
            private: Some(private),
            public,
        },
        KeyUsage::Any,
    )
}

fn flip_signature_value(xml: &str) -> String {
    let open = "<ds:SignatureValue>";
    let start = xml.find(open).unwrap() + open.len();
    let mut chars: Vec<char> = xml.chars().collect();
    chars[start] = if chars[start] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

#[test]
fn rsa_enveloped_sign_and_verify() {
    let target = r#"<purchase xmlns="urn:shop"><item>book</item></purchase>"#;
    let key = rsa_key();

    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::RSA_SHA256);
    let mut reference = Reference::new(Some(String::new()), algorithm::SHA256);
    reference.add_transform(algorithm::ENVELOPED_SIGNATURE);
    reference.add_transform(algorithm::EXC_C14N);
    si.add_reference(reference);

    let mut signed = SignedXml::new(si);
    let mut key_info = KeyInfo::new();
    key_info.add_key_value(KeyValue::from_key(&key).unwrap());
    signed.set_key_info(key_info);

    let ctx = DsigContext::new();
    let doc = signed.sign_enveloped(&ctx, &key, target).unwrap();
    let xml = doc.to_xml_string();
    assert!(xml.contains("SignatureValue"));
    assert!(xml.contains("RSAKeyValue"));

    // Verify with the key resolved from KeyInfo.
    let loaded = SignedXml::load(&xml).unwrap();
    loaded.verify(&ctx, None).unwrap();

    // Tampering with signed content breaks the reference digest.
    let tampered = xml.replace("book", "bomb");
    let loaded = SignedXml::load(&tampered).unwrap();
    assert!(matches!(
        loaded.verify(&ctx, None),
        Err(Error::DigestMismatch(_))
    ));

    // A corrupted signature value fails regardless of digest outcomes.
    let corrupted = flip_signature_value(&xml);
    let loaded = SignedXml::load(&corrupted).unwrap();
    assert!(matches!(
        loaded.verify(&ctx, None),
        Err(Error::SignatureInvalid(_))
    ));

    // A corrupted DigestValue is reported as a digest failure for that
    // reference, before the signature value is considered.
    let open = "<ds:DigestValue>";
    let start = xml.find(open).unwrap() + open.len();
    let mut chars: Vec<char> = xml.chars().collect();
    chars[start] = if chars[start] == 'A' { 'B' } else { 'A' };
    let corrupted_digest: String = chars.into_iter().collect();
    let loaded = SignedXml::load(&corrupted_digest).unwrap();
    assert!(matches!(
        loaded.verify(&ctx, None),
        Err(Error::DigestMismatch(_))
    ));
}

#[test]
fn ecdsa_enveloping_sign_and_verify() {
    let private = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
    let public = *private.verifying_key();
    let key = Key::new(
        KeyData::EcP256 {
            private: Some(private),
            public,
        },
        KeyUsage::Any,
    );

    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::ECDSA_SHA256);
    si.add_reference(Reference::new(Some("#payload".into()), algorithm::SHA256));

    let mut signed = SignedXml::new(si);
    signed.add_object(ObjectElement::text(Some("payload".into()), "order 1234"));
    let mut key_info = KeyInfo::new();
    key_info.add_key_value(KeyValue::from_key(&key).unwrap());
    signed.set_key_info(key_info);

    let ctx = DsigContext::new();
    let xml = signed.sign(&ctx, &key).unwrap().to_xml_string();
    assert!(xml.contains("ECKeyValue"));

    let loaded = SignedXml::load(&xml).unwrap();
    loaded.verify(&ctx, None).unwrap();
}

#[test]
fn detached_signature_over_external_data() {
    let path = std::env::temp_dir().join("sigtuna-detached-payload.bin");
    std::fs::write(&path, b"detached payload").unwrap();

    let mut ctx = DsigContext::new();
    ctx.add_url_map("urn:example:payload", &path);

    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::HMAC_SHA256);
    si.add_reference(Reference::new(
        Some("urn:example:payload".into()),
        algorithm::SHA256,
    ));

    let mut signed = SignedXml::new(si);
    let key = hmac_key();
    let xml = signed.sign(&ctx, &key).unwrap().to_xml_string();

    let loaded = SignedXml::load(&xml).unwrap();
    loaded.verify(&ctx, Some(&key)).unwrap();

    // Modifying the external data is detected on the next verification.
    std::fs::write(&path, b"replaced payload").unwrap();
    assert!(matches!(
        loaded.verify(&ctx, Some(&key)),
        Err(Error::DigestMismatch(_))
    ));

    std::fs::remove_file(&path).ok();
}

#[test]
fn signature_wrapping_is_rejected() {
    let target = r#"<doc><data Id="d">genuine</data></doc>"#;
    let key = hmac_key();

    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::HMAC_SHA256);
    si.add_reference(Reference::new(Some("#d".into()), algorithm::SHA256));

    let mut signed = SignedXml::new(si);
    let ctx = DsigContext::new();
    let xml = signed
        .sign_enveloped(&ctx, &key, target)
        .unwrap()
        .to_xml_string();

    let loaded = SignedXml::load(&xml).unwrap();
    loaded.verify(&ctx, Some(&key)).unwrap();

    // Move the signed Id onto attacker-controlled content while keeping the
    // original element in the document.
    let wrapped = xml.replace(
        r#"<data Id="d">genuine</data>"#,
        r#"<wrapper><data Id="x">genuine</data></wrapper><data Id="d">forged</data>"#,
    );
    assert_ne!(wrapped, xml);
    let loaded = SignedXml::load(&wrapped).unwrap();
    assert!(matches!(
        loaded.verify(&ctx, Some(&key)),
        Err(Error::DigestMismatch(_))
    ));
}

#[test]
fn custom_id_attribute_resolution() {
    let target = r#"<doc><data MyID="d">genuine</data></doc>"#;
    let key = hmac_key();

    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::HMAC_SHA256);
    si.add_reference(Reference::new(Some("#d".into()), algorithm::SHA256));

    let mut signed = SignedXml::new(si);
    let mut ctx = DsigContext::new();
    ctx.add_id_attr("MyID");
    let xml = signed
        .sign_enveloped(&ctx, &key, target)
        .unwrap()
        .to_xml_string();

    let loaded = SignedXml::load(&xml).unwrap();
    loaded.verify(&ctx, Some(&key)).unwrap();

    // Without the registered attribute name the reference cannot resolve.
    let plain_ctx = DsigContext::new();
    assert!(matches!(
        loaded.verify(&plain_ctx, Some(&key)),
        Err(Error::InvalidUri(_))
    ));
}

#[test]
fn declared_algorithm_is_authoritative() {
    // A signature declaring HMAC must not verify with an RSA key even if the
    // attacker supplies one; resolution goes through the declared method.
    let key = hmac_key();
    let mut si = SignedInfo::new();
    si.set_signature_method(algorithm::HMAC_SHA256);
    si.add_reference(Reference::new(Some("#obj".into()), algorithm::SHA256));

    let mut signed = SignedXml::new(si);
    signed.add_object(ObjectElement::text(Some("obj".into()), "payload"));
    let ctx = DsigContext::new();
    let xml = signed.sign(&ctx, &key).unwrap().to_xml_string();

    let loaded = SignedXml::load(&xml).unwrap();
    assert!(matches!(
        loaded.verify(&ctx, Some(&rsa_key())),
        Err(Error::Key(_))
    ));
}
