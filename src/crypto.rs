//! Message-signature verification for wallet addresses.
//!
//! The address format selects the signing scheme:
//!
//! * Bitcoin addresses (base58check P2PKH/P2SH, bech32 P2WPKH) use the
//!   Bitcoin signed-message scheme: a base64, 65-byte recoverable secp256k1
//!   signature over `sha256d(magic || varint(len) || message)`.
//! * A 64-character hex string is an Ed25519 public key; the signature is
//!   128 hex characters over the raw message bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey as Ed25519Key};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey as Secp256k1Key};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const BITCOIN_MESSAGE_MAGIC: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Verify that `signature` over exactly `message` was produced by the key
/// behind `address`. Undecodable inputs verify as `false`.
pub fn verify_message(address: &str, message: &str, signature: &str) -> bool {
    match ed25519_key(address) {
        Some(key) => verify_ed25519(&key, message, signature),
        None => verify_bitcoin_message(address, message, signature),
    }
}

fn ed25519_key(address: &str) -> Option<Ed25519Key> {
    if address.len() != 64 {
        return None;
    }
    let bytes: [u8; 32] = hex::decode(address).ok()?.try_into().ok()?;
    Ed25519Key::from_bytes(&bytes).ok()
}

fn verify_ed25519(key: &Ed25519Key, message: &str, signature_hex: &str) -> bool {
    let Ok(raw) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig) = Ed25519Signature::from_slice(&raw) else {
        return false;
    };
    key.verify(message.as_bytes(), &sig).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegwitKind {
    P2shP2wpkh,
    P2wpkh,
}

struct RecoverableSignature {
    signature: EcdsaSignature,
    recovery_id: RecoveryId,
    compressed: bool,
    segwit: Option<SegwitKind>,
}

/// Decode a base64 compact signature. The header byte (27..=42) carries the
/// recovery id, key compression and segwit address kind.
fn decode_compact_signature(signature_b64: &str) -> Option<RecoverableSignature> {
    let raw = BASE64.decode(signature_b64.trim()).ok()?;
    if raw.len() != 65 {
        return None;
    }
    let flag = raw[0].checked_sub(27)?;
    if flag > 15 {
        return None;
    }
    let compressed = flag & 12 != 0;
    let segwit = match (flag & 8 != 0, flag & 4 != 0) {
        (false, _) => None,
        (true, false) => Some(SegwitKind::P2shP2wpkh),
        (true, true) => Some(SegwitKind::P2wpkh),
    };
    let signature = EcdsaSignature::from_slice(&raw[1..]).ok()?;
    let recovery_id = RecoveryId::from_byte(flag & 3)?;

    // Wallets may emit high-S signatures; flipping S flips the y parity.
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(low_s) => (
            low_s,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    Some(RecoverableSignature {
        signature,
        recovery_id,
        compressed,
        segwit,
    })
}

fn verify_bitcoin_message(address: &str, message: &str, signature_b64: &str) -> bool {
    let Some(sig) = decode_compact_signature(signature_b64) else {
        return false;
    };
    let digest = bitcoin_message_hash(message);
    let Ok(key) = Secp256k1Key::recover_from_prehash(&digest, &sig.signature, sig.recovery_id)
    else {
        return false;
    };
    let point = key.to_encoded_point(sig.compressed);
    let pubkey_hash = hash160(point.as_bytes());

    let (expected, actual) = match sig.segwit {
        Some(SegwitKind::P2shP2wpkh) => {
            let mut redeem_script = vec![0x00, 0x14];
            redeem_script.extend_from_slice(&pubkey_hash);
            (base58_payload(address), hash160(&redeem_script))
        }
        Some(SegwitKind::P2wpkh) => (witness_program(address), pubkey_hash),
        None => (base58_payload(address), pubkey_hash),
    };

    expected.as_deref() == Some(&actual[..])
}

/// Digest signed by Bitcoin wallets for a text message.
pub fn bitcoin_message_hash(message: &str) -> [u8; 32] {
    let mut buf = Vec::with_capacity(BITCOIN_MESSAGE_MAGIC.len() + 9 + message.len());
    buf.extend_from_slice(BITCOIN_MESSAGE_MAGIC);
    write_varint(&mut buf, message.len() as u64);
    buf.extend_from_slice(message.as_bytes());
    Sha256::digest(Sha256::digest(&buf)).into()
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// Base58check payload with the version byte stripped.
fn base58_payload(address: &str) -> Option<Vec<u8>> {
    let decoded = bs58::decode(address).with_check(None).into_vec().ok()?;
    decoded.get(1..).map(<[u8]>::to_vec)
}

fn witness_program(address: &str) -> Option<Vec<u8>> {
    bech32::segwit::decode(address)
        .ok()
        .map(|(_hrp, _version, program)| program)
}
