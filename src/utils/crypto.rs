//! # Password Substitution Ciphers
//!
//! The host never receives a clear-text password. Both sides contribute an
//! 8-byte random seed and the client sends a credential derived from the user
//! id, the password and both seeds.
//!
//! Which cipher applies depends on the password level the sign-on server
//! reports:
//!
//! | level | cipher | credential |
//! |-------|--------|------------|
//! | 0, 1  | DES substitution over CCSID 37 blocks | 8 bytes |
//! | 2+    | SHA-1 over UTF-16BE text | 20 bytes |
//!
//! Everything here is a pure function of its inputs. Seeds and intermediate
//! buffers holding password material are zeroized when dropped.

use crate::error::{constants, ProtocolError, Result};
use crate::utils::ebcdic;
use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use sha1::{Digest, Sha1};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a client or server seed
pub const SEED_LEN: usize = 8;

/// Width of user id and password fields once converted to CCSID 37
const FIELD_WIDTH: usize = 10;

/// Counter mixed into both ciphers
const SEQUENCE: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

/// An 8-byte random seed contributed to one handshake.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Draw a fresh seed from the operating system's random source.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; SEED_LEN];
        getrandom::fill(&mut bytes).map_err(|e| {
            ProtocolError::TransportError(format!("{}: {e}", constants::ERR_RANDOM_UNAVAILABLE))
        })?;
        Ok(Seed(bytes))
    }

    /// Wrap seed bytes received from the host.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SEED_LEN] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidSize(bytes.len()))?;
        Ok(Seed(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl From<[u8; SEED_LEN]> for Seed {
    fn from(bytes: [u8; SEED_LEN]) -> Self {
        Seed(bytes)
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Password level reported by the sign-on server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasswordLevel(pub u8);

impl PasswordLevel {
    /// Levels 0 and 1 use the DES substitution.
    pub fn is_legacy(self) -> bool {
        self.0 <= 1
    }

    /// Length of the credential this level produces.
    pub fn credential_len(self) -> usize {
        if self.is_legacy() {
            8
        } else {
            20
        }
    }
}

/// Output of the legacy substitution.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LegacySubstitution {
    /// Intermediate block the host can use to prove it knows the password
    pub verify_token: [u8; 8],
    /// Credential sent on the wire
    pub credential: [u8; 8],
}

/// Encrypt `password` for the given level.
///
/// Returns the credential to place in a password field.
pub fn encrypt_password(
    level: PasswordLevel,
    user_id: &str,
    password: &str,
    client_seed: &Seed,
    server_seed: &Seed,
) -> Result<Zeroizing<Vec<u8>>> {
    let credential = if level.is_legacy() {
        encrypt_legacy(user_id, password, client_seed, server_seed)?.to_vec()
    } else {
        encrypt_hash(user_id, password, client_seed, server_seed)?.to_vec()
    };
    Ok(Zeroizing::new(credential))
}

/// DES substitution for password levels 0 and 1.
pub fn encrypt_legacy(
    user_id: &str,
    password: &str,
    client_seed: &Seed,
    server_seed: &Seed,
) -> Result<[u8; 8]> {
    let token = legacy_token(user_id, password)?;
    let sub = substitute(user_id, &token, client_seed, server_seed)?;
    Ok(sub.credential)
}

/// SHA-1 substitution for password levels 2 and above.
pub fn encrypt_hash(
    user_id: &str,
    password: &str,
    client_seed: &Seed,
    server_seed: &Seed,
) -> Result<[u8; 20]> {
    // The user id goes through CCSID 37 and back so it is blank padded to the
    // same width the host stores.
    let padded = ebcdic::encode_padded(user_id, FIELD_WIDTH)?;
    let user_utf16 = Zeroizing::new(utf16_be(&ebcdic::decode(&padded)));
    let password_utf16 = Zeroizing::new(utf16_be(password.trim_end_matches(' ')));

    let mut token_hash = Sha1::new();
    token_hash.update(user_utf16.as_slice());
    token_hash.update(password_utf16.as_slice());
    let token: Zeroizing<[u8; 20]> = Zeroizing::new(token_hash.finalize().into());

    let mut sum = Sha1::new();
    sum.update(token.as_slice());
    sum.update(server_seed.as_bytes());
    sum.update(client_seed.as_bytes());
    sum.update(user_utf16.as_slice());
    sum.update(SEQUENCE);
    Ok(sum.finalize().into())
}

/// Derive the 8-byte DES password token from the user id and password.
pub fn legacy_token(user_id: &str, password: &str) -> Result<[u8; 8]> {
    let user = Zeroizing::new(ebcdic::encode_padded(user_id, FIELD_WIDTH)?);
    let pass = Zeroizing::new(ebcdic::encode_padded(password, FIELD_WIDTH).map_err(|e| {
        match e {
            ProtocolError::InvalidInput(_) => {
                ProtocolError::InvalidInput(constants::ERR_PASSWORD_TOO_LONG.to_string())
            }
            other => other,
        }
    })?);

    let data = fold_user_id(&user);

    let pass_len = ebcdic::effective_len(&pass);
    let token = if pass_len > 8 {
        let mut first = Zeroizing::new([0u8; 8]);
        first.copy_from_slice(&pass[..8]);
        let mut second = Zeroizing::new([ebcdic::BLANK; 8]);
        second[..pass_len - 8].copy_from_slice(&pass[8..pass_len]);

        let a = des_encrypt(&shifted_key(&first), &data);
        let b = des_encrypt(&shifted_key(&second), &data);
        xor8(&a, &b)
    } else {
        let mut block = Zeroizing::new([ebcdic::BLANK; 8]);
        block[..pass_len].copy_from_slice(&pass[..pass_len]);
        des_encrypt(&shifted_key(&block), &data)
    };

    Ok(token)
}

/// Run the five-round DES substitution that turns a password token and the two
/// seeds into the wire credential.
pub fn substitute(
    user_id: &str,
    token: &[u8; 8],
    client_seed: &Seed,
    server_seed: &Seed,
) -> Result<LegacySubstitution> {
    let user = ebcdic::encode_padded(&user_id.to_uppercase(), FIELD_WIDTH)?;
    let register = add_with_carry(&SEQUENCE, server_seed.as_bytes());

    let e1 = des_encrypt(token, &register);
    let verify_token = des_encrypt(token, &xor8(&e1, client_seed.as_bytes()));

    let mut head = [0u8; 8];
    head.copy_from_slice(&user[..8]);
    let e3 = des_encrypt(token, &xor8(&xor8(&head, &register), &verify_token));

    let mut tail = [ebcdic::BLANK; 8];
    tail[0] = user[8];
    tail[1] = user[9];
    let e4 = des_encrypt(token, &xor8(&xor8(&register, &tail), &e3));

    let credential = des_encrypt(token, &xor8(&SEQUENCE, &e4));

    Ok(LegacySubstitution {
        verify_token,
        credential,
    })
}

/// Fold bytes 8 and 9 of a long user id into the first eight, two bits at a time.
fn fold_user_id(user: &[u8]) -> [u8; 8] {
    let mut block = [0u8; 8];
    block.copy_from_slice(&user[..8]);
    if ebcdic::effective_len(user) > 8 {
        for (half, &extra) in [user[8], user[9]].iter().enumerate() {
            let base = half * 4;
            block[base] ^= extra & 0xC0;
            block[base + 1] ^= (extra & 0x30) << 2;
            block[base + 2] ^= (extra & 0x0C) << 4;
            block[base + 3] ^= (extra & 0x03) << 6;
        }
    }
    block
}

/// XOR with 0x55, then shift the whole block left by one bit.
fn shifted_key(block: &[u8; 8]) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (k, b) in key.iter_mut().zip(block.iter()) {
        *k = b ^ 0x55;
    }
    for i in 0..7 {
        key[i] = (key[i] << 1) | (key[i + 1] >> 7);
    }
    key[7] <<= 1;
    key
}

fn add_with_carry(a: &[u8; 8], b: &[u8; 8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    let mut carry = 0u16;
    for i in (0..8).rev() {
        let sum = a[i] as u16 + b[i] as u16 + carry;
        out[i] = sum as u8;
        carry = sum >> 8;
    }
    out
}

fn xor8(a: &[u8; 8], b: &[u8; 8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for i in 0..8 {
        out[i] = a[i] ^ b[i];
    }
    out
}

fn des_encrypt(key: &[u8; 8], data: &[u8; 8]) -> [u8; 8] {
    let cipher = Des::new(&GenericArray::from(*key));
    let mut block = GenericArray::from(*data);
    cipher.encrypt_block(&mut block);
    block.into()
}

fn utf16_be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}
