//! Long-lived device identity and published key material.
//!
//! An [`Account`] owns the device's Curve25519 identity key and Ed25519
//! signing key, plus the keys peers use to open sessions with it:
//!
//! - One-time keys: consumed by at most one inbound session, then removed
//! - Signed prekey: reusable, rotated by the owner, one current and one
//!   previous slot
//! - Fallback key: reusable, used when one-time keys run out, one current and
//!   one previous slot
//!
//! # Invariants
//!
//! - No two live one-time keys share an id
//! - At most [`MAX_ONE_TIME_KEYS`] one-time keys are held; the oldest is
//!   evicted first
//! - A removed one-time key's secret half is zeroized when dropped

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tether_crypto::{
    Curve25519KeyPair, Curve25519PublicKey, Curve25519SecretKey, Ed25519KeyPair,
    Ed25519PublicKey, Ed25519Signature,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    env::{Environment, require_random, take_32},
    error::{OlmError, Result},
    pickle::{PickleKey, open, seal},
    session::Session,
};

/// Random bytes needed by [`Account::new_with_random`]
pub const ACCOUNT_RANDOM_LENGTH: usize = 64;

/// Random bytes needed per one-time key
pub const ONE_TIME_KEY_RANDOM_LENGTH: usize = 32;

/// Random bytes needed by prekey and fallback key generation
pub const SIGNED_KEY_RANDOM_LENGTH: usize = 32;

/// Maximum number of one-time keys an account holds
pub const MAX_ONE_TIME_KEYS: usize = 100;

const ACCOUNT_PICKLE_VERSION: u32 = 1;

/// Public identity of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityKeys {
    /// Curve25519 identity key used in session handshakes
    pub curve25519: Curve25519PublicKey,
    /// Ed25519 key used to sign published keys
    pub ed25519: Ed25519PublicKey,
}

/// A published Curve25519 key with the account's signature over it.
///
/// The signature covers `key_id (u32 BE) || public_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedPreKey {
    /// Account-assigned key id
    pub key_id: u32,
    /// Public key peers use in the handshake
    pub public_key: Curve25519PublicKey,
    /// Ed25519 signature by the account's signing key
    pub signature: Ed25519Signature,
}

impl SignedPreKey {
    /// Verify the signature against the owner's signing key.
    pub fn verify(&self, signing_key: &Ed25519PublicKey) -> Result<()> {
        signing_key
            .verify(&signed_key_payload(self.key_id, &self.public_key), &self.signature)
            .map_err(|_| OlmError::BadSignature)
    }
}

/// Bytes covered by a prekey or fallback key signature.
pub(crate) fn signed_key_payload(key_id: u32, public_key: &Curve25519PublicKey) -> [u8; 36] {
    let mut payload = [0u8; 36];
    payload[..4].copy_from_slice(&key_id.to_be_bytes());
    payload[4..].copy_from_slice(public_key.as_bytes());
    payload
}

#[derive(Clone)]
struct OneTimeKey {
    key_pair: Curve25519KeyPair,
    published: bool,
}

#[derive(Clone)]
struct SignedKey {
    key_id: u32,
    key_pair: Curve25519KeyPair,
    signature: Ed25519Signature,
    published: bool,
}

impl SignedKey {
    fn public(&self) -> SignedPreKey {
        SignedPreKey {
            key_id: self.key_id,
            public_key: self.key_pair.public_key(),
            signature: self.signature,
        }
    }
}

/// Device identity plus one-time, prekey and fallback key material.
#[derive(Clone)]
pub struct Account {
    identity_key: Curve25519KeyPair,
    signing_key: Ed25519KeyPair,
    one_time_keys: BTreeMap<u32, OneTimeKey>,
    next_one_time_key_id: u32,
    prekey: Option<SignedKey>,
    prev_prekey: Option<SignedKey>,
    fallback_key: Option<SignedKey>,
    prev_fallback_key: Option<SignedKey>,
    next_signed_key_id: u32,
    last_prekey_publish_time: u64,
}

impl Account {
    /// Create an account from [`ACCOUNT_RANDOM_LENGTH`] random bytes.
    ///
    /// The first 32 bytes seed the Ed25519 signing key, the next 32 the
    /// Curve25519 identity key.
    pub fn new_with_random(random: &[u8]) -> Result<Self> {
        require_random(random, ACCOUNT_RANDOM_LENGTH)?;

        let mut signing_seed = take_32(random, 0);
        let signing_key = Ed25519KeyPair::from_seed(&signing_seed);
        signing_seed.zeroize();
        let identity_key = Curve25519KeyPair::from_secret_bytes(take_32(random, 32));

        tracing::debug!(
            identity_key = %hex::encode(identity_key.public_key().as_bytes()),
            "created account"
        );

        Ok(Self {
            identity_key,
            signing_key,
            one_time_keys: BTreeMap::new(),
            next_one_time_key_id: 0,
            prekey: None,
            prev_prekey: None,
            fallback_key: None,
            prev_fallback_key: None,
            next_signed_key_id: 0,
            last_prekey_publish_time: 0,
        })
    }

    /// Create an account with randomness from `env`.
    pub fn new<E: Environment>(env: &E) -> Self {
        let mut random = [0u8; ACCOUNT_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = Self::new_with_random(&random);
        random.zeroize();

        let Ok(account) = result else {
            unreachable!("buffer is exactly ACCOUNT_RANDOM_LENGTH bytes");
        };
        account
    }

    /// Public Curve25519 and Ed25519 identity keys.
    pub fn identity_keys(&self) -> IdentityKeys {
        IdentityKeys {
            curve25519: self.identity_key.public_key(),
            ed25519: self.signing_key.public_key(),
        }
    }

    /// Sign `message` with the account's Ed25519 key.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        self.signing_key.sign(message)
    }

    /// Maximum number of one-time keys the account holds.
    pub fn max_number_of_one_time_keys(&self) -> usize {
        MAX_ONE_TIME_KEYS
    }

    /// Append `count` one-time keys using `count * 32` random bytes.
    ///
    /// Ids are sequential. If the account would exceed
    /// [`MAX_ONE_TIME_KEYS`], the oldest keys are evicted.
    pub fn generate_one_time_keys_with_random(
        &mut self,
        count: usize,
        random: &[u8],
    ) -> Result<()> {
        let needed = count
            .checked_mul(ONE_TIME_KEY_RANDOM_LENGTH)
            .ok_or(OlmError::InsufficientRandomness { needed: usize::MAX, got: random.len() })?;
        require_random(random, needed)?;

        for chunk in random.chunks_exact(ONE_TIME_KEY_RANDOM_LENGTH).take(count) {
            let mut secret = [0u8; 32];
            secret.copy_from_slice(chunk);
            let key_id = self.next_one_time_key_id;
            self.next_one_time_key_id = self.next_one_time_key_id.wrapping_add(1);
            self.one_time_keys.insert(key_id, OneTimeKey {
                key_pair: Curve25519KeyPair::from_secret_bytes(secret),
                published: false,
            });
        }

        while self.one_time_keys.len() > MAX_ONE_TIME_KEYS {
            if let Some((key_id, _)) = self.one_time_keys.pop_first() {
                tracing::debug!(key_id, "evicted oldest one-time key");
            }
        }

        tracing::debug!(count, total = self.one_time_keys.len(), "generated one-time keys");
        Ok(())
    }

    /// Append `count` one-time keys with randomness from `env`.
    ///
    /// At most [`max_number_of_one_time_keys`](Self::max_number_of_one_time_keys)
    /// keys are generated; any beyond that would be evicted immediately.
    pub fn generate_one_time_keys<E: Environment>(&mut self, env: &E, count: usize) {
        let count = count.min(self.max_number_of_one_time_keys());
        let mut random = vec![0u8; count * ONE_TIME_KEY_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = self.generate_one_time_keys_with_random(count, &random);
        random.zeroize();

        let Ok(()) = result else {
            unreachable!("buffer is exactly count * ONE_TIME_KEY_RANDOM_LENGTH bytes");
        };
    }

    /// Unpublished one-time keys by id.
    pub fn one_time_keys(&self) -> BTreeMap<u32, Curve25519PublicKey> {
        self.one_time_keys
            .iter()
            .filter(|(_, key)| !key.published)
            .map(|(id, key)| (*id, key.key_pair.public_key()))
            .collect()
    }

    /// Mark every one-time key and the current fallback key as published.
    pub fn mark_keys_as_published(&mut self) {
        for key in self.one_time_keys.values_mut() {
            key.published = true;
        }
        if let Some(fallback_key) = &mut self.fallback_key {
            fallback_key.published = true;
        }
    }

    /// Rotate the signed prekey using 32 random bytes.
    ///
    /// The current prekey becomes the previous one; any older previous
    /// prekey is dropped.
    pub fn generate_prekey_with_random(&mut self, random: &[u8]) -> Result<SignedPreKey> {
        let key = self.new_signed_key(random)?;
        let public = key.public();
        self.prev_prekey = self.prekey.replace(key);

        tracing::debug!(key_id = public.key_id, "rotated prekey");
        Ok(public)
    }

    /// Rotate the signed prekey with randomness from `env`.
    pub fn generate_prekey<E: Environment>(&mut self, env: &E) -> SignedPreKey {
        let mut random = [0u8; SIGNED_KEY_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = self.generate_prekey_with_random(&random);
        random.zeroize();

        let Ok(prekey) = result else {
            unreachable!("buffer is exactly SIGNED_KEY_RANDOM_LENGTH bytes");
        };
        prekey
    }

    /// Current signed prekey, published or not.
    pub fn prekey(&self) -> Option<SignedPreKey> {
        self.prekey.as_ref().map(SignedKey::public)
    }

    /// Signature over the current prekey.
    pub fn prekey_signature(&self) -> Option<Ed25519Signature> {
        self.prekey.as_ref().map(|key| key.signature)
    }

    /// Current prekey if it has not been published yet.
    pub fn unpublished_prekey(&self) -> Option<SignedPreKey> {
        self.prekey.as_ref().filter(|key| !key.published).map(SignedKey::public)
    }

    /// Mark the current prekey as published at the environment's clock.
    pub fn mark_prekey_as_published<E: Environment>(&mut self, env: &E) {
        self.mark_prekey_as_published_at(env.wall_clock_secs());
    }

    /// Mark the current prekey as published at `unix_secs`.
    pub fn mark_prekey_as_published_at(&mut self, unix_secs: u64) {
        if let Some(prekey) = &mut self.prekey {
            prekey.published = true;
            self.last_prekey_publish_time = unix_secs;
        }
    }

    /// Seconds since the Unix epoch at which a prekey was last published.
    pub fn last_prekey_publish_time(&self) -> u64 {
        self.last_prekey_publish_time
    }

    /// Drop the previous prekey so sessions can no longer be opened with it.
    pub fn forget_old_prekey(&mut self) {
        if let Some(old) = self.prev_prekey.take() {
            tracing::debug!(key_id = old.key_id, "forgot old prekey");
        }
    }

    /// Rotate the fallback key using 32 random bytes.
    pub fn generate_fallback_key_with_random(&mut self, random: &[u8]) -> Result<SignedPreKey> {
        let key = self.new_signed_key(random)?;
        let public = key.public();
        self.prev_fallback_key = self.fallback_key.replace(key);

        tracing::debug!(key_id = public.key_id, "rotated fallback key");
        Ok(public)
    }

    /// Rotate the fallback key with randomness from `env`.
    pub fn generate_fallback_key<E: Environment>(&mut self, env: &E) -> SignedPreKey {
        let mut random = [0u8; SIGNED_KEY_RANDOM_LENGTH];
        env.random_bytes(&mut random);
        let result = self.generate_fallback_key_with_random(&random);
        random.zeroize();

        let Ok(fallback_key) = result else {
            unreachable!("buffer is exactly SIGNED_KEY_RANDOM_LENGTH bytes");
        };
        fallback_key
    }

    /// Current fallback key if it has not been published yet.
    pub fn unpublished_fallback_key(&self) -> Option<SignedPreKey> {
        self.fallback_key.as_ref().filter(|key| !key.published).map(SignedKey::public)
    }

    /// Drop the previous fallback key.
    pub fn forget_old_fallback_key(&mut self) {
        if let Some(old) = self.prev_fallback_key.take() {
            tracing::debug!(key_id = old.key_id, "forgot old fallback key");
        }
    }

    /// Remove the one-time key `session` was created with.
    ///
    /// Fallback keys are reusable and are left in place; removing a session
    /// created with one succeeds without changing the account.
    ///
    /// # Errors
    ///
    /// - `OlmError::UnknownKey` if the session did not consume a key this
    ///   account holds
    pub fn remove_one_time_keys(&mut self, session: &Session) -> Result<()> {
        let Some(used) = session.one_time_key_used() else {
            return Err(OlmError::UnknownKey);
        };

        let found = self
            .one_time_keys
            .iter()
            .find(|(_, key)| key.key_pair.public_key() == used)
            .map(|(id, _)| *id);
        if let Some(key_id) = found {
            self.one_time_keys.remove(&key_id);
            tracing::debug!(key_id, "removed consumed one-time key");
            return Ok(());
        }

        let is_fallback = [&self.fallback_key, &self.prev_fallback_key]
            .into_iter()
            .flatten()
            .any(|key| key.key_pair.public_key() == used);
        if is_fallback {
            return Ok(());
        }

        Err(OlmError::UnknownKey)
    }

    pub(crate) fn identity_secret(&self) -> &Curve25519SecretKey {
        self.identity_key.secret_key()
    }

    /// Secret half of a one-time or fallback key, looked up by public key.
    pub(crate) fn find_one_time_key(
        &self,
        public_key: &Curve25519PublicKey,
    ) -> Option<&Curve25519SecretKey> {
        let fallback_keys = [&self.fallback_key, &self.prev_fallback_key].into_iter().flatten();
        self.one_time_keys
            .values()
            .map(|key| &key.key_pair)
            .chain(fallback_keys.map(|key| &key.key_pair))
            .find(|pair| pair.public_key() == *public_key)
            .map(Curve25519KeyPair::secret_key)
    }

    /// Secret half of the current or previous prekey, looked up by public key.
    pub(crate) fn find_prekey(
        &self,
        public_key: &Curve25519PublicKey,
    ) -> Option<&Curve25519SecretKey> {
        [&self.prekey, &self.prev_prekey]
            .into_iter()
            .flatten()
            .map(|key| &key.key_pair)
            .find(|pair| pair.public_key() == *public_key)
            .map(Curve25519KeyPair::secret_key)
    }

    fn new_signed_key(&mut self, random: &[u8]) -> Result<SignedKey> {
        require_random(random, SIGNED_KEY_RANDOM_LENGTH)?;

        let key_pair = Curve25519KeyPair::from_secret_bytes(take_32(random, 0));
        let key_id = self.next_signed_key_id;
        self.next_signed_key_id = self.next_signed_key_id.wrapping_add(1);
        let signature = self.signing_key.sign(&signed_key_payload(key_id, &key_pair.public_key()));

        Ok(SignedKey { key_id, key_pair, signature, published: false })
    }

    /// Encrypt the account's full state under `key`.
    pub fn pickle(&self, key: &PickleKey) -> Vec<u8> {
        seal(&AccountPickle::from(self), ACCOUNT_PICKLE_VERSION, key)
    }

    /// Restore an account from [`Account::pickle`] output.
    pub fn from_pickle(blob: &[u8], key: &PickleKey) -> Result<Self> {
        let pickle: AccountPickle = open(blob, ACCOUNT_PICKLE_VERSION, key)?;
        Self::try_from(&pickle)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("identity_keys", &self.identity_keys())
            .field("one_time_keys", &self.one_time_keys.len())
            .field("prekey_id", &self.prekey.as_ref().map(|key| key.key_id))
            .field("fallback_key_id", &self.fallback_key.as_ref().map(|key| key.key_id))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct AccountPickle {
    signing_seed: [u8; 32],
    identity_secret: [u8; 32],
    one_time_keys: Vec<OneTimeKeyPickle>,
    next_one_time_key_id: u32,
    prekey: Option<SignedKeyPickle>,
    prev_prekey: Option<SignedKeyPickle>,
    fallback_key: Option<SignedKeyPickle>,
    prev_fallback_key: Option<SignedKeyPickle>,
    next_signed_key_id: u32,
    last_prekey_publish_time: u64,
}

#[derive(Serialize, Deserialize, Zeroize)]
struct OneTimeKeyPickle {
    key_id: u32,
    secret: [u8; 32],
    published: bool,
}

#[derive(Serialize, Deserialize, Zeroize)]
struct SignedKeyPickle {
    key_id: u32,
    secret: [u8; 32],
    signature: Vec<u8>,
    published: bool,
}

impl From<&SignedKey> for SignedKeyPickle {
    fn from(key: &SignedKey) -> Self {
        Self {
            key_id: key.key_id,
            secret: key.key_pair.secret_key().to_bytes(),
            signature: key.signature.as_bytes().to_vec(),
            published: key.published,
        }
    }
}

impl TryFrom<&SignedKeyPickle> for SignedKey {
    type Error = OlmError;

    fn try_from(pickle: &SignedKeyPickle) -> Result<Self> {
        let signature =
            Ed25519Signature::from_slice(&pickle.signature).map_err(|_| OlmError::CorruptedPickle)?;
        Ok(Self {
            key_id: pickle.key_id,
            key_pair: Curve25519KeyPair::from_secret_bytes(pickle.secret),
            signature,
            published: pickle.published,
        })
    }
}

impl From<&Account> for AccountPickle {
    fn from(account: &Account) -> Self {
        Self {
            signing_seed: account.signing_key.seed(),
            identity_secret: account.identity_key.secret_key().to_bytes(),
            one_time_keys: account
                .one_time_keys
                .iter()
                .map(|(key_id, key)| OneTimeKeyPickle {
                    key_id: *key_id,
                    secret: key.key_pair.secret_key().to_bytes(),
                    published: key.published,
                })
                .collect(),
            next_one_time_key_id: account.next_one_time_key_id,
            prekey: account.prekey.as_ref().map(SignedKeyPickle::from),
            prev_prekey: account.prev_prekey.as_ref().map(SignedKeyPickle::from),
            fallback_key: account.fallback_key.as_ref().map(SignedKeyPickle::from),
            prev_fallback_key: account.prev_fallback_key.as_ref().map(SignedKeyPickle::from),
            next_signed_key_id: account.next_signed_key_id,
            last_prekey_publish_time: account.last_prekey_publish_time,
        }
    }
}

impl TryFrom<&AccountPickle> for Account {
    type Error = OlmError;

    fn try_from(pickle: &AccountPickle) -> Result<Self> {
        let restore =
            |key: &Option<SignedKeyPickle>| key.as_ref().map(SignedKey::try_from).transpose();

        Ok(Self {
            identity_key: Curve25519KeyPair::from_secret_bytes(pickle.identity_secret),
            signing_key: Ed25519KeyPair::from_seed(&pickle.signing_seed),
            one_time_keys: pickle
                .one_time_keys
                .iter()
                .map(|key| {
                    (key.key_id, OneTimeKey {
                        key_pair: Curve25519KeyPair::from_secret_bytes(key.secret),
                        published: key.published,
                    })
                })
                .collect(),
            next_one_time_key_id: pickle.next_one_time_key_id,
            prekey: restore(&pickle.prekey)?,
            prev_prekey: restore(&pickle.prev_prekey)?,
            fallback_key: restore(&pickle.fallback_key)?,
            prev_fallback_key: restore(&pickle.prev_fallback_key)?,
            next_signed_key_id: pickle.next_signed_key_id,
            last_prekey_publish_time: pickle.last_prekey_publish_time,
        })
    }
}
