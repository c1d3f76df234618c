//! Facade: lazy bootstrap, directory lookup and the two message pipelines.

#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicBool, Ordering},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use nile_crypto::KeyDescription;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::NileConfig,
    decoder::Decoder,
    encoder::Encoder,
    env::Environment,
    error::NileError,
    key_manager::{KeyManager, KeyRole},
    phonebook::{InMemoryPhonebook, Phonebook},
};

/// Registration attempt joined by every caller that arrives while it runs.
type Bootstrap = Shared<BoxFuture<'static, Result<(), NileError>>>;

/// Slot holding the registration attempt in flight, if any.
type BootstrapSlot = Mutex<Option<Bootstrap>>;

/// One party of the Nile protocol.
///
/// Before the first message is prepared or handled, the facade registers its
/// own key announcement with the phonebook. This happens once per instance:
/// concurrent first callers share a single registration attempt and all see
/// its outcome. A failed attempt is retried by the next call that arrives
/// after it resolved.
///
/// All methods take `&self`; wrap the facade in an `Arc` to share it between
/// tasks.
pub struct Nile<E: Environment> {
    id: String,
    keys: Arc<KeyManager>,
    encoder: Arc<Encoder<E>>,
    decoder: Arc<Decoder<E>>,
    phonebook: Arc<dyn Phonebook>,
    ready: Arc<AtomicBool>,
    in_flight: Arc<BootstrapSlot>,
}

impl<E: Environment> Nile<E> {
    /// Create a facade backed by a fresh [`InMemoryPhonebook`].
    pub fn new(config: NileConfig, env: E) -> Self {
        let keys = Arc::new(KeyManager::from_key_pair(config.key_pair.clone()));
        let decoder = Arc::new(Decoder::new(Arc::clone(&keys), env.clone()));
        let phonebook = Arc::new(InMemoryPhonebook::new(Arc::clone(&decoder)));
        Self::assemble(config, env, keys, decoder, phonebook)
    }

    /// Create a facade that registers with and resolves through `phonebook`.
    pub fn with_phonebook(config: NileConfig, env: E, phonebook: Arc<dyn Phonebook>) -> Self {
        let keys = Arc::new(KeyManager::from_key_pair(config.key_pair.clone()));
        let decoder = Arc::new(Decoder::new(Arc::clone(&keys), env.clone()));
        Self::assemble(config, env, keys, decoder, phonebook)
    }

    fn assemble(
        config: NileConfig,
        env: E,
        keys: Arc<KeyManager>,
        decoder: Arc<Decoder<E>>,
        phonebook: Arc<dyn Phonebook>,
    ) -> Self {
        let encoder = Encoder::new(Arc::clone(&keys), env)
            .with_content_encryption(config.content_encryption)
            .with_announcement_ttl(config.announcement_ttl);

        Self {
            id: config.id,
            keys,
            encoder: Arc::new(encoder),
            decoder,
            phonebook,
            ready: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Directory identifier of this party.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Own public key description.
    pub fn public_key(&self) -> &KeyDescription {
        self.keys.description(KeyRole::Public)
    }

    /// Phonebook this facade registers with.
    pub fn phonebook(&self) -> &Arc<dyn Phonebook> {
        &self.phonebook
    }

    /// Whether the own key announcement has been registered.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Serialize `message` as JSON and seal it for `recipient_id`.
    ///
    /// # Errors
    ///
    /// - `Serialization` if `message` cannot be serialized
    /// - `BootstrapFailed` if the own registration is rejected
    /// - `UnknownRecipient` if the phonebook has no entry for `recipient_id`
    /// - `RecipientKey`, `EncryptionFailed`, `Signing` from the encoder
    pub async fn prepare_message<T>(&self, message: &T, recipient_id: &str) -> Result<String, NileError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(message).map_err(|e| NileError::serialization(&e))?;
        self.ensure_ready().await?;

        let recipient = self
            .phonebook
            .get(recipient_id)
            .await?
            .ok_or_else(|| NileError::UnknownRecipient { id: recipient_id.to_string() })?;

        tracing::debug!(recipient = %recipient_id, thumbprint = %recipient.thumbprint, "preparing message");
        self.encoder.encode(&payload, &recipient.key).await
    }

    /// Open an envelope from `sender_id` and deserialize its JSON payload.
    ///
    /// # Errors
    ///
    /// - `BootstrapFailed` if the own registration is rejected
    /// - `UnknownSender` if the phonebook has no entry for `sender_id`
    /// - `SignatureInvalid`, `DecryptionFailed` from the decoder
    /// - `Serialization` if the payload is not valid JSON for `T`
    pub async fn handle_message<T>(&self, envelope: &str, sender_id: &str) -> Result<T, NileError>
    where
        T: DeserializeOwned,
    {
        self.ensure_ready().await?;

        let sender = self
            .phonebook
            .get(sender_id)
            .await?
            .ok_or_else(|| NileError::UnknownSender { id: sender_id.to_string() })?;

        tracing::debug!(sender = %sender_id, thumbprint = %sender.thumbprint, "handling message");
        let plaintext = self.decoder.decode(envelope, &sender.key).await?;
        serde_json::from_slice(&plaintext).map_err(|e| NileError::serialization(&e))
    }

    /// Register the own key announcement unless already done.
    ///
    /// # Errors
    ///
    /// - `BootstrapFailed` if the phonebook rejects the announcement or fails
    /// - `KeyParse` / `Signing` if the own keys cannot produce an announcement
    pub async fn ensure_ready(&self) -> Result<(), NileError> {
        if self.is_ready() {
            return Ok(());
        }

        let attempt = {
            let mut slot = self.in_flight.lock().expect("bootstrap slot lock poisoned");
            if self.is_ready() {
                return Ok(());
            }
            slot.get_or_insert_with(|| {
                tracing::debug!(id = %self.id, "starting bootstrap");
                Self::bootstrap(
                    self.id.clone(),
                    Arc::clone(&self.encoder),
                    Arc::clone(&self.phonebook),
                    Arc::clone(&self.ready),
                    Arc::downgrade(&self.in_flight),
                )
                .boxed()
                .shared()
            })
            .clone()
        };

        attempt.await
    }

    /// One registration attempt.
    ///
    /// Publishes readiness and empties the slot before resolving, so callers
    /// arriving afterwards either see the facade ready or start a new attempt.
    async fn bootstrap(
        id: String,
        encoder: Arc<Encoder<E>>,
        phonebook: Arc<dyn Phonebook>,
        ready: Arc<AtomicBool>,
        slot: Weak<BootstrapSlot>,
    ) -> Result<(), NileError> {
        let result = Self::register(&id, &encoder, phonebook.as_ref()).await;

        if let Some(slot) = slot.upgrade() {
            let mut slot = slot.lock().expect("bootstrap slot lock poisoned");
            if result.is_ok() {
                ready.store(true, Ordering::Release);
            }
            *slot = None;
        }
        result
    }

    async fn register(id: &str, encoder: &Encoder<E>, phonebook: &dyn Phonebook) -> Result<(), NileError> {
        let announcement = encoder.make_key_announcement().await?;

        match phonebook.register(id, &announcement).await {
            Ok(true) => {
                tracing::info!(id = %id, "nile ready");
                Ok(())
            },
            Ok(false) => {
                tracing::warn!(id = %id, "phonebook rejected own key announcement");
                Err(NileError::BootstrapFailed {
                    reason: "phonebook rejected key announcement".to_string(),
                })
            },
            Err(err) => {
                tracing::warn!(id = %id, %err, "registration failed");
                Err(NileError::BootstrapFailed { reason: err.to_string() })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use nile_crypto::{KeyPair, SignatureAlgorithm};

    use super::*;
    use crate::{message::RequestMessage, system_env::SystemEnv};

    fn config(id: &str) -> NileConfig {
        let env = SystemEnv::new();
        let pair = KeyPair::generate(SignatureAlgorithm::Es384, |buf: &mut [u8]| {
            env.random_bytes(buf);
        })
        .unwrap();
        NileConfig::new(id, pair)
    }

    #[tokio::test]
    async fn self_message_roundtrip() {
        let nile = Nile::new(config("T"), SystemEnv::new());
        let request = RequestMessage::new("GET", "/hello");

        let envelope = nile.prepare_message(&request, "T").await.unwrap();
        let received: RequestMessage = nile.handle_message(&envelope, "T").await.unwrap();

        assert_eq!(received, request);
        assert!(nile.is_ready());
    }

    #[tokio::test]
    async fn unknown_recipient() {
        let nile = Nile::new(config("T"), SystemEnv::new());

        let result = nile.prepare_message(&RequestMessage::new("GET", "/hello"), "U").await;
        assert_eq!(result.unwrap_err(), NileError::UnknownRecipient { id: "U".to_string() });
        // Bootstrap still happened
        assert!(nile.is_ready());
    }

    #[tokio::test]
    async fn unknown_sender() {
        let nile = Nile::new(config("T"), SystemEnv::new());
        let envelope = nile.prepare_message(&RequestMessage::new("GET", "/"), "T").await.unwrap();

        let result = nile.handle_message::<RequestMessage>(&envelope, "U").await;
        assert_eq!(result.unwrap_err(), NileError::UnknownSender { id: "U".to_string() });
    }

    #[tokio::test]
    async fn accessors() {
        let config = config("T");
        let expected = config.key_pair.public_key.clone();
        let nile = Nile::new(config, SystemEnv::new());

        assert_eq!(nile.id(), "T");
        assert_eq!(nile.public_key(), &expected);
        assert!(!nile.is_ready());
        assert!(nile.phonebook().get("T").await.unwrap().is_none());

        nile.ensure_ready().await.unwrap();
        assert!(nile.phonebook().get("T").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_id_fails_bootstrap() {
        let nile = Nile::new(config(""), SystemEnv::new());

        let result = nile.ensure_ready().await;
        assert!(matches!(result, Err(NileError::BootstrapFailed { .. })));
        assert!(!nile.is_ready());
    }

    #[tokio::test]
    async fn payload_of_wrong_shape_is_serialization_error() {
        let nile = Nile::new(config("T"), SystemEnv::new());
        let envelope = nile.prepare_message(&vec![1, 2, 3], "T").await.unwrap();

        let result = nile.handle_message::<RequestMessage>(&envelope, "T").await;
        assert!(matches!(result, Err(NileError::Serialization { .. })));
    }
}
