use super::cipher::{self, CredentialKey, EncryptedCredentialBlob, KEY_LEN};
use super::shm::{self, SharedMemorySegment};
use crate::errors::{AutomationError, CredentialError};
use std::fmt;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

const SEGMENT_PREFIX: &str = "timefill";

/// The three segments of one handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSlot {
    AesKey,
    Login,
    Password,
}

impl SecretSlot {
    pub const ALL: [SecretSlot; 3] = [SecretSlot::AesKey, SecretSlot::Login, SecretSlot::Password];

    pub fn logical_name(self) -> &'static str {
        match self {
            SecretSlot::AesKey => "aes_key",
            SecretSlot::Login => "login",
            SecretSlot::Password => "password",
        }
    }
}

/// Decrypted login secrets, wiped on drop
#[derive(Clone)]
pub struct Credentials {
    pub username: Zeroizing<String>,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Pre-encrypted blobs from the configuration, used when the producer did
/// not publish the login or password segment.
#[derive(Debug, Clone, Default)]
pub struct CredentialFallback {
    pub login: Option<EncryptedCredentialBlob>,
    pub password: Option<EncryptedCredentialBlob>,
}

/// Short identifier scoping segment names to one run
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Producer/consumer manager for one run's credential segments.
///
/// Segment names are `/timefill_<logical>_<run_id>`.
#[derive(Debug, Clone)]
pub struct CredentialHandoff {
    run_id: String,
}

impl CredentialHandoff {
    pub fn new(run_id: impl Into<String>) -> Result<Self, AutomationError> {
        let run_id = run_id.into();
        let valid = !run_id.is_empty()
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AutomationError::InvalidArgument(format!(
                "run id must be non-empty ASCII alphanumerics, '-' or '_': {run_id:?}"
            )));
        }
        Ok(Self { run_id })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn segment_name(&self, slot: SecretSlot) -> String {
        format!("/{SEGMENT_PREFIX}_{}_{}", slot.logical_name(), self.run_id)
    }

    /// Generate a key, encrypt both secrets and publish the three segments.
    /// Segments already published are erased again if a later one fails.
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub fn publish_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Vec<SharedMemorySegment>, AutomationError> {
        let key = CredentialKey::generate();
        let login_blob = cipher::encrypt(username.as_bytes(), &key);
        let password_blob = cipher::encrypt(password.as_bytes(), &key);

        let payloads: [(SecretSlot, Zeroizing<Vec<u8>>); 3] = [
            (SecretSlot::AesKey, Zeroizing::new(key.as_bytes().to_vec())),
            (SecretSlot::Login, Zeroizing::new(login_blob.to_bytes())),
            (SecretSlot::Password, Zeroizing::new(password_blob.to_bytes())),
        ];

        let mut published = Vec::with_capacity(payloads.len());
        for (slot, payload) in payloads.iter() {
            match shm::publish(&self.segment_name(*slot), payload) {
                Ok(segment) => published.push(segment),
                Err(e) => {
                    for segment in published {
                        if let Err(cleanup) = shm::erase(segment) {
                            warn!(error = %cleanup, "Failed to roll back published segment");
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        info!("Published {} credential segments", published.len());
        Ok(published)
    }

    fn read_blob(
        &self,
        slot: SecretSlot,
        fallback: Option<&EncryptedCredentialBlob>,
    ) -> Result<EncryptedCredentialBlob, CredentialError> {
        let name = self.segment_name(slot);
        match shm::retrieve_all(&name) {
            Ok(bytes) => EncryptedCredentialBlob::from_bytes(&bytes),
            Err(CredentialError::SegmentNotFound(missing)) => match fallback {
                Some(blob) => {
                    debug!(segment = %missing, "Using pre-encrypted value from configuration");
                    Ok(blob.clone())
                }
                None => Err(CredentialError::SegmentNotFound(missing)),
            },
            Err(e) => Err(e),
        }
    }

    /// Read the key and both encrypted secrets, then decrypt them
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub fn retrieve_credentials(
        &self,
        fallback: &CredentialFallback,
    ) -> Result<Credentials, AutomationError> {
        let key_bytes = shm::retrieve(&self.segment_name(SecretSlot::AesKey), KEY_LEN)?;
        let key = CredentialKey::from_slice(&key_bytes[..KEY_LEN])?;

        let login = self.read_blob(SecretSlot::Login, fallback.login.as_ref())?;
        let password = self.read_blob(SecretSlot::Password, fallback.password.as_ref())?;

        let credentials = Credentials {
            username: cipher::decrypt_string(&login, &key)?,
            password: cipher::decrypt_string(&password, &key)?,
        };
        info!("Retrieved credentials");
        Ok(credentials)
    }

    /// Erase every segment of this run. Missing segments are not an error;
    /// the first other failure is returned after all three were attempted.
    pub fn erase_all(&self) -> Result<(), CredentialError> {
        let mut first_error = None;
        for slot in SecretSlot::ALL {
            match shm::erase_by_name(&self.segment_name(slot)) {
                Ok(()) | Err(CredentialError::SegmentNotFound(_)) => {}
                Err(e) => {
                    warn!(slot = slot.logical_name(), error = %e, "Failed to erase segment");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Guard that erases all segments when it goes out of scope
    pub fn erasure_guard(&self) -> ErasureGuard<'_> {
        ErasureGuard {
            handoff: self,
            armed: true,
        }
    }
}

/// Runs [`CredentialHandoff::erase_all`] on every exit path
pub struct ErasureGuard<'a> {
    handoff: &'a CredentialHandoff,
    armed: bool,
}

impl ErasureGuard<'_> {
    /// Leave the segments in place
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ErasureGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.handoff.erase_all() {
            Ok(()) => debug!(run_id = %self.handoff.run_id, "Credential segments erased"),
            Err(e) => warn!(
                run_id = %self.handoff.run_id,
                error = %e,
                "Credential cleanup incomplete"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_names_follow_the_run_scheme() {
        let handoff = CredentialHandoff::new("ab12cd34").unwrap();
        assert_eq!(handoff.segment_name(SecretSlot::AesKey), "/timefill_aes_key_ab12cd34");
        assert_eq!(handoff.segment_name(SecretSlot::Login), "/timefill_login_ab12cd34");
        assert_eq!(handoff.segment_name(SecretSlot::Password), "/timefill_password_ab12cd34");
    }

    #[test]
    fn run_id_is_validated() {
        assert!(CredentialHandoff::new("").is_err());
        assert!(CredentialHandoff::new("../etc").is_err());
        assert!(CredentialHandoff::new("run_42-a").is_ok());
    }

    #[test]
    fn generated_run_ids_are_short_and_distinct() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
        assert!(CredentialHandoff::new(a).is_ok());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            username: Zeroizing::new("jdupont".into()),
            password: Zeroizing::new("hunter2".into()),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("jdupont"));
        assert!(!shown.contains("hunter2"));
    }
}
