//! Credential Lifecycle Manager: encrypt login secrets, hand them to the
//! automation process through shared memory, and wipe them afterwards.

pub mod cipher;
pub mod handoff;
pub mod shm;

pub use cipher::{decrypt, encrypt, CredentialKey, EncryptedCredentialBlob};
pub use handoff::{
    generate_run_id, CredentialFallback, CredentialHandoff, Credentials, ErasureGuard, SecretSlot,
};
pub use shm::SharedMemorySegment;
pub use zeroize::Zeroizing;
