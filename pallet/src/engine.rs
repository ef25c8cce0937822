use frame_support::pallet_prelude::*;

/// An opaque reference to a value held in encrypted form by the confidential compute engine.
pub type CiphertextHandle = [u8; 32];

/// The plaintext width of an encrypted integer.
#[derive(Clone, Copy, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo)]
pub enum ValueWidth
{
    U8,
    U16,
    U32,
    U64
}

#[derive(Clone, Copy, Eq, PartialEq, RuntimeDebug)]
pub enum EngineError
{
    /// A ciphertext was not accompanied by a valid input proof.
    InvalidProof,
    /// The handle is not known to the engine.
    UnknownHandle,
    /// The principal may not decrypt the handle.
    AccessDenied,
    /// A homomorphic operation did not succeed.
    ComputeFailed
}

/// Operations which act purely on ciphertexts. Every operation produces a fresh
/// handle and leaves its inputs untouched.
pub trait HomomorphicCompute
{
    /// Produce a new encryption of zero.
    fn encrypted_zero(width: ValueWidth) -> Result<CiphertextHandle, EngineError>;

    /// Computes `tally + (selector == option_index ? 1 : 0)` under encryption.
    fn conditional_increment(
        tally: &CiphertextHandle,
        selector: &CiphertextHandle,
        option_index: u32
    ) -> Result<CiphertextHandle, EngineError>;
}

/// The confidential compute engine as seen by the pallet.
pub trait ConfidentialEngine<AccountId>: HomomorphicCompute
{
    /// Verify a client supplied ciphertext against its input proof and register it.
    ///
    /// - `caller`: The account the ciphertext was encrypted for.
    /// - `payload`: The serialized ciphertext.
    /// - `proof`: The input proof binding `payload` to `caller`.
    fn register_ciphertext(
        caller: &AccountId,
        payload: &[u8],
        proof: &[u8]
    ) -> Result<CiphertextHandle, EngineError>;

    /// Register an encrypted option index. The engine must reject (as `InvalidProof`)
    /// any selector whose plaintext does not lie in `[0, option_count)`, since the
    /// index can not be inspected once it is encrypted.
    fn register_selector(
        caller: &AccountId,
        payload: &[u8],
        proof: &[u8],
        option_count: u32
    ) -> Result<CiphertextHandle, EngineError>;

    /// Permit `principal` to request decryption of each of `handles`.
    fn authorize_decryption(
        handles: &[CiphertextHandle],
        principal: &AccountId
    ) -> Result<(), EngineError>;
}

/// The decryption request protocol. Consumed by clients, never by the pallet.
pub trait DecryptionOracle<AccountId>
{
    fn request_decryption(
        handle: &CiphertextHandle,
        principal: &AccountId
    ) -> Result<u64, EngineError>;
}
