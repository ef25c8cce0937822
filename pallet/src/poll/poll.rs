use frame_support::pallet_prelude::*;
use frame_support::traits::ConstU32;
use sp_std::vec;
use crate::engine::CiphertextHandle;

pub type GrantIndex = u32;
pub type PollId = u32;
pub type Timestamp = u64;

/// The fewest options a poll may offer.
pub const MIN_POLL_OPTIONS: u32 = 2;

/// The most options a poll may offer.
pub const MAX_POLL_OPTIONS: u32 = 4;

/// Client-side encrypted text, opaque to the pallet.
pub type EncryptedText<T> = BoundedVec<u8, <T as crate::Config>::MaxTextLength>;
pub type EncryptedOptions<T> = BoundedVec<EncryptedText<T>, ConstU32<MAX_POLL_OPTIONS>>;

/// A ciphertext submitted for registration with the engine.
pub type Ciphertext<T> = BoundedVec<u8, <T as crate::Config>::MaxCiphertextLength>;

/// The proof accompanying a submitted ciphertext.
pub type InputProof<T> = BoundedVec<u8, <T as crate::Config>::MaxProofLength>;

/// The running encrypted tally, one handle per option.
pub type VoteCounts = BoundedVec<CiphertextHandle, ConstU32<MAX_POLL_OPTIONS>>;

/// Poll storage definition. Immutable once created.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo)]
#[scale_info(skip_type_params(T))]
pub struct Poll<T: crate::Config>
{
    /// The poll id.
    pub index: PollId,

    /// The poll creator.
    pub creator: T::AccountId,

    /// The poll creation time (in ms).
    pub created_at: Timestamp,

    /// The encrypted poll title.
    pub encrypted_title: EncryptedText<T>,

    /// The encrypted poll options.
    pub encrypted_options: EncryptedOptions<T>,

    /// The handle of the shared key used to decrypt the title and options.
    pub key_handle: CiphertextHandle
}

impl<T: crate::Config> Poll<T>
{
    pub fn option_count(&self) -> u32
    {
        self.encrypted_options.len() as u32
    }
}

/// Returns true iff `count` is an admissible number of poll options.
pub fn valid_option_count(count: usize) -> bool
{
    (MIN_POLL_OPTIONS as usize..=MAX_POLL_OPTIONS as usize).contains(&count)
}

/// The publicly readable summary of a poll.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo)]
pub struct PollMetadata<AccountId>
{
    pub creator: AccountId,
    pub created_at: Timestamp,
    pub option_count: u32
}

/// The encrypted content of a poll. Safe to expose, as only the engine can decrypt it.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo)]
pub struct EncryptedPollData
{
    pub encrypted_title: vec::Vec<u8>,
    pub encrypted_options: vec::Vec<vec::Vec<u8>>,
    pub key_handle: CiphertextHandle
}

impl<T: crate::Config> From<Poll<T>> for EncryptedPollData
{
    fn from(poll: Poll<T>) -> Self
    {
        EncryptedPollData {
            encrypted_title: poll.encrypted_title.into_inner(),
            encrypted_options: poll.encrypted_options
                .into_iter()
                .map(|option| option.into_inner())
                .collect(),
            key_handle: poll.key_handle
        }
    }
}
