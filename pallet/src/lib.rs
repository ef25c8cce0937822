#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

pub mod engine;
pub mod poll;

#[cfg(test)]
mod mock;


#[cfg(feature = "runtime-benchmarks")]
pub mod benchmarking;

pub(crate) const LOG_TARGET: &str = "runtime::confidential-polls";

#[frame_support::pallet]
pub mod pallet
{
	use sp_std::vec;
	use frame_support::pallet_prelude::*;
	use frame_support::traits::UnixTime;
	use frame_system::pallet_prelude::*;
	use crate::engine::{CiphertextHandle, ConfidentialEngine, EngineError};
	use crate::poll::{
		is_zero_account,
		valid_option_count,
		Ciphertext,
		EncryptedOptions,
		EncryptedPollData,
		EncryptedTally,
		EncryptedText,
		GrantIndex,
		InputProof,
		Poll,
		PollId,
		PollMetadata,
		Timestamp,
		VoteCounts
	};

	#[cfg(feature = "runtime-benchmarks")]
	use crate::benchmarking::BenchmarkHelper;

	const STORAGE_VERSION: StorageVersion = StorageVersion::new(0);

	#[pallet::pallet]
	#[pallet::storage_version(STORAGE_VERSION)]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::config]
	pub trait Config: frame_system::Config
	{
		/// The overarching event type.
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		/// Permit access to the current "timestamp" represented in milliseconds.
		type TimeProvider: UnixTime;

		/// The confidential compute engine which owns every ciphertext handle.
		type Engine: ConfidentialEngine<Self::AccountId>;

		/// The maximum length of an encrypted poll title or option.
		#[pallet::constant]
		type MaxTextLength: Get<u32>;

		/// The maximum length of a ciphertext submitted for registration.
		#[pallet::constant]
		type MaxCiphertextLength: Get<u32>;

		/// The maximum length of an input proof.
		#[pallet::constant]
		type MaxProofLength: Get<u32>;

		/// The maximum number of principals which may hold key access to a poll, the creator included.
		/// Bounds the re-authorization performed by every ballot, so must be at least one.
		#[pallet::constant]
		type MaxKeyHolders: Get<u32>;

		/// The maximum number of polls a single account may create, unbounded if zero.
		#[pallet::constant]
		type MaxCreatorPolls: Get<u32>;

		/// Produces engine-acceptable encrypted inputs.
		#[cfg(feature = "runtime-benchmarks")]
		type BenchmarkHelper: BenchmarkHelper<Self::AccountId>;
	}

	#[pallet::event]
	#[pallet::generate_deposit(pub(super) fn deposit_event)]
	pub enum Event<T: Config>
	{
		/// A new poll was created.
		PollCreated {
			/// The poll index.
			poll_id: PollId,
			/// The poll creator.
			creator: T::AccountId,
			/// The number of options offered.
			option_count: u32
		},

		/// A principal was permitted to decrypt the key and tallies of a poll.
		KeyAccessGranted {
			/// The poll index.
			poll_id: PollId,
			/// The poll creator.
			grantor: T::AccountId,
			/// The newly authorized principal.
			grantee: T::AccountId
		},

		/// An encrypted ballot was counted.
		VoteSubmitted {
			/// The poll index.
			poll_id: PollId,
			/// The voter.
			voter: T::AccountId
		}
	}

	#[pallet::error]
	pub enum Error<T>
	{
		/// A poll must offer between two and four options.
		InvalidOptionCount,

		/// The engine rejected a ciphertext or its input proof.
		InvalidCiphertextProof,

		/// Poll does not exist.
		PollNotFound,

		/// Only the poll creator may perform this action.
		Unauthorized,

		/// Access may not be granted to the null account.
		ZeroAddress,

		/// The grantee already holds access to the poll key.
		DuplicateAccess,

		/// The voter has already cast a ballot in the poll.
		AlreadyVoted,

		/// An encrypted title or option exceeds the permitted length.
		CiphertextTooLong,

		/// The poll has reached the maximum number of key holders.
		KeyHolderLimitReached,

		/// The engine failed to perform a homomorphic operation.
		ComputeFailed,

		/// The caller has created the maximum number of polls.
		CreatorPollLimitReached
	}

	impl<T> From<EngineError> for Error<T>
	{
		fn from(error: EngineError) -> Self
		{
			match error
			{
				EngineError::InvalidProof => Error::<T>::InvalidCiphertextProof,
				EngineError::UnknownHandle
				| EngineError::AccessDenied
				| EngineError::ComputeFailed => Error::<T>::ComputeFailed,
			}
		}
	}

	/// Map of ids to polls.
	#[pallet::storage]
	#[pallet::getter(fn polls)]
	pub type Polls<T: Config> = CountedStorageMap<
		_,
		Twox64Concat,
		PollId,
		Poll<T>
	>;

	/// Map of poll ids to the encrypted running tally of each option.
	#[pallet::storage]
	pub type PollVoteCounts<T: Config> = StorageMap<
		_,
		Twox64Concat,
		PollId,
		VoteCounts
	>;

	/// The principals permitted to decrypt the key and tallies of a poll, with the
	/// order in which they were granted.
	#[pallet::storage]
	pub type KeyAccess<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		PollId,
		Blake2_128Concat,
		T::AccountId,
		GrantIndex
	>;

	/// Map of poll ids to the number of principals granted key access.
	#[pallet::storage]
	pub type KeyAccessCount<T: Config> = StorageMap<
		_,
		Twox64Concat,
		PollId,
		u32,
		ValueQuery
	>;

	/// The principals which have cast a ballot in a poll.
	#[pallet::storage]
	pub type Ballots<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		PollId,
		Blake2_128Concat,
		T::AccountId,
		()
	>;

	/// Map of poll ids to the number of ballots cast.
	#[pallet::storage]
	pub type BallotCount<T: Config> = StorageMap<
		_,
		Twox64Concat,
		PollId,
		u32,
		ValueQuery
	>;

	/// Map of creators to the poll ids they created.
	#[pallet::storage]
	#[pallet::getter(fn polls_created_by)]
	pub type CreatorPollIds<T: Config> = StorageMap<
		_,
		Blake2_128Concat,
		T::AccountId,
		vec::Vec<PollId>,
		ValueQuery
	>;

	#[pallet::hooks]
	impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T>
	{
		fn integrity_test()
		{
			assert!(
				T::MaxKeyHolders::get() >= 1,
				"`MaxKeyHolders` must leave room for the poll creator"
			);
		}

		#[cfg(feature = "try-runtime")]
		fn try_state(_n: BlockNumberFor<T>) -> Result<(), sp_runtime::TryRuntimeError>
		{
			Self::do_try_state()
		}
	}

	#[pallet::call]
	impl<T: Config> Pallet<T>
	{
		/// Create a new poll from content encrypted off-chain, where the caller is the creator.
		///
		/// - `encrypted_title`: The encrypted poll title.
		/// - `encrypted_options`: Between two and four encrypted options.
		/// - `key_ciphertext`: The shared key, encrypted for the engine.
		/// - `key_proof`: The input proof for `key_ciphertext`.
		///
		/// Emits `PollCreated`.
		#[pallet::call_index(0)]
		#[pallet::weight(T::DbWeight::get().reads_writes(3, 6))]
		pub fn create_poll(
			origin: OriginFor<T>,
			encrypted_title: vec::Vec<u8>,
			encrypted_options: vec::Vec<vec::Vec<u8>>,
			key_ciphertext: Ciphertext<T>,
			key_proof: InputProof<T>
		) -> DispatchResult
		{
			// Check that the extrinsic was signed and get the signer.
			let creator = ensure_signed(origin)?;

			ensure!(
				valid_option_count(encrypted_options.len()),
				Error::<T>::InvalidOptionCount
			);

			let encrypted_title: EncryptedText<T> = encrypted_title
				.try_into()
				.map_err(|_| Error::<T>::CiphertextTooLong)?;

			let encrypted_options: EncryptedOptions<T> = encrypted_options
				.into_iter()
				.map(|option| EncryptedText::<T>::try_from(option))
				.collect::<Result<vec::Vec<_>, _>>()
				.map_err(|_| Error::<T>::CiphertextTooLong)?
				.try_into()
				.map_err(|_| Error::<T>::InvalidOptionCount)?;

			// An account may create at most `MaxCreatorPolls` polls, skipped if zero.
			let max_polls = T::MaxCreatorPolls::get() as usize;
			ensure!(
				max_polls == 0 || Self::polls_created_by(&creator).len() < max_polls,
				Error::<T>::CreatorPollLimitReached
			);

			let option_count = encrypted_options.len() as u32;

			// Every engine call precedes the first storage write.
			let key_handle = T::Engine::register_ciphertext(&creator, &key_ciphertext, &key_proof)
				.map_err(Error::<T>::from)?;
			let vote_counts = VoteCounts::zeroed::<T::Engine>(option_count)
				.map_err(Error::<T>::from)?;
			T::Engine::authorize_decryption(&Self::secret_handles(&key_handle, &vote_counts), &creator)
				.map_err(Error::<T>::from)?;

			let index = Polls::<T>::count();
			let created_at: Timestamp = T::TimeProvider::now().as_millis() as Timestamp;

			Polls::<T>::insert(index, Poll {
				index,
				creator: creator.clone(),
				created_at,
				encrypted_title,
				encrypted_options,
				key_handle
			});
			PollVoteCounts::<T>::insert(index, vote_counts);
			Self::insert_key_access(index, &creator, 0);
			CreatorPollIds::<T>::append(&creator, index);

			log::debug!(target: crate::LOG_TARGET, "poll {} created with {} options", index, option_count);

			Self::deposit_event(Event::PollCreated {
				poll_id: index,
				creator,
				option_count
			});

			Ok(())
		}

		/// Permit another principal to decrypt the key and tallies of a poll.
		/// Only the poll creator may grant access, and a grant can not be revoked.
		///
		/// - `poll_id`: The id of the poll.
		/// - `grantee`: The principal to authorize.
		///
		/// Emits `KeyAccessGranted`.
		#[pallet::call_index(1)]
		#[pallet::weight(T::DbWeight::get().reads_writes(4, 2))]
		pub fn grant_key_access(
			origin: OriginFor<T>,
			poll_id: PollId,
			grantee: T::AccountId
		) -> DispatchResult
		{
			// Check that the extrinsic was signed and get the signer.
			let grantor = ensure_signed(origin)?;

			let poll = Polls::<T>::get(poll_id).ok_or(Error::<T>::PollNotFound)?;

			// The null account is refused whoever the caller.
			ensure!(!is_zero_account(&grantee), Error::<T>::ZeroAddress);
			ensure!(poll.creator == grantor, Error::<T>::Unauthorized);
			ensure!(
				!KeyAccess::<T>::contains_key(poll_id, &grantee),
				Error::<T>::DuplicateAccess
			);
			let holders = KeyAccessCount::<T>::get(poll_id);
			ensure!(holders < T::MaxKeyHolders::get(), Error::<T>::KeyHolderLimitReached);

			let vote_counts = PollVoteCounts::<T>::get(poll_id).ok_or(Error::<T>::PollNotFound)?;
			T::Engine::authorize_decryption(&Self::secret_handles(&poll.key_handle, &vote_counts), &grantee)
				.map_err(Error::<T>::from)?;

			Self::insert_key_access(poll_id, &grantee, holders);

			log::debug!(target: crate::LOG_TARGET, "poll {} key access granted", poll_id);

			Self::deposit_event(Event::KeyAccessGranted {
				poll_id,
				grantor,
				grantee
			});

			Ok(())
		}

		/// Cast an encrypted ballot. The chosen option index is never revealed; each
		/// tally is incremented under encryption iff it matches the choice.
		///
		/// - `poll_id`: The id of the poll.
		/// - `encrypted_choice`: The option index, encrypted for the engine.
		/// - `choice_proof`: The input proof for `encrypted_choice`.
		///
		/// Emits `VoteSubmitted`.
		#[pallet::call_index(2)]
		#[pallet::weight(T::DbWeight::get().reads_writes(4 + T::MaxKeyHolders::get() as u64, 3))]
		pub fn submit_vote(
			origin: OriginFor<T>,
			poll_id: PollId,
			encrypted_choice: Ciphertext<T>,
			choice_proof: InputProof<T>
		) -> DispatchResult
		{
			// Check that the extrinsic was signed and get the signer.
			let voter = ensure_signed(origin)?;

			let poll = Polls::<T>::get(poll_id).ok_or(Error::<T>::PollNotFound)?;

			// Each principal may only vote once per poll.
			ensure!(
				!Ballots::<T>::contains_key(poll_id, &voter),
				Error::<T>::AlreadyVoted
			);

			let selector = T::Engine::register_selector(
				&voter,
				&encrypted_choice,
				&choice_proof,
				poll.option_count()
			)
				.map_err(Error::<T>::from)?;

			// Stage the updated tally, the stored one is only replaced once every slot succeeded.
			let vote_counts = PollVoteCounts::<T>::get(poll_id)
				.ok_or(Error::<T>::PollNotFound)?
				.increment::<T::Engine>(&selector)
				.map_err(Error::<T>::from)?;

			// Fresh handles must be re-authorized for every key holder.
			for holder in KeyAccess::<T>::iter_key_prefix(poll_id)
			{
				T::Engine::authorize_decryption(&vote_counts, &holder)
					.map_err(Error::<T>::from)?;
			}

			PollVoteCounts::<T>::insert(poll_id, vote_counts);
			Ballots::<T>::insert(poll_id, &voter, ());
			BallotCount::<T>::mutate(poll_id, |count| *count = count.saturating_add(1));

			log::debug!(target: crate::LOG_TARGET, "poll {} ballot counted", poll_id);

			Self::deposit_event(Event::VoteSubmitted { poll_id, voter });

			Ok(())
		}
	}

	impl<T: Config> Pallet<T>
	{
		/// The number of polls ever created.
		pub fn poll_count() -> u32
		{
			Polls::<T>::count()
		}

		/// The creator, creation time and option count of a poll.
		pub fn poll_metadata(poll_id: PollId) -> Result<PollMetadata<T::AccountId>, Error<T>>
		{
			let poll = Polls::<T>::get(poll_id).ok_or(Error::<T>::PollNotFound)?;

			Ok(PollMetadata {
				option_count: poll.option_count(),
				creator: poll.creator,
				created_at: poll.created_at
			})
		}

		/// The encrypted title, options and key handle of a poll.
		pub fn encrypted_poll_data(poll_id: PollId) -> Result<EncryptedPollData, Error<T>>
		{
			Polls::<T>::get(poll_id)
				.map(EncryptedPollData::from)
				.ok_or(Error::<T>::PollNotFound)
		}

		/// The current tally handles of a poll, in option order.
		pub fn encrypted_vote_counts(poll_id: PollId) -> Result<vec::Vec<CiphertextHandle>, Error<T>>
		{
			PollVoteCounts::<T>::get(poll_id)
				.map(|counts| counts.into_inner())
				.ok_or(Error::<T>::PollNotFound)
		}

		/// Returns true iff `who` has cast a ballot in the poll.
		pub fn has_voted(poll_id: PollId, who: &T::AccountId) -> bool
		{
			Ballots::<T>::contains_key(poll_id, who)
		}

		/// Returns true iff `who` may request decryption of the poll key and tallies.
		pub fn has_key_access(poll_id: PollId, who: &T::AccountId) -> bool
		{
			if KeyAccess::<T>::contains_key(poll_id, who) { return true; }

			Polls::<T>::get(poll_id)
				.map(|poll| poll.creator == *who)
				.unwrap_or(false)
		}

		/// The number of principals holding key access, the creator included.
		pub fn key_access_count(poll_id: PollId) -> u32
		{
			KeyAccessCount::<T>::get(poll_id)
		}

		/// The number of ballots cast in the poll.
		pub fn ballot_count(poll_id: PollId) -> u32
		{
			BallotCount::<T>::get(poll_id)
		}

		fn secret_handles(key_handle: &CiphertextHandle, vote_counts: &VoteCounts) -> vec::Vec<CiphertextHandle>
		{
			let mut handles = vec::Vec::with_capacity(vote_counts.len() + 1);
			handles.push(*key_handle);
			handles.extend(vote_counts.iter().copied());
			handles
		}

		/// Record `who` as a key holder, where `index` is the current holder count.
		fn insert_key_access(poll_id: PollId, who: &T::AccountId, index: GrantIndex)
		{
			KeyAccess::<T>::insert(poll_id, who, index);
			KeyAccessCount::<T>::insert(poll_id, index.saturating_add(1));
		}

		/// Check the invariants which must hold for every poll.
		#[cfg(any(feature = "try-runtime", test))]
		pub fn do_try_state() -> Result<(), sp_runtime::TryRuntimeError>
		{
			let count = Polls::<T>::count();

			for (index, poll) in Polls::<T>::iter()
			{
				ensure!(index < count && poll.index == index, "Poll ids must be dense and sequential");
				ensure!(
					valid_option_count(poll.encrypted_options.len()),
					"Poll option count out of range"
				);

				let vote_counts = PollVoteCounts::<T>::get(index).ok_or("Poll is missing its tally")?;
				ensure!(
					vote_counts.len() == poll.encrypted_options.len(),
					"Tally length must equal the option count"
				);

				ensure!(
					KeyAccess::<T>::contains_key(index, &poll.creator),
					"Creator must hold key access"
				);
				ensure!(
					KeyAccess::<T>::iter_prefix(index).count() as u32 == KeyAccessCount::<T>::get(index),
					"Key access count mismatch"
				);
				ensure!(
					Ballots::<T>::iter_prefix(index).count() as u32 == BallotCount::<T>::get(index),
					"Ballot count mismatch"
				);
			}

			ensure!(
				PollVoteCounts::<T>::iter_keys().all(|index| index < count),
				"Tally stored for an unknown poll"
			);

			Ok(())
		}
	}
}
