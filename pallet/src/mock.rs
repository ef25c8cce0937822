use crate::*;
use crate as pallet_confidential_polls;
use crate::engine::{
	CiphertextHandle,
	ConfidentialEngine,
	DecryptionOracle,
	EngineError,
	HomomorphicCompute,
	ValueWidth
};
use codec::{Decode, Encode};
use core::cell::RefCell;
use core::time::Duration;
use frame_support::{
	derive_impl,
	parameter_types,
	traits::{ConstU32, ConstU64, UnixTime}
};
use sp_core::{hashing::blake2_256, H256};
use sp_runtime::{
	traits::{BlakeTwo256, IdentityLookup},
	BuildStorage,
};
use std::collections::{BTreeMap, BTreeSet};

type Block = frame_system::mocking::MockBlock<Test>;

/// Milliseconds per block.
pub const BLOCK_TIME: u64 = 6_000;

frame_support::construct_runtime!(
	pub enum Test
	{
		System: frame_system::{Pallet, Call, Config<T>, Storage, Event<T>},
		ConfidentialPolls: pallet_confidential_polls::{Pallet, Call, Storage, Event<T>},
	}
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig as frame_system::DefaultConfig)]
impl frame_system::Config for Test {
	type Nonce = u64;
	type Hash = H256;
	type Hashing = BlakeTwo256;
	type AccountId = u64;
	type Lookup = IdentityLookup<Self::AccountId>;
	type Block = Block;
	type BlockHashCount = ConstU64<250>;
	type MaxConsumers = ConstU32<16>;
}

parameter_types! {
	pub static MaxKeyHolders: u32 = 8;
	pub static MaxCreatorPolls: u32 = 16;
}

impl Config for Test {
	type RuntimeEvent = RuntimeEvent;
	type TimeProvider = MockTime;
	type Engine = MockEngine;
	type MaxTextLength = ConstU32<128>;
	type MaxCiphertextLength = ConstU32<64>;
	type MaxProofLength = ConstU32<64>;
	type MaxKeyHolders = MaxKeyHolders;
	type MaxCreatorPolls = MaxCreatorPolls;
	#[cfg(feature = "runtime-benchmarks")]
	type BenchmarkHelper = MockEngine;
}

/// Block timestamps advance by `BLOCK_TIME` per block.
pub struct MockTime;

impl UnixTime for MockTime
{
	fn now() -> Duration
	{
		Duration::from_millis(System::block_number() * BLOCK_TIME)
	}
}

#[derive(Default)]
struct EngineState
{
	/// Source of fresh handles.
	nonce: u64,

	/// The plaintext behind every handle.
	values: BTreeMap<CiphertextHandle, u64>,

	/// The (handle, account) pairs permitted to decrypt.
	allowed: BTreeSet<(CiphertextHandle, u64)>,

	/// Remaining increments before `conditional_increment` starts failing.
	increments_until_failure: Option<u32>,

	/// Remaining zeroes before `encrypted_zero` starts failing.
	zeroes_until_failure: Option<u32>,

	/// Remaining calls before `authorize_decryption` starts failing.
	authorizations_until_failure: Option<u32>
}

thread_local! {
	static ENGINE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

/// An in-memory stand-in for the confidential compute engine. Ciphertexts are the
/// SCALE encoding of a `u64`, and an input proof is the hash of the submitter and payload.
pub struct MockEngine;

impl MockEngine
{
	pub fn reset()
	{
		ENGINE.with(|engine| *engine.borrow_mut() = EngineState::default());
	}

	/// Let `n` increments succeed, then fail every one after.
	pub fn fail_after_increments(n: u32)
	{
		ENGINE.with(|engine| engine.borrow_mut().increments_until_failure = Some(n));
	}

	/// Let `n` encrypted zeroes succeed, then fail every one after.
	pub fn fail_after_zeroes(n: u32)
	{
		ENGINE.with(|engine| engine.borrow_mut().zeroes_until_failure = Some(n));
	}

	/// Let `n` authorizations succeed, then fail every one after.
	pub fn fail_after_authorizations(n: u32)
	{
		ENGINE.with(|engine| engine.borrow_mut().authorizations_until_failure = Some(n));
	}

	/// Encrypt `value` for submission by `who`.
	pub fn encrypt(who: u64, value: u64) -> (Vec<u8>, Vec<u8>)
	{
		let payload = value.encode();
		let proof = Self::proof_for(&who, &payload);
		(payload, proof)
	}

	/// The number of handles ever issued.
	pub fn handle_count() -> u64
	{
		ENGINE.with(|engine| engine.borrow().nonce)
	}

	/// Consume one use of a failure budget, returning true once it is exhausted.
	fn exhausted(budget: fn(&mut EngineState) -> &mut Option<u32>) -> bool
	{
		ENGINE.with(|engine| {
			let mut engine = engine.borrow_mut();
			match budget(&mut *engine)
			{
				Some(0) => true,
				Some(remaining) => { *remaining -= 1; false },
				None => false
			}
		})
	}

	fn proof_for(who: &u64, payload: &[u8]) -> Vec<u8>
	{
		blake2_256(&(who, payload).encode()).to_vec()
	}

	fn store(value: u64) -> CiphertextHandle
	{
		ENGINE.with(|engine| {
			let mut engine = engine.borrow_mut();
			engine.nonce += 1;
			let handle = blake2_256(&(b"handle", engine.nonce).encode());
			engine.values.insert(handle, value);
			handle
		})
	}

	fn value_of(handle: &CiphertextHandle) -> Result<u64, EngineError>
	{
		ENGINE.with(|engine| engine.borrow().values.get(handle).copied())
			.ok_or(EngineError::UnknownHandle)
	}

	fn verify(caller: &u64, payload: &[u8], proof: &[u8]) -> Result<u64, EngineError>
	{
		if Self::proof_for(caller, payload) != proof { Err(EngineError::InvalidProof)? }
		u64::decode(&mut &payload[..]).map_err(|_| EngineError::InvalidProof)
	}
}

impl HomomorphicCompute for MockEngine
{
	fn encrypted_zero(width: ValueWidth) -> Result<CiphertextHandle, EngineError>
	{
		if width != ValueWidth::U32 { Err(EngineError::ComputeFailed)? }
		if Self::exhausted(|engine| &mut engine.zeroes_until_failure) { Err(EngineError::ComputeFailed)? }
		Ok(Self::store(0))
	}

	fn conditional_increment(
		tally: &CiphertextHandle,
		selector: &CiphertextHandle,
		option_index: u32
	) -> Result<CiphertextHandle, EngineError>
	{
		if Self::exhausted(|engine| &mut engine.increments_until_failure) { Err(EngineError::ComputeFailed)? }

		let count = Self::value_of(tally)?;
		let choice = Self::value_of(selector)?;
		let increment = if choice == option_index as u64 { 1 } else { 0 };

		Ok(Self::store(count + increment))
	}
}

impl ConfidentialEngine<u64> for MockEngine
{
	fn register_ciphertext(
		caller: &u64,
		payload: &[u8],
		proof: &[u8]
	) -> Result<CiphertextHandle, EngineError>
	{
		let value = Self::verify(caller, payload, proof)?;
		Ok(Self::store(value))
	}

	fn register_selector(
		caller: &u64,
		payload: &[u8],
		proof: &[u8],
		option_count: u32
	) -> Result<CiphertextHandle, EngineError>
	{
		let choice = Self::verify(caller, payload, proof)?;
		if choice >= option_count as u64 { Err(EngineError::InvalidProof)? }
		Ok(Self::store(choice))
	}

	fn authorize_decryption(
		handles: &[CiphertextHandle],
		principal: &u64
	) -> Result<(), EngineError>
	{
		if Self::exhausted(|engine| &mut engine.authorizations_until_failure) { Err(EngineError::ComputeFailed)? }
		for handle in handles { Self::value_of(handle)?; }

		ENGINE.with(|engine| {
			let mut engine = engine.borrow_mut();
			for handle in handles { engine.allowed.insert((*handle, *principal)); }
		});

		Ok(())
	}
}

impl DecryptionOracle<u64> for MockEngine
{
	fn request_decryption(
		handle: &CiphertextHandle,
		principal: &u64
	) -> Result<u64, EngineError>
	{
		let allowed = ENGINE.with(|engine| engine.borrow().allowed.contains(&(*handle, *principal)));
		if !allowed { Err(EngineError::AccessDenied)? }
		Self::value_of(handle)
	}
}

#[cfg(feature = "runtime-benchmarks")]
impl crate::benchmarking::BenchmarkHelper<u64> for MockEngine
{
	fn encrypted_input(who: &u64, value: u64) -> (Vec<u8>, Vec<u8>)
	{
		Self::encrypt(*who, value)
	}
}

pub fn new_test_ext() -> sp_io::TestExternalities {
	MockEngine::reset();
	MaxKeyHolders::set(8);
	MaxCreatorPolls::set(16);

	let t = frame_system::GenesisConfig::<Test>::default()
		.build_storage()
		.unwrap();

	let mut ext: sp_io::TestExternalities = t.into();
	ext.execute_with(|| System::set_block_number(1));
	ext
}
