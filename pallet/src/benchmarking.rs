use super::*;
use crate::poll::{Ciphertext, InputProof, PollId, MAX_POLL_OPTIONS};
use frame_benchmarking::{account, benchmarks, whitelisted_caller};
use frame_support::traits::Get;
use frame_system::RawOrigin;
use sp_std::vec;

use crate::Pallet as ConfidentialPolls;

const SEED: u32 = 0;

pub trait BenchmarkHelper<AccountId>
{
    /// A ciphertext of `value` together with an input proof the engine accepts from `who`.
    fn encrypted_input(who: &AccountId, value: u64) -> (vec::Vec<u8>, vec::Vec<u8>);
}

fn encrypted_input<T: Config>(who: &T::AccountId, value: u64) -> (Ciphertext<T>, InputProof<T>)
{
    let (payload, proof) = T::BenchmarkHelper::encrypted_input(who, value);
    (
        payload.try_into().expect("ciphertext within bounds"),
        proof.try_into().expect("proof within bounds")
    )
}

fn setup_poll<T: Config>(creator: &T::AccountId, key_holders: u32) -> PollId
{
    let (key, proof) = encrypted_input::<T>(creator, 7);
    let text = vec![1u8; T::MaxTextLength::get() as usize];
    let options = vec![text.clone(); MAX_POLL_OPTIONS as usize];

    ConfidentialPolls::<T>::create_poll(RawOrigin::Signed(creator.clone()).into(), text, options, key, proof)
        .expect("poll created");

    let poll_id = ConfidentialPolls::<T>::poll_count() - 1;
    for i in 1..key_holders
    {
        let grantee: T::AccountId = account("holder", i, SEED);
        ConfidentialPolls::<T>::grant_key_access(RawOrigin::Signed(creator.clone()).into(), poll_id, grantee)
            .expect("access granted");
    }

    poll_id
}

benchmarks!
{
    create_poll {
        let caller: T::AccountId = whitelisted_caller();
        let (key, proof) = encrypted_input::<T>(&caller, 7);
        let text = vec![1u8; T::MaxTextLength::get() as usize];
        let options = vec![text.clone(); MAX_POLL_OPTIONS as usize];
    }: _(RawOrigin::Signed(caller.clone()), text, options, key, proof)
    verify {
        assert_eq!(ConfidentialPolls::<T>::poll_count(), 1);
        assert!(ConfidentialPolls::<T>::has_key_access(0, &caller));
    }

    grant_key_access {
        let caller: T::AccountId = whitelisted_caller();
        let poll_id = setup_poll::<T>(&caller, 1);
        let grantee: T::AccountId = account("grantee", 0, SEED);
    }: _(RawOrigin::Signed(caller), poll_id, grantee.clone())
    verify {
        assert!(ConfidentialPolls::<T>::has_key_access(poll_id, &grantee));
    }

    submit_vote {
        let h in 1 .. T::MaxKeyHolders::get();
        let creator: T::AccountId = account("creator", 0, SEED);
        let poll_id = setup_poll::<T>(&creator, h);
        let voter: T::AccountId = whitelisted_caller();
        let (choice, proof) = encrypted_input::<T>(&voter, 0);
    }: _(RawOrigin::Signed(voter.clone()), poll_id, choice, proof)
    verify {
        assert!(ConfidentialPolls::<T>::has_voted(poll_id, &voter));
    }

    impl_benchmark_test_suite!(ConfidentialPolls, crate::mock::new_test_ext(), crate::mock::Test);
}
