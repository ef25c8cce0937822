use codec::Decode;
use sp_runtime::traits::TrailingZeroInput;

/// Returns true iff `who` is the account decoded from all-zero bytes, the null principal.
pub fn is_zero_account<AccountId: Decode + PartialEq>(who: &AccountId) -> bool
{
    match AccountId::decode(&mut TrailingZeroInput::zeroes())
    {
        Ok(zero) => *who == zero,
        Err(_) => false
    }
}
