use sp_std::vec;
use crate::engine::{
    CiphertextHandle,
    EngineError,
    HomomorphicCompute,
    ValueWidth
};
use crate::poll::{VoteCounts, MAX_POLL_OPTIONS};

/// The plaintext width of each tally slot.
pub const TALLY_WIDTH: ValueWidth = ValueWidth::U32;

pub trait EncryptedTally: Sized
{
    /// Create a tally of `option_count` encrypted zeroes.
    fn zeroed<E: HomomorphicCompute>(option_count: u32) -> Result<Self, EngineError>;

    /// Consumes the tally and produces one in which the option encoded by
    /// `selector` has been incremented. Nothing is returned unless every slot
    /// was updated, so a failure leaves the stored tally as it was.
    fn increment<E: HomomorphicCompute>(self, selector: &CiphertextHandle) -> Result<Self, EngineError>;
}

impl EncryptedTally for VoteCounts
{
    fn zeroed<E: HomomorphicCompute>(option_count: u32) -> Result<Self, EngineError>
    {
        if option_count > MAX_POLL_OPTIONS { Err(EngineError::ComputeFailed)? }

        let handles = (0..option_count)
            .map(|_| E::encrypted_zero(TALLY_WIDTH))
            .collect::<Result<vec::Vec<CiphertextHandle>, EngineError>>()?;

        VoteCounts::try_from(handles).map_err(|_| EngineError::ComputeFailed)
    }

    fn increment<E: HomomorphicCompute>(mut self, selector: &CiphertextHandle) -> Result<Self, EngineError>
    {
        for (index, slot) in self.iter_mut().enumerate()
        {
            *slot = E::conditional_increment(slot, selector, index as u32)?;
        }

        Ok(self)
    }
}
