// 6.0 fees.rs: fee policy collaborator. the engine asks it for a trade fee at
// open (on the down payment) and again at close (on the residual payout), and
// for the address the collected fees go to.

use crate::types::{Address, Amount, Bps};
use serde::{Deserialize, Serialize};

pub trait FeePolicy {
    fn compute_trade_fee(&self, amount: Amount) -> Amount;
    fn fee_receiver(&self) -> Address;
}

/// Flat basis-point fee policy. 500 bps charges 5 on a 100 down payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpsFeePolicy {
    pub rate: Bps,
    pub receiver: Address,
}

impl BpsFeePolicy {
    pub fn new(rate: Bps, receiver: Address) -> Self {
        Self { rate, receiver }
    }
}

impl FeePolicy for BpsFeePolicy {
    fn compute_trade_fee(&self, amount: Amount) -> Amount {
        self.rate.apply(amount)
    }

    fn fee_receiver(&self) -> Address {
        self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_percent_of_hundred_is_five() {
        let policy = BpsFeePolicy::new(Bps::new(500), Address([5u8; 32]));
        assert_eq!(policy.compute_trade_fee(Amount::new(100)), Amount::new(5));
        assert_eq!(policy.compute_trade_fee(Amount::ZERO), Amount::ZERO);
        assert_eq!(policy.fee_receiver(), Address([5u8; 32]));
    }
}
