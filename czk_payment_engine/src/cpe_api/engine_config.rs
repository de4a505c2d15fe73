use cpg_common::Czk;

use crate::traits::VsPolicy;

pub const DEFAULT_SHIPPING_FEE: Czk = Czk::from_halere(89_00);
pub const DEFAULT_PAYMENT_TOLERANCE: Czk = Czk::from_halere(50);

/// The business knobs of the engine. Every API that computes or compares money takes a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Flat shipping fee added to every order.
    pub shipping_fee: Czk,
    /// A bank payment matches an order when it is within this distance of the expected total.
    pub tolerance: Czk,
    pub vs_policy: VsPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shipping_fee: DEFAULT_SHIPPING_FEE,
            tolerance: DEFAULT_PAYMENT_TOLERANCE,
            vs_policy: VsPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_shipping_fee(mut self, fee: Czk) -> Self {
        self.shipping_fee = fee;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Czk) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    pub fn with_vs_policy(mut self, policy: VsPolicy) -> Self {
        self.vs_policy = policy;
        self
    }

    pub fn amounts_match(&self, paid: Czk, expected: Czk) -> bool {
        paid.abs_diff(expected) <= self.tolerance
    }
}
