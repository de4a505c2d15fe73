use crate::{
    db_types::Vs,
    traits::{PaymentGatewayError, VsPolicy},
};

/// An append-only registry of variable symbols.
///
/// A token may be reserved at most once, for all time. Reservations are never updated or released, even if the order
/// that used the token is deleted later.
#[allow(async_fn_in_trait)]
pub trait VsRegistry {
    /// Reserves the given token. Fails with [`PaymentGatewayError::VsAlreadyTaken`] if it was reserved before.
    async fn reserve_exact(&self, vs: &Vs) -> Result<(), PaymentGatewayError>;

    /// Generates random candidates and reserves the first free one. Gives up with
    /// [`PaymentGatewayError::VsExhausted`] after `policy.max_attempts` collisions.
    async fn reserve_new(&self, policy: VsPolicy) -> Result<Vs, PaymentGatewayError>;

    async fn is_reserved(&self, vs: &Vs) -> Result<bool, PaymentGatewayError>;
}
