use thiserror::Error;

use crate::{integrations::MailboxError, traits::PaymentGatewayError};

#[derive(Debug, Clone, Error)]
pub enum BankSyncError {
    #[error("{0}")]
    Database(#[from] PaymentGatewayError),
    #[error("{0}")]
    Mailbox(#[from] MailboxError),
}
