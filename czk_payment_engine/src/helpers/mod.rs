mod bank_notification;
mod spd;

pub use bank_notification::{BankConfirmation, BankNotificationParser, DEFAULT_BANK_SENDERS};
pub use spd::{SpdError, SpdPayment, SPD_MAX_MESSAGE_LEN};
