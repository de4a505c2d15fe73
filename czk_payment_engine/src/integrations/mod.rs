//! Collaborators at the edges of the engine: where bank notifications come from, how invoices are laid out, and how
//! messages leave the system.
mod bank_ingester;
mod invoice;
mod mailbox;
mod notifier;

pub use bank_ingester::{BankNotificationIngester, DEFAULT_BANK_BATCH_SIZE};
pub use invoice::{InvoiceData, InvoiceError, InvoiceRenderer, PlainTextInvoice};
pub use mailbox::{BankMessage, Mailbox, MailboxError, MemoryMailbox, SpoolMailbox, SEEN_DIR};
pub use notifier::{
    Attachment,
    LogNotifier,
    Notifier,
    NotifierChannel,
    NotifierError,
    OutboundMessage,
    SpoolNotifier,
    TelegramNotifier,
    TELEGRAM_API_BASE,
};
