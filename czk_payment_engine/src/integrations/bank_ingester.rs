use log::*;

use crate::{
    helpers::{BankConfirmation, BankNotificationParser},
    integrations::{Mailbox, MailboxError},
};

/// The default number of confirmations taken from the mailbox in one poll.
pub const DEFAULT_BANK_BATCH_SIZE: usize = 50;

/// Turns unseen bank notifications into `(vs, amount)` confirmations.
///
/// Each poll walks the unseen messages newest first and stops as soon as `max` confirmations have been produced.
/// A message is marked as seen only once a confirmation was extracted from it. Everything else (foreign senders,
/// newsletters, malformed notifications) stays unseen and is looked at again on the next poll. A confirmation is only
/// emitted by the poller whose `mark_seen` succeeded, so concurrent pollers never report the same message twice.
#[derive(Debug, Clone)]
pub struct BankNotificationIngester<M> {
    mailbox: M,
    parser: BankNotificationParser,
    batch_size: usize,
}

impl<M> BankNotificationIngester<M> {
    pub fn new(mailbox: M, parser: BankNotificationParser) -> Self {
        Self { mailbox, parser, batch_size: DEFAULT_BANK_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn parser(&self) -> &BankNotificationParser {
        &self.parser
    }
}

impl<M: Mailbox> BankNotificationIngester<M> {
    /// Polls with the configured batch size.
    pub async fn poll_batch(&self) -> Result<Vec<BankConfirmation>, MailboxError> {
        self.poll(self.batch_size).await
    }

    pub async fn poll(&self, max: usize) -> Result<Vec<BankConfirmation>, MailboxError> {
        let messages = self.mailbox.fetch_unseen().await?;
        trace!("📨️ {} unseen messages in the bank mailbox", messages.len());
        let mut confirmations = Vec::new();
        for message in messages {
            if confirmations.len() >= max {
                break;
            }
            let Some(confirmation) = self.parser.parse(&message) else {
                continue;
            };
            // Another poller that marked the message first owns its confirmation. Any other failure leaves the message
            // unseen, so it comes back on the next poll and reconciliation absorbs the repeat.
            match self.mailbox.mark_seen(&message.id).await {
                Ok(()) => {},
                Err(MailboxError::MessageNotFound(_)) => {
                    debug!("📨️ Message {} was consumed by another poller. Skipping it", message.id);
                    continue;
                },
                Err(e) => warn!("📨️ Could not mark message {} as seen. {e}", message.id),
            }
            let (vs, amount) = (&confirmation.vs, confirmation.amount);
            debug!("📨️ Bank confirmation for vs {vs} ({amount}) read from message {}", message.id);
            confirmations.push(confirmation);
        }
        Ok(confirmations)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        db_types::Czk,
        integrations::{BankMessage, MemoryMailbox, SpoolMailbox},
    };

    fn notification(id: &str, vs: &str, amount: &str) -> BankMessage {
        BankMessage::new(id, "noreply@csob.cz").with_text(format!("VS: {vs}\nČástka: {amount} CZK"))
    }

    #[tokio::test]
    async fn only_parsed_messages_are_consumed() {
        let mailbox = MemoryMailbox::new();
        mailbox.push(notification("1", "111", "100,00")).unwrap();
        mailbox.push(BankMessage::new("2", "spam@example.com").with_text("VS: 222\nČástka: 1,00")).unwrap();
        mailbox.push(BankMessage::new("3", "info@csob.cz").with_text("Výpis z účtu je připraven")).unwrap();
        mailbox.push(notification("4", "444", "339,30")).unwrap();
        let parser = BankNotificationParser::with_default_senders().unwrap();
        let ingester = BankNotificationIngester::new(mailbox.clone(), parser);

        let pairs = ingester.poll(10).await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].vs.as_str(), "444");
        assert_eq!(pairs[0].amount, Czk::from_halere(33_930));
        assert_eq!(pairs[1].vs.as_str(), "111");
        assert!(mailbox.is_seen("1").unwrap());
        assert!(mailbox.is_seen("4").unwrap());
        assert_eq!(mailbox.unseen_count().unwrap(), 2);

        assert!(ingester.poll(10).await.unwrap().is_empty());
    }

    /// Hands out a fixed snapshot, as a poller that fetched before a competitor marked the messages would see it.
    struct StaleView {
        inner: MemoryMailbox,
        snapshot: Vec<BankMessage>,
    }

    impl Mailbox for StaleView {
        async fn fetch_unseen(&self) -> Result<Vec<BankMessage>, MailboxError> {
            Ok(self.snapshot.clone())
        }

        async fn mark_seen(&self, message_id: &str) -> Result<(), MailboxError> {
            self.inner.mark_seen(message_id).await
        }
    }

    #[tokio::test]
    async fn messages_claimed_by_another_poller_are_skipped() {
        let mailbox = MemoryMailbox::new();
        mailbox.push(notification("1", "111", "100,00")).unwrap();
        mailbox.push(notification("2", "222", "200,00")).unwrap();
        let snapshot = mailbox.fetch_unseen().await.unwrap();
        let parser = BankNotificationParser::with_default_senders().unwrap();

        let first = BankNotificationIngester::new(mailbox.clone(), parser.clone());
        let late = BankNotificationIngester::new(StaleView { inner: mailbox.clone(), snapshot }, parser);
        assert_eq!(first.poll(1).await.unwrap().len(), 1);
        let pairs = late.poll(10).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].vs.as_str(), "111");
        assert_eq!(mailbox.unseen_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_pollers_share_a_spool_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=20 {
            let message = notification("", &i.to_string(), "10,00");
            std::fs::write(dir.path().join(format!("{i:04}.json")), serde_json::to_vec(&message).unwrap()).unwrap();
        }
        let parser = BankNotificationParser::with_default_senders().unwrap();
        let a = BankNotificationIngester::new(SpoolMailbox::new(dir.path()), parser.clone());
        let b = BankNotificationIngester::new(SpoolMailbox::new(dir.path()), parser);

        let (from_a, from_b) = tokio::join!(
            tokio::spawn(async move { a.poll(100).await.unwrap() }),
            tokio::spawn(async move { b.poll(100).await.unwrap() })
        );
        let mut symbols =
            from_a.unwrap().into_iter().chain(from_b.unwrap()).map(|c| c.vs.to_string()).collect::<Vec<_>>();
        assert_eq!(symbols.len(), 20);
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), 20);
    }

    #[tokio::test]
    async fn polls_are_bounded() {
        let mailbox = MemoryMailbox::new();
        for i in 1..=5 {
            mailbox.push(notification(&i.to_string(), &i.to_string(), "10,00")).unwrap();
        }
        let parser = BankNotificationParser::with_default_senders().unwrap();
        let ingester = BankNotificationIngester::new(mailbox.clone(), parser).with_batch_size(2);
        let first = ingester.poll_batch().await.unwrap();
        assert_eq!(first.iter().map(|c| c.vs.as_str()).collect::<Vec<_>>(), vec!["5", "4"]);
        let rest = ingester.poll(10).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(mailbox.unseen_count().unwrap(), 0);
    }
}
