//! # Bank notification parsing
//!
//! The bank announces every incoming transfer with an e-mail. There is no machine-readable payload, so the variable
//! symbol and the amount are scraped from the message itself. Two layouts are understood:
//!
//! * The HTML table the bank uses in its current notifications:
//!   ```text
//!   <td>Variabilní symbol</td><td>706536</td>
//!   <td>Částka</td><td>+1 234,50 CZK</td>
//!   ```
//! * A plain-text fallback with `label: value` lines, e.g. `VS: 706536` and `Částka: +1 234,50 CZK`.
//!
//! The HTML extractor always runs first. Whatever it could not find is then taken from the text body, and finally the
//! variable symbol alone may be taken from the subject line.
//!
//! Amounts are captured generously (digits with any mix of spaces, `.`, `,` and `'`) and handed to [`Czk`]'s parser,
//! which decides which separator is the decimal one. `1.234,50`, `1,234.50` and `1 234,50` all read as 1234.50 Kč.
//!
//! Only messages from an allow-listed sender are ever parsed. The address is taken out of the sender header first
//! (`"ČSOB" <noreply@csob.cz>` yields `noreply@csob.cz`). An allow-list entry with an `@` must equal that address.
//! Any other entry is a domain, and admits the domain itself and its subdomains.
use log::*;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Czk, Vs},
    integrations::BankMessage,
};

/// Senders trusted when no explicit list is configured.
pub const DEFAULT_BANK_SENDERS: [&str; 5] =
    ["csob.cz", "noreply@csob.cz", "no-reply@csob.cz", "notification@csob.cz", "info@csob.cz"];

/// A `(token, amount)` pair scraped from a single bank notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConfirmation {
    pub vs: Vs,
    pub amount: Czk,
}

impl BankConfirmation {
    pub fn new(vs: Vs, amount: Czk) -> Self {
        Self { vs, amount }
    }
}

#[derive(Debug, Clone)]
pub struct BankNotificationParser {
    allowed_senders: Vec<String>,
    vs_label: Regex,
    amount_label: Regex,
    vs_cell: Regex,
    amount_cell: Regex,
    script: Regex,
    style: Regex,
    entity: Regex,
    blanks: Regex,
}

impl BankNotificationParser {
    /// Creates a parser that trusts the given senders. An empty list trusts nobody.
    pub fn new<S: AsRef<str>>(allowed_senders: &[S]) -> Result<Self, regex::Error> {
        let allowed_senders = allowed_senders
            .iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        Ok(Self {
            allowed_senders,
            vs_label: Regex::new(r"(?i)\b(?:VS|Variabiln[íi]\s*symbol)\s*[:\-]?\s*(\d{1,10})(?:\D|$)")?,
            amount_label: Regex::new(r"(?i)\b(?:Částka|Castka)\s*[:\-]?\s*([+\-]?\d[\d .,'\u{00A0}]*)")?,
            vs_cell: Regex::new(
                r"(?is)>\s*Variabiln[íi]\s*symbol\s*<\s*/\s*td\s*>\s*<\s*td[^>]*>\s*(\d{1,10})\s*<\s*/\s*td\s*>",
            )?,
            amount_cell: Regex::new(
                r"(?is)>\s*(?:Částka|Castka)\s*<\s*/\s*td\s*>\s*<\s*td[^>]*>\s*([+\-]?\d[\d\s.,']*)(?:CZK|Kč)?\s*<\s*/\s*td\s*>",
            )?,
            script: Regex::new(r"(?is)<script[^>]*>.*?</script\s*>")?,
            style: Regex::new(r"(?is)<style[^>]*>.*?</style\s*>")?,
            entity: Regex::new(r"&(?:#(\d{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]+));")?,
            blanks: Regex::new(r"[ \t\u{00A0}]+")?,
        })
    }

    pub fn with_default_senders() -> Result<Self, regex::Error> {
        Self::new(&DEFAULT_BANK_SENDERS)
    }

    pub fn allowed_senders(&self) -> &[String] {
        &self.allowed_senders
    }

    pub fn is_trusted_sender(&self, sender: &str) -> bool {
        let Some(address) = sender_address(sender) else {
            return false;
        };
        let domain = address.rsplit_once('@').map(|(_, domain)| domain).unwrap_or_default();
        self.allowed_senders.iter().any(|allowed| match allowed.strip_prefix('@') {
            Some(allowed_domain) => domain_matches(domain, allowed_domain),
            None if allowed.contains('@') => address == *allowed,
            None => domain_matches(domain, allowed),
        })
    }

    /// Extracts the confirmation from a message, or returns `None` if the sender is not trusted or the message does
    /// not carry both a variable symbol and an amount.
    pub fn parse(&self, message: &BankMessage) -> Option<BankConfirmation> {
        if !self.is_trusted_sender(&message.sender) {
            debug!("📨️ Ignoring message {} from untrusted sender '{}'", message.id, message.sender);
            return None;
        }
        let result = self.extract(&message.subject, &message.text_body, &message.html_body);
        if result.is_none() {
            debug!("📨️ Message {} from {} does not look like a payment notification", message.id, message.sender);
        }
        result
    }

    /// Runs the extractors in order without any sender check.
    pub fn extract(&self, subject: &str, text: &str, html: &str) -> Option<BankConfirmation> {
        let (mut vs, mut amount) = match html.trim().is_empty() {
            true => (None, None),
            false => self.extract_from_html(html),
        };
        if vs.is_none() {
            vs = self.vs_from_text(text).or_else(|| self.vs_from_text(subject));
        }
        if amount.is_none() {
            amount = self.amount_from_text(text);
        }
        Some(BankConfirmation::new(vs?, amount?))
    }

    /// Reads the variable symbol and amount cells from the bank's HTML table layout.
    pub fn extract_from_html(&self, html: &str) -> (Option<Vs>, Option<Czk>) {
        let html = self.normalize_html(html);
        let vs = self.vs_cell.captures(&html).and_then(|c| c[1].parse::<Vs>().ok());
        let amount = self.amount_cell.captures(&html).and_then(|c| parse_amount(&c[1]));
        (vs, amount)
    }

    pub fn vs_from_text(&self, text: &str) -> Option<Vs> {
        self.vs_label.captures(text).and_then(|c| c[1].parse::<Vs>().ok())
    }

    pub fn amount_from_text(&self, text: &str) -> Option<Czk> {
        self.amount_label.captures(text).and_then(|c| parse_amount(&c[1]))
    }

    fn normalize_html(&self, html: &str) -> String {
        let html = self.script.replace_all(html, " ");
        let html = self.style.replace_all(&html, " ");
        let html = self.entity.replace_all(&html, |c: &Captures| unescape_entity(c));
        self.blanks.replace_all(&html, " ").into_owned()
    }
}

/// The bare, lower-cased address of a sender header such as `"ČSOB" <NoReply@CSOB.cz>`.
fn sender_address(sender: &str) -> Option<String> {
    let sender = sender.trim();
    let address = match sender.rfind('<') {
        Some(start) => sender[start + 1..].split('>').next().unwrap_or_default(),
        None => sender,
    };
    let address = address.trim().to_lowercase();
    let (local, domain) = address.split_once('@')?;
    let well_formed = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !address.chars().any(|c| c.is_whitespace() || c == '<' || c == '>');
    well_formed.then_some(address)
}

fn domain_matches(domain: &str, allowed: &str) -> bool {
    domain == allowed || domain.strip_suffix(allowed).is_some_and(|sub| sub.ends_with('.'))
}

fn parse_amount(raw: &str) -> Option<Czk> {
    let raw = raw.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '\''));
    match raw.trim().parse::<Czk>() {
        Ok(amount) => Some(amount),
        Err(e) => {
            warn!("📨️ Found an amount field, but could not read it. {e}");
            None
        },
    }
}

fn unescape_entity(c: &Captures) -> String {
    let decoded = if let Some(dec) = c.get(1) {
        dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
    } else if let Some(hex) = c.get(2) {
        u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
    } else {
        match c.get(3).map(|m| m.as_str()) {
            Some("nbsp") => Some('\u{00A0}'),
            Some("amp") => Some('&'),
            Some("lt") => Some('<'),
            Some("gt") => Some('>'),
            Some("quot") => Some('"'),
            Some("apos") => Some('\''),
            _ => None,
        }
    };
    match decoded {
        Some(ch) => ch.to_string(),
        None => c[0].to_string(),
    }
}
