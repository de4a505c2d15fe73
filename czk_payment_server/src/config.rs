use std::{env, net::IpAddr, path::PathBuf, time::Duration};

use cpg_common::{
    helpers::{env_or_default, parse_boolean_flag, parse_list},
    Secret,
};
use czk_payment_engine::{
    cpe_api::{DEFAULT_PAYMENT_TOLERANCE, DEFAULT_SHIPPING_FEE},
    helpers::DEFAULT_BANK_SENDERS,
    integrations::DEFAULT_BANK_BATCH_SIZE,
    traits::VsPolicy,
    EngineConfig,
};
use log::*;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/cpg_store.db";
const DEFAULT_BANK_SPOOL_DIR: &str = "data/bank_inbox";
const DEFAULT_BANK_POLL_INTERVAL_SECS: u64 = 300;
const DEFAULT_MAIL_OUTBOX_DIR: &str = "data/outbox";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shipping fee, reconciliation tolerance and variable symbol generation.
    pub engine: EngineConfig,
    pub bank: BankConfig,
    pub notifications: NotificationConfig,
    /// The seller printed on invoices. The invoice renderer's default is used when unset.
    pub invoice_seller: Option<String>,
    /// The account that SPD QR payloads point at. QR routes fail with a configuration error without it.
    pub merchant_iban: Option<String>,
    /// If supplied, requests against /admin endpoints must come from one of these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub admin_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            engine: EngineConfig::default(),
            bank: BankConfig::default(),
            notifications: NotificationConfig::default(),
            invoice_seller: None,
            merchant_iban: None,
            admin_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env_or_default("CPG_PORT", DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let engine = engine_config_from_env();
        let bank = BankConfig::from_env_or_default();
        let notifications = NotificationConfig::from_env_or_default();
        let invoice_seller = non_empty_var("CPG_INVOICE_SELLER");
        let merchant_iban = non_empty_var("CPG_MERCHANT_IBAN");
        if merchant_iban.is_none() {
            info!("🪛️ CPG_MERCHANT_IBAN is not set. Payment QR codes are disabled.");
        }
        let admin_whitelist = configure_admin_whitelist();
        let use_x_forwarded_for = parse_boolean_flag(env::var("CPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("CPG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            engine,
            bank,
            notifications,
            invoice_seller,
            merchant_iban,
            admin_whitelist,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn engine_config_from_env() -> EngineConfig {
    let shipping_fee = env_or_default("CPG_SHIPPING_FEE", DEFAULT_SHIPPING_FEE);
    let shipping_fee = if shipping_fee.is_negative() {
        warn!("🪛️ CPG_SHIPPING_FEE cannot be negative. Using {DEFAULT_SHIPPING_FEE} instead.");
        DEFAULT_SHIPPING_FEE
    } else {
        shipping_fee
    };
    let tolerance = env_or_default("CPG_PAYMENT_TOLERANCE", DEFAULT_PAYMENT_TOLERANCE);
    let tolerance = if tolerance.is_negative() {
        warn!("🪛️ CPG_PAYMENT_TOLERANCE cannot be negative. Using {DEFAULT_PAYMENT_TOLERANCE} instead.");
        DEFAULT_PAYMENT_TOLERANCE
    } else {
        tolerance
    };
    let default_policy = VsPolicy::default();
    let max_attempts = match env_or_default("CPG_VS_MAX_ATTEMPTS", default_policy.max_attempts) {
        0 => {
            warn!("🪛️ CPG_VS_MAX_ATTEMPTS must be at least 1. Using {} instead.", default_policy.max_attempts);
            default_policy.max_attempts
        },
        n => n,
    };
    let vs_policy = VsPolicy { max_attempts, ..default_policy };
    EngineConfig::default().with_shipping_fee(shipping_fee).with_tolerance(tolerance).with_vs_policy(vs_policy)
}

fn configure_admin_whitelist() -> Option<Vec<IpAddr>> {
    let whitelist = env::var("CPG_ADMIN_IP_WHITELIST").ok().and_then(|s| {
        if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
            return None;
        }
        let ip_addrs = parse_list(&s)
            .into_iter()
            .filter_map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in CPG_ADMIN_IP_WHITELIST: {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The admin IP whitelist was configured, but is empty. The server will run, but won't authorise \
                 any /admin requests."
            );
        },
        None => {
            warn!("🚨️ No admin IP whitelist is set. Anyone who can reach the server can use the /admin endpoints.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Admin IP whitelist: {addrs}");
        },
    }
    whitelist
}

//-------------------------------------------------  BankConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct BankConfig {
    /// Sender addresses or domains whose notifications are trusted. An empty list trusts nobody.
    pub senders: Vec<String>,
    /// The directory the mail relay drops bank notifications into.
    pub spool_dir: PathBuf,
    /// How often the background worker polls the mailbox. `None` disables the worker.
    pub poll_interval: Option<Duration>,
    /// The maximum number of confirmations reconciled per poll.
    pub batch_size: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            senders: DEFAULT_BANK_SENDERS.iter().map(|s| s.to_string()).collect(),
            spool_dir: PathBuf::from(DEFAULT_BANK_SPOOL_DIR),
            poll_interval: Some(Duration::from_secs(DEFAULT_BANK_POLL_INTERVAL_SECS)),
            batch_size: DEFAULT_BANK_BATCH_SIZE,
        }
    }
}

impl BankConfig {
    pub fn from_env_or_default() -> Self {
        let senders = match env::var("CPG_BANK_SENDERS") {
            Ok(s) => parse_list(&s),
            Err(_) => DEFAULT_BANK_SENDERS.iter().map(|s| s.to_string()).collect(),
        };
        if senders.is_empty() {
            warn!("🚨️ CPG_BANK_SENDERS is empty. Every bank notification will be ignored.");
        } else {
            info!("🪛️ Trusted bank senders: {}", senders.join(", "));
        }
        let spool_dir = non_empty_var("CPG_BANK_SPOOL_DIR").unwrap_or_else(|| DEFAULT_BANK_SPOOL_DIR.to_string());
        let poll_interval = match env_or_default("CPG_BANK_POLL_INTERVAL", DEFAULT_BANK_POLL_INTERVAL_SECS) {
            0 => {
                info!("🪛️ CPG_BANK_POLL_INTERVAL is 0. The bank mailbox will only be polled on request.");
                None
            },
            secs => Some(Duration::from_secs(secs)),
        };
        let batch_size = env_or_default("CPG_BANK_BATCH_SIZE", DEFAULT_BANK_BATCH_SIZE).max(1);
        Self { senders, spool_dir: PathBuf::from(spool_dir), poll_interval, batch_size }
    }
}

//---------------------------------------------  NotificationConfig  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// The shop owner's address. New orders are copied here when set.
    pub order_notify_email: Option<String>,
    /// Outbound mail is spooled here for the mail relay.
    pub outbox_dir: PathBuf,
    /// Operator notifications go to Telegram when configured.
    pub telegram: Option<TelegramConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { order_notify_email: None, outbox_dir: PathBuf::from(DEFAULT_MAIL_OUTBOX_DIR), telegram: None }
    }
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: Secret<String>,
    pub chat_id: String,
}

impl NotificationConfig {
    pub fn from_env_or_default() -> Self {
        let order_notify_email = non_empty_var("CPG_ORDER_NOTIFY_EMAIL");
        let outbox_dir = non_empty_var("CPG_MAIL_OUTBOX_DIR").unwrap_or_else(|| DEFAULT_MAIL_OUTBOX_DIR.to_string());
        let telegram = match (non_empty_var("CPG_TELEGRAM_BOT_TOKEN"), non_empty_var("CPG_TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { bot_token: Secret::new(token), chat_id }),
            (Some(_), None) | (None, Some(_)) => {
                warn!(
                    "🪛️ Both CPG_TELEGRAM_BOT_TOKEN and CPG_TELEGRAM_CHAT_ID must be set to enable operator \
                     notifications."
                );
                None
            },
            (None, None) => {
                info!("🪛️ Telegram is not configured. Operator notifications are disabled.");
                None
            },
        };
        Self { order_notify_email, outbox_dir: PathBuf::from(outbox_dir), telegram }
    }
}

//-------------------------------------------------  ProxyConfig  ------------------------------------------------------
/// The part of the configuration that decides how the peer address of a request is determined.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProxyConfig {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ProxyConfig {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

//-------------------------------------------------  QrConfig  ---------------------------------------------------------
/// Handed to the QR routes, so that they know which account to put in the payload.
#[derive(Clone, Debug, Default)]
pub struct QrConfig {
    pub merchant_iban: Option<String>,
}

impl QrConfig {
    pub fn new<S: Into<String>>(iban: S) -> Self {
        Self { merchant_iban: Some(iban.into()) }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self { merchant_iban: config.merchant_iban.clone() }
    }
}
