//! Service wiring shared by every use case.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use regdesk_infra::{Config, FakePaymentGateway, InscriptionCache, PaymentGateway, Stores};

use crate::clock::{Clock, SystemClock};

/// Tunables the use cases read from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_ttl: Duration,
    pub pending_ttl: Duration,
    pub guest_ttl: Duration,
    pub link_ttl: Duration,
    pub fee_bps: u32,
    pub max_installments: u32,
    pub webhook_token: Option<String>,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        let inscriptions = &config.inscriptions;
        Self {
            cache_ttl: Duration::seconds(bounded(inscriptions.cache_ttl_secs)),
            pending_ttl: Duration::hours(bounded(inscriptions.pending_ttl_hours)),
            guest_ttl: Duration::minutes(bounded(inscriptions.guest_ttl_minutes)),
            link_ttl: Duration::hours(bounded(inscriptions.payment_link_ttl_hours)),
            fee_bps: config.gateway.fee_bps,
            max_installments: config.gateway.max_installments,
            webhook_token: config.gateway.webhook_token.clone(),
        }
    }
}

fn bounded(value: u64) -> i64 {
    value.min(1_000_000) as i64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::minutes(30),
            pending_ttl: Duration::hours(72),
            guest_ttl: Duration::minutes(30),
            link_ttl: Duration::hours(48),
            fee_bps: 399,
            max_installments: 12,
            webhook_token: None,
        }
    }
}

/// Repositories, cache, gateway and clock behind the use cases.
#[derive(Clone)]
pub struct AppServices {
    pub(crate) stores: Stores,
    pub(crate) cache: InscriptionCache,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: Settings,
}

impl AppServices {
    pub fn new(
        stores: Stores,
        cache: InscriptionCache,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        Self {
            stores,
            cache,
            gateway,
            clock,
            settings,
        }
    }

    /// Everything in memory, fake gateway, system clock.
    pub fn in_memory() -> Self {
        Self::new(
            Stores::in_memory(),
            InscriptionCache::in_memory(),
            Arc::new(FakePaymentGateway::new()),
            Arc::new(SystemClock),
            Settings::default(),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
