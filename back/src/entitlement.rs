//! Premium entitlement state: granting, 30-day expiry and promo codes.

use checkdone_api::v1::{Entitlement, PremiumWindow};
use chrono::{DateTime, Utc};
use eyre::WrapErr;
use tracing::{debug, info, warn};

use crate::persist::{KeyValueStore, PREMIUM_KEY, PREMIUM_STARTED_AT_KEY};

/// Promo code granting a premium window, matched case-insensitively.
pub const PROMO_CODE: &str = "CHECKDONE30";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromoOutcome {
    Redeemed(Entitlement),
    Invalid,
}

/// Expiry and remaining days of a window started at `since`.
pub fn compute_window(since: DateTime<Utc>, now: DateTime<Utc>) -> PremiumWindow {
    PremiumWindow::compute(since, now)
}

/// Owns the premium state of the local user.
///
/// Expiry is only applied by [`Entitlements::load_at`]; a session kept open
/// past the end of the window stays premium until the next load.
#[derive(Debug)]
pub struct Entitlements<S> {
    store: S,
    state: Entitlement,
}

impl<S: KeyValueStore> Entitlements<S> {
    pub async fn load(store: S) -> eyre::Result<Self> {
        Self::load_at(store, Utc::now()).await
    }

    pub async fn load_at(store: S, now: DateTime<Utc>) -> eyre::Result<Self> {
        let flag = store
            .get(PREMIUM_KEY)
            .await
            .wrap_err("failed to read premium status")?;
        let started = store
            .get(PREMIUM_STARTED_AT_KEY)
            .await
            .wrap_err("failed to read premium start")?;

        let is_premium = flag.as_deref() == Some(b"true".as_slice());

        let since = match started.as_deref().map(parse_timestamp).transpose() {
            Ok(since) => since,
            Err(err) if is_premium => {
                warn!("unreadable premium start, downgrading: {:?}", err);

                let mut entitlements = Self {
                    store,
                    state: Entitlement::Free,
                };
                entitlements.reset().await?;

                return Ok(entitlements);
            }
            Err(_) => None,
        };

        let state = match is_premium {
            true => Entitlement::Premium { since },
            false => Entitlement::Free,
        };

        let mut entitlements = Self { store, state };

        if let Entitlement::Premium { since: Some(since) } = state {
            let window = compute_window(since, now);

            if window.is_expired(now) {
                info!(
                    since = %since,
                    expired_at = %window.expires_at,
                    "premium expired, downgrading"
                );

                entitlements.reset().await?;
            }
        }

        debug!(state = ?entitlements.state, "loaded entitlement");

        Ok(entitlements)
    }

    pub fn entitlement(&self) -> Entitlement {
        self.state
    }

    pub fn is_premium(&self) -> bool {
        self.state.is_premium()
    }

    /// Window of the current grant, `None` when free or undated.
    pub fn window_at(&self, now: DateTime<Utc>) -> Option<PremiumWindow> {
        (self.state.since()).map(|since| compute_window(since, now))
    }

    pub async fn upgrade(&mut self) -> eyre::Result<Entitlement> {
        self.upgrade_at(Utc::now()).await
    }

    /// Start a premium window at `now`, restarting it if one is running.
    pub async fn upgrade_at(&mut self, now: DateTime<Utc>) -> eyre::Result<Entitlement> {
        self.state = Entitlement::Premium { since: Some(now) };
        self.store().await?;

        info!(since = %now, "premium activated");

        Ok(self.state)
    }

    pub async fn redeem_promo_code(&mut self, code: &str) -> eyre::Result<PromoOutcome> {
        self.redeem_promo_code_at(code, Utc::now()).await
    }

    pub async fn redeem_promo_code_at(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
    ) -> eyre::Result<PromoOutcome> {
        if !code.eq_ignore_ascii_case(PROMO_CODE) {
            info!("rejected promo code");
            return Ok(PromoOutcome::Invalid);
        }

        let state = self.upgrade_at(now).await?;
        Ok(PromoOutcome::Redeemed(state))
    }

    pub async fn reset(&mut self) -> eyre::Result<()> {
        self.state = Entitlement::Free;
        self.store().await?;

        info!("premium reset");

        Ok(())
    }

    async fn store(&self) -> eyre::Result<()> {
        let flag = match self.state.is_premium() {
            true => "true",
            false => "false",
        };

        self.store
            .set(PREMIUM_KEY, flag.as_bytes().to_vec())
            .await
            .wrap_err("failed to store premium status")?;

        match self.state.since() {
            Some(since) => self
                .store
                .set(PREMIUM_STARTED_AT_KEY, since.to_rfc3339().into_bytes())
                .await
                .wrap_err("failed to store premium start")?,
            None => self
                .store
                .remove(PREMIUM_STARTED_AT_KEY)
                .await
                .wrap_err("failed to clear premium start")?,
        }

        Ok(())
    }
}

fn parse_timestamp(bytes: &[u8]) -> eyre::Result<DateTime<Utc>> {
    let text = std::str::from_utf8(bytes).wrap_err("premium start is not utf-8")?;
    let at = DateTime::parse_from_rfc3339(text.trim())
        .wrap_err_with(|| format!("invalid premium start {:?}", text))?;
    Ok(at.with_timezone(&Utc))
}
