/*
 * Trade service that coordinates users, portfolios and rates
 */

use crate::{
    config::{Config, SourceKind},
    currency,
    models::{FxError, RateQuote, Result},
    portfolio::{validate_amount, BalanceChange, Portfolio, PortfolioValuation},
    rates::{filter_rates, RateLookup, RateRow, RatesFilter, RatesUpdater, UpdateReport},
    sources::create_sources,
    storage::{Document, JsonStore, RatesStorage},
    users::{self, Session, User},
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub code: String,
    pub base: String,
    pub amount: f64,
    pub rate: f64,
    pub balance: BalanceChange,
    /// Estimated cost of a buy or revenue of a sell, in `base`.
    pub value_in_base: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRates {
    pub rows: Vec<RateRow>,
    pub last_refresh: Option<String>,
    /// True when the snapshot holds no pairs at all, before any filtering.
    pub cache_empty: bool,
}

/// Fields attached to the structured line logged for every domain action.
#[derive(Debug, Default, Clone, Copy)]
struct ActionContext<'a> {
    user: Option<&'a str>,
    currency: Option<&'a str>,
    amount: Option<f64>,
    base: Option<&'a str>,
}

fn log_action<T>(action: &str, ctx: ActionContext<'_>, result: Result<T>) -> Result<T> {
    let user = ctx.user.unwrap_or("-");
    let currency = ctx.currency.unwrap_or("-");
    let amount = ctx.amount.map_or_else(|| "-".to_string(), |a| a.to_string());
    let amount = amount.as_str();
    let base = ctx.base.unwrap_or("-");

    match &result {
        Ok(_) => info!(action, user, currency, amount, base, result = "OK"),
        Err(e) => info!(
            action,
            user,
            currency,
            amount,
            base,
            result = "ERROR",
            error_type = e.kind(),
            error_message = %e
        ),
    }
    result
}

pub struct TradeService {
    config: Config,
    store: JsonStore,
}

impl TradeService {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = JsonStore::new(config.data.clone());
        info!("Trade service using data directory {}", config.data.dir.display());
        Self { config, store }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    fn lookup(&self) -> RateLookup<'_> {
        RateLookup::new(&self.store, self.config.rates.ttl())
    }

    fn base_code(&self, base: Option<&str>) -> Result<&'static str> {
        let base = base.unwrap_or(self.config.rates.default_base.as_str());
        Ok(currency::get_currency(base)?.code)
    }

    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        let result = self.register_inner(username, password);
        let ctx = ActionContext {
            user: Some(username.trim()),
            ..ActionContext::default()
        };
        log_action("REGISTER", ctx, result)
    }

    fn register_inner(&self, username: &str, password: &str) -> Result<User> {
        let username = users::validate_username(username)?;
        users::validate_password(password)?;

        let mut known: Vec<User> = self.store.read(Document::Users)?;
        if known.iter().any(|u| u.username == username) {
            return Err(FxError::Validation(format!("Username '{username}' is already taken")));
        }

        let user_id = known.iter().map(|u| u.user_id).max().unwrap_or(0) + 1;
        let user = User::create(user_id, username, password)?;
        known.push(user.clone());
        self.store.write(Document::Users, &known)?;

        let mut portfolios: Vec<Portfolio> = self.store.read(Document::Portfolios)?;
        if !portfolios.iter().any(|p| p.user_id == user_id) {
            portfolios.push(Portfolio::new(user_id));
            self.store.write(Document::Portfolios, &portfolios)?;
        }

        Ok(user)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let result = self.login_inner(username, password);
        let ctx = ActionContext {
            user: Some(username.trim()),
            ..ActionContext::default()
        };
        log_action("LOGIN", ctx, result)
    }

    fn login_inner(&self, username: &str, password: &str) -> Result<Session> {
        let username = users::validate_username(username)?;
        if password.is_empty() {
            return Err(FxError::Validation("Password is required".to_string()));
        }

        let known: Vec<User> = self.store.read(Document::Users)?;
        let user = known
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| FxError::AuthenticationFailed(format!("user '{username}' not found")))?;

        if !user.verify_password(password) {
            return Err(FxError::AuthenticationFailed("wrong password".to_string()));
        }
        Ok(user.session())
    }

    pub fn show_portfolio(&self, session: &Session, base: Option<&str>) -> Result<PortfolioValuation> {
        let base = self.base_code(base)?;
        let portfolios: Vec<Portfolio> = self.store.read(Document::Portfolios)?;
        let portfolio = portfolios
            .into_iter()
            .find(|p| p.user_id == session.user_id)
            .unwrap_or_else(|| Portfolio::new(session.user_id));

        portfolio.valuate(base, &self.lookup())
    }

    pub fn buy(&self, session: &Session, code: &str, amount: f64, base: Option<&str>) -> Result<TradeReceipt> {
        let result = self.trade(TradeSide::Buy, session, code, amount, base);
        let ctx = ActionContext {
            user: Some(&session.username),
            currency: Some(code),
            amount: Some(amount),
            base,
        };
        log_action("BUY", ctx, result)
    }

    pub fn sell(&self, session: &Session, code: &str, amount: f64, base: Option<&str>) -> Result<TradeReceipt> {
        let result = self.trade(TradeSide::Sell, session, code, amount, base);
        let ctx = ActionContext {
            user: Some(&session.username),
            currency: Some(code),
            amount: Some(amount),
            base,
        };
        log_action("SELL", ctx, result)
    }

    /// Applies the balance change in memory, prices it with one rate lookup,
    /// and only then persists the portfolios.
    fn trade(
        &self,
        side: TradeSide,
        session: &Session,
        code: &str,
        amount: f64,
        base: Option<&str>,
    ) -> Result<TradeReceipt> {
        let amount = validate_amount(amount)?;
        let code = currency::get_currency(code)?.code;
        let base = self.base_code(base)?;

        let mut portfolios: Vec<Portfolio> = self.store.read(Document::Portfolios)?;
        let index = match portfolios.iter().position(|p| p.user_id == session.user_id) {
            Some(index) => index,
            None => {
                portfolios.push(Portfolio::new(session.user_id));
                portfolios.len() - 1
            }
        };

        let balance = match side {
            TradeSide::Buy => portfolios[index].deposit(code, amount)?,
            TradeSide::Sell => portfolios[index].withdraw(code, amount)?,
        };
        let quote = self.lookup().get_rate(code, base)?;
        self.store.write(Document::Portfolios, &portfolios)?;

        Ok(TradeReceipt {
            side,
            code: code.to_string(),
            base: base.to_string(),
            amount,
            rate: quote.rate,
            balance,
            value_in_base: amount * quote.rate,
        })
    }

    pub fn get_rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        self.lookup().get_rate(from, to)
    }

    pub fn cached_rates(&self, filter: &RatesFilter) -> Result<CachedRates> {
        let snapshot = self.store.load_snapshot()?;
        Ok(CachedRates {
            rows: filter_rates(&snapshot, filter),
            cache_empty: snapshot.pairs.is_empty(),
            last_refresh: snapshot.last_refresh,
        })
    }

    pub async fn update_rates(&self, selection: Option<SourceKind>) -> Result<UpdateReport> {
        let sources = create_sources(selection, &self.config.parser)?;
        RatesUpdater::new(sources, &self.store).run_update().await
    }
}
