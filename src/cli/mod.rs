/*
 * Interactive command prompt for the trading desk
 */

use crate::config::SourceKind;
use crate::currency;
use crate::models::{FxError, Result};
use crate::portfolio::PortfolioValuation;
use crate::rates::{RatesFilter, UpdateReport};
use crate::service::{CachedRates, TradeReceipt, TradeService, TradeSide};
use crate::users::Session;
use crate::utils::group_thousands;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const PROMPT: &str = "> ";
const LOGIN_HINT: &str = "Log in first: login --username <name> --password <password>";

#[derive(Debug, Parser)]
#[command(name = "fxdesk", no_binary_name = true, disable_version_flag = true)]
struct CommandLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Start a session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show balances valued in a base currency
    ShowPortfolio {
        #[arg(long)]
        base: Option<String>,
    },
    /// Buy a currency
    Buy {
        #[arg(long)]
        currency: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Sell a currency
    Sell {
        #[arg(long)]
        currency: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Look up an exchange rate
    GetRate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// List cached rates
    ShowRates {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        top: Option<u64>,
        #[arg(long)]
        base: Option<String>,
    },
    /// Refresh rates from the external sources
    UpdateRates {
        /// coingecko or exchangerate; both when omitted
        #[arg(long)]
        source: Option<SourceKind>,
    },
    /// List supported currencies
    Currencies,
    /// Leave the prompt
    #[command(alias = "quit")]
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub flow: Flow,
    pub output: String,
}

impl Reply {
    fn text(output: impl Into<String>) -> Self {
        Self {
            flow: Flow::Continue,
            output: output.into(),
        }
    }
}

pub struct Shell {
    service: TradeService,
    session: Option<Session>,
}

impl Shell {
    #[must_use]
    pub fn new(service: TradeService) -> Self {
        Self {
            service,
            session: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Reads commands from stdin until `exit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!("Type a command ('help' lists them)");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("{PROMPT}");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let reply = self.execute(&line).await;
            if !reply.output.is_empty() {
                println!("{}", reply.output);
            }
            if reply.flow == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    pub async fn execute(&mut self, line: &str) -> Reply {
        self.execute_args(line.split_whitespace()).await
    }

    /// Parses one command and runs it. Failures become part of the reply.
    pub async fn execute_args<I, T>(&mut self, args: I) -> Reply
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let command = match CommandLine::try_parse_from(args) {
            Ok(parsed) => parsed.command,
            Err(e) => return Reply::text(e.render().to_string().trim_end()),
        };

        match self.dispatch(command).await {
            Ok(reply) => reply,
            Err(e) => Reply::text(render_error(&e)),
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Reply> {
        let output = match command {
            Command::Exit => {
                return Ok(Reply {
                    flow: Flow::Exit,
                    output: "Bye.".to_string(),
                })
            }
            Command::Register { username, password } => {
                let user = self.service.register(&username, &password)?;
                format!(
                    "User '{}' registered (id={}). Log in with: login --username {} --password ****",
                    user.username, user.user_id, user.username
                )
            }
            Command::Login { username, password } => {
                let session = self.service.login(&username, &password)?;
                let output = format!("Logged in as '{}'", session.username);
                self.session = Some(session);
                output
            }
            Command::Logout => match self.session.take() {
                Some(session) => format!("Logged out '{}'", session.username),
                None => "Nobody is logged in".to_string(),
            },
            Command::ShowPortfolio { base } => {
                let Some(session) = &self.session else {
                    return Ok(Reply::text(LOGIN_HINT));
                };
                let valuation = self.service.show_portfolio(session, base.as_deref())?;
                render_portfolio(&session.username, &valuation)
            }
            Command::Buy { currency, amount } => {
                let Some(session) = &self.session else {
                    return Ok(Reply::text(LOGIN_HINT));
                };
                render_receipt(&self.service.buy(session, &currency, amount, None)?)
            }
            Command::Sell { currency, amount } => {
                let Some(session) = &self.session else {
                    return Ok(Reply::text(LOGIN_HINT));
                };
                render_receipt(&self.service.sell(session, &currency, amount, None)?)
            }
            Command::GetRate { from, to } => {
                let quote = self.service.get_rate(&from, &to)?;
                let (from, to) = (from.trim().to_uppercase(), to.trim().to_uppercase());
                format!(
                    "Rate {from}->{to}: {:.8} (updated: {})\nInverse rate {to}->{from}: {:.8}",
                    quote.rate,
                    quote.updated_at,
                    1.0 / quote.rate
                )
            }
            Command::ShowRates { currency, top, base } => {
                let currency = currency.map(|c| c.trim().to_uppercase());
                let filter = RatesFilter {
                    currency: currency.clone(),
                    base,
                    top: top.map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
                };
                render_rates(&self.service.cached_rates(&filter)?, currency.as_deref())
            }
            Command::UpdateRates { source } => {
                info!("Rates update requested (source={:?})", source);
                match self.service.update_rates(source).await {
                    Ok(report) => render_update(&report),
                    Err(e) => {
                        warn!("Rates update failed: {}", e);
                        let log_file = self.service.config().logging.dir.join("actions.log");
                        format!(
                            "ERROR: {e}\nUpdate completed with errors. Check {} for details.",
                            log_file.display()
                        )
                    }
                }
            }
            Command::Currencies => currency::all()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(Reply::text(output))
    }
}

fn render_error(error: &FxError) -> String {
    match error {
        FxError::UnknownCurrency(_) => {
            format!("{error}\nHint: run 'currencies' to list supported codes.")
        }
        FxError::RateUnavailable { .. } | FxError::SourceUnavailable(_) | FxError::NoDataFromAnySource => {
            format!("{error}\nTry again later or check the network and rate sources.")
        }
        _ => error.to_string(),
    }
}

fn render_portfolio(username: &str, valuation: &PortfolioValuation) -> String {
    if valuation.wallets.is_empty() {
        return format!("Portfolio of '{username}' is empty.");
    }

    let base = &valuation.base;
    let mut out = format!("Portfolio of '{username}' (base: {base}):\n");
    for wallet in &valuation.wallets {
        let _ = writeln!(
            out,
            "- {}: {}  -> {} {}",
            wallet.code,
            currency::format_amount(&wallet.code, wallet.balance),
            group_thousands(wallet.value_in_base, 2),
            base
        );
    }
    out.push_str("---------------------------------\n");
    let _ = write!(out, "TOTAL: {} {}", group_thousands(valuation.total, 2), base);
    out
}

fn render_receipt(receipt: &TradeReceipt) -> String {
    let (verb, value_label) = match receipt.side {
        TradeSide::Buy => ("Bought", "Estimated cost"),
        TradeSide::Sell => ("Sold", "Estimated revenue"),
    };
    let code = &receipt.code;
    let base = &receipt.base;

    format!(
        "{verb} {} {code} at {} {base}/{code}\nPortfolio change:\n- {code}: {} -> {}\n{value_label}: {} {base}",
        currency::format_amount(code, receipt.amount),
        group_thousands(receipt.rate, 2),
        currency::format_amount(code, receipt.balance.old),
        currency::format_amount(code, receipt.balance.new),
        group_thousands(receipt.value_in_base, 2),
    )
}

fn render_rates(cached: &CachedRates, currency: Option<&str>) -> String {
    if cached.cache_empty {
        return "Local rate cache is empty. Run 'update-rates' to load data.".to_string();
    }
    if cached.rows.is_empty() {
        return match currency {
            Some(code) => format!("No cached rate for '{code}'."),
            None => "Nothing to show.".to_string(),
        };
    }

    let mut table = Table::new();
    table.set_header(vec!["PAIR", "RATE", "UPDATED AT", "SOURCE"]);
    for row in &cached.rows {
        table.add_row(vec![
            row.pair.clone(),
            group_thousands(row.rate, 6),
            row.updated_at.clone(),
            row.source.clone(),
        ]);
    }

    match &cached.last_refresh {
        Some(at) => format!("Rates from cache (updated at {at}):\n{table}"),
        None => format!("Rates from cache:\n{table}"),
    }
}

fn render_update(report: &UpdateReport) -> String {
    let mut out = String::from("Rates update finished.\n");
    for outcome in &report.outcomes {
        let _ = match &outcome.result {
            Ok(count) => writeln!(out, "- {}: {} rates", outcome.source, count),
            Err(reason) => writeln!(out, "- {}: failed ({})", outcome.source, reason),
        };
    }
    let _ = write!(
        out,
        "Update successful. Total rates updated: {}. Last refresh: {}",
        report.updated_pairs, report.last_refresh
    );
    out
}
