//! Command parsing - Turns one chat message into at most one typed command.
//!
//! The chat text is the wire protocol of the bot: fixed Chinese keywords and the
//! full-width comma `，` as field separator. Matchers run from an ordered table and
//! the first one that recognises the text decides the outcome, including a
//! `MalformedCommand` when the keyword matched but the fields did not.

use crate::core::money::split_leading_decimal;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Full-width field separator.
pub const FIELD_SEPARATOR: char = '，';

const PRICE_LIST: &str = "价格表";
const MY_HISTORY: &str = "我的历史";
const HELP: &str = "帮助";
const RECHARGE: &str = "充值";
const TRADE: &str = "交易";
const TRADE_ZONE: &str = "交易区";
const MY_ITEMS: &str = "我的交易品";
const MY_ITEMS_SHORT: &str = "我的交易";
const START_TRADE: &str = "开始交易";
const REDEEM_CODE: &str = "兑换码：";

/// Where a message was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatContext {
    /// One-to-one chat with the bot
    Private,
    /// Group chat
    Group,
}

/// Fields of a new listing as typed by the seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTradeItem {
    /// Seller named in the command; None in group context, where the sender sells
    pub seller: Option<String>,
    /// Item name
    pub name: String,
    /// Unit price
    pub price: Decimal,
    /// Units for sale, 1 when omitted
    pub quantity: u32,
    /// Free-text description
    pub description: Option<String>,
}

/// The parsed intent of one chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `价格表`
    ShowPriceList,
    /// `我的历史`
    ShowHistory,
    /// An image was uploaded
    AttachImage,
    /// A transfer notification arrived; the payload is the raw payment envelope
    NotifyTransfer {
        payload: String,
    },
    /// `帮助`
    ShowHelp,
    /// `充值<amount>`, private only
    RechargeByAmount {
        amount: Decimal,
    },
    /// `交易，...`
    CreateTradeItem(NewTradeItem),
    /// `我的交易品`
    ListMyTradeItems,
    /// `交易区` with an optional `：<filter>`
    ListTradeZone {
        filter: Option<String>,
    },
    /// `交易<id>号`
    ShowTradeItem {
        id: i64,
    },
    /// The copied start sentence, group only
    StartTrade {
        id: i64,
        name: String,
        price: Decimal,
        description: String,
    },
    /// `兑换码：<code>`, group only
    RedeemCode {
        code: String,
    },
    /// Ordinary chat; nothing to do
    NoMatch,
}

/// A recognised command whose fields could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCommand {
    /// Corrective hint sent back to the user
    pub reason: String,
}

impl MalformedCommand {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outcome of a single matcher: `None` means "not mine, try the next one".
type MatchOutcome = Option<Result<Command, MalformedCommand>>;
type Matcher = fn(&str, ChatContext) -> MatchOutcome;

/// Matchers in priority order. Exact phrases first, then keyword prefixes, then
/// the comma-delimited create command, then the group-only anchored forms.
const MATCHERS: &[(&str, Matcher)] = &[
    ("exact_phrase", match_exact_phrase),
    ("recharge", match_recharge),
    ("my_items", match_my_items),
    ("trade_zone", match_trade_zone),
    ("show_trade_item", match_show_trade_item),
    ("create_trade_item", match_create_trade_item),
    ("start_trade", match_start_trade),
    ("redeem_code", match_redeem_code),
];

/// Parses a text message received in `context`.
///
/// Unrecognised text is `Ok(Command::NoMatch)`.
///
/// # Errors
/// Returns `MalformedCommand` when a command keyword matched but its fields are
/// missing or not numeric where a number is required.
pub fn parse(text: &str, context: ChatContext) -> Result<Command, MalformedCommand> {
    let text = text.trim();
    for (name, matcher) in MATCHERS {
        if let Some(outcome) = matcher(text, context) {
            debug!("Message matched {name}");
            return outcome;
        }
    }
    Ok(Command::NoMatch)
}

fn match_exact_phrase(text: &str, _context: ChatContext) -> MatchOutcome {
    let command = match text {
        PRICE_LIST => Command::ShowPriceList,
        MY_HISTORY => Command::ShowHistory,
        HELP => Command::ShowHelp,
        _ => return None,
    };
    Some(Ok(command))
}

fn match_recharge(text: &str, context: ChatContext) -> MatchOutcome {
    if context != ChatContext::Private {
        return None;
    }
    let rest = text.strip_prefix(RECHARGE)?;
    let (number, _) = split_leading_decimal(rest)?;
    Some(match parse_positive_decimal(number) {
        Some(amount) => Ok(Command::RechargeByAmount { amount }),
        None => Err(MalformedCommand::new(
            "无法解析金额，请确保格式正确。例如：充值100",
        )),
    })
}

fn match_my_items(text: &str, context: ChatContext) -> MatchOutcome {
    let prefix = match context {
        ChatContext::Private => MY_ITEMS,
        ChatContext::Group => MY_ITEMS_SHORT,
    };
    text.starts_with(prefix)
        .then_some(Ok(Command::ListMyTradeItems))
}

fn match_trade_zone(text: &str, _context: ChatContext) -> MatchOutcome {
    let rest = text.strip_prefix(TRADE_ZONE)?;
    let filter = rest
        .strip_prefix('：')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    Some(Ok(Command::ListTradeZone { filter }))
}

fn match_show_trade_item(text: &str, _context: ChatContext) -> MatchOutcome {
    let rest = text.strip_prefix(TRADE)?;
    let digits_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_len == 0 {
        return None;
    }

    let (digits, tail) = rest.split_at(digits_len);
    let id = parse_digits::<i64>(digits);
    Some(match (id, tail) {
        (Some(id), "号") => Ok(Command::ShowTradeItem { id }),
        _ => Err(MalformedCommand::new(
            "指令格式错误，请按照 '交易[交易品ID]号' 的格式输入。",
        )),
    })
}

fn match_create_trade_item(text: &str, context: ChatContext) -> MatchOutcome {
    let rest = text.strip_prefix(TRADE)?;
    if !rest.starts_with(FIELD_SEPARATOR) {
        return None;
    }

    let parts: Vec<&str> = text.split(FIELD_SEPARATOR).map(str::trim).collect();
    Some(match context {
        ChatContext::Private => build_new_item(&parts, true),
        ChatContext::Group => build_new_item(&parts, false),
    })
}

/// Builds a listing from `交易，[卖家，]名称，价格[，数量][，描述]`.
fn build_new_item(parts: &[&str], with_seller: bool) -> Result<Command, MalformedCommand> {
    let (min, max, usage) = if with_seller {
        (4, 6, "'交易，卖家名称，名称，价格[，数量][，描述]'")
    } else {
        (3, 5, "'交易，名称，价格[，数量][，描述]'")
    };
    if !(min..=max).contains(&parts.len()) {
        return Err(MalformedCommand::new(format!(
            "交易品信息不完整，请按照格式输入：{usage}"
        )));
    }

    let mut fields = parts[1..].iter().copied();
    let seller = if with_seller {
        fields.next().map(str::to_string)
    } else {
        None
    };
    let name = fields.next().unwrap_or_default().to_string();
    if name.is_empty() {
        return Err(MalformedCommand::new("交易品名称不能为空。"));
    }

    let price = fields
        .next()
        .and_then(parse_positive_decimal)
        .ok_or_else(|| MalformedCommand::new("价格格式不正确。请确保是大于0的数字。"))?;

    let quantity = match fields.next() {
        Some(raw) => parse_digits::<u32>(raw)
            .ok_or_else(|| MalformedCommand::new("数量格式不正确。请确保是整数。"))?,
        None => 1,
    };

    let description = fields
        .next()
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(Command::CreateTradeItem(NewTradeItem {
        seller,
        name,
        price,
        quantity,
        description,
    }))
}

/// `开始交易<id>号，名称：<name>，价格：<price>，描述：<desc>`
fn match_start_trade(text: &str, context: ChatContext) -> MatchOutcome {
    if context != ChatContext::Group {
        return None;
    }
    let rest = text.strip_prefix(START_TRADE)?;

    let (id, rest) = rest.split_once("号，名称：")?;
    let id = parse_digits::<i64>(id)?;

    // The name may itself contain commas, so anchor on the last price field.
    let (name, rest) = rest.rsplit_once("，价格：")?;
    let (price, description) = rest.split_once("，描述：")?;
    let (number, tail) = split_leading_decimal(price)?;
    if !tail.is_empty() || name.is_empty() {
        return None;
    }
    let price = parse_positive_decimal(number)?;

    Some(Ok(Command::StartTrade {
        id,
        name: name.to_string(),
        price,
        description: description.trim_start().to_string(),
    }))
}

/// `兑换码：<digits>`
fn match_redeem_code(text: &str, context: ChatContext) -> MatchOutcome {
    if context != ChatContext::Group {
        return None;
    }
    let code = text.strip_prefix(REDEEM_CODE)?;
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(Ok(Command::RedeemCode {
        code: code.to_string(),
    }))
}

/// Parses an unsigned decimal integer; signs and blanks are rejected.
fn parse_digits<T: FromStr>(raw: &str) -> Option<T> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_positive_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|value| *value > Decimal::ZERO)
}
