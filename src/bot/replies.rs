//! Reply texts sent back to chat users.
//!
//! All user-visible wording lives here so the router stays a dispatch table.

use crate::{
    core::{history::HistoryReport, money::format_amount},
    entities::trade_item,
    errors::Error,
};
use rust_decimal::Decimal;
use std::fmt::Write as _;

/// Command guide sent for `帮助`.
pub const HELP: &str = "命令指南:
    - \"帮助\": 显示此帮助信息。
    - \"价格表\": 查看当前赛事价格。
    - \"我的历史\": 查看你的历史战绩。
    - \"交易，卖家，名称，价格[，数量][，描述]\": 私聊创建一个新的交易品，数量默认为1。
    - \"交易，名称，价格[，数量][，描述]\": 群聊中以自己为卖家创建交易品。
    - \"我的交易品\": 查询你创建的交易品列表。
    - \"交易区\": 浏览当前可用的交易品列表。
    - \"交易区：[名称]\": 浏览名称包含指定文字的可用交易品。
    - \"交易[交易ID]号\": 交易指定ID的交易品。
    - \"开始交易[交易ID]号，名称：[名称]，价格：[价格]，描述：[描述]\": 在群聊中启动一个交易。请确保交易ID正确。
    - \"充值[金额]\": 获取对应金额的兑换码。
    - \"兑换码：[兑换码]\": 使用兑换码完成交易支付。

    请根据指令格式发送消息，确保信息的正确性。";

/// Sent when no price list has been stored.
pub const NO_PRICE_LIST: &str = "暂无赛事信息";
/// Sent when the sender has no recorded sessions.
pub const NO_HISTORY: &str = "没有找到历史记录。";
/// Follows every issued code.
pub const CODE_HINT: &str = "请复制上面这句话发送到微信群中获取星卷。";
/// No unused code exists for the requested amount.
pub const NO_RECHARGE_CODE: &str = "未找到对应金额的充值码，或已被使用。";
/// Closes the item card sent for `交易<id>号`.
pub const SHOW_ITEM_HINT: &str = "扫描上面二维码进群，复制上面的话到群中进行下一步交易";
/// Posted in the venue when a trade starts.
pub const TRADE_STARTED: &str = "现在开始交易，请买家扫描下方二维码联系微信转账，进行下一步指示";
/// The contact card could not be posted.
pub const IMAGE_SEND_FAILED: &str = "发送图片失败，请稍后再试。";
/// The seller has no item with stock left.
pub const NO_OWN_ITEMS: &str = "您当前没有交易品。";
/// Nothing is available in the trade zone.
pub const EMPTY_TRADE_ZONE: &str = "当前没有可用的交易品。";
/// Frames the trade zone listing.
pub const TRADE_ZONE_BANNER: &str = "————交易区————";
/// Generic reply for storage and transport failures.
pub const TRY_AGAIN_LATER: &str = "系统繁忙，请稍后重试。";
const UNDERLINE: &str = "————————————";

/// The code line a buyer copies into the venue.
#[must_use]
pub fn redemption_code(code: &str) -> String {
    format!("兑换码：{code}")
}

/// Acknowledgement of a payment, shared by transfers and redemptions.
#[must_use]
pub fn payment_received(amount: Decimal) -> String {
    format!("用户已转账 {} 元，请进行下一步交易。", format_amount(amount))
}

#[must_use]
pub fn item_created(item: &trade_item::Model) -> String {
    format!(
        "交易品{}创建完成！请创建新群聊并且将二维码发到此微信以便于进行交易",
        item.item_name
    )
}

/// The sentence a seller copies into the venue group to start the trade.
#[must_use]
pub fn start_trade_sentence(item: &trade_item::Model) -> String {
    format!(
        "开始交易{}号，名称：{}，价格：{}，描述：{}",
        item.id,
        item.item_name,
        format_amount(item.price()),
        item.description_text()
    )
}

/// Sent instead of starting a trade when the copied sentence carries an old price.
#[must_use]
pub fn stale_start_sentence(item: &trade_item::Model) -> String {
    format!(
        "交易品价格已变更为{}元，请复制最新的交易语句：\n{}",
        format_amount(item.price()),
        start_trade_sentence(item)
    )
}

/// Private message telling the trade starter what to pay.
#[must_use]
pub fn private_trade_notice(item: &trade_item::Model) -> String {
    format!(
        "您的交易开始，请您转账{}元购买{}，将返回下一步提示",
        format_amount(item.price()),
        item.item_name
    )
}

#[must_use]
pub fn image_attached_private(name: &str) -> String {
    format!("交易品{name}的图片已更新，等待买家进群")
}

#[must_use]
pub fn image_attached_group(name: &str) -> String {
    format!("交易品{name}的图片已更新，请耐心等待用户购买，输入”我的交易品“可以查看")
}

/// One line of `我的交易品`, with the number of units sold.
#[must_use]
pub fn own_item_line(item: &trade_item::Model, sold: u64) -> String {
    format!(
        "交易品ID：{}，名称：{}，价格：{}，描述：{}，数量：{}，已售出：{}",
        item.id,
        item.item_name,
        format_amount(item.price()),
        item.description_text(),
        item.quantity,
        sold
    )
}

/// The browsable listing of available items.
#[must_use]
pub fn trade_zone(items: &[trade_item::Model]) -> String {
    if items.is_empty() {
        return EMPTY_TRADE_ZONE.to_string();
    }
    let mut text = format!("{TRADE_ZONE_BANNER}\n");
    for item in items {
        let _ = writeln!(
            text,
            "{}号---{}（{}），价：{}",
            item.id,
            item.item_name,
            item.description_text(),
            format_amount(item.price())
        );
    }
    text.push_str(TRADE_ZONE_BANNER);
    text
}

/// Session history grouped by order type.
#[must_use]
pub fn history(report: &HistoryReport) -> String {
    if report.is_empty() {
        return NO_HISTORY.to_string();
    }
    let mut text = String::new();
    for (order_type, group) in report {
        let _ = write!(
            text,
            "{order_type}:\n♥♥总使用星卷: {}♥♥\n🚗🚗总摘星: {}🚗🚗\n",
            group.total_star_cost, group.total_stars
        );
        for session in &group.sessions {
            let status = if session.is_active {
                "正在进行中"
            } else {
                "已结束"
            };
            let _ = write!(
                text,
                "{}(使用{}星卷)\n{}--{}星[{}]${}\n{UNDERLINE}\n",
                session.created_at.format("%Y-%m-%d %H:%M:%S"),
                session.star_cost,
                session.game_id,
                session.stars,
                session.final_rank,
                status
            );
        }
        text.push('\n');
    }
    text.trim_end().to_string()
}

/// Renders a catalog or issuer error as plain text for the user.
#[must_use]
pub fn error(error: &Error) -> String {
    match error {
        Error::Validation { reason } => reason.clone(),
        Error::ItemNotFound { id } => format!("未找到{id}号交易品。"),
        Error::PendingItemNotFound { .. } => "没有等待上传图片的交易品，请先创建交易品。".to_string(),
        Error::CodeNotFound { code } => format!("兑换码{code}不存在。"),
        Error::NoCodeForAmount { .. } => NO_RECHARGE_CODE.to_string(),
        Error::VenueNotBound { .. } => "本群还没有开始交易。".to_string(),
        Error::AlreadyBound { id, .. } => format!("{id}号交易品已在其他群开始交易。"),
        Error::CodeAlreadyUsed { code } => format!("兑换码{code}已被使用。"),
        Error::SoldOut { id } => format!("{id}号交易品已售罄。"),
        Error::AmountMismatch { code_amount, price } => format!(
            "兑换码金额{}元与交易品价格{}元不符。",
            format_amount(*code_amount),
            format_amount(*price)
        ),
        _ => TRY_AGAIN_LATER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::history::OrderTypeHistory, entities::session_record};
    use chrono::TimeZone;

    fn item(id: i64, name: &str, price_cents: i64, description: Option<&str>) -> trade_item::Model {
        trade_item::Model {
            id,
            seller: "老王".to_string(),
            venue_id: None,
            item_name: name.to_string(),
            description: description.map(str::to_string),
            price_cents,
            quantity: 2,
            image_ref: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_trade_zone_layout() {
        let text = trade_zone(&[item(1, "手办", 5000, Some("限量版")), item(2, "海报", 1050, None)]);
        assert_eq!(
            text,
            "————交易区————\n1号---手办（限量版），价：50.00\n2号---海报（），价：10.50\n————交易区————"
        );
        assert_eq!(trade_zone(&[]), EMPTY_TRADE_ZONE);
    }

    #[test]
    fn test_start_trade_sentence() {
        let text = start_trade_sentence(&item(7, "手办", 5000, Some("限量版")));
        assert_eq!(text, "开始交易7号，名称：手办，价格：50.00，描述：限量版");
    }

    #[test]
    fn test_stale_start_sentence_repeats_current_sentence() {
        let text = stale_start_sentence(&item(7, "手办", 4500, None));
        assert_eq!(
            text,
            "交易品价格已变更为45.00元，请复制最新的交易语句：\n开始交易7号，名称：手办，价格：45.00，描述："
        );
    }

    #[test]
    fn test_own_item_line() {
        let text = own_item_line(&item(3, "手办", 5000, None), 1);
        assert_eq!(text, "交易品ID：3，名称：手办，价格：50.00，描述：，数量：2，已售出：1");
    }

    #[test]
    fn test_history_layout() {
        let mut report = HistoryReport::new();
        report.insert(
            "排位".to_string(),
            OrderTypeHistory {
                total_star_cost: 10,
                total_stars: 3,
                sessions: vec![session_record::Model {
                    id: 1,
                    player: "玩家".to_string(),
                    order_type: "排位".to_string(),
                    game_id: "g1".to_string(),
                    star_cost: 10,
                    stars: 3,
                    final_rank: "第一".to_string(),
                    is_active: false,
                    created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                }],
            },
        );

        let text = history(&report);
        assert_eq!(
            text,
            "排位:\n♥♥总使用星卷: 10♥♥\n🚗🚗总摘星: 3🚗🚗\n\
             2024-05-01 12:00:00(使用10星卷)\ng1--3星[第一]$已结束\n————————————"
        );
        assert_eq!(history(&HistoryReport::new()), NO_HISTORY);
    }

    #[test]
    fn test_storage_errors_are_generic() {
        let error = Error::Blob {
            message: "disk full".to_string(),
        };
        assert_eq!(super::error(&error), TRY_AGAIN_LATER);
        let error = Error::SoldOut { id: 4 };
        assert_eq!(super::error(&error), "4号交易品已售罄。");
    }
}
