//! Trade Journal - derived, append-only analytics per execution
//!
//! Everything here is advisory: `derive_insight` is a pure function of the
//! execution, the order, and the book at fill time, and its output never
//! gates order state. Retention is bounded; the oldest entries are evicted
//! past the configured cap.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::core::{BookSnapshot, ExecutionReport, Order, OrderId, OrderType, Side, Symbol};

const HIGH_SLIPPAGE: f64 = 0.05;
const SEVERE_SLIPPAGE: f64 = 0.10;
const WIDE_SPREAD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Open,
    Profit,
    Loss,
    BreakEven,
}

/// Pure classification of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalInsight {
    pub quality: ExecutionQuality,
    pub slippage: Option<f64>,
    pub outcome: Outcome,
    pub gain_loss: Option<f64>,
    pub reasoning: String,
    pub market_conditions: String,
    pub strategy: String,
    pub tags: Vec<String>,
    pub mistakes: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeJournalEntry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: u64,
    pub price: f64,
    pub venue: String,
    pub executed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub insight: JournalInsight,
}

fn strategy_label(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Stop => "stop",
        OrderType::StopLimit => "stop-limit",
        OrderType::TrailingStop => "trailing-stop",
        OrderType::TrailingStopLimit => "trailing-stop-limit",
        OrderType::Oco => "oco",
        OrderType::Bracket => "bracket",
    }
}

fn quality_and_slippage(
    report: &ExecutionReport,
    order: &Order,
    book: Option<&BookSnapshot>,
) -> (ExecutionQuality, Option<f64>) {
    match order.order_type {
        OrderType::Limit | OrderType::StopLimit | OrderType::TrailingStopLimit => {
            let Some(limit) = order.limit_price else {
                return (ExecutionQuality::Good, None);
            };
            let slippage = (report.price - limit).abs();
            let quality = if slippage <= 0.01 {
                ExecutionQuality::Excellent
            } else if slippage <= 0.05 {
                ExecutionQuality::Good
            } else if slippage <= 0.10 {
                ExecutionQuality::Fair
            } else {
                ExecutionQuality::Poor
            };
            (quality, Some(slippage))
        }
        OrderType::Market => {
            // for market orders, measure against the touch at fill time
            let expected = book.and_then(|b| match order.side {
                Side::Buy => b.best_ask().map(|l| l.price),
                Side::Sell => b.best_bid().map(|l| l.price),
            });
            let Some(expected) = expected else {
                return (ExecutionQuality::Good, None);
            };
            let slippage = (report.price - expected).abs();
            let quality = if slippage <= 0.02 {
                ExecutionQuality::Good
            } else if slippage <= 0.05 {
                ExecutionQuality::Fair
            } else {
                ExecutionQuality::Poor
            };
            (quality, Some(slippage))
        }
        _ => (ExecutionQuality::Good, None),
    }
}

fn keyword_tags(notes: &str) -> Vec<String> {
    const KEYWORDS: [(&str, &str); 6] = [
        ("breakout", "breakout"),
        ("earnings", "earnings"),
        ("rsi", "RSI"),
        ("macd", "MACD"),
        ("support", "support"),
        ("resistance", "resistance"),
    ];
    let lowered = notes.to_lowercase();
    KEYWORDS
        .iter()
        .filter(|(needle, _)| lowered.contains(needle))
        .map(|(_, tag)| tag.to_string())
        .collect()
}

fn price_context(order: &Order) -> String {
    match order.order_type {
        OrderType::Limit => order
            .limit_price
            .map(|p| format!("Limit order at ${p:.2}"))
            .unwrap_or_else(|| "Limit order".into()),
        OrderType::Stop => order
            .stop_price
            .map(|p| format!("Stop order triggered at ${p:.2}"))
            .unwrap_or_else(|| "Stop order triggered".into()),
        OrderType::StopLimit => match (order.stop_price, order.limit_price) {
            (Some(s), Some(l)) => {
                format!("Stop limit order triggered at ${s:.2} with limit ${l:.2}")
            }
            _ => "Stop limit order triggered".into(),
        },
        OrderType::TrailingStop | OrderType::TrailingStopLimit => {
            "Trailing stop order triggered".into()
        }
        _ => "Market order".into(),
    }
}

/// Derive the advisory classification for one execution. Pure function:
/// no clocks, no state, no side effects.
pub fn derive_insight(
    report: &ExecutionReport,
    order: &Order,
    book: Option<&BookSnapshot>,
    realized_pnl: Option<f64>,
) -> JournalInsight {
    let (quality, slippage) = quality_and_slippage(report, order, book);

    let mut notes = Vec::new();
    match order.order_type {
        OrderType::Stop => notes.push("Stop triggered".to_string()),
        OrderType::StopLimit => notes.push("Stop limit triggered".to_string()),
        OrderType::TrailingStop | OrderType::TrailingStopLimit => {
            notes.push("Trailing stop triggered".to_string());
        }
        _ => {}
    }
    if let Some(s) = slippage
        && s > HIGH_SLIPPAGE
    {
        notes.push(format!("High slippage: ${s:.2}"));
    }
    if !report.venue.is_empty() {
        notes.push(format!("Venue: {}", report.venue));
    }

    let spread = book.and_then(|b| b.spread());
    if let Some(s) = spread
        && s > WIDE_SPREAD
    {
        notes.push(format!("Wide spread: ${s:.2}"));
    }

    let mut tags = vec![format!("{}-order", strategy_label(order.order_type))];
    if let Some(user_notes) = &order.notes {
        tags.extend(keyword_tags(user_notes));
    }
    if slippage.is_some_and(|s| s > HIGH_SLIPPAGE) {
        tags.push("high-slippage".into());
    }
    match quality {
        ExecutionQuality::Excellent => tags.push("excellent-execution".into()),
        ExecutionQuality::Poor => tags.push("poor-execution".into()),
        _ => {}
    }

    let mut mistakes = Vec::new();
    if quality == ExecutionQuality::Poor {
        mistakes.push("poor execution".to_string());
    }
    if slippage.is_some_and(|s| s > SEVERE_SLIPPAGE) {
        mistakes.push("high slippage".to_string());
    }
    if order.order_type == OrderType::Market && slippage.is_some_and(|s| s > HIGH_SLIPPAGE) {
        mistakes.push("market impact".to_string());
    }

    let action = match order.side {
        Side::Buy => format!(
            "{} to establish position in {}",
            price_context(order),
            order.symbol
        ),
        Side::Sell => format!("{} to close {}", price_context(order), order.symbol),
    };
    let reasoning = match &order.notes {
        Some(user_notes) => format!("{action} - {user_notes}"),
        None => action,
    };

    let market_conditions = match (spread, book.and_then(|b| b.best_bid())) {
        (Some(s), Some(bid)) if bid.price > 0.0 => {
            let pct = s / bid.price * 100.0;
            if pct > 0.5 {
                format!("Wide spread market ({pct:.2}%)")
            } else if pct < 0.1 {
                format!("Tight spread market ({pct:.2}%)")
            } else {
                format!("Normal spread market ({pct:.2}%)")
            }
        }
        _ => "Normal market conditions".to_string(),
    };

    let (outcome, gain_loss) = match (order.side, realized_pnl) {
        (Side::Buy, _) => (Outcome::Open, None),
        (Side::Sell, Some(r)) if r > 1e-9 => (Outcome::Profit, Some(r)),
        (Side::Sell, Some(r)) if r < -1e-9 => (Outcome::Loss, Some(r)),
        (Side::Sell, Some(r)) => (Outcome::BreakEven, Some(r)),
        (Side::Sell, None) => (Outcome::BreakEven, None),
    };

    JournalInsight {
        quality,
        slippage,
        outcome,
        gain_loss,
        reasoning,
        market_conditions,
        strategy: strategy_label(order.order_type).to_string(),
        tags,
        mistakes,
        notes: if notes.is_empty() {
            "Standard execution".to_string()
        } else {
            notes.join(" | ")
        },
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagStats {
    pub count: usize,
    pub wins: usize,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MistakeStats {
    pub count: usize,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolStats {
    pub trades: usize,
    pub wins: usize,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalAnalytics {
    pub total_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub tag_analysis: HashMap<String, TagStats>,
    pub mistake_analysis: HashMap<String, MistakeStats>,
    pub symbol_performance: HashMap<String, SymbolStats>,
}

pub struct TradeJournal {
    entries: Mutex<VecDeque<TradeJournalEntry>>,
    max_entries: usize,
}

impl TradeJournal {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    /// Record one execution. Never fails the caller; the entry is immutable
    /// once stored.
    pub fn record(
        &self,
        report: &ExecutionReport,
        order: &Order,
        book: Option<&BookSnapshot>,
        realized_pnl: Option<f64>,
    ) -> TradeJournalEntry {
        let entry = TradeJournalEntry {
            id: Uuid::new_v4(),
            order_id: report.order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            qty: report.qty,
            price: report.price,
            venue: report.venue.clone(),
            executed_at: report.execution_time,
            insight: derive_insight(report, order, book, realized_pnl),
        };

        let mut entries = self.entries.lock();
        entries.push_back(entry.clone());
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent entries, newest last. `offset` skips back from the tail.
    pub fn entries(&self, limit: usize, offset: usize) -> Vec<TradeJournalEntry> {
        let entries = self.entries.lock();
        let mut page: Vec<TradeJournalEntry> = entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        page.reverse();
        page
    }

    pub fn analytics(&self) -> JournalAnalytics {
        let entries = self.entries.lock();
        let mut out = JournalAnalytics {
            total_trades: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            return out;
        }

        let mut wins = 0usize;
        for entry in entries.iter() {
            let pnl = entry.insight.gain_loss.unwrap_or(0.0);
            let won = entry.insight.outcome == Outcome::Profit;
            if won {
                wins += 1;
            }
            out.total_pnl += pnl;

            for tag in &entry.insight.tags {
                let stats = out.tag_analysis.entry(tag.clone()).or_default();
                stats.count += 1;
                if won {
                    stats.wins += 1;
                }
                stats.total_pnl += pnl;
            }
            for mistake in &entry.insight.mistakes {
                let stats = out.mistake_analysis.entry(mistake.clone()).or_default();
                stats.count += 1;
                stats.total_pnl += pnl;
            }
            let stats = out
                .symbol_performance
                .entry(entry.symbol.to_string())
                .or_default();
            stats.trades += 1;
            if won {
                stats.wins += 1;
            }
            stats.total_pnl += pnl;
        }

        let round2 = |v: f64| (v * 100.0).round() / 100.0;
        out.win_rate = round2(wins as f64 / out.total_trades as f64 * 100.0);
        out.avg_pnl = round2(out.total_pnl / out.total_trades as f64);
        out.total_pnl = round2(out.total_pnl);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OrderRequest, OrderStatus, TimeInForce};

    fn order(order_type: OrderType, side: Side, limit_price: Option<f64>) -> Order {
        let req = OrderRequest {
            symbol: Symbol::new("AAPL"),
            side,
            order_type,
            qty: 10,
            limit_price,
            stop_price: Some(105.0),
            trailing_percent: None,
            trailing_amount: None,
            tif: TimeInForce::Day,
            gtd_date: None,
            profit_target: None,
            stop_loss: None,
            parent_order_id: None,
            linked_order_id: None,
            notes: None,
        };
        Order::from_request(OrderId::new(), req, Utc::now())
    }

    fn report(order: &Order, price: f64) -> ExecutionReport {
        ExecutionReport {
            order_id: order.id.clone(),
            venue: "SIMX".into(),
            price,
            qty: 10,
            is_final: true,
            status: OrderStatus::Filled,
            message: None,
            execution_time: Utc::now(),
            order_book_snapshot: None,
        }
    }

    #[test]
    fn limit_fill_at_price_is_excellent() {
        let o = order(OrderType::Limit, Side::Buy, Some(100.0));
        let insight = derive_insight(&report(&o, 100.0), &o, None, None);
        assert_eq!(insight.quality, ExecutionQuality::Excellent);
        assert_eq!(insight.slippage, Some(0.0));
        assert!(insight.tags.contains(&"excellent-execution".to_string()));
    }

    #[test]
    fn limit_fill_far_from_price_is_poor_with_mistakes() {
        let o = order(OrderType::Limit, Side::Buy, Some(100.0));
        let insight = derive_insight(&report(&o, 100.5), &o, None, None);
        assert_eq!(insight.quality, ExecutionQuality::Poor);
        assert!(insight.mistakes.contains(&"poor execution".to_string()));
        assert!(insight.mistakes.contains(&"high slippage".to_string()));
        assert!(insight.notes.contains("High slippage"));
    }

    #[test]
    fn stop_order_is_tagged_and_noted() {
        let o = order(OrderType::Stop, Side::Sell, None);
        let insight = derive_insight(&report(&o, 104.8), &o, None, Some(24.0));
        assert!(insight.tags.contains(&"stop-order".to_string()));
        assert!(insight.notes.contains("Stop triggered"));
        assert_eq!(insight.outcome, Outcome::Profit);
        assert_eq!(insight.gain_loss, Some(24.0));
    }

    #[test]
    fn user_notes_produce_strategy_tags() {
        let mut o = order(OrderType::Market, Side::Buy, None);
        o.notes = Some("RSI oversold breakout above resistance".into());
        let insight = derive_insight(&report(&o, 100.0), &o, None, None);
        for tag in ["RSI", "breakout", "resistance"] {
            assert!(insight.tags.contains(&tag.to_string()), "missing {tag}");
        }
        assert!(insight.reasoning.contains("RSI oversold"));
    }

    #[test]
    fn buy_side_is_an_open_outcome() {
        let o = order(OrderType::Market, Side::Buy, None);
        let insight = derive_insight(&report(&o, 100.0), &o, None, None);
        assert_eq!(insight.outcome, Outcome::Open);
        assert_eq!(insight.gain_loss, None);
    }

    #[test]
    fn journal_evicts_past_the_cap() {
        let journal = TradeJournal::new(3);
        let o = order(OrderType::Market, Side::Buy, None);
        for _ in 0..5 {
            journal.record(&report(&o, 100.0), &o, None, None);
        }
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn pagination_walks_back_from_the_tail() {
        let journal = TradeJournal::new(100);
        let o = order(OrderType::Market, Side::Buy, None);
        for i in 0..5 {
            journal.record(&report(&o, 100.0 + i as f64), &o, None, None);
        }
        let page = journal.entries(2, 1);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].price, 102.0);
        assert_eq!(page[1].price, 103.0);
    }

    #[test]
    fn analytics_aggregate_outcomes_and_tags() {
        let journal = TradeJournal::new(100);
        let sell = order(OrderType::Limit, Side::Sell, Some(100.0));
        journal.record(&report(&sell, 100.0), &sell, None, Some(50.0));
        journal.record(&report(&sell, 100.0), &sell, None, Some(-20.0));

        let analytics = journal.analytics();
        assert_eq!(analytics.total_trades, 2);
        assert_eq!(analytics.win_rate, 50.0);
        assert_eq!(analytics.total_pnl, 30.0);
        assert_eq!(analytics.avg_pnl, 15.0);
        let tag = analytics.tag_analysis.get("limit-order").unwrap();
        assert_eq!(tag.count, 2);
        assert_eq!(tag.wins, 1);
        let sym = analytics.symbol_performance.get("AAPL").unwrap();
        assert_eq!(sym.trades, 2);
    }

    #[test]
    fn empty_journal_analytics_are_zeroed() {
        let journal = TradeJournal::new(10);
        let analytics = journal.analytics();
        assert_eq!(analytics.total_trades, 0);
        assert_eq!(analytics.win_rate, 0.0);
    }
}
