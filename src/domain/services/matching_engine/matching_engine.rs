//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the per-session matching engine. Orders wait in a FIFO queue per ticker
// and are evaluated on every pass against one price snapshot taken at the start of the pass.
//
// | Component                | Description                                                |
// |--------------------------|------------------------------------------------------------|
// | MatchingEngine           | Per-ticker order queues and the pass algorithm             |
// | MatchDecision            | What a pass does with a single order                       |
// | PassOutcome              | Executions and discarded orders produced by one pass       |
//
//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                       | Key Methods      |
// |-------------------------|---------------------------------------------------|------------------|
// | MatchingEngine          | Queues pending orders and runs passes             | submit           |
// |                         |                                                   | run_pass         |
// |                         |                                                   | pending          |
// |-------------------------|---------------------------------------------------|------------------|
// | PassOutcome             | Result of a pass                                  | executions       |
// |                         |                                                   | discarded        |
//
//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                    | Description                                       | Return Type      |
// |-------------------------|---------------------------------------------------|------------------|
// | decide                  | Applies the match policy to one order             | MatchDecision    |
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, VecDeque};

use crate::domain::models::types::{Execution, PendingOrder, Price};
use crate::domain::services::matching_engine::InvalidOrder;
use crate::domain::services::price_store::PriceStore;

/// What a pass does with a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// Execute at the snapshot price
    Execute,
    /// Keep the order, in place, for the next pass
    Requeue,
    /// Drop the order without executing it
    Discard(InvalidOrder),
}

/// An order dropped by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedOrder {
    pub order: PendingOrder,
    pub reason: InvalidOrder,
}

/// Everything a single pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Executions, grouped by ticker and in queue order within a ticker
    pub executions: Vec<Execution>,
    /// Orders dropped as invalid
    pub discarded: Vec<DiscardedOrder>,
}

impl PassOutcome {
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty() && self.discarded.is_empty()
    }
}

/// Applies the match policy to one order given the snapshot price of its stock.
///
/// Market orders always execute. A limit buy executes when the price is at or below the limit,
/// a limit sell when it is at or above. Zero amounts are invalid whatever the limit.
pub fn decide(order: &PendingOrder, price: Price) -> MatchDecision {
    if order.amount == 0 {
        return MatchDecision::Discard(InvalidOrder::ZeroAmount);
    }
    let Some(limit) = order.limit_price else {
        return MatchDecision::Execute;
    };
    let crossed = if order.is_buy() { price <= limit } else { price >= limit };
    if crossed {
        MatchDecision::Execute
    } else {
        MatchDecision::Requeue
    }
}

/// Matching engine owned by a single trading session.
///
/// Queues are private to the engine; only the price store is shared.
#[derive(Debug)]
pub struct MatchingEngine {
    store: PriceStore,
    queues: BTreeMap<String, VecDeque<PendingOrder>>,
}

impl MatchingEngine {
    pub fn new(store: PriceStore) -> Self {
        Self {
            store,
            queues: BTreeMap::new(),
        }
    }

    /// Appends an order to the tail of its ticker's queue.
    pub fn submit(&mut self, order: PendingOrder) {
        self.queues
            .entry(order.ticker.clone())
            .or_default()
            .push_back(order);
    }

    /// Number of orders waiting across all tickers.
    pub fn pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Orders waiting for `ticker`, oldest first.
    pub fn pending_for(&self, ticker: &str) -> Vec<PendingOrder> {
        self.queues
            .get(ticker)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Evaluates every queued order against one price snapshot.
    ///
    /// Each queue is partitioned in order into executed, discarded and requeued orders. The
    /// requeued subsequence replaces the queue, so relative order survives across passes.
    pub fn run_pass(&mut self) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        if self.queues.is_empty() {
            return outcome;
        }

        let snapshot = self.store.snapshot(self.queues.keys().map(String::as_str));

        for (ticker, queue) in self.queues.iter_mut() {
            let Some(&price) = snapshot.get(ticker) else {
                outcome
                    .discarded
                    .extend(queue.drain(..).map(|order| DiscardedOrder {
                        order,
                        reason: InvalidOrder::UnknownTicker,
                    }));
                continue;
            };

            let mut kept = VecDeque::with_capacity(queue.len());
            for order in queue.drain(..) {
                match decide(&order, price) {
                    MatchDecision::Execute => outcome.executions.push(Execution {
                        ticker: order.ticker,
                        amount: order.amount,
                        executed_price: price,
                    }),
                    MatchDecision::Requeue => kept.push_back(order),
                    MatchDecision::Discard(reason) => {
                        outcome.discarded.push(DiscardedOrder { order, reason })
                    }
                }
            }
            *queue = kept;
        }

        self.queues.retain(|_, queue| !queue.is_empty());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_aapl(price: Price) -> (MatchingEngine, PriceStore) {
        let store = PriceStore::new();
        store.insert("AAPL", "Apple Inc. Common Stock", price).unwrap();
        (MatchingEngine::new(store.clone()), store)
    }

    fn execution(ticker: &str, amount: i64, price: Price) -> Execution {
        Execution {
            ticker: ticker.to_string(),
            amount,
            executed_price: price,
        }
    }

    #[test]
    fn test_decide_policy() {
        let price = 9_000;
        assert_eq!(decide(&PendingOrder::market("AAPL", 1), price), MatchDecision::Execute);
        assert_eq!(decide(&PendingOrder::market("AAPL", -1), price), MatchDecision::Execute);

        assert_eq!(decide(&PendingOrder::limit("AAPL", 1, 9_000), price), MatchDecision::Execute);
        assert_eq!(decide(&PendingOrder::limit("AAPL", 1, 8_999), price), MatchDecision::Requeue);

        assert_eq!(decide(&PendingOrder::limit("AAPL", -1, 9_000), price), MatchDecision::Execute);
        assert_eq!(decide(&PendingOrder::limit("AAPL", -1, 9_001), price), MatchDecision::Requeue);

        assert_eq!(
            decide(&PendingOrder::limit("AAPL", 0, 9_500), price),
            MatchDecision::Discard(InvalidOrder::ZeroAmount)
        );
        assert_eq!(
            decide(&PendingOrder::market("AAPL", 0), price),
            MatchDecision::Discard(InvalidOrder::ZeroAmount)
        );
    }

    #[test]
    fn test_market_order_executes_on_next_pass() {
        let (mut engine, _) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::market("AAPL", 3));

        let outcome = engine.run_pass();
        assert_eq!(outcome.executions, vec![execution("AAPL", 3, 9_000)]);
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_limit_buy_waits_for_price_to_drop() {
        let (mut engine, store) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::limit("AAPL", 5, 8_500));

        assert!(engine.run_pass().is_empty());
        assert_eq!(engine.pending_for("AAPL"), vec![PendingOrder::limit("AAPL", 5, 8_500)]);

        store.apply_price_change("AAPL", 8_400).unwrap();
        let outcome = engine.run_pass();
        assert_eq!(outcome.executions, vec![execution("AAPL", 5, 8_400)]);
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_limit_sell_waits_for_price_to_rise() {
        let (mut engine, store) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::limit("AAPL", -2, 9_500));

        assert!(engine.run_pass().executions.is_empty());

        store.apply_price_change("AAPL", 9_600).unwrap();
        assert_eq!(engine.run_pass().executions, vec![execution("AAPL", -2, 9_600)]);
    }

    #[test]
    fn test_requeued_orders_keep_relative_order() {
        let (mut engine, store) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::limit("AAPL", 1, 8_000));
        engine.submit(PendingOrder::market("AAPL", 2));
        engine.submit(PendingOrder::limit("AAPL", 3, 8_500));
        engine.submit(PendingOrder::limit("AAPL", -4, 9_900));
        engine.submit(PendingOrder::limit("AAPL", 5, 8_200));

        let outcome = engine.run_pass();
        assert_eq!(outcome.executions, vec![execution("AAPL", 2, 9_000)]);
        let amounts: Vec<_> = engine.pending_for("AAPL").iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![1, 3, -4, 5]);

        store.apply_price_change("AAPL", 8_300).unwrap();
        let outcome = engine.run_pass();
        assert_eq!(outcome.executions, vec![execution("AAPL", 3, 8_300)]);
        let amounts: Vec<_> = engine.pending_for("AAPL").iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![1, -4, 5]);

        // new arrivals queue behind the survivors
        engine.submit(PendingOrder::limit("AAPL", 6, 8_100));
        store.apply_price_change("AAPL", 7_900).unwrap();
        let executed: Vec<_> = engine.run_pass().executions.iter().map(|e| e.amount).collect();
        assert_eq!(executed, vec![1, 5, 6]);
        assert_eq!(engine.pending_for("AAPL"), vec![PendingOrder::limit("AAPL", -4, 9_900)]);
    }

    #[test]
    fn test_zero_amount_is_discarded_not_requeued() {
        let (mut engine, _) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::limit("AAPL", 0, 1));
        engine.submit(PendingOrder::market("AAPL", 0));

        let outcome = engine.run_pass();
        assert!(outcome.executions.is_empty());
        assert_eq!(outcome.discarded.len(), 2);
        assert!(outcome.discarded.iter().all(|d| d.reason == InvalidOrder::ZeroAmount));
        assert_eq!(engine.pending(), 0);
        assert!(engine.run_pass().is_empty());
    }

    #[test]
    fn test_unknown_ticker_is_discarded_and_never_retried() {
        let (mut engine, store) = engine_with_aapl(9_000);
        engine.submit(PendingOrder::market("MSFT", 1));
        engine.submit(PendingOrder::market("AAPL", 1));

        let outcome = engine.run_pass();
        assert_eq!(outcome.executions, vec![execution("AAPL", 1, 9_000)]);
        assert_eq!(
            outcome.discarded,
            vec![DiscardedOrder {
                order: PendingOrder::market("MSFT", 1),
                reason: InvalidOrder::UnknownTicker,
            }]
        );

        // listing the stock later does not bring the order back
        store.insert("MSFT", "", 100).unwrap();
        assert!(engine.run_pass().is_empty());
    }

    #[test]
    fn test_executions_are_grouped_by_ticker_in_fifo_order() {
        let (mut engine, store) = engine_with_aapl(9_000);
        store.insert("PEP", "", 5_000).unwrap();
        engine.submit(PendingOrder::market("PEP", 1));
        engine.submit(PendingOrder::market("AAPL", 2));
        engine.submit(PendingOrder::market("PEP", 3));

        let outcome = engine.run_pass();
        assert_eq!(
            outcome.executions,
            vec![
                execution("AAPL", 2, 9_000),
                execution("PEP", 1, 5_000),
                execution("PEP", 3, 5_000),
            ]
        );
    }

    #[test]
    fn test_pass_uses_one_snapshot_price() {
        let (mut engine, _) = engine_with_aapl(9_000);
        for amount in 1..=10 {
            engine.submit(PendingOrder::market("AAPL", amount));
        }
        let outcome = engine.run_pass();
        assert_eq!(outcome.executions.len(), 10);
        assert!(outcome.executions.iter().all(|e| e.executed_price == 9_000));
    }
}
