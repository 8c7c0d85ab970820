use crate::domain::errors::IngestError;
use crate::domain::market::types::{Candle, MarketSnapshot, OrderBookSnapshot, Trade};
use rust_decimal::Decimal;

/// Centralized validator for market data integrity.
///
/// Rejects data that is physically impossible (negative prices, inverted
/// candles, unsorted books, timestamps running backwards) before it can
/// reach the analysis core. A rejection skips the symbol's cycle.
pub struct SnapshotValidator;

impl SnapshotValidator {
    pub fn validate(snapshot: &MarketSnapshot) -> Result<(), IngestError> {
        Self::validate_candles(&snapshot.candles)?;
        Self::validate_trades(&snapshot.trades)?;
        Self::validate_book(&snapshot.order_book)?;
        Ok(())
    }

    pub fn validate_candles(candles: &[Candle]) -> Result<(), IngestError> {
        for (i, candle) in candles.iter().enumerate() {
            if candle.open <= Decimal::ZERO
                || candle.high <= Decimal::ZERO
                || candle.low <= Decimal::ZERO
                || candle.close <= Decimal::ZERO
            {
                return Err(IngestError::NonPositivePrice {
                    what: "candle",
                    index: i,
                });
            }
            if candle.low > candle.high {
                return Err(IngestError::InvertedCandle { index: i });
            }
            if candle.volume < Decimal::ZERO {
                return Err(IngestError::NegativeQuantity {
                    what: "candle",
                    index: i,
                });
            }
            if i > 0 && candles[i - 1].timestamp >= candle.timestamp {
                return Err(IngestError::NonMonotonicTimestamps {
                    index: i,
                    prev: candles[i - 1].timestamp,
                    next: candle.timestamp,
                });
            }
        }
        Ok(())
    }

    pub fn validate_trades(trades: &[Trade]) -> Result<(), IngestError> {
        for (i, trade) in trades.iter().enumerate() {
            if trade.price <= Decimal::ZERO {
                return Err(IngestError::NonPositivePrice {
                    what: "trade",
                    index: i,
                });
            }
            if trade.qty < Decimal::ZERO {
                return Err(IngestError::NegativeQuantity {
                    what: "trade",
                    index: i,
                });
            }
        }
        Ok(())
    }

    pub fn validate_book(book: &OrderBookSnapshot) -> Result<(), IngestError> {
        for (i, level) in book.bids.iter().chain(book.asks.iter()).enumerate() {
            if level.price <= Decimal::ZERO {
                return Err(IngestError::NonPositivePrice {
                    what: "book level",
                    index: i,
                });
            }
            if level.qty < Decimal::ZERO {
                return Err(IngestError::NegativeQuantity {
                    what: "book level",
                    index: i,
                });
            }
        }
        // Bids descending
        for i in 1..book.bids.len() {
            if book.bids[i].price > book.bids[i - 1].price {
                return Err(IngestError::UnsortedBook {
                    side: "bids",
                    index: i,
                });
            }
        }
        // Asks ascending
        for i in 1..book.asks.len() {
            if book.asks[i].price < book.asks[i - 1].price {
                return Err(IngestError::UnsortedBook {
                    side: "asks",
                    index: i,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::types::{BookLevel, TakerSide};
    use rust_decimal_macros::dec;

    fn ok_candle(ts: i64) -> Candle {
        Candle {
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100),
            volume: dec!(1000),
            timestamp: ts,
        }
    }

    #[test]
    fn test_valid_series_passes() {
        let candles: Vec<Candle> = (0..5).map(ok_candle).collect();
        assert!(SnapshotValidator::validate_candles(&candles).is_ok());
    }

    #[test]
    fn test_backwards_timestamps_rejected() {
        let mut candles: Vec<Candle> = (0..5).map(ok_candle).collect();
        candles[3].timestamp = 1;
        let err = SnapshotValidator::validate_candles(&candles).unwrap_err();
        assert!(matches!(err, IngestError::NonMonotonicTimestamps { .. }));
    }

    #[test]
    fn test_inverted_candle_rejected() {
        let mut candles: Vec<Candle> = (0..2).map(ok_candle).collect();
        candles[1].low = dec!(200);
        let err = SnapshotValidator::validate_candles(&candles).unwrap_err();
        assert!(matches!(err, IngestError::InvertedCandle { index: 1 }));
    }

    #[test]
    fn test_negative_trade_qty_rejected() {
        let trades = vec![Trade {
            price: dec!(100),
            qty: dec!(-1),
            timestamp: 0,
            taker_side: TakerSide::Buy,
        }];
        let err = SnapshotValidator::validate_trades(&trades).unwrap_err();
        assert!(matches!(err, IngestError::NegativeQuantity { .. }));
    }

    #[test]
    fn test_unsorted_bids_rejected() {
        let book = OrderBookSnapshot {
            bids: vec![
                BookLevel { price: dec!(99), qty: dec!(1) },
                BookLevel { price: dec!(100), qty: dec!(1) },
            ],
            asks: vec![],
        };
        let err = SnapshotValidator::validate_book(&book).unwrap_err();
        assert!(matches!(err, IngestError::UnsortedBook { side: "bids", .. }));
    }
}
