use thiserror::Error;

/// Failure modes of the pure analysis components.
///
/// These are expected, testable outcomes rather than exceptional conditions:
/// the aggregation boundary maps them to documented neutral results instead
/// of letting them abort a sweep.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("insufficient data: need {needed} {unit}, got {got}")]
    InsufficientData {
        needed: usize,
        got: usize,
        unit: &'static str,
    },

    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
}

impl AnalysisError {
    pub fn insufficient_candles(needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            needed,
            got,
            unit: "candles",
        }
    }

    pub fn insufficient_trades(needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            needed,
            got,
            unit: "trades",
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateInput {
            reason: reason.into(),
        }
    }
}

/// Errors raised at the ingestion boundary for data that is structurally
/// invalid. These reject the symbol's cycle outright, unlike
/// [`AnalysisError`] which degrades a single component.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    #[error("non-monotonic timestamps at index {index}: {prev} >= {next}")]
    NonMonotonicTimestamps { index: usize, prev: i64, next: i64 },

    #[error("non-positive price in {what} at index {index}")]
    NonPositivePrice { what: &'static str, index: usize },

    #[error("negative quantity in {what} at index {index}")]
    NegativeQuantity { what: &'static str, index: usize },

    #[error("candle at index {index} has low > high")]
    InvertedCandle { index: usize },

    #[error("order book side {side} is not sorted at level {index}")]
    UnsortedBook { side: &'static str, index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let err = AnalysisError::insufficient_candles(110, 5);
        let msg = err.to_string();
        assert!(msg.contains("110"));
        assert!(msg.contains("5"));
        assert!(msg.contains("candles"));
    }

    #[test]
    fn test_ingest_error_formatting() {
        let err = IngestError::NonMonotonicTimestamps {
            index: 3,
            prev: 200,
            next: 100,
        };
        assert!(err.to_string().contains("index 3"));
    }
}
