use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn between(previous: Option<f64>, current: f64) -> Self {
        match previous {
            Some(prev) if current > prev => Direction::Up,
            Some(prev) if current < prev => Direction::Down,
            _ => Direction::Neutral,
        }
    }
}

/// Where the current price sits relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Sell,
    Buy,
    InRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRow {
    pub symbol: String,
    pub price: f64,
    pub previous_price: Option<f64>,
    /// `0.0` until the window has filled.
    pub sma: f64,
    pub sell_price: f64,
    pub buy_price: f64,
    /// No price arrived for this instrument on the latest tick.
    pub stale: bool,
}

impl InstrumentRow {
    pub fn direction(&self) -> Direction {
        Direction::between(self.previous_price, self.price)
    }

    pub fn change_pct(&self) -> Option<f64> {
        self.previous_price
            .filter(|prev| *prev != 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }

    pub fn zone(&self) -> Zone {
        if self.price >= self.sell_price {
            Zone::Sell
        } else if self.price <= self.buy_price {
            Zone::Buy
        } else {
            Zone::InRange
        }
    }
}

/// Everything the presentation layer needs from one tick.
#[derive(Debug, Clone)]
pub struct TickSnapshot {
    pub taken_at: DateTime<Local>,
    pub rows: Vec<InstrumentRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price: f64, previous_price: Option<f64>) -> InstrumentRow {
        InstrumentRow {
            symbol: "PETR4.SA".to_string(),
            price,
            previous_price,
            sma: 0.0,
            sell_price: 30.0,
            buy_price: 25.0,
            stale: false,
        }
    }

    #[test]
    fn direction_follows_previous_price() {
        assert_eq!(row(28.0, Some(27.0)).direction(), Direction::Up);
        assert_eq!(row(26.0, Some(27.0)).direction(), Direction::Down);
        assert_eq!(row(27.0, Some(27.0)).direction(), Direction::Neutral);
        assert_eq!(row(27.0, None).direction(), Direction::Neutral);
    }

    #[test]
    fn zone_uses_inclusive_thresholds() {
        assert_eq!(row(30.0, None).zone(), Zone::Sell);
        assert_eq!(row(25.0, None).zone(), Zone::Buy);
        assert_eq!(row(27.5, None).zone(), Zone::InRange);
    }

    #[test]
    fn change_pct_needs_a_previous_price() {
        assert_eq!(row(27.5, Some(25.0)).change_pct(), Some(10.0));
        assert_eq!(row(27.5, None).change_pct(), None);
    }
}
