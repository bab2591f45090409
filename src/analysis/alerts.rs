use crate::config::InstrumentConfig;
use log::info;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RaiseSell,
    RaiseBuy,
    Hold,
}

/// Threshold-crossing state machine for a single instrument.
///
/// An alert fires once when the price reaches its threshold and stays armed
/// until the price moves back to the other side of it. Sell and buy sides
/// re-arm independently. Never share one engine between instruments.
#[derive(Debug)]
pub struct AlertEngine {
    instrument: Arc<InstrumentConfig>,
    sell_armed: bool,
    buy_armed: bool,
}

impl AlertEngine {
    pub fn new(instrument: Arc<InstrumentConfig>) -> Self {
        Self {
            instrument,
            sell_armed: false,
            buy_armed: false,
        }
    }

    pub fn decide(&mut self, price: f64) -> Decision {
        let sell_price = self.instrument.sell_price();
        let buy_price = self.instrument.buy_price();

        if price >= sell_price && !self.sell_armed {
            self.sell_armed = true;
            return Decision::RaiseSell;
        } else if price < sell_price && self.sell_armed {
            info!(
                "{} back below sell price {:.2}, re-arming sell alert",
                self.instrument.symbol(),
                sell_price
            );
            self.sell_armed = false;
        }

        if price <= buy_price && !self.buy_armed {
            self.buy_armed = true;
            return Decision::RaiseBuy;
        } else if price > buy_price && self.buy_armed {
            info!(
                "{} back above buy price {:.2}, re-arming buy alert",
                self.instrument.symbol(),
                buy_price
            );
            self.buy_armed = false;
        }

        Decision::Hold
    }

    pub fn is_sell_armed(&self) -> bool {
        self.sell_armed
    }

    pub fn is_buy_armed(&self) -> bool {
        self.buy_armed
    }
}

/// Notification content for a raised decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub symbol: String,
    pub decision: Decision,
    pub price: f64,
    pub threshold: f64,
}

impl Alert {
    /// `None` for [`Decision::Hold`].
    pub fn from_decision(decision: Decision, instrument: &InstrumentConfig, price: f64) -> Option<Self> {
        let threshold = match decision {
            Decision::RaiseSell => instrument.sell_price(),
            Decision::RaiseBuy => instrument.buy_price(),
            Decision::Hold => return None,
        };
        Some(Self {
            symbol: instrument.symbol().to_string(),
            decision,
            price,
            threshold,
        })
    }

    pub fn subject(&self) -> String {
        match self.decision {
            Decision::RaiseSell => format!("Sell alert - {}", self.symbol),
            _ => format!("Buy alert - {}", self.symbol),
        }
    }

    pub fn body(&self) -> String {
        match self.decision {
            Decision::RaiseSell => format!(
                "{} rose to {:.2}, above your sell target of {:.2}.",
                self.symbol, self.price, self.threshold
            ),
            _ => format!(
                "{} fell to {:.2}, below your buy target of {:.2}.",
                self.symbol, self.price, self.threshold
            ),
        }
    }
}
