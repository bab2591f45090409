use std::collections::VecDeque;

/// Bounded FIFO of observed prices, oldest first.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, price: f64) {
        self.prices.push_back(price);
        if self.prices.len() > self.capacity {
            self.prices.pop_front();
        }
    }

    pub fn latest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.prices.iter().copied()
    }
}
