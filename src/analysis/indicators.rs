use ta::{indicators::SimpleMovingAverage, Next};

/// Mean of the most recent `period` prices, oldest first.
///
/// Returns `0.0` while there is not enough data (or `period` is zero); callers
/// treat that as "not yet meaningful".
pub fn simple_moving_average<I>(prices: I, period: usize) -> f64
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: ExactSizeIterator,
{
    if period == 0 {
        return 0.0;
    }

    let prices = prices.into_iter();
    let available = prices.len();
    if available < period {
        return 0.0;
    }

    let mut sma = match SimpleMovingAverage::new(period) {
        Ok(sma) => sma,
        Err(_) => return 0.0,
    };
    prices
        .skip(available - period)
        .fold(0.0, |_, price| sma.next(price))
}
