use std::cmp::Ordering;
use std::fmt;

/// Derived daily return of a quote.
///
/// `NoData` is the sentinel used when the return is undefined (zero or
/// missing open price) or was never obtained because the batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DayReturn {
    Value(f64),
    #[default]
    NoData,
}

impl DayReturn {
    pub fn value(self) -> Option<f64> {
        match self {
            DayReturn::Value(value) => Some(value),
            DayReturn::NoData => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, DayReturn::NoData)
    }

    /// Descending ranking order: larger returns first, `NoData` always last.
    pub fn rank_cmp(self, other: Self) -> Ordering {
        match (self, other) {
            (DayReturn::Value(a), DayReturn::Value(b)) => b.total_cmp(&a),
            (DayReturn::Value(_), DayReturn::NoData) => Ordering::Less,
            (DayReturn::NoData, DayReturn::Value(_)) => Ordering::Greater,
            (DayReturn::NoData, DayReturn::NoData) => Ordering::Equal,
        }
    }
}

impl fmt::Display for DayReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayReturn::Value(value) => write!(f, "{}", value),
            DayReturn::NoData => f.write_str("N/A"),
        }
    }
}

/// One security in the universe: identity, price snapshot and derived return.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub id: usize,
    pub symbol: String,
    pub open_price: f64,
    pub current_price: f64,
    pub day_return: DayReturn,
}

impl Quote {
    pub fn new(id: usize, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            open_price: 0.0,
            current_price: 0.0,
            day_return: DayReturn::NoData,
        }
    }

    pub fn set_prices(&mut self, open_price: f64, current_price: f64) {
        self.open_price = open_price;
        self.current_price = current_price;
    }

    pub fn compute_day_return(&mut self) -> DayReturn {
        self.day_return = day_return(self.open_price, self.current_price);
        self.day_return
    }
}

/// `(current - open) / open`, or the sentinel when either price is unset or the
/// quotient is not a finite number.
pub fn day_return(open_price: f64, current_price: f64) -> DayReturn {
    if !is_set(open_price) || !is_set(current_price) {
        return DayReturn::NoData;
    }

    let value = (current_price - open_price) / open_price;
    if value.is_finite() {
        DayReturn::Value(value)
    } else {
        DayReturn::NoData
    }
}

/// A zero price means the source never reported it.
fn is_set(price: f64) -> bool {
    price != 0.0 && price.is_finite()
}

/// Rank quotes by descending return. Ties keep universe order.
pub fn rank_quotes<'a, I>(quotes: I) -> Vec<&'a Quote>
where
    I: IntoIterator<Item = &'a Quote>,
{
    let mut ranked: Vec<&Quote> = quotes.into_iter().collect();
    ranked.sort_by(|a, b| {
        a.day_return
            .rank_cmp(b.day_return)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}
