use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use ingest_api::{IngestError, Item, Record, RecordFactory, to_item};

use crate::sample::{WeightedChoice, uniform_rounded};

/// Customer whose share of traffic `hot_weight` controls.
pub const HOT_CID: i64 = 88888;

const FIRST_TID: i64 = 1_000_001;

const CUSTOMERS: [(i64, &str); 10] = [
    (11111, "AAAAA-BBBBB"),
    (22222, "CCCCC-DDDDD"),
    (33333, "EEEEE-FFFFF"),
    (44444, "GGGGG-HHHHH"),
    (55555, "IIIII-JJJJJ"),
    (66666, "KKKKK-LLLLL"),
    (77777, "MMMMM-NNNNN"),
    (HOT_CID, "OOOOO-PPPPP"),
    (99999, "QQQQQ-RRRRR"),
    (0, "SSSSS-TTTTT"),
];

/// Trade order row. `cid` is the GSI partition key the hot-key scenarios
/// pile traffic onto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub tid: i64,
    pub cid: i64,
    pub b: i64,
    pub iid: &'static str,
    pub mid: i64,
    pub px: f64,
    pub s: &'static str,
    pub sz: f64,
    pub ts: i64,
}

impl TradeRecord {
    /// Primary key: one row per order.
    pub const KEY_ATTRIBUTES: &'static [&'static str] = &["tid"];
    /// Hot-key attribute (GSI partition key).
    pub const PARTITION_ATTRIBUTE: &'static str = "cid";
}

impl Record for TradeRecord {
    fn partition_key(&self) -> String {
        self.cid.to_string()
    }

    fn ts_ms(&self) -> i64 {
        self.ts
    }

    fn to_item(&self) -> Result<Item, IngestError> {
        to_item(self)
    }
}

pub struct TradeFactory {
    rng: StdRng,
    next_tid: i64,
    customers: WeightedChoice<(i64, &'static str)>,
}

impl TradeFactory {
    /// `hot_weight` is the relative weight of [`HOT_CID`]; every other
    /// customer weighs 1.0. `1.0` gives a uniform spread, `6.0` sends
    /// 40% of orders to the hot customer.
    pub fn new(seed: u64, hot_weight: f64) -> Result<Self, IngestError> {
        if !hot_weight.is_finite() || hot_weight < 0.0 {
            return Err(IngestError::config(format!("hot_weight must be a finite value >= 0, got {hot_weight}")));
        }
        let table = CUSTOMERS
            .iter()
            .map(|&(cid, iid)| ((cid, iid), if cid == HOT_CID { hot_weight } else { 1.0 }))
            .collect();
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            next_tid: FIRST_TID,
            customers: WeightedChoice::new(table)?,
        })
    }
}

impl RecordFactory for TradeFactory {
    type Record = TradeRecord;

    fn name(&self) -> &str {
        "trade"
    }

    fn next_record(&mut self, ts_ms: i64) -> TradeRecord {
        let (cid, iid) = *self.customers.sample(&mut self.rng);
        let tid = self.next_tid;
        self.next_tid += 1;

        TradeRecord {
            tid,
            cid,
            b: 1,
            iid,
            mid: cid % 10_000,
            px: uniform_rounded(&mut self.rng, 0.0, 1.0),
            s: if self.rng.gen_bool(0.5) { "buy" } else { "sell" },
            sz: uniform_rounded(&mut self.rng, 0.000001, 99_999.99999),
            ts: ts_ms,
        }
    }
}
