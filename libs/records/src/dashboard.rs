use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use ingest_api::{IngestError, Item, Record, RecordFactory, to_item};

use crate::sample::{maybe, uniform_rounded};

/// Presence probability of each optional dashboard attribute.
const OPTIONAL_P: f64 = 0.5;

/// Candle-style dashboard row. Optional attributes are omitted from the
/// item entirely when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRecord {
    pub kkey: String,
    pub ts: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<f64>,
}

impl DashboardRecord {
    pub const KEY_ATTRIBUTES: &'static [&'static str] = &["kkey", "ts"];
    pub const PARTITION_ATTRIBUTE: &'static str = "kkey";
}

impl Record for DashboardRecord {
    fn partition_key(&self) -> String {
        self.kkey.clone()
    }

    fn ts_ms(&self) -> i64 {
        self.ts
    }

    fn to_item(&self) -> Result<Item, IngestError> {
        to_item(self)
    }
}

pub struct DashboardFactory {
    rng: StdRng,
}

impl DashboardFactory {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl RecordFactory for DashboardFactory {
    type Record = DashboardRecord;

    fn name(&self) -> &str {
        "dashboard"
    }

    fn next_record(&mut self, ts_ms: i64) -> DashboardRecord {
        let rng = &mut self.rng;
        let kkey = format!(
            "{}_{}_{}_{}",
            rng.gen_range(0..10_000),
            rng.gen_range(0..100),
            rng.gen_range(0..9),
            rng.gen_range(0..1_000_000)
        );

        DashboardRecord {
            kkey,
            ts: ts_ms,
            o: uniform_rounded(rng, 60_000.0, 70_000.0),
            h: uniform_rounded(rng, 60_000.0, 70_000.0),
            l: uniform_rounded(rng, 60_000.0, 70_000.0),
            c: uniform_rounded(rng, 60_000.0, 70_000.0),
            ct: maybe(rng, OPTIONAL_P, |r| r.gen_range(0..500_000)),
            q: maybe(rng, OPTIONAL_P, |r| uniform_rounded(r, 0.0, 10.0)),
            v: maybe(rng, OPTIONAL_P, |r| uniform_rounded(r, 1_000_000.0, 5_000_000.0)),
            n: maybe(rng, OPTIONAL_P, |r| uniform_rounded(r, 0.0, 100.0)),
        }
    }
}
