use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use ingest_api::{IngestError, Item, Record, RecordFactory, to_item};

const USER_ID_BASE: i64 = 1_000_000_000_000;
const USER_POOL_SIZE: i64 = 10_000;
const MAX_ACTION: u32 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserBehaviorRecord {
    pub user_id: i64,
    pub client_ts: i64,
    pub action: String,
    pub ts_rank: i64,
}

impl UserBehaviorRecord {
    /// Partition by user, sort by client timestamp.
    pub const KEY_ATTRIBUTES: &'static [&'static str] = &["user_id", "client_ts"];
    pub const PARTITION_ATTRIBUTE: &'static str = "user_id";
}

impl Record for UserBehaviorRecord {
    fn partition_key(&self) -> String {
        self.user_id.to_string()
    }

    fn ts_ms(&self) -> i64 {
        self.client_ts
    }

    fn to_item(&self) -> Result<Item, IngestError> {
        to_item(self)
    }
}

/// Draws user ids without replacement from a shuffled pool, so every
/// 10 000 consecutive records touch 10 000 distinct users.
pub struct UserBehaviorFactory {
    rng: StdRng,
    pool: Vec<i64>,
}

impl UserBehaviorFactory {
    pub fn new(seed: u64) -> Self {
        let mut factory = Self { rng: StdRng::seed_from_u64(seed), pool: Vec::new() };
        factory.refill();
        factory
    }

    fn refill(&mut self) {
        self.pool = (0..USER_POOL_SIZE).map(|i| USER_ID_BASE + i).collect();
        self.pool.shuffle(&mut self.rng);
    }

    fn next_user_id(&mut self) -> i64 {
        if self.pool.is_empty() {
            self.refill();
        }
        // refill() never leaves the pool empty
        self.pool.pop().unwrap_or(USER_ID_BASE)
    }
}

impl RecordFactory for UserBehaviorFactory {
    type Record = UserBehaviorRecord;

    fn name(&self) -> &str {
        "user-behavior"
    }

    fn next_record(&mut self, ts_ms: i64) -> UserBehaviorRecord {
        let user_id = self.next_user_id();
        UserBehaviorRecord {
            user_id,
            client_ts: ts_ms,
            action: format!("action-{:04}", self.rng.gen_range(0..=MAX_ACTION)),
            ts_rank: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn pool_is_drawn_without_replacement() {
        let mut f = UserBehaviorFactory::new(3);
        let ids: HashSet<i64> = (0..USER_POOL_SIZE).map(|_| f.next_record(0).user_id).collect();
        assert_eq!(ids.len(), USER_POOL_SIZE as usize);
        assert!(ids.iter().all(|id| (USER_ID_BASE..USER_ID_BASE + USER_POOL_SIZE).contains(id)));
    }

    #[test]
    fn pool_refills_when_exhausted() {
        let mut f = UserBehaviorFactory::new(3);
        for _ in 0..USER_POOL_SIZE {
            f.next_record(0);
        }
        let id = f.next_record(0).user_id;
        assert!((USER_ID_BASE..USER_ID_BASE + USER_POOL_SIZE).contains(&id));
    }

    #[test]
    fn action_format() {
        let mut f = UserBehaviorFactory::new(8);
        for _ in 0..500 {
            let r = f.next_record(5);
            assert_eq!(r.action.len(), "action-0000".len());
            let n: u32 = r.action["action-".len()..].parse().unwrap();
            assert!(n <= MAX_ACTION);
            assert_eq!(r.client_ts, 5);
            assert_eq!(r.ts_rank, 0);
        }
    }

    #[test]
    fn deterministic_for_seed() {
        let mut a = UserBehaviorFactory::new(77);
        let mut b = UserBehaviorFactory::new(77);
        for ts in 0..100 {
            assert_eq!(a.next_record(ts), b.next_record(ts));
        }
    }
}
