use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use ingest_api::{IngestError, round_to};

/// Decimals kept for generated fractional fields.
pub const DECIMALS: u32 = 5;

/// Weighted choice over a small fixed table. Skewed weights are how
/// generators synthesize hot partitions.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    choices: Vec<T>,
    index: WeightedIndex<f64>,
}

impl<T> WeightedChoice<T> {
    pub fn new(table: Vec<(T, f64)>) -> Result<Self, IngestError> {
        let (choices, weights): (Vec<T>, Vec<f64>) = table.into_iter().unzip();
        let index = WeightedIndex::new(&weights)
            .map_err(|e| IngestError::config(format!("bad weight table {weights:?}: {e}")))?;
        Ok(Self { choices, index })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.choices[self.index.sample(rng)]
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// Uniform value in `[lo, hi]`, rounded to [`DECIMALS`].
pub fn uniform_rounded<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    round_to(rng.gen_range(lo..=hi), DECIMALS)
}

/// Independent Bernoulli draw deciding whether an optional field is present.
pub fn maybe<R: Rng + ?Sized, T>(rng: &mut R, p: f64, value: impl FnOnce(&mut R) -> T) -> Option<T> {
    if rng.gen_bool(p) { Some(value(rng)) } else { None }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn zero_weight_is_never_chosen() {
        let table = WeightedChoice::new(vec![("cold", 0.0), ("hot", 1.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(*table.sample(&mut rng), "hot");
        }
    }

    #[test]
    fn heavier_entry_dominates() {
        let table = WeightedChoice::new(vec![(1, 1.0), (2, 9.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let hot = (0..10_000).filter(|_| *table.sample(&mut rng) == 2).count();
        assert!((8_500..9_500).contains(&hot), "hot={hot}");
    }

    #[test]
    fn all_zero_weights_rejected() {
        let err = WeightedChoice::new(vec![("a", 0.0), ("b", 0.0)]).unwrap_err();
        assert_eq!(err.kind(), ingest_api::ErrorKind::Config);
    }

    #[test]
    fn uniform_stays_in_range_and_rounded() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let v = uniform_rounded(&mut rng, 60_000.0, 70_000.0);
            assert!((60_000.0..=70_000.0).contains(&v));
            assert_eq!(round_to(v, DECIMALS), v);
        }
    }

    #[test]
    fn maybe_is_roughly_half() {
        let mut rng = StdRng::seed_from_u64(11);
        let present = (0..10_000).filter(|_| maybe(&mut rng, 0.5, |_| ()).is_some()).count();
        assert!((4_500..5_500).contains(&present), "present={present}");
    }
}
