use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{AppError, AppResult};

/// Randomizes track order for blind tests.
pub struct Shuffler {
    // Use StdRng instead of ThreadRng so the shuffler can be seeded in tests
    rng: StdRng,
}

impl Shuffler {
    pub fn from_entropy() -> AppResult<Self> {
        let mut seed = [0u8; 32];
        getrandom::fill(&mut seed)
            .map_err(|err| AppError::Resource(format!("cannot seed shuffle: {}", err)))?;
        Ok(Self {
            rng: StdRng::from_seed(seed),
        })
    }

    #[cfg(test)]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fisher-Yates over `items`, or over `items[1..]` when `keep_reference` is set.
    pub fn shuffle<T>(&mut self, items: &mut [T], keep_reference: bool) {
        let count = items.len();
        let first = usize::from(keep_reference);
        for i in first..count.saturating_sub(1) {
            let j = self.rng.random_range(i..count);
            items.swap(i, j);
        }
    }
}
