use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;

/// Draws a fixed-size random subset of rows from feature vector sets.
///
/// Rows are drawn without replacement, fresh on every call. When `k` is at
/// least the number of available rows the sampler returns every row in its
/// original order instead of failing, so small feature maps simply contribute
/// all of their locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSampler {
    k: usize,
}

impl FeatureSampler {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Row indices for a population of `population` rows.
    pub fn indices(&self, population: usize, rng: &mut impl Rng) -> Vec<usize> {
        draw(population, self.k, rng)
    }

    /// Sample rows from a single `(N, C)` set.
    pub fn sample<B: Backend>(&self, set: Tensor<B, 2>, rng: &mut impl Rng) -> Tensor<B, 2> {
        let [population, _] = set.dims();
        let indices = self.indices(population, rng);
        select_rows(set, &indices)
    }

    /// Sample the same number of rows from two sets.
    ///
    /// The sets may come from images of different sizes. Both results hold
    /// `min(k, N_a, N_b)` rows, but each set's rows are drawn independently
    /// from its own full population.
    pub fn sample_pair<B: Backend>(
        &self,
        a: Tensor<B, 2>,
        b: Tensor<B, 2>,
        rng: &mut impl Rng,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let (n_a, n_b) = (a.dims()[0], b.dims()[0]);
        let count = self.k.min(n_a).min(n_b);
        let indices_a = draw(n_a, count, rng);
        let indices_b = draw(n_b, count, rng);
        (select_rows(a, &indices_a), select_rows(b, &indices_b))
    }
}

/// `count` distinct indices below `population`; all of them, in order, when
/// `count` covers the population.
fn draw(population: usize, count: usize, rng: &mut impl Rng) -> Vec<usize> {
    if count >= population {
        (0..population).collect()
    } else {
        rand::seq::index::sample(rng, population, count).into_vec()
    }
}

fn select_rows<B: Backend>(set: Tensor<B, 2>, indices: &[usize]) -> Tensor<B, 2> {
    let device = set.device();
    let ids: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    let ids = Tensor::<B, 1, Int>::from_data(TensorData::new(ids, [indices.len()]), &device);
    set.select(0, ids)
}
