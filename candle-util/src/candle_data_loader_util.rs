use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

///
/// A helper `struct` for drawing sample indexes without replacement
/// within an epoch; the order is reshuffled every time an epoch is
/// exhausted.
///
pub struct EpochCursor {
    samples: Vec<usize>,
    position: usize,
    epoch: usize,
    rng: StdRng,
}

impl EpochCursor {
    pub fn new(size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut samples: Vec<usize> = (0..size).collect();
        samples.shuffle(&mut rng);
        Self {
            samples,
            position: 0,
            epoch: 0,
            rng,
        }
    }

    /// Take the next `batch_size` indexes, wrapping into a freshly
    /// shuffled epoch when needed
    pub fn next_indexes(&mut self, batch_size: usize) -> Vec<usize> {
        let mut ret = Vec::with_capacity(batch_size);
        if self.samples.is_empty() {
            return ret;
        }
        while ret.len() < batch_size {
            if self.position == self.samples.len() {
                self.samples.shuffle(&mut self.rng);
                self.position = 0;
            }
            let take = (batch_size - ret.len()).min(self.samples.len() - self.position);
            ret.extend_from_slice(&self.samples[self.position..(self.position + take)]);
            self.position += take;
            if self.position == self.samples.len() {
                self.epoch += 1;
            }
        }
        ret
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// number of completed passes over the data
    pub fn epoch(&self) -> usize {
        self.epoch
    }
}
