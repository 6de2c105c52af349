use homecage_core::ItiKind;
use rand::Rng;

/// Inclusive millisecond range; `max_ms` is never below `min_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItiRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ItiRange {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    pub fn contains(&self, ms: u64) -> bool {
        (self.min_ms..=self.max_ms).contains(&ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledIti {
    pub ms: u64,
    pub kind: ItiKind,
}

impl SampledIti {
    pub fn duration_ns(&self) -> u64 {
        self.ms.saturating_mul(1_000_000)
    }
}

/// Draws an inter-trial interval from the range matching the trial outcome.
#[derive(Debug, Clone)]
pub struct ItiSampler {
    correct: ItiRange,
    error: ItiRange,
}

impl ItiSampler {
    pub fn new(correct: ItiRange, error: ItiRange) -> Self {
        Self { correct, error }
    }

    pub fn range(&self, kind: ItiKind) -> ItiRange {
        match kind {
            ItiKind::Correct => self.correct,
            ItiKind::Error => self.error,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, kind: ItiKind, rng: &mut R) -> SampledIti {
        let range = self.range(kind);
        SampledIti {
            ms: rng.random_range(range.min_ms..=range.max_ms),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn samples_stay_in_outcome_range() {
        let sampler = ItiSampler::new(ItiRange::new(800, 1200), ItiRange::new(2000, 2500));
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let ok = sampler.sample(ItiKind::Correct, &mut rng);
            assert!((800..=1200).contains(&ok.ms));
            assert_eq!(ok.kind, ItiKind::Correct);
            let err = sampler.sample(ItiKind::Error, &mut rng);
            assert!((2000..=2500).contains(&err.ms));
        }
    }

    #[test]
    fn degenerate_range_is_constant() {
        let sampler = ItiSampler::new(ItiRange::new(1000, 10), ItiRange::new(0, 0));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.sample(ItiKind::Correct, &mut rng).ms, 1000);
        assert_eq!(sampler.sample(ItiKind::Error, &mut rng).duration_ns(), 0);
    }
}
