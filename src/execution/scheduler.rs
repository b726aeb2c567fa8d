//! Scheduling of matrix configurations

/// Strategy for running the configurations of a matrix.
///
/// Steps inside one configuration always run sequentially; the strategy
/// only decides how many configurations run at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Run configurations one after another
    #[default]
    Sequential,

    /// Run all configurations at once
    Parallel,

    /// Limited parallelism (max N concurrent configurations)
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// How many configurations may run at once, given how many there are
    pub fn concurrency(&self, configurations: usize) -> usize {
        let total = configurations.max(1);
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => total,
            SchedulingStrategy::LimitedParallel(max) => (*max).clamp(1, total),
        }
    }
}
