//! 规则采样
//!
//! 采样率为 0 或 1 时直接返回，不消耗随机数；其他情况从注入的随机源取 [0, 1) 的均匀值比较。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 随机源
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource {
    /// 返回 [0, 1) 区间的均匀分布值
    fn next_unit(&mut self) -> f64;
}

/// 基于 rand 的随机源
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSource<StdRng> {
    /// 固定种子，评估结果可复现
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// 从系统熵初始化
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// 采样门
pub struct Sampler<S> {
    source: S,
}

impl<S: RandomSource> Sampler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// 是否评估该规则
    #[inline]
    pub fn should_evaluate(&mut self, sample_rate: f64) -> bool {
        if sample_rate <= 0.0 {
            return false;
        }
        if sample_rate >= 1.0 {
            return true;
        }
        self.source.next_unit() < sample_rate
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl Sampler<RngSource<StdRng>> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(RngSource::seeded(seed))
    }
}
