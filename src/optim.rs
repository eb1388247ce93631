//! # Optimizers
//!
//! [`ModelOptimizer`] splits an update into the three calls the training loop
//! makes per batch: clear gradients, backpropagate, apply.
//!
//! candle computes gradients into a standalone `GradStore` rather than on the
//! parameters, so [`CandleOptimizer`] holds that store between `backward` and
//! `step`.

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD};

use crate::error::TrainError;
use crate::TrainResult;

/// Gradient-based parameter updates
pub trait ModelOptimizer {
    /// Drop any gradients left from a previous batch
    fn zero_grad(&mut self) -> TrainResult<()>;

    /// Compute gradients of `loss` with respect to the parameters
    fn backward(&mut self, loss: &Tensor) -> TrainResult<()>;

    /// Apply the pending gradients
    fn step(&mut self) -> TrainResult<()>;
}

/// Adapter from any `candle_nn::Optimizer`
pub struct CandleOptimizer<O: Optimizer> {
    inner: O,
    grads: Option<GradStore>,
}

impl<O: Optimizer> CandleOptimizer<O> {
    pub fn new(inner: O) -> Self {
        Self { inner, grads: None }
    }

    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    pub fn has_gradients(&self) -> bool {
        self.grads.is_some()
    }
}

impl CandleOptimizer<AdamW> {
    /// AdamW with default betas and no weight decay
    pub fn adamw(vars: Vec<Var>, learning_rate: f64) -> TrainResult<Self> {
        let params = ParamsAdamW {
            lr: learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        Ok(Self::new(AdamW::new(vars, params)?))
    }
}

impl CandleOptimizer<SGD> {
    pub fn sgd(vars: Vec<Var>, learning_rate: f64) -> TrainResult<Self> {
        Ok(Self::new(SGD::new(vars, learning_rate)?))
    }
}

impl<O: Optimizer> ModelOptimizer for CandleOptimizer<O> {
    fn zero_grad(&mut self) -> TrainResult<()> {
        self.grads = None;
        Ok(())
    }

    fn backward(&mut self, loss: &Tensor) -> TrainResult<()> {
        self.grads = Some(loss.backward()?);
        Ok(())
    }

    fn step(&mut self) -> TrainResult<()> {
        let grads = self.grads.take().ok_or(TrainError::MissingGradients)?;
        self.inner.step(&grads)?;
        Ok(())
    }
}
