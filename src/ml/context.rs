// ============================================================
// Layer 5 — Execution Context
// ============================================================
// Everything a training run needs to know about *where* and *how
// carefully* it computes: the device tensors live on, and an
// optional numeric inspector. The context is a plain value owned
// by the run; nothing here is global.
//
//   loss          checked every step (a NaN loss is never useful)
//   start / end   checked only with the inspector attached

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::ml::model::FastQaOutput;

/// Fail fast on the first tensor holding NaN or ±inf.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericInspector;

impl NumericInspector {
    pub fn check<B: Backend, const D: usize>(&self, name: &str, tensor: &Tensor<B, D>) -> Result<()> {
        ensure_finite(name, tensor)
    }

    pub fn check_output<B: Backend>(&self, output: &FastQaOutput<B>) -> Result<()> {
        self.check("start", &output.start)?;
        self.check("end", &output.end)
    }
}

/// Error naming `name` if any element of `tensor` is not finite.
///
/// NaN and inf both survive a sum, so one scalar read covers the
/// whole tensor.
pub fn ensure_finite<B: Backend, const D: usize>(name: &str, tensor: &Tensor<B, D>) -> Result<()> {
    let total = tensor.clone().sum().into_scalar().elem::<f64>();
    if !total.is_finite() {
        bail!("Non-finite values in tensor '{name}'");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ExecutionContext<B: Backend> {
    pub device:    B::Device,
    pub inspector: Option<NumericInspector>,
}

impl<B: Backend> ExecutionContext<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device, inspector: None }
    }

    pub fn with_inspector(mut self, debug: bool) -> Self {
        self.inspector = debug.then_some(NumericInspector);
        self
    }

    /// Per-step numeric check on the loss and, when debugging, the outputs.
    pub fn check_step(&self, loss: &Tensor<B, 1>, output: &FastQaOutput<B>) -> Result<()> {
        ensure_finite("loss", loss)?;
        if let Some(inspector) = &self.inspector {
            inspector.check_output(output)?;
        }
        Ok(())
    }
}
