// ============================================================
// Layer 5 — Training Callbacks
// ============================================================
// Two hooks run after each optimisation step:
//
//   LrScheduler     every N steps: decode the dev set, compute F1,
//                   halve the learning rate after `patience`
//                   evaluations without a new best (floored at min_lr)
//
//   StepCheckpoint  every N steps: write fastqa.{step:06}
//
// Evaluation runs on `model.valid()`, so it sees the weights of
// the step that just finished without dropout.

use anyhow::Result;
use burn::{data::dataloader::DataLoader, module::AutodiffModule, tensor::backend::AutodiffBackend};
use std::{collections::HashMap, sync::Arc};

use crate::data::batcher::EvalBatch;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    inferencer::evaluate_model,
    model::FastQa,
    trainer::{Callback, StepEvent},
};

// ─── Plateau ──────────────────────────────────────────────────────────────────
/// Decision logic of the scheduler, free of any model.
#[derive(Debug, Clone)]
pub struct Plateau {
    patience:  usize,
    min_lr:    f64,
    best:      f64,
    bad_evals: usize,
}

impl Plateau {
    pub fn new(patience: usize, min_lr: f64) -> Self {
        Self { patience: patience.max(1), min_lr, best: f64::NEG_INFINITY, bad_evals: 0 }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Record one F1 score. Returns the reduced rate when `lr` should change.
    pub fn observe(&mut self, f1: f64, lr: f64) -> Option<f64> {
        if f1 > self.best {
            self.best = f1;
            self.bad_evals = 0;
            return None;
        }
        self.bad_evals += 1;
        if self.bad_evals < self.patience {
            return None;
        }
        self.bad_evals = 0;
        let reduced = (lr / 2.0).max(self.min_lr);
        (reduced < lr).then_some(reduced)
    }
}

// ─── LrScheduler ──────────────────────────────────────────────────────────────
pub struct LrScheduler<B: AutodiffBackend> {
    every:          usize,
    max_answer_len: usize,
    loader:         Arc<dyn DataLoader<EvalBatch<B::InnerBackend>>>,
    answers:        HashMap<String, Vec<String>>,
    plateau:        Plateau,
}

impl<B: AutodiffBackend> LrScheduler<B> {
    pub fn new(
        every: usize,
        plateau: Plateau,
        loader: Arc<dyn DataLoader<EvalBatch<B::InnerBackend>>>,
        answers: HashMap<String, Vec<String>>,
        max_answer_len: usize,
    ) -> Self {
        Self { every: every.max(1), max_answer_len, loader, answers, plateau }
    }
}

impl<B: AutodiffBackend> Callback<B> for LrScheduler<B> {
    fn on_step_end(
        &mut self,
        epoch: usize,
        step: usize,
        model: &FastQa<B>,
        learning_rate: &mut f64,
    ) -> Result<Option<StepEvent>> {
        if step % self.every != 0 {
            return Ok(None);
        }
        let score = evaluate_model(&model.valid(), &self.loader, &self.answers, self.max_answer_len)?;
        tracing::info!(
            "Epoch {} step {} | dev EM={:.2} F1={:.2} over {} questions",
            epoch,
            step,
            score.exact_match,
            score.f1,
            score.count
        );

        match self.plateau.observe(score.f1, *learning_rate) {
            Some(reduced) => {
                tracing::info!(
                    "No F1 improvement over {:.2}; learning rate {:.2e} → {:.2e}",
                    self.plateau.best(),
                    *learning_rate,
                    reduced
                );
                *learning_rate = reduced;
                Ok(Some(StepEvent::LrAdjusted(reduced)))
            }
            None => Ok(None),
        }
    }
}

// ─── StepCheckpoint ───────────────────────────────────────────────────────────
pub struct StepCheckpoint {
    manager: CheckpointManager,
    every:   usize,
}

impl StepCheckpoint {
    pub fn new(manager: CheckpointManager, every: usize) -> Self {
        Self { manager, every: every.max(1) }
    }
}

impl<B: AutodiffBackend> Callback<B> for StepCheckpoint {
    fn on_step_end(
        &mut self,
        epoch: usize,
        step: usize,
        model: &FastQa<B>,
        _learning_rate: &mut f64,
    ) -> Result<Option<StepEvent>> {
        if step % self.every != 0 {
            return Ok(None);
        }
        // Mid-epoch, so only `epoch - 1` epochs are complete. A failed
        // write loses at most `every` steps; training goes on.
        match self.manager.save_step(model, epoch - 1, step) {
            Ok(info) => {
                tracing::info!("Checkpoint {} saved", info.name);
                Ok(Some(StepEvent::Checkpointed))
            }
            Err(err) => {
                tracing::warn!("Step checkpoint failed: {:#}", err);
                Ok(None)
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        batcher::QaBatcher,
        dataset::{EvalDataset, EvalSample},
    };
    use crate::ml::model::FastQaConfig;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::DataLoaderBuilder,
    };

    type TB = Autodiff<NdArray>;

    fn scheduler(every: usize, plateau: Plateau) -> LrScheduler<TB> {
        let device = Default::default();
        let sample = EvalSample {
            id:           "q1".into(),
            context:      "a b c".into(),
            offsets:      vec![(0, 1), (2, 3), (4, 5)],
            question_ids: vec![2, 3, 0],
            context_ids:  vec![4, 2, 5, 0, 0],
            question_len: 2,
            context_len:  3,
        };
        let loader = DataLoaderBuilder::new(QaBatcher::<NdArray>::new(device))
            .batch_size(2)
            .num_workers(1)
            .build(EvalDataset::new(vec![sample]));
        // No span of "a b c" matches, so dev F1 stays at 0.
        let answers = HashMap::from([("q1".to_string(), vec!["zzz".to_string()])]);
        LrScheduler::new(every, plateau, loader, answers, 30)
    }

    #[test]
    fn test_plateau_halves_after_patience() {
        let mut plateau = Plateau::new(2, 1e-4);
        assert_eq!(plateau.observe(40.0, 1e-3), None);
        assert_eq!(plateau.observe(39.0, 1e-3), None);
        assert_eq!(plateau.observe(40.0, 1e-3), Some(5e-4));
        // Counter restarts after a reduction.
        assert_eq!(plateau.observe(38.0, 5e-4), None);
    }

    #[test]
    fn test_plateau_improvement_resets_patience() {
        let mut plateau = Plateau::new(2, 1e-4);
        plateau.observe(40.0, 1e-3);
        plateau.observe(30.0, 1e-3);
        assert_eq!(plateau.observe(45.0, 1e-3), None);
        assert_eq!(plateau.observe(44.0, 1e-3), None);
        assert_eq!(plateau.best(), 45.0);
    }

    #[test]
    fn test_plateau_respects_min_lr() {
        let mut plateau = Plateau::new(1, 3e-4);
        plateau.observe(50.0, 4e-4);
        assert_eq!(plateau.observe(10.0, 4e-4), Some(3e-4));
        // Already at the floor: nothing left to reduce.
        assert_eq!(plateau.observe(10.0, 3e-4), None);
    }

    #[test]
    fn test_scheduler_halves_rate_when_dev_f1_stalls() {
        let device = Default::default();
        let model = FastQaConfig::new(10, 4, 3, 3, 5).init::<TB>(&device);
        let mut callback = scheduler(2, Plateau::new(1, 1e-5));
        let mut lr = 1e-3;

        // Off-schedule steps never evaluate.
        assert_eq!(callback.on_step_end(1, 1, &model, &mut lr).unwrap(), None);
        assert_eq!(lr, 1e-3);

        // First evaluation sets the best score.
        assert_eq!(callback.on_step_end(1, 2, &model, &mut lr).unwrap(), None);
        assert_eq!(lr, 1e-3);

        assert_eq!(callback.on_step_end(1, 3, &model, &mut lr).unwrap(), None);
        assert_eq!(lr, 1e-3);

        // Second evaluation ties at 0 and patience is 1.
        assert_eq!(
            callback.on_step_end(1, 4, &model, &mut lr).unwrap(),
            Some(StepEvent::LrAdjusted(5e-4))
        );
        assert_eq!(lr, 5e-4);
    }
}
