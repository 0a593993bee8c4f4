// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-driven training with Adam:
//
//   Idle ─▶ Running{epoch, step} ─▶ (Checkpointed | LrAdjusted)* ─▶ Completed
//                    │                                          └─▶ Aborted
//                    └── one batch per step from a repeating shuffled loader
//
//   steps_per_epoch = max(1, train_len / batch_size)
//
// After every step the callbacks run in order; the learning-rate
// scheduler is the only one allowed to change the learning rate.
// At the end of an epoch the dev loss is computed on
// `model.valid()` (inner backend, no autodiff, no dropout), an
// epoch checkpoint is written and a metrics row is appended.

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{batcher::QaBatcher, dataset::QaDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{context::ExecutionContext, model::FastQa};

// ─── State ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub enum TrainerState {
    Idle,
    Running { epoch: usize, step: usize },
    Checkpointed { epoch: usize, step: usize },
    LrAdjusted { epoch: usize, step: usize, learning_rate: f64 },
    Completed { epoch: usize, step: usize },
    Aborted { epoch: usize, step: usize },
}

impl TrainerState {
    /// (epoch, step) of the last transition; (0, 0) before the first step.
    pub fn position(&self) -> (usize, usize) {
        match *self {
            Self::Idle => (0, 0),
            Self::Running { epoch, step }
            | Self::Checkpointed { epoch, step }
            | Self::LrAdjusted { epoch, step, .. }
            | Self::Completed { epoch, step }
            | Self::Aborted { epoch, step } => (epoch, step),
        }
    }
}

/// What a callback did at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepEvent {
    Checkpointed,
    LrAdjusted(f64),
}

// ─── Callbacks ────────────────────────────────────────────────────────────────
/// Hook run after every optimisation step.
pub trait Callback<B: AutodiffBackend> {
    /// `learning_rate` is the rate the next step will use.
    fn on_step_end(
        &mut self,
        epoch: usize,
        step: usize,
        model: &FastQa<B>,
        learning_rate: &mut f64,
    ) -> Result<Option<StepEvent>>;
}

// ─── Plan ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainPlan {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub learning_rate: f64,
    pub seed:          u64,
    /// Epochs already finished by a resumed run
    pub start_epoch:   usize,
    /// Global steps already taken by a resumed run
    pub start_step:    usize,
}

pub fn steps_per_epoch(train_len: usize, batch_size: usize) -> usize {
    (train_len / batch_size.max(1)).max(1)
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
pub struct Trainer<B: AutodiffBackend, O> {
    context:     ExecutionContext<B>,
    optimizer:   O,
    checkpoints: CheckpointManager,
    metrics:     MetricsLogger,
    callbacks:   Vec<Box<dyn Callback<B>>>,
    state:       TrainerState,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FastQa<B>, B>,
{
    pub fn new(
        context: ExecutionContext<B>,
        optimizer: O,
        checkpoints: CheckpointManager,
        metrics: MetricsLogger,
    ) -> Self {
        Self { context, optimizer, checkpoints, metrics, callbacks: Vec::new(), state: TrainerState::Idle }
    }

    pub fn add_callback(&mut self, callback: impl Callback<B> + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    /// Train until `plan.epochs` epochs are complete and return the model.
    pub fn fit(&mut self, model: FastQa<B>, train: QaDataset, dev: QaDataset, plan: &TrainPlan) -> Result<FastQa<B>> {
        match self.run(model, train, dev, plan) {
            Ok(model) => {
                let (epoch, step) = self.state.position();
                self.state = TrainerState::Completed { epoch, step };
                tracing::info!("Training complete after {} steps", step);
                Ok(model)
            }
            Err(err) => {
                let (epoch, step) = self.state.position();
                self.state = TrainerState::Aborted { epoch, step };
                tracing::error!("Training aborted at epoch {} step {}: {:#}", epoch, step, err);
                Err(err)
            }
        }
    }

    fn run(&mut self, mut model: FastQa<B>, train: QaDataset, dev: QaDataset, plan: &TrainPlan) -> Result<FastQa<B>> {
        if train.sample_count() == 0 {
            bail!("Training set is empty");
        }
        B::seed(plan.seed);

        let steps_per_epoch = steps_per_epoch(train.sample_count(), plan.batch_size);
        tracing::info!(
            "Training on {} samples, {} steps per epoch, dev set of {}",
            train.sample_count(),
            steps_per_epoch,
            dev.sample_count()
        );

        let train_loader = DataLoaderBuilder::new(QaBatcher::<B>::new(self.context.device.clone()))
            .batch_size(plan.batch_size)
            .shuffle(plan.seed)
            .num_workers(1)
            .build(train);
        let dev_loader = DataLoaderBuilder::new(QaBatcher::<B::InnerBackend>::new(self.context.device.clone()))
            .batch_size(plan.batch_size)
            .num_workers(1)
            .build(dev);

        let mut learning_rate = plan.learning_rate;
        let mut best_val_loss = f64::INFINITY;
        let mut step = plan.start_step;
        let mut batches = train_loader.iter();

        for epoch in plan.start_epoch + 1..=plan.epochs {
            let mut loss_sum = 0.0f64;

            for _ in 0..steps_per_epoch {
                let batch = match batches.next() {
                    Some(batch) => batch,
                    None => {
                        batches = train_loader.iter();
                        match batches.next() {
                            Some(batch) => batch,
                            None => bail!("Training loader produced no batches"),
                        }
                    }
                };
                step += 1;
                self.state = TrainerState::Running { epoch, step };

                let (loss, output) = model.forward_loss(
                    batch.question_ids,
                    batch.context_ids,
                    batch.start_positions,
                    batch.end_positions,
                );
                self.context.check_step(&loss, &output)?;
                loss_sum += loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = self.optimizer.step(learning_rate, model, grads);

                for callback in self.callbacks.iter_mut() {
                    match callback.on_step_end(epoch, step, &model, &mut learning_rate)? {
                        Some(StepEvent::Checkpointed) => {
                            self.state = TrainerState::Checkpointed { epoch, step };
                        }
                        Some(StepEvent::LrAdjusted(lr)) => {
                            self.state = TrainerState::LrAdjusted { epoch, step, learning_rate: lr };
                        }
                        None => {}
                    }
                }
            }

            let train_loss = loss_sum / steps_per_epoch as f64;
            let valid = model.valid();
            let mut val_sum = 0.0f64;
            let mut val_batches = 0usize;
            for batch in dev_loader.iter() {
                let (loss, _) = valid.forward_loss(
                    batch.question_ids,
                    batch.context_ids,
                    batch.start_positions,
                    batch.end_positions,
                );
                val_sum += loss.into_scalar().elem::<f64>();
                val_batches += 1;
            }
            let val_loss = if val_batches > 0 { val_sum / val_batches as f64 } else { f64::NAN };

            tracing::info!(
                "Epoch {:>3}/{} | step {} | train_loss={:.4} | val_loss={:.4} | lr={:.2e}",
                epoch,
                plan.epochs,
                step,
                train_loss,
                val_loss,
                learning_rate
            );

            match self.checkpoints.save_epoch(&model, epoch, step, val_loss) {
                Ok(info) => {
                    self.state = TrainerState::Checkpointed { epoch, step };
                    tracing::info!("Checkpoint {} saved", info.name);
                }
                Err(err) => tracing::warn!("Epoch checkpoint failed: {:#}", err),
            }
            let metrics = EpochMetrics { epoch, step, train_loss, val_loss, learning_rate };
            if metrics.is_improvement(best_val_loss) {
                tracing::info!("Best dev loss so far: {:.4}", val_loss);
                best_val_loss = val_loss;
            }
            self.metrics.log(&metrics)?;
        }

        Ok(model)
    }
}
