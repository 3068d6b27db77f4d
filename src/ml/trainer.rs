// ============================================================
// Layer 5 — Training Loop Controller
// ============================================================
// Epoch loop over a restartable batch source using Adam.
//
// Per epoch i in [start, epochs):
//   1. train pass: forward → MSE → backward → optimizer step
//      (loss is checked for NaN/inf before backward)
//   2. advance the learning-rate schedule one epoch
//   3. if i % eval_every == 0: validate; on strict improvement
//      record the new best and write the best checkpoint
//
// Key Burn 0.20 insight:
//   - Training uses B (Autodiff<...>) for gradients
//   - model.valid() returns the module on B::InnerBackend
//   - Validation batches must also use B::InnerBackend
//   - Gradients come fresh from every backward() and are
//     consumed by optim.step(), so nothing accumulates
//     across batches
//
// A failed checkpoint write does not stop training: it is
// retried by the store, then recorded in the run report.
// On resume the restored best opens `best_history`.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use burn::{
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::data::batcher::BatchSource;
use crate::domain::{
    config::EngineConfig,
    errors::{EngineError, EngineResult},
    events::{EventSink, TrainingEvent},
    state::{StorageFailure, TrainingReport, TrainingState},
    stopping::EarlyStopping,
    traits::LrScheduler,
};
use crate::infra::checkpoint::{CheckpointBundle, CheckpointStore};
use crate::ml::model::Regressor;
use crate::ml::validator::evaluate;

/// The mutable pieces of a run: model, optimizer, schedule and where they live.
pub struct TrainingSession<B: AutodiffBackend, M, O, S> {
    pub model:     M,
    pub optimizer: O,
    pub scheduler: S,
    pub device:    B::Device,
}

/// What `run_training` hands back once the loop ends.
pub struct TrainingOutcome<B: AutodiffBackend, M, O, S> {
    pub session: TrainingSession<B, M, O, S>,
    pub state:   TrainingState,
    pub report:  TrainingReport,
}

pub fn run_training<B, M, O, S, T, V>(
    session:       TrainingSession<B, M, O, S>,
    train_batches: &T,
    val_batches:   &V,
    config:        &EngineConfig,
    sink:          &mut dyn EventSink,
) -> EngineResult<TrainingOutcome<B, M, O, S>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Regressor<B>,
    M::InnerModule: Regressor<B::InnerBackend>,
    O: Optimizer<M, B>,
    S: LrScheduler,
    T: BatchSource<B> + ?Sized,
    V: BatchSource<B::InnerBackend> + ?Sized,
{
    config.validate()?;

    let store = CheckpointStore::new(&config.model_dir).with_retries(config.checkpoint_retries);
    let TrainingSession { mut model, mut optimizer, mut scheduler, device } = session;
    let mut state  = TrainingState::new(config.clone());
    let mut report = TrainingReport::default();
    let mut start_epoch = 0;

    // ── Resume from the best slot ─────────────────────────────────────────────
    if config.resume {
        match store.load_best() {
            Ok(bundle) => {
                let (m, o) = bundle.restore_training::<B, M, O, S>(model, optimizer, &mut scheduler, &device)?;
                model       = m;
                optimizer   = o;
                start_epoch = bundle.meta.epoch + 1;
                report.best_history.push(state.record_best(bundle.meta.epoch, bundle.meta.metric));
                sink.emit(&TrainingEvent::Resumed {
                    epoch:  bundle.meta.epoch,
                    metric: bundle.meta.metric,
                });
            }
            Err(EngineError::CheckpointNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    sink.emit(&TrainingEvent::RunStarted { start_epoch, epochs: config.epochs });

    let contract    = model.contract();
    let loss_fn     = MseLoss::new();
    let mut stopper = config.patience.map(EarlyStopping::new);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in start_epoch..config.epochs {
        state.current_epoch = epoch;
        let lr = scheduler.current_lr();

        // ── Training phase ────────────────────────────────────────────────────
        let mut running_loss = 0.0f64;
        let mut seen         = 0usize;

        for (index, batch) in train_batches.batches().enumerate() {
            contract.check_batch(&batch)?;
            let size = batch.size();

            let prediction = model.forward(batch.input);
            let loss = loss_fn.forward(prediction, batch.target, Reduction::Mean);

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                sink.emit(&TrainingEvent::Diverged { epoch, batch: index, value: loss_val });
                return Err(EngineError::TrainingDiverged { epoch, batch: index, value: loss_val });
            }
            running_loss += loss_val * size as f64;
            seen         += size;

            // Backward pass + Adam update
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(lr, model, grads);
        }

        if seen == 0 {
            return Err(EngineError::EmptyBatches("training"));
        }
        let train_loss = running_loss / seen as f64;
        scheduler.step();

        // ── Validation phase ──────────────────────────────────────────────────
        let mut val_metric = None;
        let mut stop       = false;

        if epoch % config.eval_every == 0 {
            let evaluation = evaluate::<B::InnerBackend, _, _>(&model.valid(), val_batches)?;
            let vmse = evaluation.metric;
            if !vmse.is_finite() {
                sink.emit(&TrainingEvent::Diverged { epoch, batch: evaluation.batches, value: vmse });
                return Err(EngineError::TrainingDiverged {
                    epoch,
                    batch: evaluation.batches,
                    value: vmse,
                });
            }
            sink.emit(&TrainingEvent::Validated { epoch, metric: vmse });
            val_metric = Some(vmse);

            let improved = state.is_improvement(vmse);
            if improved {
                report.best_history.push(state.record_best(epoch, vmse));
                sink.emit(&TrainingEvent::NewBest { epoch, metric: vmse });

                let saved = CheckpointBundle::capture::<B, M, O>(
                    &model, &optimizer, scheduler.state(), epoch, vmse,
                )
                .and_then(|bundle| store.save_best(&bundle));
                if let Err(e) = saved {
                    sink.emit(&TrainingEvent::CheckpointFailed { epoch, error: e.to_string() });
                    report.storage_failures.push(StorageFailure {
                        epoch,
                        metric:  vmse,
                        message: e.to_string(),
                    });
                }
            }

            if let Some(stopper) = stopper.as_mut() {
                if stopper.observe(improved) {
                    stop = true;
                    sink.emit(&TrainingEvent::EarlyStopped {
                        epoch,
                        rounds_waited: stopper.rounds_waited(),
                    });
                }
            }
        }

        sink.emit(&TrainingEvent::EpochCompleted {
            epoch,
            train_loss,
            val_metric,
            learning_rate: lr,
        });
        report.epochs_run       += 1;
        report.final_train_loss  = Some(train_loss);

        if stop {
            report.stopped_early = true;
            break;
        }
    }

    sink.emit(&TrainingEvent::RunFinished {
        epochs_run:  report.epochs_run,
        best_metric: state.best_metric,
    });

    Ok(TrainingOutcome {
        session: TrainingSession { model, optimizer, scheduler, device },
        state,
        report,
    })
}
