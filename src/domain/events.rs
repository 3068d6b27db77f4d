// ============================================================
// Layer 3 — Training Events and the Observability Sink
// ============================================================
// The engine reports progress by emitting TrainingEvents into
// an EventSink handed to it by the caller. There is no global
// logger state in the engine itself:
//
//   TracingSink           → structured `tracing` records
//   MetricsLogger (infra) → one CSV row per epoch
//   Vec<TrainingEvent>    → in-memory capture for tests
//   (A, B)                → fan-out to two sinks

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    RunStarted {
        start_epoch: usize,
        epochs:      usize,
    },
    Resumed {
        epoch:  usize,
        metric: f64,
    },
    Validated {
        epoch:  usize,
        metric: f64,
    },
    NewBest {
        epoch:  usize,
        metric: f64,
    },
    CheckpointFailed {
        epoch: usize,
        error: String,
    },
    EpochCompleted {
        epoch:         usize,
        train_loss:    f64,
        val_metric:    Option<f64>,
        learning_rate: f64,
    },
    EarlyStopped {
        epoch:          usize,
        rounds_waited:  usize,
    },
    Diverged {
        epoch: usize,
        batch: usize,
        value: f64,
    },
    RunFinished {
        epochs_run:  usize,
        best_metric: f64,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: &TrainingEvent);
}

/// Forwards events to whatever `tracing` subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &TrainingEvent) {
        match *event {
            TrainingEvent::RunStarted { start_epoch, epochs } => {
                tracing::info!(start_epoch, epochs, "training started");
            }
            TrainingEvent::Resumed { epoch, metric } => {
                tracing::info!(epoch, metric, "resumed from best checkpoint");
            }
            TrainingEvent::Validated { epoch, metric } => {
                tracing::info!(epoch, metric, "Current vmse: {:.6}", metric);
            }
            TrainingEvent::NewBest { epoch, metric } => {
                tracing::info!(epoch, metric, "new best metric");
            }
            TrainingEvent::CheckpointFailed { epoch, ref error } => {
                tracing::warn!(epoch, error = %error, "best checkpoint could not be written");
            }
            TrainingEvent::EpochCompleted { epoch, train_loss, val_metric, learning_rate } => {
                tracing::debug!(epoch, train_loss, ?val_metric, learning_rate, "epoch completed");
            }
            TrainingEvent::EarlyStopped { epoch, rounds_waited } => {
                tracing::info!(epoch, rounds_waited, "early stopping");
            }
            TrainingEvent::Diverged { epoch, batch, value } => {
                tracing::error!(epoch, batch, value, "training diverged");
            }
            TrainingEvent::RunFinished { epochs_run, best_metric } => {
                tracing::info!(epochs_run, best_metric, "training complete");
            }
        }
    }
}

impl EventSink for Vec<TrainingEvent> {
    fn emit(&mut self, event: &TrainingEvent) {
        self.push(event.clone());
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &TrainingEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
