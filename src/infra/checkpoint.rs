// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Persists the best model seen so far in a single slot and
// restores it for resume or inference.
//
// What a best checkpoint contains:
//   1. Model record     — every learned parameter
//   2. Optimizer record — Adam moment estimates
//   3. Scheduler state  — base lr, decay step/gamma, epochs elapsed
//   4. Epoch + metric   — where and how good the best model was
//   5. Parameter shapes — checked before any weights are swapped
//
// File layout (best.ckpt):
//
//   ┌──────────┬────────────┬─────────────┬───────────┬─────────────┐
//   │ CVRNCKPT │ u32 LE len │ JSON header │ model rec │ optim rec   │
//   └──────────┴────────────┴─────────────┴───────────┴─────────────┘
//
// The header carries the record lengths and a SHA-256 digest of
// the meta block plus both records, so a truncated or altered
// file is reported as CheckpointCorrupt instead of loading
// garbage weights or a wrong epoch/metric.
//
// Records are encoded with NamedMpkBytesRecorder at full
// precision: a resumed run must see bit-identical weights.
//
// Atomicity: the file is written to a temp name in the same
// directory, fsynced, then renamed over best.ckpt. A reader
// sees either the previous best or the new one, never a mix.
//
// Other artifacts kept next to it (train_config.json,
// scaler.json) go through the same atomic write.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::traits::{LrScheduler, SchedulerState};
use crate::ml::model::{check_parameter_shapes, parameter_shapes, ParamShape};

pub const BEST_FILE: &str = "best.ckpt";

const MAGIC: &[u8; 8] = b"CVRNCKPT";
const FORMAT_VERSION: u32 = 2;

type BundleRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Everything stored besides the raw records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch:        usize,
    pub metric:       f64,
    pub scheduler:    SchedulerState,
    pub param_shapes: Vec<ParamShape>,
}

/// One complete best checkpoint, held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointBundle {
    pub meta:            CheckpointMeta,
    pub model_state:     Vec<u8>,
    pub optimizer_state: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct Header {
    format_version: u32,
    meta:           CheckpointMeta,
    model_len:      u64,
    optimizer_len:  u64,
    sha256:         String,
}

impl CheckpointBundle {
    /// Snapshot model, optimizer and scheduler after `epoch`.
    pub fn capture<B, M, O>(
        model:     &M,
        optimizer: &O,
        scheduler: SchedulerState,
        epoch:     usize,
        metric:    f64,
    ) -> EngineResult<Self>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let recorder = BundleRecorder::default();
        let param_shapes = parameter_shapes::<B, M>(model);
        let model_state = <BundleRecorder as Recorder<B>>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| EngineError::Record(format!("{e:?}")))?;
        let optimizer_state = <BundleRecorder as Recorder<B>>::record(&recorder, optimizer.to_record(), ())
            .map_err(|e| EngineError::Record(format!("{e:?}")))?;

        Ok(Self {
            meta: CheckpointMeta { epoch, metric, scheduler, param_shapes },
            model_state,
            optimizer_state,
        })
    }

    /// Load only the model weights, e.g. for inference.
    pub fn restore_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> EngineResult<M> {
        check_parameter_shapes(&parameter_shapes::<B, M>(&model), &self.meta.param_shapes)?;
        let recorder = BundleRecorder::default();
        let record: M::Record = <BundleRecorder as Recorder<B>>::load(&recorder, self.model_state.clone(), device)
            .map_err(|e| EngineError::Record(format!("{e:?}")))?;
        Ok(model.load_record(record))
    }

    /// Restore model, optimizer and scheduler together.
    ///
    /// Shapes are validated first; on any error nothing is modified.
    pub fn restore_training<B, M, O, S>(
        &self,
        model:     M,
        optimizer: O,
        scheduler: &mut S,
        device:    &B::Device,
    ) -> EngineResult<(M, O)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
        S: LrScheduler + ?Sized,
    {
        check_parameter_shapes(&parameter_shapes::<B, M>(&model), &self.meta.param_shapes)?;
        let recorder = BundleRecorder::default();
        let model_record: M::Record = <BundleRecorder as Recorder<B>>::load(&recorder, self.model_state.clone(), device)
            .map_err(|e| EngineError::Record(format!("{e:?}")))?;
        let optim_record: O::Record = <BundleRecorder as Recorder<B>>::load(&recorder, self.optimizer_state.clone(), device)
            .map_err(|e| EngineError::Record(format!("{e:?}")))?;

        scheduler.load_state(&self.meta.scheduler);
        Ok((model.load_record(model_record), optimizer.load_record(optim_record)))
    }

    fn encode(&self) -> EngineResult<Vec<u8>> {
        let header = Header {
            format_version: FORMAT_VERSION,
            meta:           self.meta.clone(),
            model_len:      self.model_state.len() as u64,
            optimizer_len:  self.optimizer_state.len() as u64,
            sha256:         digest(&self.meta, &self.model_state, &self.optimizer_state)?,
        };
        let header_json = serde_json::to_vec(&header)
            .map_err(|e| EngineError::Record(e.to_string()))?;

        let mut out = Vec::with_capacity(
            12 + header_json.len() + self.model_state.len() + self.optimizer_state.len(),
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_json);
        out.extend_from_slice(&self.model_state);
        out.extend_from_slice(&self.optimizer_state);
        Ok(out)
    }

    fn decode(bytes: &[u8], path: &Path) -> EngineResult<Self> {
        let corrupt = |reason: String| EngineError::CheckpointCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        if bytes.len() < 12 || &bytes[..8] != MAGIC {
            return Err(corrupt("missing magic header".into()));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[8..12]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;

        let body = &bytes[12..];
        if body.len() < header_len {
            return Err(corrupt(format!("header truncated ({} of {header_len} bytes)", body.len())));
        }
        let header: Header = serde_json::from_slice(&body[..header_len])
            .map_err(|e| corrupt(format!("unreadable header: {e}")))?;
        if header.format_version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", header.format_version)));
        }

        let payload  = &body[header_len..];
        let expected = header
            .model_len
            .checked_add(header.optimizer_len)
            .ok_or_else(|| corrupt("declared record lengths overflow".into()))?;
        if payload.len() as u64 != expected {
            return Err(corrupt(format!(
                "payload is {} bytes, header declares {expected}",
                payload.len()
            )));
        }
        // model_len <= expected == payload.len(), so the split is in bounds
        let (model_state, optimizer_state) = payload.split_at(header.model_len as usize);
        if digest(&header.meta, model_state, optimizer_state)? != header.sha256 {
            return Err(corrupt("digest mismatch".into()));
        }

        Ok(Self {
            meta:            header.meta,
            model_state:     model_state.to_vec(),
            optimizer_state: optimizer_state.to_vec(),
        })
    }
}

/// SHA-256 over the serialized meta followed by both records.
fn digest(meta: &CheckpointMeta, model_state: &[u8], optimizer_state: &[u8]) -> EngineResult<String> {
    let meta_json = serde_json::to_vec(meta).map_err(|e| EngineError::Record(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update((meta_json.len() as u64).to_le_bytes());
    hasher.update(&meta_json);
    hasher.update(model_state);
    hasher.update(optimizer_state);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Owns one model directory and its best slot.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir:     PathBuf,
    retries: usize,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), retries: 0 }
    }

    /// Extra attempts after a failed best-slot write.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn best_path(&self) -> PathBuf {
        self.dir.join(BEST_FILE)
    }

    /// Atomically replace the best slot with `bundle`.
    pub fn save_best(&self, bundle: &CheckpointBundle) -> EngineResult<()> {
        let bytes    = bundle.encode()?;
        let path     = self.best_path();
        let attempts = self.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.write_atomic(BEST_FILE, &bytes) {
                Ok(()) => {
                    tracing::debug!(
                        "Saved best checkpoint: epoch {}, metric {:.6}",
                        bundle.meta.epoch, bundle.meta.metric,
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Checkpoint write attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(EngineError::StorageWrite {
            path,
            attempts,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no write attempted")),
        })
    }

    pub fn load_best(&self) -> EngineResult<CheckpointBundle> {
        let path = self.best_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::CheckpointNotFound { dir: self.dir.clone() });
            }
            Err(e) => return Err(e.into()),
        };
        CheckpointBundle::decode(&bytes, &path)
    }

    /// Write a pretty-printed JSON artifact next to the checkpoint.
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_atomic(name, json.as_bytes())
            .with_context(|| format!("Cannot write '{}'", self.dir.join(name).display()))?;
        tracing::debug!("Saved '{}'", self.dir.join(name).display());
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.dir.join(name);
        let tmp_path   = self.dir.join(format!(".{name}.{}.tmp", std::process::id()));

        if let Err(e) = write_and_rename(&tmp_path, &final_path, bytes) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // persist the rename itself; not every platform can open a directory
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

fn write_and_rename(tmp_path: &Path, final_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp_path, final_path)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
    use burn::optim::AdamConfig;

    use crate::domain::schedule::StepDecay;
    use crate::ml::model::{ConvRnn, ConvRnnConfig, Regressor};
    use crate::ml::validator::tensor_values;

    type TestBackend = Autodiff<NdArray>;

    fn model_config() -> ConvRnnConfig {
        ConvRnnConfig::with_topology(2, 4, 1, &[2], &[1], 3, 3)
    }

    fn bundle(epoch: usize, metric: f64) -> CheckpointBundle {
        CheckpointBundle {
            meta: CheckpointMeta {
                epoch,
                metric,
                scheduler: StepDecay::new(1e-3, 20, 0.9).state(),
                param_shapes: vec![ParamShape { name: "w".into(), dims: vec![2, 3] }],
            },
            model_state:     vec![1, 2, 3, 4],
            optimizer_state: vec![9, 8, 7],
        }
    }

    #[test]
    fn test_save_then_load_returns_same_bundle() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let saved = bundle(10, 0.25);
        store.save_best(&saved).unwrap();
        assert_eq!(store.load_best().unwrap(), saved);
    }

    #[test]
    fn test_missing_slot_is_not_found() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("never-written"));
        assert!(!store.best_path().exists());
        assert!(matches!(store.load_best(), Err(EngineError::CheckpointNotFound { .. })));
    }

    #[test]
    fn test_flipped_payload_byte_is_corrupt() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save_best(&bundle(0, 1.0)).unwrap();

        let mut bytes = fs::read(store.best_path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(store.best_path(), &bytes).unwrap();

        assert!(matches!(store.load_best(), Err(EngineError::CheckpointCorrupt { .. })));
    }

    #[test]
    fn test_edited_header_meta_is_corrupt() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save_best(&bundle(10, 0.5)).unwrap();

        let bytes = fs::read(store.best_path()).unwrap();
        let needle = b"\"epoch\":10";
        let at = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("epoch field in header");
        let mut edited = bytes.clone();
        edited[at + needle.len() - 1] = b'9';
        fs::write(store.best_path(), &edited).unwrap();

        assert!(matches!(store.load_best(), Err(EngineError::CheckpointCorrupt { .. })));
    }

    #[test]
    fn test_overflowing_record_lengths_are_corrupt() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let saved = bundle(0, 1.0);

        let lengths = [(u64::MAX, 1), (u64::MAX, 0), (8, 0)];
        for (model_len, optimizer_len) in lengths {
            let header = Header {
                format_version: FORMAT_VERSION,
                meta:           saved.meta.clone(),
                model_len,
                optimizer_len,
                sha256:         String::new(),
            };
            let header_json = serde_json::to_vec(&header).unwrap();
            let mut bytes = MAGIC.to_vec();
            bytes.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&header_json);
            bytes.extend_from_slice(&[0u8; 7]);
            fs::write(store.best_path(), &bytes).unwrap();

            assert!(
                matches!(store.load_best(), Err(EngineError::CheckpointCorrupt { .. })),
                "lengths ({model_len}, {optimizer_len}) should be rejected"
            );
        }
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        fs::write(store.best_path(), b"not a checkpoint").unwrap();
        assert!(matches!(store.load_best(), Err(EngineError::CheckpointCorrupt { .. })));
    }

    #[test]
    fn test_replacing_best_leaves_no_temp_files() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save_best(&bundle(0, 2.0)).unwrap();
        store.save_best(&bundle(10, 1.0)).unwrap();

        assert_eq!(store.load_best().unwrap().meta.epoch, 10);
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![BEST_FILE.to_string()]);
    }

    #[test]
    fn test_unwritable_dir_reports_storage_error_after_retries() {
        let dir     = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("models");
        fs::write(&blocker, b"a file, not a directory").unwrap();

        let store = CheckpointStore::new(&blocker).with_retries(2);
        match store.save_best(&bundle(0, 1.0)) {
            Err(EngineError::StorageWrite { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected StorageWrite, got {other:?}"),
        }
    }

    #[test]
    fn test_model_round_trip_restores_weights() {
        let device = NdArrayDevice::Cpu;
        let model: ConvRnn<TestBackend> = model_config().init(&device);
        let optim = AdamConfig::new().with_epsilon(1e-8).init::<TestBackend, ConvRnn<TestBackend>>();
        let scheduler = StepDecay::new(1e-3, 20, 0.9);

        let captured = CheckpointBundle::capture::<TestBackend, _, _>(
            &model, &optim, scheduler.state(), 3, 0.5,
        )
        .unwrap();

        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save_best(&captured).unwrap();

        let fresh: ConvRnn<TestBackend> = model_config().init(&device);
        let restored = store.load_best().unwrap().restore_model::<TestBackend, _>(fresh, &device).unwrap();

        let input = Tensor::<TestBackend, 3>::ones([2, 4, 2], &device);
        let a = tensor_values(model.forward(input.clone())).unwrap();
        let b = tensor_values(restored.forward(input)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_restore_into_other_topology_is_shape_mismatch() {
        let device = NdArrayDevice::Cpu;
        let model: ConvRnn<TestBackend> = model_config().init(&device);
        let optim = AdamConfig::new().with_epsilon(1e-8).init::<TestBackend, ConvRnn<TestBackend>>();
        let captured = CheckpointBundle::capture::<TestBackend, _, _>(
            &model, &optim, StepDecay::new(1e-3, 20, 0.9).state(), 0, 1.0,
        )
        .unwrap();

        let wider: ConvRnn<TestBackend> = ConvRnnConfig::with_topology(2, 4, 1, &[2], &[1], 5, 3)
            .init(&device);
        assert!(matches!(
            captured.restore_model::<TestBackend, _>(wider, &device),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_json_artifacts_round_trip() {
        let dir   = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save_json("numbers.json", &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = store.load_json("numbers.json").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(store.load_json::<Vec<i32>>("missing.json").is_err());
    }
}
