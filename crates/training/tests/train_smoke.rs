use burn::backend::Autodiff;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::Tensor;
use burn_dataset::{augment, ChwImage, Dataset, SampleRecord};
use burn_ndarray::NdArray;
use data_contracts::DatasetMode;
use models::{UNet, UNetConfig};
use training::checkpoint::{checkpoint_dir, final_model_path, load_meta};
use training::{train_model, StepDecay, TrainOptions, TrainingState};

type B = NdArray<f32>;
type AD = Autodiff<B>;

fn sample(id: &str, size: usize) -> (ChwImage, ChwImage) {
    let image = ChwImage::new(
        3,
        size,
        size,
        (0..3 * size * size)
            .map(|i| ((i * 37) % 255) as f32)
            .collect(),
    );
    let label = ChwImage::new(
        1,
        size,
        size,
        (0..size * size)
            .map(|i| if (i / size + i % size + id.len()) % 3 == 0 { 255.0 } else { 0.0 })
            .collect(),
    );
    (image, label)
}

fn datasets() -> (Dataset, Dataset) {
    let (image, label) = sample("train", 8);
    let train = Dataset {
        mode: DatasetMode::Train,
        records: vec![SampleRecord {
            id: "train".into(),
            images: augment(&image),
            labels: Some(augment(&label)),
            original: None,
        }],
    };
    let (image, label) = sample("val", 8);
    let val = Dataset {
        mode: DatasetMode::Val,
        records: vec![SampleRecord {
            id: "val".into(),
            images: vec![image],
            labels: Some(vec![label]),
            original: None,
        }],
    };
    (train, val)
}

fn tiny_options(output: std::path::PathBuf, epochs: usize) -> TrainOptions {
    TrainOptions {
        output,
        epochs,
        schedule: StepDecay::new(1e-3, 1),
        tile_size: 4,
        checkpoint_every: 1,
        model: UNetConfig {
            base_channels: 2,
            depth: 2,
            ..Default::default()
        },
        seed: Some(7),
    }
}

#[test]
fn tiny_run_writes_checkpoints_and_final_model() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run");
    let (train, val) = datasets();
    let opts = tiny_options(output.clone(), 2);
    let device = Default::default();

    let (_, outcome) = train_model::<AD>(&train, &val, &opts, &device).unwrap();
    assert_eq!(outcome.state, TrainingState::Completed);
    assert_eq!(outcome.epochs_run, 2);
    assert_eq!(outcome.history.train_loss.len(), 2);
    assert_eq!(outcome.history.val_loss.len(), 2);
    assert!(outcome.history.train_loss.iter().all(|l| l.is_finite() && *l > 0.0));
    assert!(outcome
        .history
        .train_score
        .iter()
        .all(|s| *s > 0.0 && *s <= 1.0));

    for epoch in 1..=2 {
        let ckpt = checkpoint_dir(&output, epoch);
        assert!(ckpt.join("model.bin").exists());
        assert!(ckpt.join("optim.bin").exists());
        let meta = load_meta(&ckpt).unwrap();
        assert_eq!(meta.epoch, epoch);
        assert_eq!(meta.history.epochs(), epoch);
    }
    assert!(output.join("loss.csv").exists());

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model = UNet::<B>::new(opts.model, &device)
        .load_file(final_model_path(&output), &recorder, &device)
        .unwrap();
    let logits = model.forward(Tensor::<B, 4>::zeros([1, 3, 4, 4], &device));
    assert_eq!(logits.dims(), [1, 1, 4, 4]);
}

#[test]
fn empty_validation_set_leaves_val_history_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (train, _) = datasets();
    let val = Dataset {
        mode: DatasetMode::Val,
        records: Vec::new(),
    };
    let opts = tiny_options(dir.path().join("run"), 1);
    let (_, outcome) = train_model::<AD>(&train, &val, &opts, &Default::default()).unwrap();
    assert_eq!(outcome.history.train_loss.len(), 1);
    assert!(outcome.history.val_loss.is_empty());
}

#[test]
fn misaligned_tile_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (train, val) = datasets();
    let mut opts = tiny_options(dir.path().join("run"), 1);
    opts.tile_size = 3;
    assert!(train_model::<AD>(&train, &val, &opts, &Default::default()).is_err());
}
