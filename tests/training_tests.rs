use candle_core::{Device, Tensor};
use candle_nn::{Init, VarMap};
use tempfile::tempdir;
use trainkit::{
    label_smoothing, prepare_run, setup_device, soft_cross_entropy, top_k_accuracy,
    AverageMeter, Dataset, Reduction, SmoothingTarget, TensorDataset, Trial,
};

#[test]
fn forced_cpu_device() {
    std::env::set_var("CANDLE_FORCE_CPU", "1");
    let device = setup_device().unwrap();
    assert!(device.is_cpu());

    let (device, rngs) = prepare_run(11).unwrap();
    assert!(device.is_cpu());
    assert_eq!(rngs.seed, 11);
}

#[test]
fn epoch_bookkeeping_over_tensor_dataset() {
    let device = Device::Cpu;
    let inputs = Tensor::new(
        &[
            [2.0f32, 0.5, 0.1],
            [0.2, 1.5, 0.3],
            [0.1, 0.2, 3.0],
            [1.0, 0.9, 0.0],
        ],
        &device,
    )
    .unwrap();
    let labels = Tensor::new(&[0u32, 1, 2, 1], &device).unwrap();
    let dataset = TensorDataset::new(inputs.clone(), labels.clone()).unwrap();

    let mut top1 = AverageMeter::new();
    for index in 0..dataset.len() {
        let (logits, label) = dataset.get(index).unwrap();
        let logits = logits.unsqueeze(0).unwrap();
        let label = label.unsqueeze(0).unwrap();
        let acc = top_k_accuracy(&logits, &label, &[1]).unwrap();
        top1.update(acc[0]);
    }
    assert_eq!(top1.count(), 4);
    assert!((top1.average() - 75.0).abs() < 1e-9);
    assert_eq!(top1.to_string(), "0.0000 (75.0000)");

    let smoothed = label_smoothing(
        SmoothingTarget::Hard {
            labels: &labels,
            num_classes: 3,
        },
        0.1,
    )
    .unwrap();
    let loss = soft_cross_entropy(&inputs, &smoothed, -1, Reduction::Mean)
        .unwrap()
        .to_scalar::<f32>()
        .unwrap();
    assert!(loss.is_finite() && loss > 0.0);
}

#[test]
fn trial_checkpoint_round_trip() {
    let tmp = tempdir().unwrap();
    let trial = Trial::new("root-api", 5, tmp.path());
    let varmap = VarMap::new();
    varmap
        .get(4, "bias", Init::Const(1.5), candle_core::DType::F32, &Device::Cpu)
        .unwrap();
    let saved = trainkit::save_model(&trial, "final", &varmap).unwrap();
    assert_eq!(saved.record.filename, "model_final.safetensors");

    let mut restored = VarMap::new();
    restored
        .get(4, "bias", Init::Const(0.0), candle_core::DType::F32, &Device::Cpu)
        .unwrap();
    trainkit::load_model(&trial, "final", &mut restored).unwrap();
}
