//! Integration tests for building and running acoustic models.

use acoustic_core::{
    AcousticError, Activation, Architecture, ConvParams, DEFAULT_OUTPUT_DIM, ModelConfig,
    PaddingMode,
};
use acoustic_models::AcousticModel;
use candle_core::{Device, Tensor};

const INPUT_DIM: usize = 13;
const UNITS: usize = 16;

fn small_conv() -> ConvParams {
    ConvParams {
        filters: 8,
        kernel_size: 5,
        stride: 2,
        padding: PaddingMode::Valid,
    }
}

/// Все пресеты с уменьшенными размерами.
fn small_presets() -> Vec<ModelConfig> {
    let out = DEFAULT_OUTPUT_DIM;
    vec![
        ModelConfig::simple_rnn(INPUT_DIM, out),
        ModelConfig::rnn(INPUT_DIM, UNITS, Activation::Relu, out),
        ModelConfig::cnn_rnn(INPUT_DIM, small_conv(), UNITS, out),
        ModelConfig::deep_rnn(INPUT_DIM, UNITS, 2, out),
        ModelConfig::bidirectional_rnn(INPUT_DIM, UNITS, out),
        ModelConfig::cnn_bidirectional_rnn(INPUT_DIM, small_conv(), UNITS, out),
        ModelConfig::deep_bidirectional_rnn(INPUT_DIM, UNITS, 2, out),
        ModelConfig::final_model(INPUT_DIM, small_conv(), UNITS, out),
        ModelConfig::dilated_cnn(INPUT_DIM, small_conv(), out),
    ]
}

#[test]
fn test_every_preset_output_matches_length_mapping() {
    let device = Device::Cpu;
    assert_eq!(small_presets().len(), Architecture::all().len());

    for config in small_presets() {
        let (model, _varmap) = AcousticModel::random(config, &device).expect("build model");

        for time in [23usize, 40] {
            let x = Tensor::randn(0f32, 1f32, (2, time, INPUT_DIM), &device).unwrap();
            let probs = model.forward(&x).expect("forward");

            let expected = model.output_length().apply_checked(time).unwrap();
            assert_eq!(
                probs.dims(),
                &[2, expected, DEFAULT_OUTPUT_DIM],
                "{} with {time} frames",
                model.name()
            );

            let sums: Vec<f32> = probs.sum(2).unwrap().flatten_all().unwrap().to_vec1().unwrap();
            assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4), "{}", model.name());
        }
    }
}

#[test]
fn test_summary_matches_allocated_parameters() {
    let device = Device::Cpu;
    for config in small_presets() {
        let (model, varmap) = AcousticModel::random(config, &device).unwrap();
        let allocated: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
        assert_eq!(model.summary().total_params, allocated, "{}", model.name());
    }
}

#[test]
fn test_training_forward_keeps_shape() {
    let device = Device::Cpu;
    let config = ModelConfig::final_model(INPUT_DIM, small_conv(), UNITS, DEFAULT_OUTPUT_DIM);
    let (model, _varmap) = AcousticModel::random(config, &device).unwrap();

    let x = Tensor::randn(0f32, 1f32, (3, 31, INPUT_DIM), &device).unwrap();
    let probs = model.forward_t(&x, true).unwrap();
    assert_eq!(probs.dims(), &[3, 14, DEFAULT_OUTPUT_DIM]);
}

#[test]
fn test_input_shorter_than_receptive_field_is_rejected() {
    let device = Device::Cpu;
    let config = ModelConfig::cnn_rnn(INPUT_DIM, small_conv(), UNITS, DEFAULT_OUTPUT_DIM);
    let (model, _varmap) = AcousticModel::random(config, &device).unwrap();

    let x = Tensor::randn(0f32, 1f32, (1, 3, INPUT_DIM), &device).unwrap();
    let err = model.forward(&x).unwrap_err();
    assert!(matches!(err, AcousticError::DegenerateLength { input: 3, .. }));
}

#[test]
fn test_wrong_feature_dim_is_rejected() {
    let device = Device::Cpu;
    let config = ModelConfig::bidirectional_rnn(INPUT_DIM, UNITS, DEFAULT_OUTPUT_DIM);
    let (model, _varmap) = AcousticModel::random(config, &device).unwrap();

    let x = Tensor::zeros((1, 10, INPUT_DIM + 1), candle_core::DType::F32, &device).unwrap();
    assert!(matches!(model.forward(&x), Err(AcousticError::Model(_))));
}

#[test]
fn test_invalid_config_is_rejected_before_building() {
    let mut config = ModelConfig::rnn(INPUT_DIM, UNITS, Activation::Relu, DEFAULT_OUTPUT_DIM);
    config.output_dim = 30;
    let err = AcousticModel::random(config, &Device::Cpu).err().expect("must fail");
    assert!(matches!(err, AcousticError::Config(_)));
}

#[test]
fn test_weights_survive_safetensors_roundtrip() {
    let device = Device::Cpu;
    let dir = tempfile::tempdir().unwrap();

    let config = ModelConfig::cnn_bidirectional_rnn(INPUT_DIM, small_conv(), UNITS, DEFAULT_OUTPUT_DIM);
    let (model, varmap) = AcousticModel::random(config.clone(), &device).unwrap();
    varmap.save(dir.path().join("model.safetensors")).unwrap();
    config.save(dir.path().join("config.json")).unwrap();

    let loaded = AcousticModel::load(dir.path(), &device).unwrap();
    assert_eq!(loaded.config(), &config);

    let x = Tensor::randn(0f32, 1f32, (1, 20, INPUT_DIM), &device).unwrap();
    let a = model.forward(&x).unwrap();
    let b = loaded.forward(&x).unwrap();
    let diff: f32 = (a - b).unwrap().abs().unwrap().max_all().unwrap().to_scalar().unwrap();
    assert!(diff < 1e-6);
}

#[test]
fn test_missing_weights_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ModelConfig::simple_rnn(INPUT_DIM, DEFAULT_OUTPUT_DIM);
    let err = AcousticModel::from_safetensors(config, dir.path().join("nope.safetensors"), &Device::Cpu)
        .err()
        .expect("must fail");
    assert!(matches!(err, AcousticError::Model(_)));
}
