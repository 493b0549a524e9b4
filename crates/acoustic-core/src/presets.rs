//! Готовые архитектуры акустических моделей.
//!
//! Каждый пресет — конструктор [`ModelConfig`] с параметрами, повторяющими
//! фабрики исходного набора моделей: от одиночного GRU до каскада
//! дилатированных causal-свёрток. Отображение длины выводится из стадий
//! единообразно, поэтому пресеты его не задают.

use serde::{Deserialize, Serialize};

use crate::config::{Activation, ModelConfig, RecurrentCell, RecurrentStageConfig, StageConfig};
use crate::length::PaddingMode;

/// Размерность спектрограммы по умолчанию (161 частотный бин).
pub const DEFAULT_INPUT_DIM: usize = 161;

/// Размер скрытого состояния рекуррентных слоёв по умолчанию.
pub const DEFAULT_UNITS: usize = 200;

/// Количество рекуррентных слоёв в глубоких пресетах по умолчанию.
pub const DEFAULT_RECUR_LAYERS: usize = 2;

/// Параметры входной свёрточной стадии.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParams {
    /// Количество фильтров.
    pub filters: usize,
    /// Ширина ядра.
    pub kernel_size: usize,
    /// Шаг свёртки.
    pub stride: usize,
    /// Режим паддинга.
    pub padding: PaddingMode,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            filters: 200,
            kernel_size: 11,
            stride: 2,
            padding: PaddingMode::Valid,
        }
    }
}

impl ModelConfig {
    /// GRU с `output_dim` units прямо перед softmax.
    pub fn simple_rnn(input_dim: usize, output_dim: usize) -> Self {
        Self {
            name: "simple_rnn".into(),
            input_dim,
            output_dim,
            stages: vec![StageConfig::gru("rnn", output_dim, Activation::Tanh)],
        }
    }

    /// GRU → BatchNorm → TimeDistributed(Dense).
    pub fn rnn(input_dim: usize, units: usize, activation: Activation, output_dim: usize) -> Self {
        Self {
            name: "rnn".into(),
            input_dim,
            output_dim,
            stages: vec![
                StageConfig::gru("rnn", units, activation),
                StageConfig::batch_norm("bn_rnn"),
                StageConfig::dense("time_dense", output_dim),
            ],
        }
    }

    /// Conv1D → BatchNorm → GRU → BatchNorm → TimeDistributed(Dense).
    pub fn cnn_rnn(input_dim: usize, conv: ConvParams, units: usize, output_dim: usize) -> Self {
        Self {
            name: "cnn_rnn".into(),
            input_dim,
            output_dim,
            stages: vec![
                conv_stage("conv1d", conv),
                StageConfig::batch_norm("bn_conv_1d"),
                StageConfig::gru("rnn", units, Activation::Relu),
                StageConfig::batch_norm("bn_rnn"),
                StageConfig::dense("time_dense", output_dim),
            ],
        }
    }

    /// `recur_layers` × (GRU → BatchNorm), затем TimeDistributed(Dense).
    ///
    /// Слои идут друг за другом: каждый GRU читает выход предыдущего.
    /// Исходная Keras-версия запускала GRU параллельно на одном входе и
    /// склеивала выходы; здесь стек, поэтому ширина признаков между слоями
    /// равна `units`, а длина последовательности не меняется.
    pub fn deep_rnn(input_dim: usize, units: usize, recur_layers: usize, output_dim: usize) -> Self {
        let mut stages = Vec::with_capacity(recur_layers * 2 + 1);
        for i in 0..recur_layers {
            stages.push(StageConfig::gru(format!("rnn_{i}"), units, Activation::Tanh));
            stages.push(StageConfig::batch_norm(format!("bn_rnn_{i}")));
        }
        stages.push(StageConfig::dense("time_dense", output_dim));

        Self {
            name: "deep_rnn".into(),
            input_dim,
            output_dim,
            stages,
        }
    }

    /// Двунаправленный GRU → TimeDistributed(Dense).
    pub fn bidirectional_rnn(input_dim: usize, units: usize, output_dim: usize) -> Self {
        Self {
            name: "bidirectional_rnn".into(),
            input_dim,
            output_dim,
            stages: vec![
                StageConfig::bidirectional_gru("bi_rnn", units, Activation::Tanh),
                StageConfig::dense("time_dense", output_dim),
            ],
        }
    }

    /// Conv1D → BatchNorm → BiGRU → BatchNorm → TimeDistributed(Dense).
    pub fn cnn_bidirectional_rnn(
        input_dim: usize,
        conv: ConvParams,
        units: usize,
        output_dim: usize,
    ) -> Self {
        Self {
            name: "cnn_bidirectional_rnn".into(),
            input_dim,
            output_dim,
            stages: vec![
                conv_stage("conv1d", conv),
                StageConfig::batch_norm("bn_conv_1d"),
                StageConfig::bidirectional_gru("bi_rnn", units, Activation::Relu),
                StageConfig::batch_norm("bn_bi_rnn"),
                StageConfig::dense("time_dense", output_dim),
            ],
        }
    }

    /// `recur_layers` × (BiGRU → BatchNorm), затем TimeDistributed(Dense).
    pub fn deep_bidirectional_rnn(
        input_dim: usize,
        units: usize,
        recur_layers: usize,
        output_dim: usize,
    ) -> Self {
        let mut stages = Vec::with_capacity(recur_layers * 2 + 1);
        for i in 0..recur_layers {
            stages.push(StageConfig::bidirectional_gru(
                format!("bi_rnn_{i}"),
                units,
                Activation::Relu,
            ));
            stages.push(StageConfig::batch_norm(format!("bn_bi_rnn_{i}")));
        }
        stages.push(StageConfig::dense("time_dense", output_dim));

        Self {
            name: "deep_bidirectional_rnn".into(),
            input_dim,
            output_dim,
            stages,
        }
    }

    /// Итоговая модель: Conv1D → BatchNorm → BiGRU с dropout → BatchNorm → Dense.
    pub fn final_model(input_dim: usize, conv: ConvParams, units: usize, output_dim: usize) -> Self {
        Self {
            name: "final".into(),
            input_dim,
            output_dim,
            stages: vec![
                conv_stage("conv1d", conv),
                StageConfig::batch_norm("bn_conv_1d"),
                StageConfig::Recurrent(RecurrentStageConfig {
                    name: "bi_rnn".into(),
                    cell: RecurrentCell::Gru,
                    units,
                    activation: Activation::Tanh,
                    bidirectional: true,
                    dropout: 0.5,
                    recurrent_dropout: 0.5,
                }),
                StageConfig::batch_norm("bn_bi_rnn"),
                StageConfig::dense("time_dense", output_dim),
            ],
        }
    }

    /// Каскад causal-свёрток с дилатацией 1, 2, 4, 8.
    ///
    /// Шаг `conv.stride` применяется только в первой свёртке, остальные
    /// идут с шагом 1. `conv.padding` игнорируется: все стадии causal.
    pub fn dilated_cnn(input_dim: usize, conv: ConvParams, output_dim: usize) -> Self {
        let mut stages: Vec<StageConfig> = [1usize, 2, 4, 8]
            .into_iter()
            .map(|dilation| {
                let stride = if dilation == 1 { conv.stride } else { 1 };
                StageConfig::conv1d(
                    format!("cnn_{dilation}"),
                    conv.filters,
                    conv.kernel_size,
                    stride,
                    PaddingMode::Causal,
                    dilation,
                )
            })
            .collect();
        stages.push(StageConfig::dense("time_dense", output_dim));

        Self {
            name: "dilated_cnn".into(),
            input_dim,
            output_dim,
            stages,
        }
    }
}

fn conv_stage(name: &str, conv: ConvParams) -> StageConfig {
    StageConfig::conv1d(name, conv.filters, conv.kernel_size, conv.stride, conv.padding, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_OUTPUT_DIM;

    #[test]
    fn test_cnn_rnn_length_matches_single_projection() {
        let config = ModelConfig::cnn_rnn(DEFAULT_INPUT_DIM, ConvParams::default(), 200, 29);
        config.validate().unwrap();
        // (100 - 11 + 1) / 2
        assert_eq!(config.output_length().apply(Some(100)).unwrap(), Some(45));
    }

    #[test]
    fn test_recurrent_presets_are_identity() {
        for config in [
            ModelConfig::simple_rnn(13, DEFAULT_OUTPUT_DIM),
            ModelConfig::rnn(13, 64, Activation::Relu, DEFAULT_OUTPUT_DIM),
            ModelConfig::deep_rnn(13, 64, 3, DEFAULT_OUTPUT_DIM),
            ModelConfig::bidirectional_rnn(13, 64, DEFAULT_OUTPUT_DIM),
            ModelConfig::deep_bidirectional_rnn(13, 64, 2, DEFAULT_OUTPUT_DIM),
        ] {
            config.validate().unwrap();
            assert!(config.output_length().is_identity(), "{}", config.name);
            assert_eq!(config.output_length().apply(Some(321)).unwrap(), Some(321));
        }
    }

    #[test]
    fn test_deep_rnn_stacks_layers() {
        let config = ModelConfig::deep_rnn(13, 64, 3, DEFAULT_OUTPUT_DIM);
        assert_eq!(config.stages.len(), 7);
        assert_eq!(config.stages[4].name(), "rnn_2");
        // Стек, а не параллельная склейка: ширина не растёт с числом слоёв.
        assert_eq!(config.feature_widths(), vec![64, 64, 64, 64, 64, 64, DEFAULT_OUTPUT_DIM]);
        assert!(config.output_length().is_identity());
    }

    #[test]
    fn test_dilated_cnn_composes_all_stages() {
        let conv = ConvParams {
            filters: 32,
            kernel_size: 2,
            stride: 2,
            padding: PaddingMode::Valid,
        };
        let config = ModelConfig::dilated_cnn(13, conv, DEFAULT_OUTPUT_DIM);
        config.validate().unwrap();

        let mapping = config.output_length();
        assert_eq!(mapping.stages().len(), 4);
        // Causal сохраняет длину, шаг только у первой стадии.
        assert_eq!(mapping.apply(Some(101)).unwrap(), Some(51));
        assert_eq!(mapping.receptive_field(), 1 + 1 + 2 * 2 + 4 * 2 + 8 * 2);
    }

    #[test]
    fn test_final_model_has_dropout() {
        let config = ModelConfig::final_model(13, ConvParams::default(), 64, DEFAULT_OUTPUT_DIM);
        config.validate().unwrap();
        let rnn = config
            .stages
            .iter()
            .find_map(|s| match s {
                StageConfig::Recurrent(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(rnn.dropout, 0.5);
        assert_eq!(rnn.recurrent_dropout, 0.5);
        assert_eq!(config.feature_widths()[2], 128);
    }
}
