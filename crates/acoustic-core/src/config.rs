//! Конфигурационные структуры для акустических моделей.
//!
//! Модель описывается декларативно: размерность входа, число выходных
//! классов и упорядоченный список стадий ([`StageConfig`]). Один общий
//! построитель в `acoustic-models` превращает такой список в слои, а
//! композитное отображение длины ([`OutputLength`]) выводится из тех же
//! стадий.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AcousticError, AcousticResult};
use crate::length::{ConvGeometry, OutputLength, PaddingMode};

/// Число выходных классов по умолчанию: blank, пробел, апостроф и 26 букв.
pub const DEFAULT_OUTPUT_DIM: usize = 29;

/// Функция активации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Тождественная функция.
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    /// Softmax по последнему измерению.
    Softmax,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax => "softmax",
        }
    }
}

/// Тип рекуррентной ячейки.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrentCell {
    /// Полносвязная рекуррентная ячейка Элмана.
    SimpleRnn,
    #[default]
    Gru,
    Lstm,
}

impl RecurrentCell {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrentCell::SimpleRnn => "simple_rnn",
            RecurrentCell::Gru => "gru",
            RecurrentCell::Lstm => "lstm",
        }
    }

    /// Число гейтов (блоков весов размера `units`).
    pub fn gates(&self) -> usize {
        match self {
            RecurrentCell::SimpleRnn => 1,
            RecurrentCell::Gru => 3,
            RecurrentCell::Lstm => 4,
        }
    }
}

fn one() -> usize {
    1
}

fn relu() -> Activation {
    Activation::Relu
}

fn tanh() -> Activation {
    Activation::Tanh
}

fn default_bn_eps() -> f64 {
    1e-3
}

fn default_output_dim() -> usize {
    DEFAULT_OUTPUT_DIM
}

/// 1-D свёртка по оси времени.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvStageConfig {
    /// Имя стадии (префикс весов).
    pub name: String,
    /// Количество фильтров (выходных каналов).
    pub filters: usize,
    /// Ширина ядра.
    pub kernel_size: usize,
    /// Шаг свёртки.
    #[serde(default = "one")]
    pub stride: usize,
    /// Режим паддинга: "same", "valid" или "causal".
    #[serde(default)]
    pub padding: PaddingMode,
    /// Дилатация.
    #[serde(default = "one")]
    pub dilation: usize,
    /// Активация после свёртки.
    #[serde(default = "relu")]
    pub activation: Activation,
}

impl ConvStageConfig {
    /// Геометрия стадии по оси времени.
    pub fn geometry(&self) -> ConvGeometry {
        ConvGeometry::new(self.kernel_size, self.padding, self.stride).with_dilation(self.dilation)
    }
}

/// Batch normalization по оси признаков.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormStageConfig {
    pub name: String,
    #[serde(default = "default_bn_eps")]
    pub eps: f64,
}

/// Рекуррентный слой, возвращающий всю последовательность состояний.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentStageConfig {
    pub name: String,
    /// Тип ячейки.
    #[serde(default)]
    pub cell: RecurrentCell,
    /// Размер скрытого состояния одного направления.
    pub units: usize,
    /// Активация кандидата состояния (tanh по умолчанию).
    #[serde(default = "tanh")]
    pub activation: Activation,
    /// Двунаправленный слой; выходы направлений конкатенируются.
    #[serde(default)]
    pub bidirectional: bool,
    /// Dropout на входе (только при обучении).
    #[serde(default)]
    pub dropout: f32,
    /// Dropout на скрытом состоянии (только при обучении).
    #[serde(default)]
    pub recurrent_dropout: f32,
}

impl RecurrentStageConfig {
    /// Количество направлений (1 или 2).
    pub fn directions(&self) -> usize {
        if self.bidirectional { 2 } else { 1 }
    }

    /// Ширина выхода: `units` на каждое направление.
    pub fn output_width(&self) -> usize {
        self.units * self.directions()
    }
}

/// Полносвязный слой, применяемый к каждому фрейму отдельно.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseStageConfig {
    pub name: String,
    pub units: usize,
}

/// Поэлементная активация.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationStageConfig {
    pub name: String,
    pub activation: Activation,
}

/// Описание одной стадии модели.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    Conv1d(ConvStageConfig),
    BatchNorm(BatchNormStageConfig),
    Recurrent(RecurrentStageConfig),
    Dense(DenseStageConfig),
    Activation(ActivationStageConfig),
}

impl StageConfig {
    /// Свёртка с активацией ReLU.
    pub fn conv1d(
        name: impl Into<String>,
        filters: usize,
        kernel_size: usize,
        stride: usize,
        padding: PaddingMode,
        dilation: usize,
    ) -> Self {
        StageConfig::Conv1d(ConvStageConfig {
            name: name.into(),
            filters,
            kernel_size,
            stride,
            padding,
            dilation,
            activation: Activation::Relu,
        })
    }

    pub fn batch_norm(name: impl Into<String>) -> Self {
        StageConfig::BatchNorm(BatchNormStageConfig {
            name: name.into(),
            eps: default_bn_eps(),
        })
    }

    /// Однонаправленный GRU без dropout.
    pub fn gru(name: impl Into<String>, units: usize, activation: Activation) -> Self {
        StageConfig::Recurrent(RecurrentStageConfig {
            name: name.into(),
            cell: RecurrentCell::Gru,
            units,
            activation,
            bidirectional: false,
            dropout: 0.0,
            recurrent_dropout: 0.0,
        })
    }

    /// Двунаправленный GRU (merge mode = concat).
    pub fn bidirectional_gru(name: impl Into<String>, units: usize, activation: Activation) -> Self {
        StageConfig::Recurrent(RecurrentStageConfig {
            name: name.into(),
            cell: RecurrentCell::Gru,
            units,
            activation,
            bidirectional: true,
            dropout: 0.0,
            recurrent_dropout: 0.0,
        })
    }

    pub fn dense(name: impl Into<String>, units: usize) -> Self {
        StageConfig::Dense(DenseStageConfig {
            name: name.into(),
            units,
        })
    }

    pub fn activation(name: impl Into<String>, activation: Activation) -> Self {
        StageConfig::Activation(ActivationStageConfig {
            name: name.into(),
            activation,
        })
    }

    /// Имя стадии.
    pub fn name(&self) -> &str {
        match self {
            StageConfig::Conv1d(c) => &c.name,
            StageConfig::BatchNorm(c) => &c.name,
            StageConfig::Recurrent(c) => &c.name,
            StageConfig::Dense(c) => &c.name,
            StageConfig::Activation(c) => &c.name,
        }
    }

    /// Короткое название типа стадии для сводок и логов.
    pub fn kind(&self) -> &'static str {
        match self {
            StageConfig::Conv1d(_) => "Conv1D",
            StageConfig::BatchNorm(_) => "BatchNorm",
            StageConfig::Recurrent(c) => match (c.cell, c.bidirectional) {
                (RecurrentCell::SimpleRnn, false) => "SimpleRNN",
                (RecurrentCell::SimpleRnn, true) => "Bidirectional(SimpleRNN)",
                (RecurrentCell::Gru, false) => "GRU",
                (RecurrentCell::Gru, true) => "Bidirectional(GRU)",
                (RecurrentCell::Lstm, false) => "LSTM",
                (RecurrentCell::Lstm, true) => "Bidirectional(LSTM)",
            },
            StageConfig::Dense(_) => "TimeDistributed(Dense)",
            StageConfig::Activation(_) => "Activation",
        }
    }

    /// Ширина признаков на выходе стадии при ширине входа `input_width`.
    pub fn output_width(&self, input_width: usize) -> usize {
        match self {
            StageConfig::Conv1d(c) => c.filters,
            StageConfig::Recurrent(c) => c.output_width(),
            StageConfig::Dense(c) => c.units,
            StageConfig::BatchNorm(_) | StageConfig::Activation(_) => input_width,
        }
    }

    /// Геометрия по оси времени; `None` для стадий, не меняющих длину.
    pub fn geometry(&self) -> Option<ConvGeometry> {
        match self {
            StageConfig::Conv1d(c) => Some(c.geometry()),
            _ => None,
        }
    }

    fn validate(&self) -> AcousticResult<()> {
        let name = self.name();
        if name.is_empty() {
            return Err(AcousticError::Config(format!(
                "стадия {} без имени",
                self.kind()
            )));
        }

        let positive = |value: usize, field: &str| -> AcousticResult<()> {
            if value == 0 {
                Err(AcousticError::Config(format!(
                    "стадия '{name}': {field} должен быть >= 1"
                )))
            } else {
                Ok(())
            }
        };

        match self {
            StageConfig::Conv1d(c) => {
                positive(c.filters, "filters")?;
                positive(c.kernel_size, "kernel_size")?;
                positive(c.stride, "stride")?;
                positive(c.dilation, "dilation")?;
            }
            StageConfig::BatchNorm(c) => {
                if !(c.eps > 0.0) {
                    return Err(AcousticError::Config(format!(
                        "стадия '{name}': eps должен быть > 0 (получено {})",
                        c.eps
                    )));
                }
            }
            StageConfig::Recurrent(c) => {
                positive(c.units, "units")?;
                for (field, p) in [("dropout", c.dropout), ("recurrent_dropout", c.recurrent_dropout)] {
                    if !(0.0..1.0).contains(&p) {
                        return Err(AcousticError::Config(format!(
                            "стадия '{name}': {field} должен быть в [0, 1) (получено {p})"
                        )));
                    }
                }
            }
            StageConfig::Dense(c) => positive(c.units, "units")?,
            StageConfig::Activation(_) => {}
        }
        Ok(())
    }
}

/// Конфигурация акустической модели.
///
/// После последней стадии всегда применяется softmax по `output_dim` классам.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Название модели (например, "cnn_rnn").
    pub name: String,

    /// Размерность входных признаков на фрейм (161 для спектрограммы, 13 для MFCC).
    pub input_dim: usize,

    /// Количество выходных классов.
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,

    /// Стадии в порядке прохождения данных.
    pub stages: Vec<StageConfig>,
}

impl ModelConfig {
    /// Загрузить конфигурацию из JSON-файла.
    pub fn from_file(path: impl AsRef<Path>) -> AcousticResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&data)?;
        debug!(
            "Конфигурация '{}' загружена из {:?}: {} стадий",
            config.name,
            path,
            config.stages.len()
        );
        Ok(config)
    }

    /// Сохранить конфигурацию в JSON-файл.
    pub fn save(&self, path: impl AsRef<Path>) -> AcousticResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Проверить согласованность конфигурации.
    pub fn validate(&self) -> AcousticResult<()> {
        if self.input_dim == 0 || self.output_dim == 0 {
            return Err(AcousticError::Config(format!(
                "модель '{}': input_dim и output_dim должны быть >= 1",
                self.name
            )));
        }
        if self.stages.is_empty() {
            return Err(AcousticError::Config(format!(
                "модель '{}' не содержит стадий",
                self.name
            )));
        }

        let mut names = HashSet::with_capacity(self.stages.len());
        for stage in &self.stages {
            stage.validate()?;
            if !names.insert(stage.name()) {
                return Err(AcousticError::Config(format!(
                    "модель '{}': повторяющееся имя стадии '{}'",
                    self.name,
                    stage.name()
                )));
            }
        }

        let final_width = self.final_width();
        if final_width != self.output_dim {
            return Err(AcousticError::Config(format!(
                "модель '{}': последняя стадия выдаёт {} признаков, а output_dim = {}",
                self.name, final_width, self.output_dim
            )));
        }
        Ok(())
    }

    /// Ширина признаков после каждой стадии.
    pub fn feature_widths(&self) -> Vec<usize> {
        self.stages
            .iter()
            .scan(self.input_dim, |width, stage| {
                *width = stage.output_width(*width);
                Some(*width)
            })
            .collect()
    }

    /// Ширина признаков перед softmax.
    pub fn final_width(&self) -> usize {
        self.feature_widths().last().copied().unwrap_or(self.input_dim)
    }

    /// Композитное отображение длины по свёрточным стадиям.
    pub fn output_length(&self) -> OutputLength {
        OutputLength::from_stages(self.stages.iter().filter_map(StageConfig::geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ModelConfig {
        ModelConfig {
            name: "small".into(),
            input_dim: 13,
            output_dim: 29,
            stages: vec![
                StageConfig::conv1d("conv", 32, 5, 2, PaddingMode::Valid, 1),
                StageConfig::batch_norm("bn_conv"),
                StageConfig::bidirectional_gru("bi_rnn", 16, Activation::Relu),
                StageConfig::dense("time_dense", 29),
            ],
        }
    }

    #[test]
    fn test_feature_widths() {
        let config = small_config();
        assert_eq!(config.feature_widths(), vec![32, 32, 32, 29]);
        assert_eq!(config.final_width(), 29);
        config.validate().unwrap();
    }

    #[test]
    fn test_output_length_uses_conv_stages_only() {
        let config = small_config();
        let mapping = config.output_length();
        assert_eq!(mapping.stages().len(), 1);
        assert_eq!(mapping.apply(Some(100)).unwrap(), Some(48));
    }

    #[test]
    fn test_validate_rejects_width_mismatch() {
        let mut config = small_config();
        config.output_dim = 30;
        assert!(matches!(config.validate(), Err(AcousticError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = small_config();
        config.stages.insert(1, StageConfig::batch_norm("conv"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("conv"));
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let mut config = small_config();
        config.stages[0] = StageConfig::conv1d("conv", 32, 5, 0, PaddingMode::Valid, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dropout_out_of_range() {
        let mut config = small_config();
        if let StageConfig::Recurrent(rnn) = &mut config.stages[2] {
            rnn.dropout = 1.0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_defaults_from_json() {
        let json = r#"{
            "name": "tiny",
            "input_dim": 13,
            "stages": [
                {"kind": "conv1d", "name": "conv", "filters": 8, "kernel_size": 3},
                {"kind": "recurrent", "name": "rnn", "units": 29}
            ]
        }"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dim, DEFAULT_OUTPUT_DIM);
        match &config.stages[0] {
            StageConfig::Conv1d(c) => {
                assert_eq!(c.stride, 1);
                assert_eq!(c.dilation, 1);
                assert_eq!(c.padding, PaddingMode::Same);
                assert_eq!(c.activation, Activation::Relu);
            }
            other => panic!("unexpected stage: {other:?}"),
        }
        match &config.stages[1] {
            StageConfig::Recurrent(r) => {
                assert_eq!(r.cell, RecurrentCell::Gru);
                assert_eq!(r.activation, Activation::Tanh);
                assert!(!r.bidirectional);
            }
            other => panic!("unexpected stage: {other:?}"),
        }
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_padding_in_json_fails() {
        let json = r#"{"kind": "conv1d", "name": "c", "filters": 8, "kernel_size": 3, "padding": "full"}"#;
        assert!(serde_json::from_str::<StageConfig>(json).is_err());
    }
}
