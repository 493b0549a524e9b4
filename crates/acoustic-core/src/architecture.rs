//! Реестр готовых архитектур.
//!
//! Содержит перечисление пресетов и метаданные о каждом.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Activation, DEFAULT_OUTPUT_DIM, ModelConfig};
use crate::presets::{ConvParams, DEFAULT_RECUR_LAYERS, DEFAULT_UNITS};

/// Тип архитектуры.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Одиночный GRU с softmax.
    SimpleRnn,
    /// GRU + BatchNorm + TimeDistributed(Dense).
    Rnn,
    /// Conv1D перед GRU.
    CnnRnn,
    /// Стек GRU-слоёв.
    DeepRnn,
    /// Двунаправленный GRU.
    BidirectionalRnn,
    /// Conv1D перед двунаправленным GRU.
    CnnBidirectionalRnn,
    /// Стек двунаправленных GRU-слоёв.
    DeepBidirectionalRnn,
    /// Conv1D + двунаправленный GRU с dropout.
    Final,
    /// Каскад дилатированных causal-свёрток.
    DilatedCnn,
}

impl Architecture {
    /// Все доступные архитектуры.
    pub fn all() -> &'static [Architecture] {
        &[
            Architecture::SimpleRnn,
            Architecture::Rnn,
            Architecture::CnnRnn,
            Architecture::DeepRnn,
            Architecture::BidirectionalRnn,
            Architecture::CnnBidirectionalRnn,
            Architecture::DeepBidirectionalRnn,
            Architecture::Final,
            Architecture::DilatedCnn,
        ]
    }

    /// Строковый идентификатор для CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::SimpleRnn => "simple-rnn",
            Architecture::Rnn => "rnn",
            Architecture::CnnRnn => "cnn-rnn",
            Architecture::DeepRnn => "deep-rnn",
            Architecture::BidirectionalRnn => "bidirectional-rnn",
            Architecture::CnnBidirectionalRnn => "cnn-bidirectional-rnn",
            Architecture::DeepBidirectionalRnn => "deep-bidirectional-rnn",
            Architecture::Final => "final",
            Architecture::DilatedCnn => "dilated-cnn",
        }
    }

    /// Человекочитаемое название.
    pub fn display_name(&self) -> &'static str {
        match self {
            Architecture::SimpleRnn => "Simple RNN",
            Architecture::Rnn => "RNN + TimeDistributed Dense",
            Architecture::CnnRnn => "CNN + RNN",
            Architecture::DeepRnn => "Deep RNN",
            Architecture::BidirectionalRnn => "Bidirectional RNN",
            Architecture::CnnBidirectionalRnn => "CNN + Bidirectional RNN",
            Architecture::DeepBidirectionalRnn => "Deep Bidirectional RNN",
            Architecture::Final => "CNN + Bidirectional RNN with dropout",
            Architecture::DilatedCnn => "Dilated causal CNN",
        }
    }

    /// Парсинг из строки (CLI-совместимо).
    pub fn from_str_loose(s: &str) -> Option<Architecture> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "simple-rnn" | "simple" | "model-0" => Some(Architecture::SimpleRnn),
            "rnn" | "model-1" => Some(Architecture::Rnn),
            "cnn-rnn" | "model-2" => Some(Architecture::CnnRnn),
            "deep-rnn" | "model-3" => Some(Architecture::DeepRnn),
            "bidirectional-rnn" | "birnn" | "model-4" => Some(Architecture::BidirectionalRnn),
            "cnn-bidirectional-rnn" | "cnn-birnn" => Some(Architecture::CnnBidirectionalRnn),
            "deep-bidirectional-rnn" | "deep-birnn" => Some(Architecture::DeepBidirectionalRnn),
            "final" | "final-model" => Some(Architecture::Final),
            "dilated-cnn" | "dilated" => Some(Architecture::DilatedCnn),
            _ => None,
        }
    }

    /// Пресет с параметрами по умолчанию.
    pub fn default_config(&self, input_dim: usize) -> ModelConfig {
        let out = DEFAULT_OUTPUT_DIM;
        let conv = ConvParams::default();
        match self {
            Architecture::SimpleRnn => ModelConfig::simple_rnn(input_dim, out),
            Architecture::Rnn => ModelConfig::rnn(input_dim, DEFAULT_UNITS, Activation::Relu, out),
            Architecture::CnnRnn => ModelConfig::cnn_rnn(input_dim, conv, DEFAULT_UNITS, out),
            Architecture::DeepRnn => {
                ModelConfig::deep_rnn(input_dim, DEFAULT_UNITS, DEFAULT_RECUR_LAYERS, out)
            }
            Architecture::BidirectionalRnn => {
                ModelConfig::bidirectional_rnn(input_dim, DEFAULT_UNITS, out)
            }
            Architecture::CnnBidirectionalRnn => {
                ModelConfig::cnn_bidirectional_rnn(input_dim, conv, DEFAULT_UNITS, out)
            }
            Architecture::DeepBidirectionalRnn => ModelConfig::deep_bidirectional_rnn(
                input_dim,
                DEFAULT_UNITS,
                DEFAULT_RECUR_LAYERS,
                out,
            ),
            Architecture::Final => ModelConfig::final_model(input_dim, conv, DEFAULT_UNITS, out),
            Architecture::DilatedCnn => ModelConfig::dilated_cnn(input_dim, conv, out),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
