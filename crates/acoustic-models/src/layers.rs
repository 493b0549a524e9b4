//! Слои без рекуррентности: свёртка, batch normalization, dense, активации.
//!
//! Все слои принимают и возвращают тензоры формы `(batch, time, features)`.
//! Свёртка и batch normalization внутри работают в раскладке candle
//! `(batch, channels, time)` и транспонируют вход и выход сами.

use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, Conv1d, Conv1dConfig, Linear, VarBuilder};

use acoustic_core::length::{ConvGeometry, PaddingMode};
use acoustic_core::{Activation, BatchNormStageConfig, ConvStageConfig, DenseStageConfig};

/// Применить функцию активации поэлементно (softmax — по последнему измерению).
pub fn apply_activation(x: &Tensor, activation: Activation) -> Result<Tensor> {
    match activation {
        Activation::Linear => Ok(x.clone()),
        Activation::Relu => x.relu(),
        Activation::Tanh => x.tanh(),
        Activation::Sigmoid => candle_nn::ops::sigmoid(x),
        Activation::Softmax => candle_nn::ops::softmax_last_dim(&x.contiguous()?),
    }
}

// -----------------------------------------------------------------------
// Conv1D
// -----------------------------------------------------------------------

/// 1-D свёртка по времени с явным паддингом и активацией.
///
/// Candle поддерживает только симметричный паддинг, поэтому `same` и
/// `causal` дополняются нулями вручную перед свёрткой с `padding = 0`.
pub struct ConvStage {
    conv: Conv1d,
    geometry: ConvGeometry,
    /// Эффективная ширина ядра с учётом дилатации.
    extent: usize,
    activation: Activation,
}

impl ConvStage {
    pub fn load(in_channels: usize, config: &ConvStageConfig, vb: VarBuilder) -> Result<Self> {
        let cfg = Conv1dConfig {
            padding: 0,
            stride: config.stride,
            dilation: config.dilation,
            groups: 1,
            ..Default::default()
        };
        let geometry = config.geometry();
        let extent = geometry
            .effective_filter_size()
            .ok()
            .and_then(|e| usize::try_from(e.max(1)).ok())
            .ok_or_else(|| {
                candle_core::Error::Msg(format!(
                    "{}: эффективная ширина ядра не помещается в usize",
                    config.name
                ))
            })?;
        let conv = candle_nn::conv1d(in_channels, config.filters, config.kernel_size, cfg, vb)?;
        Ok(Self {
            conv,
            geometry,
            extent,
            activation: config.activation,
        })
    }

    /// Паддинг (слева, справа) для входа длины `length`.
    pub fn padding(&self, length: usize) -> (usize, usize) {
        let extent = self.extent;
        match self.geometry.padding {
            PaddingMode::Valid => (0, 0),
            PaddingMode::Causal => (extent - 1, 0),
            PaddingMode::Same => {
                // Минимальный паддинг, при котором выход равен ceil(length / stride).
                let stride = self.geometry.stride;
                let out = length.div_ceil(stride);
                let total = (out.saturating_sub(1) * stride + extent).saturating_sub(length);
                (total / 2, total - total / 2)
            }
        }
    }

    /// Прямой проход: (batch, time, in) → (batch, time', filters).
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_b, time, _f) = x.dims3()?;
        let mut h = x.transpose(1, 2)?.contiguous()?;

        let (left, right) = self.padding(time);
        if left + right > 0 {
            h = h.pad_with_zeros(2, left, right)?;
        }

        let h = self.conv.forward(&h)?;
        let h = h.transpose(1, 2)?.contiguous()?;
        apply_activation(&h, self.activation)
    }
}

// -----------------------------------------------------------------------
// BatchNorm
// -----------------------------------------------------------------------

/// Batch normalization по оси признаков.
pub struct BatchNormStage {
    norm: BatchNorm,
}

impl BatchNormStage {
    pub fn load(features: usize, config: &BatchNormStageConfig, vb: VarBuilder) -> Result<Self> {
        let cfg = BatchNormConfig {
            eps: config.eps,
            ..Default::default()
        };
        let norm = candle_nn::batch_norm(features, cfg, vb)?;
        Ok(Self { norm })
    }

    /// При обучении — статистики батча, иначе накопленные running-статистики.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = x.transpose(1, 2)?.contiguous()?;
        let h = self.norm.forward_t(&h, train)?;
        h.transpose(1, 2)?.contiguous()
    }
}

// -----------------------------------------------------------------------
// TimeDistributed(Dense)
// -----------------------------------------------------------------------

/// Полносвязный слой, применяемый к каждому фрейму.
pub struct DenseStage {
    linear: Linear,
}

impl DenseStage {
    pub fn load(in_features: usize, config: &DenseStageConfig, vb: VarBuilder) -> Result<Self> {
        let linear = candle_nn::linear(in_features, config.units, vb)?;
        Ok(Self { linear })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.linear.forward(x)
    }
}
