//! Рекуррентные слои: SimpleRNN, GRU, LSTM и двунаправленная обёртка.
//!
//! Веса ячейки — две проекции: `input` (x → gates·units) и `recurrent`
//! (h → gates·units). Проекция входа считается сразу для всей
//! последовательности, по времени идёт только рекуррентная часть.
//!
//! Порядок блоков в проекциях:
//! - GRU: reset, update, candidate
//! - LSTM: input, forget, cell, output

use candle_core::{D, Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder};

use acoustic_core::{Activation, RecurrentCell, RecurrentStageConfig};

use crate::layers::apply_activation;

/// Состояние ячейки на одном шаге.
struct CellState {
    h: Tensor,
    /// Память LSTM; для остальных ячеек `None`.
    c: Option<Tensor>,
}

/// Рекуррентная ячейка одного направления.
pub struct Cell {
    kind: RecurrentCell,
    input: Linear,
    recurrent: Linear,
    units: usize,
    activation: Activation,
}

impl Cell {
    pub fn load(
        kind: RecurrentCell,
        in_features: usize,
        units: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let width = kind.gates() * units;
        let input = candle_nn::linear(in_features, width, vb.pp("input"))?;
        let recurrent = candle_nn::linear(units, width, vb.pp("recurrent"))?;
        Ok(Self {
            kind,
            input,
            recurrent,
            units,
            activation,
        })
    }

    fn initial_state(&self, batch: usize, like: &Tensor) -> Result<CellState> {
        let h = Tensor::zeros((batch, self.units), like.dtype(), like.device())?;
        let c = match self.kind {
            RecurrentCell::Lstm => Some(h.clone()),
            _ => None,
        };
        Ok(CellState { h, c })
    }

    /// Один шаг: `x_proj` — уже спроецированный вход (batch, gates·units).
    ///
    /// `h_mask` — маска recurrent dropout, общая для всех шагов.
    fn step(&self, x_proj: &Tensor, state: &CellState, h_mask: Option<&Tensor>) -> Result<CellState> {
        let h_prev = match h_mask {
            Some(mask) => (&state.h * mask)?,
            None => state.h.clone(),
        };
        let h_proj = self.recurrent.forward(&h_prev)?;

        match self.kind {
            RecurrentCell::SimpleRnn => {
                let h = apply_activation(&(x_proj + h_proj)?, self.activation)?;
                Ok(CellState { h, c: None })
            }
            RecurrentCell::Gru => {
                let xs = x_proj.chunk(3, D::Minus1)?;
                let hs = h_proj.chunk(3, D::Minus1)?;

                let r = candle_nn::ops::sigmoid(&(&xs[0] + &hs[0])?)?;
                let z = candle_nn::ops::sigmoid(&(&xs[1] + &hs[1])?)?;
                let n = apply_activation(&(&xs[2] + (&r * &hs[2])?)?, self.activation)?;

                // h = (1 - z) * n + z * h_prev = n + z * (h_prev - n)
                let h = (&n + (&z * (&state.h - &n)?)?)?;
                Ok(CellState { h, c: None })
            }
            RecurrentCell::Lstm => {
                let gates = (x_proj + h_proj)?;
                let g = gates.chunk(4, D::Minus1)?;

                let i = candle_nn::ops::sigmoid(&g[0])?;
                let f = candle_nn::ops::sigmoid(&g[1])?;
                let cand = apply_activation(&g[2], self.activation)?;
                let o = candle_nn::ops::sigmoid(&g[3])?;

                let c_prev = match &state.c {
                    Some(c) => c.clone(),
                    None => state.h.zeros_like()?,
                };
                let c = ((&f * &c_prev)? + (&i * &cand)?)?;
                let h = (&o * apply_activation(&c, self.activation)?)?;
                Ok(CellState { h, c: Some(c) })
            }
        }
    }

    /// Прогон по всей последовательности: (batch, time, in) → (batch, time, units).
    ///
    /// Маски `dropout` (по признакам входа) и `recurrent_dropout` (по скрытому
    /// состоянию) сэмплируются один раз на прогон и переиспользуются на
    /// каждом шаге времени.
    fn run(&self, x: &Tensor, dropout: Option<f32>, recurrent_dropout: Option<f32>) -> Result<Tensor> {
        let (batch, time, features) = x.dims3()?;
        let x = match dropout {
            Some(p) => x.broadcast_mul(&dropout_mask((batch, features), p, x)?.unsqueeze(1)?)?,
            None => x.clone(),
        };
        let projected = self.input.forward(&x)?;
        let h_mask = recurrent_dropout
            .map(|p| dropout_mask((batch, self.units), p, &x))
            .transpose()?;

        let mut state = self.initial_state(batch, &x)?;
        let mut outputs = Vec::with_capacity(time);
        for t in 0..time {
            let x_t = projected.narrow(1, t, 1)?.squeeze(1)?;
            state = self.step(&x_t, &state, h_mask.as_ref())?;
            outputs.push(state.h.clone());
        }
        Tensor::stack(&outputs, 1)
    }
}

/// Маска dropout формы `shape`: 0 с вероятностью `p`, иначе `1 / (1 - p)`.
fn dropout_mask(shape: (usize, usize), p: f32, like: &Tensor) -> Result<Tensor> {
    let keep = Tensor::rand(0f32, 1f32, shape, like.device())?.ge(p as f64)?;
    keep.to_dtype(like.dtype())? / (1.0 - p as f64)
}

/// Рекуррентная стадия, возвращающая все состояния (return_sequences).
///
/// Двунаправленная стадия прогоняет вторую ячейку по развёрнутой во
/// времени последовательности и конкатенирует признаки: `[forward, backward]`.
pub struct RecurrentStage {
    forward: Cell,
    backward: Option<Cell>,
    dropout: f32,
    recurrent_dropout: f32,
}

impl RecurrentStage {
    pub fn load(in_features: usize, config: &RecurrentStageConfig, vb: VarBuilder) -> Result<Self> {
        let load_cell = |prefix: &str| {
            Cell::load(
                config.cell,
                in_features,
                config.units,
                config.activation,
                vb.pp(prefix),
            )
        };

        let forward = load_cell("forward")?;
        let backward = if config.bidirectional {
            Some(load_cell("backward")?)
        } else {
            None
        };

        Ok(Self {
            forward,
            backward,
            dropout: config.dropout,
            recurrent_dropout: config.recurrent_dropout,
        })
    }

    /// Прямой проход; dropout применяется только при `train = true`.
    ///
    /// Каждое направление сэмплирует свои маски.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let dropout = (train && self.dropout > 0.0).then_some(self.dropout);
        let recurrent_dropout = (train && self.recurrent_dropout > 0.0).then_some(self.recurrent_dropout);

        let fwd = self.forward.run(x, dropout, recurrent_dropout)?;
        let Some(backward) = &self.backward else {
            return Ok(fwd);
        };

        let reversed = reverse_time(x)?;
        let bwd = reverse_time(&backward.run(&reversed, dropout, recurrent_dropout)?)?;
        Tensor::cat(&[&fwd, &bwd], D::Minus1)
    }
}

/// Развернуть ось времени (dim 1).
fn reverse_time(x: &Tensor) -> Result<Tensor> {
    let time = x.dim(1)?;
    let indices: Vec<u32> = (0..time as u32).rev().collect();
    let indices = Tensor::from_vec(indices, time, x.device())?;
    x.index_select(&indices, 1)
}
