//! # acoustic-models
//!
//! Реализация акустических моделей на Candle.
//!
//! Модель собирается одним построителем из списка стадий
//! ([`acoustic_core::StageConfig`]): свёртки, batch normalization,
//! рекуррентные слои (SimpleRNN / GRU / LSTM, в том числе двунаправленные),
//! покадровые dense-слои и активации. На выходе — softmax по символам.
//! Вместе со слоями модель хранит явное отображение длины
//! ([`acoustic_core::OutputLength`]).

pub mod layers;
pub mod model;
pub mod recurrent;
pub mod summary;

pub use model::AcousticModel;
pub use summary::ModelSummary;
