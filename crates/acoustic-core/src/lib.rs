//! # acoustic-core
//!
//! Базовые типы, конфигурация и проекция длины последовательности для
//! акустических моделей RustAcoustic.
//!
//! - [`length::project`] — длина выхода одной 1-D свёрточной стадии
//! - [`OutputLength`] — композиция проекций по всем свёрточным стадиям модели
//! - [`ModelConfig`] и [`StageConfig`] — декларативное описание модели
//! - Пресеты архитектур и реестр [`Architecture`]
//! - Унифицированная обработка ошибок через [`AcousticError`]

pub mod architecture;
pub mod config;
pub mod debug;
pub mod error;
pub mod length;
pub mod presets;

pub use architecture::Architecture;
pub use config::{
    Activation, ActivationStageConfig, BatchNormStageConfig, ConvStageConfig, DEFAULT_OUTPUT_DIM,
    DenseStageConfig, ModelConfig, RecurrentCell, RecurrentStageConfig, StageConfig,
};
pub use error::{AcousticError, AcousticResult};
pub use length::{ConvGeometry, OutputLength, PaddingMode, SequenceLength, project};
pub use presets::{ConvParams, DEFAULT_INPUT_DIM};
