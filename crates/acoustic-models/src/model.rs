//! AcousticModel — слои, собранные из списка стадий, и отображение длины.
//!
//! Вход: признаки `(batch, time, input_dim)`. Выход: вероятности символов
//! `(batch, time', output_dim)`, где `time'` задаёт [`AcousticModel::output_length`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use tracing::{debug, info};

use acoustic_core::{
    AcousticError, AcousticResult, Activation, ModelConfig, OutputLength, StageConfig, debug as trace,
};

use crate::layers::{BatchNormStage, ConvStage, DenseStage, apply_activation};
use crate::recurrent::RecurrentStage;
use crate::summary::ModelSummary;

/// Построенная стадия.
enum Layer {
    Conv(ConvStage),
    BatchNorm(BatchNormStage),
    Recurrent(RecurrentStage),
    Dense(DenseStage),
    Activation(Activation),
}

impl Layer {
    fn load(stage: &StageConfig, in_features: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let vb = vb.pp(stage.name());
        Ok(match stage {
            StageConfig::Conv1d(c) => Layer::Conv(ConvStage::load(in_features, c, vb)?),
            StageConfig::BatchNorm(c) => Layer::BatchNorm(BatchNormStage::load(in_features, c, vb)?),
            StageConfig::Recurrent(c) => Layer::Recurrent(RecurrentStage::load(in_features, c, vb)?),
            StageConfig::Dense(c) => Layer::Dense(DenseStage::load(in_features, c, vb)?),
            StageConfig::Activation(c) => Layer::Activation(c.activation),
        })
    }

    fn forward_t(&self, x: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        match self {
            Layer::Conv(l) => l.forward(x),
            Layer::BatchNorm(l) => l.forward_t(x, train),
            Layer::Recurrent(l) => l.forward_t(x, train),
            Layer::Dense(l) => l.forward(x),
            Layer::Activation(a) => apply_activation(x, *a),
        }
    }
}

/// Акустическая модель: слои плюс явное отображение длины последовательности.
pub struct AcousticModel {
    /// Конфигурация, из которой собрана модель.
    config: ModelConfig,
    /// Слои в порядке прохождения данных (имя стадии, слой).
    layers: Vec<(String, Layer)>,
    /// Длина входа → длина выхода.
    output_length: OutputLength,
}

impl AcousticModel {
    /// Собрать модель из конфигурации и источника весов.
    ///
    /// Веса каждой стадии ищутся под префиксом её имени.
    pub fn build(config: ModelConfig, vb: VarBuilder) -> AcousticResult<Self> {
        config.validate()?;

        let mut layers = Vec::with_capacity(config.stages.len());
        let mut width = config.input_dim;
        for stage in &config.stages {
            let layer = Layer::load(stage, width, vb.clone())?;
            layers.push((stage.name().to_string(), layer));
            width = stage.output_width(width);
        }

        let output_length = config.output_length();
        let model = Self {
            config,
            layers,
            output_length,
        };
        debug!("Модель собрана:\n{}", model.summary());
        Ok(model)
    }

    /// Собрать модель со свежеинициализированными весами.
    ///
    /// Возвращает также [`VarMap`] с переменными (для обучения или сохранения).
    pub fn random(config: ModelConfig, device: &Device) -> AcousticResult<(Self, VarMap)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Self::build(config, vb)?;
        Ok((model, varmap))
    }

    /// Загрузить веса из safetensors-файла.
    pub fn from_safetensors(
        config: ModelConfig,
        path: impl AsRef<Path>,
        device: &Device,
    ) -> AcousticResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AcousticError::Model(format!(
                "Файл весов не найден: {:?}",
                path
            )));
        }

        let start = Instant::now();
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? };
        let model = Self::build(config, vb)?;
        info!(
            "{}: веса загружены из {:?} за {:.2}с",
            model.name(),
            path,
            start.elapsed().as_secs_f64()
        );
        Ok(model)
    }

    /// Загрузить модель из директории.
    ///
    /// Ожидаемые файлы:
    /// - `config.json` — [`ModelConfig`]
    /// - `model.safetensors` — веса
    pub fn load(model_dir: impl AsRef<Path>, device: &Device) -> AcousticResult<Self> {
        let model_dir: PathBuf = model_dir.as_ref().to_path_buf();
        info!("Загрузка модели из {:?}", model_dir);

        let config_path = model_dir.join("config.json");
        if !config_path.exists() {
            return Err(AcousticError::Model(format!(
                "Файл config.json не найден в {:?}",
                model_dir
            )));
        }
        let config = ModelConfig::from_file(&config_path)?;
        Self::from_safetensors(config, model_dir.join("model.safetensors"), device)
    }

    /// Имя модели.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Отображение «число входных фреймов → число выходных фреймов».
    pub fn output_length(&self) -> &OutputLength {
        &self.output_length
    }

    /// Сводка архитектуры.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary::from_config(&self.config)
    }

    /// Инференс: (batch, time, input_dim) → (batch, time', output_dim).
    pub fn forward(&self, features: &Tensor) -> AcousticResult<Tensor> {
        self.forward_t(features, false)
    }

    /// Прямой проход; `train` включает dropout и статистики батча в batch norm.
    pub fn forward_t(&self, features: &Tensor, train: bool) -> AcousticResult<Tensor> {
        let (_batch, time, dim) = features.dims3()?;
        if dim != self.config.input_dim {
            return Err(AcousticError::Model(format!(
                "{}: ожидается {} признаков на фрейм, получено {}",
                self.name(),
                self.config.input_dim,
                dim
            )));
        }
        let expected_time = self.output_length.apply_checked(time)?;

        let mut h = features.clone();
        for (name, layer) in &self.layers {
            h = layer.forward_t(&h, train)?;
            if trace::enabled() {
                debug!("{}/{}: {:?}", self.name(), name, h.dims());
            }
        }
        let probs = apply_activation(&h, Activation::Softmax)?;

        let out_time = probs.dim(1)?;
        if out_time != expected_time {
            return Err(AcousticError::Model(format!(
                "{}: длина выхода {} не совпадает с отображением длины ({} → {})",
                self.name(),
                out_time,
                time,
                expected_time
            )));
        }
        Ok(probs)
    }
}
