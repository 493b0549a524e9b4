//! Текстовая сводка архитектуры модели.
//!
//! Аналог `model.summary()`: по строке на стадию с формой выхода
//! (ось времени символьная — `None`) и числом параметров, плюс итоги и
//! характеристики отображения длины.

use std::fmt;

use serde::Serialize;

use acoustic_core::{ModelConfig, StageConfig};

/// Строка сводки для одной стадии.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub name: String,
    pub kind: String,
    /// Ширина признаков на выходе; форма выхода `(None, None, width)`.
    pub width: usize,
    pub params: usize,
}

/// Сводка модели.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub rows: Vec<SummaryRow>,
    pub total_params: usize,
    /// Параметры, не обучаемые градиентом (running-статистики batch norm).
    pub non_trainable_params: usize,
    /// Рецептивное поле одного выходного фрейма во входных фреймах.
    pub receptive_field: usize,
    /// Суммарное прореживание по времени.
    pub total_stride: usize,
}

impl ModelSummary {
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut rows = Vec::with_capacity(config.stages.len() + 2);
        rows.push(SummaryRow {
            name: "the_input".into(),
            kind: "InputLayer".into(),
            width: config.input_dim,
            params: 0,
        });

        let mut width = config.input_dim;
        let mut non_trainable = 0;
        for stage in &config.stages {
            let out = stage.output_width(width);
            if let StageConfig::BatchNorm(_) = stage {
                non_trainable += 2 * width;
            }
            rows.push(SummaryRow {
                name: stage.name().to_string(),
                kind: stage.kind().to_string(),
                width: out,
                params: parameter_count(stage, width),
            });
            width = out;
        }

        rows.push(SummaryRow {
            name: "softmax".into(),
            kind: "Activation".into(),
            width,
            params: 0,
        });

        let mapping = config.output_length();
        Self {
            name: config.name.clone(),
            total_params: rows.iter().map(|r| r.params).sum(),
            rows,
            non_trainable_params: non_trainable,
            receptive_field: mapping.receptive_field(),
            total_stride: mapping.total_stride(),
        }
    }

    pub fn trainable_params(&self) -> usize {
        self.total_params - self.non_trainable_params
    }
}

/// Количество параметров стадии при ширине входа `input_width`.
pub fn parameter_count(stage: &StageConfig, input_width: usize) -> usize {
    match stage {
        StageConfig::Conv1d(c) => input_width * c.kernel_size * c.filters + c.filters,
        // gamma, beta, running_mean, running_var
        StageConfig::BatchNorm(_) => 4 * input_width,
        StageConfig::Recurrent(c) => {
            let width = c.cell.gates() * c.units;
            let per_direction = input_width * width + width + c.units * width + width;
            per_direction * c.directions()
        }
        StageConfig::Dense(c) => input_width * c.units + c.units,
        StageConfig::Activation(_) => 0,
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "_".repeat(72);
        writeln!(f, "Model: \"{}\"", self.name)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<40}{:<20}{:>12}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(72))?;
        for row in &self.rows {
            let layer = format!("{} ({})", row.name, row.kind);
            let shape = format!("(None, None, {})", row.width);
            writeln!(f, "{layer:<40}{shape:<20}{:>12}", row.params)?;
        }
        writeln!(f, "{}", "=".repeat(72))?;
        writeln!(f, "Total params: {}", self.total_params)?;
        writeln!(f, "Trainable params: {}", self.trainable_params())?;
        writeln!(f, "Non-trainable params: {}", self.non_trainable_params)?;
        writeln!(
            f,
            "Receptive field: {} frames, total stride: {}",
            self.receptive_field, self.total_stride
        )?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acoustic_core::{ConvParams, DEFAULT_OUTPUT_DIM};

    #[test]
    fn test_cnn_rnn_counts() {
        let config = ModelConfig::cnn_rnn(161, ConvParams::default(), 200, DEFAULT_OUTPUT_DIM);
        let summary = ModelSummary::from_config(&config);

        let params: Vec<usize> = summary.rows.iter().map(|r| r.params).collect();
        assert_eq!(
            params,
            vec![
                0,
                161 * 11 * 200 + 200,
                4 * 200,
                3 * (200 * 200 + 200 + 200 * 200 + 200),
                4 * 200,
                200 * 29 + 29,
                0,
            ]
        );
        assert_eq!(summary.total_params, params.iter().sum::<usize>());
        assert_eq!(summary.non_trainable_params, 2 * 200 * 2);
        assert_eq!(summary.receptive_field, 11);
        assert_eq!(summary.total_stride, 2);
    }

    #[test]
    fn test_display_contains_every_stage() {
        let config = ModelConfig::bidirectional_rnn(13, 32, DEFAULT_OUTPUT_DIM);
        let text = ModelSummary::from_config(&config).to_string();
        assert!(text.contains("Model: \"bidirectional_rnn\""));
        assert!(text.contains("bi_rnn (Bidirectional(GRU))"));
        assert!(text.contains("(None, None, 64)"));
        assert!(text.contains("softmax (Activation)"));
    }
}
