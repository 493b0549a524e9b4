//! Проекция длины последовательности через свёрточные стадии.
//!
//! [`project`] вычисляет длину выхода одной 1-D свёртки (или пулинга) по
//! длине входа и гиперпараметрам стадии. [`OutputLength`] — композиция
//! таких проекций в порядке прохождения данных; именно её хранит каждая
//! построенная модель, чтобы переводить число входных фреймов в число
//! выходных (например, для выравнивания CTC-лосса или декодирования).
//!
//! Рекуррентные, dense, нормализующие и активационные стадии длину не
//! меняют и в композицию не входят.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AcousticError, AcousticResult};

/// Длина последовательности во временных шагах.
///
/// `None` — длина неизвестна (динамическая ось времени). Значение знаковое:
/// `valid`-свёртка на слишком коротком входе даёт ноль или отрицательное
/// число, и оно пробрасывается дальше без ограничения снизу.
pub type SequenceLength = Option<i64>;

/// Режим паддинга свёрточной стадии.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Нулевой паддинг, сохраняющий длину до применения шага.
    #[default]
    Same,
    /// Без паддинга: длина уменьшается на эффективную ширину фильтра минус один.
    Valid,
    /// Паддинг только слева (выход в момент t не зависит от будущих фреймов).
    ///
    /// По длине эквивалентен `Same`, но [`project`] его не принимает:
    /// вызывающий код сам приводит его к `Same` (см. [`ConvGeometry::projection_mode`]).
    Causal,
}

impl PaddingMode {
    /// Строковый идентификатор (совпадает с форматом конфигов).
    pub fn as_str(&self) -> &'static str {
        match self {
            PaddingMode::Same => "same",
            PaddingMode::Valid => "valid",
            PaddingMode::Causal => "causal",
        }
    }
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaddingMode {
    type Err = AcousticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "same" => Ok(PaddingMode::Same),
            "valid" => Ok(PaddingMode::Valid),
            "causal" => Ok(PaddingMode::Causal),
            _ => Err(AcousticError::InvalidBorderMode(s.to_string())),
        }
    }
}

/// Эффективная ширина фильтра с учётом дилатации.
///
/// Дилатация вставляет `dilation - 1` пропусков между соседними отводами:
/// `filter_size + (filter_size - 1) * (dilation - 1)`. Переполнение `i64`
/// возвращает [`AcousticError::Config`].
pub fn effective_filter_size(filter_size: usize, dilation: usize) -> AcousticResult<i64> {
    let overflow = || {
        AcousticError::Config(format!(
            "эффективная ширина фильтра переполняет i64 (filter_size={filter_size}, dilation={dilation})"
        ))
    };
    let filter_size = i64::try_from(filter_size).map_err(|_| overflow())?;
    let dilation = i64::try_from(dilation).map_err(|_| overflow())?;
    (filter_size - 1)
        .checked_mul(dilation - 1)
        .and_then(|gaps| gaps.checked_add(filter_size))
        .ok_or_else(overflow)
}

/// Длина выхода одной 1-D свёрточной стадии.
///
/// Неизвестная длина (`None`) возвращается как есть, без проверки
/// остальных параметров. `border_mode` должен быть `Same` или `Valid`,
/// иначе [`AcousticError::InvalidBorderMode`]. Шаг применяется делением
/// с округлением вверх: неполное окно в конце тоже даёт выходной фрейм.
///
/// Положительность `filter_size` и `dilation` не проверяется. Нулевой шаг
/// возвращает [`AcousticError::Config`].
///
/// # Пример
/// ```
/// use acoustic_core::length::{project, PaddingMode};
///
/// assert_eq!(project(Some(10), 3, PaddingMode::Valid, 2, 1).unwrap(), Some(4));
/// assert_eq!(project(None, 3, PaddingMode::Valid, 2, 1).unwrap(), None);
/// ```
pub fn project(
    input_length: SequenceLength,
    filter_size: usize,
    border_mode: PaddingMode,
    stride: usize,
    dilation: usize,
) -> AcousticResult<SequenceLength> {
    match input_length {
        None => Ok(None),
        Some(length) => {
            project_known(length, filter_size, border_mode, stride, dilation).map(Some)
        }
    }
}

fn project_known(
    input_length: i64,
    filter_size: usize,
    border_mode: PaddingMode,
    stride: usize,
    dilation: usize,
) -> AcousticResult<i64> {
    let pre_stride = match border_mode {
        PaddingMode::Same => input_length,
        PaddingMode::Valid => input_length
            .checked_sub(effective_filter_size(filter_size, dilation)?)
            .and_then(|length| length.checked_add(1))
            .ok_or_else(|| {
                AcousticError::Config(format!(
                    "длина {input_length} после valid-свёртки выходит за пределы i64"
                ))
            })?,
        PaddingMode::Causal => {
            return Err(AcousticError::InvalidBorderMode(border_mode.to_string()));
        }
    };

    if stride == 0 {
        return Err(AcousticError::Config("stride must be at least 1".into()));
    }
    // Шаг больше i64::MAX: |pre_stride| < stride, ceil даёт 1 или 0.
    let Ok(stride) = i64::try_from(stride) else {
        return Ok(i64::from(pre_stride > 0));
    };

    // ceil(pre_stride / stride) без промежуточного сложения: евклидово деление
    // округляет вниз и для отрицательных длин, остаток добавляет неполное окно.
    Ok(pre_stride.div_euclid(stride) + i64::from(pre_stride.rem_euclid(stride) != 0))
}

fn default_dilation() -> usize {
    1
}

/// Геометрия одной свёрточной стадии по оси времени.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvGeometry {
    /// Ширина ядра.
    pub filter_size: usize,
    /// Шаг свёртки.
    pub stride: usize,
    /// Режим паддинга.
    pub padding: PaddingMode,
    /// Дилатация (1 — обычная свёртка).
    #[serde(default = "default_dilation")]
    pub dilation: usize,
}

impl ConvGeometry {
    /// Стадия без дилатации.
    pub fn new(filter_size: usize, padding: PaddingMode, stride: usize) -> Self {
        Self {
            filter_size,
            stride,
            padding,
            dilation: 1,
        }
    }

    /// Задать дилатацию.
    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    /// Эффективная ширина ядра (см. [`effective_filter_size`]).
    pub fn effective_filter_size(&self) -> AcousticResult<i64> {
        effective_filter_size(self.filter_size, self.dilation)
    }

    /// Режим, в котором стадия передаётся в [`project`]: `Causal` → `Same`.
    pub fn projection_mode(&self) -> PaddingMode {
        match self.padding {
            PaddingMode::Causal => PaddingMode::Same,
            mode => mode,
        }
    }

    /// Длина выхода этой стадии.
    pub fn project(&self, input_length: SequenceLength) -> AcousticResult<SequenceLength> {
        project(
            input_length,
            self.filter_size,
            self.projection_mode(),
            self.stride,
            self.dilation,
        )
    }
}

/// Композитное отображение «длина входа → длина выхода» для модели.
///
/// Хранит геометрии свёрточных стадий в порядке прохождения данных.
/// Пустой список — тождественное отображение.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLength {
    stages: Vec<ConvGeometry>,
}

impl OutputLength {
    /// Тождественное отображение (модель без свёрток).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Построить отображение из стадий в порядке прохождения данных.
    pub fn from_stages(stages: impl IntoIterator<Item = ConvGeometry>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// Добавить стадию в конец цепочки.
    pub fn then(mut self, stage: ConvGeometry) -> Self {
        self.stages.push(stage);
        self
    }

    /// Свёрточные стадии.
    pub fn stages(&self) -> &[ConvGeometry] {
        &self.stages
    }

    /// `true`, если отображение не меняет длину.
    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    /// Применить все стадии по порядку: `project_N(... project_1(x))`.
    pub fn apply(&self, input_length: SequenceLength) -> AcousticResult<SequenceLength> {
        match input_length {
            None => Ok(None),
            Some(length) => self.apply_known(length).map(Some),
        }
    }

    /// Длина выхода для известного числа фреймов.
    ///
    /// Неположительный результат означает, что вход короче рецептивного
    /// поля модели; возвращается [`AcousticError::DegenerateLength`].
    pub fn apply_checked(&self, frames: usize) -> AcousticResult<usize> {
        let input = i64::try_from(frames).map_err(|_| {
            AcousticError::Config(format!("{frames} фреймов не помещаются в i64"))
        })?;
        let output = self.apply_known(input)?;
        match usize::try_from(output) {
            Ok(output) if output > 0 => Ok(output),
            _ => Err(AcousticError::DegenerateLength { input, output }),
        }
    }

    /// Рецептивное поле одного выходного фрейма во входных фреймах.
    pub fn receptive_field(&self) -> usize {
        let mut field = 1usize;
        let mut jump = 1usize;
        for stage in &self.stages {
            let extent = stage
                .effective_filter_size()
                .map_or(usize::MAX, |e| usize::try_from(e.max(1)).unwrap_or(usize::MAX));
            field = field.saturating_add((extent - 1).saturating_mul(jump));
            jump = jump.saturating_mul(stage.stride.max(1));
        }
        field
    }

    /// Суммарный коэффициент прореживания по времени.
    pub fn total_stride(&self) -> usize {
        self.stages.iter().map(|s| s.stride.max(1)).product()
    }

    fn apply_known(&self, input_length: i64) -> AcousticResult<i64> {
        self.stages.iter().try_fold(input_length, |length, stage| {
            project_known(
                length,
                stage.filter_size,
                stage.projection_mode(),
                stage.stride,
                stage.dilation,
            )
        })
    }
}
