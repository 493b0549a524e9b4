//! Вспомогательные функции для отладочного вывода.

use std::sync::OnceLock;

/// Возвращает `true`, если включена трассировка форм тензоров по слоям.
///
/// Управляется переменной окружения `RUSTACOUSTIC_DEBUG` (любое непустое значение).
pub fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("RUSTACOUSTIC_DEBUG").is_some_and(|v| !v.is_empty()))
}
