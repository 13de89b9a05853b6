//! Scores browser signals reported by the client for signs of automation.

use serde::{Deserialize, Serialize};

const BOT_UA_PATTERNS: [&str; 6] = ["bot", "crawl", "spider", "headless", "phantom", "selenium"];
pub const BOT_THRESHOLD: u32 = 50;

/// Signals collected in the browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSignals {
    pub user_agent: String,
    pub webdriver: bool,
    pub plugin_count: u32,
    pub language_count: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Whether a `window.chrome` object exists at all.
    pub has_chrome_object: bool,
    pub has_chrome_runtime: bool,
    pub load_time_ms: f64,
    pub console_errors: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotDetectionResult {
    pub is_bot: bool,
    pub score: u32,
    pub confidence: u32,
    pub reasons: Vec<String>,
}

pub fn detect(signals: &ClientSignals) -> BotDetectionResult {
    let mut score = 0;
    let mut reasons = Vec::new();
    let mut flag = |hit: bool, points: u32, reason: &str| {
        if hit {
            score += points;
            reasons.push(reason.to_string());
        }
    };

    let ua = signals.user_agent.to_lowercase();
    flag(
        BOT_UA_PATTERNS.iter().any(|p| ua.contains(p)),
        40,
        "User agent sospechoso",
    );
    flag(signals.webdriver, 50, "WebDriver detectado");
    flag(signals.plugin_count == 0, 20, "Sin plugins de navegador");
    flag(signals.language_count == 0, 20, "Sin idiomas configurados");
    flag(
        signals.screen_width == 0 || signals.screen_height == 0,
        30,
        "Dimensiones de pantalla inválidas",
    );
    flag(
        signals.has_chrome_object && !signals.has_chrome_runtime,
        15,
        "Chrome runtime ausente",
    );
    flag(
        signals.load_time_ms < 100.0,
        25,
        "Tiempo de carga extremadamente rápido",
    );
    flag(
        signals.console_errors > 0,
        10,
        "Errores de JavaScript detectados",
    );

    BotDetectionResult {
        is_bot: score >= BOT_THRESHOLD,
        score,
        confidence: score.min(100),
        reasons,
    }
}
