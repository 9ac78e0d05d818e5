// ⚙️ Migration Configuration
// Every constant that encodes the target store's state lives here, not in code.
//
// The reserved counter threshold in particular mirrors how many counters the
// live database had when the migration was written. It drifts, so it is config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// PRICE RULES
// ============================================================================

/// Ticket prices derived from the show name (case-insensitive substring rules)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRules {
    /// Name contains both "combo" and "wax"
    pub combo_wax: i64,

    /// Name contains "combo"
    pub combo: i64,

    /// Name contains "horror"
    pub horror: i64,

    /// Everything else
    pub default: i64,
}

impl Default for PriceRules {
    fn default() -> Self {
        PriceRules {
            combo_wax: 80,
            combo: 100,
            horror: 60,
            default: 60,
        }
    }
}

// ============================================================================
// MIGRATION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Counters with an id below this already exist in the target store.
    /// Also the first id handed out when the store reports no counters.
    pub reserved_counter_threshold: i64,

    /// Fallback counter for rows that name no counter
    pub default_counter_name: String,

    /// Register the fallback counter even when no row names it
    pub always_emit_default_counter: bool,

    /// Show name used when a row has none
    pub default_show_name: String,

    /// Category used when a row has none
    pub default_category: String,

    /// Label written to tickets.dropdown_name
    pub ticket_display_label: String,

    /// Placeholder bcrypt hash given to every new counter
    pub counter_password_hash: String,

    /// Role given to every new counter
    pub counter_role: String,

    pub prices: PriceRules,

    /// Glyphs stripped from currency cells before parsing
    pub currency_glyphs: Vec<String>,

    /// chrono format strings tried in order against text dates
    pub date_formats: Vec<String>,

    /// Log progress every N rows (0 disables)
    pub progress_interval: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            reserved_counter_threshold: 14,
            default_counter_name: "madhu".to_string(),
            always_emit_default_counter: true,
            default_show_name: "wax museum".to_string(),
            default_category: "Adult".to_string(),
            ticket_display_label: "Standard".to_string(),
            counter_password_hash: "$2a$10$jp2/25nQ/ARPoiWt6N2m7e.vpNA7N.J2UDbQ0Mv57vm44jPVNT25S"
                .to_string(),
            counter_role: "user".to_string(),
            prices: PriceRules::default(),
            currency_glyphs: vec!["₹".to_string(), "Rs.".to_string(), "INR".to_string()],
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%d-%m-%Y".to_string(),
                "%m/%d/%Y".to_string(),
                "%Y/%m/%d".to_string(),
            ],
            progress_interval: 100,
        }
    }
}

impl MigrationConfig {
    /// Load config from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: MigrationConfig = serde_json::from_str(raw)?;
        Ok(config)
    }

    /// Sentinel counter name in its normalized (lower-cased, trimmed) form
    pub fn default_counter_key(&self) -> String {
        self.default_counter_name.trim().to_lowercase()
    }
}

// ============================================================================
// TESTS
// ============================================================================
