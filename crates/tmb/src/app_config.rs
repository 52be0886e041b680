//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the
//! fridge. In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Every section has defaults, so an empty config file (or no file at all)
//! boots a working ingester pointed at the real catalog with a file-backed
//! store. Zero-to-quakes in one command. The defaults are opinions, and
//! they are OUR opinions, and they are in the doc comments where opinions go.

use anyhow::Context;
use serde::Deserialize;
// 🔧 To load the configuration, so I don't have to manually parse
// environment variables or files. Bleh. Like doing taxes but for bytes.
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::Path;
// 🚀 tracing::info — because println! in production is a cry for help.
use tracing::info;

use crate::catalog::CatalogConfig;
use crate::query::QueryConfig;
use crate::scheduler::SchedulerConfig;
use crate::store::FileStoreConfig;

/// 🗃️ Which store backend to boot, with its knobs. Externally tagged, so
/// TOML reads `store = "InMemory"` or `[store.File]` with paths under it.
#[derive(Debug, Deserialize, Clone)]
pub enum StoreConfig {
    /// 🧪 RAM only. Forgets everything on restart, checkpoint included.
    /// Great for tests and demos, career-limiting in production.
    InMemory,
    /// 📂 Journal-backed. The one you actually want.
    File(FileStoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        // 📂 durability by default — amnesia should be something you opt into
        StoreConfig::File(FileStoreConfig::default())
    }
}

/// 🧵 Process-level plumbing knobs that belong to no single module.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📤 Capacity of the cycle-summary queue between scheduler and reporter.
    /// The scheduler blocks when it's full, which at default cycle intervals
    /// would require the reporter to nap for about an hour. It won't.
    #[serde(default = "default_summary_queue_capacity")]
    pub summary_queue_capacity: usize,
}

fn default_summary_queue_capacity() -> usize {
    16
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { summary_queue_capacity: default_summary_queue_capacity() }
    }
}

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// 🎯 Contains everything the app needs to know about itself,
/// which is more self-awareness than most apps achieve in their lifetime.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 📡 Where the quakes come from, and how long we'll wait for them.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// ⏰ How often to ingest and how hard to retry.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 🔍 Page-size limits for the query surface.
    #[serde(default)]
    pub query: QueryConfig,
    /// 🗃️ Where the quakes end up.
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (TMB_*) with an optional TOML file.
/// Notice: no `.only(...)` restriction — ALL TMB_ vars are fair game.
/// We don't gatekeep env vars here. This is a safe space. 🦆
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - If `config_file_name` is None  → env vars only. No file. No assumptions.
///   - If `config_file_name` is Some  → env vars + TOML file, merged. TOML wins on conflicts.
///   Defaulting to some uninvited config path is like assuming everyone wants
///   pineapple on their pizza. The CLI decides which file to pass; we just load.
///
/// 💀 Returns an error if config is unparseable. Which it will be. Check the
/// error message though — it's contextual, informative, and written with love.
/// Or despair. Hard to tell at 3am.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    // 🚀 Log what we're loading — because silent failures are the villain
    // origin story of every 3am incident.
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    // 🏗️ Start with env vars as the base layer — like a good sourdough starter.
    // ALL TMB_* vars accepted. No ID required. No velvet rope. Everyone's invited.
    let config = Figment::new().merge(Env::prefixed("TMB_"));

    // 🎯 Conditionally layer in TOML only if a file was actually provided.
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    // 💬 Build a context message that will actually TELL you what went wrong.
    // None of that "error: error" energy. This isn't a Kafka novel. (The author, not the queue.)
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (TMB_*). \
             The file exists in our hearts, but apparently not on disk. Or its TOML has opinions.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (TMB_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    // ✅ or 💀, there is no try — actually there is, it's called `?`
    config.extract().context(context_msg)
}
