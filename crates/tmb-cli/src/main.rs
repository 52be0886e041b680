//! 🚀 tmb-cli — the ignition key for temblor.
//!
//! 🎬 COLD OPEN — INT. A TERMINAL — SECONDS BEFORE THE FIRST FETCH
//!
//! 📦 Everything interesting lives in the library. This binary does four
//! jobs, in order, and then gets out of the way: turn the logs on, figure
//! out which config file (if any) we're working with, load it, and hand the
//! keys to `tmb::run`. A doorman, not a manager. 🦆

use anyhow::{Context, Result};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🔒 Resolve the config-file argument into something figment can trust.
///
/// One optional positional arg; no arg means the ol' reliable `tmb.toml`
/// in the current directory. A path that doesn't exist is NOT an error —
/// it means env-vars-only mode, which is a legitimate way to live (ask
/// anyone deploying to a container). A path we can't even stat, though,
/// is a real problem and gets a real error.
fn resolve_config_path(args: &[String]) -> Result<Option<std::path::PathBuf>> {
    let candidate = std::path::PathBuf::from(
        args.get(1).map(String::as_str).unwrap_or("tmb.toml"),
    );
    let exists = candidate.try_exists().context(format!(
        "💀 Couldn't even check whether '{}' exists. Permissions? A directory that isn't? \
         If you're using a relative path, try an absolute one and remove the guesswork.",
        candidate.display()
    ))?;
    // 💤 absent file → env-only config. The environment has never let anyone down. (citation needed)
    Ok(exists.then_some(candidate))
}

/// 🕵️ Sniff an error chain for the smell of network trouble.
///
/// The catalog client wraps its failures in words we chose ourselves, so
/// we can pattern-match our own vocabulary plus the usual suspects from
/// the transport layer underneath.
fn smells_like_network_trouble(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let text = cause.to_string();
        text.contains("catalog unavailable")
            || text.contains("exceeded its")       // ⏳ our own timeout phrasing
            || text.contains("connection refused")
            || text.contains("Connection refused")
            || text.contains("dns error")
            || text.contains("tcp connect error")
            || text.contains("certificate")        // 🔒 TLS says no
    })
}

/// 🚀 main() — ignition, in four turns of the key.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 logs first. An ingester that fails silently is just a very
    // expensive way to store nothing.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = resolve_config_path(&args)?;
    let app_config = tmb::load_config(config_path.as_deref()).context(
        "💀 The config wouldn't load. Open the TOML, squint at the section names, \
         and check any TMB_* env vars for typos. One of them is lying to you.",
    )?;

    // 🚀 SEND IT. The ground is already moving anyway.
    if let Err(err) = tmb::run(app_config).await {
        error!("💀 error: {err}");
        // -- 🧅 the full chain, outermost to root cause, one tear per layer
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {cause}");
        }

        // 📡 network-shaped failures get a network-shaped hint
        if smells_like_network_trouble(&err) {
            error!(
                "🔧 hint: the catalog endpoint looks unreachable. Check your network and \
                proxy, then the `[catalog] url` in the config. The USGS feed is public and \
                famously up — if it's really down, check the news. Then check your DNS. \
                In that order. ☕"
            );
        }

        // 🗑️ exit with prejudice — the error already said everything twice
        std::process::exit(1);
    }

    // ✅ clean shutdown. Close the terminal tab with a sense of accomplishment.
    Ok(())
}
