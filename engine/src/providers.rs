use std::collections::HashMap;
use std::sync::Arc;

use nightshift_orchestrator::{Agent, CliAgent};
use nightshift_runtime::SubprocessRunner;
use nightshift_usage::{ClaudeAdapter, UsageAdapter};

use crate::config::ProviderConfig;

/// Builds one `Agent` per configured provider, each backed by a real
/// subprocess runner. The worker never constructs a `CannedRunner` outside
/// tests.
pub fn build_agents(providers: &HashMap<String, ProviderConfig>) -> HashMap<String, Arc<dyn Agent>> {
    providers
        .iter()
        .map(|(name, cfg)| {
            let agent: Arc<dyn Agent> = Arc::new(CliAgent::new(
                name.clone(),
                cfg.program.clone(),
                cfg.base_args.clone(),
                SubprocessRunner::new(),
            ));
            (name.clone(), agent)
        })
        .collect()
}

/// Builds one `UsageAdapter` per configured provider that names a
/// `transcripts_dir`. Providers without one (Codex/Ollama-style) are left
/// for an operator to wire a dedicated adapter in config once needed;
/// Claude-style transcript scanning is the only shape the worker builds
/// out of the box today.
pub fn build_usage_adapters(providers: &HashMap<String, ProviderConfig>) -> Vec<Arc<dyn UsageAdapter>> {
    providers
        .iter()
        .filter_map(|(name, cfg)| {
            let dir = cfg.transcripts_dir.as_ref()?;
            Some(Arc::new(ClaudeAdapter::new(name.clone(), dir.clone())) as Arc<dyn UsageAdapter>)
        })
        .collect()
}
