//! Rolldown plugins installed for every format.

use std::borrow::Cow;
use std::path::Path;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rolldown_common::{ModuleType, ResolvedExternal};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};

use crate::externals::{ExternalPredicate, ExternalSet};

const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// `fs`, `fs/promises`, `node:path` and friends.
pub fn is_node_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let root = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&root)
}

/// Marks external requests so Rolldown leaves them as imports.
///
/// A request is external when the shared predicate matches it, when it names a
/// peer dependency, or when it is a Node.js built-in and built-ins are preferred.
#[derive(Debug, Clone)]
pub struct ExternalsPlugin {
    external: ExternalPredicate,
    peers: ExternalSet,
    prefer_builtins: bool,
}

impl ExternalsPlugin {
    pub fn new(external: ExternalPredicate, peers: &[String], prefer_builtins: bool) -> Self {
        Self {
            external,
            peers: peers.iter().cloned().collect(),
            prefer_builtins,
        }
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        self.external.is_external(specifier)
            || self.peers.is_external(specifier)
            || (self.prefer_builtins && is_node_builtin(specifier))
    }
}

impl Plugin for ExternalsPlugin {
    fn name(&self) -> Cow<'static, str> {
        "libroll-externals".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let external = self.is_external(&specifier);

        async move {
            if !external {
                return Ok(None);
            }
            tracing::trace!("Externalizing {}", specifier);
            Ok(Some(HookResolveIdOutput {
                id: specifier.into(),
                external: Some(ResolvedExternal::Bool(true)),
                ..Default::default()
            }))
        }
    }
}

/// Inlines imported images as data URLs.
#[derive(Debug, Clone, Default)]
pub struct MediaPlugin;

impl MediaPlugin {
    fn mime_type(id: &str) -> Option<&'static str> {
        let ext = Path::new(id).extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "svg" => Some("image/svg+xml"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }
}

impl Plugin for MediaPlugin {
    fn name(&self) -> Cow<'static, str> {
        "libroll-media".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::Load
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();

        async move {
            let Some(mime) = Self::mime_type(&id) else {
                return Ok(None);
            };

            let bytes = tokio::fs::read(&id)
                .await
                .with_context(|| format!("Failed to read image: {}", id))?;
            let code = format!(
                "export default \"data:{};base64,{}\";\n",
                mime,
                STANDARD.encode(bytes)
            );

            Ok(Some(HookLoadOutput {
                code: code.into(),
                module_type: Some(ModuleType::Js),
                ..Default::default()
            }))
        }
    }
}
