//! One full fetch-and-generate run.
use std::path::{Component, Path, PathBuf};

use futures::future::join_all;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::UnboundedSender;

use crate::catalog::Catalog;
use crate::config::{Config, PostProcessHook};
use crate::context::{GenerationContext, RunScope};
use crate::error::{Error, Result};
use crate::sections::{self, Progress, Reporter, SectionKind, resources::POST_PROCESS_IDENT};

const HEADER: &str = "// Generated by windmill-ts. Do not edit by hand.";

const LAZY_OBJECT: &str = r#"const lazyObject = <T,>(fn: () => T) => {
  let instance: T | null = null;
  return new Proxy({}, {
    get(_target, prop) {
      if (instance == null) {
        instance = fn();
      }

      return (instance as any)[prop];
    }
  }) as T;
};
"#;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub struct GenerateOptions<'a> {
    pub config: &'a Config,
    /// Receives every section state change, if set.
    pub progress: Option<UnboundedSender<Progress>>,
}

#[derive(Debug)]
pub enum SectionOutcome {
    Generated,
    Disabled,
    Failed(Error),
}

#[derive(Debug)]
pub struct GenerationReport {
    /// One entry per section, in output order.
    pub sections: Vec<(SectionKind, SectionOutcome)>,
}

impl GenerationReport {
    pub fn failures(&self) -> impl Iterator<Item = (SectionKind, &Error)> {
        self.sections.iter().filter_map(|(kind, outcome)| match outcome {
            SectionOutcome::Failed(e) => Some((*kind, e)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn outcome(&self, kind: SectionKind) -> Option<&SectionOutcome> {
        self.sections.iter().find(|(k, _)| *k == kind).map(|(_, outcome)| outcome)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Generate the client into `output`.
///
/// The resource type catalog is fetched first; if that fails nothing is
/// written. Enabled sections then run concurrently, each into its own buffer,
/// and are appended in a fixed order. A failed section contributes nothing and
/// is recorded in the report.
pub async fn generate<W>(
    output: &mut W,
    output_root: &Path,
    options: GenerateOptions<'_>,
    catalog: &dyn Catalog,
) -> Result<GenerationReport>
where
    W: AsyncWrite + Unpin + Send,
{
    let config = options.config;
    let resource_types = catalog.list_resource_types().await?;
    tracing::info!(count = resource_types.len(), "resource types fetched");

    let scope = RunScope::new(catalog, resource_types, config, output_root.to_path_buf());
    let mut root = GenerationContext::root(&scope, output);
    root.write(&preamble(config, output_root)).await?;

    let enabled = SectionKind::ORDER.into_iter().filter(|kind| is_enabled(config, *kind)).collect::<Vec<_>>();
    let runs = enabled.iter().map(|&kind| {
        let mut child = root.child();
        let reporter = Reporter::new(kind, options.progress.clone());
        async move {
            let result = sections::run(kind, &mut child, &reporter).await;
            result.map(|()| child.into_buffer())
        }
    });
    let mut results = enabled.iter().copied().zip(join_all(runs).await).collect::<Vec<_>>();

    let mut report = GenerationReport { sections: Vec::with_capacity(SectionKind::ORDER.len()) };
    for kind in SectionKind::ORDER {
        let outcome = match results.iter().position(|(k, _)| *k == kind) {
            None => SectionOutcome::Disabled,
            Some(index) => match results.remove(index).1 {
                Ok(buffer) => {
                    root.append(&buffer).await?;
                    SectionOutcome::Generated
                }
                Err(e) => SectionOutcome::Failed(e),
            },
        };
        report.sections.push((kind, outcome));
    }

    root.finish().await?;
    Ok(report)
}

fn is_enabled(config: &Config, kind: SectionKind) -> bool {
    match kind {
        SectionKind::Resources => true,
        SectionKind::Scripts => config.scripts.enabled,
        SectionKind::Flows => config.flows.enabled,
    }
}

fn preamble(config: &Config, output_root: &Path) -> String {
    let mut lines = vec![
        HEADER.to_string(),
        "import { z } from 'zod';".to_string(),
        "import * as wmill from 'windmill-client';".to_string(),
    ];
    if let Some(hook) = &config.resources.post_process {
        lines.push(hook_import(hook, output_root));
    }
    lines.push(String::new());
    lines.push(LAZY_OBJECT.to_string());
    lines.join("\n")
}

fn hook_import(hook: &PostProcessHook, output_root: &Path) -> String {
    let specifier = if hook.is_local() { local_specifier(output_root, Path::new(&hook.module)) } else { hook.module.clone() };
    let specifier = crate::codegen::quote(&specifier);
    if hook.export == "default" {
        format!("import {POST_PROCESS_IDENT} from {specifier};")
    } else {
        format!("import {{ {} as {POST_PROCESS_IDENT} }} from {specifier};", hook.export)
    }
}

/// An ESM import specifier for `module` as seen from files in `from_dir`.
fn local_specifier(from_dir: &Path, module: &Path) -> String {
    let relative = relative_path(from_dir, module);
    let mut specifier = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    for (ts, js) in [(".mts", ".mjs"), (".cts", ".cjs"), (".ts", ".js")] {
        if let Some(stem) = specifier.strip_suffix(ts) {
            specifier = format!("{stem}{js}");
            break;
        }
    }
    if specifier.starts_with("../") {
        specifier
    } else {
        format!("./{specifier}")
    }
}

fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from = from_dir.components().filter(|c| *c != Component::CurDir).collect::<Vec<_>>();
    let to = to.components().filter(|c| *c != Component::CurDir).collect::<Vec<_>>();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component);
    }
    out
}
