//! `moorage generate` command

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::GenerateArgs;
use moorage::ops::{generate, GenerateOptions, InstallMode, ShellReporter};
use moorage::util::{GlobalContext, Shell, SystemRunner};

pub fn execute(args: GenerateArgs, config: Option<&Path>, shell: Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let config_path = ctx.config_path(config)?;
    tracing::debug!("using {}", config_path.display());

    let options = GenerateOptions {
        mode: InstallMode::from_lazy_flag(args.lazy),
    };
    let reporter = ShellReporter::new(Arc::clone(&shell));

    let summary = generate(&config_path, options, &SystemRunner, &reporter).map_err(|e| {
        let stage = reporter.failed_stage().or_else(|| e.stage());
        let err = anyhow::Error::new(e);
        match stage {
            Some(stage) => err.context(stage.to_string()),
            None => err,
        }
    })?;

    if shell.is_verbose() {
        shell.note(format!("wrote {}", summary.root_manifest.display()));
        if let Some(lockfile) = &summary.lockfile {
            shell.note(format!("wrote {}", lockfile.display()));
        }
    }

    Ok(())
}
