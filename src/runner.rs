use std::process::{Command, Stdio};

use crate::config::DownloadSpec;
use crate::error::{Error, Result};
use crate::substitute::{substitute, Groups};

/// Command line for a download's `onDownloadFinish` hook, or `None` when
/// the download has no hook.
///
/// The command template is split on whitespace after substitution and the
/// substituted `onDownloadFinishArgs` are appended verbatim. A blank
/// command template contributes nothing, so the first argument becomes the
/// program.
pub fn build_command(spec: &DownloadSpec, groups: &Groups) -> Result<Option<Vec<String>>> {
    let Some(template) = &spec.on_download_finish else {
        return Ok(None);
    };

    let mut argv: Vec<String> = if template.trim().is_empty() {
        Vec::new()
    } else {
        substitute(template, groups)?
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    };
    for arg in &spec.on_download_finish_args {
        argv.push(substitute(arg, groups)?);
    }
    Ok(Some(argv))
}

/// Start `argv` with inherited stdio in the current directory and return
/// its pid. The child is not waited on.
pub fn launch(argv: &[String]) -> Result<u32> {
    let (program, args) = argv.split_first().ok_or_else(|| Error::LaunchFailure {
        program: String::new(),
        reason: "command line is empty".to_owned(),
    })?;

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| Error::LaunchFailure {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    Ok(child.id())
}
