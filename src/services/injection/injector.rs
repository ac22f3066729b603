//! Injector trait and the shared line-streaming file transform.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, trace};

use super::prompt::PromptType;
use super::types::{InjectionError, InjectorKind, TransformStats};
use crate::record::PairLine;

/// A domain-knowledge injector.
///
/// Construction is cheap. Anything expensive (model handles, service probes,
/// log files) happens in `initialize`, which must succeed before
/// `transform`/`transform_file` are called.
#[async_trait]
pub trait Injector: Send + Sync {
    fn kind(&self) -> InjectorKind;

    /// Human-readable name for CLI progress output.
    fn display_name(&self) -> &str;

    /// Acquire external resources. Calling it again is a no-op.
    async fn initialize(&mut self) -> Result<(), InjectionError> {
        Ok(())
    }

    /// Annotate one serialized record.
    async fn transform(&self, entry: &str) -> Result<String, InjectionError> {
        Ok(entry.to_string())
    }

    /// Transform every pair line of `input` into `output`.
    ///
    /// A non-empty `output` is trusted as a finished cache unless
    /// `overwrite` is set. `prompt_type` only affects column-type injection.
    async fn transform_file(
        &self,
        input: &Path,
        output: &Path,
        overwrite: bool,
        _prompt_type: PromptType,
    ) -> Result<PathBuf, InjectionError> {
        if is_cache_hit(output, overwrite).await {
            debug!("{} cache hit: {}", self.display_name(), output.display());
            return Ok(output.to_path_buf());
        }

        let stats = transform_pairs(self, input, output).await?;
        info!(
            "{}: wrote {} lines to {} ({} dropped)",
            self.display_name(),
            stats.written,
            output.display(),
            stats.dropped
        );
        Ok(output.to_path_buf())
    }
}

/// Whether `output` can be reused: present, non-empty and not forced.
pub async fn is_cache_hit(output: &Path, overwrite: bool) -> bool {
    if overwrite {
        return false;
    }
    match tokio::fs::metadata(output).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Open `input` for line reading. Opened before the output is created so a
/// missing input never leaves an empty output behind.
pub(crate) async fn open_input(input: &Path) -> Result<BufReader<File>, InjectionError> {
    let file = File::open(input).await.map_err(InjectionError::io(input))?;
    Ok(BufReader::new(file))
}

/// Create `output` (and its parent directory), truncating any previous file.
pub(crate) async fn create_output(output: &Path) -> Result<BufWriter<File>, InjectionError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(InjectionError::io(parent))?;
    }
    let file = File::create(output)
        .await
        .map_err(InjectionError::io(output))?;
    Ok(BufWriter::new(file))
}

/// Stream `input` line by line through `injector.transform`.
///
/// Each three-field line becomes `T(left)\tT(right)\tlabel` with the label
/// field copied verbatim (trailing newline included). Other lines are
/// dropped.
pub async fn transform_pairs<I: Injector + ?Sized>(
    injector: &I,
    input: &Path,
    output: &Path,
) -> Result<TransformStats, InjectionError> {
    let mut reader = open_input(input).await?;
    let mut writer = create_output(output).await?;
    let mut stats = TransformStats::default();
    let mut line = String::new();
    let mut line_no = 0usize;

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(InjectionError::io(input))?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let pair = match PairLine::split(&line) {
            Ok(pair) => pair,
            Err(e) => {
                trace!("{}:{}: dropped ({})", input.display(), line_no, e);
                stats.dropped += 1;
                continue;
            }
        };

        let left = injector.transform(pair.left).await?;
        let right = injector.transform(pair.right).await?;
        let out = format!("{}\t{}\t{}", left, right, pair.label);
        writer
            .write_all(out.as_bytes())
            .await
            .map_err(InjectionError::io(output))?;
        stats.written += 1;
    }

    writer.flush().await.map_err(InjectionError::io(output))?;
    Ok(stats)
}
