//! Invocation of the external HLA caller, one run per sample

use crate::{HlamaError, HlamaResult, Sample};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default command line, OptiType style
pub const DEFAULT_CALLER_CMD: &str =
    "OptiTypePipeline.py --input {reads} --{seqtype} --outdir {outdir} --prefix {prefix}";

/// Default result file, relative to the caller's output directory
pub const DEFAULT_CALLER_RESULT: &str = "{prefix}_result.tsv";

/// Produces raw genotype-call text for a sample
pub trait HlaCaller: Sync {
    /// Type `sample`, writing into `out_dir`, and return the path of the raw
    /// result file.
    fn call(&self, sample: &Sample, out_dir: &Path) -> HlamaResult<PathBuf>;
}

/// Runs an external program built from a command template.
///
/// Placeholders: `{reads}` (expands to one argument per reads file),
/// `{outdir}`, `{prefix}` (`<donor>_<role>`) and `{seqtype}` (`rna` for RNA
/// roles, `dna` otherwise).
#[derive(Debug, Clone)]
pub struct CommandCaller {
    program: String,
    args: Vec<String>,
    result_template: String,
    reuse_existing: bool,
}

impl CommandCaller {
    pub fn from_template(command: &str, result_template: &str) -> HlamaResult<Self> {
        let mut words = command.split_whitespace().map(|w| w.to_string());
        let program = words
            .next()
            .ok_or_else(|| HlamaError::InvalidConfig("caller command is empty".to_string()))?;

        if result_template.trim().is_empty() {
            return Err(HlamaError::InvalidConfig(
                "caller result path is empty".to_string(),
            ));
        }

        Ok(Self {
            program,
            args: words.collect(),
            result_template: result_template.trim().to_string(),
            reuse_existing: false,
        })
    }

    /// Use a result file left by an earlier run instead of calling again
    pub fn reuse_existing(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders substituted for `sample`
    pub fn expand_args(&self, sample: &Sample, out_dir: &Path) -> Vec<String> {
        let mut expanded = Vec::with_capacity(self.args.len() + sample.reads.len());
        for arg in &self.args {
            if arg == "{reads}" {
                expanded.extend(sample.reads.iter().map(|r| r.to_string_lossy().to_string()));
            } else {
                expanded.push(substitute(arg, sample, out_dir));
            }
        }
        expanded
    }

    pub fn result_path(&self, sample: &Sample, out_dir: &Path) -> PathBuf {
        out_dir.join(substitute(&self.result_template, sample, out_dir))
    }
}

fn substitute(template: &str, sample: &Sample, out_dir: &Path) -> String {
    let reads = sample
        .reads
        .iter()
        .map(|r| r.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let seqtype = if sample.role.is_rna() { "rna" } else { "dna" };

    template
        .replace("{reads}", &reads)
        .replace("{outdir}", &out_dir.to_string_lossy())
        .replace("{prefix}", &sample.name())
        .replace("{seqtype}", seqtype)
}

impl HlaCaller for CommandCaller {
    fn call(&self, sample: &Sample, out_dir: &Path) -> HlamaResult<PathBuf> {
        let result = self.result_path(sample, out_dir);

        if self.reuse_existing && result.is_file() {
            log::info!("Reusing caller result {:?} for {}", result, sample.name());
            return Ok(result);
        }

        for reads in &sample.reads {
            if !reads.exists() {
                return Err(HlamaError::CallerInvocation(format!(
                    "reads file {:?} not found",
                    reads
                )));
            }
        }

        std::fs::create_dir_all(out_dir)?;
        let args = self.expand_args(sample, out_dir);
        log::info!("Running {} {} for {}", self.program, args.join(" "), sample.name());

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                HlamaError::CallerInvocation(format!("failed to start {}: {}", self.program, e))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            log::debug!("[{}] {}", sample.name(), line);
        }

        if !output.status.success() {
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(HlamaError::CallerInvocation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                last.trim()
            )));
        }

        if !result.is_file() {
            return Err(HlamaError::CallerInvocation(format!(
                "{} produced no result file {:?}",
                self.program, result
            )));
        }

        Ok(result)
    }
}

/// Run the caller for every `(sample, out_dir)` job on a pool of
/// `num_threads` threads. Results are returned in job order; a failed run
/// only affects its own entry.
pub fn run_callers<C: HlaCaller + ?Sized>(
    caller: &C,
    jobs: &[(Sample, PathBuf)],
    num_threads: usize,
) -> HlamaResult<Vec<HlamaResult<PathBuf>>> {
    if num_threads == 0 {
        return Err(HlamaError::InvalidConfig(
            "number of processes must be at least 1".to_string(),
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| HlamaError::InvalidConfig(format!("cannot build thread pool: {}", e)))?;

    let results: Vec<HlamaResult<PathBuf>> = pool.install(|| {
        jobs.par_iter()
            .map(|(sample, out_dir)| {
                let result = caller.call(sample, out_dir);
                if let Err(e) = &result {
                    log::warn!("Typing {} failed: {}", sample.name(), e);
                }
                result
            })
            .collect()
    });

    Ok(results)
}
