// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

//! Pipeline executor
//!
//! Runs the stage list in order against one run environment. The first
//! fatal failure stops the sequence; tolerated failures are logged and
//! skipped over. Post-run hooks fire whatever the outcome.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::definition::{FailurePolicy, Stage, StageKind};
use super::environment::RunEnvironment;
use super::metadata::{split_reference, BuildIdentity, CommitRef, ImageRefs};
use crate::errors::{TagflowError, TagflowResult};
use crate::params::Parameters;
use crate::secrets::CredentialResolver;
use crate::tools::{
    is_checkout, CommandRunner, CommandSpec, ContainerEngine, GitClient, RegistryProbe,
    FETCH_HEAD,
};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Echo every command before running it
    pub verbose: bool,
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    /// Guard was false
    Skipped,
    /// Failed, but the stage's failures don't count
    Tolerated,
    /// An earlier stage failed
    NotRun,
}

/// Per-stage outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    pub status: StageStatus,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Terminal status of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure {
        stage: StageKind,
        exit_code: i32,
        message: String,
    },
    Aborted,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of executing a pipeline
#[derive(Debug)]
pub struct PipelineResult {
    pub build_number: u64,
    pub display_label: String,
    /// Commit tag (`nogit` when unavailable); `None` if metadata never ran
    pub commit: Option<String>,
    pub image_refs: Option<ImageRefs>,
    pub stages: Vec<StageReport>,
    pub status: RunStatus,
    pub duration: Duration,
    /// Commands and their exit codes, in order
    pub log: Vec<String>,
    /// The fatal error, if any
    pub error: Option<TagflowError>,
}

impl PipelineResult {
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    pub fn report(&self, stage: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }
}

/// A stage as it would run for a given parameter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: StageKind,
    pub runs: bool,
    pub max_attempts: u32,
    pub tolerated: bool,
}

/// Commands and outcomes of one run. Never holds secrets: commands are
/// recorded through their redacting `Display`.
#[derive(Debug, Default)]
struct RunLog {
    lines: Mutex<Vec<String>>,
}

impl RunLog {
    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.into_inner().unwrap_or_default()
    }
}

/// Everything a stage body can see. Read-only; the environment is only
/// mutated by the executor between stages.
#[derive(Clone, Copy)]
struct StageContext<'a> {
    stage: StageKind,
    params: &'a Parameters,
    env: &'a RunEnvironment,
    dir: &'a Path,
    log: &'a RunLog,
    verbose: bool,
}

/// What a successful stage hands back to the executor
enum StageEffect {
    None,
    Metadata(BuildIdentity, ImageRefs),
}

/// Pipeline executor
pub struct PipelineExecutor {
    runner: Arc<dyn CommandRunner>,
    credentials: Box<dyn CredentialResolver>,
    stages: Vec<Stage>,
}

impl PipelineExecutor {
    /// Create an executor with the standard stage list
    pub fn new(runner: Arc<dyn CommandRunner>, credentials: Box<dyn CredentialResolver>) -> Self {
        Self {
            runner,
            credentials,
            stages: Stage::standard(),
        }
    }

    /// Replace the stage list
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Guards evaluated against `params`, nothing executed
    pub fn plan(&self, params: &Parameters) -> Vec<PlannedStage> {
        self.stages
            .iter()
            .map(|stage| PlannedStage {
                stage: stage.kind,
                runs: stage.guard.allows(params),
                max_attempts: stage.max_attempts(),
                tolerated: stage.failure == FailurePolicy::Tolerated,
            })
            .collect()
    }

    /// Look up the commit and derive the references, without touching a run
    pub async fn preview(
        &self,
        params: &Parameters,
        build_number: u64,
        working_dir: &Path,
    ) -> (BuildIdentity, ImageRefs) {
        let git = GitClient::new(&params.tools.git);
        let commit = CommitRef::from_lookup(git.short_hash(self.runner.as_ref(), working_dir).await);
        let identity = BuildIdentity::new(build_number, commit);
        let refs = ImageRefs::compute(&params.registry_host, &params.image_name, &identity);
        (identity, refs)
    }

    /// Execute a pipeline
    pub async fn execute(
        &self,
        params: &Parameters,
        build_number: u64,
        working_dir: &Path,
        options: &ExecutionOptions,
    ) -> PipelineResult {
        let start = Instant::now();
        let log = RunLog::default();
        let mut env = RunEnvironment::new(params, build_number);
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut failure: Option<(StageKind, TagflowError)> = None;

        self.print_execution_plan(params, build_number);

        for stage in &self.stages {
            if failure.is_some() {
                reports.push(report(stage.kind, StageStatus::NotRun, 0, Duration::ZERO));
                continue;
            }

            if !stage.guard.allows(params) {
                println!("  {} {} {}", "○".dimmed(), stage.name().dimmed(), "(skipped)".dimmed());
                log.push(format!("[{}] skipped", stage.name()));
                reports.push(report(stage.kind, StageStatus::Skipped, 0, Duration::ZERO));
                continue;
            }

            println!("  {} {}", "→".blue(), stage.name());
            let stage_start = Instant::now();

            let ctx = StageContext {
                stage: stage.kind,
                params,
                env: &env,
                dir: working_dir,
                log: &log,
                verbose: options.verbose,
            };

            let policy = stage.retry.unwrap_or_default();
            let (result, attempts) = policy
                .run(stage.name(), move |_| self.execute_stage(ctx))
                .await;
            let elapsed = stage_start.elapsed();

            let result = result.and_then(|effect| match effect {
                StageEffect::Metadata(identity, refs) => env.record_metadata(identity, refs),
                StageEffect::None => Ok(()),
            });

            match result {
                Ok(()) => {
                    println!(
                        "  {} {} ({:.2}s)",
                        "✓".green(),
                        stage.name().bold(),
                        elapsed.as_secs_f64()
                    );
                    reports.push(report(stage.kind, StageStatus::Succeeded, attempts, elapsed));
                }
                Err(e) if stage.failure == FailurePolicy::Tolerated => {
                    warn!("{} failed, continuing: {}", stage.name(), e);
                    println!(
                        "  {} {} {}",
                        "⚠".yellow(),
                        stage.name().bold(),
                        "(failed, ignored)".dimmed()
                    );
                    log.push(format!("[{}] failure ignored: {}", stage.name(), e));
                    reports.push(report(stage.kind, StageStatus::Tolerated, attempts, elapsed));
                }
                Err(e) => {
                    println!("  {} {} failed", "✗".red(), stage.name().bold());
                    log.push(format!("[{}] failed: {}", stage.name(), e));
                    reports.push(report(stage.kind, StageStatus::Failed, attempts, elapsed));
                    failure = Some((stage.kind, e));
                }
            }
        }

        let status = match failure {
            Some((stage, ref e)) => RunStatus::Failure {
                stage,
                exit_code: e.exit_code(),
                message: e.to_string(),
            },
            None => RunStatus::Success,
        };

        self.post_run(params, &env, &status, working_dir, &log).await;

        let duration = start.elapsed();

        println!();
        if status.is_success() {
            println!(
                "{}",
                format!("Pipeline completed successfully in {:.2}s", duration.as_secs_f64()).green()
            );
        } else {
            println!(
                "{}",
                format!("Pipeline failed after {:.2}s", duration.as_secs_f64()).red()
            );
        }

        PipelineResult {
            build_number,
            display_label: env.display_label(),
            commit: env.identity().map(|id| id.commit.tag().to_string()),
            image_refs: env.image_refs().ok().cloned(),
            stages: reports,
            status,
            duration,
            log: log.into_lines(),
            error: failure.map(|(_, e)| e),
        }
    }

    /// Body of a single stage
    async fn execute_stage(&self, ctx: StageContext<'_>) -> TagflowResult<StageEffect> {
        let params = ctx.params;
        let engine = ContainerEngine::new(&params.tools.engine);
        let git = GitClient::new(&params.tools.git);

        match ctx.stage {
            StageKind::Checkout => {
                let checkout = &params.checkout;
                if checkout.is_noop() {
                    ctx.log.push("[Checkout] using workspace as-is".to_string());
                    return Ok(StageEffect::None);
                }

                let revision = checkout.revision.as_deref();
                let mut commands = Vec::new();
                match checkout.repository {
                    // Populated in place; the directory already holds tagflow state
                    Some(ref repository) if !is_checkout(ctx.dir) => {
                        commands.push(git.init_command(ctx.dir));
                        commands.push(git.add_remote_command(repository, ctx.dir));
                        commands.push(git.fetch_revision_command(revision, ctx.dir));
                        commands.push(git.checkout_command(FETCH_HEAD, ctx.dir));
                    }
                    Some(_) => {
                        if let Some(revision) = revision {
                            commands.push(git.fetch_command(ctx.dir));
                            commands.push(git.checkout_command(revision, ctx.dir));
                        }
                    }
                    None => {
                        if let Some(revision) = revision {
                            commands.push(git.checkout_command(revision, ctx.dir));
                        }
                    }
                }

                self.run_strict(ctx, commands).await?;
            }

            StageKind::Preparation => {
                let listing = CommandSpec::new("ls").arg("-la").current_dir(ctx.dir);
                self.run_strict(ctx, vec![engine.version_command(ctx.dir), listing])
                    .await?;
            }

            StageKind::ComputeMetadata => {
                let hash = git.short_hash(self.runner.as_ref(), ctx.dir).await;
                let commit = CommitRef::from_lookup(hash);
                if !commit.is_available() {
                    warn!("No version control metadata; commit tag falls back to '{}'", commit);
                }

                let identity = BuildIdentity::new(ctx.env.build_number(), commit);
                let refs = ImageRefs::compute(&params.registry_host, &params.image_name, &identity);

                println!("    {} {}", "Build:".dimmed(), identity.display_label());
                for reference in refs.all() {
                    println!("    {} {}", "Image:".dimmed(), reference);
                }
                ctx.log.push(format!("[Compute Metadata] {}", identity.display_label()));

                return Ok(StageEffect::Metadata(identity, refs));
            }

            StageKind::RegistryLogin => {
                let credentials = self.credentials.resolve(&params.registry_credentials_id)?;
                let login = engine.login_command(&params.registry_host, &credentials, ctx.dir);
                self.run_strict(ctx, vec![login]).await?;
            }

            StageKind::BuildImage => {
                let refs = ctx.env.image_refs()?;
                let build =
                    engine.build_command(&params.dockerfile, &params.build_context, refs, ctx.dir);
                self.run_strict(ctx, vec![build]).await?;
            }

            StageKind::PushImage => {
                let refs = ctx.env.image_refs()?;
                let pushes = refs
                    .push_order()
                    .iter()
                    .map(|reference| engine.push_command(reference, ctx.dir))
                    .collect();
                self.run_strict(ctx, pushes).await?;
            }

            StageKind::VerifyRegistry => {
                let (repository, _) = split_reference(&ctx.env.image_refs()?.latest);
                let probe = RegistryProbe::new(&params.tools.curl);
                let commands = vec![
                    probe.discovery_command(&params.registry_host, ctx.dir),
                    engine.images_command(Some(repository), ctx.dir),
                ];
                self.run_best_effort(ctx, commands).await?;
            }
        }

        Ok(StageEffect::None)
    }

    /// Run one command with the run environment exported
    async fn run_command(&self, ctx: StageContext<'_>, spec: CommandSpec) -> TagflowResult<()> {
        let spec = spec.envs(ctx.env.vars());
        if ctx.verbose {
            println!("    {}", format!("$ {}", spec).dimmed());
        }

        match self.runner.run(&spec).await {
            Ok(output) => {
                ctx.log.push(format!(
                    "[{}] $ {} (exit {})",
                    ctx.stage.name(),
                    spec,
                    output.exit_code
                ));
                if output.success() {
                    Ok(())
                } else {
                    debug!(stderr = %output.stderr.trim(), "command failed");
                    Err(TagflowError::stage_failed(ctx.stage.name(), output.exit_code))
                }
            }
            Err(e) => {
                ctx.log.push(format!("[{}] $ {} ({})", ctx.stage.name(), spec, e));
                Err(e)
            }
        }
    }

    /// Run commands in order; the first failure aborts the rest
    async fn run_strict(&self, ctx: StageContext<'_>, commands: Vec<CommandSpec>) -> TagflowResult<()> {
        for spec in commands {
            self.run_command(ctx, spec).await?;
        }
        Ok(())
    }

    /// Run every command; report the first failure at the end
    async fn run_best_effort(
        &self,
        ctx: StageContext<'_>,
        commands: Vec<CommandSpec>,
    ) -> TagflowResult<()> {
        let mut first_error = None;
        for spec in commands {
            if let Err(e) = self.run_command(ctx, spec).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Post-run hooks
    async fn post_run(
        &self,
        params: &Parameters,
        env: &RunEnvironment,
        status: &RunStatus,
        working_dir: &Path,
        log: &RunLog,
    ) {
        println!();
        match status {
            RunStatus::Success => {
                if let Ok(refs) = env.image_refs() {
                    println!("{} {}", "Pushed".green().bold(), refs.build);
                }
            }
            _ => eprintln!("{}", "Build or push failed".red().bold()),
        }

        let engine = ContainerEngine::new(&params.tools.engine);
        let spec = engine.images_command(None, working_dir).envs(env.vars());
        match self.runner.run(&spec).await {
            Ok(output) => log.push(format!("[post] $ {} (exit {})", spec, output.exit_code)),
            Err(e) => {
                warn!("Listing local images failed: {}", e);
                log.push(format!("[post] $ {} ({})", spec, e));
            }
        }
    }

    /// Print the execution plan
    fn print_execution_plan(&self, params: &Parameters, build_number: u64) {
        let plan = self.plan(params);

        println!();
        println!("{}: {}", "Pipeline".bold(), params.repository());
        println!("{}", "═".repeat(50));
        println!("Build #{} ({} stages):", build_number, plan.len());
        println!();

        for (i, step) in plan.iter().enumerate() {
            print!("  {}. {}", i + 1, step.stage.name().bold());
            if !step.runs {
                print!(" {}", "[skipped: registry auth disabled]".dimmed());
            }
            if step.max_attempts > 1 {
                print!(" {}", format!("[up to {} attempts]", step.max_attempts).dimmed());
            }
            if step.tolerated {
                print!(" {}", "[best effort]".dimmed());
            }
            println!();
        }

        println!();
    }
}

fn report(stage: StageKind, status: StageStatus, attempts: u32, duration: Duration) -> StageReport {
    StageReport {
        stage,
        status,
        attempts,
        duration_ms: duration.as_millis() as u64,
    }
}
