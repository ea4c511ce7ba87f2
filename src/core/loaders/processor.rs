use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::profile::{LoaderInstallProfile, ProcessorSpec};
use crate::core::archive;
use crate::core::error::{EngineError, EngineResult};
use crate::core::hashing::{hash_file, HashAlgorithm};
use crate::core::maven::MavenArtifact;
use crate::core::session::{InstallSession, Side};

/// Paths the built-in substitution tokens point at.
#[derive(Debug, Clone)]
pub struct ProcessorPaths {
    pub libraries_dir: PathBuf,
    pub extracted_dir: PathBuf,
    pub installer: PathBuf,
    pub game_jar: PathBuf,
    pub root: PathBuf,
}

/// Resolve one `data` value for the current side.
///
/// `[id]` is a library path, `'x'` a quoted literal, `/x` a file inside the
/// extracted installer; anything else is used verbatim.
fn resolve_data_value(raw: &str, paths: &ProcessorPaths) -> String {
    if let Some(coord) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return library_path(coord, &paths.libraries_dir)
            .to_string_lossy()
            .to_string();
    }
    if let Some(literal) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return literal.to_string();
    }
    if let Some(inner) = raw.strip_prefix('/') {
        return paths.extracted_dir.join(inner).to_string_lossy().to_string();
    }
    raw.to_string()
}

fn library_path(coord: &str, libraries_dir: &Path) -> PathBuf {
    let (artifact, degraded) = MavenArtifact::parse_lenient(coord);
    if degraded {
        warn!("Processor references malformed library {coord:?}");
    }
    artifact.path_in(libraries_dir)
}

/// Substitution table for one run mode: the profile's `data` resolved for
/// `side`, plus the built-in entries.
pub fn build_variables(
    profile: &LoaderInstallProfile,
    side: Side,
    paths: &ProcessorPaths,
) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = profile
        .data
        .iter()
        .map(|(key, entry)| (key.clone(), resolve_data_value(entry.for_side(side), paths)))
        .collect();

    let display = |p: &Path| p.to_string_lossy().to_string();
    vars.insert("SIDE".to_string(), side.as_str().to_string());
    vars.insert("MINECRAFT_JAR".to_string(), display(&paths.game_jar));
    vars.insert("ROOT".to_string(), display(&paths.root));
    vars.insert("INSTALLER".to_string(), display(&paths.installer));
    vars.insert("LIBRARY_DIR".to_string(), display(&paths.libraries_dir));
    vars
}

/// Expand one argument template: a whole-argument `[id]` becomes a library
/// path, every `{KEY}` is replaced from `vars`. Unknown keys are an error.
pub fn substitute(
    template: &str,
    vars: &HashMap<String, String>,
    libraries_dir: &Path,
) -> EngineResult<String> {
    if let Some(coord) = template.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return Ok(library_path(coord, libraries_dir)
            .to_string_lossy()
            .to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        let key = &rest[open + 1..close];
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            out.push_str(&rest[..=open]);
            rest = &rest[open + 1..];
            continue;
        }
        let value = vars.get(key).ok_or_else(|| {
            EngineError::ProfileParse(format!("unknown data key {{{key}}} in {template:?}"))
        })?;
        out.push_str(&rest[..open]);
        out.push_str(value);
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Whether every declared output already exists with its expected SHA-1.
/// Outputs that exist with the wrong hash are deleted.
pub fn outputs_satisfied(
    processor: &ProcessorSpec,
    vars: &HashMap<String, String>,
    libraries_dir: &Path,
) -> EngineResult<bool> {
    if processor.outputs.is_empty() {
        return Ok(false);
    }

    let mut satisfied = true;
    for (path_template, hash_template) in &processor.outputs {
        let path = PathBuf::from(substitute(path_template, vars, libraries_dir)?);
        let expected = substitute(hash_template, vars, libraries_dir)?;
        let expected = expected.trim_matches('\'');

        if !path.is_file() {
            satisfied = false;
            continue;
        }
        let actual = hash_file(HashAlgorithm::Sha1, &path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            debug!("Deleting stale processor output {:?}", path);
            std::fs::remove_file(&path).map_err(EngineError::io(&path))?;
            satisfied = false;
        }
    }
    Ok(satisfied)
}

/// Read `Main-Class` from a jar's manifest, following continuation lines.
pub fn read_main_class_from_jar(path: &Path) -> EngineResult<String> {
    let manifest = archive::read_entry(path, "META-INF/MANIFEST.MF")?.ok_or_else(|| {
        EngineError::ProfileParse(format!("manifest not found in {}", path.display()))
    })?;
    let text = String::from_utf8_lossy(&manifest);

    let mut main_class: Option<String> = None;
    let mut current_key: Option<String> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if current_key.as_deref() == Some("Main-Class") {
                if let Some(value) = &mut main_class {
                    value.push_str(rest.trim_end());
                }
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            current_key = Some(key.trim().to_string());
            if key.trim() == "Main-Class" {
                main_class = Some(value.trim().to_string());
            }
        }
    }

    main_class
        .filter(|c| !c.is_empty())
        .ok_or_else(|| EngineError::ProfileParse(format!("Main-Class missing in {}", path.display())))
}

// ─── Subprocess ───

/// One fully-substituted process to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    /// Processor jar identifier, for error reporting.
    pub jar: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl ProcessInvocation {
    /// `java -cp <classpath> <main_class> <args...>`
    pub fn java(
        jar: &str,
        java: &Path,
        classpath: &[PathBuf],
        main_class: &str,
        args: Vec<String>,
        working_dir: &Path,
    ) -> Self {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let classpath = classpath
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(separator);

        let mut full = vec!["-cp".to_string(), classpath, main_class.to_string()];
        full.extend(args);
        Self {
            jar: jar.to_string(),
            program: java.to_path_buf(),
            args: full,
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Launches processors. Swapped out in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &ProcessInvocation) -> std::io::Result<ProcessOutput>;
}

/// Runs the invocation as a child process and waits for it.
#[derive(Debug, Default)]
pub struct SubprocessRunner;

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, invocation: &ProcessInvocation) -> std::io::Result<ProcessOutput> {
        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .output()
            .await?;
        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run every processor for `side` strictly in order. The first failure
/// cancels the session; later processors never start.
///
/// Returns how many processors actually ran.
pub async fn run_processors(
    profile: &LoaderInstallProfile,
    vars: &HashMap<String, String>,
    java: &Path,
    runner: &dyn ProcessRunner,
    session: &InstallSession,
) -> EngineResult<usize> {
    let libraries_dir = session.layout.libraries_dir();
    let mut ran = 0;

    for processor in &profile.processors {
        session.ensure_active()?;
        if !processor.runs_on(session.side) {
            debug!("Processor {} does not run on {}", processor.jar, session.side.as_str());
            continue;
        }

        let result = run_one(processor, vars, java, runner, &libraries_dir).await;
        if session.guard(result)? {
            ran += 1;
        }
    }

    Ok(ran)
}

/// A malformed identifier fails the processor itself rather than being
/// skipped like an unresolvable runtime library.
fn processor_library(
    processor: &ProcessorSpec,
    identifier: &str,
    libraries_dir: &Path,
) -> EngineResult<PathBuf> {
    let artifact = MavenArtifact::parse(identifier).map_err(|_| EngineError::ProcessorFailure {
        jar: processor.jar.clone(),
        code: None,
        stdout: String::new(),
        stderr: format!("malformed library identifier {identifier:?}"),
    })?;
    let path = artifact.path_in(libraries_dir);
    if !path.is_file() {
        return Err(EngineError::MissingLibrary(identifier.to_string()));
    }
    Ok(path)
}

async fn run_one(
    processor: &ProcessorSpec,
    vars: &HashMap<String, String>,
    java: &Path,
    runner: &dyn ProcessRunner,
    libraries_dir: &Path,
) -> EngineResult<bool> {
    if outputs_satisfied(processor, vars, libraries_dir)? {
        debug!("Processor {} outputs already up to date", processor.jar);
        return Ok(false);
    }

    let jar_path = processor_library(processor, &processor.jar, libraries_dir)?;
    let mut classpath = vec![jar_path.clone()];
    for entry in &processor.classpath {
        classpath.push(processor_library(processor, entry, libraries_dir)?);
    }

    let main_class = match &processor.main_class_hint {
        Some(hint) => hint.clone(),
        None => read_main_class_from_jar(&jar_path)?,
    };
    let args = processor
        .args
        .iter()
        .map(|arg| substitute(arg, vars, libraries_dir))
        .collect::<EngineResult<Vec<_>>>()?;

    info!("Running processor {} ({})", processor.jar, main_class);
    let invocation =
        ProcessInvocation::java(&processor.jar, java, &classpath, &main_class, args, libraries_dir);
    let output = runner
        .run(&invocation)
        .await
        .map_err(|source| EngineError::ProcessorIo {
            jar: processor.jar.clone(),
            source,
        })?;

    if !output.success {
        return Err(EngineError::ProcessorFailure {
            jar: processor.jar.clone(),
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(true)
}
