use super::evaluator::Evaluator;
use crate::config::RunConfig;
use crate::data::argos_xml::ConfigurationSerializer;
use crate::engines::generation::Genome;
use crate::error::{CpfaError, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const PAYLOAD_PREFIX: &str = "gatmp";
const PAYLOAD_SUFFIX: &str = ".argos";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the external simulator once per trial.
///
/// Each trial writes its experiment file to a fresh temp file in
/// `experiments_dir`, runs `<simulator> -n -c <file>` and reads the score from
/// the last line of its standard output. The temp file and the child process
/// are released on every path out of a trial, including timeouts.
#[derive(Debug, Clone)]
pub struct ArgosEvaluator {
    serializer: ConfigurationSerializer,
    simulator: String,
    program: String,
    leading_args: Vec<String>,
    experiments_dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl ArgosEvaluator {
    /// `simulator` is split on whitespace into a program and leading
    /// arguments, so wrappers such as `nice -n 10 argos3` work.
    ///
    /// Creates `experiments_dir` if needed; failing to do so is fatal.
    pub fn new(
        serializer: ConfigurationSerializer,
        simulator: impl Into<String>,
        experiments_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let simulator = simulator.into();
        let mut words = simulator.split_whitespace().map(str::to_string);
        let program = words.next().ok_or_else(|| {
            CpfaError::Configuration("Simulator command must not be empty".to_string())
        })?;
        let leading_args = words.collect();

        let experiments_dir = experiments_dir.into();
        std::fs::create_dir_all(&experiments_dir).map_err(|e| {
            CpfaError::Storage(format!(
                "Failed to create experiments directory {}: {}",
                experiments_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            serializer,
            simulator,
            program,
            leading_args,
            experiments_dir,
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn from_config(serializer: ConfigurationSerializer, config: &RunConfig) -> Result<Self> {
        Self::new(
            serializer,
            config.simulator.clone(),
            config.experiments_dir.clone(),
            config.trial_timeout(),
        )
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Directory the transient experiment files are written to.
    pub fn experiments_dir(&self) -> &Path {
        &self.experiments_dir
    }

    fn run_trial(&self, genome: &Genome, seed: u32) -> Result<f64> {
        // A mismatched bounds table is a configuration error and stays fatal.
        let document = self.serializer.render(genome, seed)?;

        // Deleted when dropped, whichever way this function returns.
        let mut payload = tempfile::Builder::new()
            .prefix(PAYLOAD_PREFIX)
            .suffix(PAYLOAD_SUFFIX)
            .tempfile_in(&self.experiments_dir)
            .map_err(|e| trial_io("create experiment file", e))?;
        payload
            .write_all(document.as_bytes())
            .and_then(|_| payload.flush())
            .map_err(|e| trial_io("write experiment file", e))?;

        // A file rather than a pipe: the child can never block on a full buffer.
        let mut stdout_sink =
            tempfile::tempfile().map_err(|e| trial_io("create output file", e))?;
        let child_stdout = stdout_sink
            .try_clone()
            .map_err(|e| trial_io("attach output file", e))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg("-n")
            .arg("-c")
            .arg(payload.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(child_stdout))
            .stderr(Stdio::null());
        // Own process group, so a timeout also reaches whatever a wrapper spawned.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let child = command.spawn().map_err(|e| {
            CpfaError::Evaluation(format!("Failed to launch {}: {}", self.simulator, e))
        })?;

        let deadline = Instant::now() + self.timeout;
        let status = ChildGuard::new(child).wait_until(deadline, self.poll_interval)?;
        if !status.success() {
            return Err(CpfaError::Evaluation(format!(
                "{} exited with {}",
                self.simulator, status
            )));
        }

        let mut output = String::new();
        stdout_sink
            .seek(SeekFrom::Start(0))
            .and_then(|_| stdout_sink.read_to_string(&mut output))
            .map_err(|e| trial_io("read simulator output", e))?;
        parse_score(&output)
    }
}

impl Evaluator for ArgosEvaluator {
    fn evaluate(&self, genome: &Genome, seed: u32) -> Result<f64> {
        self.run_trial(genome, seed)
    }
}

fn trial_io(action: &str, e: std::io::Error) -> CpfaError {
    CpfaError::Evaluation(format!("Failed to {}: {}", action, e))
}

/// Kills and reaps the child, and its process group on unix, if it is still
/// running when dropped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait_until(mut self, deadline: Instant, poll_interval: Duration) -> Result<ExitStatus> {
        loop {
            let polled = self
                .child
                .try_wait()
                .map_err(|e| trial_io("poll simulator", e))?;
            if let Some(status) = polled {
                self.reaped = true;
                return Ok(status);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CpfaError::Evaluation(format!(
                    "Simulator (pid {}) timed out",
                    self.child.id()
                )));
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            #[cfg(unix)]
            {
                let group = format!("-{}", self.child.id());
                let _ = Command::new("kill")
                    .args(["-KILL", "--", group.as_str()])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
            }
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Score from simulator output: the first comma-separated field of the last
/// non-empty line.
pub fn parse_score(output: &str) -> Result<f64> {
    let line = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| CpfaError::Evaluation("Simulator produced no output".to_string()))?;

    let field = line.split(',').next().unwrap_or("").trim();
    let score: f64 = field
        .parse()
        .map_err(|_| CpfaError::Evaluation(format!("Unparseable score line: '{}'", line)))?;

    if !score.is_finite() {
        return Err(CpfaError::Evaluation(format!("Non-finite score: '{}'", line)));
    }
    Ok(score)
}
