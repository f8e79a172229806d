//! Firewall rule management through `netsh advfirewall`.
//!
//! Command lines are built as plain argument vectors and executed through a
//! [`CommandRunner`], so everything except the final process spawn can run
//! (and be tested) on any platform.

use crate::error::{RegistryError, Result};
use crate::netsh::{parse_output, Rule};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, instrument};

const NETSH: &str = "netsh";
const ADVFIREWALL: [&str; 2] = ["advfirewall", "firewall"];

/// Prefix of every rule name this module creates.
pub const RULE_PREFIX: &str = "APW";

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; -1 when the process was terminated by a signal.
    pub status: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true for a zero exit status.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Executes argument vectors.
pub trait CommandRunner {
    /// Runs `argv[0]` with the remaining arguments and captures its output.
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        (**self).run(argv)
    }
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn base_command(verb: &[&str]) -> Vec<String> {
    std::iter::once(NETSH)
        .chain(ADVFIREWALL)
        .chain(verb.iter().copied())
        .map(String::from)
        .collect()
}

/// Builds the verbose listing command, with extra filters before `verbose`.
pub fn list_rules_command<S: AsRef<str>>(options: &[S]) -> Vec<String> {
    let mut argv = base_command(&["show", "rule", "name=all"]);
    argv.extend(options.iter().map(|o| o.as_ref().to_string()));
    argv.push("verbose".to_string());
    argv
}

/// Builds the inbound and outbound block commands for one program.
///
/// Rule names carry the Unix time of `at` and the program's file stem, so
/// rules created together can be found and removed together.
pub fn block_program_commands(program: &Path, at: DateTime<Utc>) -> [Vec<String>; 2] {
    let stamp = at.timestamp();
    let stem = program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let description = format!(
        "description=Rule generated at {} by reg-sweep.",
        at.format("%a %b %e %H:%M:%S %Y")
    );

    let rule = |direction: &str, tag: &str| {
        let mut argv = base_command(&["add", "rule"]);
        argv.extend([
            format!("dir={}", direction),
            "action=block".to_string(),
            format!("name={}-{}-{}-{}", RULE_PREFIX, stamp, tag, stem),
            format!("program={}", program.display()),
            description.clone(),
            "enable=yes".to_string(),
            "profile=any".to_string(),
        ]);
        argv
    };

    [rule("in", "BKI"), rule("out", "BKO")]
}

/// Lists the `.exe` files directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns `NotFound` if `dir` is not a directory.
pub fn executables_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RegistryError::not_found("directory", &dir.display().to_string()));
    }

    let mut programs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_exe = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        if is_exe && path.is_file() {
            programs.push(path);
        }
    }
    programs.sort();
    Ok(programs)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Firewall front end over a command runner.
pub struct Firewall<R: CommandRunner = SystemRunner> {
    runner: R,
}

impl Firewall<SystemRunner> {
    /// Creates a firewall that spawns `netsh` directly.
    pub fn system() -> Self {
        Self::new(SystemRunner)
    }
}

impl<R: CommandRunner> Firewall<R> {
    /// Creates a firewall over `runner`.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Returns the runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    #[instrument(skip(self, argv), fields(command = %argv.join(" ")))]
    fn execute(&self, argv: &[String]) -> Result<CommandOutput> {
        let output = self.runner.run(argv)?;
        if !output.success() {
            return Err(RegistryError::CommandFailed {
                program: argv.first().cloned().unwrap_or_default(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        debug!(bytes = output.stdout.len(), "Command succeeded");
        Ok(output)
    }

    /// Lists every rule.
    pub fn list_rules(&self) -> Result<Vec<Rule>> {
        self.list_rules_with::<&str>(&[])
    }

    /// Lists rules, passing extra filters such as `dir=in` to `netsh`.
    pub fn list_rules_with<S: AsRef<str>>(&self, options: &[S]) -> Result<Vec<Rule>> {
        let output = self.execute(&list_rules_command(options))?;
        let rules = parse_output(&output.stdout);
        info!(count = rules.len(), "Listed firewall rules");
        Ok(rules)
    }

    /// Blocks traffic for every executable directly inside `dir`.
    ///
    /// Returns the programs that were blocked. Stops at the first command
    /// that fails; rules already added stay in place.
    pub fn block_directory(&self, dir: &Path, inbound: bool, outbound: bool) -> Result<Vec<PathBuf>> {
        let dir = absolute(dir)?;
        let programs = executables_in(&dir)?;

        for program in &programs {
            let [inbound_rule, outbound_rule] = block_program_commands(program, Utc::now());
            if inbound {
                self.execute(&inbound_rule)?;
            }
            if outbound {
                self.execute(&outbound_rule)?;
            }
            info!(program = %program.display(), inbound, outbound, "Blocked program");
        }
        Ok(programs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_list_rules_command() {
        assert_eq!(
            list_rules_command(&["dir=in"]),
            vec!["netsh", "advfirewall", "firewall", "show", "rule", "name=all", "dir=in", "verbose"]
        );
    }

    #[test]
    fn test_block_program_commands() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let [inbound, outbound] = block_program_commands(Path::new("/opt/app/tool.exe"), at);

        assert_eq!(&inbound[..5], ["netsh", "advfirewall", "firewall", "add", "rule"]);
        assert_eq!(inbound[5], "dir=in");
        assert_eq!(inbound[6], "action=block");
        assert_eq!(inbound[7], format!("name=APW-{}-BKI-tool", at.timestamp()));
        assert_eq!(inbound[8], "program=/opt/app/tool.exe");
        assert_eq!(inbound[9], "description=Rule generated at Tue Mar  5 14:07:09 2024 by reg-sweep.");
        assert_eq!(&inbound[10..], ["enable=yes", "profile=any"]);

        assert_eq!(outbound[5], "dir=out");
        assert_eq!(outbound[7], format!("name=APW-{}-BKO-tool", at.timestamp()));
    }

    #[test]
    fn test_executables_in_missing_dir() {
        let missing = std::env::temp_dir().join("reg-sweep-no-such-dir");
        assert!(executables_in(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_command_is_error() {
        struct Failing;
        impl CommandRunner for Failing {
            fn run(&self, _argv: &[String]) -> Result<CommandOutput> {
                Ok(CommandOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: "The requested operation requires elevation.\n".into(),
                })
            }
        }

        let err = Firewall::new(Failing).list_rules().unwrap_err();
        match err {
            RegistryError::CommandFailed { program, status, stderr } => {
                assert_eq!(program, "netsh");
                assert_eq!(status, 1);
                assert_eq!(stderr, "The requested operation requires elevation.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
