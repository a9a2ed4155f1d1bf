//! Command classification: blocked shell syntax, nested shells, denylisted executables

use std::collections::HashSet;
use std::path::Path;

use log::warn;

use super::GuardError;

/// Shell control operators and expansions refused in raw command strings.
/// Multi-character operators come first so the reported token is the most specific one.
const BLOCKED_SYNTAX: &[&str] = &["&&", "||", "$(", ";", "|", ">", "<", "`", "\n", "\r"];

const SHELL_INTERPRETERS: &[&str] = &["sh", "bash", "zsh", "dash", "fish"];

const DENYLIST: &[&str] = &[
    // filesystem destroyers
    "rm", "rmdir", "dd", "mkfs", "wipefs", "shred",
    // partition tools
    "fdisk", "sfdisk", "cfdisk", "gdisk", "sgdisk", "parted",
    // process and power control
    "kill", "pkill", "shutdown", "reboot", "halt", "poweroff", "init",
    // permissions and mounts
    "chmod", "chown", "chgrp", "mount", "umount",
];

/// Name families matched by prefix, e.g. `mkfs.ext4` or `killall5`
const DENYLIST_PREFIXES: &[&str] = &["mkfs", "kill"];

/// Immutable command policy, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    blocked_syntax: Vec<String>,
    shells: HashSet<String>,
    denylist: HashSet<String>,
    deny_prefixes: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            blocked_syntax: BLOCKED_SYNTAX.iter().map(|s| s.to_string()).collect(),
            shells: SHELL_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
            denylist: DENYLIST.iter().map(|s| s.to_string()).collect(),
            deny_prefixes: DENYLIST_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CommandPolicy {
    /// Reject a raw command string containing shell control syntax.
    pub fn check_syntax(&self, raw: &str) -> Result<(), GuardError> {
        match self.blocked_syntax.iter().find(|token| raw.contains(token.as_str())) {
            Some(token) => {
                warn!("Blocked shell syntax {:?} in command", token);
                Err(GuardError::BlockedSyntax { token: token.clone() })
            }
            None => Ok(()),
        }
    }

    /// Check a parsed argv before anything is spawned.
    pub fn check_argv(&self, argv: &[String]) -> Result<(), GuardError> {
        let Some(program) = argv.first() else {
            return Err(GuardError::EmptyCommand);
        };

        if self.is_shell(program) {
            warn!("Blocked shell interpreter: {}", program);
            return Err(GuardError::ShellInterpreter { name: program.clone() });
        }
        if self.is_denied(program) {
            warn!("Blocked dangerous command: {}", program);
            return Err(GuardError::DangerousCommand {
                name: base_name(program),
            });
        }
        Ok(())
    }

    /// Run every rule against a raw command string and return its argv.
    pub fn validate_command(&self, raw: &str) -> Result<Vec<String>, GuardError> {
        self.check_syntax(raw)?;
        let argv = super::parse_command_line(raw)?;
        self.check_argv(&argv)?;
        Ok(argv)
    }

    pub fn is_shell(&self, executable: &str) -> bool {
        let name = base_name(executable);
        !name.is_empty() && self.shells.contains(&name)
    }

    pub fn is_denied(&self, executable: &str) -> bool {
        let name = base_name(executable);
        if name.is_empty() {
            return false;
        }
        self.denylist.contains(&name) || self.deny_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Lowercased final path segment: `/usr/bin/RM` -> `rm`
fn base_name(executable: &str) -> String {
    let trimmed = executable.trim();
    Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_syntax_blocks_every_operator() {
        let policy = CommandPolicy::default();
        for cmd in [
            "ls && rm x",
            "ls || true",
            "ls; ls",
            "ls | wc",
            "echo hi > out",
            "cat < in",
            "echo `id`",
            "echo $(id)",
            "ls\nrm x",
            "ls\r",
        ] {
            assert!(
                matches!(policy.check_syntax(cmd), Err(GuardError::BlockedSyntax { .. })),
                "expected {:?} to be blocked",
                cmd
            );
        }
    }

    #[test]
    fn test_syntax_reports_specific_token() {
        let policy = CommandPolicy::default();
        let err = policy.check_syntax("make && make install").unwrap_err();
        assert_eq!(err, GuardError::BlockedSyntax { token: "&&".to_string() });
    }

    #[test]
    fn test_syntax_allows_plain_commands() {
        let policy = CommandPolicy::default();
        assert!(policy.check_syntax("git status --short").is_ok());
        assert!(policy.check_syntax("echo $HOME").is_ok());
    }

    #[test]
    fn test_shell_interpreters_blocked() {
        let policy = CommandPolicy::default();
        for shell in ["sh", "bash", "/bin/zsh", "DASH", "/usr/local/bin/fish"] {
            let result = policy.check_argv(&argv(&[shell, "-c", "ls"]));
            assert!(matches!(result, Err(GuardError::ShellInterpreter { .. })), "{}", shell);
        }
    }

    #[test]
    fn test_denylist_case_insensitive_with_prefix() {
        let policy = CommandPolicy::default();
        for cmd in ["rm", "RM", "/usr/bin/rm", "/bin/Rm", "./rmdir"] {
            assert!(policy.is_denied(cmd), "{}", cmd);
        }
    }

    #[test]
    fn test_denylist_families() {
        let policy = CommandPolicy::default();
        for cmd in [
            "mkfs.ext4", "mkfs.xfs", "killall", "killall5", "pkill", "fdisk", "parted", "wipefs",
            "shutdown", "reboot", "halt", "poweroff", "init", "chmod", "chown", "chgrp", "mount",
            "umount", "dd",
        ] {
            assert!(policy.is_denied(cmd), "{}", cmd);
        }
    }

    #[test]
    fn test_denylist_allows_ordinary_tools() {
        let policy = CommandPolicy::default();
        for cmd in ["ls", "cat", "git", "cargo", "python3", "grep", "rmate-not"] {
            assert!(!policy.is_denied(cmd), "{}", cmd);
        }
    }

    #[test]
    fn test_check_argv_reports_base_name() {
        let policy = CommandPolicy::default();
        let err = policy.check_argv(&argv(&["/usr/bin/rm", "-rf", "/"])).unwrap_err();
        assert_eq!(err.to_string(), "dangerous command not allowed: rm");
    }

    #[test]
    fn test_check_argv_empty() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.check_argv(&[]), Err(GuardError::EmptyCommand));
    }

    #[test]
    fn test_validate_command_runs_all_rules() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.validate_command("ls -la").unwrap(), argv(&["ls", "-la"]));
        assert!(matches!(
            policy.validate_command("ls | rm"),
            Err(GuardError::BlockedSyntax { .. })
        ));
        assert!(matches!(
            policy.validate_command("rm -rf /sandbox"),
            Err(GuardError::DangerousCommand { .. })
        ));
        assert!(matches!(
            policy.validate_command("echo 'open"),
            Err(GuardError::MalformedCommand(_))
        ));
        assert_eq!(policy.validate_command("''"), Err(GuardError::EmptyCommand));
    }
}
