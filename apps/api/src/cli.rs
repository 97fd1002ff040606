/// Process modes selected by the first command-line argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// HTTP server, plus worker and scheduler when `EMBEDDED_WORKER` is on.
    Serve,
    Worker,
    Beat,
    RunTask {
        name: String,
        args: Vec<String>,
        queued: bool,
    },
}

pub const USAGE: &str = "usage: cv-api [serve | worker | beat | run-task <name> [args...] [--async]]";

impl Mode {
    pub fn parse(args: &[String]) -> Result<Mode, String> {
        match args.first().map(String::as_str) {
            None | Some("serve") => Ok(Mode::Serve),
            Some("worker") => Ok(Mode::Worker),
            Some("beat") => Ok(Mode::Beat),
            Some("run-task") => {
                let rest = &args[1..];
                let queued = rest.iter().any(|a| a == "--async");
                let mut positional = rest.iter().filter(|a| *a != "--async").cloned();
                let name = positional.next().ok_or_else(|| USAGE.to_string())?;
                Ok(Mode::RunTask {
                    name,
                    args: positional.collect(),
                    queued,
                })
            }
            Some(other) => Err(format!("unknown mode '{other}'\n{USAGE}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_mode_is_serve() {
        assert_eq!(Mode::parse(&[]), Ok(Mode::Serve));
        assert_eq!(Mode::parse(&args(&["worker"])), Ok(Mode::Worker));
    }

    #[test]
    fn test_run_task_collects_args_and_async_flag() {
        assert_eq!(
            Mode::parse(&args(&["run-task", "analyze_cv", "3", "--async", "Top", "skills?"])),
            Ok(Mode::RunTask {
                name: "analyze_cv".to_string(),
                args: args(&["3", "Top", "skills?"]),
                queued: true,
            })
        );
    }

    #[test]
    fn test_bad_invocations() {
        assert!(Mode::parse(&args(&["run-task"])).is_err());
        assert!(Mode::parse(&args(&["migrate"])).unwrap_err().contains("unknown mode"));
    }
}
