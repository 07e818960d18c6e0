//! Enhanced Error Messages with Solutions
//!
//! Provides user-friendly error messages with actionable solutions

use crate::NvOcError;
use crate::system;
use console::style;

pub trait ErrorWithSolution {
    fn with_solution(&self) -> String;
}

/// Package install command for `xhost` on a given distribution ID
pub fn xhost_install_hint(distro: Option<&str>) -> &'static str {
    match distro {
        Some("ubuntu") | Some("debian") | Some("pop") | Some("linuxmint") => {
            "sudo apt-get install x11-xserver-utils"
        }
        Some("fedora") | Some("centos") | Some("rhel") => "sudo dnf install xorg-xhost",
        Some("arch") | Some("manjaro") | Some("endeavouros") => "sudo pacman -S xorg-xhost",
        _ => "install the package providing 'xhost' (x11-xserver-utils / xorg-xhost)",
    }
}

impl ErrorWithSolution for NvOcError {
    fn with_solution(&self) -> String {
        match self {
            NvOcError::MissingDependency(program) if program == "xhost" => {
                let distro = system::linux_distribution();
                format!(
                    "{} {}\n\n{}\n  {}\n\n{}\n  {}\n  {}\n  {}\n  {}\n\n{}",
                    style("❌ Error:").red().bold(),
                    style("Missing dependency: xhost").bold(),
                    style("Details:").yellow(),
                    "The 'xhost' command is required to grant permissions for changing GPU settings.",
                    style("💡 Solutions:").green().bold(),
                    format!(
                        "{} Detected system: {}",
                        style("→").cyan().bold(),
                        xhost_install_hint(distro.as_deref())
                    ),
                    "- Debian/Ubuntu: sudo apt-get install x11-xserver-utils",
                    "- Fedora/CentOS: sudo dnf install xorg-xhost",
                    "- Arch Linux:    sudo pacman -S xorg-xhost",
                    "After installation, please restart the application."
                )
            }
            NvOcError::MissingDependency(program) => format!(
                "{} {}\n\n{}\n  {}",
                style("❌ Error:").red().bold(),
                style(format!("Missing dependency: {program}")).bold(),
                style("💡 Solutions:").green().bold(),
                format!("Install '{program}' with your package manager and make sure it is on PATH."),
            ),
            NvOcError::SessionUnavailable(msg) => {
                format!(
                    "{} {}\n\n{}\n{}\n  {}\n  {}\n\n{}\n  {}\n  {}",
                    style("❌ Error:").red().bold(),
                    style("No graphical session found").bold(),
                    style("Details:").yellow(),
                    msg,
                    "• DISPLAY is not set (running over SSH or from a TTY?)",
                    "• No X authority file in $XAUTHORITY or /run/user/<uid>",
                    style("💡 Solutions:").green().bold(),
                    format!(
                        "{} Run nvoc from a terminal inside your desktop session",
                        style("1.").cyan().bold()
                    ),
                    format!(
                        "{} Check: echo $DISPLAY $XAUTHORITY",
                        style("2.").cyan().bold()
                    )
                )
            }
            NvOcError::WrapperMissing(path) => {
                format!(
                    "{} {}\n\n{}\n  {}\n\n{}\n  {}",
                    style("❌ Error:").red().bold(),
                    style("Privilege wrapper script missing").bold(),
                    style("Details:").yellow(),
                    format!("Expected at {}", path.display()),
                    style("💡 Solutions:").green().bold(),
                    format!(
                        "{} Copy scripts/pkexec_wrapper.sh next to the nvoc binary or set wrapper_path in config.toml",
                        style("1.").cyan().bold()
                    )
                )
            }
            NvOcError::CommandFailed {
                command,
                exit_code,
                stderr,
                ..
            } => {
                format!(
                    "{} {}\n\n{}\n  {}\n  {}\n\n{}\n  {}\n  {}",
                    style("❌ Error:").red().bold(),
                    style(format!("nvidia-settings failed (exit code {exit_code})")).bold(),
                    style("Details:").yellow(),
                    command,
                    stderr,
                    style("💡 Solutions:").green().bold(),
                    format!(
                        "{} Enable CoolBits in X11: nvidia-xconfig --cool-bits=28",
                        style("1.").cyan().bold()
                    ),
                    format!(
                        "{} Exit code 126/127 means the authorization prompt was dismissed or denied",
                        style("2.").cyan().bold()
                    )
                )
            }
            other => format!("{} {}", style("❌ Error:").red().bold(), other),
        }
    }
}

/// Dependency overview printed by `nvoc --check`
pub fn run_diagnostics() -> String {
    let mut output = format!("{}\n", style("nvoc Diagnostics").cyan().bold());

    for (dep, path) in system::dependency_report() {
        let kind = if dep.required { "required" } else { "optional" };
        match path {
            Some(path) => output.push_str(&format!(
                "   ✅ {} ({}) at {}\n",
                dep.program,
                kind,
                path.display()
            )),
            None => output.push_str(&format!(
                "   ❌ {} ({}) not found, needed to {}\n",
                dep.program, kind, dep.purpose
            )),
        }
    }

    match std::env::var("DISPLAY") {
        Ok(display) if !display.is_empty() => {
            output.push_str(&format!("   ✅ DISPLAY={}\n", display));
        }
        _ => output.push_str("   ⚠️  DISPLAY not set, settings cannot be applied\n"),
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xhost_solution_lists_distros() {
        let error = NvOcError::MissingDependency("xhost".to_string());
        let solution = error.with_solution();
        assert!(solution.contains("Solutions"));
        assert!(solution.contains("x11-xserver-utils"));
        assert!(solution.contains("xorg-xhost"));
    }

    #[test]
    fn test_install_hint_by_distro() {
        assert_eq!(xhost_install_hint(Some("arch")), "sudo pacman -S xorg-xhost");
        assert!(xhost_install_hint(None).contains("xhost"));
    }

    #[test]
    fn test_diagnostics() {
        let diag = run_diagnostics();
        assert!(diag.contains("Diagnostics"));
        assert!(diag.contains("xhost"));
    }
}
