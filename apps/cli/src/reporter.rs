//! Terminal rendering of deployment progress.
//!
//! Progress goes to stdout as headers, progress bars and the raw component
//! logs. Steps are wrapped in GitHub Actions `::group::` markers and server
//! validation errors become `::error` annotations, so the same output reads
//! well in a terminal and in a workflow log.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::warn;

use flux_deploy::{DeployError, Reporter};
use flux_protocol::Update;

const BAR_WIDTH: usize = 50;
const LABEL_WIDTH: usize = 20;

/// Renders updates as they arrive, repeating nothing that did not change.
pub struct TerminalReporter<W: Write + Send> {
    out: W,
    fluxfile: PathBuf,
    last_step: Option<String>,
    last_step_progress: Option<f64>,
    last_sub_step_progress: Option<f64>,
    last_component: Option<String>,
}

impl TerminalReporter<io::Stdout> {
    pub fn stdout(fluxfile: &Path) -> Self {
        Self::new(io::stdout(), fluxfile)
    }
}

impl<W: Write + Send> TerminalReporter<W> {
    pub fn new(out: W, fluxfile: &Path) -> Self {
        Self {
            out,
            fluxfile: fluxfile.to_path_buf(),
            last_step: None,
            last_step_progress: None,
            last_sub_step_progress: None,
            last_component: None,
        }
    }

    /// Closes the open step group, if any.
    pub fn finish(&mut self) {
        if self.last_step.take().is_some() {
            self.emit(|out| writeln!(out, "::endgroup::"));
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, update: &Update) -> io::Result<()> {
        if self.last_step.as_deref() != Some(update.step.as_str()) {
            if self.last_step.is_some() {
                writeln!(self.out, "::endgroup::")?;
            }
            writeln!(self.out, "::group::{}", update.step)?;
            header(&mut self.out, 1, &update.step)?;
            self.last_step = Some(update.step.clone());
        }

        if self.last_step_progress != Some(update.progress.step) {
            progress_bar(&mut self.out, "Step progress", update.progress.step)?;
            self.last_step_progress = Some(update.progress.step);
        }

        if self.last_sub_step_progress != Some(update.progress.sub_step) {
            progress_bar(&mut self.out, "Sub-step progress", update.progress.sub_step)?;
            self.last_sub_step_progress = Some(update.progress.sub_step);
        }

        for log in &update.logs {
            if self.last_component.as_deref() != Some(log.component.as_str()) {
                header(&mut self.out, 2, &log.component)?;
                self.last_component = Some(log.component.clone());
            }
            self.out.write_all(&log.data)?;
        }

        self.out.flush()
    }

    fn render_error(&mut self, error: &DeployError) -> io::Result<()> {
        let DeployError::Protocol { message, details } = error else {
            return Ok(());
        };

        writeln!(self.out, "{}", message.white().on_red().bold())?;
        for detail in details {
            let location = detail.location();
            let text = if location.is_empty() {
                detail.message.clone()
            } else {
                format!("{location}: {}", detail.message)
            };
            writeln!(
                self.out,
                "::error file={},title=Fluxfile::{}",
                self.fluxfile.display(),
                escape_data(&text)
            )?;
        }
        self.out.flush()
    }

    fn emit(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Err(e) = f(&mut self.out).and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write progress");
        }
    }
}

impl<W: Write + Send> Reporter for TerminalReporter<W> {
    fn report(&mut self, update: &Update) {
        if let Err(e) = self.render(update) {
            warn!(error = %e, "failed to write progress");
        }
    }

    fn report_error(&mut self, error: &DeployError) -> Result<(), DeployError> {
        if let Err(e) = self.render_error(error) {
            warn!(error = %e, "failed to write error report");
        }
        Ok(())
    }
}

fn header(out: &mut impl Write, level: u8, text: &str) -> io::Result<()> {
    let (start, line, end, side) = if level == 1 {
        ('┏', '━', '┗', '┃')
    } else {
        ('╔', '═', '╚', '║')
    };
    let paint = |s: String| {
        if level == 1 {
            s.yellow().bold()
        } else {
            s.cyan().bold()
        }
    };
    let rule: String = std::iter::repeat_n(line, 3).collect();

    writeln!(out)?;
    writeln!(out, "{}", paint(format!(" {start}{rule}")))?;
    writeln!(out, "{}", paint(format!(" {side} {text}")))?;
    writeln!(out, "{}", paint(format!(" {end}{rule}")))?;
    writeln!(out)
}

fn progress_bar(out: &mut impl Write, label: &str, progress: f64) -> io::Result<()> {
    let label = format!("{label:<LABEL_WIDTH$}:");
    let bar = format!("{} {}%", bar(progress), (progress * 100.0).round() as u32);
    writeln!(out, "{}{}", label.blue().bold(), bar.green())
}

fn bar(progress: f64) -> String {
    let filled = ((BAR_WIDTH as f64) * progress.clamp(0.0, 1.0)).round() as usize;
    let mut s = "█".repeat(filled);
    s.push_str(&"░".repeat(BAR_WIDTH - filled));
    s
}

/// Escapes a workflow command message.
fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_protocol::{ComponentLog, ErrorDetail, PathSegment, Progress};

    fn update(step: &str, progress: (f64, f64), logs: &[(&str, &str)]) -> Update {
        Update {
            step: step.into(),
            progress: Progress {
                step: progress.0,
                sub_step: progress.1,
            },
            logs: logs
                .iter()
                .map(|(component, data)| ComponentLog {
                    component: (*component).into(),
                    data: data.as_bytes().to_vec(),
                })
                .collect(),
            cursors: None,
            is_done: false,
            status: None,
        }
    }

    fn reporter() -> TerminalReporter<Vec<u8>> {
        colored::control::set_override(false);
        TerminalReporter::new(Vec::new(), Path::new("Fluxfile"))
    }

    fn output(reporter: TerminalReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn bar_widths() {
        assert_eq!(bar(0.0), "░".repeat(50));
        assert_eq!(bar(1.0), "█".repeat(50));
        let half = bar(0.5);
        assert_eq!(half.chars().filter(|c| *c == '█').count(), 25);
        assert_eq!(half.chars().count(), 50);
    }

    #[test]
    fn first_update_opens_group_with_header_and_bars() {
        let mut r = reporter();
        r.report(&update("build", (0.25, 0.5), &[("web", "compiling\n")]));
        let out = output(r);

        assert!(out.starts_with("::group::build\n"));
        assert!(out.contains(" ┏━━━\n ┃ build\n ┗━━━\n"));
        assert!(out.contains(&format!("{:<20}:", "Step progress")));
        assert!(out.contains("Sub-step progress   :"));
        assert!(out.contains("25%"));
        assert!(out.contains("50%"));
        assert!(out.contains(" ╔═══\n ║ web\n ╚═══\n"));
        assert!(out.ends_with("compiling\n"));
    }

    #[test]
    fn unchanged_parts_are_not_repeated() {
        let mut r = reporter();
        r.report(&update("build", (0.5, 0.0), &[("web", "a")]));
        r.report(&update("build", (0.5, 1.0), &[("web", "b")]));
        let out = output(r);

        assert_eq!(out.matches("::group::").count(), 1);
        assert_eq!(out.matches("Step progress").count(), 1);
        assert_eq!(out.matches("Sub-step progress").count(), 2);
        assert_eq!(out.matches("║ web").count(), 1);
        assert!(out.ends_with("ab"));
    }

    #[test]
    fn new_step_closes_previous_group() {
        let mut r = reporter();
        r.report(&update("build", (1.0, 1.0), &[]));
        r.report(&update("deploy", (0.0, 0.0), &[]));
        r.finish();
        r.finish();
        let out = output(r);

        let end = out.find("::endgroup::").unwrap();
        let next = out.find("::group::deploy").unwrap();
        assert!(end < next);
        assert_eq!(out.matches("::endgroup::").count(), 2);
    }

    #[test]
    fn log_bytes_are_written_raw() {
        let mut r = reporter();
        let mut u = update("build", (0.0, 0.0), &[]);
        u.logs.push(ComponentLog {
            component: "bin".into(),
            data: vec![0x1b, b'[', b'3', b'1', b'm', 0xff],
        });
        r.report(&u);
        let raw = r.into_inner();
        assert!(raw.ends_with(&[0x1b, b'[', b'3', b'1', b'm', 0xff]));
    }

    #[test]
    fn protocol_error_becomes_annotations() {
        let mut r = reporter();
        let err = DeployError::Protocol {
            message: "Invalid Fluxfile".into(),
            details: vec![
                ErrorDetail {
                    message: "image is required".into(),
                    path: vec![
                        PathSegment::Key("jobs".into()),
                        PathSegment::Key("build".into()),
                    ],
                },
                ErrorDetail {
                    message: "50% off\nnot allowed".into(),
                    path: vec![],
                },
            ],
        };
        r.report_error(&err).unwrap();
        let out = output(r);

        assert!(out.starts_with("Invalid Fluxfile\n"));
        assert!(out.contains("::error file=Fluxfile,title=Fluxfile::jobs.build: image is required\n"));
        assert!(out.contains("::error file=Fluxfile,title=Fluxfile::50%25 off%0Anot allowed\n"));
    }

    #[test]
    fn other_errors_print_nothing() {
        let mut r = reporter();
        r.report_error(&DeployError::Timeout(std::time::Duration::from_secs(1)))
            .unwrap();
        assert!(output(r).is_empty());
    }
}
