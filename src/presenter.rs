use crate::app::IterationFailure;
use crate::config::{PresenterConfig, PresenterFormat};
use crate::normalize::AnalysisResult;
use crossterm::style::Stylize;
use serde_json::json;
use std::io::{self, Write};
use tracing::warn;

const TABLE_TITLE: &str = "Robot Vision Result";
/// Values longer than this wrap onto continuation lines
const VALUE_WIDTH: usize = 60;

/// Sink for loop output. Rendering failures stay inside the presenter.
pub trait Presenter: Send {
    fn present(&mut self, result: &AnalysisResult);

    fn report_failure(&mut self, failure: &IterationFailure);
}

impl<T: Presenter + ?Sized> Presenter for Box<T> {
    fn present(&mut self, result: &AnalysisResult) {
        (**self).present(result)
    }

    fn report_failure(&mut self, failure: &IterationFailure) {
        (**self).report_failure(failure)
    }
}

/// Build the presenter selected by configuration, writing to stdout
pub fn stdout_presenter(config: &PresenterConfig) -> Box<dyn Presenter> {
    match config.format {
        PresenterFormat::Table => Box::new(ConsolePresenter::new(io::stdout(), config.color)),
        PresenterFormat::Json => Box::new(JsonPresenter::new(io::stdout())),
    }
}

/// Rounded two-column table, one per result
pub struct ConsolePresenter<W: Write + Send> {
    out: W,
    color: bool,
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rows(result: &AnalysisResult) -> Vec<(&'static str, String)> {
        vec![
            ("Robot ID", result.agent_id.clone()),
            ("Image Size", result.payload_size_bytes.to_string()),
            ("Description", result.description.clone()),
            ("Environment", result.environment.clone()),
            ("Indoors/Outdoors", result.indoor_or_outdoor.clone()),
            ("Lighting Condition", result.lighting_condition.clone()),
            ("Human", result.human_presence.clone()),
            ("Animals", result.animal_presence.clone()),
            ("Objects", result.objects.join(", ")),
            ("Hazards", result.hazards.clone()),
        ]
    }

    fn render_table(&self, result: &AnalysisResult) -> String {
        let rows: Vec<(&str, Vec<String>)> = Self::rows(result)
            .into_iter()
            .map(|(label, value)| (label, wrap(&value, VALUE_WIDTH)))
            .collect();

        let label_width = rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let value_width = rows
            .iter()
            .flat_map(|(_, lines)| lines.iter().map(|l| l.chars().count()))
            .max()
            .unwrap_or(0);

        let horizontal = |left: &str, mid: &str, right: &str| {
            format!(
                "{}{}{}{}{}",
                left,
                "─".repeat(label_width + 2),
                mid,
                "─".repeat(value_width + 2),
                right
            )
        };

        let mut out = String::new();
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let title = format!("{} ({})", TABLE_TITLE, timestamp);
        out.push_str(&self.paint(&title, |s| s.bold().cyan().to_string()));
        out.push('\n');
        out.push_str(&horizontal("╭", "┬", "╮"));
        out.push('\n');

        for (index, (label, lines)) in rows.iter().enumerate() {
            for (line_no, line) in lines.iter().enumerate() {
                let label_cell = if line_no == 0 { *label } else { "" };
                let label_pad = label_width - label_cell.chars().count();
                let value_pad = value_width - line.chars().count();
                out.push_str(&format!(
                    "│ {}{} │ {}{} │\n",
                    self.paint(label_cell, |s| s.bold().magenta().to_string()),
                    " ".repeat(label_pad),
                    self.paint(line, |s| s.white().to_string()),
                    " ".repeat(value_pad)
                ));
            }
            if index + 1 < rows.len() {
                out.push_str(&horizontal("├", "┼", "┤"));
                out.push('\n');
            }
        }

        out.push_str(&horizontal("╰", "┴", "╯"));
        out.push('\n');
        out
    }

    fn paint<F>(&self, text: &str, style: F) -> String
    where
        F: Fn(&str) -> String,
    {
        if self.color && !text.is_empty() {
            style(text)
        } else {
            text.to_string()
        }
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            warn!("Failed to write to console: {}", e);
        }
    }
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn present(&mut self, result: &AnalysisResult) {
        let table = self.render_table(result);
        self.write(&table);
    }

    fn report_failure(&mut self, failure: &IterationFailure) {
        let heading = format!("Error calling analysis tool ({}):", failure.stage);
        let line = format!(
            "{} {}\n",
            self.paint(&heading, |s| s.bold().red().to_string()),
            failure.message
        );
        self.write(&line);
    }
}

/// One JSON document per line
pub struct JsonPresenter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, value: &serde_json::Value) {
        if let Err(e) = writeln!(self.out, "{}", value).and_then(|_| self.out.flush()) {
            warn!("Failed to write JSON output: {}", e);
        }
    }
}

impl<W: Write + Send> Presenter for JsonPresenter<W> {
    fn present(&mut self, result: &AnalysisResult) {
        match serde_json::to_value(result) {
            Ok(value) => self.write_line(&value),
            Err(e) => warn!("Failed to serialize analysis result: {}", e),
        }
    }

    fn report_failure(&mut self, failure: &IterationFailure) {
        let value = json!({
            "error": failure.message,
            "stage": failure.stage.to_string(),
            "iteration": failure.iteration,
        });
        self.write_line(&value);
    }
}

/// Greedy word wrap; words longer than `width` are split
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FailureStage;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            agent_id: "R1".to_string(),
            payload_size_bytes: 12345,
            description: "a hallway".to_string(),
            objects: vec!["chair".to_string(), "door".to_string()],
            ..AnalysisResult::default()
        }
    }

    #[test]
    fn test_console_table_contains_every_field() {
        let mut presenter = ConsolePresenter::new(Vec::new(), false);
        presenter.present(&sample_result());
        let output = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(output.starts_with("Robot Vision Result"));
        for label in [
            "Robot ID",
            "Image Size",
            "Description",
            "Environment",
            "Indoors/Outdoors",
            "Lighting Condition",
            "Human",
            "Animals",
            "Objects",
            "Hazards",
        ] {
            assert!(output.contains(label), "missing row {}", label);
        }
        assert!(output.contains("chair, door"));
        assert!(output.contains("12345"));
        assert!(output.contains('╭') && output.contains('╯'));
        assert!(!output.contains('\u{1b}'));
    }

    #[test]
    fn test_console_table_rows_are_aligned() {
        let mut presenter = ConsolePresenter::new(Vec::new(), false);
        presenter.present(&sample_result());
        let output = String::from_utf8(presenter.into_inner()).unwrap();

        let widths: Vec<usize> = output
            .lines()
            .skip(1)
            .map(|line| line.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_color_output_uses_ansi_sequences() {
        let mut presenter = ConsolePresenter::new(Vec::new(), true);
        presenter.present(&sample_result());
        let output = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(output.contains('\u{1b}'));
    }

    #[test]
    fn test_console_failure_report_contains_text() {
        let mut presenter = ConsolePresenter::new(Vec::new(), false);
        presenter.report_failure(&IterationFailure {
            iteration: 3,
            stage: FailureStage::Analysis,
            message: "rate limited".to_string(),
        });
        let output = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(output.contains("rate limited"));
        assert!(output.contains("analysis"));
    }

    #[test]
    fn test_json_presenter_lines() {
        let mut presenter = JsonPresenter::new(Vec::new());
        presenter.present(&sample_result());
        presenter.report_failure(&IterationFailure {
            iteration: 2,
            stage: FailureStage::Analysis,
            message: "invalid token".to_string(),
        });
        let output = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["robot_id"], json!("R1"));
        assert_eq!(lines[0]["objects"], json!(["chair", "door"]));
        assert_eq!(lines[1]["error"], json!("invalid token"));
        assert_eq!(lines[1]["iteration"], json!(2));
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(wrap("a b c", 10), vec!["a b c"]);
        assert_eq!(wrap("hello world again", 11), vec!["hello world", "again"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }
}
