use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use xrpkg_core::{LifecycleRequest, LifecycleResult, PackageState};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style(force_plain: bool) -> OutputStyle {
    if force_plain || std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    resolve_output_style(std::io::stdout().is_terminal())
}

pub fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let (badge, badge_style) = status_badge(status);
            format!("{} {message}", colorize(badge_style, badge))
        }
    }
}

pub fn render_error_line(style: OutputStyle, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("error: {message}"),
        OutputStyle::Rich => render_status_line(style, "error", message),
    }
}

fn status_badge(status: &str) -> (&'static str, Style) {
    match status {
        "ok" => ("[OK]", color(AnsiColor::BrightGreen)),
        "changed" => ("[CHANGED]", color(AnsiColor::BrightYellow)),
        "step" => ("[..]", color(AnsiColor::BrightBlue)),
        "warn" => ("[WARN]", color(AnsiColor::Yellow)),
        "error" => ("[ERR]", color(AnsiColor::BrightRed)),
        _ => ("[..]", Style::new()),
    }
}

fn color(ansi: AnsiColor) -> Style {
    Style::new()
        .fg_color(Some(ansi.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    if style == Style::new() {
        return text.to_string();
    }
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn format_lifecycle_lines(
    request: &LifecycleRequest,
    result: &LifecycleResult,
    style: OutputStyle,
) -> Vec<String> {
    let (status, summary) = if result.changed {
        ("changed", format!("{} {}", request.pkgname, request.state))
    } else {
        ("ok", format!("{} already {}", request.pkgname, request.state))
    };

    let mut lines = vec![render_status_line(style, status, &summary)];
    if !result.operation_ids.is_empty() {
        lines.push(format!("operations: {}", result.operation_ids.join(", ")));
    }
    for response in &result.stdout_lines {
        lines.extend(response.iter().filter(|line| !line.trim().is_empty()).cloned());
    }
    lines
}

pub fn format_status_lines(
    pkgname: &str,
    observed: PackageState,
    busy: bool,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        "ok",
        &format!("{pkgname}: {observed}"),
    )];
    if busy {
        lines.push(render_status_line(
            style,
            "warn",
            "install operation in progress",
        ));
    }
    lines
}

pub fn render_status_json(pkgname: &str, observed: PackageState, busy: bool) -> String {
    json!({
        "pkgname": pkgname,
        "state": observed.as_str(),
        "install_in_progress": busy,
    })
    .to_string()
}

pub fn render_result_json(result: &LifecycleResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|err| {
        json!({ "failed": true, "msg": format!("failed to encode result: {err}") }).to_string()
    })
}

pub fn render_failure_json(message: &str) -> String {
    json!({
        "changed": false,
        "failed": true,
        "msg": message,
    })
    .to_string()
}

pub fn start_spinner(style: OutputStyle, message: &str) -> Option<ProgressBar> {
    if style == OutputStyle::Plain {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
        spinner.set_style(template.tick_chars("|/-\\ "));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    Some(spinner)
}

pub fn finish_spinner(spinner: Option<ProgressBar>) {
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
}
