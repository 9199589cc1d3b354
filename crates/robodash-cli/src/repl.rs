//! REPL – terminal teleoperation shell.
//!
//! Supported slash-commands:
//!   /help                       – show this list
//!   /status                     – session, link, distance, mode and speed
//!   /forward /backward /left /right – start moving (held until /stop)
//!   /stop                       – stop the robot
//!   /mode                       – request the opposite drive mode
//!   /speed <index>              – commit a speed step (0–5)
//!   /log                        – print the activity log
//!   /quit | /exit               – lower the presence beacon and exit

use colored::{ColoredString, Colorize};
use robodash_runtime::{DashboardHandle, InputEvent};
use robodash_types::{Command, LogEntry, LogLevel, SPEED_VALUES, SpeedIndex};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Status,
    Move(Command),
    Stop,
    Mode,
    Speed(SpeedIndex),
    Log,
    Quit,
}

impl ReplCommand {
    /// Parse one trimmed input line.
    pub fn parse(line: &str) -> Result<ReplCommand, String> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let command = match head {
            "/help" => ReplCommand::Help,
            "/status" => ReplCommand::Status,
            "/forward" => ReplCommand::Move(Command::Forward),
            "/backward" => ReplCommand::Move(Command::Backward),
            "/left" => ReplCommand::Move(Command::Left),
            "/right" => ReplCommand::Move(Command::Right),
            "/stop" => ReplCommand::Stop,
            "/mode" => ReplCommand::Mode,
            "/log" => ReplCommand::Log,
            "/quit" | "/exit" => ReplCommand::Quit,
            "/speed" => {
                let arg = words
                    .next()
                    .ok_or_else(|| format!("usage: /speed <0-{}>", SPEED_VALUES.len() - 1))?;
                let index = arg
                    .parse::<usize>()
                    .map_err(|_| format!("'{arg}' is not a speed step"))?;
                ReplCommand::Speed(SpeedIndex::new(index).map_err(|e| e.to_string())?)
            }
            other => return Err(format!("Unknown command: '{other}'")),
        };
        Ok(command)
    }

    /// The UI input this command stands for, if any.
    pub fn input(&self) -> Option<InputEvent> {
        match self {
            ReplCommand::Move(command) => Some(InputEvent::PointerDown { command: *command }),
            ReplCommand::Stop => Some(InputEvent::StopClick),
            ReplCommand::Mode => Some(InputEvent::ModeToggle),
            ReplCommand::Speed(index) => Some(InputEvent::SliderChange { index: *index }),
            _ => None,
        }
    }
}

/// Run the REPL until `/quit`, end of input or Ctrl-C at the prompt.
///
/// Blocking: call it from a plain thread, never from inside the runtime.
pub fn run(handle: DashboardHandle) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!(error = %e, "terminal editor unavailable; REPL disabled");
            return;
        }
    };

    loop {
        let line = match editor.readline("robodash> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match ReplCommand::parse(line) {
            Ok(ReplCommand::Help) => cmd_help(),
            Ok(ReplCommand::Status) => cmd_status(&handle),
            Ok(ReplCommand::Log) => cmd_log(&handle),
            Ok(ReplCommand::Quit) => break,
            Ok(command) => {
                if let Some(event) = command.input()
                    && let Err(e) = handle.send_input(event)
                {
                    println!("{}: {}", "Dashboard stopped".red(), e);
                    return;
                }
            }
            Err(message) => println!(
                "{}. Type {} for available commands.",
                message.red(),
                "/help".bold()
            ),
        }
    }

    println!("{}", "Goodbye.".green());
    if let Err(e) = handle.request_shutdown() {
        warn!(error = %e, "dashboard already stopped");
    }
}

fn cmd_help() {
    println!();
    println!("{}", "RoboDash Commands".bold().underline());
    println!("  {}  – session, link and telemetry", "/status".bold().cyan());
    println!("  {}  – start moving", "/forward /backward /left /right".bold().cyan());
    println!("  {}  – stop the robot", "/stop".bold().cyan());
    println!("  {}  – toggle manual/auto", "/mode".bold().cyan());
    println!("  {}  – set speed step 0-5", "/speed <index>".bold().cyan());
    println!("  {}  – show the activity log", "/log".bold().cyan());
    println!("  {}  – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_status(handle: &DashboardHandle) {
    let view = handle.view();
    let link = if view.robot_connected {
        "Robot: Online".green()
    } else {
        "Robot: Offline".red()
    };
    println!("  {}", view.session_label.bold());
    println!("  {}", link);
    println!("  Distance : {} cm", view.distance.yellow());
    println!("  Mode     : {}", view.mode.label().bold());
    println!(
        "  Speed    : {} (step {})",
        view.speed.to_string().yellow(),
        view.speed_index.index()
    );
    if !view.last_command.is_empty() {
        println!("  Last cmd : {}", view.last_command.bold());
    }
}

fn cmd_log(handle: &DashboardHandle) {
    let entries = handle.log();
    if entries.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for entry in &entries {
        println!("  {} {}", entry.clock().dimmed(), paint(entry));
    }
}

fn paint(entry: &LogEntry) -> ColoredString {
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Info => message.normal(),
        LogLevel::Ok => message.green(),
        LogLevel::Warn => message.yellow(),
        LogLevel::Bad => message.red(),
        LogLevel::Cmd => message.cyan(),
    }
}
