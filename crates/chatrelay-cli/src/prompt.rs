use anyhow::Result;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const PROMPT: &str = "\x1b[1m\x1b[38;5;30myou> \x1b[0m";

pub enum Input {
    /// The user sent a message
    Message(String),
    /// Nothing to send, read another line
    AskAgain,
    /// The user wants to leave the session
    Exit,
}

pub struct LinePrompt {
    editor: DefaultEditor,
}

impl LinePrompt {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    pub fn get_input(&mut self) -> Result<Input> {
        match self.editor.readline(PROMPT) {
            Ok(line) => {
                let input = classify(&line);
                if let Input::Message(text) = &input {
                    let _ = self.editor.add_history_entry(text.as_str());
                }
                Ok(input)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(Input::Exit),
            Err(e) => {
                eprintln!("Input error: {}", e);
                Ok(Input::Exit)
            }
        }
    }
}

pub fn print_help() {
    println!("Type a message and press enter to send it.");
    println!("  {}  leave the session", style("/exit").bold());
    println!("  {}  show this help", style("/help").bold());
}

fn classify(line: &str) -> Input {
    let text = line.trim();

    if text.is_empty() {
        Input::AskAgain
    } else if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
        Input::Exit
    } else if text.eq_ignore_ascii_case("/help") || text.eq_ignore_ascii_case("/?") {
        print_help();
        Input::AskAgain
    } else {
        Input::Message(text.to_string())
    }
}
