use chatrelay::models::conversation::Conversation;
use chatrelay::session::Renderer;
use console::style;
use std::io::Write;

/// Prints the assistant reply as it grows, writing only the new suffix each time
pub struct TerminalRenderer<W: Write> {
    out: W,
    printed: usize,
    streaming: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            streaming: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, conversation: &Conversation) {
        let Some(message) = conversation.in_flight() else {
            return;
        };

        if !self.streaming {
            self.streaming = true;
            self.printed = 0;
            let _ = write!(self.out, "{} ", style("assistant>").cyan().bold());
        }

        // The in-flight message only grows, so `printed` is always a char boundary
        let fresh = message.content.get(self.printed..).unwrap_or_default();
        let _ = self.out.write_all(fresh.as_bytes());
        let _ = self.out.flush();
        self.printed = message.content.len();
    }

    fn hide_busy(&mut self) {
        if self.streaming {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
        self.streaming = false;
        self.printed = 0;
    }
}
