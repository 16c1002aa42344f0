//! Bounded line assembly for console input.

/// Splits raw console bytes into newline-terminated lines.
///
/// A line that grows to `max_line` bytes without a newline is emitted as-is
/// and assembly continues with the rest, so no buffered line ever exceeds
/// `max_line` bytes.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    max_line: usize,
}

impl LineAssembler {
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_line),
            max_line: max_line.max(1),
        }
    }

    /// Feed input and return every line it completes, newline included.
    pub fn push(&mut self, mut input: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();

        while !input.is_empty() {
            let room = self.max_line - self.pending.len();
            let window = &input[..input.len().min(room)];

            match window.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.pending.extend_from_slice(&window[..=pos]);
                    lines.push(std::mem::take(&mut self.pending));
                    input = &input[pos + 1..];
                }
                None => {
                    self.pending.extend_from_slice(window);
                    input = &input[window.len()..];
                    if self.pending.len() == self.max_line {
                        lines.push(std::mem::take(&mut self.pending));
                    }
                }
            }
        }

        lines
    }

    /// Take whatever partial line is buffered.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// True for a line that is exactly `quit`, ignoring its line ending.
pub fn is_quit(line: &[u8]) -> bool {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    line == b"quit"
}
