// ABOUTME: Plain-text transcript of shell output backing the history view and find-in-buffer
// Drops escape sequences and applies carriage returns so each entry is one logical output line

use std::collections::VecDeque;

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Start,
    Csi,
    Osc,
    OscEnd,
    Designate,
}

/// Bounded line log fed with the same bytes as the vt100 screen.
#[derive(Debug)]
pub struct ScrollbackLog {
    lines: VecDeque<String>,
    current: Vec<char>,
    column: usize,
    capacity: usize,
    escape: Escape,
    csi_params: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl ScrollbackLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            current: Vec::new(),
            column: 0,
            capacity: capacity.max(1),
            escape: Escape::None,
            csi_params: String::new(),
            pending: Vec::new(),
        }
    }

    pub fn process(&mut self, data: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(data);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    text.chars().for_each(|c| self.feed(c));
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        text.chars().for_each(|c| self.feed(c));
                    }
                    match e.error_len() {
                        Some(len) => {
                            self.feed(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Completed lines plus the line being written.
    pub fn len(&self) -> usize {
        self.lines.len() + 1
    }

    /// Never true; the line being written always counts.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn line(&self, index: usize) -> Option<String> {
        match index.cmp(&self.lines.len()) {
            std::cmp::Ordering::Less => self.lines.get(index).cloned(),
            std::cmp::Ordering::Equal => Some(self.current.iter().collect()),
            std::cmp::Ordering::Greater => None,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.lines.iter().cloned().collect();
        lines.push(self.current.iter().collect());
        lines
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.capacity);
    }

    fn feed(&mut self, c: char) {
        match self.escape {
            Escape::None => match c {
                '\x1b' => self.escape = Escape::Start,
                '\n' => self.newline(),
                '\r' => self.column = 0,
                '\x08' => self.column = self.column.saturating_sub(1),
                '\t' => {
                    let next = (self.column / TAB_WIDTH + 1) * TAB_WIDTH;
                    while self.column < next {
                        self.put(' ');
                    }
                }
                c if c.is_control() => {}
                c => self.put(c),
            },
            Escape::Start => {
                self.escape = match c {
                    '[' => {
                        self.csi_params.clear();
                        Escape::Csi
                    }
                    ']' => Escape::Osc,
                    '(' | ')' | '*' | '+' | '#' => Escape::Designate,
                    _ => Escape::None,
                };
            }
            Escape::Designate => self.escape = Escape::None,
            Escape::Csi => {
                if ('\x40'..='\x7e').contains(&c) {
                    self.escape = Escape::None;
                    self.apply_csi(c);
                } else {
                    self.csi_params.push(c);
                }
            }
            Escape::Osc => match c {
                '\x07' => self.escape = Escape::None,
                '\x1b' => self.escape = Escape::OscEnd,
                _ => {}
            },
            Escape::OscEnd => {
                self.escape = if c == '\\' { Escape::None } else { Escape::Osc };
            }
        }
    }

    /// Cursor motion and erase within the current line; everything else is dropped.
    fn apply_csi(&mut self, action: char) {
        let param = self.csi_params.parse::<usize>().ok();
        match action {
            'K' => match param.unwrap_or(0) {
                0 => self.current.truncate(self.column),
                1 => {
                    let end = (self.column + 1).min(self.current.len());
                    self.current[..end].fill(' ');
                }
                _ => self.current.clear(),
            },
            'C' => self.column += param.unwrap_or(1).max(1),
            'D' => self.column = self.column.saturating_sub(param.unwrap_or(1).max(1)),
            'G' => self.column = param.unwrap_or(1).saturating_sub(1),
            _ => {}
        }
    }

    fn put(&mut self, c: char) {
        if self.column < self.current.len() {
            self.current[self.column] = c;
        } else {
            self.current.resize(self.column, ' ');
            self.current.push(c);
        }
        self.column += 1;
    }

    fn newline(&mut self) {
        let line: String = self.current.drain(..).collect();
        self.lines.push_back(line.trim_end().to_string());
        self.column = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }
}
