// ABOUTME: Find-in-buffer overlay state for a terminal tab
// Case-insensitive substring search over scrollback plus screen, with wrapping navigation

/// One occurrence of the query in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Buffer line, scrollback first.
    pub line: usize,
    /// Character column within the line.
    pub column: usize,
    /// Match length in characters.
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct SearchOverlay {
    visible: bool,
    query: String,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
}

impl SearchOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn open(&mut self) {
        self.visible = true;
    }

    /// Hide the overlay. The query is kept for the next open.
    pub fn close(&mut self) {
        self.visible = false;
        self.matches.clear();
        self.current = None;
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.invalidate();
    }

    pub fn backspace(&mut self) {
        if self.query.pop().is_some() {
            self.invalidate();
        }
    }

    fn invalidate(&mut self) {
        self.matches.clear();
        self.current = None;
    }

    /// Advance to the next match after re-scanning `lines`, wrapping at the end.
    pub fn find_next(&mut self, lines: &[String]) -> Option<SearchMatch> {
        self.refresh(lines);
        if self.matches.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(i) => (i + 1) % self.matches.len(),
            None => 0,
        };
        self.current = Some(next);
        self.matches.get(next).copied()
    }

    /// Step back to the previous match, wrapping at the start.
    pub fn find_previous(&mut self, lines: &[String]) -> Option<SearchMatch> {
        self.refresh(lines);
        if self.matches.is_empty() {
            return None;
        }
        let previous = match self.current {
            Some(0) | None => self.matches.len() - 1,
            Some(i) => i - 1,
        };
        self.current = Some(previous);
        self.matches.get(previous).copied()
    }

    /// `(current, total)` with a 1-based current index, once a search has run.
    pub fn counter(&self) -> Option<(usize, usize)> {
        self.current.map(|i| (i + 1, self.matches.len()))
    }

    pub fn current_match(&self) -> Option<SearchMatch> {
        self.current.and_then(|i| self.matches.get(i).copied())
    }

    fn refresh(&mut self, lines: &[String]) {
        let found = find_all(lines, &self.query);
        if found != self.matches {
            // Keep the position when the buffer grew but earlier matches are unchanged
            let keep = self
                .current
                .filter(|&i| self.matches.get(i).is_some() && found.get(i) == self.matches.get(i));
            self.matches = found;
            self.current = keep;
        }
    }
}

/// Lowercase `text` char by char, recording the source column of each folded char.
fn fold(text: &str) -> (Vec<char>, Vec<usize>) {
    let mut folded = Vec::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (column, c) in text.chars().enumerate() {
        for lower in c.to_lowercase() {
            folded.push(lower);
            origin.push(column);
        }
    }
    (folded, origin)
}

/// Every case-insensitive occurrence of `query` in `lines`, in source columns.
pub fn find_all(lines: &[String], query: &str) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let (needle, _) = fold(query);
    let mut matches = Vec::new();

    for (line_index, line) in lines.iter().enumerate() {
        let (haystack, origin) = fold(line);
        let mut start = 0;
        while start + needle.len() <= haystack.len() {
            let end = start + needle.len();
            // Matches must begin and end on whole source chars
            let aligned = (start == 0 || origin[start - 1] != origin[start])
                && (end == haystack.len() || origin[end] != origin[end - 1]);
            if aligned && haystack[start..end] == needle[..] {
                let column = origin[start];
                matches.push(SearchMatch {
                    line: line_index,
                    column,
                    len: origin[end - 1] - column + 1,
                });
                start = end;
            } else {
                start += 1;
            }
        }
    }
    matches
}
