use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::OnceLock;
use vte::{Params, Parser, Perform};

/// VT100/ANSI emulator surface wrapping the `vte` parser.
/// Tracks the visible grid, cursor, pen attributes and scrollback, plus the
/// alternate screen and scroll region full-screen programs rely on.
pub struct VtEmulator {
    parser: Parser,
    screen: Screen,
}

/// A single cell in the terminal grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub underline: bool,
}

/// Terminal color representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            bold: false,
            underline: false,
        }
    }
}

impl Cell {
    /// A blank cell carrying the pen's background.
    fn blank(pen: &Cell) -> Self {
        Self {
            bg: pen.bg,
            ..Cell::default()
        }
    }
}

/// A web link detected in the visible screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Link {
    pub row: usize,
    pub start_col: usize,
    /// Exclusive.
    pub end_col: usize,
    pub url: String,
}

/// Cursor state saved by DECSC / `CSI s`.
#[derive(Clone, Copy)]
struct SavedCursor {
    x: usize,
    y: usize,
    pen: Cell,
}

struct Screen {
    cursor_x: usize,
    cursor_y: usize,
    cols: usize,
    rows: usize,
    cells: Vec<Vec<Cell>>,
    scrollback: VecDeque<Vec<Cell>>,
    scrollback_limit: usize,
    pen: Cell,
    title: Option<String>,
    /// Inclusive scroll region rows.
    scroll_top: usize,
    scroll_bottom: usize,
    saved_cursor: Option<SavedCursor>,
    /// Primary grid, parked while the alternate screen is shown.
    primary: Option<Vec<Vec<Cell>>>,
    cursor_visible: bool,
}

impl VtEmulator {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_scrollback(cols, rows, 1000)
    }

    pub fn with_scrollback(cols: usize, rows: usize, scrollback_limit: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            parser: Parser::new(),
            screen: Screen {
                cursor_x: 0,
                cursor_y: 0,
                cols,
                rows,
                cells: blank_grid(cols, rows),
                scrollback: VecDeque::new(),
                scrollback_limit,
                pen: Cell::default(),
                title: None,
                scroll_top: 0,
                scroll_bottom: rows - 1,
                saved_cursor: None,
                primary: None,
                cursor_visible: true,
            },
        }
    }

    /// Feed raw output bytes into the VT parser.
    pub fn process(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.screen, bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.process(text.as_bytes());
    }

    /// Resize the grid.
    ///
    /// Shrinking drops blank rows below the cursor first; any further rows
    /// leave from the top and go to scrollback, so no written line is lost.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let Screen {
            cells,
            primary,
            scrollback,
            scrollback_limit,
            cursor_x,
            cursor_y,
            saved_cursor,
            ..
        } = &mut self.screen;

        match primary {
            // The alternate screen has no history; the parked primary grid
            // is resized as if it were showing.
            Some(primary) => {
                fit_rows(cells, cursor_y, rows, |_| {});
                let mut parked_y = saved_cursor.map_or(0, |s| s.y);
                fit_rows(primary, &mut parked_y, rows, |line| {
                    push_line(scrollback, *scrollback_limit, line)
                });
                if let Some(saved) = saved_cursor.as_mut() {
                    saved.y = parked_y;
                }
                fit_cols(primary, cols);
            }
            None => fit_rows(cells, cursor_y, rows, |line| {
                push_line(scrollback, *scrollback_limit, line)
            }),
        }
        fit_cols(cells, cols);

        *cursor_x = (*cursor_x).min(cols - 1);
        *cursor_y = (*cursor_y).min(rows - 1);
        if let Some(saved) = saved_cursor.as_mut() {
            saved.x = saved.x.min(cols - 1);
            saved.y = saved.y.min(rows - 1);
        }

        let screen = &mut self.screen;
        screen.cols = cols;
        screen.rows = rows;
        screen.scroll_top = 0;
        screen.scroll_bottom = rows - 1;
    }

    /// Blank the visible screen and home the cursor. Lines already written
    /// are kept in scrollback.
    pub fn clear_screen(&mut self) {
        let screen = &mut self.screen;
        if screen.primary.is_none() {
            let used = screen
                .cells
                .iter()
                .rposition(|row| !is_blank(row))
                .map_or(0, |last| last + 1);
            let rows: Vec<Vec<Cell>> = screen.cells.drain(..used).collect();
            for row in rows {
                screen.push_scrollback(row);
            }
        }
        screen.cells = blank_grid(screen.cols, screen.rows);
        screen.cursor_x = 0;
        screen.cursor_y = 0;
    }

    pub fn cols(&self) -> usize {
        self.screen.cols
    }

    pub fn rows(&self) -> usize {
        self.screen.rows
    }

    /// Cursor as (column, row), zero based.
    pub fn cursor(&self) -> (usize, usize) {
        (self.screen.cursor_x, self.screen.cursor_y)
    }

    pub fn cursor_visible(&self) -> bool {
        self.screen.cursor_visible
    }

    pub fn is_alternate_screen(&self) -> bool {
        self.screen.primary.is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.screen.cells.get(row).and_then(|r| r.get(col))
    }

    /// Window title set by OSC 0/2.
    pub fn title(&self) -> Option<&str> {
        self.screen.title.as_deref()
    }

    /// Get the text content of a specific visible line.
    pub fn get_line_text(&self, row: usize) -> String {
        self.screen
            .cells
            .get(row)
            .map(|r| line_text(r))
            .unwrap_or_default()
    }

    /// All visible lines, trailing blanks trimmed.
    pub fn visible_lines(&self) -> Vec<String> {
        self.screen
            .cells
            .iter()
            .map(|r| line_text(r).trim_end().to_string())
            .collect()
    }

    pub fn scrollback_len(&self) -> usize {
        self.screen.scrollback.len()
    }

    /// Scrollback line, 0 being the oldest.
    pub fn scrollback_line(&self, index: usize) -> Option<String> {
        self.screen.scrollback.get(index).map(|r| line_text(r))
    }

    /// Scrollback followed by the visible screen.
    pub fn transcript(&self) -> String {
        self.screen
            .scrollback
            .iter()
            .chain(self.screen.cells.iter())
            .map(|r| line_text(r).trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// http(s) links on the visible screen, for hosts to make clickable.
    pub fn links(&self) -> Vec<Link> {
        let Some(pattern) = url_pattern() else {
            return Vec::new();
        };
        let mut links = Vec::new();
        for (row, cells) in self.screen.cells.iter().enumerate() {
            let text = line_text(cells);
            for m in pattern.find_iter(&text) {
                let start_col = text[..m.start()].chars().count();
                links.push(Link {
                    row,
                    start_col,
                    end_col: start_col + m.as_str().chars().count(),
                    url: m.as_str().to_string(),
                });
            }
        }
        links
    }
}

/// Same shape the browser terminal's link addon matches: no trailing
/// punctuation, no quotes or brackets.
fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"https?://[^\s"'!*(){}|\\^<>`]*[^\s"':,.!?{}|\\^~\[\]`()<>]"#).ok()
        })
        .as_ref()
}

fn blank_grid(cols: usize, rows: usize) -> Vec<Vec<Cell>> {
    vec![vec![Cell::default(); cols]; rows]
}

fn is_blank(row: &[Cell]) -> bool {
    row.iter().all(|c| c.ch == ' ')
}

fn line_text(row: &[Cell]) -> String {
    row.iter().map(|c| c.ch).collect()
}

fn push_line(scrollback: &mut VecDeque<Vec<Cell>>, limit: usize, line: Vec<Cell>) {
    if limit == 0 {
        return;
    }
    if scrollback.len() >= limit {
        scrollback.pop_front();
    }
    scrollback.push_back(line);
}

/// Bring `cells` to `rows` rows, keeping `cursor_y` on the same line.
fn fit_rows(
    cells: &mut Vec<Vec<Cell>>,
    cursor_y: &mut usize,
    rows: usize,
    mut evict: impl FnMut(Vec<Cell>),
) {
    let cols = cells.first().map_or(1, Vec::len);
    while cells.len() > rows {
        let last = cells.len() - 1;
        if last > *cursor_y && is_blank(&cells[last]) {
            cells.pop();
        } else {
            evict(cells.remove(0));
            *cursor_y = cursor_y.saturating_sub(1);
        }
    }
    cells.resize(rows, vec![Cell::default(); cols]);
}

fn fit_cols(cells: &mut [Vec<Cell>], cols: usize) {
    for row in cells.iter_mut() {
        row.resize(cols, Cell::default());
    }
}

/// Numeric parameter `index`, with 0 or missing meaning `default`.
fn param(params: &Params, index: usize, default: usize) -> usize {
    match params.iter().nth(index).and_then(|p| p.first().copied()) {
        Some(0) | None => default,
        Some(n) => n as usize,
    }
}

impl Screen {
    fn push_scrollback(&mut self, line: Vec<Cell>) {
        push_line(&mut self.scrollback, self.scrollback_limit, line);
    }

    fn blank_line(&self) -> Vec<Cell> {
        vec![Cell::blank(&self.pen); self.cols]
    }

    /// Scroll the region up by `n`. Lines leaving the top of the full
    /// primary screen go to scrollback.
    fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let to_history = top == 0 && self.primary.is_none();
        for _ in 0..n.min(bottom - top + 1) {
            let line = self.cells.remove(top);
            if to_history {
                self.push_scrollback(line);
            }
            let blank = self.blank_line();
            self.cells.insert(bottom, blank);
        }
    }

    fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        for _ in 0..n.min(bottom - top + 1) {
            self.cells.remove(bottom);
            let blank = self.blank_line();
            self.cells.insert(top, blank);
        }
    }

    fn line_feed(&mut self) {
        if self.cursor_y == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor_y + 1 < self.rows {
            self.cursor_y += 1;
        }
    }

    fn reverse_index(&mut self) {
        if self.cursor_y == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor_y = self.cursor_y.saturating_sub(1);
        }
    }

    fn in_scroll_region(&self) -> bool {
        (self.scroll_top..=self.scroll_bottom).contains(&self.cursor_y)
    }

    fn insert_lines(&mut self, n: usize) {
        if !self.in_scroll_region() {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n.min(bottom - self.cursor_y + 1) {
            self.cells.remove(bottom);
            let blank = self.blank_line();
            self.cells.insert(self.cursor_y, blank);
        }
        self.cursor_x = 0;
    }

    fn delete_lines(&mut self, n: usize) {
        if !self.in_scroll_region() {
            return;
        }
        let bottom = self.scroll_bottom;
        for _ in 0..n.min(bottom - self.cursor_y + 1) {
            self.cells.remove(self.cursor_y);
            let blank = self.blank_line();
            self.cells.insert(bottom, blank);
        }
        self.cursor_x = 0;
    }

    fn insert_chars(&mut self, n: usize) {
        let blank = Cell::blank(&self.pen);
        let (x, cols) = (self.cursor_x.min(self.cols - 1), self.cols);
        let line = &mut self.cells[self.cursor_y];
        for _ in 0..n.min(cols - x) {
            line.insert(x, blank);
        }
        line.truncate(cols);
    }

    fn delete_chars(&mut self, n: usize) {
        let blank = Cell::blank(&self.pen);
        let (x, cols) = (self.cursor_x.min(self.cols - 1), self.cols);
        let line = &mut self.cells[self.cursor_y];
        for _ in 0..n.min(cols - x) {
            line.remove(x);
            line.push(blank);
        }
    }

    fn erase(&mut self, row: usize, from: usize, to: usize) {
        let blank = Cell::blank(&self.pen);
        if let Some(line) = self.cells.get_mut(row) {
            let to = to.min(line.len());
            for cell in line.iter_mut().take(to).skip(from) {
                *cell = blank;
            }
        }
    }

    fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let bottom = bottom.min(self.rows);
        if top < bottom {
            self.scroll_top = top - 1;
            self.scroll_bottom = bottom - 1;
            self.cursor_x = 0;
            self.cursor_y = 0;
        }
    }

    fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            x: self.cursor_x,
            y: self.cursor_y,
            pen: self.pen,
        });
    }

    fn restore_cursor(&mut self) {
        match self.saved_cursor {
            Some(saved) => {
                self.cursor_x = saved.x.min(self.cols - 1);
                self.cursor_y = saved.y.min(self.rows - 1);
                self.pen = saved.pen;
            }
            None => {
                self.cursor_x = 0;
                self.cursor_y = 0;
                self.pen = Cell::default();
            }
        }
    }

    fn enter_alternate_screen(&mut self, save_cursor: bool) {
        if self.primary.is_some() {
            return;
        }
        if save_cursor {
            self.save_cursor();
        }
        let alternate = blank_grid(self.cols, self.rows);
        self.primary = Some(std::mem::replace(&mut self.cells, alternate));
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
    }

    fn leave_alternate_screen(&mut self, restore_cursor: bool) {
        let Some(primary) = self.primary.take() else {
            return;
        };
        self.cells = primary;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        if restore_cursor {
            self.restore_cursor();
        }
    }

    fn set_private_mode(&mut self, params: &Params, enable: bool) {
        for mode in params.iter().filter_map(|p| p.first().copied()) {
            match (mode, enable) {
                (25, _) => self.cursor_visible = enable,
                (47 | 1047, true) => self.enter_alternate_screen(false),
                (47 | 1047, false) => self.leave_alternate_screen(false),
                (1048, true) => self.save_cursor(),
                (1048, false) => self.restore_cursor(),
                (1049, true) => self.enter_alternate_screen(true),
                (1049, false) => self.leave_alternate_screen(true),
                _ => log::trace!("Unhandled private mode {}", mode),
            }
        }
    }

    fn reset(&mut self) {
        self.leave_alternate_screen(false);
        self.pen = Cell::default();
        self.cells = blank_grid(self.cols, self.rows);
        self.cursor_x = 0;
        self.cursor_y = 0;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows - 1;
        self.saved_cursor = None;
        self.cursor_visible = true;
    }

    fn select_graphic_rendition(&mut self, params: &Params) {
        let values: Vec<u16> = params.iter().flatten().copied().collect();
        if values.is_empty() {
            self.pen = Cell::default();
            return;
        }

        let mut i = 0;
        while i < values.len() {
            match values[i] {
                0 => self.pen = Cell::default(),
                1 => self.pen.bold = true,
                4 => self.pen.underline = true,
                22 => self.pen.bold = false,
                24 => self.pen.underline = false,
                n @ 30..=37 => self.pen.fg = Color::Indexed((n - 30) as u8),
                39 => self.pen.fg = Color::Default,
                n @ 40..=47 => self.pen.bg = Color::Indexed((n - 40) as u8),
                49 => self.pen.bg = Color::Default,
                n @ 90..=97 => self.pen.fg = Color::Indexed((n - 90 + 8) as u8),
                n @ 100..=107 => self.pen.bg = Color::Indexed((n - 100 + 8) as u8),
                38 | 48 => {
                    let (color, used) = extended_color(&values[i + 1..]);
                    if let Some(color) = color {
                        if values[i] == 38 {
                            self.pen.fg = color;
                        } else {
                            self.pen.bg = color;
                        }
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse the tail of `38;5;n` / `38;2;r;g;b`. Returns the colour and how many
/// values were consumed.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest {
        [5, n, ..] => (Some(Color::Indexed(*n as u8)), 2),
        [2, r, g, b, ..] => (Some(Color::Rgb(*r as u8, *g as u8, *b as u8)), 4),
        [5, ..] => (None, rest.len()),
        [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

impl Perform for Screen {
    fn print(&mut self, ch: char) {
        if self.cursor_x >= self.cols {
            self.cursor_x = 0;
            self.line_feed();
        }
        let mut cell = self.pen;
        cell.ch = ch;
        self.cells[self.cursor_y][self.cursor_x] = cell;
        self.cursor_x += 1;
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // Newline (LF, VT, FF)
            b'\n' | 0x0b | 0x0c => self.line_feed(),
            b'\r' => self.cursor_x = 0,
            // Backspace
            0x08 => self.cursor_x = self.cursor_x.min(self.cols - 1).saturating_sub(1),
            b'\t' => {
                let next_tab = (self.cursor_x / 8 + 1) * 8;
                self.cursor_x = next_tab.min(self.cols - 1);
            }
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        if let [kind, title, ..] = params {
            if *kind == b"0" || *kind == b"2" {
                self.title = Some(String::from_utf8_lossy(title).into_owned());
            }
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        if intermediates.first() == Some(&b'?') {
            match action {
                'h' => self.set_private_mode(params, true),
                'l' => self.set_private_mode(params, false),
                _ => log::trace!("Unhandled private CSI action {:?}", action),
            }
            return;
        }

        let first = params.iter().next().and_then(|p| p.first().copied()).unwrap_or(0);
        let count = param(params, 0, 1);

        match action {
            'A' => self.cursor_y = self.cursor_y.saturating_sub(count),
            'B' => self.cursor_y = (self.cursor_y + count).min(self.rows - 1),
            'C' => self.cursor_x = (self.cursor_x + count).min(self.cols - 1),
            'D' => self.cursor_x = self.cursor_x.min(self.cols - 1).saturating_sub(count),
            // Cursor Horizontal Absolute
            'G' => self.cursor_x = (count - 1).min(self.cols - 1),
            // Line Position Absolute
            'd' => self.cursor_y = (count - 1).min(self.rows - 1),
            'H' | 'f' => {
                let col = param(params, 1, 1);
                self.cursor_y = (count - 1).min(self.rows - 1);
                self.cursor_x = (col - 1).min(self.cols - 1);
            }
            // Erase in Display
            'J' => match first {
                0 => {
                    self.erase(self.cursor_y, self.cursor_x, self.cols);
                    for y in (self.cursor_y + 1)..self.rows {
                        self.erase(y, 0, self.cols);
                    }
                }
                1 => {
                    for y in 0..self.cursor_y {
                        self.erase(y, 0, self.cols);
                    }
                    self.erase(self.cursor_y, 0, self.cursor_x + 1);
                }
                2 | 3 => {
                    for y in 0..self.rows {
                        self.erase(y, 0, self.cols);
                    }
                    if first == 3 {
                        self.scrollback.clear();
                    }
                }
                _ => {}
            },
            // Erase in Line
            'K' => match first {
                0 => self.erase(self.cursor_y, self.cursor_x, self.cols),
                1 => self.erase(self.cursor_y, 0, self.cursor_x + 1),
                2 => self.erase(self.cursor_y, 0, self.cols),
                _ => {}
            },
            'L' => self.insert_lines(count),
            'M' => self.delete_lines(count),
            '@' => self.insert_chars(count),
            'P' => self.delete_chars(count),
            // Erase Character
            'X' => self.erase(self.cursor_y, self.cursor_x, self.cursor_x + count),
            'S' => self.scroll_up(count),
            'T' => self.scroll_down(count),
            'r' => self.set_scroll_region(param(params, 0, 1), param(params, 1, self.rows)),
            's' => self.save_cursor(),
            'u' => self.restore_cursor(),
            'm' => self.select_graphic_rendition(params),
            _ => log::trace!("Unhandled CSI action {:?}", action),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            // Index
            b'D' => self.line_feed(),
            // Next Line
            b'E' => {
                self.cursor_x = 0;
                self.line_feed();
            }
            b'M' => self.reverse_index(),
            // RIS
            b'c' => self.reset(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_basic() {
        let mut emu = VtEmulator::new(80, 24);
        emu.process(b"Hello, box!");
        assert_eq!(emu.get_line_text(0).trim(), "Hello, box!");
        assert_eq!(emu.cursor(), (11, 0));
    }

    #[test]
    fn test_newline() {
        let mut emu = VtEmulator::new(80, 24);
        emu.process(b"Line1\r\nLine2");
        assert_eq!(emu.get_line_text(0).trim(), "Line1");
        assert_eq!(emu.get_line_text(1).trim(), "Line2");
    }

    #[test]
    fn test_cursor_movement() {
        let mut emu = VtEmulator::new(80, 24);
        // ESC[5;10H moves cursor to row 5, col 10
        emu.process(b"\x1b[5;10HX");
        assert_eq!(emu.cell(4, 9).unwrap().ch, 'X');
    }

    #[test]
    fn test_clear_screen_sequence() {
        let mut emu = VtEmulator::new(80, 24);
        emu.process(b"Some text");
        emu.process(b"\x1b[2J");
        assert_eq!(emu.get_line_text(0).trim(), "");
    }

    #[test]
    fn test_sgr_colors() {
        let mut emu = VtEmulator::new(20, 2);
        emu.write_str("\x1b[1;32mok\x1b[0m \x1b[38;5;208mx\x1b[38;2;1;2;3my\x1b[91mz");
        let ok = emu.cell(0, 0).unwrap();
        assert_eq!(ok.fg, Color::Indexed(2));
        assert!(ok.bold);
        assert_eq!(emu.cell(0, 2).unwrap().fg, Color::Default);
        assert_eq!(emu.cell(0, 3).unwrap().fg, Color::Indexed(208));
        assert_eq!(emu.cell(0, 4).unwrap().fg, Color::Rgb(1, 2, 3));
        assert_eq!(emu.cell(0, 5).unwrap().fg, Color::Indexed(9));
    }

    #[test]
    fn test_scrolling_feeds_scrollback() {
        let mut emu = VtEmulator::with_scrollback(10, 2, 2);
        emu.write_str("a\r\nb\r\nc\r\nd");
        assert_eq!(emu.visible_lines(), vec!["c", "d"]);
        assert_eq!(emu.scrollback_len(), 2);
        assert_eq!(emu.scrollback_line(0).unwrap().trim(), "a");

        emu.write_str("\r\ne");
        assert_eq!(emu.scrollback_len(), 2);
        assert_eq!(emu.scrollback_line(0).unwrap().trim(), "b");
    }

    #[test]
    fn test_clear_screen_keeps_history() {
        let mut emu = VtEmulator::new(10, 4);
        emu.write_str("one\r\ntwo");
        emu.clear_screen();
        assert_eq!(emu.cursor(), (0, 0));
        assert!(emu.visible_lines().iter().all(|l| l.is_empty()));
        assert_eq!(emu.scrollback_len(), 2);
        assert_eq!(emu.transcript().lines().next(), Some("one"));
    }

    #[test]
    fn test_wraps_at_right_margin() {
        let mut emu = VtEmulator::new(4, 3);
        emu.write_str("abcdef");
        assert_eq!(emu.get_line_text(0), "abcd");
        assert_eq!(emu.get_line_text(1).trim(), "ef");
    }

    #[test]
    fn test_resize_keeps_cursor_in_bounds() {
        let mut emu = VtEmulator::new(80, 24);
        emu.write_str("\x1b[24;80Hx");
        emu.resize(40, 10);
        let (x, y) = emu.cursor();
        assert!(x < 40 && y < 10);
        assert_eq!(emu.cols(), 40);
        assert_eq!(emu.rows(), 10);
        assert!(emu.scrollback_len() > 0);
    }

    #[test]
    fn test_shrink_drops_blank_rows_below_cursor_first() {
        let mut emu = VtEmulator::new(80, 24);
        emu.write_str("a\r\nb\r\n$ ");
        emu.resize(80, 20);

        assert_eq!(&emu.visible_lines()[..3], &["a", "b", "$"]);
        assert_eq!(emu.scrollback_len(), 0);
        assert_eq!(emu.cursor(), (2, 2));
    }

    #[test]
    fn test_shrink_moves_text_below_cursor_into_history() {
        let mut emu = VtEmulator::new(10, 6);
        emu.write_str("1\r\n2\r\n3\r\n4\r\n5\r\n6\x1b[H");
        emu.resize(10, 3);

        assert_eq!(emu.transcript(), "1\n2\n3\n4\n5\n6");
        assert_eq!(emu.visible_lines(), vec!["4", "5", "6"]);
        assert_eq!(emu.cursor(), (0, 0));
    }

    #[test]
    fn test_grow_then_shrink_is_lossless() {
        let mut emu = VtEmulator::new(10, 3);
        emu.write_str("x\r\ny\r\nz");
        emu.resize(10, 8);
        emu.resize(10, 3);
        assert_eq!(emu.visible_lines(), vec!["x", "y", "z"]);
        assert_eq!(emu.scrollback_len(), 0);
    }

    #[test]
    fn test_scroll_region_keeps_margins() {
        let mut emu = VtEmulator::new(10, 5);
        emu.write_str("\x1b[1;1Htop\x1b[5;1Hbot\x1b[2;4r\x1b[2;1Hl1\r\nl2\r\nl3\r\nl4");
        assert_eq!(emu.visible_lines(), vec!["top", "l2", "l3", "l4", "bot"]);
        assert_eq!(emu.scrollback_len(), 0);
    }

    #[test]
    fn test_reverse_index_at_region_top() {
        let mut emu = VtEmulator::new(10, 3);
        emu.write_str("a\r\nb\r\nc\x1b[H\x1bM");
        assert_eq!(emu.visible_lines(), vec!["", "a", "b"]);
    }

    #[test]
    fn test_insert_and_delete_lines() {
        let mut emu = VtEmulator::new(10, 4);
        emu.write_str("a\r\nb\r\nc\r\nd\x1b[2;1H\x1b[L");
        assert_eq!(emu.visible_lines(), vec!["a", "", "b", "c"]);
        emu.write_str("\x1b[M");
        assert_eq!(emu.visible_lines(), vec!["a", "b", "c", ""]);
    }

    #[test]
    fn test_insert_delete_and_erase_chars() {
        let mut emu = VtEmulator::new(10, 1);
        emu.write_str("abcdef\x1b[1;3H\x1b[2@");
        assert_eq!(emu.get_line_text(0).trim_end(), "ab  cdef");
        emu.write_str("\x1b[2P");
        assert_eq!(emu.get_line_text(0).trim_end(), "abcdef");
        emu.write_str("\x1b[1;2H\x1b[3X");
        assert_eq!(emu.get_line_text(0).trim_end(), "a   ef");
    }

    #[test]
    fn test_scroll_up_and_down() {
        let mut emu = VtEmulator::new(10, 3);
        emu.write_str("1\r\n2\r\n3\x1b[S");
        assert_eq!(emu.visible_lines(), vec!["2", "3", ""]);
        emu.write_str("\x1b[2T");
        assert_eq!(emu.visible_lines(), vec!["", "", "2"]);
    }

    #[test]
    fn test_save_and_restore_cursor() {
        let mut emu = VtEmulator::new(10, 5);
        emu.write_str("\x1b[3;4H\x1b7\x1b[1;1H\x1b8X");
        assert_eq!(emu.cell(2, 3).unwrap().ch, 'X');

        emu.write_str("\x1b[2;2H\x1b[s\x1b[5;5H\x1b[uY");
        assert_eq!(emu.cell(1, 1).unwrap().ch, 'Y');
    }

    #[test]
    fn test_alternate_screen_restores_primary() {
        let mut emu = VtEmulator::new(10, 2);
        emu.write_str("prompt$ ");
        emu.write_str("\x1b[?1049h");
        assert!(emu.is_alternate_screen());
        assert!(emu.visible_lines().iter().all(|l| l.is_empty()));

        emu.write_str("a\r\nb\r\nc\r\ntui");
        assert_eq!(emu.scrollback_len(), 0);

        emu.write_str("\x1b[?1049l");
        assert!(!emu.is_alternate_screen());
        assert_eq!(emu.visible_lines(), vec!["prompt$", ""]);
        assert_eq!(emu.cursor(), (8, 0));
    }

    #[test]
    fn test_cursor_visibility_mode() {
        let mut emu = VtEmulator::new(10, 2);
        emu.write_str("\x1b[?25l");
        assert!(!emu.cursor_visible());
        emu.write_str("\x1b[?25h");
        assert!(emu.cursor_visible());
    }

    #[test]
    fn test_detects_links() {
        let mut emu = VtEmulator::new(60, 2);
        emu.write_str("see https://example.com/docs, and\r\n(http://x.io/a?b=1).");

        let links = emu.links();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0],
            Link {
                row: 0,
                start_col: 4,
                end_col: 28,
                url: "https://example.com/docs".to_string(),
            }
        );
        assert_eq!(links[1].row, 1);
        assert_eq!(links[1].url, "http://x.io/a?b=1");
    }

    #[test]
    fn test_osc_title() {
        let mut emu = VtEmulator::new(10, 2);
        emu.write_str("\x1b]0;box-1: bash\x07");
        assert_eq!(emu.title(), Some("box-1: bash"));
        assert_eq!(emu.get_line_text(0).trim(), "");
    }
}
