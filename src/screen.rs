//! Screen capture using vtparse.
//!
//! [`ScreenState`] is a deliberately small terminal model: it tracks printable
//! characters on a fixed grid and the cursor movements and erasures that full
//! screen programs rely on. Colors and attributes are discarded, since captured
//! output is compared as text.
//!
//! # Example
//!
//! ```rust
//! use tui_stepcheck::ScreenState;
//!
//! let mut screen = ScreenState::new(20, 3);
//! screen.feed(b"Hello\r\n\x1b[1;31mWorld\x1b[0m");
//!
//! assert_eq!(screen.lines(), vec!["Hello", "World"]);
//! assert_eq!(screen.cursor_position(), (1, 5));
//! ```

use vtparse::{CsiParam, VTActor, VTParser};

/// DEC private mode switching to the alternate screen buffer.
const ALT_SCREEN_MODES: [i64; 3] = [47, 1047, 1049];

/// Grid of characters plus cursor, driven by vtparse callbacks.
struct Grid {
    cells: Vec<Vec<char>>,
    cursor: (u16, u16),
    width: u16,
    height: u16,
    // Set after printing in the last column; the next print wraps first
    wrap_pending: bool,
}

impl Grid {
    fn new(width: u16, height: u16) -> Self {
        Self {
            cells: vec![vec![' '; width as usize]; height as usize],
            cursor: (0, 0),
            width,
            height,
            wrap_pending: false,
        }
    }

    fn put_char(&mut self, ch: char) {
        if self.wrap_pending {
            self.cursor.1 = 0;
            self.line_feed();
        }
        let (row, col) = self.cursor;
        self.cells[row as usize][col as usize] = ch;
        if col + 1 < self.width {
            self.cursor.1 = col + 1;
        } else {
            self.wrap_pending = true;
        }
    }

    fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.0 + 1 < self.height {
            self.cursor.0 += 1;
        } else {
            self.cells.remove(0);
            self.cells.push(self.blank_row());
        }
    }

    fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.0 > 0 {
            self.cursor.0 -= 1;
        } else {
            self.cells.pop();
            self.cells.insert(0, self.blank_row());
        }
    }

    fn move_cursor(&mut self, row: u16, col: u16) {
        self.wrap_pending = false;
        self.cursor = (row.min(self.height - 1), col.min(self.width - 1));
    }

    fn blank_row(&self) -> Vec<char> {
        vec![' '; self.width as usize]
    }

    fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(' ');
        }
    }

    fn erase_in_display(&mut self, mode: i64) {
        let (row, col) = (self.cursor.0 as usize, self.cursor.1 as usize);
        match mode {
            0 => {
                self.cells[row][col..].fill(' ');
                for r in &mut self.cells[row + 1..] {
                    r.fill(' ');
                }
            }
            1 => {
                for r in &mut self.cells[..row] {
                    r.fill(' ');
                }
                self.cells[row][..=col].fill(' ');
            }
            2 | 3 => self.clear(),
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: i64) {
        let (row, col) = (self.cursor.0 as usize, self.cursor.1 as usize);
        let line = &mut self.cells[row];
        match mode {
            0 => line[col..].fill(' '),
            1 => line[..=col].fill(' '),
            2 => line.fill(' '),
            _ => {}
        }
    }
}

fn integers(params: &[CsiParam]) -> Vec<i64> {
    params.iter().filter_map(|p| p.as_integer()).collect()
}

// Movement counts of 0 mean 1
fn count(params: &[CsiParam]) -> u16 {
    params
        .iter()
        .find_map(|p| p.as_integer())
        .filter(|n| *n > 0)
        .unwrap_or(1)
        .min(u16::MAX as i64) as u16
}

fn is_private(params: &[CsiParam]) -> bool {
    params.iter().any(|p| matches!(p, CsiParam::P(b'?')))
}

impl VTActor for Grid {
    fn print(&mut self, ch: char) {
        self.put_char(ch);
    }

    fn execute_c0_or_c1(&mut self, control: u8) {
        match control {
            b'\r' => {
                self.wrap_pending = false;
                self.cursor.1 = 0;
            }
            b'\n' | 0x0b | 0x0c => self.line_feed(),
            0x08 => {
                self.wrap_pending = false;
                self.cursor.1 = self.cursor.1.saturating_sub(1);
            }
            b'\t' => {
                let next_tab = ((self.cursor.1 / 8) + 1) * 8;
                self.cursor.1 = next_tab.min(self.width - 1);
            }
            _ => {}
        }
    }

    fn dcs_hook(&mut self, _mode: u8, _params: &[i64], _intermediates: &[u8], _ignored: bool) {}

    fn dcs_put(&mut self, _byte: u8) {}

    fn dcs_unhook(&mut self) {}

    fn esc_dispatch(&mut self, _params: &[i64], intermediates: &[u8], _ignored: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'D' => self.line_feed(),
            b'E' => {
                self.line_feed();
                self.cursor.1 = 0;
            }
            b'M' => self.reverse_index(),
            b'c' => {
                self.clear();
                self.move_cursor(0, 0);
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &[CsiParam], _truncated: bool, byte: u8) {
        if is_private(params) {
            if matches!(byte, b'h' | b'l')
                && integers(params).iter().any(|m| ALT_SCREEN_MODES.contains(m))
            {
                self.clear();
            }
            return;
        }

        match byte {
            b'H' | b'f' => {
                let ints = integers(params);
                let row = ints.first().copied().unwrap_or(1).max(1) - 1;
                let col = ints.get(1).copied().unwrap_or(1).max(1) - 1;
                self.move_cursor(row.min(u16::MAX as i64) as u16, col.min(u16::MAX as i64) as u16);
            }
            b'A' => {
                let row = self.cursor.0.saturating_sub(count(params));
                self.move_cursor(row, self.cursor.1);
            }
            b'B' => {
                let row = self.cursor.0.saturating_add(count(params));
                self.move_cursor(row, self.cursor.1);
            }
            b'C' => {
                let col = self.cursor.1.saturating_add(count(params));
                self.move_cursor(self.cursor.0, col);
            }
            b'D' => {
                let col = self.cursor.1.saturating_sub(count(params));
                self.move_cursor(self.cursor.0, col);
            }
            b'G' => self.move_cursor(self.cursor.0, count(params) - 1),
            b'd' => self.move_cursor(count(params) - 1, self.cursor.1),
            b'J' => self.erase_in_display(integers(params).first().copied().unwrap_or(0)),
            b'K' => self.erase_in_line(integers(params).first().copied().unwrap_or(0)),
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, _params: &[&[u8]]) {}

    fn apc_dispatch(&mut self, _data: Vec<u8>) {}
}

/// The text currently shown on a virtual terminal screen.
///
/// Feed raw PTY output with [`feed`](Self::feed) and read the rendered rows
/// back with [`lines`](Self::lines).
pub struct ScreenState {
    parser: VTParser,
    grid: Grid,
}

impl std::fmt::Debug for ScreenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenState")
            .field("width", &self.grid.width)
            .field("height", &self.grid.height)
            .field("cursor", &self.grid.cursor)
            .finish()
    }
}

impl ScreenState {
    /// Creates an empty screen. Zero dimensions are raised to 1.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            parser: VTParser::new(),
            grid: Grid::new(width.max(1), height.max(1)),
        }
    }

    /// Processes raw terminal output. Data may be split at any byte.
    pub fn feed(&mut self, data: &[u8]) {
        self.parser.parse(data, &mut self.grid);
    }

    /// Returns every row, trailing spaces included.
    pub fn rows(&self) -> Vec<String> {
        self.grid.cells.iter().map(|row| row.iter().collect()).collect()
    }

    /// Returns the captured lines.
    ///
    /// Each row has its trailing whitespace trimmed and blank rows at the
    /// bottom of the screen are dropped. Blank rows between text are kept.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .grid
            .cells
            .iter()
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines
    }

    /// Returns the screen as one string, rows separated by newlines.
    pub fn contents(&self) -> String {
        self.rows().join("\n")
    }

    /// Checks if the screen shows `text` within a single row.
    pub fn contains(&self, text: &str) -> bool {
        self.grid
            .cells
            .iter()
            .any(|row| row.iter().collect::<String>().contains(text))
    }

    /// Returns the cursor position as (row, col), 0-based.
    pub fn cursor_position(&self) -> (u16, u16) {
        self.grid.cursor
    }

    /// Returns the screen size as (width, height).
    pub fn size(&self) -> (u16, u16) {
        (self.grid.width, self.grid.height)
    }
}
