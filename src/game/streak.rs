//! m×n k-in-a-row games, with optional gravity (Tic-Tac-Toe, Gomoku, Connect Four).

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::game::{MoveGenerator, Outcome, Player, Position, ZobristKeys};
use crate::moves::{Candidate, move_buffer::MoveBuffer};

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

const WIN_NOW_PRIORITY: i32 = 10_000;
const BLOCK_PRIORITY: i32 = 5_000;

#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

/// Columns are letters, rows are 1-based from the top: `b3` is row 2, col 1.
impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.col) as char, self.row + 1)
    }
}

#[derive(Debug, Clone)]
pub struct StreakGame {
    width: usize,
    height: usize,
    streak: usize,
    gravity: bool,
    cells: Vec<Option<Player>>,
    stm: Player,
    moves_played: usize,
    winner: Option<Player>,
    hash: u64,
    keys: Arc<ZobristKeys>,
}

impl PartialEq for StreakGame {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.streak == other.streak
            && self.gravity == other.gravity
            && self.cells == other.cells
            && self.stm == other.stm
            && self.winner == other.winner
            && self.hash == other.hash
    }
}

impl Eq for StreakGame {}

impl StreakGame {
    pub fn new(width: usize, height: usize, streak: usize, gravity: bool) -> miette::Result<Self> {
        miette::ensure!(
            width > 0 && height > 0 && width <= 26 && height <= 26,
            "Board must be between 1x1 and 26x26, got {width}x{height}"
        );
        miette::ensure!(
            streak > 0 && streak <= width.max(height),
            "Streak {streak} can never fit on a {width}x{height} board"
        );
        Ok(Self::blank(width, height, streak, gravity))
    }

    pub fn tic_tac_toe() -> Self {
        Self::blank(3, 3, 3, false)
    }

    pub fn connect_four() -> Self {
        Self::blank(7, 6, 4, true)
    }

    /// Empty board of the given shape; callers have checked the dimensions.
    fn blank(width: usize, height: usize, streak: usize, gravity: bool) -> Self {
        let cells = width * height;
        Self {
            width,
            height,
            streak,
            gravity,
            cells: vec![None; cells],
            stm: Player::One,
            moves_played: 0,
            winner: None,
            hash: 0,
            keys: Arc::new(ZobristKeys::new(cells, Player::PLAYERS.len())),
        }
    }

    /// Builds a position from rows of `x`, `o` and `.`; the side to move is
    /// inferred from the stone count.
    pub fn from_rows(rows: &[&str], streak: usize, gravity: bool) -> miette::Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut game = Self::new(width, height, streak, gravity)?;
        for (row, line) in rows.iter().enumerate() {
            miette::ensure!(line.len() == width, "Row {row} has the wrong width");
            for (col, ch) in line.chars().enumerate() {
                let player = match ch {
                    'x' | 'X' => Some(Player::One),
                    'o' | 'O' => Some(Player::Two),
                    '.' => None,
                    other => miette::bail!("Unexpected character '{other}' in row {row}"),
                };
                if let Some(player) = player {
                    let idx = row * width + col;
                    game.cells[idx] = Some(player);
                    game.hash = game.keys.toggle(game.hash, idx, player.index());
                    game.moves_played += 1;
                }
            }
        }
        let ones = game.cells.iter().filter(|c| **c == Some(Player::One)).count();
        let twos = game.moves_played - ones;
        miette::ensure!(
            ones == twos || ones == twos + 1,
            "Stone counts {ones}/{twos} are not reachable"
        );
        if ones > twos {
            game.stm = Player::Two;
            game.hash ^= game.keys.second_to_move();
        }
        game.winner = game.find_winner();
        Ok(game)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn streak(&self) -> usize {
        self.streak
    }

    #[inline]
    pub fn get(&self, cell: Cell) -> Option<Player> {
        self.cells[self.index(cell)]
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        cell.row as usize * self.width + cell.col as usize
    }

    fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.height && (col as usize) < self.width
    }

    pub fn is_legal(&self, cell: Cell) -> bool {
        if self.winner.is_some() {
            return false;
        }
        let (row, col) = (cell.row as usize, cell.col as usize);
        if row >= self.height || col >= self.width || self.get(cell).is_some() {
            return false;
        }
        !self.gravity || row + 1 == self.height || self.cells[(row + 1) * self.width + col].is_some()
    }

    /// Accepts `b3` style coordinates, or a bare column letter with gravity.
    pub fn parse_move(&self, text: &str) -> miette::Result<Cell> {
        let text = text.trim().to_ascii_lowercase();
        let mut chars = text.chars();
        let col = match chars.next() {
            Some(c @ 'a'..='z') => (c as u8 - b'a') as usize,
            _ => miette::bail!("Expected a column letter in '{text}'"),
        };
        miette::ensure!(col < self.width, "Column out of range in '{text}'");
        let rest: String = chars.collect();
        let cell = if rest.is_empty() {
            miette::ensure!(self.gravity, "Missing row number in '{text}'");
            let row = (0..self.height)
                .rev()
                .find(|&row| self.cells[row * self.width + col].is_none());
            match row {
                Some(row) => Cell::new(row as u8, col as u8),
                None => miette::bail!("Column '{text}' is full"),
            }
        } else {
            let row: usize = rest
                .parse()
                .map_err(|_| miette::miette!("Bad row number in '{text}'"))?;
            miette::ensure!(row >= 1 && row <= self.height, "Row out of range in '{text}'");
            Cell::new((row - 1) as u8, col as u8)
        };
        miette::ensure!(self.is_legal(cell), "{cell} is not a legal move");
        Ok(cell)
    }

    /// Length of the longest line through `idx` if `player` owned it.
    fn line_length(&self, idx: usize, player: Player) -> usize {
        let row = (idx / self.width) as isize;
        let col = (idx % self.width) as isize;
        DIRECTIONS
            .iter()
            .map(|&(dr, dc)| {
                1 + self.run(row, col, dr, dc, player) + self.run(row, col, -dr, -dc, player)
            })
            .max()
            .unwrap_or(1)
    }

    fn run(&self, row: isize, col: isize, dr: isize, dc: isize, player: Player) -> usize {
        let mut count = 0;
        let (mut r, mut c) = (row + dr, col + dc);
        while self.in_bounds(r, c) && self.cells[r as usize * self.width + c as usize] == Some(player) {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    fn find_winner(&self) -> Option<Player> {
        self.cells.iter().enumerate().find_map(|(idx, &cell)| {
            cell.filter(|&player| self.line_length(idx, player) >= self.streak)
        })
    }

    /// Sum over every k-window of squared stone counts; windows holding both
    /// colours are dead and count for nothing.
    fn window_score(&self, player: Player) -> i32 {
        let k = self.streak as isize;
        let mut total = 0;
        for row in 0..self.height as isize {
            for col in 0..self.width as isize {
                for &(dr, dc) in &DIRECTIONS {
                    if !self.in_bounds(row + dr * (k - 1), col + dc * (k - 1)) {
                        continue;
                    }
                    let mut own = 0;
                    let mut dead = false;
                    for step in 0..k {
                        let idx = (row + dr * step) as usize * self.width + (col + dc * step) as usize;
                        match self.cells[idx] {
                            Some(p) if p == player => own += 1,
                            Some(_) => {
                                dead = true;
                                break;
                            }
                            None => {}
                        }
                    }
                    if !dead {
                        total += own * own;
                    }
                }
            }
        }
        total
    }

    fn centre_distance(&self, cell: Cell) -> i32 {
        let dr = (2 * cell.row as i32 - (self.height as i32 - 1)).abs();
        let dc = (2 * cell.col as i32 - (self.width as i32 - 1)).abs();
        dr + dc
    }
}

impl Position for StreakGame {
    type Move = Cell;
    type Undo = ();

    #[inline]
    fn side_to_move(&self) -> Player {
        self.stm
    }

    fn apply(&mut self, mv: &Cell) {
        debug_assert!(self.is_legal(*mv), "illegal move {mv}");
        let idx = self.index(*mv);
        let player = self.stm;
        self.cells[idx] = Some(player);
        self.hash = self.keys.toggle(self.hash, idx, player.index());
        self.hash ^= self.keys.second_to_move();
        self.moves_played += 1;
        if self.line_length(idx, player) >= self.streak {
            self.winner = Some(player);
        }
        self.stm = player.flip();
    }

    fn undo(&mut self, mv: &Cell, _undo: ()) {
        let idx = self.index(*mv);
        let player = self.stm.flip();
        debug_assert_eq!(self.cells[idx], Some(player), "undo of a move not played");
        self.cells[idx] = None;
        self.hash = self.keys.toggle(self.hash, idx, player.index());
        self.hash ^= self.keys.second_to_move();
        self.moves_played -= 1;
        self.winner = None;
        self.stm = player;
    }

    fn outcome(&self) -> Option<Outcome> {
        match self.winner {
            Some(player) => Some(Outcome::Win(player)),
            None if self.moves_played == self.cells.len() => Some(Outcome::Draw),
            None => None,
        }
    }

    fn score(&self, player: Player) -> i32 {
        (self.winner == Some(player)) as i32
    }

    #[inline]
    fn hash(&self) -> u64 {
        self.hash
    }

    fn evaluate(&self) -> i32 {
        if let Some(winner) = self.winner {
            return if winner == self.stm { 1 } else { -1 };
        }
        self.window_score(self.stm) - self.window_score(self.stm.flip())
    }
}

impl MoveGenerator for StreakGame {
    fn generate_moves(&self, moves: &mut MoveBuffer<Cell>) {
        moves.clear();
        if self.is_terminal() {
            return;
        }
        for row in 0..self.height {
            for col in 0..self.width {
                let cell = Cell::new(row as u8, col as u8);
                if !self.is_legal(cell) {
                    continue;
                }
                let idx = self.index(cell);
                let priority = if self.line_length(idx, self.stm) >= self.streak {
                    WIN_NOW_PRIORITY
                } else if self.line_length(idx, self.stm.flip()) >= self.streak {
                    BLOCK_PRIORITY
                } else {
                    -self.centre_distance(cell)
                };
                moves.push(Candidate::quiet(cell, priority));
            }
        }
        moves.sort_by_priority();
    }
}

impl Display for StreakGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "   ")?;
        for col in 0..self.width {
            write!(f, " {}", (b'a' + col as u8) as char)?;
        }
        writeln!(f)?;
        for row in 0..self.height {
            write!(f, "{:>3}", row + 1)?;
            for col in 0..self.width {
                let symbol = match self.cells[row * self.width + col] {
                    Some(Player::One) => 'X',
                    Some(Player::Two) => 'O',
                    None => '.',
                };
                write!(f, " {symbol}")?;
            }
            writeln!(f)?;
        }
        write!(f, "{} to move", self.stm)
    }
}
