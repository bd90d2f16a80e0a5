//! Dots and Boxes: the capture-chain game.
//!
//! Boxes are the vertices and undrawn edges the links of the dual
//! ("strings and coins") graph, so a box's degree is its number of undrawn
//! sides. A box of degree 1 can be captured; capturing it may expose the next
//! box of a chain, which is why captures are generated as compound moves.

use std::fmt::{self, Display};
use std::sync::Arc;

use crate::game::{MoveGenerator, Outcome, Player, Position, ZobristKeys};
use crate::moves::{Candidate, CompoundMove, move_buffer::MoveBuffer};

pub type DotsMove = CompoundMove<Edge>;

/// Chain captures are searched before anything else.
const CHAIN_PRIORITY: i32 = 1_000;
/// Drawing the third side of a box hands it to the opponent.
const SACRIFICE_PRIORITY: i32 = -1_000;

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A line between two adjacent dots.
///
/// Horizontal edge `(r, c)` is the top side of box `(r, c)`; vertical edge
/// `(r, c)` is its left side.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Edge {
    pub orientation: Orientation,
    pub row: u8,
    pub col: u8,
}

impl Edge {
    pub const fn h(row: u8, col: u8) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            row,
            col,
        }
    }

    pub const fn v(row: u8, col: u8) -> Self {
        Self {
            orientation: Orientation::Vertical,
            row,
            col,
        }
    }
}

impl Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.orientation {
            Orientation::Horizontal => 'h',
            Orientation::Vertical => 'v',
        };
        write!(f, "{tag}{}.{}", self.row, self.col)
    }
}

impl std::str::FromStr for Edge {
    type Err = miette::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let orientation = match chars.next() {
            Some('h' | 'H') => Orientation::Horizontal,
            Some('v' | 'V') => Orientation::Vertical,
            _ => miette::bail!("Edge '{s}' must start with 'h' or 'v'"),
        };
        let rest: String = chars.collect();
        let Some((row, col)) = rest.split_once('.') else {
            miette::bail!("Edge '{s}' must look like h0.1");
        };
        let row = row
            .parse()
            .map_err(|_| miette::miette!("Bad row in edge '{s}'"))?;
        let col = col
            .parse()
            .map_err(|_| miette::miette!("Bad column in edge '{s}'"))?;
        Ok(Self {
            orientation,
            row,
            col,
        })
    }
}

/// Static board geometry and hashing keys, shared by every copy of a position.
#[derive(Debug)]
struct Layout {
    rows: usize,
    cols: usize,
    /// Boxes on either side of each edge
    edge_boxes: Vec<[Option<usize>; 2]>,
    /// The four sides of each box
    box_edges: Vec<[usize; 4]>,
    edge_keys: ZobristKeys,
    /// `[player][score]`
    score_keys: ZobristKeys,
}

impl Layout {
    fn new(rows: usize, cols: usize) -> Self {
        let horizontal = (rows + 1) * cols;
        let edges = horizontal + rows * (cols + 1);
        let boxes = rows * cols;

        let mut edge_boxes = vec![[None, None]; edges];
        let mut box_edges = vec![[0; 4]; boxes];
        for r in 0..rows {
            for c in 0..cols {
                let b = r * cols + c;
                let top = r * cols + c;
                let bottom = (r + 1) * cols + c;
                let left = horizontal + r * (cols + 1) + c;
                let right = left + 1;
                box_edges[b] = [top, bottom, left, right];
                for e in box_edges[b] {
                    let slot = &mut edge_boxes[e];
                    if slot[0].is_none() {
                        slot[0] = Some(b);
                    } else {
                        slot[1] = Some(b);
                    }
                }
            }
        }

        Self {
            rows,
            cols,
            edge_boxes,
            box_edges,
            edge_keys: ZobristKeys::new(edges, 1),
            score_keys: ZobristKeys::with_seed(
                Player::PLAYERS.len(),
                boxes + 1,
                crate::consts::ZOBRIST_SEED.rotate_left(17),
            ),
        }
    }

    #[inline]
    fn horizontal_edges(&self) -> usize {
        (self.rows + 1) * self.cols
    }

    #[inline]
    fn edge_count(&self) -> usize {
        self.edge_boxes.len()
    }

    fn index(&self, edge: Edge) -> Option<usize> {
        let (row, col) = (edge.row as usize, edge.col as usize);
        match edge.orientation {
            Orientation::Horizontal if row <= self.rows && col < self.cols => Some(row * self.cols + col),
            Orientation::Vertical if row < self.rows && col <= self.cols => {
                Some(self.horizontal_edges() + row * (self.cols + 1) + col)
            }
            _ => None,
        }
    }

    fn edge(&self, index: usize) -> Edge {
        let horizontal = self.horizontal_edges();
        if index < horizontal {
            Edge::h((index / self.cols) as u8, (index % self.cols) as u8)
        } else {
            let i = index - horizontal;
            Edge::v((i / (self.cols + 1)) as u8, (i % (self.cols + 1)) as u8)
        }
    }

    /// The box across `edge` from `from`, or `None` at the border.
    #[inline]
    fn across(&self, edge: usize, from: usize) -> Option<usize> {
        let [a, b] = self.edge_boxes[edge];
        if a == Some(from) { b } else { a }
    }
}

/// How a chain walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEnd {
    /// The last edge leads to the border or into a box with three or more
    /// undrawn sides; drawing it completes only the last chain box.
    Open,
    /// The last edge is shared with a second capturable box.
    Closed,
}

#[derive(Debug, Clone)]
struct Chain {
    edges: Vec<usize>,
    boxes: usize,
    end: ChainEnd,
}

#[derive(Debug, Clone)]
pub struct DotsAndBoxes {
    layout: Arc<Layout>,
    drawn: Vec<bool>,
    sides: Vec<u8>,
    owners: Vec<Option<Player>>,
    scores: [i32; 2],
    stm: Player,
    edges_drawn: usize,
    hash: u64,
}

impl PartialEq for DotsAndBoxes {
    fn eq(&self, other: &Self) -> bool {
        self.layout.rows == other.layout.rows
            && self.layout.cols == other.layout.cols
            && self.drawn == other.drawn
            && self.sides == other.sides
            && self.owners == other.owners
            && self.scores == other.scores
            && self.stm == other.stm
            && self.hash == other.hash
    }
}

impl Eq for DotsAndBoxes {}

impl DotsAndBoxes {
    pub fn new(rows: usize, cols: usize) -> miette::Result<Self> {
        miette::ensure!(
            (1..=16).contains(&rows) && (1..=16).contains(&cols),
            "Board must be between 1x1 and 16x16 boxes, got {rows}x{cols}"
        );
        let layout = Layout::new(rows, cols);
        let hash = Player::PLAYERS
            .iter()
            .fold(0, |h, p| layout.score_keys.toggle(h, p.index(), 0));
        Ok(Self {
            drawn: vec![false; layout.edge_count()],
            sides: vec![0; rows * cols],
            owners: vec![None; rows * cols],
            scores: [0; 2],
            stm: Player::One,
            edges_drawn: 0,
            hash,
            layout: Arc::new(layout),
        })
    }

    /// Draws `edges` as set-up moves; boxes they complete are credited to
    /// `credit`. Play continues with `to_move`.
    pub fn from_edges(
        rows: usize,
        cols: usize,
        edges: &[Edge],
        credit: Player,
        to_move: Player,
    ) -> miette::Result<Self> {
        let mut game = Self::new(rows, cols)?;
        for &edge in edges {
            let idx = game
                .layout
                .index(edge)
                .ok_or_else(|| miette::miette!("Edge {edge} is off the board"))?;
            miette::ensure!(!game.drawn[idx], "Edge {edge} listed twice");
            game.draw(idx, credit);
        }
        if to_move != game.stm {
            game.stm = to_move;
            game.hash ^= game.layout.edge_keys.second_to_move();
        }
        Ok(game)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.layout.cols
    }

    pub fn is_drawn(&self, edge: Edge) -> Option<bool> {
        self.layout.index(edge).map(|idx| self.drawn[idx])
    }

    pub fn owner(&self, row: usize, col: usize) -> Option<Player> {
        self.owners[row * self.layout.cols + col]
    }

    pub fn is_legal(&self, mv: &DotsMove) -> bool {
        self.legal_moves().moves().any(|m| m == mv)
    }

    /// Parses `h0.1` (a single edge) or `h0.1+v0.2` (an explicit compound
    /// move). A single edge picks the first legal move that starts with it.
    pub fn parse_move(&self, text: &str) -> miette::Result<DotsMove> {
        let edges = text
            .split('+')
            .map(str::parse::<Edge>)
            .collect::<miette::Result<Vec<_>>>()?;
        let legal = self.legal_moves();
        if let [edge] = edges.as_slice() {
            return legal
                .moves()
                .find(|m| m.first() == edge)
                .cloned()
                .ok_or_else(|| miette::miette!("{edge} is not a legal move"));
        }
        let mv = CompoundMove::new(edges)?;
        miette::ensure!(legal.moves().any(|m| *m == mv), "{mv} is not a legal move");
        Ok(mv)
    }

    /// Draws one edge, crediting completed boxes to `mover`.
    /// Returns the number of boxes completed.
    fn draw(&mut self, edge: usize, mover: Player) -> usize {
        debug_assert!(!self.drawn[edge], "edge drawn twice");
        self.drawn[edge] = true;
        self.edges_drawn += 1;
        self.hash = self.layout.edge_keys.toggle(self.hash, edge, 0);

        let mut completed = 0;
        for b in self.layout.edge_boxes[edge].into_iter().flatten() {
            self.sides[b] += 1;
            if self.sides[b] == 4 {
                self.owners[b] = Some(mover);
                self.add_score(mover, 1);
                completed += 1;
            }
        }
        completed
    }

    fn erase(&mut self, edge: usize) {
        debug_assert!(self.drawn[edge], "erasing an undrawn edge");
        for b in self.layout.edge_boxes[edge].into_iter().flatten() {
            if self.sides[b] == 4
                && let Some(owner) = self.owners[b].take()
            {
                self.add_score(owner, -1);
            }
            self.sides[b] -= 1;
        }
        self.drawn[edge] = false;
        self.edges_drawn -= 1;
        self.hash = self.layout.edge_keys.toggle(self.hash, edge, 0);
    }

    fn add_score(&mut self, player: Player, delta: i32) {
        let keys = &self.layout.score_keys;
        let old = self.scores[player.index()];
        let new = old + delta;
        self.hash = keys.update(
            self.hash,
            player.index(),
            Some(old as usize),
            Some(new as usize),
        );
        self.scores[player.index()] = new;
    }

    #[inline]
    fn undrawn_sides(&self, b: usize) -> u8 {
        4 - self.sides[b]
    }

    /// The single undrawn side of `b` other than `except`.
    fn exit_edge(&self, b: usize, except: Option<usize>) -> Option<usize> {
        self.layout.box_edges[b]
            .into_iter()
            .find(|&e| !self.drawn[e] && Some(e) != except)
    }

    /// Follows degree-2 boxes from a capturable box `start`.
    fn walk_chain(&self, start: usize, visited: &mut [bool]) -> Option<Chain> {
        let mut edges = Vec::new();
        let mut boxes = 1;
        let mut current = start;
        let mut entered_by = None;
        visited[start] = true;

        let end = loop {
            let edge = self.exit_edge(current, entered_by)?;
            edges.push(edge);
            let Some(next) = self.layout.across(edge, current) else {
                break ChainEnd::Open;
            };
            if visited[next] {
                break ChainEnd::Open;
            }
            match self.undrawn_sides(next) {
                1 => {
                    visited[next] = true;
                    boxes += 1;
                    break ChainEnd::Closed;
                }
                2 => {
                    visited[next] = true;
                    boxes += 1;
                    current = next;
                    entered_by = Some(edge);
                }
                _ => break ChainEnd::Open,
            }
        };

        Some(Chain { edges, boxes, end })
    }

    fn capturable_chains(&self) -> Vec<Chain> {
        let boxes = self.sides.len();
        let mut visited = vec![false; boxes];
        (0..boxes)
            .filter_map(|b| {
                if visited[b] || self.undrawn_sides(b) != 1 {
                    return None;
                }
                self.walk_chain(b, &mut visited)
            })
            .collect()
    }

    fn compound(&self, edges: &[usize]) -> DotsMove {
        CompoundMove::with_tail(
            self.layout.edge(edges[0]),
            edges[1..].iter().map(|&e| self.layout.edge(e)),
        )
    }

    fn singleton_priority(&self, edge: usize) -> i32 {
        let most_sides = self.layout.edge_boxes[edge]
            .into_iter()
            .flatten()
            .map(|b| self.sides[b])
            .max()
            .unwrap_or(0);
        if most_sides == 2 {
            SACRIFICE_PRIORITY
        } else {
            -(most_sides as i32)
        }
    }
}

impl Position for DotsAndBoxes {
    type Move = DotsMove;
    type Undo = Player;

    #[inline]
    fn side_to_move(&self) -> Player {
        self.stm
    }

    fn apply(&mut self, mv: &DotsMove) -> Player {
        let mover = self.stm;
        let mut completed_last = 0;
        for &edge in mv.parts() {
            let idx = self
                .layout
                .index(edge)
                .unwrap_or_else(|| unreachable!("move {mv} leaves the board"));
            completed_last = self.draw(idx, mover);
        }
        if completed_last == 0 {
            self.stm = mover.flip();
            self.hash ^= self.layout.edge_keys.second_to_move();
        }
        mover
    }

    fn undo(&mut self, mv: &DotsMove, mover: Player) {
        for &edge in mv.parts().iter().rev() {
            let idx = self
                .layout
                .index(edge)
                .unwrap_or_else(|| unreachable!("move {mv} leaves the board"));
            self.erase(idx);
        }
        if self.stm != mover {
            self.stm = mover;
            self.hash ^= self.layout.edge_keys.second_to_move();
        }
    }

    fn outcome(&self) -> Option<Outcome> {
        if self.edges_drawn < self.drawn.len() {
            return None;
        }
        let [one, two] = self.scores;
        Some(match one.cmp(&two) {
            std::cmp::Ordering::Greater => Outcome::Win(Player::One),
            std::cmp::Ordering::Less => Outcome::Win(Player::Two),
            std::cmp::Ordering::Equal => Outcome::Draw,
        })
    }

    #[inline]
    fn score(&self, player: Player) -> i32 {
        self.scores[player.index()]
    }

    #[inline]
    fn hash(&self) -> u64 {
        self.hash
    }
}

impl MoveGenerator for DotsAndBoxes {
    fn generate_moves(&self, moves: &mut MoveBuffer<DotsMove>) {
        moves.clear();
        if self.is_terminal() {
            return;
        }

        let mut in_chain = vec![false; self.drawn.len()];
        for chain in self.capturable_chains() {
            for &e in &chain.edges {
                in_chain[e] = true;
            }
            let len = chain.boxes as i32;
            moves.push(Candidate::new(
                self.compound(&chain.edges),
                true,
                CHAIN_PRIORITY + len,
            ));

            // All but two: take every box except the last two and draw the
            // far end instead, handing the opponent a double-cross.
            if chain.end == ChainEnd::Open && chain.boxes >= 3 {
                let n = chain.edges.len();
                let mut edges = chain.edges[..n - 2].to_vec();
                edges.push(chain.edges[n - 1]);
                moves.push(Candidate::new(
                    self.compound(&edges),
                    false,
                    CHAIN_PRIORITY + len - 1,
                ));
            }
        }

        for edge in 0..self.drawn.len() {
            if self.drawn[edge] || in_chain[edge] {
                continue;
            }
            moves.push(Candidate::quiet(
                CompoundMove::single(self.layout.edge(edge)),
                self.singleton_priority(edge),
            ));
        }
        moves.sort_by_priority();
    }
}

impl Display for DotsAndBoxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = (self.layout.rows, self.layout.cols);
        let horizontal = self.layout.horizontal_edges();
        for r in 0..=rows {
            for c in 0..cols {
                let line = if self.drawn[r * cols + c] { "---" } else { "   " };
                write!(f, "+{line}")?;
            }
            writeln!(f, "+")?;
            if r == rows {
                break;
            }
            for c in 0..=cols {
                let line = if self.drawn[horizontal + r * (cols + 1) + c] { '|' } else { ' ' };
                write!(f, "{line}")?;
                if c < cols {
                    let owner = match self.owners[r * cols + c] {
                        Some(Player::One) => '1',
                        Some(Player::Two) => '2',
                        None => ' ',
                    };
                    write!(f, " {owner} ")?;
                }
            }
            writeln!(f)?;
        }
        write!(
            f,
            "score {}-{}, {} to move",
            self.scores[0], self.scores[1], self.stm
        )
    }
}
