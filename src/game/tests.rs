use super::*;
use crate::game::dots::DotsMove;
use crate::moves::{Candidate, CompoundMove};

fn assert_round_trips<G: MoveGenerator + PartialEq>(pos: &G) {
    let before_hash = pos.hash();
    let before_scores = Player::PLAYERS.map(|p| pos.score(p));
    for candidate in pos.legal_moves() {
        let mut board = pos.clone();
        let undo = board.apply(&candidate.mv);
        assert_ne!(board.hash(), before_hash, "{:?} left the hash unchanged", candidate.mv);
        board.undo(&candidate.mv, undo);
        assert_eq!(board.hash(), before_hash, "{:?} broke the hash", candidate.mv);
        assert_eq!(Player::PLAYERS.map(|p| board.score(p)), before_scores);
        assert!(board == *pos, "{:?} did not undo cleanly", candidate.mv);
    }
}

/// Two-deep walk so positions reached mid-game are covered too.
fn assert_round_trips_two_plies<G: MoveGenerator + PartialEq>(pos: &G) {
    assert_round_trips(pos);
    for candidate in pos.legal_moves() {
        let mut board = pos.clone();
        board.apply(&candidate.mv);
        assert_round_trips(&board);
    }
}

#[test]
fn streak_hash_round_trip() {
    assert_round_trips_two_plies(&StreakGame::tic_tac_toe());
    assert_round_trips_two_plies(&StreakGame::connect_four());
    assert_round_trips(&StreakGame::from_rows(&["xo.", ".x.", "..o"], 3, false).unwrap());
}

#[test]
fn streak_presets_match_validated_boards() {
    assert_eq!(StreakGame::tic_tac_toe(), StreakGame::new(3, 3, 3, false).unwrap());
    let connect_four = StreakGame::connect_four();
    assert_eq!(connect_four, StreakGame::new(7, 6, 4, true).unwrap());
    assert_eq!((connect_four.width(), connect_four.height()), (7, 6));
    assert!(StreakGame::new(0, 3, 3, false).is_err());
    assert!(StreakGame::new(3, 3, 4, false).is_err());
}

#[test]
fn streak_incremental_hash_matches_full_hash() {
    let mut pos = StreakGame::tic_tac_toe();
    pos.apply(&Cell::new(1, 1));
    pos.apply(&Cell::new(0, 2));
    let fresh = StreakGame::from_rows(&["..o", ".x.", "..."], 3, false).unwrap();
    assert_eq!(pos.hash(), fresh.hash());
    assert_eq!(pos, fresh);
}

#[test]
fn streak_detects_wins_and_draws() {
    let won = StreakGame::from_rows(&["xxx", "oo.", "..."], 3, false).unwrap();
    assert_eq!(won.outcome(), Some(Outcome::Win(Player::One)));
    assert!(won.legal_moves().is_empty());

    let drawn = StreakGame::from_rows(&["xox", "xoo", "oxx"], 3, false).unwrap();
    assert_eq!(drawn.outcome(), Some(Outcome::Draw));

    let mut pos = StreakGame::from_rows(&["xx.", "oo.", "..."], 3, false).unwrap();
    pos.apply(&Cell::new(0, 2));
    assert_eq!(pos.outcome(), Some(Outcome::Win(Player::One)));
    assert_eq!(pos.score(Player::One), 1);
    pos.undo(&Cell::new(0, 2), ());
    assert_eq!(pos.outcome(), None);
}

#[test]
fn streak_orders_wins_then_blocks_then_centre() {
    // X to move: c1 wins, c2 would block O
    let pos = StreakGame::from_rows(&["xx.", "oo.", "..."], 3, false).unwrap();
    let moves = pos.legal_moves();
    assert_eq!(moves.first().map(|c| c.mv), Some(Cell::new(0, 2)));
    assert_eq!(moves.get(1).map(|c| c.mv), Some(Cell::new(1, 2)));

    let empty = StreakGame::tic_tac_toe().legal_moves();
    assert_eq!(empty.len(), 9);
    assert_eq!(empty.first().map(|c| c.mv), Some(Cell::new(1, 1)));
    assert!(empty.iter().all(|c| !c.grants_extra_turn));
}

#[test]
fn gravity_only_offers_lowest_free_cells() {
    let pos = StreakGame::connect_four();
    let moves = pos.legal_moves();
    assert_eq!(moves.len(), 7);
    assert!(moves.moves().all(|c| c.row == 5));
    assert_eq!(pos.parse_move("d").unwrap(), Cell::new(5, 3));
    assert!(pos.parse_move("d3").is_err());
}

#[test]
fn streak_parses_coordinates() {
    let pos = StreakGame::tic_tac_toe();
    assert_eq!(pos.parse_move("b3").unwrap(), Cell::new(2, 1));
    assert_eq!(Cell::new(2, 1).to_string(), "b3");
    assert!(pos.parse_move("d1").is_err());
    assert!(pos.parse_move("a4").is_err());
    assert!(pos.parse_move("b").is_err());
}

fn edges(list: &[&str]) -> Vec<Edge> {
    list.iter().map(|e| e.parse().unwrap()).collect()
}

fn dots(rows: usize, cols: usize, drawn: &[&str]) -> DotsAndBoxes {
    DotsAndBoxes::from_edges(rows, cols, &edges(drawn), Player::Two, Player::One).unwrap()
}

fn compound(list: &[&str]) -> DotsMove {
    CompoundMove::new(edges(list)).unwrap()
}

/// 2×2 board: the bottom-left box is already taken and one open chain of
/// three boxes runs from the top-left box around to the right border.
fn single_chain() -> DotsAndBoxes {
    dots(
        2,
        2,
        &[
            "h0.0", "h0.1", "h1.0", "h2.0", "h2.1", "v0.0", "v0.2", "v1.0", "v1.1",
        ],
    )
}

#[test]
fn dots_hash_round_trip() {
    assert_round_trips_two_plies(&DotsAndBoxes::new(2, 2).unwrap());
    assert_round_trips_two_plies(&DotsAndBoxes::new(2, 3).unwrap());
    assert_round_trips(&single_chain());
    assert_round_trips(&dots(2, 2, &["h0.0", "h1.0", "v0.0", "h0.1", "v0.2"]));
}

#[test]
fn dots_incremental_hash_matches_set_up_position() {
    let mut pos = DotsAndBoxes::new(2, 2).unwrap();
    pos.apply(&compound(&["h0.0"]));
    pos.apply(&compound(&["v1.2"]));
    let fresh =
        DotsAndBoxes::from_edges(2, 2, &edges(&["h0.0", "v1.2"]), Player::One, Player::One).unwrap();
    assert_eq!(pos.hash(), fresh.hash());
    assert_eq!(pos, fresh);
}

#[test]
fn single_chain_offers_take_all_and_double_cross() {
    let pos = single_chain();
    assert_eq!(pos.score(Player::Two), 1);

    let moves: Vec<Candidate<DotsMove>> = pos.legal_moves().into_iter().collect();
    assert_eq!(moves.len(), 2, "{moves:?}");

    let take_all = &moves[0];
    assert_eq!(take_all.mv, compound(&["v0.1", "h1.1", "v1.2"]));
    assert!(take_all.grants_extra_turn);

    let double_cross = &moves[1];
    assert_eq!(double_cross.mv, compound(&["v0.1", "v1.2"]));
    assert!(!double_cross.grants_extra_turn);
}

#[test]
fn double_cross_leaves_two_boxes_for_the_opponent() {
    let mut pos = single_chain();
    pos.apply(&compound(&["v0.1", "v1.2"]));
    assert_eq!(pos.score(Player::One), 1);
    assert_eq!(pos.side_to_move(), Player::Two);

    let replies = pos.legal_moves();
    assert_eq!(replies.len(), 1);
    let reply = replies.first().unwrap();
    assert_eq!(reply.mv, compound(&["h1.1"]));
    assert!(reply.grants_extra_turn);

    pos.apply(&reply.mv);
    assert_eq!(pos.score(Player::Two), 3);
    assert_eq!(pos.outcome(), Some(Outcome::Win(Player::Two)));
}

#[test]
fn compound_move_is_atomic() {
    let original = single_chain();
    let mut pos = original.clone();
    let take_all = compound(&["v0.1", "h1.1", "v1.2"]);

    let undo = pos.apply(&take_all);
    assert_eq!(pos.score(Player::One), 3);
    assert_eq!(pos.side_to_move(), Player::One, "captures keep the turn");
    assert_eq!(pos.outcome(), Some(Outcome::Win(Player::One)));

    pos.undo(&take_all, undo);
    assert_eq!(pos.hash(), original.hash());
    assert_eq!(
        Player::PLAYERS.map(|p| pos.score(p)),
        Player::PLAYERS.map(|p| original.score(p))
    );
    assert_eq!(pos, original);
}

#[test]
fn short_chain_has_a_single_variant() {
    // Top-left box has three sides; the top-right box continues into the
    // open bottom-right box.
    let pos = dots(2, 2, &["h0.0", "h1.0", "v0.0", "h0.1", "v0.2"]);
    let moves = pos.legal_moves();
    let chain_moves: Vec<&DotsMove> = moves
        .moves()
        .filter(|m| *m.first() == Edge::v(0, 1))
        .collect();
    assert_eq!(chain_moves, vec![&compound(&["v0.1", "h1.1"])]);
    assert!(moves.first().is_some_and(|c| c.grants_extra_turn));
    // Chain edges are never offered on their own
    assert!(moves.moves().all(|m| m.len() > 1 || *m.first() != Edge::h(1, 1)));
}

#[test]
fn closed_chain_has_a_single_variant() {
    let pos = dots(1, 2, &["h0.0", "h0.1", "h1.0", "h1.1", "v0.0", "v0.2"]);
    let moves = pos.legal_moves();
    assert_eq!(moves.len(), 1);
    let only = moves.first().unwrap();
    assert_eq!(only.mv, compound(&["v0.1"]));
    assert!(only.grants_extra_turn);

    let mut board = pos.clone();
    board.apply(&only.mv);
    assert_eq!(board.score(Player::One), 2);
}

#[test]
fn sacrifices_are_searched_last() {
    // Drawing h1.0 or v0.1 would give away the three-sided top-left box
    let pos = dots(2, 2, &["h0.0", "v0.0"]);
    let moves = pos.legal_moves();
    let last = moves.as_slice().last().unwrap();
    assert!(last.priority < 0);
    let first = moves.first().unwrap();
    assert!(first.priority > last.priority);
}

#[test]
fn dots_parses_moves() {
    let pos = single_chain();
    assert_eq!(
        pos.parse_move("v0.1").unwrap(),
        compound(&["v0.1", "h1.1", "v1.2"])
    );
    assert_eq!(
        pos.parse_move("v0.1+v1.2").unwrap(),
        compound(&["v0.1", "v1.2"])
    );
    assert!(pos.parse_move("h0.0").is_err());
    assert!(pos.parse_move("v0.1+h1.1").is_err());
    assert!("x1.1".parse::<Edge>().is_err());
    assert_eq!(Edge::v(0, 1).to_string(), "v0.1");
}

#[test]
fn outcome_rewards() {
    assert_eq!(Outcome::Win(Player::One).reward(Player::One), 1.0);
    assert_eq!(Outcome::Win(Player::One).reward(Player::Two), 0.0);
    assert_eq!(Outcome::Draw.reward(Player::Two), 0.5);
    assert_eq!(Player::One.flip(), Player::Two);
}
