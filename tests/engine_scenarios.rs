use tt_scoreboard::engine::{Command, EngineError, MatchEngine, Phase, SessionId, SideConfig};
use tt_scoreboard::rules::{MatchRules, Player, Side};

fn engine_with(first: Player, sides: SideConfig) -> MatchEngine {
    let mut engine = MatchEngine::new(SessionId::new("scenario"), MatchRules::default(), sides);
    engine
        .apply(Command::ChooseFirstServer(first))
        .expect("first server accepted");
    engine
}

fn engine(first: Player) -> MatchEngine {
    engine_with(first, SideConfig::default())
}

fn point_for(engine: &mut MatchEngine, player: Player) {
    let swapped = engine.state().derived().is_side_swapped;
    engine
        .apply(Command::AddPoint(Side::of_player(player, swapped)))
        .expect("point accepted");
}

fn win_set(engine: &mut MatchEngine, player: Player) {
    let target = engine.rules().win_points(engine.state().derived().is_final_set);
    for _ in 0..target {
        point_for(engine, player);
    }
}

#[test]
fn eleven_straight_points_take_the_first_set() {
    let mut engine = engine(Player::One);
    for _ in 0..11 {
        engine.apply(Command::AddPoint(Side::Left)).unwrap();
    }

    let state = engine.state();
    let results: Vec<_> = state.history().results().collect();
    assert_eq!(results.len(), 1);
    assert_eq!((results[0].player1, results[0].player2), (11, 0));
    assert_eq!(state.winner(), None);
    assert!(state.scoreboard().is_empty());
    assert_eq!(state.derived().set_starting_server, Some(Player::Two));
    assert_eq!(state.derived().service.unwrap().server, Player::Two);
    assert_eq!(engine.phase(), Phase::InProgress);
}

#[test]
fn ten_all_switches_service_every_point() {
    let mut engine = engine(Player::One);
    for _ in 0..10 {
        engine.apply(Command::AddPoint(Side::Left)).unwrap();
        engine.apply(Command::AddPoint(Side::Right)).unwrap();
    }
    let at_deuce = engine.state().derived().service.unwrap();
    assert!(engine.state().derived().is_deuce);
    assert!(at_deuce.single_point);
    assert_eq!(at_deuce.server, Player::One);

    engine.apply(Command::AddPoint(Side::Left)).unwrap();
    let after = engine.state().derived().service.unwrap();
    assert_eq!(after.server, Player::Two);
    assert_eq!(after.serves_remaining(), 1);

    // Advantage lost, still deuce, still alternating.
    engine.apply(Command::AddPoint(Side::Right)).unwrap();
    assert_eq!(engine.state().derived().service.unwrap().server, Player::One);
    assert!(engine.state().history().is_empty());
}

#[test]
fn deuce_set_runs_past_eleven_until_two_clear() {
    let mut engine = engine(Player::Two);
    for _ in 0..14 {
        engine.apply(Command::AddPoint(Side::Left)).unwrap();
        engine.apply(Command::AddPoint(Side::Right)).unwrap();
    }
    assert!(engine.state().history().is_empty());
    engine.apply(Command::AddPoint(Side::Right)).unwrap();
    engine.apply(Command::AddPoint(Side::Right)).unwrap();
    let results: Vec<_> = engine.state().history().results().collect();
    assert_eq!((results[0].player1, results[0].player2), (14, 16));
}

#[test]
fn undo_at_set_start_reopens_previous_set() {
    let mut engine = engine(Player::One);
    for _ in 0..9 {
        engine.apply(Command::AddPoint(Side::Left)).unwrap();
        engine.apply(Command::AddPoint(Side::Right)).unwrap();
    }
    engine.apply(Command::AddPoint(Side::Left)).unwrap();
    engine.apply(Command::AddPoint(Side::Left)).unwrap();
    let results: Vec<_> = engine.state().history().results().collect();
    assert_eq!((results[0].player1, results[0].player2), (11, 9));
    assert_eq!(engine.state().derived().set_starting_server, Some(Player::Two));

    let snap = engine.apply(Command::RemovePoint).unwrap();
    let state = engine.state();
    assert!(state.history().is_empty());
    assert_eq!(state.scoreboard().count(Player::One), 10);
    assert_eq!(state.scoreboard().count(Player::Two), 9);
    assert_eq!((snap.view.left_points, snap.view.right_points), (10, 9));
    assert_eq!(state.derived().set_starting_server, Some(Player::One));
    assert!(!state.derived().is_side_swapped);
    // 19 points played: the pair starting at 18 is the tenth pair, so it belongs to player 2.
    let service = state.derived().service.unwrap();
    assert_eq!(service.server, Player::Two);
    assert_eq!(service.serve_number, 2);
    assert_eq!(snap.view.set_number, 1);
}

#[test]
fn undo_reopens_a_set_won_while_sides_were_swapped() {
    let mut engine = engine(Player::One);
    win_set(&mut engine, Player::One);
    assert!(engine.state().derived().is_side_swapped);
    win_set(&mut engine, Player::Two);
    let results: Vec<_> = engine.state().history().results().collect();
    assert_eq!((results[1].player1, results[1].player2), (0, 11));

    engine.apply(Command::RemovePoint).unwrap();
    let state = engine.state();
    assert_eq!(state.history().len(), 1);
    assert!(state.derived().is_side_swapped);
    assert_eq!(state.scoreboard().count(Player::Two), 10);
    // Player 2 stands on the left in set 2.
    assert_eq!(engine.view().left_points, 10);
}

#[test]
fn three_sets_for_player_two_end_the_match() {
    let mut engine = engine(Player::One);
    win_set(&mut engine, Player::Two);
    win_set(&mut engine, Player::One);
    win_set(&mut engine, Player::Two);
    assert_eq!(engine.phase(), Phase::InProgress);
    win_set(&mut engine, Player::Two);

    let state = engine.state().clone();
    assert_eq!(state.winner(), Some(Player::Two));
    assert_eq!(state.history().len(), 4);
    assert!(state.scoreboard().is_empty());
    assert_eq!(engine.phase(), Phase::MatchComplete);
    assert!(state.derived().service.is_none());

    for cmd in [
        Command::AddPoint(Side::Left),
        Command::AddPoint(Side::Right),
        Command::RemovePoint,
    ] {
        assert!(matches!(
            engine.apply(cmd),
            Err(EngineError::InvalidState(_))
        ));
    }
    assert_eq!(engine.state(), &state);
}

#[test]
fn deciding_set_is_played_to_six_with_single_point_service() {
    let mut engine = engine(Player::Two);
    win_set(&mut engine, Player::One);
    win_set(&mut engine, Player::Two);
    win_set(&mut engine, Player::One);
    win_set(&mut engine, Player::Two);

    let derived = *engine.state().derived();
    assert!(derived.is_final_set);
    assert_eq!(derived.set_starting_server, Some(Player::Two));
    let service = derived.service.unwrap();
    assert!(service.single_point);

    for _ in 0..5 {
        point_for(&mut engine, Player::One);
        point_for(&mut engine, Player::Two);
    }
    assert!(engine.state().derived().is_deuce);
    assert_eq!(engine.state().winner(), None);
    point_for(&mut engine, Player::One);
    point_for(&mut engine, Player::One);
    assert_eq!(engine.state().winner(), Some(Player::One));
    let last = engine.state().history().results().last().unwrap();
    assert_eq!((last.player1, last.player2), (7, 5));
}

#[test]
fn final_set_target_follows_rules() {
    let rules = MatchRules {
        final_set_win_points: 11,
        ..MatchRules::default()
    };
    let mut engine = MatchEngine::new(SessionId::new("official"), rules, SideConfig::default());
    engine.apply(Command::ChooseFirstServer(Player::One)).unwrap();
    for winner in [Player::One, Player::Two, Player::One, Player::Two] {
        win_set(&mut engine, winner);
    }
    for _ in 0..6 {
        point_for(&mut engine, Player::One);
    }
    assert_eq!(engine.state().winner(), None);
    assert_eq!(engine.state().scoreboard().total(), 6);
}

#[test]
fn without_side_changes_left_is_always_player_one() {
    let sides = SideConfig {
        change_sides: false,
        animate: false,
    };
    let mut engine = engine_with(Player::One, sides);
    for _ in 0..11 {
        engine.apply(Command::AddPoint(Side::Right)).unwrap();
    }
    let view = engine.view();
    assert!(!view.side_swapped);
    assert_eq!(view.left_player, Player::One);
    assert_eq!(view.right_sets, 1);
}

#[test]
fn toggling_side_changes_mid_match_reorients_display_only() {
    let mut engine = engine(Player::One);
    win_set(&mut engine, Player::One);
    assert!(engine.view().side_swapped);

    let snap = engine.apply(Command::SetChangeSides(false)).unwrap();
    assert!(!snap.view.side_swapped);
    assert_eq!(snap.view.left_player, Player::One);
    assert_eq!(snap.view.left_sets, 1);
    let results: Vec<_> = engine.state().history().results().collect();
    assert_eq!((results[0].player1, results[0].player2), (11, 0));
}

#[test]
fn toggling_side_changes_mid_set_keeps_each_players_points() {
    let mut engine = engine(Player::One);
    win_set(&mut engine, Player::One);
    for _ in 0..3 {
        point_for(&mut engine, Player::Two);
    }
    for _ in 0..10 {
        point_for(&mut engine, Player::One);
    }
    let before = engine.view();
    assert_eq!(before.right_player, Player::One);
    assert_eq!((before.left_points, before.right_points), (3, 10));

    let snap = engine.apply(Command::SetChangeSides(false)).unwrap();
    assert_eq!(snap.view.left_player, Player::One);
    assert_eq!((snap.view.left_points, snap.view.right_points), (10, 3));
    assert_eq!(engine.state().scoreboard().count(Player::One), 10);
    assert_eq!(snap.record.current_set.iter().filter(|p| **p == Player::One).count(), 10);

    // Player 1 now stands on the left and closes the set from there.
    engine.apply(Command::AddPoint(Side::Left)).unwrap();
    let results: Vec<_> = engine.state().history().results().collect();
    assert_eq!((results[1].player1, results[1].player2), (11, 3));
    assert_eq!(engine.state().history().sets_won(Player::One), 2);
}

#[test]
fn reopened_set_keeps_its_owner_after_side_changes_are_disabled() {
    let mut engine = engine(Player::Two);
    win_set(&mut engine, Player::Two);
    engine.apply(Command::SetChangeSides(false)).unwrap();
    assert!(!engine.view().side_swapped);

    engine.apply(Command::RemovePoint).unwrap();
    let state = engine.state();
    assert!(state.history().is_empty());
    assert_eq!(state.scoreboard().count(Player::Two), 10);
    assert_eq!(state.scoreboard().count(Player::One), 0);
    assert_eq!(engine.view().right_points, 10);
}
