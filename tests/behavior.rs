use sprite_pet::config::BehaviorConfig;
use sprite_pet::geometry::{
    Facing, FixedGeometry, GeometryProvider, Point, Rect, Surface, SurfaceEdge,
};
use sprite_pet::pet::state::BehaviorState;
use sprite_pet::pet::timers::{TimerKind, TimerQueue};
use sprite_pet::pet::Pet;
use sprite_pet::random::{RandomSource, SeededRandom};
use sprite_pet::sprite::PetDefinition;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

const DOCUMENT: &str = r#"
<animations>
  <animation id="1"><name>walk</name>
    <start><x>2</x><interval>100</interval></start>
    <sequence repeat="0"><frame>0</frame><frame>1</frame></sequence>
    <border><next only="vertical">6</next></border>
    <gravity><next>7</next></gravity>
  </animation>
  <animation id="2"><name>sit</name>
    <start><interval>100</interval></start>
    <sequence repeat="10"><frame>4</frame><next>3</next></sequence>
  </animation>
  <animation id="3"><name>eat</name>
    <start><interval>100</interval></start>
    <sequence repeat="10"><frame>5</frame></sequence>
  </animation>
  <animation id="4"><name>fall</name>
    <start><interval>100</interval></start>
    <sequence repeat="0"><frame>6</frame></sequence>
  </animation>
  <animation id="5"><name>run</name>
    <start><x>4</x><interval>100</interval></start>
    <sequence repeat="0"><frame>7</frame><frame>8</frame></sequence>
  </animation>
  <animation id="6"><name>bump</name>
    <start><interval>100</interval></start>
    <sequence repeat="0"><frame>9</frame></sequence>
  </animation>
  <animation id="7"><name>tumble</name>
    <start><interval>100</interval></start>
    <sequence repeat="0"><frame>10</frame></sequence>
  </animation>
</animations>"#;

/// Hands out queued rolls, then the top of every range.
#[derive(Clone, Default)]
struct ScriptedRandom {
    rolls: Rc<RefCell<VecDeque<i64>>>,
}

impl ScriptedRandom {
    fn with(rolls: &[i64]) -> Self {
        ScriptedRandom {
            rolls: Rc::new(RefCell::new(rolls.iter().copied().collect())),
        }
    }

    fn remaining(&self) -> usize {
        self.rolls.borrow().len()
    }
}

impl RandomSource for ScriptedRandom {
    fn range(&mut self, low: i64, high: i64) -> i64 {
        let high = high.max(low);
        self.rolls
            .borrow_mut()
            .pop_front()
            .unwrap_or(high)
            .clamp(low, high)
    }
}

/// Geometry whose surface can be pulled away mid-test.
#[derive(Clone)]
struct MovableDock {
    screen: Rect,
    surface: Rc<Cell<Option<Surface>>>,
}

impl GeometryProvider for MovableDock {
    fn screen(&self) -> Rect {
        self.screen
    }

    fn work_area(&self) -> Rect {
        self.screen
    }

    fn surface(&self) -> Option<Surface> {
        self.surface.get()
    }
}

fn screen() -> Rect {
    Rect::new(0.0, 0.0, 800.0, 600.0)
}

fn pet(geometry: impl GeometryProvider + 'static, random: impl RandomSource + 'static) -> Pet {
    pet_with(geometry, random, BehaviorConfig::default())
}

fn pet_with(
    geometry: impl GeometryProvider + 'static,
    random: impl RandomSource + 'static,
    config: BehaviorConfig,
) -> Pet {
    Pet::new(
        Rc::new(PetDefinition::parse(DOCUMENT)),
        config,
        Box::new(geometry),
        Box::new(random),
        TimerQueue::new(),
    )
}

fn run_for(pet: &mut Pet, seconds: f64) -> Vec<&'static str> {
    let mut seen = Vec::new();
    for _ in 0..(seconds * 100.0).round() as usize {
        pet.update(Duration::from_millis(10));
        let name = pet.state().name();
        if seen.last() != Some(&name) {
            seen.push(name);
        }
    }
    seen
}

#[test]
fn idle_rolls_are_checked_in_priority_order() {
    // idle A misses, idle B hits
    let random = ScriptedRandom::with(&[99, 0]);
    let mut pet = pet(FixedGeometry::new(screen()), random.clone());
    pet.place_at(Point::new(100.0, 560.0));
    run_for(&mut pet, 0.5);
    assert_eq!(pet.animation_id(), Some("3"));
    assert_eq!(random.remaining(), 0);
}

#[test]
fn first_winning_roll_stops_the_chain() {
    let random = ScriptedRandom::with(&[0, 0]);
    let mut pet = pet(FixedGeometry::new(screen()), random.clone());
    pet.place_at(Point::new(100.0, 560.0));
    run_for(&mut pet, 0.5);
    assert_eq!(pet.animation_id(), Some("2"));
    // idle B was never rolled
    assert_eq!(random.remaining(), 1);
}

#[test]
fn chained_animation_follows_its_own_transitions() {
    let random = ScriptedRandom::with(&[0]);
    let mut pet = pet(FixedGeometry::new(screen()), random);
    pet.place_at(Point::new(100.0, 560.0));
    run_for(&mut pet, 0.5);
    assert_eq!(pet.animation_id(), Some("2"));
    // sit lasts 11 frames, then its next edge picks eat
    run_for(&mut pet, 1.1);
    assert_eq!(pet.animation_id(), Some("3"));
    assert_eq!(pet.state(), BehaviorState::Walking);
}

#[test]
fn running_may_end_in_a_jump() {
    // idle A, idle B miss; run hits; jump roll hits
    let random = ScriptedRandom::with(&[99, 99, 0, 0]);
    let mut pet = pet(FixedGeometry::new(screen()), random);
    pet.place_at(Point::new(100.0, 560.0));
    let seen = run_for(&mut pet, 2.0);
    assert_eq!(seen, vec!["falling", "walking", "jumping", "walking"]);
    assert_eq!(pet.position().y, 560.0);
    assert!(pet.position().x > 200.0);
}

#[test]
fn walking_into_a_wall_plays_the_border_transition() {
    let mut pet = pet(FixedGeometry::new(screen()), ScriptedRandom::default());
    pet.place_at(Point::new(755.0, 560.0));
    run_for(&mut pet, 0.3);
    assert_eq!(pet.facing(), Facing::Left);
    assert_eq!(pet.animation_id(), Some("6"));
    assert_eq!(pet.position().x, 760.0);
}

#[test]
fn losing_the_surface_drops_the_pet_with_its_gravity_animation() {
    let surface = Surface {
        bounds: Rect::new(200.0, 400.0, 300.0, 20.0),
        edge: SurfaceEdge::Bottom,
    };
    let dock = MovableDock {
        screen: screen(),
        surface: Rc::new(Cell::new(Some(surface))),
    };
    let mut pet = pet(dock.clone(), ScriptedRandom::default());
    pet.place_at(Point::new(300.0, 0.0));
    run_for(&mut pet, 2.0);
    assert_eq!(pet.state(), BehaviorState::WalkingOnSurface);
    assert_eq!(pet.position().y, 360.0);

    dock.surface.set(None);
    run_for(&mut pet, 0.06);
    assert!(matches!(pet.state(), BehaviorState::FallingFromSurface { .. }));
    assert_eq!(pet.animation_id(), Some("7"));

    run_for(&mut pet, 3.0);
    assert!(pet.state().name().starts_with("walking"));
    assert_eq!(pet.position().y, 560.0);
}

#[test]
fn pause_restores_the_variant_and_its_timers() {
    let mut pet = pet(FixedGeometry::new(screen()), SeededRandom::seeded(4));
    pet.place_at(Point::new(100.0, 0.0));
    run_for(&mut pet, 0.2);
    let falling = pet.state();
    assert!(matches!(falling, BehaviorState::Falling { .. }));

    pet.pause();
    assert!(pet.armed_timers().is_empty());
    pet.pause();
    run_for(&mut pet, 1.0);
    assert_eq!(pet.state(), falling);

    pet.resume();
    assert_eq!(pet.state(), falling);
    assert_eq!(pet.armed_timers(), vec![TimerKind::Frame, TimerKind::Physics]);
    pet.resume();
    assert_eq!(pet.armed_timers(), vec![TimerKind::Frame, TimerKind::Physics]);

    pet.pointer_down(pet.position());
    pet.pause();
    pet.resume();
    assert_eq!(pet.armed_timers(), vec![TimerKind::Frame]);
}

#[test]
fn dangling_transitions_leave_the_walk_alone() {
    let document = r#"<animations>
          <animation id="1"><name>walk</name>
            <start><interval>100</interval></start>
            <sequence repeat="0"><frame>0</frame><frame>1</frame><next>404</next></sequence>
          </animation>
        </animations>"#;
    let mut pet: Pet = Pet::new(
        Rc::new(PetDefinition::parse(document)),
        BehaviorConfig::default(),
        Box::new(FixedGeometry::new(screen())),
        Box::new(SeededRandom::seeded(8)),
        TimerQueue::new(),
    );
    pet.place_at(Point::new(100.0, 560.0));
    run_for(&mut pet, 2.0);
    assert_eq!(pet.state(), BehaviorState::Walking);
    assert_eq!(pet.animation_id(), Some("1"));
}

#[test]
fn companions_close_once() {
    let document = r#"<animations>
          <animation id="1"><name>walk</name>
            <start><interval>100</interval></start>
            <sequence repeat="0"><frame>0</frame><frame>1</frame></sequence>
          </animation>
          <animation id="9"><name>flower</name>
            <start><interval>100</interval></start>
            <sequence repeat="100"><frame>3</frame></sequence>
          </animation>
        </animations>
        <childs><child animationid="1"><x>imageX</x><y>imageY-imageH</y><next>9</next></child></childs>"#;
    let config = BehaviorConfig {
        idle_a_chance: 0,
        idle_b_chance: 0,
        run_chance: 0,
        ..Default::default()
    };
    let mut pet: Pet = Pet::new(
        Rc::new(PetDefinition::parse(document)),
        config,
        Box::new(FixedGeometry::new(screen())),
        Box::new(SeededRandom::seeded(8)),
        TimerQueue::new(),
    );
    pet.place_at(Point::new(100.0, 560.0));
    pet.update(Duration::from_millis(20));

    let ids = pet.companions().ids();
    assert_eq!(ids.len(), 1);
    let companion = pet.companions().get(ids[0]).map(|c| c.position());
    assert_eq!(companion, Some(Point::new(100.0, 520.0)));

    assert!(pet.close_companion(ids[0]));
    assert!(!pet.close_companion(ids[0]));
    assert!(pet.companions().is_empty());
}

fn nested_pet(childs: &str) -> Pet {
    let document = format!(
        r#"<animations>
              <animation id="1"><name>walk</name>
                <start><interval>100</interval></start>
                <sequence repeat="0"><frame>0</frame><frame>1</frame></sequence>
              </animation>
              <animation id="8"><name>cloud</name>
                <start><interval>500</interval></start>
                <sequence repeat="0"><frame>2</frame></sequence>
              </animation>
              <animation id="9"><name>drop</name>
                <start><interval>100</interval></start>
                <sequence repeat="0"><frame>3</frame></sequence>
              </animation>
            </animations>
            <childs>{}</childs>"#,
        childs
    );
    let config = BehaviorConfig {
        idle_a_chance: 0,
        idle_b_chance: 0,
        run_chance: 0,
        ..Default::default()
    };
    let mut pet = Pet::new(
        Rc::new(PetDefinition::parse(&document)),
        config,
        Box::new(FixedGeometry::new(screen())),
        Box::new(SeededRandom::seeded(3)),
        TimerQueue::new(),
    );
    pet.place_at(Point::new(100.0, 560.0));
    pet
}

fn companion_animations(pet: &Pet) -> Vec<Option<String>> {
    pet.companions()
        .iter()
        .map(|(_, companion)| companion.animation_id().map(str::to_owned))
        .collect()
}

#[test]
fn companions_fire_their_own_child_rules_when_they_start() {
    let mut pet = nested_pet(
        r#"<child animationid="1"><x>imageX</x><y>imageY-imageH</y><next>8</next></child>
           <child animationid="8"><x>imageX+5</x><y>imageY</y><next>9</next></child>"#,
    );
    pet.update(Duration::from_millis(20));

    assert_eq!(
        companion_animations(&pet),
        vec![Some("8".to_string()), Some("9".to_string())]
    );
    let positions: Vec<Point> = pet.companions().iter().map(|(_, c)| c.position()).collect();
    assert_eq!(positions, vec![Point::new(100.0, 520.0), Point::new(105.0, 560.0)]);
}

#[test]
fn child_rules_that_trigger_each_other_stop_spawning() {
    let mut pet = nested_pet(
        r#"<child animationid="1"><x>0</x><y>0</y><next>8</next></child>
           <child animationid="8"><x>0</x><y>0</y><next>8</next></child>"#,
    );
    pet.update(Duration::from_millis(20));

    assert_eq!(pet.companions().len(), 32);
    assert_eq!(pet.state(), BehaviorState::Walking);
    assert_eq!(pet.animation_id(), Some("1"));
}

#[test]
fn child_rules_naming_unknown_animations_spawn_nothing() {
    let mut pet = nested_pet(
        r#"<child animationid="1"><x>0</x><y>0</y><next>404</next></child>
           <child animationid="1"><x>1</x><y>2</y><next>9</next></child>"#,
    );
    pet.update(Duration::from_millis(20));

    assert_eq!(companion_animations(&pet), vec![Some("9".to_string())]);
    assert_eq!(pet.animation_id(), Some("1"));
    run_for(&mut pet, 1.0);
    assert_eq!(pet.state(), BehaviorState::Walking);
}
