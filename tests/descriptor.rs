use sprite_pet::random::SeededRandom;
use sprite_pet::sprite::playback::{Advance, Playback};
use sprite_pet::sprite::{PetDefinition, RepeatSpec, UNIVERSAL_SCOPE};
use std::path::PathBuf;
use std::rc::Rc;

const SHEEP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<animations xmlns="https://esheep.petrucci.ch/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <header>
    <author>Adriano</author>
    <title>eSheep</title>
    <petname>Sheep</petname>
    <version>1.4</version>
    <info>A small sheep walking on the desktop</info>
  </header>
  <image>
    <tilesx>16</tilesx>
    <tilesy>11</tilesy>
    <png>iVBORw0KGgo=</png>
  </image>
  <spawns>
    <spawn id="1" probability="80">
      <x>random*(screenW-imageW-50)/100+25</x>
      <y>-imageH</y>
      <next probability="100">1</next>
    </spawn>
    <spawn id="2" probability="20">
      <x>screenW-imageW</x>
      <y>areaH-imageH</y>
      <next probability="100">3</next>
    </spawn>
  </spawns>
  <animations>
    <animation id="1">
      <name>walk</name>
      <start><x>-2</x><y>0</y><interval>200</interval></start>
      <end><x>-2</x><y>0</y><interval>200</interval></end>
      <sequence repeat="20" repeatfrom="0">
        <frame>2</frame>
        <frame>3</frame>
        <next probability="90">1</next>
        <next probability="10" only="taskbar">2</next>
      </sequence>
      <border><next probability="100" only="vertical">3</next></border>
      <gravity><next probability="100">4</next></gravity>
    </animation>
    <animation id="2">
      <name>sit</name>
      <start><interval>150</interval><offsety>2</offsety></start>
      <sequence repeat="random/10+5" repeatfrom="1">
        <frame>10</frame>
        <frame>11</frame>
        <frame>12</frame>
        <next>1</next>
      </sequence>
    </animation>
    <animation id="3">
      <name>rotate</name>
      <start><interval>100</interval></start>
      <sequence repeat="0">
        <frame>8</frame>
        <frame>9</frame>
        <next>1</next>
      </sequence>
    </animation>
    <animation id="4">
      <name>fall</name>
      <start><y>4</y><interval>50</interval></start>
      <end><y>12</y><interval>20</interval></end>
      <sequence repeat="random*3"><frame>133</frame></sequence>
    </animation>
  </animations>
  <childs>
    <child animationid="2">
      <x>imageX</x>
      <y>imageY-imageH</y>
      <next>3</next>
    </child>
  </childs>
</animations>"#;

#[test]
fn reads_a_complete_pet_file() {
    let definition = PetDefinition::parse(SHEEP);

    assert_eq!(definition.header.title, "eSheep");
    assert_eq!(definition.header.pet_name, "Sheep");
    assert_eq!(definition.header.version, "1.4");
    assert_eq!(definition.sheet.columns, 16);
    assert_eq!(definition.sheet.rows, 11);
    assert_eq!(definition.sheet.png, b"\x89PNG\r\n\x1a\n".to_vec());
    assert_eq!(definition.sheet.cell(133), (5, 8));

    assert_eq!(definition.animations.len(), 4);
    assert_eq!(definition.spawns.len(), 2);
    assert_eq!(definition.spawns[1].weight, 20);
    assert_eq!(definition.spawns[1].next, "3");
    assert_eq!(definition.children.len(), 1);
    assert_eq!(definition.children_of("2").count(), 1);
    assert_eq!(definition.children_of("1").count(), 0);
}

#[test]
fn animation_fields_are_normalised() {
    let definition = PetDefinition::parse(SHEEP);

    let walk = definition.resolve("walk").expect("walk by name");
    assert_eq!(walk.id, "1");
    assert_eq!(walk.frames, vec![2, 3]);
    assert_eq!(walk.repeat, RepeatSpec::Fixed(20));
    assert_eq!(walk.start.move_x, -2.0);
    assert_eq!(walk.start.interval, 0.2);
    assert_eq!(walk.next.len(), 2);
    assert_eq!(walk.next[0].scope, UNIVERSAL_SCOPE);
    assert_eq!(walk.next[1].scope, "taskbar");
    assert_eq!(walk.border[0].target, "3");
    assert_eq!(walk.gravity[0].target, "4");

    let sit = definition.resolve("2").expect("sit by id");
    assert_eq!(sit.name, "sit");
    assert_eq!(sit.repeat_from, 1);
    assert_eq!(sit.start.offset_y, 2.0);
    assert_eq!(sit.end.interval, 0.15);
    assert_eq!(sit.next[0].weight, 100);

    let fall = definition.animation("4").expect("fall");
    assert_eq!(fall.start.move_y, 4.0);
    assert_eq!(fall.end.move_y, 12.0);
    assert_eq!(fall.end.interval, 0.02);
}

#[test]
fn fixed_repeat_plays_the_tail_again() {
    let definition = PetDefinition::parse(SHEEP);
    let rotate = Rc::clone(definition.animation("3").expect("rotate"));
    let mut random = SeededRandom::seeded(1);
    let mut playback: Playback<&str> = Playback::new();
    playback.start(rotate, false, Some("rotated"), &mut random);

    let mut frames = vec![playback.current_frame_number()];
    while let Advance::Stepped | Advance::Repeated = playback.advance(&mut random) {
        frames.push(playback.current_frame_number());
    }
    assert_eq!(frames, vec![Some(8), Some(9)]);
    assert!(playback.is_finished());
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sprite-pet-{}-{}", std::process::id(), name))
}

#[test]
fn loads_from_a_file() {
    let path = scratch_file("sheep.xml");
    std::fs::write(&path, SHEEP).expect("write scratch descriptor");
    let definition = PetDefinition::from_path(&path);
    std::fs::remove_file(&path).ok();

    let definition = definition.expect("descriptor loads");
    assert_eq!(definition, PetDefinition::parse(SHEEP));
}

#[test]
fn missing_file_is_an_error() {
    let path = scratch_file("missing.xml");
    let err = PetDefinition::from_path(&path).expect_err("nothing to read");
    assert!(format!("{:#}", err).contains("missing.xml"));
}
