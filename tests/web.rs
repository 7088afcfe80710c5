//! Runs in a browser or node with `wasm-pack test`.
#![cfg(target_arch = "wasm32")]

use js_sys::Reflect;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

const DOCUMENT: &str = r#"<animations>
  <header><title>Tiny</title><petname>Dot</petname></header>
  <image><tilesx>4</tilesx><tilesy>2</tilesy></image>
  <animation id="1"><name>walk</name><sequence><frame>0</frame><frame>1</frame></sequence></animation>
  <animation id="2"><name>fall</name><sequence><frame>2</frame></sequence></animation>
  <childs><child animationid="1"><x>imageX</x><y>imageY</y><next>2</next></child></childs>
</animations>"#;

fn field(value: &JsValue, name: &str) -> JsValue {
    Reflect::get(value, &JsValue::from_str(name)).expect("field present")
}

#[wasm_bindgen_test]
fn describes_a_descriptor_to_javascript() {
    let summary = sprite_pet::describe_pet(DOCUMENT).expect("summary");
    assert_eq!(field(&summary, "pet_name").as_string().as_deref(), Some("Dot"));
    assert_eq!(field(&summary, "title").as_string().as_deref(), Some("Tiny"));
    assert_eq!(field(&summary, "animations").as_f64(), Some(2.0));
    assert_eq!(field(&summary, "children").as_f64(), Some(1.0));
    assert_eq!(field(&summary, "spawns").as_f64(), Some(0.0));
    assert_eq!(field(&summary, "columns").as_f64(), Some(4.0));
    assert_eq!(field(&summary, "rows").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
fn no_snapshot_before_the_game_loop_runs() {
    let snapshot = sprite_pet::pet_snapshot().expect("snapshot");
    assert!(snapshot.is_undefined());
}
