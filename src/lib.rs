// ==================== Imports ====================
use log::{error, LevelFilter};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsValue;

mod browser;
mod engine;
mod game;

pub mod config;
pub mod expression;
pub mod geometry;
pub mod pet;
pub mod random;
pub mod sprite;

// TABLE:
// ┌──────────────────────────────────────────────────────────────────────────┐
// │                          Crate Layout                                    │
// ├───────────────────┬──────────────────────────────────────────────────────┤
// │ Module            │ Role                                                 │
// ├───────────────────┼──────────────────────────────────────────────────────┤
// │ sprite            │ descriptor model, parser, frame playback             │
// │ expression        │ safe arithmetic for spawn coordinates                │
// │ pet               │ behavior state machine, timers, companions           │
// │ geometry / random │ seams to the screen and to the dice                  │
// │ config            │ tunables (serde, all defaulted)                      │
// │ browser / engine  │ wasm host : DOM, fetch, game loop, canvas            │
// │ game              │ DesktopPet : wires the pet into the game loop        │
// └───────────────────┴──────────────────────────────────────────────────────┘

// ==================== Structs ====================
/// Summary of a parsed descriptor, handed to javascript.
#[derive(Serialize)]
struct DescriptorSummary {
    pet_name: String,
    title: String,
    animations: usize,
    children: usize,
    spawns: usize,
    columns: u32,
    rows: u32,
}

// ==================== Main Functions ====================
/// Main entry for Webassembly module
/// - installs panic hook and console logger
/// - starts the game loop with the desktop pet
#[wasm_bindgen]
pub fn main_js() -> Result<(), JsValue> {
    // setup better panic messages for debugging
    console_error_panic_hook::set_once();
    browser::init_logger(LevelFilter::Info);

    // spawns a new asynchronous task in local thread, for web assembly
    // environment, using wasm_bindgen_futures
    browser::spawn_local(async move {
        if let Err(err) = engine::GameLoop::start(game::DesktopPet::new()).await {
            error!("Could not start desktop pet : {:#}", err);
        }
    });

    Ok(())
}

/// The pet as of the last game step, or `undefined` before the first one.
#[wasm_bindgen]
pub fn pet_snapshot() -> Result<JsValue, JsValue> {
    match game::latest_snapshot() {
        Some(snapshot) => serde_wasm_bindgen::to_value(&snapshot).map_err(JsValue::from),
        None => Ok(JsValue::UNDEFINED),
    }
}

/// Parses descriptor markup and reports what it contains.
#[wasm_bindgen]
pub fn describe_pet(source: &str) -> Result<JsValue, JsValue> {
    let definition = sprite::PetDefinition::parse(source);
    let summary = DescriptorSummary {
        pet_name: definition.header.pet_name,
        title: definition.header.title,
        animations: definition.animations.len(),
        children: definition.children.len(),
        spawns: definition.spawns.len(),
        columns: definition.sheet.columns,
        rows: definition.sheet.rows,
    };
    serde_wasm_bindgen::to_value(&summary).map_err(JsValue::from)
}
